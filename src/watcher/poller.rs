//! Save Poller
//!
//! One check per call; the dispatch loop calls it synchronously so the
//! document host is never touched from two places at once.

use docbridge_shared::{Outbound, SaveState, SaveStateTracker};
use tracing::{info, warn};

use crate::connection::MessageSink;
use crate::document::DocumentControl;

/// Edge-triggered save detector bound to a document host
#[derive(Debug, Default)]
pub struct SavePoller {
    tracker: SaveStateTracker,
}

impl SavePoller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last tracked save state
    pub fn state(&self) -> SaveState {
        self.tracker.state()
    }

    /// Sample the saved flag once. On an unsaved -> saved transition, emit
    /// a `saved` event with the document path. Returns true if an event was
    /// emitted.
    pub async fn check<D, S>(&mut self, document: &mut D, sink: &S) -> bool
    where
        D: DocumentControl + ?Sized,
        S: MessageSink + ?Sized,
    {
        let reading = document.is_document_saved().await;
        if !self.tracker.observe(reading) {
            return false;
        }

        info!("[WATCH] Detected save event");
        let Some(path) = document.current_document_path().await else {
            warn!("[WATCH] Document saved but its path could not be read");
            return false;
        };

        if !sink.send_message(&Outbound::saved(path.as_str())).await {
            warn!("[WATCH] Saved event for {} not delivered", path);
            return false;
        }
        info!("[WATCH] Sent saved event for {}", path);
        true
    }
}
