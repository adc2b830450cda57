//! Document Save-State Tracker
//!
//! Edge detection over sampled `is saved` readings. The host application
//! offers no save notification, so the bridge polls and fires only on the
//! unsaved -> saved transition.

/// Last observed save state of the active document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaveState {
    /// No successful reading yet
    #[default]
    Unknown,
    Saved,
    Unsaved,
}

impl From<bool> for SaveState {
    fn from(saved: bool) -> Self {
        if saved {
            SaveState::Saved
        } else {
            SaveState::Unsaved
        }
    }
}

/// Edge-triggered save detector
#[derive(Debug, Default)]
pub struct SaveStateTracker {
    state: SaveState,
}

impl SaveStateTracker {
    /// Create a tracker with no reading yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Current tracked state
    pub fn state(&self) -> SaveState {
        self.state
    }

    /// Feed one reading. `None` (no document, check failed) leaves the state
    /// untouched. Returns true exactly when the reading completes an
    /// unsaved -> saved transition.
    pub fn observe(&mut self, reading: Option<bool>) -> bool {
        let Some(saved) = reading else {
            return false;
        };

        let next = SaveState::from(saved);
        let fired = self.state == SaveState::Unsaved && next == SaveState::Saved;
        self.state = next;
        fired
    }
}
