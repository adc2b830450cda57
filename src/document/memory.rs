//! In-process simulated editor
//!
//! Behaves like a single-window editor: one active document with a saved
//! flag and revision tracking. In tests the `set_*`/`mark_*` hooks stand in
//! for a user working in the application.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use docbridge_shared::ContentFormat;
use tracing::{debug, info, warn};

use super::{DocumentControl, DocumentError};

/// State of the simulated active document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenDocument {
    pub path: String,
    pub content: Vec<u8>,
    pub format: ContentFormat,
    pub saved: bool,
    pub track_revisions: bool,
    /// Tracked changes not yet accepted
    pub pending_revisions: usize,
}

impl OpenDocument {
    fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: Vec::new(),
            format: ContentFormat::Plain,
            saved: true,
            track_revisions: false,
            pending_revisions: 0,
        }
    }
}

/// Simulated document host
#[derive(Debug)]
pub struct MemoryDocument {
    /// Whether the host process is running
    alive: bool,
    /// Cached handle
    connected: bool,
    document: Option<OpenDocument>,
    save_calls: usize,
    replace_calls: usize,
}

impl MemoryDocument {
    /// A running host with no open document
    pub fn new() -> Self {
        Self {
            alive: true,
            connected: false,
            document: None,
            save_calls: 0,
            replace_calls: 0,
        }
    }

    /// A running host with one saved document open
    pub fn with_document(path: impl Into<String>) -> Self {
        Self {
            document: Some(OpenDocument::new(path)),
            ..Self::new()
        }
    }

    /// Start or terminate the simulated host
    #[cfg(test)]
    pub fn set_alive(&mut self, alive: bool) {
        self.alive = alive;
    }

    #[cfg(test)]
    pub fn close_document(&mut self) {
        self.document = None;
    }

    /// Simulate a user edit
    #[cfg(test)]
    pub fn mark_dirty(&mut self) {
        if let Some(doc) = self.document.as_mut() {
            doc.saved = false;
            if doc.track_revisions {
                doc.pending_revisions += 1;
            }
        }
    }

    /// Simulate the user pressing save in the application
    #[cfg(test)]
    pub fn mark_saved_externally(&mut self) {
        if let Some(doc) = self.document.as_mut() {
            doc.saved = true;
        }
    }

    #[cfg(test)]
    pub fn set_track_revisions(&mut self, on: bool) {
        if let Some(doc) = self.document.as_mut() {
            doc.track_revisions = on;
        }
    }

    #[cfg(test)]
    pub fn document(&self) -> Option<&OpenDocument> {
        self.document.as_ref()
    }

    #[cfg(test)]
    pub fn save_calls(&self) -> usize {
        self.save_calls
    }

    #[cfg(test)]
    pub fn replace_calls(&self) -> usize {
        self.replace_calls
    }

    fn check_alive(&mut self) -> Result<(), DocumentError> {
        if !self.connected {
            return Err(DocumentError::NotConnected);
        }
        if !self.alive {
            warn!("[DOC] Document host disconnected");
            self.connected = false;
            return Err(DocumentError::NotConnected);
        }
        Ok(())
    }

    fn active(&mut self) -> Result<&mut OpenDocument, DocumentError> {
        self.check_alive()?;
        self.document.as_mut().ok_or(DocumentError::NoActiveDocument)
    }

    fn replace_active(&mut self, content: &str, format: ContentFormat) -> Result<(), DocumentError> {
        // Decode before touching the document.
        let bytes = match format {
            ContentFormat::Base64 => STANDARD.decode(content.trim())?,
            ContentFormat::Html | ContentFormat::Plain => content.as_bytes().to_vec(),
        };

        let doc = self.active()?;
        // Tracking stays off afterwards, whatever it was before.
        doc.track_revisions = false;
        doc.pending_revisions = 0;
        doc.content = bytes;
        doc.format = format;
        doc.saved = false;
        Ok(())
    }
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentControl for MemoryDocument {
    async fn connect(&mut self) -> bool {
        if self.connected {
            return true;
        }
        if !self.alive {
            return false;
        }
        self.connected = true;
        info!("[DOC] Connected to simulated document host");
        true
    }

    async fn is_connected(&mut self) -> bool {
        self.check_alive().is_ok()
    }

    async fn current_document_path(&mut self) -> Option<String> {
        self.active().ok().map(|doc| doc.path.clone())
    }

    async fn is_document_saved(&mut self) -> Option<bool> {
        self.active().ok().map(|doc| doc.saved)
    }

    async fn save(&mut self) -> bool {
        self.save_calls += 1;
        debug!("[DOC] Save request #{}", self.save_calls);
        match self.active() {
            Ok(doc) => {
                doc.saved = true;
                true
            }
            Err(e) => {
                warn!("[DOC] Save failed: {}", e);
                false
            }
        }
    }

    async fn replace(&mut self, content: &str, format: ContentFormat) -> bool {
        self.replace_calls += 1;
        debug!("[DOC] Replace request #{}", self.replace_calls);
        match self.replace_active(content, format) {
            Ok(()) => true,
            Err(e) => {
                warn!("[DOC] Replace failed: {}", e);
                false
            }
        }
    }
}
