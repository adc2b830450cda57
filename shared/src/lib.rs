//! Document Bridge Shared Protocol Types
//!
//! This crate provides the command envelope codec, the task queue that
//! decouples message receipt from execution, and the save-state edge
//! detector. It is shared between the bridge and the controller.

pub mod codec;
pub mod queue;
pub mod save_state;

pub use codec::{CodecError, EventKind, Outbound, Status};
pub use queue::{TaskQueue, TaskSender};
pub use save_state::{SaveState, SaveStateTracker};

/// Protocol defaults shared by both ends of the channel
pub mod defaults {
    /// WebSocket host the bridge dials
    pub const HOST: &str = "localhost";

    /// WebSocket port the controller listens on
    pub const PORT: u16 = 8080;

    /// WebSocket path
    pub const PATH: &str = "/ws";

    /// Delay between reconnection attempts
    pub const RECONNECT_DELAY_MS: u64 = 2000;

    /// Upper bound on a single WebSocket handshake
    pub const CONNECT_TIMEOUT_MS: u64 = 5000;

    /// Dispatch loop period
    pub const POLL_INTERVAL_MS: u64 = 500;

    /// How long the controller waits for a response before reporting it lost
    pub const RESPONSE_TIMEOUT_MS: u64 = 10_000;
}

/// Requested operation of a command envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Save,
    Replace,
    /// Any other action name; kept so the dispatcher can answer it
    Unsupported(String),
}

impl Action {
    /// Parse the wire name of an action
    pub fn from_wire(name: &str) -> Self {
        match name {
            "save" => Action::Save,
            "replace" => Action::Replace,
            other => Action::Unsupported(other.to_string()),
        }
    }

    /// Wire name of this action
    pub fn as_str(&self) -> &str {
        match self {
            Action::Save => "save",
            Action::Replace => "replace",
            Action::Unsupported(name) => name,
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Format of the content carried by a `replace` command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentFormat {
    /// HTML markup
    Html,
    /// Base64-encoded binary document (e.g. .docx)
    Base64,
    /// Plain text
    #[default]
    Plain,
}

impl ContentFormat {
    /// Parse the `payload.type` field. Unknown or missing values fall back
    /// to plain text.
    pub fn from_wire(name: Option<&str>) -> Self {
        match name {
            Some("html") => ContentFormat::Html,
            Some("base64") => ContentFormat::Base64,
            _ => ContentFormat::Plain,
        }
    }

    /// Wire name of this format
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentFormat::Html => "html",
            ContentFormat::Base64 => "base64",
            ContentFormat::Plain => "plain",
        }
    }

    /// File extension used when the content is staged on disk
    pub fn extension(&self) -> &'static str {
        match self {
            ContentFormat::Html => "html",
            ContentFormat::Base64 => "docx",
            ContentFormat::Plain => "txt",
        }
    }
}

impl std::str::FromStr for ContentFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "html" => Ok(ContentFormat::Html),
            "base64" => Ok(ContentFormat::Base64),
            "plain" | "text" => Ok(ContentFormat::Plain),
            other => Err(format!("unknown content format: {}", other)),
        }
    }
}

/// Decoded, validated form of a command envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub action: Action,
    /// Correlates the eventual response; may be empty
    pub id: String,
    pub content: String,
    pub content_type: ContentFormat,
    /// Expected document path; empty means no precondition
    pub check_path: String,
}

impl Task {
    /// Create a `save` task
    pub fn save(id: impl Into<String>) -> Self {
        Self {
            action: Action::Save,
            id: id.into(),
            content: String::new(),
            content_type: ContentFormat::Plain,
            check_path: String::new(),
        }
    }

    /// Create a `replace` task
    pub fn replace(
        id: impl Into<String>,
        content: impl Into<String>,
        content_type: ContentFormat,
        check_path: impl Into<String>,
    ) -> Self {
        Self {
            action: Action::Replace,
            id: id.into(),
            content: content.into(),
            content_type,
            check_path: check_path.into(),
        }
    }
}
