//! JSON envelope codec
//!
//! One JSON object per WebSocket text message. Inbound frames are command
//! envelopes:
//! ```text
//! {"action": "replace", "id": "7", "payload": {"content": "...", "type": "html",
//!  "options": {"checkPath": "C:\\docs\\a.docx"}}}
//! ```
//! Outbound frames are either responses or unsolicited events:
//! ```text
//! {"type": "response", "id": "7", "status": "error", "message": "Document path mismatch"}
//! {"type": "event", "event": "saved", "path": "C:\\docs\\a.docx"}
//! ```

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::{Action, ContentFormat, Task};

/// Errors that can occur during encoding/decoding
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Command envelope has no action")]
    MissingAction,
}

/// Wire shape of an inbound command. Every field is optional here so that
/// `null` and absent keys decode the same way; validation happens in
/// [`decode`]. Apart from `action`, a field of the wrong JSON type is
/// treated as absent.
#[derive(Debug, Default, Deserialize)]
struct CommandEnvelope {
    #[serde(default)]
    action: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    payload: Option<Payload>,
}

#[derive(Debug, Default, Deserialize)]
struct Payload {
    #[serde(default, deserialize_with = "lenient")]
    content: Option<String>,
    #[serde(default, rename = "type", deserialize_with = "lenient")]
    content_type: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    options: Option<Options>,
}

#[derive(Debug, Default, Deserialize)]
struct Options {
    #[serde(default, rename = "checkPath", deserialize_with = "lenient")]
    check_path: Option<String>,
}

/// Accept any JSON value; yield `None` unless it has the expected shape
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Outcome reported in a response envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

/// Kinds of unsolicited events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Saved,
}

/// A message sent from the bridge to the controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Outbound {
    /// Reply correlated to a command by id
    Response {
        id: String,
        status: Status,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    /// Externally observed state change
    Event { event: EventKind, path: String },
}

impl Outbound {
    /// Successful response without a message
    pub fn success(id: impl Into<String>) -> Self {
        Outbound::Response {
            id: id.into(),
            status: Status::Success,
            message: None,
        }
    }

    /// Error response with an explanatory message
    pub fn error(id: impl Into<String>, message: impl Into<String>) -> Self {
        Outbound::Response {
            id: id.into(),
            status: Status::Error,
            message: Some(message.into()),
        }
    }

    /// `saved` event for the given document path
    pub fn saved(path: impl Into<String>) -> Self {
        Outbound::Event {
            event: EventKind::Saved,
            path: path.into(),
        }
    }
}

/// Decode a command envelope into a validated task
///
/// Missing optional fields default to empty; unknown fields are ignored.
/// Fails on malformed JSON, a non-object document, wrongly typed fields,
/// or a missing/empty `action`.
pub fn decode(text: &str) -> Result<Task, CodecError> {
    let envelope: CommandEnvelope = serde_json::from_str(text)?;

    let action = match envelope.action {
        Some(action) if !action.is_empty() => Action::from_wire(&action),
        _ => return Err(CodecError::MissingAction),
    };

    let payload = envelope.payload.unwrap_or_default();
    let check_path = payload
        .options
        .and_then(|options| options.check_path)
        .unwrap_or_default();

    Ok(Task {
        action,
        id: envelope.id.unwrap_or_default(),
        content: payload.content.unwrap_or_default(),
        content_type: ContentFormat::from_wire(payload.content_type.as_deref()),
        check_path,
    })
}

/// Encode a task back into its command envelope (controller side)
pub fn encode_command(task: &Task) -> Result<String, CodecError> {
    let mut payload = serde_json::Map::new();
    if task.action == Action::Replace {
        payload.insert("content".into(), task.content.clone().into());
        payload.insert("type".into(), task.content_type.as_str().into());
        if !task.check_path.is_empty() {
            payload.insert(
                "options".into(),
                serde_json::json!({ "checkPath": task.check_path }),
            );
        }
    }

    let mut envelope = serde_json::json!({
        "action": task.action.as_str(),
        "id": task.id,
    });
    if !payload.is_empty() {
        envelope["payload"] = serde_json::Value::Object(payload);
    }

    Ok(serde_json::to_string(&envelope)?)
}

/// Encode a response or event into JSON text
pub fn encode(message: &Outbound) -> Result<String, CodecError> {
    Ok(serde_json::to_string(message)?)
}

/// Decode a response or event (controller side)
pub fn decode_outbound(text: &str) -> Result<Outbound, CodecError> {
    Ok(serde_json::from_str(text)?)
}
