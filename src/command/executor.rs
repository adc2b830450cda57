//! Command executor - dispatches tasks and builds their responses

use super::handlers;
use crate::document::DocumentControl;
use docbridge_shared::{Action, Outbound, Task};
use tracing::{info, warn};

/// Result of command execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    /// Command completed successfully
    Completed { message: String },
    /// Command was attempted and the document host reported failure
    Failed { message: String },
    /// Command was not attempted (precondition failed, unknown action)
    Rejected { message: String },
}

impl CommandResult {
    /// Response envelope for the task with the given id
    pub fn into_response(self, id: &str) -> Outbound {
        match self {
            CommandResult::Completed { .. } => Outbound::success(id),
            CommandResult::Failed { message } | CommandResult::Rejected { message } => {
                Outbound::error(id, message)
            }
        }
    }
}

/// Execute one task against the document host and return its response
pub async fn execute<D: DocumentControl + ?Sized>(document: &mut D, task: &Task) -> Outbound {
    info!("Executing task: id={} action={}", task.id, task.action);

    let result = match &task.action {
        Action::Save => handlers::handle_save(document).await,
        Action::Replace => handlers::handle_replace(document, task).await,
        Action::Unsupported(name) => CommandResult::Rejected {
            message: format!("Unsupported action: {}", name),
        },
    };

    match &result {
        CommandResult::Completed { message } => info!("  Task completed: {}", message),
        CommandResult::Failed { message } => warn!("  Task failed: {}", message),
        CommandResult::Rejected { message } => warn!("  Task rejected: {}", message),
    }

    result.into_response(&task.id)
}
