//! Save command handler

use crate::command::CommandResult;
use crate::document::DocumentControl;

/// Handle a `save` command
pub async fn handle_save<D: DocumentControl + ?Sized>(document: &mut D) -> CommandResult {
    if document.save().await {
        CommandResult::Completed {
            message: "Document saved".into(),
        }
    } else {
        CommandResult::Failed {
            message: "Save failed".into(),
        }
    }
}
