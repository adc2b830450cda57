//! Replace command handler

use docbridge_shared::Task;
use tracing::{info, warn};

use crate::command::CommandResult;
use crate::document::DocumentControl;

/// Handle a `replace` command.
///
/// A non-empty `check_path` must match the active document or nothing is
/// touched. A successful replace is followed by a save; the result reflects
/// the replace alone.
pub async fn handle_replace<D: DocumentControl + ?Sized>(document: &mut D, task: &Task) -> CommandResult {
    if !task.check_path.is_empty() && !document.path_matches(&task.check_path).await {
        return CommandResult::Rejected {
            message: "Document path mismatch".into(),
        };
    }

    info!(
        "  [REPLACE] {} bytes of {} content",
        task.content.len(),
        task.content_type.as_str()
    );

    if !document.replace(&task.content, task.content_type).await {
        return CommandResult::Failed {
            message: "Replace failed".into(),
        };
    }

    if !document.save().await {
        warn!("  [REPLACE] Content replaced but follow-up save failed");
    }

    CommandResult::Completed {
        message: "Content replaced".into(),
    }
}
