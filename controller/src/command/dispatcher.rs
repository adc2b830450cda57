//! Command dispatcher for sending commands to the bridge

use crate::session::SessionManager;
use docbridge_shared::{Action, Outbound, Status, Task};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Tracks a sent command awaiting response
#[derive(Debug, Clone)]
pub struct PendingCommand {
    pub id: String,
    pub action: Action,
    pub sent_at: Instant,
}

impl PendingCommand {
    /// Check if this command has waited longer than `after`
    pub fn is_timed_out(&self, after: Duration) -> bool {
        self.sent_at.elapsed() >= after
    }
}

/// Sends commands to the bridge and tracks responses
pub struct CommandDispatcher {
    sessions: Arc<SessionManager>,
    command_id: AtomicU64,
    /// Pending commands by id
    pending: RwLock<HashMap<String, PendingCommand>>,
    response_timeout: Duration,
}

impl CommandDispatcher {
    /// Create a new command dispatcher
    pub fn new(sessions: Arc<SessionManager>, response_timeout: Duration) -> Self {
        Self {
            sessions,
            command_id: AtomicU64::new(0),
            pending: RwLock::new(HashMap::new()),
            response_timeout,
        }
    }

    /// Get the next command id
    pub fn next_command_id(&self) -> String {
        format!("cmd-{}", self.command_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn response_timeout(&self) -> Duration {
        self.response_timeout
    }

    /// Assign an id to `task`, send it and start tracking it
    pub async fn send_command(&self, mut task: Task) -> anyhow::Result<String> {
        if !self.sessions.is_connected().await {
            anyhow::bail!("Bridge not connected");
        }

        task.id = self.next_command_id();
        let pending = PendingCommand {
            id: task.id.clone(),
            action: task.action.clone(),
            sent_at: Instant::now(),
        };
        self.pending.write().await.insert(task.id.clone(), pending);

        if let Err(e) = self.sessions.send(&task).await {
            self.pending.write().await.remove(&task.id);
            return Err(e);
        }

        info!(">>> Sent {} command {}", task.action, task.id);
        Ok(task.id)
    }

    /// Handle a response or event from the bridge
    pub async fn handle_message(&self, message: Outbound) {
        match message {
            Outbound::Response { id, status, message } => {
                let pending = self.pending.write().await.remove(&id);
                let Some(cmd) = pending else {
                    warn!("<<< Response for unknown command {:?}: {:?}", id, status);
                    return;
                };

                let elapsed = cmd.sent_at.elapsed();
                match status {
                    Status::Success => info!(
                        "<<< {} command {} succeeded ({}ms)",
                        cmd.action,
                        id,
                        elapsed.as_millis()
                    ),
                    Status::Error => warn!(
                        "<<< {} command {} failed ({}ms)",
                        cmd.action,
                        id,
                        elapsed.as_millis()
                    ),
                }
                if let Some(message) = message {
                    info!("    Message: {}", message);
                }
            }
            Outbound::Event { event, path } => {
                info!("<<< Event {:?}: {}", event, path);
            }
        }
    }

    /// Remove and return commands whose response is overdue
    pub async fn take_timed_out(&self) -> Vec<PendingCommand> {
        let mut pending = self.pending.write().await;
        let overdue: Vec<String> = pending
            .values()
            .filter(|c| c.is_timed_out(self.response_timeout))
            .map(|c| c.id.clone())
            .collect();

        overdue
            .iter()
            .filter_map(|id| pending.remove(id))
            .collect()
    }

    /// Get count of pending commands
    pub async fn pending_count(&self) -> usize {
        self.pending.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::testing::loopback;
    use docbridge_shared::codec;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_rejects_when_not_connected() {
        let dispatcher = CommandDispatcher::new(Arc::new(SessionManager::new()), Duration::from_secs(10));
        assert!(dispatcher.send_command(Task::save("")).await.is_err());
        assert_eq!(dispatcher.pending_count().await, 0);
        assert_eq!(dispatcher.next_command_id(), "cmd-1");
    }

    #[tokio::test]
    async fn test_response_clears_pending() {
        let sessions = Arc::new(SessionManager::new());
        let (session, mut bridge) = loopback(sessions.next_session_id()).await;
        sessions.register(session.get_handle()).await;
        let dispatcher = CommandDispatcher::new(sessions, Duration::from_secs(10));

        let first = dispatcher.send_command(Task::save("")).await.unwrap();
        let second = dispatcher.send_command(Task::save("")).await.unwrap();
        assert_eq!(first, "cmd-1");
        assert_eq!(second, "cmd-2");
        assert_eq!(dispatcher.pending_count().await, 2);

        let frame = bridge.next().await.unwrap().unwrap();
        assert_eq!(codec::decode(frame.to_text().unwrap()).unwrap().id, "cmd-1");

        dispatcher.handle_message(Outbound::success("cmd-1")).await;
        dispatcher.handle_message(Outbound::success("cmd-99")).await;
        dispatcher.handle_message(Outbound::saved("C:\\a.docx")).await;
        assert_eq!(dispatcher.pending_count().await, 1);
    }

    #[tokio::test]
    async fn test_take_timed_out() {
        let sessions = Arc::new(SessionManager::new());
        let (session, _bridge) = loopback(sessions.next_session_id()).await;
        sessions.register(session.get_handle()).await;
        let dispatcher = CommandDispatcher::new(sessions, Duration::from_millis(50));

        let id = dispatcher.send_command(Task::save("")).await.unwrap();
        assert!(dispatcher.take_timed_out().await.is_empty());

        tokio::time::sleep(Duration::from_millis(80)).await;
        let overdue = dispatcher.take_timed_out().await;
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].id, id);
        assert_eq!(dispatcher.pending_count().await, 0);
    }
}
