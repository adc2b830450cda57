//! Timeout tracking for pending commands

use super::dispatcher::CommandDispatcher;
use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::warn;

/// Reports commands that never got a response. Nothing is re-sent: the
/// bridge does not deduplicate commands.
pub struct TimeoutTracker {
    dispatcher: Arc<CommandDispatcher>,
    check_interval: Duration,
}

impl TimeoutTracker {
    /// Create a new timeout tracker
    pub fn new(dispatcher: Arc<CommandDispatcher>) -> Self {
        Self {
            dispatcher,
            check_interval: Duration::from_millis(1000),
        }
    }

    /// Start the timeout monitoring loop
    pub async fn run(&self) {
        let mut ticker = interval(self.check_interval);

        loop {
            ticker.tick().await;

            for cmd in self.dispatcher.take_timed_out().await {
                warn!(
                    "Command {} ({}) got no response within {:?}",
                    cmd.id,
                    cmd.action,
                    self.dispatcher.response_timeout()
                );
            }
        }
    }
}
