//! Outbound message sink abstraction

use async_trait::async_trait;
use docbridge_shared::Outbound;

/// Anything that can deliver responses and events to the controller
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Deliver one message. Returns false if it could not be sent; nothing is
    /// queued for later delivery.
    async fn send_message(&self, message: &Outbound) -> bool;
}
