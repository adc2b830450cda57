//! Receive activity with persistent connection and automatic reconnection

use docbridge_shared::{codec, TaskSender};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::client::{Received, TransportClient};
use crate::shutdown::ShutdownSignal;

/// Longest prefix of an inbound frame written to the log
const LOG_PREVIEW_CHARS: usize = 100;

/// Keep the transport connected and feed decoded commands to the task queue
/// until shutdown.
///
/// Connection failures are retried after `reconnect_delay` with no retry
/// limit. Malformed frames are logged and dropped.
pub async fn receive_loop(
    client: Arc<TransportClient>,
    reconnect_delay: Duration,
    tasks: TaskSender,
    mut shutdown: ShutdownSignal,
) {
    info!("[WS] Receive loop started for {}", client.url());

    loop {
        if shutdown.is_triggered() {
            break;
        }

        if !client.is_connected().await {
            if client.connect().await {
                continue;
            }

            debug!("[WS] Retrying in {:?}", reconnect_delay);
            tokio::select! {
                _ = tokio::time::sleep(reconnect_delay) => continue,
                _ = shutdown.wait() => break,
            }
        }

        let received = tokio::select! {
            received = client.receive() => received,
            _ = shutdown.wait() => break,
        };

        match received {
            Received::Message(text) => {
                if !handle_frame(&text, &tasks) {
                    warn!("[WS] Task queue closed, stopping receive loop");
                    break;
                }
            }
            Received::Closed => warn!("[WS] Disconnected: closed by server"),
            Received::Error(reason) => warn!("[WS] Disconnected: {}", reason),
        }
    }

    client.close().await;
    info!("[WS] Receive loop stopped");
}

/// Decode one frame and queue it. Returns false only when the queue is gone.
fn handle_frame(text: &str, tasks: &TaskSender) -> bool {
    debug!("[WS] Received: {}", preview(text));

    match codec::decode(text) {
        Ok(task) => tasks.push(task),
        Err(e) => {
            warn!("[WS] Dropping malformed command: {}", e);
            true
        }
    }
}

fn preview(text: &str) -> &str {
    match text.char_indices().nth(LOG_PREVIEW_CHARS) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}
