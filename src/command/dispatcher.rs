//! Dispatch loop - the fixed-period orchestrator
//!
//! Each cycle:
//! 1. Ensure the document host is connected, reconnecting if needed
//! 2. Run one save-state check (only while connected)
//! 3. Drain the task queue in FIFO order
//! 4. Execute each task and send its response
//!
//! The document host is touched only from this loop.

use docbridge_shared::{defaults, TaskQueue, TaskSender};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::execute;
use crate::connection::MessageSink;
use crate::document::DocumentControl;
use crate::shutdown::ShutdownSignal;
use crate::watcher::SavePoller;

/// Dispatch loop settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Period between cycles
    pub poll_interval_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: defaults::POLL_INTERVAL_MS,
        }
    }
}

impl DispatchConfig {
    /// Period between cycles, never zero
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

/// Owns the document host, the task queue and the save poller
pub struct DispatchLoop<D, S: ?Sized> {
    document: D,
    sink: Arc<S>,
    queue: TaskQueue,
    poller: SavePoller,
    poll_interval: Duration,
}

impl<D, S> DispatchLoop<D, S>
where
    D: DocumentControl,
    S: MessageSink + ?Sized,
{
    pub fn new(document: D, sink: Arc<S>, config: &DispatchConfig) -> Self {
        Self {
            document,
            sink,
            queue: TaskQueue::new(),
            poller: SavePoller::new(),
            poll_interval: config.poll_interval(),
        }
    }

    /// Handle for the receive activity to push decoded tasks
    pub fn sender(&self) -> TaskSender {
        self.queue.sender()
    }

    #[cfg(test)]
    pub fn document(&self) -> &D {
        &self.document
    }

    #[cfg(test)]
    pub fn document_mut(&mut self) -> &mut D {
        &mut self.document
    }

    /// Run cycles until shutdown is requested
    pub async fn run(mut self, mut shutdown: ShutdownSignal) -> D {
        info!(
            "Dispatch loop started (interval {:?})",
            self.poll_interval
        );

        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_cycle().await;
                }
                _ = shutdown.wait() => break,
            }
        }

        let pending = self.queue.len();
        if pending > 0 {
            warn!("Dispatch loop stopping with {} unexecuted task(s)", pending);
        }
        info!("Dispatch loop stopped (save state {:?})", self.poller.state());
        self.document
    }

    /// One cycle of the loop. Returns the number of tasks executed.
    pub async fn run_cycle(&mut self) -> usize {
        let mut connected = self.document.is_connected().await;
        if !connected {
            debug!("[DOC] Document host not connected, attempting connect");
            connected = self.document.connect().await;
        }

        if connected {
            self.poller.check(&mut self.document, self.sink.as_ref()).await;
        }

        let tasks = self.queue.pop_all();
        let count = tasks.len();
        for task in tasks {
            let response = execute(&mut self.document, &task).await;
            if !self.sink.send_message(&response).await {
                warn!("Response for task {} not delivered", task.id);
            }
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::sink::testing::RecordingSink;
    use crate::document::MemoryDocument;
    use crate::shutdown::Shutdown;
    use docbridge_shared::{Action, ContentFormat, Outbound, Task};

    fn new_loop(doc: MemoryDocument) -> (DispatchLoop<MemoryDocument, RecordingSink>, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::new());
        let dispatch = DispatchLoop::new(doc, sink.clone(), &DispatchConfig::default());
        (dispatch, sink)
    }

    #[tokio::test]
    async fn test_empty_cycle_sends_nothing() {
        let (mut dispatch, sink) = new_loop(MemoryDocument::with_document("a.docx"));
        assert_eq!(dispatch.run_cycle().await, 0);
        assert!(sink.sent().is_empty());
        assert!(dispatch.document_mut().is_connected().await);
    }

    #[tokio::test]
    async fn test_tasks_execute_in_order() {
        let (mut dispatch, sink) = new_loop(MemoryDocument::with_document("C:\\a.docx"));
        let sender = dispatch.sender();
        sender.push(Task::save("1"));
        sender.push(Task::replace("2", "body", ContentFormat::Plain, "c:/a.docx"));
        sender.push(Task {
            action: Action::from_wire("close"),
            ..Task::save("3")
        });

        assert_eq!(dispatch.run_cycle().await, 3);
        assert_eq!(
            sink.sent(),
            vec![
                Outbound::success("1"),
                Outbound::success("2"),
                Outbound::error("3", "Unsupported action: close"),
            ]
        );
        assert_eq!(dispatch.document().save_calls(), 2);
        assert_eq!(dispatch.document().replace_calls(), 1);
    }

    #[tokio::test]
    async fn test_path_mismatch_end_to_end() {
        let (mut dispatch, sink) = new_loop(MemoryDocument::with_document("C:\\Docs\\Report.docx"));
        dispatch
            .sender()
            .push(Task::replace("r1", "<p>x</p>", ContentFormat::Html, "C:\\Docs\\Other.docx"));

        dispatch.run_cycle().await;
        assert_eq!(
            sink.sent(),
            vec![Outbound::error("r1", "Document path mismatch")]
        );
        assert_eq!(dispatch.document().replace_calls(), 0);
    }

    #[tokio::test]
    async fn test_save_while_host_down() {
        let mut doc = MemoryDocument::with_document("a.docx");
        doc.set_alive(false);
        let (mut dispatch, sink) = new_loop(doc);
        dispatch.sender().push(Task::save("s1"));

        dispatch.run_cycle().await;
        assert_eq!(sink.sent(), vec![Outbound::error("s1", "Save failed")]);
    }

    #[tokio::test]
    async fn test_reconnects_document_host() {
        let (mut dispatch, _sink) = new_loop(MemoryDocument::with_document("a.docx"));
        dispatch.run_cycle().await;

        dispatch.document_mut().set_alive(false);
        dispatch.run_cycle().await;
        assert!(!dispatch.document_mut().is_connected().await);

        dispatch.document_mut().set_alive(true);
        dispatch.run_cycle().await;
        assert!(dispatch.document_mut().is_connected().await);
    }

    #[tokio::test]
    async fn test_user_save_emits_event_once() {
        let (mut dispatch, sink) = new_loop(MemoryDocument::with_document("C:\\a.docx"));
        dispatch.run_cycle().await;

        dispatch.document_mut().mark_dirty();
        dispatch.run_cycle().await;
        dispatch.document_mut().mark_saved_externally();
        dispatch.run_cycle().await;
        dispatch.run_cycle().await;

        assert_eq!(sink.sent(), vec![Outbound::saved("C:\\a.docx")]);
    }

    #[tokio::test]
    async fn test_undelivered_response_is_dropped() {
        let sink = Arc::new(RecordingSink::offline());
        let mut dispatch = DispatchLoop::new(
            MemoryDocument::with_document("a.docx"),
            sink.clone(),
            &DispatchConfig::default(),
        );
        dispatch.sender().push(Task::save("1"));

        assert_eq!(dispatch.run_cycle().await, 1);
        assert!(sink.sent().is_empty());
        assert_eq!(dispatch.run_cycle().await, 0);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let (dispatch, sink) = new_loop(MemoryDocument::with_document("a.docx"));
        let sender = dispatch.sender();
        let shutdown = Shutdown::new();
        let handle = tokio::spawn(dispatch.run(shutdown.signal()));

        sender.push(Task::save("1"));
        tokio::time::sleep(Duration::from_millis(700)).await;
        shutdown.trigger();

        let doc = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("dispatch loop did not stop")
            .unwrap();
        assert_eq!(doc.save_calls(), 1);
        assert_eq!(sink.sent(), vec![Outbound::success("1")]);
    }

    #[tokio::test]
    async fn test_zero_interval_is_clamped() {
        let config = DispatchConfig { poll_interval_ms: 0 };
        assert_eq!(config.poll_interval(), Duration::from_millis(1));

        let sink = Arc::new(RecordingSink::new());
        let dispatch = DispatchLoop::new(MemoryDocument::with_document("a.docx"), sink.clone(), &config);
        let sender = dispatch.sender();
        let shutdown = Shutdown::new();
        let handle = tokio::spawn(dispatch.run(shutdown.signal()));

        sender.push(Task::save("z1"));
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.trigger();

        let doc = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("dispatch loop did not stop")
            .expect("dispatch loop panicked");
        assert_eq!(doc.save_calls(), 1);
        assert_eq!(sink.sent(), vec![Outbound::success("z1")]);
    }
}
