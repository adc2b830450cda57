//! Shutdown signalling
//!
//! A single watch channel fans the stop request out to the receive activity
//! and the dispatch loop. Ctrl+C and SIGTERM both trigger it.

use tokio::sync::watch;
use tracing::{debug, info};

/// Owner of the shutdown flag
pub struct Shutdown {
    tx: watch::Sender<bool>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Get a signal that can be awaited by one activity
    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }

    /// Request shutdown
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// Wait for Ctrl+C or SIGTERM, then trigger shutdown
    pub async fn listen_for_signals(&self) {
        wait_for_signal().await;
        self.trigger();
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            debug!("SIGTERM handler unavailable: {}", e);
            let _ = tokio::signal::ctrl_c().await;
            info!("Received Ctrl+C, initiating shutdown");
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Received Ctrl+C, initiating shutdown"),
        _ = sigterm.recv() => info!("Received SIGTERM, initiating shutdown"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Received Ctrl+C, initiating shutdown");
    }
}

/// Receiving side of the shutdown flag
#[derive(Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Whether shutdown has been requested
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once shutdown is requested (or the owner is gone)
    pub async fn wait(&mut self) {
        // Err: sender dropped
        let _ = self.rx.wait_for(|stop| *stop).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_trigger_wakes_waiters() {
        let shutdown = Shutdown::new();
        let mut signal = shutdown.signal();
        assert!(!signal.is_triggered());

        let waiter = tokio::spawn(async move { signal.wait().await });
        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter not woken")
            .unwrap();
    }

    #[tokio::test]
    async fn test_signal_created_after_trigger() {
        let shutdown = Shutdown::new();
        shutdown.trigger();

        let mut late = shutdown.signal();
        assert!(late.is_triggered());
        late.wait().await;
    }

    #[tokio::test]
    async fn test_dropped_owner_releases_waiters() {
        let shutdown = Shutdown::new();
        let mut signal = shutdown.signal();
        drop(shutdown);
        signal.wait().await;
    }
}
