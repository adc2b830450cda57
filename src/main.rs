mod command;
mod config;
mod connection;
mod document;
mod shutdown;
mod watcher;

use clap::Parser;
use command::DispatchLoop;
use config::{BridgeConfig, Cli};
use connection::{receive_loop, TransportClient};
use document::{DocumentConfig, DocumentControl, MemoryDocument, ScriptDocument};
use shutdown::Shutdown;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(log_filter(std::env::var("RUST_LOG").ok().as_deref()))
        .init();

    // TLS provider for wss endpoints; Err means one is already installed
    let _ = rustls::crypto::ring::default_provider().install_default();

    let cli = Cli::parse();
    let config = BridgeConfig::from_cli(&cli)?;
    let endpoint = config.endpoint()?;

    info!("Document bridge starting");
    info!("  Controller: {}", endpoint);
    info!("  Poll interval: {:?}", config.dispatch.poll_interval());

    let shutdown = Arc::new(Shutdown::new());
    let client = Arc::new(TransportClient::new(
        endpoint,
        config.transport.connect_timeout(),
    ));

    // Spawn signal listener
    let shutdown_clone = shutdown.clone();
    tokio::spawn(async move {
        shutdown_clone.listen_for_signals().await;
    });

    match &config.document {
        DocumentConfig::Memory { path } => {
            info!("  Document backend: memory ({})", path);
            run_bridge(MemoryDocument::with_document(path.clone()), client, &config, &shutdown).await?;
        }
        DocumentConfig::Script(script) => {
            info!("  Document backend: script ({})", script.program);
            run_bridge(ScriptDocument::new(script.clone()), client, &config, &shutdown).await?;
        }
    }

    info!("Document bridge stopped");
    Ok(())
}

/// Filter from `RUST_LOG` directives, `info` when unset or invalid
fn log_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

/// Run the receive activity and the dispatch loop until shutdown
async fn run_bridge<D: DocumentControl>(
    document: D,
    client: Arc<TransportClient>,
    config: &BridgeConfig,
    shutdown: &Shutdown,
) -> anyhow::Result<()> {
    let dispatch = DispatchLoop::new(document, client.clone(), &config.dispatch);

    // Spawn receive activity
    let receiver = tokio::spawn(receive_loop(
        client,
        config.transport.reconnect_delay(),
        dispatch.sender(),
        shutdown.signal(),
    ));

    dispatch.run(shutdown.signal()).await;

    receiver.await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::level_filters::LevelFilter;

    #[test]
    fn test_log_filter_honors_rust_log() {
        assert_eq!(log_filter(Some("debug")).max_level_hint(), Some(LevelFilter::DEBUG));
        assert_eq!(log_filter(Some("warn")).max_level_hint(), Some(LevelFilter::WARN));
        assert_eq!(log_filter(None).max_level_hint(), Some(LevelFilter::INFO));
    }
}
