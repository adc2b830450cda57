mod command;
mod console;
mod session;

use clap::Parser;
use command::{CommandDispatcher, TimeoutTracker};
use console::ConsoleCommand;
use docbridge_shared::{defaults, Task};
use session::{BridgeSession, SessionManager};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Console controller for a document bridge
#[derive(Parser, Debug)]
#[command(name = "doc-controller", version)]
struct Args {
    /// Address to accept bridge connections on
    #[arg(long, env = "DOC_CONTROLLER_LISTEN", default_value = "0.0.0.0:8080")]
    listen: SocketAddr,

    /// How long to wait for a response before reporting it lost
    #[arg(long, env = "DOC_CONTROLLER_RESPONSE_TIMEOUT_MS", default_value_t = defaults::RESPONSE_TIMEOUT_MS)]
    response_timeout_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let listener = TcpListener::bind(args.listen).await?;
    info!("Controller listening on ws://{}", listener.local_addr()?);

    let sessions = Arc::new(SessionManager::new());
    let dispatcher = Arc::new(CommandDispatcher::new(
        sessions.clone(),
        Duration::from_millis(args.response_timeout_ms),
    ));

    // Spawn accept loop
    tokio::spawn(accept_loop(listener, sessions.clone(), dispatcher.clone()));

    // Spawn timeout tracker
    let tracker = TimeoutTracker::new(dispatcher.clone());
    tokio::spawn(async move { tracker.run().await });

    println!("{}", console::USAGE);
    let stdin = BufReader::new(tokio::io::stdin());
    run_console(stdin, &sessions, &dispatcher, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await?;

    if let Some(handle) = sessions.active().await {
        handle.close().await;
    }
    info!("Controller stopped");
    Ok(())
}

/// Read console commands until `quit` or `stop` resolves. Closed input
/// only ends reading; the controller keeps serving until `stop`.
async fn run_console<R, F>(
    reader: R,
    sessions: &SessionManager,
    dispatcher: &CommandDispatcher,
    stop: F,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    F: Future<Output = ()>,
{
    tokio::pin!(stop);
    let mut lines = reader.lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = &mut stop => return Ok(()),
        };
        let Some(line) = line else {
            info!("Console input closed, serving until Ctrl+C");
            stop.await;
            return Ok(());
        };

        match console::parse(&line) {
            Ok(Some(ConsoleCommand::Quit)) => return Ok(()),
            Ok(Some(command)) => run_command(command, sessions, dispatcher).await,
            Ok(None) => {}
            Err(e) => warn!("{}", e),
        }
    }
}

async fn run_command(command: ConsoleCommand, sessions: &SessionManager, dispatcher: &CommandDispatcher) {
    let task = match command {
        ConsoleCommand::Save => Task::save(""),
        ConsoleCommand::Replace {
            format,
            file,
            check_path,
        } => match console::load_content(format, &file) {
            Ok(content) => Task::replace("", content, format, check_path),
            Err(e) => {
                error!("{:#}", e);
                return;
            }
        },
        ConsoleCommand::Status => {
            match sessions.active().await {
                Some(handle) => info!(
                    "Bridge {} connected for {}s",
                    handle.addr,
                    handle.connected_at.elapsed().as_secs()
                ),
                None => info!("No bridge connected"),
            }
            info!("Pending commands: {}", dispatcher.pending_count().await);
            return;
        }
        ConsoleCommand::Help => {
            println!("{}", console::USAGE);
            return;
        }
        ConsoleCommand::Quit => return,
    };

    if let Err(e) = dispatcher.send_command(task).await {
        error!("Command not sent: {}", e);
    }
}

/// Accept bridge connections; the newest one becomes the active session
async fn accept_loop(listener: TcpListener, sessions: Arc<SessionManager>, dispatcher: Arc<CommandDispatcher>) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                tokio::spawn(handle_connection(stream, addr, sessions.clone(), dispatcher.clone()));
            }
            Err(e) => error!("Accept failed: {}", e),
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    sessions: Arc<SessionManager>,
    dispatcher: Arc<CommandDispatcher>,
) {
    let id = sessions.next_session_id();
    let mut session = match BridgeSession::accept(stream, addr, id).await {
        Ok(session) => session,
        Err(e) => {
            warn!("Handshake with {} failed: {}", addr, e);
            return;
        }
    };
    info!("Bridge connected: {}", addr);

    if let Some(previous) = sessions.register(session.get_handle()).await {
        info!("Replacing previous bridge session from {}", previous.addr);
        previous.close().await;
    }

    while let Some(message) = session.recv().await {
        dispatcher.handle_message(message).await;
    }

    if sessions.unregister(id).await {
        info!("Bridge disconnected: {}", addr);
    }
}
