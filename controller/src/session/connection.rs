//! Individual bridge session handling

use anyhow::Result;
use docbridge_shared::{codec, Outbound, Task};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};
use tracing::{debug, warn};

type WsStream = WebSocketStream<TcpStream>;

/// Handle to send commands to the bridge
#[derive(Clone)]
pub struct SessionHandle {
    pub id: u64,
    pub addr: SocketAddr,
    writer: Arc<Mutex<SplitSink<WsStream, Message>>>,
    pub connected_at: Instant,
}

impl SessionHandle {
    /// Send a command envelope for this task
    pub async fn send(&self, task: &Task) -> Result<()> {
        let text = codec::encode_command(task)?;
        let mut writer = self.writer.lock().await;
        writer.send(Message::Text(text.into())).await?;
        Ok(())
    }

    /// Send a Close frame; errors are ignored
    pub async fn close(&self) {
        let mut writer = self.writer.lock().await;
        let _ = writer.close().await;
    }
}

/// Active bridge session
pub struct BridgeSession {
    pub handle: SessionHandle,
    reader: SplitStream<WsStream>,
}

impl BridgeSession {
    /// Complete the WebSocket handshake on an accepted TCP stream
    pub async fn accept(stream: TcpStream, addr: SocketAddr, id: u64) -> Result<Self> {
        let ws = accept_async(stream).await?;
        let (writer, reader) = ws.split();

        let handle = SessionHandle {
            id,
            addr,
            writer: Arc::new(Mutex::new(writer)),
            connected_at: Instant::now(),
        };
        Ok(Self { handle, reader })
    }

    /// Get a cloneable handle for sending commands
    pub fn get_handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Read the next response or event from the bridge.
    /// Returns None once the connection is closed.
    pub async fn recv(&mut self) -> Option<Outbound> {
        loop {
            let text = match self.reader.next().await? {
                Ok(Message::Text(text)) => text.to_string(),
                Ok(Message::Binary(data)) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => text,
                    Err(_) => {
                        warn!("Dropping non UTF-8 binary frame from {}", self.handle.addr);
                        continue;
                    }
                },
                Ok(Message::Close(_)) => return None,
                Ok(_) => continue,
                Err(e) => {
                    warn!("Read error from {}: {}", self.handle.addr, e);
                    return None;
                }
            };

            match codec::decode_outbound(&text) {
                Ok(message) => return Some(message),
                Err(e) => {
                    warn!("Decode error from {}: {}", self.handle.addr, e);
                    debug!("  Frame: {}", text);
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use tokio::net::TcpListener;
    use tokio_tungstenite::{connect_async, MaybeTlsStream};

    pub(crate) type BridgeSide = WebSocketStream<MaybeTlsStream<TcpStream>>;

    /// A session accepted on a loopback listener plus the bridge's end
    pub(crate) async fn loopback(id: u64) -> (BridgeSession, BridgeSide) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let accept = tokio::spawn(async move {
            let (stream, peer) = listener.accept().await.unwrap();
            BridgeSession::accept(stream, peer, id).await.unwrap()
        });
        let (bridge, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();
        (accept.await.unwrap(), bridge)
    }
}
