//! WebSocket transport client
//!
//! Owns one duplex channel to the controller. The stream is split so the
//! receive activity and the dispatch loop can read and write concurrently.

use async_trait::async_trait;
use docbridge_shared::{codec, Outbound};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, RwLock};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

use super::sink::MessageSink;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWriter = SplitSink<WsStream, Message>;
type WsReader = SplitStream<WsStream>;

/// Transport configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Controller host
    pub host: String,
    /// Controller port
    pub port: u16,
    /// WebSocket path on the controller
    pub path: String,
    /// Use `wss` instead of `ws`
    pub secure: bool,
    /// Bound on a single handshake
    pub connect_timeout_ms: u64,
    /// Fixed delay between reconnection attempts
    pub reconnect_delay_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        use docbridge_shared::defaults;

        Self {
            host: defaults::HOST.into(),
            port: defaults::PORT,
            path: defaults::PATH.into(),
            secure: false,
            connect_timeout_ms: defaults::CONNECT_TIMEOUT_MS,
            reconnect_delay_ms: defaults::RECONNECT_DELAY_MS,
        }
    }
}

impl TransportConfig {
    /// Build the endpoint URL
    pub fn endpoint(&self) -> Result<Url, url::ParseError> {
        let scheme = if self.secure { "wss" } else { "ws" };
        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };
        Url::parse(&format!("{}://{}:{}{}", scheme, self.host, self.port, path))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Result of a blocking receive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    /// One complete text message
    Message(String),
    /// The remote side closed the channel
    Closed,
    /// Transport failure
    Error(String),
}

/// Duplex message channel to a fixed endpoint
pub struct TransportClient {
    url: Url,
    connect_timeout: Duration,
    state: RwLock<ConnectionState>,
    writer: Mutex<Option<WsWriter>>,
    reader: Mutex<Option<WsReader>>,
}

impl TransportClient {
    /// Create a disconnected client for the given endpoint
    pub fn new(url: Url, connect_timeout: Duration) -> Self {
        Self {
            url,
            connect_timeout,
            state: RwLock::new(ConnectionState::Disconnected),
            writer: Mutex::new(None),
            reader: Mutex::new(None),
        }
    }

    /// Endpoint URL
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Current connection state
    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    pub async fn is_connected(&self) -> bool {
        self.state().await == ConnectionState::Connected
    }

    /// Attempt the WebSocket handshake once, bounded by the connect timeout.
    /// On failure the client is left `Disconnected`; retrying is up to the
    /// caller.
    pub async fn connect(&self) -> bool {
        *self.state.write().await = ConnectionState::Connecting;

        let stream = match timeout(self.connect_timeout, connect_async(self.url.as_str())).await {
            Ok(Ok((stream, _response))) => stream,
            Ok(Err(e)) => {
                debug!("[WS] Connect to {} failed: {}", self.url, e);
                *self.state.write().await = ConnectionState::Disconnected;
                return false;
            }
            Err(_) => {
                debug!(
                    "[WS] Connect to {} timed out after {:?}",
                    self.url, self.connect_timeout
                );
                *self.state.write().await = ConnectionState::Disconnected;
                return false;
            }
        };

        let (writer, reader) = stream.split();
        *self.writer.lock().await = Some(writer);
        *self.reader.lock().await = Some(reader);
        *self.state.write().await = ConnectionState::Connected;

        info!("[WS] Connected to {}", self.url);
        true
    }

    /// Send one text message. Fails without queueing when not connected.
    pub async fn send(&self, text: String) -> bool {
        if !self.is_connected().await {
            return false;
        }

        let mut writer_guard = self.writer.lock().await;
        let Some(writer) = writer_guard.as_mut() else {
            return false;
        };

        match writer.send(Message::Text(text.into())).await {
            Ok(()) => true,
            Err(e) => {
                warn!("[WS] Send failed: {}", e);
                // Reader half is released by receive()
                writer_guard.take();
                *self.state.write().await = ConnectionState::Disconnected;
                false
            }
        }
    }

    /// Block until one complete message arrives, the remote closes, or the
    /// transport fails. Fragmented messages are reassembled by the WebSocket
    /// layer, so a returned message is never partial.
    pub async fn receive(&self) -> Received {
        let mut reader_guard = self.reader.lock().await;
        let Some(reader) = reader_guard.as_mut() else {
            return Received::Error("not connected".into());
        };

        let outcome = loop {
            match reader.next().await {
                Some(Ok(Message::Text(text))) => return Received::Message(text.as_str().to_owned()),
                Some(Ok(Message::Binary(data))) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => return Received::Message(text),
                    Err(_) => warn!("[WS] Dropping non UTF-8 binary frame ({} bytes)", data.len()),
                },
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {}
                Some(Ok(Message::Close(_))) | None => {
                    info!("[WS] Connection closed by server");
                    break Received::Closed;
                }
                Some(Err(e)) => {
                    warn!("[WS] Receive failed: {}", e);
                    break Received::Error(e.to_string());
                }
            }
        };

        reader_guard.take();
        self.writer.lock().await.take();
        *self.state.write().await = ConnectionState::Disconnected;
        outcome
    }

    /// Close the channel. Must not be called while a `receive` is pending;
    /// cancel that future first.
    pub async fn close(&self) {
        if let Some(mut writer) = self.writer.lock().await.take() {
            let _ = writer.send(Message::Close(None)).await;
            let _ = writer.close().await;
        }
        self.reader.lock().await.take();
        *self.state.write().await = ConnectionState::Disconnected;
    }
}

#[async_trait]
impl MessageSink for TransportClient {
    async fn send_message(&self, message: &Outbound) -> bool {
        match codec::encode(message) {
            Ok(text) => self.send(text).await,
            Err(e) => {
                warn!("[WS] Failed to encode outbound message: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;
    use tokio_tungstenite::tungstenite::protocol::frame::coding::{Data, OpCode};
    use tokio_tungstenite::tungstenite::protocol::frame::Frame;

    async fn local_server() -> (TcpListener, Url) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let url = Url::parse(&format!("ws://{}/ws", addr)).unwrap();
        (listener, url)
    }

    #[test]
    fn test_default_config() {
        let config = TransportConfig::default();
        assert_eq!(config.reconnect_delay(), Duration::from_secs(2));
        assert_eq!(config.endpoint().unwrap().as_str(), "ws://localhost:8080/ws");
    }

    #[test]
    fn test_endpoint_normalizes_path() {
        let config = TransportConfig {
            host: "10.0.0.5".into(),
            port: 9001,
            path: "bridge".into(),
            secure: true,
            ..Default::default()
        };
        assert_eq!(config.endpoint().unwrap().as_str(), "wss://10.0.0.5:9001/bridge");
    }

    #[tokio::test]
    async fn test_connect_failure_leaves_disconnected() {
        let (listener, url) = local_server().await;
        drop(listener);

        let client = TransportClient::new(url, Duration::from_secs(2));
        assert!(!client.connect().await);
        assert_eq!(client.state().await, ConnectionState::Disconnected);
        assert!(!client.send("{}".into()).await);
    }

    #[tokio::test]
    async fn test_send_and_receive() {
        let (listener, url) = local_server().await;
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            ws.send(Message::Text(r#"{"action":"save","id":"1"}"#.to_string().into()))
                .await
                .unwrap();
            let reply = ws.next().await.unwrap().unwrap();
            ws.close(None).await.unwrap();
            reply.into_text().unwrap().as_str().to_owned()
        });

        let client = TransportClient::new(url, Duration::from_secs(2));
        assert!(client.connect().await);
        assert_eq!(client.state().await, ConnectionState::Connected);

        assert_eq!(
            client.receive().await,
            Received::Message(r#"{"action":"save","id":"1"}"#.into())
        );
        assert!(client.send_message(&Outbound::success("1")).await);

        assert_eq!(client.receive().await, Received::Closed);
        assert_eq!(client.state().await, ConnectionState::Disconnected);

        let reply = server.await.unwrap();
        assert!(reply.contains(r#""status":"success""#));
    }

    #[tokio::test]
    async fn test_fragmented_message_is_reassembled() {
        let (listener, url) = local_server().await;
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            let first = Frame::message(
                br#"{"action":"replace","id":"7","#.to_vec(),
                OpCode::Data(Data::Text),
                false,
            );
            let last = Frame::message(
                br#""payload":{"content":"abc"}}"#.to_vec(),
                OpCode::Data(Data::Continue),
                true,
            );
            ws.send(Message::Frame(first)).await.unwrap();
            ws.send(Message::Frame(last)).await.unwrap();
            // Keep the socket open until the client has read the message.
            let _ = ws.next().await;
        });

        let client = TransportClient::new(url, Duration::from_secs(2));
        assert!(client.connect().await);

        match client.receive().await {
            Received::Message(text) => {
                assert_eq!(text, r#"{"action":"replace","id":"7","payload":{"content":"abc"}}"#)
            }
            other => panic!("unexpected receive result: {:?}", other),
        }

        client.close().await;
        assert_eq!(client.state().await, ConnectionState::Disconnected);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_secure_endpoint_attempts_tls() {
        let _ = rustls::crypto::ring::default_provider().install_default();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            // Accept and hang up before any TLS handshake completes
            let (stream, _) = listener.accept().await.unwrap();
            drop(stream);
        });

        let config = TransportConfig {
            host: "127.0.0.1".into(),
            port,
            secure: true,
            ..Default::default()
        };
        let url = config.endpoint().unwrap();
        assert_eq!(url.scheme(), "wss");

        let err = connect_async(url.as_str()).await.unwrap_err();
        assert!(
            !matches!(
                err,
                tokio_tungstenite::tungstenite::Error::Url(
                    tokio_tungstenite::tungstenite::error::UrlError::TlsFeatureNotEnabled
                )
            ),
            "wss support not compiled in: {}",
            err
        );
        server.await.unwrap();
    }
}
