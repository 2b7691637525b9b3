//! WebSocket transport implementation using `tokio-tungstenite`.
//!
//! This module provides [`WebSocketTransport`], a [`Transport`] over a
//! WebSocket connection, and [`WebSocketConnector`], the default
//! [`Connector`] used by [`GameLinkClient::new`](crate::client::GameLinkClient::new).
//! Both `ws://` and `wss://` URLs are supported.
//!
//! # Framing
//!
//! A text message split across continuation frames is buffered by tungstenite
//! and surfaced by [`recv`](Transport::recv) only once the final fragment has
//! arrived, concatenated in arrival order. A message that is still incomplete
//! when the transport is dropped is discarded.
//!
//! # Feature gate
//!
//! Only available with the `transport-websocket` feature (on by default).

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, Message};

use crate::error::GameLinkError;
use crate::transport::{Connector, Transport};

/// Type alias for the underlying WebSocket stream.
pub type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// A [`Transport`] backed by a WebSocket connection.
///
/// # Cancel Safety
///
/// [`recv`](Transport::recv) is cancel-safe: dropping its future before it
/// completes does not consume a message.
#[derive(Debug)]
pub struct WebSocketTransport {
    stream: WsStream,
    closed: bool,
}

impl WebSocketTransport {
    /// Establish a new WebSocket connection to the given URL.
    ///
    /// # Errors
    ///
    /// Returns [`GameLinkError::Io`] if the URL is invalid or the connection
    /// cannot be established. The underlying I/O [`ErrorKind`](std::io::ErrorKind)
    /// is preserved when there is one.
    pub async fn connect(url: &str) -> Result<Self, GameLinkError> {
        tracing::debug!(url = %url, "connecting to WebSocket server");

        let (stream, _response) = tokio_tungstenite::connect_async(url).await.map_err(|e| {
            let kind = match &e {
                tokio_tungstenite::tungstenite::Error::Io(io) => io.kind(),
                _ => std::io::ErrorKind::Other,
            };
            GameLinkError::Io(std::io::Error::new(kind, e))
        })?;

        tracing::info!(url = %url, "WebSocket connection established");

        Ok(Self::from_stream(stream))
    }

    /// Wrap an already-established stream (custom TLS, proxies, headers).
    pub fn from_stream(stream: WsStream) -> Self {
        Self {
            stream,
            closed: false,
        }
    }

    /// Like [`connect`](Self::connect) but fails with
    /// [`GameLinkError::Timeout`] if the handshake does not finish in time.
    ///
    /// # Errors
    ///
    /// Returns [`GameLinkError::Timeout`] if the deadline elapses, or any
    /// error that [`connect`](Self::connect) may return.
    pub async fn connect_with_timeout(url: &str, timeout: Duration) -> Result<Self, GameLinkError> {
        tokio::time::timeout(timeout, Self::connect(url))
            .await
            .map_err(|_| GameLinkError::Timeout)?
    }
}

impl WebSocketTransport {
    /// Map a tungstenite error, remembering when the socket is gone for good.
    fn fail(
        &mut self,
        error: tokio_tungstenite::tungstenite::Error,
        wrap: fn(String) -> GameLinkError,
    ) -> GameLinkError {
        use tokio_tungstenite::tungstenite::Error as WsError;
        match error {
            WsError::ConnectionClosed | WsError::AlreadyClosed => {
                self.closed = true;
                GameLinkError::TransportClosed
            }
            other => wrap(other.to_string()),
        }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&mut self, frame: String) -> Result<(), GameLinkError> {
        if self.closed {
            return Err(GameLinkError::TransportClosed);
        }
        tracing::trace!(len = frame.len(), "writing text frame");
        let result = self.stream.send(Message::Text(frame.into())).await;
        result.map_err(|e| self.fail(e, GameLinkError::TransportSend))
    }

    async fn recv(&mut self) -> Option<Result<String, GameLinkError>> {
        if self.closed {
            return None;
        }
        while let Some(next) = self.stream.next().await {
            let msg = match next {
                Ok(msg) => msg,
                Err(e) => {
                    return match self.fail(e, GameLinkError::TransportReceive) {
                        GameLinkError::TransportClosed => None,
                        other => Some(Err(other)),
                    };
                }
            };
            match msg {
                Message::Text(text) => {
                    tracing::trace!(len = text.len(), "read text frame");
                    return Some(Ok(text.to_string()));
                }
                Message::Close(frame) => {
                    self.closed = true;
                    match frame {
                        Some(frame) => tracing::debug!(
                            code = u16::from(frame.code),
                            reason = frame.reason.as_str(),
                            "server closed the WebSocket"
                        ),
                        None => tracing::debug!("server closed the WebSocket without a reason"),
                    }
                    return None;
                }
                // tungstenite answers pings itself.
                Message::Ping(_) | Message::Pong(_) => {}
                Message::Binary(data) => {
                    tracing::warn!(len = data.len(), "binary WebSocket frame ignored, protocol is text only");
                }
                Message::Frame(_) => {}
            }
        }
        self.closed = true;
        None
    }

    async fn close(&mut self, reason: Option<String>) -> Result<(), GameLinkError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let frame = reason.map(|reason| CloseFrame {
            code: CloseCode::Normal,
            reason: reason.into(),
        });
        self.stream
            .close(frame)
            .await
            .map_err(|e| GameLinkError::TransportSend(e.to_string()))
    }
}

/// Default [`Connector`]: opens a [`WebSocketTransport`], optionally bounded
/// by a connect timeout.
#[derive(Debug, Clone, Default)]
pub struct WebSocketConnector {
    connect_timeout: Option<Duration>,
}

impl WebSocketConnector {
    /// A connector without a connect timeout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Abort connection attempts that take longer than `timeout`.
    /// A zero duration disables the limit.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn Transport>, GameLinkError> {
        let transport = match self.connect_timeout {
            Some(timeout) => WebSocketTransport::connect_with_timeout(url, timeout).await?,
            None => WebSocketTransport::connect(url).await?,
        };
        Ok(Box::new(transport))
    }
}

#[cfg(test)]
#[cfg(feature = "transport-websocket")]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn websocket_transport_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<WebSocketTransport>();
    }

    #[tokio::test]
    async fn connect_fails_with_invalid_url() {
        let err = WebSocketTransport::connect("not-a-valid-url").await.unwrap_err();
        assert!(matches!(err, GameLinkError::Io(_)));
    }

    #[tokio::test]
    async fn connect_fails_with_unreachable_host() {
        let err = WebSocketTransport::connect("ws://127.0.0.1:1").await.unwrap_err();
        assert!(matches!(err, GameLinkError::Io(_)));
    }

    #[tokio::test]
    async fn connect_with_timeout_times_out() {
        // TEST-NET-1 is non-routable, so the handshake never completes.
        let err = WebSocketTransport::connect_with_timeout(
            "ws://192.0.2.1:1",
            Duration::from_millis(50),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, GameLinkError::Timeout));
    }

    /// Start a local WebSocket server that runs `handler` on the accepted
    /// connection and returns the address to connect to.
    async fn start_mock_server<F, Fut>(handler: F) -> String
    where
        F: FnOnce(tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>) -> Fut
            + Send
            + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            handler(ws).await;
        });

        format!("ws://{addr}")
    }

    #[tokio::test]
    async fn recv_yields_frames_in_arrival_order() {
        let url = start_mock_server(|mut ws| async move {
            ws.send(Message::Text(r#"{"Type":"EnemyDamage","Data":{}}"#.into()))
                .await
                .unwrap();
            ws.send(Message::Text(r#"{"Type":"EnemyDeath","Data":{}}"#.into()))
                .await
                .unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        assert!(transport.recv().await.unwrap().unwrap().contains("EnemyDamage"));
        assert!(transport.recv().await.unwrap().unwrap().contains("EnemyDeath"));
        assert!(transport.recv().await.is_none());
    }

    #[tokio::test]
    async fn recv_reassembles_fragmented_text_message() {
        use tokio_tungstenite::tungstenite::protocol::frame::coding::{Data, OpCode};
        use tokio_tungstenite::tungstenite::protocol::frame::Frame;

        let url = start_mock_server(|mut ws| async move {
            let first = Frame::message(
                br#"{"Type":"ChatMessage","#.to_vec(),
                OpCode::Data(Data::Text),
                false,
            );
            let last = Frame::message(
                br#""Data":{"SenderId":"p1","Message":"hi"}}"#.to_vec(),
                OpCode::Data(Data::Continue),
                true,
            );
            ws.send(Message::Frame(first)).await.unwrap();
            ws.send(Message::Frame(last)).await.unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        let text = transport.recv().await.unwrap().unwrap();
        assert_eq!(
            text,
            r#"{"Type":"ChatMessage","Data":{"SenderId":"p1","Message":"hi"}}"#
        );
    }

    #[tokio::test]
    async fn recv_skips_binary_frames() {
        let url = start_mock_server(|mut ws| async move {
            ws.send(Message::Binary(vec![0xDE, 0xAD].into()))
                .await
                .unwrap();
            ws.send(Message::Text("after_binary".into())).await.unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        assert_eq!(transport.recv().await.unwrap().unwrap(), "after_binary");
    }

    #[tokio::test]
    async fn close_sends_reason_to_peer() {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let url = start_mock_server(|mut ws| async move {
            while let Some(Ok(msg)) = ws.next().await {
                if let Message::Close(Some(frame)) = msg {
                    let _ = tx.send(frame.reason.to_string());
                    break;
                }
            }
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        transport.close(Some("leaving".into())).await.unwrap();
        assert_eq!(rx.await.unwrap(), "leaving");
    }

    #[tokio::test]
    async fn send_after_close_returns_transport_closed() {
        let url =
            start_mock_server(|mut ws| async move { while let Some(Ok(_)) = ws.next().await {} })
                .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        transport.close(None).await.unwrap();
        // Second close is a no-op.
        transport.close(None).await.unwrap();

        let err = transport.send("oops".to_string()).await.unwrap_err();
        assert!(matches!(err, GameLinkError::TransportClosed));
    }

    #[tokio::test]
    async fn server_close_ends_the_transport() {
        let url = start_mock_server(|mut ws| async move {
            ws.close(Some(CloseFrame {
                code: CloseCode::Away,
                reason: "restarting".into(),
            }))
            .await
            .unwrap();
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        assert!(transport.recv().await.is_none());
        assert!(transport.recv().await.is_none());
        let err = transport.send("late".to_string()).await.unwrap_err();
        assert!(matches!(err, GameLinkError::TransportClosed));
    }

    #[tokio::test]
    async fn connector_produces_working_transport() {
        let url = start_mock_server(|mut ws| async move {
            if let Some(Ok(Message::Text(text))) = ws.next().await {
                ws.send(Message::Text(text)).await.unwrap();
            }
            ws.close(None).await.unwrap();
        })
        .await;

        let connector = WebSocketConnector::new().with_connect_timeout(Duration::from_secs(5));
        let mut transport = connector.connect(&url).await.unwrap();
        transport.send("echo".into()).await.unwrap();
        assert_eq!(transport.recv().await.unwrap().unwrap(), "echo");
    }
}
