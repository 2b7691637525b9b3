#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Shared test utilities for GameLink client integration tests.
//!
//! Provides a channel-based [`MockTransport`] driven through a [`MockServer`]
//! handle, a [`MockConnector`] that hands those transports to the client, a
//! tracing layer that counts warnings, and helpers for building frames.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use gamelink_client::envelope::encode_envelope;
use gamelink_client::protocol::{ChatMessage, ChannelType, ConnectionConfirmed, LoginResponse, Message};
use gamelink_client::{Connector, GameLinkClient, GameLinkConfig, GameLinkError, Transport};
use tokio::sync::mpsc;

type Inbound = Option<Result<String, GameLinkError>>;

// ── MockTransport ───────────────────────────────────────────────────

/// Transport whose inbound side is fed by a [`MockServer`].
///
/// Everything the client sends is recorded; `recv()` waits for the server
/// handle to push a frame, a close (`None`) or an error.
pub struct MockTransport {
    inbound: mpsc::UnboundedReceiver<Inbound>,
    sent: Arc<StdMutex<Vec<String>>>,
    closed: Arc<StdMutex<Option<Option<String>>>>,
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, frame: String) -> Result<(), GameLinkError> {
        self.sent.lock().unwrap().push(frame);
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String, GameLinkError>> {
        match self.inbound.recv().await {
            Some(item) => item,
            // Server handle dropped: stay open until the client closes.
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self, reason: Option<String>) -> Result<(), GameLinkError> {
        *self.closed.lock().unwrap() = Some(reason);
        Ok(())
    }
}

/// Test-side handle to one [`MockTransport`].
#[derive(Clone)]
pub struct MockServer {
    inbound: mpsc::UnboundedSender<Inbound>,
    sent: Arc<StdMutex<Vec<String>>>,
    closed: Arc<StdMutex<Option<Option<String>>>>,
}

impl MockServer {
    /// Deliver one text frame to the client.
    pub fn push(&self, frame: impl Into<String>) {
        let _ = self.inbound.send(Some(Ok(frame.into())));
    }

    /// End the stream as a server close would.
    pub fn hang_up(&self) {
        let _ = self.inbound.send(None);
    }

    /// Fail the next receive.
    pub fn fail(&self, error: GameLinkError) {
        let _ = self.inbound.send(Some(Err(error)));
    }

    /// Frames written by the client so far.
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    /// Frames written by the client with the given `Type` tag.
    pub fn sent_of_type(&self, tag: &str) -> Vec<serde_json::Value> {
        self.sent()
            .iter()
            .map(|text| serde_json::from_str::<serde_json::Value>(text).unwrap())
            .filter(|frame| frame["Type"] == tag)
            .collect()
    }

    /// `Some(reason)` once the client has closed the transport.
    pub fn closed_with(&self) -> Option<Option<String>> {
        self.closed.lock().unwrap().clone()
    }
}

/// Create a connected transport/server pair.
pub fn mock_pair() -> (MockTransport, MockServer) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sent = Arc::new(StdMutex::new(Vec::new()));
    let closed = Arc::new(StdMutex::new(None));
    (
        MockTransport {
            inbound: rx,
            sent: Arc::clone(&sent),
            closed: Arc::clone(&closed),
        },
        MockServer {
            inbound: tx,
            sent,
            closed,
        },
    )
}

// ── MockConnector ───────────────────────────────────────────────────

/// Connector handing out scripted outcomes, one per attempt. Attempts beyond
/// the script are refused.
#[derive(Default)]
pub struct MockConnector {
    script: StdMutex<VecDeque<Result<MockTransport, GameLinkError>>>,
    pub attempts: Arc<AtomicUsize>,
    pub urls: Arc<StdMutex<Vec<String>>>,
}

impl MockConnector {
    /// Queue a successful attempt and return its server handle.
    pub fn accept(&self) -> MockServer {
        let (transport, server) = mock_pair();
        self.script.lock().unwrap().push_back(Ok(transport));
        server
    }

    /// Queue a failing attempt.
    pub fn refuse(&self, error: GameLinkError) {
        self.script.lock().unwrap().push_back(Err(error));
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn Transport>, GameLinkError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().unwrap().push(url.to_owned());
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Ok(transport)) => Ok(Box::new(transport)),
            Some(Err(e)) => Err(e),
            None => Err(GameLinkError::Connection("connection refused".into())),
        }
    }
}

/// A client wired to a [`MockConnector`] with one accepted connection queued.
pub fn mock_client(config: GameLinkConfig) -> (GameLinkClient, MockServer, Arc<AtomicUsize>) {
    let connector = MockConnector::default();
    let server = connector.accept();
    let attempts = Arc::clone(&connector.attempts);
    (GameLinkClient::with_connector(config, connector), server, attempts)
}

pub fn test_config() -> GameLinkConfig {
    GameLinkConfig::new("ws://mock.local/game")
}

/// Let the connection task catch up with what the test just did.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}

// ── Warning counter ─────────────────────────────────────────────────

/// `tracing` layer counting `WARN` events.
#[derive(Clone, Default)]
pub struct WarnCounter(pub Arc<AtomicUsize>);

impl WarnCounter {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for WarnCounter {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        if *event.metadata().level() == tracing::Level::WARN {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}

// ── JSON helper functions ───────────────────────────────────────────

/// Encode any payload as a full envelope frame.
pub fn frame<M: Message>(payload: &M) -> String {
    encode_envelope(payload).expect("frame serialization")
}

pub fn connection_confirmed_json(connection_id: &str) -> String {
    frame(&ConnectionConfirmed {
        connection_id: connection_id.into(),
        server_time: None,
    })
}

pub fn login_accepted_json(player_id: &str, token: Option<&str>) -> String {
    frame(&LoginResponse {
        success: true,
        player_id: Some(player_id.into()),
        player_name: Some("Alice".into()),
        session_token: token.map(Into::into),
        message: None,
    })
}

pub fn login_rejected_json(reason: &str) -> String {
    frame(&LoginResponse {
        success: false,
        player_id: None,
        player_name: None,
        session_token: None,
        message: Some(reason.into()),
    })
}

pub fn chat_json(sender_id: &str, message: &str) -> String {
    frame(&ChatMessage {
        sender_id: sender_id.into(),
        sender_name: format!("{sender_id}-name"),
        message: message.into(),
        channel_type: ChannelType::Global,
        target_id: None,
        timestamp: 0.0,
    })
}
