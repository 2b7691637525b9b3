//! # Custom Transport Example
//!
//! Shows how to implement the [`Transport`] and [`Connector`] traits with a
//! simple in-process loopback channel. This is useful for:
//!
//! - **Testing**: exercise your game logic without a real server
//! - **Custom backends**: adapt any I/O layer (TCP, QUIC, WebRTC data channels)
//!
//! ## Running
//!
//! ```sh
//! cargo run --example custom_transport
//! ```

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use gamelink_client::envelope::encode_envelope;
use gamelink_client::protocol::{ConnectionConfirmed, LoginResponse, PlayerJoined, Vec3};
use gamelink_client::{
    AuthEvent, Connector, GameLinkClient, GameLinkConfig, GameLinkError, Transport,
};
use tokio::sync::mpsc;

// ─────────────────────────────────────────────────────────────────────
// Step 1: Define a channel-based "loopback" transport
// ─────────────────────────────────────────────────────────────────────

/// A loopback transport that shuttles frames through in-process channels.
///
/// - The **client half** (`LoopbackTransport`) implements [`Transport`] and
///   is handed out by [`LoopbackConnector`].
/// - The **server half** (`LoopbackServer`) lets you inject frames and read
///   what the client sent.
pub struct LoopbackTransport {
    /// Frames the client sends go here.
    tx: mpsc::UnboundedSender<String>,
    /// Frames the server sends arrive here.
    rx: mpsc::UnboundedReceiver<String>,
}

/// The "server side" of the loopback.
pub struct LoopbackServer {
    pub rx: mpsc::UnboundedReceiver<String>,
    pub tx: mpsc::UnboundedSender<String>,
}

fn loopback_pair() -> (LoopbackTransport, LoopbackServer) {
    let (client_tx, server_rx) = mpsc::unbounded_channel();
    let (server_tx, client_rx) = mpsc::unbounded_channel();
    (
        LoopbackTransport {
            tx: client_tx,
            rx: client_rx,
        },
        LoopbackServer {
            rx: server_rx,
            tx: server_tx,
        },
    )
}

// ─────────────────────────────────────────────────────────────────────
// Step 2: Implement Transport and Connector
// ─────────────────────────────────────────────────────────────────────

#[async_trait]
impl Transport for LoopbackTransport {
    async fn send(&mut self, frame: String) -> Result<(), GameLinkError> {
        self.tx
            .send(frame)
            .map_err(|e| GameLinkError::TransportSend(e.to_string()))
    }

    /// `None` once the server half is dropped. Cancel-safe because
    /// `UnboundedReceiver::recv` is.
    async fn recv(&mut self) -> Option<Result<String, GameLinkError>> {
        self.rx.recv().await.map(Ok)
    }

    async fn close(&mut self, reason: Option<String>) -> Result<(), GameLinkError> {
        tracing::info!("Loopback closed: {}", reason.as_deref().unwrap_or("-"));
        Ok(())
    }
}

/// Hands out one pre-built transport; later attempts are refused.
struct LoopbackConnector {
    transport: Mutex<Option<LoopbackTransport>>,
}

#[async_trait]
impl Connector for LoopbackConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn Transport>, GameLinkError> {
        let transport = self
            .transport
            .lock()
            .map_err(|_| GameLinkError::Connection("connector poisoned".into()))?
            .take();
        match transport {
            Some(transport) => {
                tracing::info!("Loopback connected for {url}");
                Ok(Box::new(transport))
            }
            None => Err(GameLinkError::Connection("loopback already used".into())),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────
// Step 3: Wire together the client and the fake server
// ─────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let (transport, mut server) = loopback_pair();
    let connector = LoopbackConnector {
        transport: Mutex::new(Some(transport)),
    };

    let mut client =
        GameLinkClient::with_connector(GameLinkConfig::new("loopback://local"), connector);
    client.subscribe(|event: &AuthEvent| {
        tracing::info!("Auth event: {event:?}");
        Ok(())
    });
    client.subscribe(|joined: &PlayerJoined| {
        tracing::info!("{} joined at {:?}", joined.player_name, joined.position);
        Ok(())
    });

    client.login("alice", "secret");
    if !client.connect() {
        return Err("connect() was refused".into());
    }

    // ── Fake server: confirm the connection and read the Login ──────
    server.tx.send(encode_envelope(&ConnectionConfirmed {
        connection_id: "loopback-1".into(),
        server_time: None,
    })?)?;

    // Login is only sent from tick(), once ConnectionConfirmed is delivered.
    let login = loop {
        client.tick();
        if let Ok(frame) = server.rx.try_recv() {
            break frame;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    };
    tracing::info!("Server received: {login}");

    server.tx.send(encode_envelope(&LoginResponse {
        success: true,
        player_id: Some("p-1".into()),
        player_name: Some("Alice".into()),
        session_token: Some("token-abc".into()),
        message: None,
    })?)?;
    server.tx.send(encode_envelope(&PlayerJoined {
        player_id: "p-2".into(),
        player_name: "Bob".into(),
        position: Vec3::new(4.0, 0.0, 4.0),
    })?)?;

    // ── A few frames of the game loop ───────────────────────────────
    for _ in 0..10 {
        client.tick();
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    tracing::info!("Authenticated: {}", client.session().is_some());

    // ── Clean shutdown ──────────────────────────────────────────────
    client.disconnect("demo finished").await;
    client.tick();
    Ok(())
}
