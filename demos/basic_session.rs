//! # Basic Session Example
//!
//! Demonstrates a complete GameLink client lifecycle:
//!
//! 1. Subscribe to lifecycle and gameplay events
//! 2. Stage credentials and connect via WebSocket
//! 3. Drive delivery from a fixed-rate "game loop" by calling `tick()`
//! 4. Send a chat message once authenticated
//! 5. Shut down gracefully on Ctrl+C
//!
//! ## Running
//!
//! ```sh
//! # Start a game server on localhost:8080, then:
//! cargo run --example basic_session
//!
//! # Override the server URL or credentials:
//! GAMELINK_URL=ws://my-server:8080/game GAMELINK_USER=bob cargo run --example basic_session
//! ```

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use gamelink_client::protocol::{ChatMessage, EnemyDeath, PlayerJoined, SystemNotification};
use gamelink_client::{
    AuthEvent, ConnectionEvent, GameLinkClient, GameLinkConfig, ReconnectPolicy,
};

/// Default server URL when `GAMELINK_URL` is not set.
const DEFAULT_URL: &str = "ws://localhost:8080/game";

/// Roughly 30 frames per second.
const FRAME: Duration = Duration::from_millis(33);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Logging ─────────────────────────────────────────────────────
    // Set `RUST_LOG=debug` for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // ── Configuration ───────────────────────────────────────────────
    let url = std::env::var("GAMELINK_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
    let username = std::env::var("GAMELINK_USER").unwrap_or_else(|_| "alice".to_string());
    let password = std::env::var("GAMELINK_PASSWORD").unwrap_or_else(|_| "secret".to_string());

    let config = GameLinkConfig::new(url)
        .with_heartbeat_interval(Duration::from_secs(5))
        .with_reconnect_policy(ReconnectPolicy::Bounded { max_attempts: 5 });
    let mut client = GameLinkClient::new(config);

    // ── Subscriptions ───────────────────────────────────────────────
    // Handlers run inside `tick()`, on this thread, in arrival order.
    let authenticated = Rc::new(RefCell::new(false));

    client.subscribe(|event: &ConnectionEvent| {
        match event {
            ConnectionEvent::Connected { url } => tracing::info!("Connected to {url}"),
            ConnectionEvent::Disconnected { reason } => tracing::info!(
                "Disconnected: {}",
                reason.as_deref().unwrap_or("no reason given")
            ),
        }
        Ok(())
    });

    let flag = Rc::clone(&authenticated);
    client.subscribe(move |event: &AuthEvent| {
        match event {
            AuthEvent::Authenticated(session) => {
                tracing::info!("Logged in as player {}", session.player_id);
                *flag.borrow_mut() = true;
            }
            AuthEvent::AuthFailed { reason } => tracing::warn!("Login failed: {reason}"),
            AuthEvent::LoginRequired => tracing::info!("Server wants credentials"),
        }
        Ok(())
    });

    client.subscribe(|joined: &PlayerJoined| {
        tracing::info!("{} joined", joined.player_name);
        Ok(())
    });
    client.subscribe(|chat: &ChatMessage| {
        tracing::info!("[{:?}] {}: {}", chat.channel_type, chat.sender_name, chat.message);
        Ok(())
    });
    client.subscribe(|death: &EnemyDeath| {
        tracing::info!("Enemy {} died (+{} xp)", death.enemy_id, death.experience_reward);
        Ok(())
    });
    client.subscribe(|note: &SystemNotification| {
        tracing::info!("System: {}", note.message);
        Ok(())
    });

    // ── Connect ─────────────────────────────────────────────────────
    // Credentials are staged and sent once the server confirms the
    // connection.
    client.login(username, password);
    if !client.connect() {
        return Err("connect() was refused".into());
    }

    // ── Game loop ───────────────────────────────────────────────────
    let mut greeted = false;
    let mut frame = tokio::time::interval(FRAME);
    loop {
        tokio::select! {
            _ = frame.tick() => {
                let report = client.tick();
                if report.failed > 0 {
                    tracing::debug!("{} queued action(s) failed this frame", report.failed);
                }

                if *authenticated.borrow() && !greeted {
                    greeted = true;
                    if let Some(session) = client.session() {
                        let hello = ChatMessage {
                            sender_id: session.player_id.clone(),
                            sender_name: session.player_name.clone().unwrap_or_default(),
                            message: "hello from Rust".into(),
                            channel_type: Default::default(),
                            target_id: None,
                            timestamp: 0.0,
                        };
                        // Fire and forget.
                        client.outbound().send_chat(&hello).detach();
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received, shutting down");
                break;
            }
        }
    }

    // ── Clean shutdown ──────────────────────────────────────────────
    client.disconnect("client exiting").await;
    // Deliver the final Disconnected event.
    client.tick();
    Ok(())
}
