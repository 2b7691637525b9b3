//! # GameLink Client
//!
//! Client-side transport and message dispatch for a tagged-JSON multiplayer
//! game protocol.
//!
//! Every frame on the wire is `{ "Type": "<tag>", "Data": { ... } }`. The
//! crate decodes inbound frames off the game loop, queues their delivery and
//! hands them to subscribers only when the game loop calls
//! [`GameLinkClient::tick`], so all subscriber code runs on one thread in
//! arrival order.
//!
//! ## Features
//!
//! - **Transport-agnostic**: implement [`Transport`] and [`Connector`] for any
//!   backend
//! - **WebSocket built-in**: the default `transport-websocket` feature
//!   provides `WebSocketTransport` and `WebSocketConnector`
//! - **Typed events**: subscribe to any payload type (or the lifecycle events
//!   in [`event`]) on the [`EventBus`]
//! - **Failure-tolerant**: malformed frames, failing subscribers and dead
//!   connections are logged and recovered from, never propagated as panics
//!
//! ## Layout
//!
//! | Module         | Role                                              |
//! |----------------|---------------------------------------------------|
//! | [`protocol`]   | payload structs, [`MessageType`] tags             |
//! | [`envelope`]   | two-phase envelope codec                          |
//! | [`transport`]  | transport/connector traits, connection state      |
//! | [`scheduler`]  | I/O → game-loop hand-off queue                    |
//! | [`event_bus`]  | typed publish/subscribe                           |
//! | [`router`]     | tag → decode → queued delivery                    |
//! | [`session`]    | authentication handshake                          |
//! | [`outbound`]   | typed send API                                    |
//! | [`heartbeat`]  | heartbeat and reconnect timers                    |
//! | `client`       | the [`GameLinkClient`] service object             |

pub mod envelope;
pub mod error;
pub mod event;
pub mod event_bus;
pub mod heartbeat;
pub mod outbound;
pub mod protocol;
pub mod router;
pub mod scheduler;
pub mod session;
pub mod transport;
pub mod transports;

#[cfg(feature = "tokio-runtime")]
pub mod client;

// Re-export primary types for ergonomic imports.
#[cfg(feature = "tokio-runtime")]
pub use client::{GameLinkClient, GameLinkConfig};
pub use envelope::Envelope;
pub use error::{GameLinkError, Result};
pub use event::{AuthEvent, ConnectionEvent};
pub use event_bus::{EventBus, SubscriptionId};
pub use heartbeat::ReconnectPolicy;
pub use outbound::{Outbound, SendReceipt};
pub use protocol::{Message, MessageType, Vec3};
pub use scheduler::DrainReport;
pub use session::{AuthState, Session};
pub use transport::{ConnectionState, Connector, Transport};

#[cfg(feature = "transport-websocket")]
pub use transports::{WebSocketConnector, WebSocketTransport};
