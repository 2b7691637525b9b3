//! Events synthesized by the client rather than received from the server.
//!
//! Both are published on the [`EventBus`](crate::event_bus::EventBus) like
//! any message payload, and therefore only ever observed on the consumer
//! thread during a drain.

use crate::session::Session;

/// Transport lifecycle. Exactly one is published per state transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The socket is open.
    Connected {
        /// URL the connection was made to.
        url: String,
    },
    /// The connection attempt failed, the server closed the stream, the
    /// socket errored, or the client disconnected.
    Disconnected {
        /// Human-readable cause, if known.
        reason: Option<String>,
    },
}

/// Outcome of the authentication handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    /// The server accepted the credentials or cached token.
    Authenticated(Session),
    /// The server rejected the credentials or token.
    AuthFailed {
        /// Reason supplied by the server.
        reason: String,
    },
    /// The connection is confirmed but no credentials or token are staged.
    /// Prompt the user, then call
    /// [`GameLinkClient::login`](crate::client::GameLinkClient::login).
    LoginRequired,
}
