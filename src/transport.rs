//! Transport abstraction and connection lifecycle state.
//!
//! A [`Transport`] is one established, bidirectional text-frame channel. A
//! [`Connector`] knows how to produce a fresh transport for a URL, which is
//! what lets [`GameLinkClient::connect`](crate::client::GameLinkClient::connect)
//! start a new connection cycle after a previous one ended.
//!
//! # Implementing a Custom Transport
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use gamelink_client::error::GameLinkError;
//! use gamelink_client::transport::{Connector, Transport};
//!
//! struct MyTransport { /* ... */ }
//!
//! #[async_trait]
//! impl Transport for MyTransport {
//!     async fn send(&mut self, frame: String) -> Result<(), GameLinkError> {
//!         // Write one complete JSON text frame.
//!         Ok(())
//!     }
//!
//!     async fn recv(&mut self) -> Option<Result<String, GameLinkError>> {
//!         // Yield one complete JSON text frame, None on clean close.
//!         None
//!     }
//!
//!     async fn close(&mut self, reason: Option<String>) -> Result<(), GameLinkError> {
//!         Ok(())
//!     }
//! }
//!
//! struct MyConnector;
//!
//! #[async_trait]
//! impl Connector for MyConnector {
//!     async fn connect(&self, url: &str) -> Result<Box<dyn Transport>, GameLinkError> {
//!         Ok(Box::new(MyTransport {}))
//!     }
//! }
//! ```

use std::sync::atomic::{AtomicU8, Ordering};

use async_trait::async_trait;

use crate::error::GameLinkError;

/// A bidirectional text frame transport.
///
/// Each call to [`send`](Transport::send) transmits one complete frame and
/// each call to [`recv`](Transport::recv) returns one complete frame. Any
/// reassembly of partial reads into whole frames happens inside the
/// implementation; callers never see a partial frame.
///
/// # Cancel Safety
///
/// [`recv`](Transport::recv) **MUST** be cancel-safe because the I/O loop
/// polls it inside `tokio::select!`. Cancelling it must not lose a frame that
/// was already complete.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Send one text frame.
    ///
    /// # Errors
    ///
    /// Returns [`GameLinkError::TransportSend`] or
    /// [`GameLinkError::TransportClosed`] if the frame could not be written.
    async fn send(&mut self, frame: String) -> Result<(), GameLinkError>;

    /// Receive the next complete text frame.
    ///
    /// Returns:
    /// - `Some(Ok(text))`: a complete frame
    /// - `Some(Err(e))`: the socket failed
    /// - `None`: the remote end closed the stream
    async fn recv(&mut self) -> Option<Result<String, GameLinkError>>;

    /// Close gracefully, passing `reason` to the peer where the transport
    /// supports it. Must be safe to call more than once.
    ///
    /// # Errors
    ///
    /// Returns an error if the close handshake fails. Resources are released
    /// regardless.
    async fn close(&mut self, reason: Option<String>) -> Result<(), GameLinkError>;
}

/// Produces connected transports.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Open a new connection to `url`.
    ///
    /// # Errors
    ///
    /// Any error means the attempt failed; the client reports it as a
    /// disconnect and returns to [`ConnectionState::Disconnected`].
    async fn connect(&self, url: &str) -> Result<Box<dyn Transport>, GameLinkError>;
}

/// Lifecycle of one connection attempt.
///
/// Within one attempt the state only moves forward:
/// `Disconnected → Connecting → Open → Closing → Closed`, or
/// `Connecting → Disconnected` when the attempt fails. A new connect starts
/// over from `Disconnected` or `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ConnectionState {
    #[default]
    Disconnected = 0,
    Connecting = 1,
    Open = 2,
    Closing = 3,
    Closed = 4,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Connecting,
            2 => Self::Open,
            3 => Self::Closing,
            4 => Self::Closed,
            _ => Self::Disconnected,
        }
    }

    /// `true` while a connection is being established or is usable.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Connecting | Self::Open)
    }
}

/// Lock-free cell holding a [`ConnectionState`], shared between the client
/// handle, the outbound API and the I/O task.
#[derive(Debug, Default)]
pub(crate) struct ConnectionCell(AtomicU8);

impl ConnectionCell {
    pub(crate) fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn set(&self, state: ConnectionState) {
        self.0.store(state as u8, Ordering::Release);
    }

    /// Move to `Connecting` unless a connection is already active.
    /// Returns `false` (and changes nothing) if one is.
    pub(crate) fn try_begin_connect(&self) -> bool {
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                if ConnectionState::from_u8(current).is_active() {
                    None
                } else {
                    Some(ConnectionState::Connecting as u8)
                }
            })
            .is_ok()
    }

    /// Atomically move from `from` to `to`. Returns `false` if the current
    /// state was not `from`.
    pub(crate) fn transition(&self, from: ConnectionState, to: ConnectionState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn is_open(&self) -> bool {
        self.get() == ConnectionState::Open
    }
}
