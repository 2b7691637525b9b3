//! Authentication handshake state machine.
//!
//! ```text
//! Anonymous ─connect─▶ Connecting ─ConnectionConfirmed─▶ ConnectionConfirmed
//!                                                         │
//!            ┌──────── staged credentials → Login ────────┤
//!            │  ┌───── cached token → SessionValidation ──┤
//!            ▼  ▼                                         └─ neither → AwaitingCredentials
//!       Authenticating ─LoginResponse(ok)─▶ Authenticated        (LoginRequired published;
//!            │                                                     login() resumes)
//!            └─LoginResponse(fail)─▶ Anonymous (AuthFailed published, staged credentials cleared)
//! ```
//!
//! The server answers both `Login` and `SessionValidation` with `LoginResponse`.
//! Credentials and tokens are supplied from outside (login UI, persisted
//! storage); this module never persists anything.

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::event::AuthEvent;
use crate::event_bus::EventBus;
use crate::outbound::Outbound;
use crate::protocol::{ConnectionConfirmed, EntityId, LoginResponse};

/// Handshake progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthState {
    #[default]
    Anonymous,
    Connecting,
    ConnectionConfirmed,
    /// Sub-state of `ConnectionConfirmed`: nothing to authenticate with yet.
    AwaitingCredentials,
    Authenticating,
    Authenticated,
}

/// Authenticated identity, held for the lifetime of the connection.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub connection_id: String,
    pub player_id: EntityId,
    pub player_name: Option<String>,
    /// Token to resume with on a later connection, if the server issued one.
    pub session_token: Option<String>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("connection_id", &self.connection_id)
            .field("player_id", &self.player_id)
            .field("player_name", &self.player_name)
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Username/password pair staged for the next `Login`.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Credentials for a username and password login.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AuthMethod {
    Credentials,
    Token,
}

/// Drives the handshake. Lives on the consumer thread.
#[derive(Debug, Default)]
pub struct SessionMachine {
    state: AuthState,
    connection_id: Option<String>,
    staged: Option<Credentials>,
    cached_token: Option<String>,
    in_flight: Option<AuthMethod>,
    session: Option<Session>,
}

impl SessionMachine {
    /// A machine in `Anonymous` with nothing staged.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current handshake state.
    pub fn state(&self) -> AuthState {
        self.state
    }

    /// The authenticated session, if any.
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Connection id assigned by the server for the current connection.
    pub fn connection_id(&self) -> Option<&str> {
        self.connection_id.as_deref()
    }

    /// `true` once a `LoginResponse` has been accepted.
    pub fn is_authenticated(&self) -> bool {
        self.state == AuthState::Authenticated
    }

    /// `true` while credentials wait for the next handshake.
    pub fn has_staged_credentials(&self) -> bool {
        self.staged.is_some()
    }

    /// Token that will be tried when no credentials are staged.
    pub fn cached_token(&self) -> Option<&str> {
        self.cached_token.as_deref()
    }

    /// Stage credentials for the next handshake without sending anything.
    pub fn stage_credentials(&mut self, credentials: Credentials) {
        self.staged = Some(credentials);
    }

    /// Supply (or clear) a token persisted from an earlier session.
    pub fn set_cached_token(&mut self, token: Option<String>) {
        self.cached_token = token.filter(|t| !t.is_empty());
    }

    /// A new connection attempt has started.
    pub fn begin_connect(&mut self) {
        self.state = AuthState::Connecting;
        self.connection_id = None;
        self.in_flight = None;
        self.session = None;
    }

    /// The connection ended. Staged credentials and the cached token are
    /// kept so the next connection can authenticate without prompting.
    pub fn reset(&mut self) {
        self.state = AuthState::Anonymous;
        self.connection_id = None;
        self.in_flight = None;
        self.session = None;
    }

    /// Stage `credentials` and, if the connection is already confirmed and
    /// not authenticated, send `Login` right away.
    ///
    /// # Errors
    ///
    /// Propagates subscriber failures from the bus.
    pub fn login(
        &mut self,
        credentials: Credentials,
        outbound: &Outbound,
        bus: &mut EventBus,
    ) -> Result<()> {
        self.staged = Some(credentials);
        let ready = self.connection_id.is_some()
            && matches!(
                self.state,
                AuthState::Anonymous | AuthState::ConnectionConfirmed | AuthState::AwaitingCredentials
            );
        if ready {
            self.authenticate(outbound, bus)
        } else {
            debug!(state = ?self.state, "credentials staged for next connection");
            Ok(())
        }
    }

    /// Handle `ConnectionConfirmed`: record the connection id and start
    /// authenticating with whatever is staged.
    ///
    /// # Errors
    ///
    /// Propagates subscriber failures from the bus.
    pub fn on_connection_confirmed(
        &mut self,
        msg: &ConnectionConfirmed,
        outbound: &Outbound,
        bus: &mut EventBus,
    ) -> Result<()> {
        debug!(connection_id = %msg.connection_id, "connection confirmed");
        self.connection_id = Some(msg.connection_id.clone());
        self.state = AuthState::ConnectionConfirmed;
        self.authenticate(outbound, bus)
    }

    fn authenticate(&mut self, outbound: &Outbound, bus: &mut EventBus) -> Result<()> {
        if let Some(credentials) = &self.staged {
            debug!(username = %credentials.username, "sending Login");
            outbound
                .login(credentials.username.clone(), credentials.password.clone())
                .detach();
            self.state = AuthState::Authenticating;
            self.in_flight = Some(AuthMethod::Credentials);
            Ok(())
        } else if let Some(token) = &self.cached_token {
            debug!("sending SessionValidation with cached token");
            outbound.validate_session(token.clone()).detach();
            self.state = AuthState::Authenticating;
            self.in_flight = Some(AuthMethod::Token);
            Ok(())
        } else {
            info!("no credentials or session token available, awaiting login");
            self.state = AuthState::AwaitingCredentials;
            bus.publish(&AuthEvent::LoginRequired).map(drop)
        }
    }

    /// Handle `LoginResponse`.
    ///
    /// # Errors
    ///
    /// Propagates subscriber failures from the bus.
    pub fn on_login_response(&mut self, msg: &LoginResponse, bus: &mut EventBus) -> Result<()> {
        if self.state != AuthState::Authenticating {
            warn!(state = ?self.state, "ignoring LoginResponse outside of authentication");
            return Ok(());
        }
        let method = self.in_flight.take();

        let accepted = match (&msg.player_id, msg.success) {
            (Some(player_id), true) => Some(player_id.clone()),
            (None, true) => {
                warn!("LoginResponse reported success without a PlayerId");
                None
            }
            (_, false) => None,
        };

        match accepted {
            Some(player_id) => {
                let session_token = msg.session_token.clone().or_else(|| {
                    (method == Some(AuthMethod::Token))
                        .then(|| self.cached_token.clone())
                        .flatten()
                });
                let session = Session {
                    connection_id: self.connection_id.clone().unwrap_or_default(),
                    player_id,
                    player_name: msg.player_name.clone(),
                    session_token: session_token.clone(),
                };
                info!(player_id = %session.player_id, "authenticated");
                self.state = AuthState::Authenticated;
                self.staged = None;
                self.cached_token = session_token;
                self.session = Some(session.clone());
                bus.publish(&AuthEvent::Authenticated(session)).map(drop)
            }
            None => {
                let reason = msg
                    .message
                    .clone()
                    .unwrap_or_else(|| "authentication failed".to_owned());
                info!(%reason, "authentication rejected");
                self.state = AuthState::Anonymous;
                self.staged = None;
                if method == Some(AuthMethod::Token) {
                    self.cached_token = None;
                }
                bus.publish(&AuthEvent::AuthFailed { reason }).map(drop)
            }
        }
    }
}
