//! The client service object.
//!
//! [`GameLinkClient`] owns every piece of the layer: the connector, the
//! router, the scheduler queue, the consumer-side state (event bus, session
//! machine, timers) and the background connection task. Construct it once at
//! start-up, call [`tick`](GameLinkClient::tick) once per frame from the game
//! loop, and tear it down with [`disconnect`](GameLinkClient::disconnect) or
//! by dropping it.
//!
//! # Example
//!
//! ```rust,no_run
//! use gamelink_client::{GameLinkClient, GameLinkConfig};
//! use gamelink_client::event::{AuthEvent, ConnectionEvent};
//! use gamelink_client::protocol::ChatMessage;
//!
//! # async fn run() {
//! let mut client = GameLinkClient::new(GameLinkConfig::new("ws://127.0.0.1:8080/game"));
//!
//! client.subscribe(|event: &ConnectionEvent| {
//!     println!("{event:?}");
//!     Ok(())
//! });
//! client.subscribe(|chat: &ChatMessage| {
//!     println!("{}: {}", chat.sender_name, chat.message);
//!     Ok(())
//! });
//!
//! client.login("alice", "hunter2");
//! client.connect();
//!
//! loop {
//!     client.tick();
//!     tokio::time::sleep(std::time::Duration::from_millis(16)).await;
//! #   break;
//! }
//!
//! client.disconnect("quit").await;
//! # }
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, trace, warn};

use crate::error::{GameLinkError, Result};
use crate::event_bus::{EventBus, HandlerResult, SubscriptionId};
use crate::heartbeat::{Liveness, ReconnectPolicy};
use crate::outbound::{Link, Outbound, OutboundFrame};
use crate::router::{Dispatch, Router};
use crate::scheduler::{DrainReport, Scheduler, SchedulerHandle};
use crate::session::{AuthState, Credentials, Session};
use crate::transport::{ConnectionState, Connector, Transport};

/// Default heartbeat interval.
const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);

/// Default wait before an automatic reconnect attempt.
const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// Default limit on a single connection attempt.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for the graceful disconnect.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// A drain cycle running more actions than this logs a backlog warning.
const BACKLOG_WARN_THRESHOLD: usize = 1024;

// ── Configuration ───────────────────────────────────────────────────

/// Configuration for a [`GameLinkClient`].
///
/// The only required field is the server URL.
///
/// ```
/// use gamelink_client::client::GameLinkConfig;
/// use gamelink_client::heartbeat::ReconnectPolicy;
/// use std::time::Duration;
///
/// let config = GameLinkConfig::new("ws://127.0.0.1:8080/game")
///     .with_heartbeat_interval(Duration::from_secs(2))
///     .with_reconnect_policy(ReconnectPolicy::Bounded { max_attempts: 5 })
///     .with_reconnect_delay(Duration::from_millis(500));
/// assert_eq!(config.heartbeat_interval, Duration::from_secs(2));
/// ```
#[derive(Debug, Clone)]
pub struct GameLinkConfig {
    /// Server URL used by [`GameLinkClient::connect`].
    pub url: String,
    /// Interval between heartbeats while connected. Defaults to **5 seconds**;
    /// zero disables the heartbeat.
    pub heartbeat_interval: Duration,
    /// What to do after an unrequested disconnect. Defaults to
    /// [`ReconnectPolicy::Disabled`].
    pub reconnect_policy: ReconnectPolicy,
    /// Wait before each automatic reconnect attempt. Defaults to **3 seconds**.
    pub reconnect_delay: Duration,
    /// Limit on a single connection attempt. Defaults to **10 seconds**; zero
    /// waits indefinitely.
    pub connect_timeout: Duration,
    /// Time the connection task gets to close the transport on
    /// [`GameLinkClient::disconnect`] before it is aborted. Defaults to
    /// **1 second**; zero aborts immediately.
    pub shutdown_timeout: Duration,
    /// Runtime to spawn the connection task on. When `None` the runtime of
    /// the calling context is used, so `connect` must then be called from
    /// within a tokio runtime.
    pub runtime: Option<tokio::runtime::Handle>,
}

impl GameLinkConfig {
    /// Configuration for `url` with every other setting at its default.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            reconnect_policy: ReconnectPolicy::default(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            runtime: None,
        }
    }

    /// Set the heartbeat interval; zero disables it.
    #[must_use]
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Choose what happens after an unrequested disconnect.
    #[must_use]
    pub fn with_reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect_policy = policy;
        self
    }

    /// Set the wait before each automatic reconnect attempt.
    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Bound a single connection attempt; zero waits indefinitely.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set how long `disconnect` waits for a graceful close.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Spawn the connection task on `runtime`. Lets a game loop that runs
    /// outside any tokio context drive the client.
    #[must_use]
    pub fn with_runtime(mut self, runtime: tokio::runtime::Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }
}

// ── Client ──────────────────────────────────────────────────────────

struct IoTask {
    task: tokio::task::JoinHandle<()>,
    shutdown_tx: Option<oneshot::Sender<String>>,
}

/// Service object owning the transport, router, scheduler and session.
///
/// Not `Send`: subscribers registered on it may hold consumer-thread state,
/// and they only ever run inside [`tick`](Self::tick) on the thread that owns
/// the client. The connection task it spawns runs wherever the runtime
/// schedules it and reaches this thread only through the scheduler queue.
pub struct GameLinkClient {
    config: GameLinkConfig,
    connector: Arc<dyn Connector>,
    link: Arc<Link>,
    router: Arc<Router>,
    scheduler: Scheduler<Dispatch>,
    dispatch: Dispatch,
    io: Option<IoTask>,
    current_url: Option<String>,
}

impl GameLinkClient {
    /// Client using the built-in WebSocket connector.
    #[cfg(feature = "transport-websocket")]
    pub fn new(config: GameLinkConfig) -> Self {
        Self::with_connector(config, crate::transports::WebSocketConnector::new())
    }

    /// Client using a custom [`Connector`].
    pub fn with_connector(config: GameLinkConfig, connector: impl Connector) -> Self {
        let link = Arc::new(Link::default());
        let outbound = Outbound::new(Arc::clone(&link));
        let liveness = Liveness::new(
            config.heartbeat_interval,
            config.reconnect_policy,
            config.reconnect_delay,
        );
        Self {
            connector: Arc::new(connector),
            router: Arc::new(Router::new()),
            scheduler: Scheduler::new(),
            dispatch: Dispatch::new(outbound, liveness),
            link,
            io: None,
            current_url: None,
            config,
        }
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &GameLinkConfig {
        &self.config
    }

    // ── Connection lifecycle ────────────────────────────────────────

    /// Connect to the configured URL. See [`connect_to`](Self::connect_to).
    pub fn connect(&mut self) -> bool {
        let url = self.config.url.clone();
        self.connect_to(url)
    }

    /// Start connecting to `url` in the background.
    ///
    /// Returns `false` without doing anything if a connection is already
    /// being established or is open. A failed attempt is reported as a
    /// [`ConnectionEvent::Disconnected`](crate::event::ConnectionEvent) on a
    /// later tick; it never surfaces as an error here.
    pub fn connect_to(&mut self, url: impl Into<String>) -> bool {
        let url = url.into();
        let runtime = match self.config.runtime.clone() {
            Some(handle) => handle,
            None => match tokio::runtime::Handle::try_current() {
                Ok(handle) => handle,
                Err(e) => {
                    error!(%url, "cannot connect outside a tokio runtime: {e}");
                    return false;
                }
            },
        };

        if !self.link.state.try_begin_connect() {
            debug!(state = ?self.link.connection_state(), "connect ignored, connection already active");
            return false;
        }

        if let Some(previous) = self.io.take() {
            previous.task.abort();
        }

        self.dispatch.liveness.reconnect.resume();
        let epoch = self.dispatch.begin_attempt();

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        self.link.install_sender(cmd_tx);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        info!(%url, "connecting");
        let task = runtime.spawn(io_loop(
            IoLoop {
                connector: Arc::clone(&self.connector),
                link: Arc::clone(&self.link),
                router: Arc::clone(&self.router),
                scheduler: self.scheduler.handle(),
                url: url.clone(),
                connect_timeout: self.config.connect_timeout,
                epoch,
            },
            cmd_rx,
            shutdown_rx,
        ));

        self.io = Some(IoTask {
            task,
            shutdown_tx: Some(shutdown_tx),
        });
        self.current_url = Some(url);
        true
    }

    /// Close the connection with `reason`, waiting up to the configured
    /// shutdown timeout for a graceful close before aborting.
    ///
    /// Cancels any pending automatic reconnect. Safe to call when already
    /// disconnected. The matching `Disconnected` event is delivered on the
    /// next tick.
    pub async fn disconnect(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        self.dispatch.liveness.reconnect.suppress();

        let Some(mut io) = self.io.take() else {
            debug!("disconnect: no connection task");
            return;
        };
        if io.task.is_finished() {
            debug!("disconnect: connection already ended");
            return;
        }

        debug!(%reason, "disconnect requested");
        if let Some(tx) = io.shutdown_tx.take() {
            let _ = tx.send(reason.clone());
        }

        match tokio::time::timeout(self.config.shutdown_timeout, &mut io.task).await {
            Ok(Ok(())) => {}
            Ok(Err(join_err)) => {
                warn!("connection task terminated with join error: {join_err}");
                self.abandon_connection(reason);
            }
            Err(_) => {
                warn!("connection task did not exit within timeout; aborting task");
                io.task.abort();
                if let Err(join_err) = io.task.await {
                    debug!("connection task aborted: {join_err}");
                }
                self.abandon_connection(reason);
            }
        }
    }

    /// Stand in for a connection task that ended without reporting.
    fn abandon_connection(&self, reason: String) {
        end_connection(
            &self.link,
            &self.scheduler.handle(),
            self.dispatch.epoch,
            ConnectionState::Closed,
            Some(reason),
        );
    }

    /// `true` while the connection is open.
    pub fn is_connected(&self) -> bool {
        self.link.state.is_open()
    }

    /// Current state of the connection lifecycle.
    pub fn connection_state(&self) -> ConnectionState {
        self.link.connection_state()
    }

    /// URL of the current or most recent connection attempt.
    pub fn current_url(&self) -> Option<&str> {
        self.current_url.as_deref()
    }

    // ── Per-frame driving ───────────────────────────────────────────

    /// [`tick_at`](Self::tick_at) with the current time.
    pub fn tick(&mut self) -> DrainReport {
        self.tick_at(Instant::now())
    }

    /// Run one consumer cycle at `now`: deliver every queued message and
    /// lifecycle event, send a heartbeat if one is due, and start a
    /// scheduled reconnect attempt.
    ///
    /// Call exactly once per frame from the thread that owns the client.
    pub fn tick_at(&mut self, now: Instant) -> DrainReport {
        self.dispatch.now = now;
        let report = self.scheduler.drain(&mut self.dispatch);
        if report.executed > BACKLOG_WARN_THRESHOLD {
            warn!(executed = report.executed, "large inbound backlog drained in one tick");
        }

        if self.link.state.is_open() && self.dispatch.liveness.heartbeat.poll(now) {
            trace!("sending heartbeat");
            self.dispatch.outbound.heartbeat().detach();
        }

        if self.dispatch.liveness.reconnect.poll(now) {
            if let Some(url) = self.current_url.clone() {
                info!(
                    %url,
                    attempt = self.dispatch.liveness.reconnect.attempts(),
                    "reconnecting"
                );
                self.connect_to(url);
            }
        }

        report
    }

    /// Actions waiting for the next tick.
    pub fn pending_actions(&self) -> usize {
        self.scheduler.pending()
    }

    // ── Events ──────────────────────────────────────────────────────

    /// The event bus handlers are registered on.
    pub fn events(&self) -> &EventBus {
        self.dispatch.bus()
    }

    /// Mutable event bus, for subscribing and unsubscribing.
    pub fn events_mut(&mut self) -> &mut EventBus {
        self.dispatch.bus_mut()
    }

    /// Shorthand for `events_mut().subscribe(handler)`.
    pub fn subscribe<E, F>(&mut self, handler: F) -> SubscriptionId
    where
        E: 'static,
        F: FnMut(&E) -> HandlerResult + 'static,
    {
        self.dispatch.bus.subscribe(handler)
    }

    /// Remove a handler. Returns `false` if `id` was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.dispatch.bus.unsubscribe(id)
    }

    // ── Outbound & session ──────────────────────────────────────────

    /// Handle for sending messages. Clone it freely, including into other
    /// threads.
    pub fn outbound(&self) -> &Outbound {
        &self.dispatch.outbound
    }

    /// The authenticated session, if the handshake has completed.
    pub fn session(&self) -> Option<&Session> {
        self.dispatch.session.session()
    }

    /// Current state of the authentication handshake.
    pub fn auth_state(&self) -> AuthState {
        self.dispatch.session.state()
    }

    /// Log in with a username and password. Sent immediately if the
    /// connection is confirmed and not yet authenticated; otherwise staged
    /// for the next `ConnectionConfirmed`.
    pub fn login(&mut self, username: impl Into<String>, password: impl Into<String>) {
        let Dispatch {
            bus,
            session,
            outbound,
            ..
        } = &mut self.dispatch;
        if let Err(e) = session.login(Credentials::new(username, password), outbound, bus) {
            error!("login event handler failed: {e}");
        }
    }

    /// Provide (or clear) a persisted session token to resume with on the
    /// next `ConnectionConfirmed`.
    pub fn set_cached_token(&mut self, token: Option<String>) {
        self.dispatch.session.set_cached_token(token);
    }
}

impl std::fmt::Debug for GameLinkClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameLinkClient")
            .field("url", &self.current_url)
            .field("state", &self.connection_state())
            .field("auth", &self.auth_state())
            .field("pending", &self.pending_actions())
            .field("has_task", &self.io.is_some())
            .finish()
    }
}

impl Drop for GameLinkClient {
    fn drop(&mut self) {
        // No executor to drive a graceful close from a synchronous drop.
        if let Some(io) = self.io.take() {
            io.task.abort();
            self.link.clear_sender();
            self.link.state.set(ConnectionState::Closed);
        }
    }
}

// ── Connection task ─────────────────────────────────────────────────

struct IoLoop {
    connector: Arc<dyn Connector>,
    link: Arc<Link>,
    router: Arc<Router>,
    scheduler: SchedulerHandle<Dispatch>,
    url: String,
    connect_timeout: Duration,
    epoch: u64,
}

async fn connect_with_timeout(
    connector: &dyn Connector,
    url: &str,
    timeout: Duration,
) -> Result<Box<dyn Transport>> {
    if timeout.is_zero() {
        return connector.connect(url).await;
    }
    match tokio::time::timeout(timeout, connector.connect(url)).await {
        Ok(result) => result,
        Err(_) => Err(GameLinkError::Timeout),
    }
}

/// Record the end of a connection and queue exactly one `Disconnected`.
fn end_connection(
    link: &Link,
    scheduler: &SchedulerHandle<Dispatch>,
    epoch: u64,
    state: ConnectionState,
    reason: Option<String>,
) {
    // The sender goes first: once the state leaves Connecting/Open a new
    // connection may install its own.
    link.clear_sender();
    link.state.set(state);
    scheduler.enqueue_fn(move |ctx: &mut Dispatch| ctx.on_disconnected(epoch, reason));
}

/// One connection attempt: connect, then multiplex outbound frames, the
/// disconnect signal and inbound frames with `tokio::select!`.
///
/// Exits when:
/// - The connection attempt fails or is cancelled
/// - The client asks to disconnect
/// - The transport returns `None` (server closed the connection)
/// - A transport error occurs
async fn io_loop(
    io: IoLoop,
    mut cmd_rx: mpsc::UnboundedReceiver<OutboundFrame>,
    mut shutdown_rx: oneshot::Receiver<String>,
) {
    let IoLoop {
        connector,
        link,
        router,
        scheduler,
        url,
        connect_timeout,
        epoch,
    } = io;
    debug!(%url, "connection task started");

    let attempt = tokio::select! {
        result = connect_with_timeout(connector.as_ref(), &url, connect_timeout) => result,
        reason = &mut shutdown_rx => {
            let reason = reason.unwrap_or_else(|_| "connect cancelled".to_owned());
            debug!(%url, %reason, "connection attempt cancelled");
            end_connection(&link, &scheduler, epoch, ConnectionState::Disconnected, Some(reason));
            return;
        }
    };

    let mut transport = match attempt {
        Ok(transport) => transport,
        Err(e) => {
            warn!(%url, error = %e, "connection attempt failed");
            end_connection(
                &link,
                &scheduler,
                epoch,
                ConnectionState::Disconnected,
                Some(format!("connection failed: {e}")),
            );
            return;
        }
    };

    if !link.state.transition(ConnectionState::Connecting, ConnectionState::Open) {
        debug!(%url, "connection no longer wanted, closing");
        let _ = transport.close(None).await;
        return;
    }
    info!(%url, "connected");
    scheduler.enqueue_fn(move |ctx: &mut Dispatch| ctx.on_connected(epoch, url));

    loop {
        tokio::select! {
            // Outbound frame from an `Outbound` handle
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(frame) => {
                        trace!(message_type = %frame.message_type, "writing frame");
                        match transport.send(frame.text).await {
                            Ok(()) => {
                                let _ = frame.ack.send(Ok(()));
                            }
                            Err(e) => {
                                error!(message_type = %frame.message_type, "transport send error: {e}");
                                let reason = format!("transport send error: {e}");
                                let _ = frame.ack.send(Err(e));
                                end_connection(&link, &scheduler, epoch, ConnectionState::Closed, Some(reason));
                                break;
                            }
                        }
                    }
                    // Sender cleared: the client is gone.
                    None => {
                        debug!("command channel closed, shutting down connection task");
                        link.state.set(ConnectionState::Closing);
                        let _ = transport.close(Some("client shut down".into())).await;
                        end_connection(&link, &scheduler, epoch, ConnectionState::Closed, Some("client shut down".into()));
                        break;
                    }
                }
            }

            // Disconnect requested
            reason = &mut shutdown_rx => {
                let reason = reason.unwrap_or_else(|_| "client shut down".to_owned());
                debug!(%reason, "closing connection");
                link.state.set(ConnectionState::Closing);
                if let Err(e) = transport.close(Some(reason.clone())).await {
                    debug!("transport close error: {e}");
                }
                end_connection(&link, &scheduler, epoch, ConnectionState::Closed, Some(reason));
                break;
            }

            // Inbound frame from the server
            incoming = transport.recv() => {
                match incoming {
                    Some(Ok(text)) => {
                        router.dispatch(&text, &scheduler);
                    }
                    Some(Err(e)) => {
                        error!("transport receive error: {e}");
                        end_connection(
                            &link,
                            &scheduler,
                            epoch,
                            ConnectionState::Closed,
                            Some(format!("transport receive error: {e}")),
                        );
                        break;
                    }
                    None => {
                        info!("connection closed by server");
                        end_connection(&link, &scheduler, epoch, ConnectionState::Closed, None);
                        break;
                    }
                }
            }
        }
    }

    debug!("connection task exited");
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::event::{AuthEvent, ConnectionEvent};
    use async_trait::async_trait;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    // ── Mocks ───────────────────────────────────────────────────────

    /// Records sent frames and replays scripted inbound frames.
    struct MockTransport {
        incoming: VecDeque<Option<Result<String>>>,
        sent: Arc<StdMutex<Vec<String>>>,
        closed: Arc<StdMutex<Option<Option<String>>>>,
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(&mut self, frame: String) -> Result<()> {
            self.sent.lock().unwrap().push(frame);
            Ok(())
        }

        async fn recv(&mut self) -> Option<Result<String>> {
            match self.incoming.pop_front() {
                Some(item) => item,
                None => std::future::pending().await,
            }
        }

        async fn close(&mut self, reason: Option<String>) -> Result<()> {
            *self.closed.lock().unwrap() = Some(reason);
            Ok(())
        }
    }

    /// Hands out one scripted transport per connection attempt.
    #[derive(Default)]
    struct MockConnector {
        script: StdMutex<VecDeque<Result<Box<dyn Transport>>>>,
        attempts: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Connector for MockConnector {
        async fn connect(&self, _url: &str) -> Result<Box<dyn Transport>> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(GameLinkError::Connection("refused".into())))
        }
    }

    struct Harness {
        client: GameLinkClient,
        sent: Arc<StdMutex<Vec<String>>>,
        closed: Arc<StdMutex<Option<Option<String>>>>,
        attempts: Arc<AtomicUsize>,
    }

    fn harness(config: GameLinkConfig, incoming: Vec<Option<Result<String>>>) -> Harness {
        let sent = Arc::new(StdMutex::new(Vec::new()));
        let closed = Arc::new(StdMutex::new(None));
        let connector = MockConnector::default();
        connector.script.lock().unwrap().push_back(Ok(Box::new(MockTransport {
            incoming: incoming.into(),
            sent: Arc::clone(&sent),
            closed: Arc::clone(&closed),
        })));
        let attempts = Arc::clone(&connector.attempts);
        Harness {
            client: GameLinkClient::with_connector(config, connector),
            sent,
            closed,
            attempts,
        }
    }

    fn config() -> GameLinkConfig {
        GameLinkConfig::new("ws://test")
    }

    fn record_connection_events(client: &mut GameLinkClient) -> Rc<RefCell<Vec<ConnectionEvent>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        client.subscribe(move |e: &ConnectionEvent| {
            sink.borrow_mut().push(e.clone());
            Ok(())
        });
        seen
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    // ── Config ──────────────────────────────────────────────────────

    #[test]
    fn config_defaults() {
        let config = config();
        assert_eq!(config.url, "ws://test");
        assert_eq!(config.heartbeat_interval, Duration::from_secs(5));
        assert_eq!(config.reconnect_policy, ReconnectPolicy::Disabled);
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(1));
        assert!(config.runtime.is_none());
    }

    #[test]
    fn config_builder_methods() {
        let config = config()
            .with_heartbeat_interval(Duration::ZERO)
            .with_reconnect_policy(ReconnectPolicy::Bounded { max_attempts: 3 })
            .with_reconnect_delay(Duration::from_millis(250))
            .with_connect_timeout(Duration::from_secs(2))
            .with_shutdown_timeout(Duration::from_millis(50));
        assert_eq!(config.heartbeat_interval, Duration::ZERO);
        assert_eq!(config.reconnect_policy, ReconnectPolicy::Bounded { max_attempts: 3 });
        assert_eq!(config.reconnect_delay, Duration::from_millis(250));
        assert_eq!(config.connect_timeout, Duration::from_secs(2));
        assert_eq!(config.shutdown_timeout, Duration::from_millis(50));
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    #[test]
    fn connect_outside_runtime_is_refused() {
        let mut h = harness(config(), vec![]);
        assert!(!h.client.connect());
        assert_eq!(h.client.connection_state(), ConnectionState::Disconnected);
        assert_eq!(h.attempts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn connected_event_arrives_on_tick() {
        let mut h = harness(config(), vec![]);
        let events = record_connection_events(&mut h.client);

        assert!(h.client.connect());
        assert_eq!(h.client.auth_state(), AuthState::Connecting);
        settle().await;

        assert!(h.client.is_connected());
        assert!(events.borrow().is_empty(), "events wait for the tick");
        h.client.tick();
        assert_eq!(
            *events.borrow(),
            vec![ConnectionEvent::Connected {
                url: "ws://test".into()
            }]
        );
    }

    #[tokio::test]
    async fn connect_is_idempotent_while_active() {
        let mut h = harness(config(), vec![]);
        assert!(h.client.connect());
        assert!(!h.client.connect());
        settle().await;
        assert!(!h.client.connect());
        assert_eq!(h.attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_connect_reports_disconnected() {
        let mut client = GameLinkClient::with_connector(config(), MockConnector::default());
        let events = record_connection_events(&mut client);

        client.connect();
        settle().await;
        client.tick();

        assert_eq!(client.connection_state(), ConnectionState::Disconnected);
        let events = events.borrow();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            ConnectionEvent::Disconnected { reason: Some(r) } if r.contains("refused")
        ));
    }

    #[tokio::test]
    async fn server_close_reports_disconnected_once() {
        let mut h = harness(config(), vec![None]);
        let events = record_connection_events(&mut h.client);

        h.client.connect();
        settle().await;
        h.client.tick();
        h.client.tick();

        assert_eq!(h.client.connection_state(), ConnectionState::Closed);
        assert_eq!(
            *events.borrow(),
            vec![
                ConnectionEvent::Connected {
                    url: "ws://test".into()
                },
                ConnectionEvent::Disconnected { reason: None },
            ]
        );
    }

    #[tokio::test]
    async fn receive_error_reports_disconnected() {
        let mut h = harness(
            config(),
            vec![Some(Err(GameLinkError::TransportReceive("reset".into())))],
        );
        let events = record_connection_events(&mut h.client);
        h.client.connect();
        settle().await;
        h.client.tick();

        let events = events.borrow();
        assert!(matches!(
            events.last(),
            Some(ConnectionEvent::Disconnected { reason: Some(r) }) if r.contains("reset")
        ));
    }

    #[tokio::test]
    async fn disconnect_closes_with_reason() {
        let mut h = harness(config(), vec![]);
        let events = record_connection_events(&mut h.client);
        h.client.connect();
        settle().await;

        h.client.disconnect("player quit").await;
        h.client.tick();

        assert_eq!(*h.closed.lock().unwrap(), Some(Some("player quit".into())));
        assert_eq!(h.client.connection_state(), ConnectionState::Closed);
        assert_eq!(
            events.borrow().last(),
            Some(&ConnectionEvent::Disconnected {
                reason: Some("player quit".into())
            })
        );
    }

    #[tokio::test]
    async fn double_disconnect_is_harmless() {
        let mut h = harness(config(), vec![]);
        h.client.connect();
        settle().await;
        h.client.disconnect("first").await;
        h.client.disconnect("second").await;
        assert!(!h.client.is_connected());
    }

    /// Transport whose `close()` never completes.
    struct HangingCloseTransport {
        close_called: Arc<AtomicBool>,
        dropped: Arc<AtomicBool>,
    }

    impl Drop for HangingCloseTransport {
        fn drop(&mut self) {
            self.dropped.store(true, Ordering::Release);
        }
    }

    #[async_trait]
    impl Transport for HangingCloseTransport {
        async fn send(&mut self, _frame: String) -> Result<()> {
            Ok(())
        }

        async fn recv(&mut self) -> Option<Result<String>> {
            std::future::pending().await
        }

        async fn close(&mut self, _reason: Option<String>) -> Result<()> {
            self.close_called.store(true, Ordering::Release);
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn shutdown_timeout_aborts_stuck_transport_task() {
        let close_called = Arc::new(AtomicBool::new(false));
        let dropped = Arc::new(AtomicBool::new(false));
        let connector = MockConnector::default();
        connector.script.lock().unwrap().push_back(Ok(Box::new(HangingCloseTransport {
            close_called: Arc::clone(&close_called),
            dropped: Arc::clone(&dropped),
        })));
        let mut client = GameLinkClient::with_connector(
            config().with_shutdown_timeout(Duration::from_millis(20)),
            connector,
        );
        let events = record_connection_events(&mut client);

        client.connect();
        settle().await;
        client.disconnect("bye").await;
        client.tick();

        assert!(close_called.load(Ordering::Acquire));
        assert!(dropped.load(Ordering::Acquire));
        assert_eq!(client.connection_state(), ConnectionState::Closed);
        let disconnects = events
            .borrow()
            .iter()
            .filter(|e| matches!(e, ConnectionEvent::Disconnected { .. }))
            .count();
        assert_eq!(disconnects, 1);
    }

    #[tokio::test]
    async fn drop_aborts_connection_task() {
        let mut h = harness(config(), vec![]);
        h.client.connect();
        settle().await;
        let outbound = h.client.outbound().clone();
        drop(h.client);
        assert!(!outbound.is_connected());
        assert!(matches!(outbound.heartbeat().await, Err(GameLinkError::NotConnected)));
    }

    // ── Tick-driven behavior ────────────────────────────────────────

    #[tokio::test]
    async fn heartbeat_sent_once_per_interval() {
        let mut h = harness(config(), vec![]);
        h.client.connect();
        settle().await;

        let t0 = Instant::now();
        h.client.tick_at(t0);
        h.client.tick_at(t0 + Duration::from_secs(4));
        settle().await;
        assert!(h.sent.lock().unwrap().is_empty());

        h.client.tick_at(t0 + Duration::from_secs(5));
        h.client.tick_at(t0 + Duration::from_millis(5_500));
        settle().await;
        assert_eq!(
            *h.sent.lock().unwrap(),
            vec![r#"{"Type":"Heartbeat","Data":{}}"#.to_owned()]
        );
    }

    #[tokio::test]
    async fn zero_interval_disables_heartbeat() {
        let mut h = harness(config().with_heartbeat_interval(Duration::ZERO), vec![]);
        h.client.connect();
        settle().await;
        let t0 = Instant::now();
        h.client.tick_at(t0);
        h.client.tick_at(t0 + Duration::from_secs(60));
        settle().await;
        assert!(h.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn bounded_policy_reconnects_after_drop() {
        let mut h = harness(
            config()
                .with_reconnect_policy(ReconnectPolicy::Bounded { max_attempts: 2 })
                .with_reconnect_delay(Duration::from_secs(1)),
            vec![None],
        );
        h.client.connect();
        settle().await;

        let t0 = Instant::now();
        h.client.tick_at(t0);
        assert_eq!(h.attempts.load(Ordering::SeqCst), 1);

        h.client.tick_at(t0 + Duration::from_secs(1));
        settle().await;
        assert_eq!(h.attempts.load(Ordering::SeqCst), 2);

        // Second attempt is refused by the connector; one retry left.
        h.client.tick_at(t0 + Duration::from_secs(2));
        h.client.tick_at(t0 + Duration::from_secs(3));
        settle().await;
        assert_eq!(h.attempts.load(Ordering::SeqCst), 3);

        // Budget exhausted.
        h.client.tick_at(t0 + Duration::from_secs(4));
        h.client.tick_at(t0 + Duration::from_secs(10));
        settle().await;
        assert_eq!(h.attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn requested_disconnect_does_not_reconnect() {
        let mut h = harness(
            config().with_reconnect_policy(ReconnectPolicy::Bounded { max_attempts: 5 }),
            vec![],
        );
        h.client.connect();
        settle().await;
        h.client.disconnect("quit").await;

        let t0 = Instant::now();
        h.client.tick_at(t0);
        h.client.tick_at(t0 + Duration::from_secs(60));
        settle().await;
        assert_eq!(h.attempts.load(Ordering::SeqCst), 1);
    }

    // ── Session ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn staged_login_is_sent_on_confirmation() {
        let confirmed = r#"{"Type":"ConnectionConfirmed","Data":{"ConnectionId":"c-1"}}"#;
        let accepted = r#"{"Type":"LoginResponse","Data":{"Success":true,"PlayerId":"p1","PlayerName":"Alice"}}"#;
        let mut h = harness(config(), vec![Some(Ok(confirmed.into()))]);
        let auth = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&auth);
        h.client.subscribe(move |e: &AuthEvent| {
            sink.borrow_mut().push(e.clone());
            Ok(())
        });

        h.client.login("alice", "pw");
        h.client.connect();
        settle().await;
        h.client.tick();
        settle().await;

        assert_eq!(h.client.auth_state(), AuthState::Authenticating);
        let sent = h.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].starts_with(r#"{"Type":"Login""#), "{}", sent[0]);

        // Feed the response through the router as the connection task would.
        let handle = h.client.scheduler.handle();
        assert!(h.client.router.dispatch(accepted, &handle));
        h.client.tick();

        assert_eq!(h.client.auth_state(), AuthState::Authenticated);
        assert_eq!(h.client.session().unwrap().player_id, "p1");
        assert!(matches!(auth.borrow().last(), Some(AuthEvent::Authenticated(_))));
    }

    #[tokio::test]
    async fn debug_impl_for_client() {
        let h = harness(config(), vec![]);
        let debug = format!("{:?}", h.client);
        assert!(debug.contains("GameLinkClient"));
        assert!(debug.contains("Disconnected"));
    }
}
