//! Tick-driven liveness: the periodic `Heartbeat` and the reconnect timer.
//!
//! Neither owns a clock. The client passes the tick's `Instant` in, which
//! keeps both deterministic under test.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

/// Sends at most one beat per poll while the connection is open.
#[derive(Debug, Clone)]
pub struct Heartbeat {
    interval: Option<Duration>,
    next_due: Option<Instant>,
}

impl Heartbeat {
    /// A zero `interval` disables the heartbeat.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: (!interval.is_zero()).then_some(interval),
            next_due: None,
        }
    }

    /// Configured interval, `None` when disabled.
    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// `true` while a beat is scheduled.
    pub fn is_running(&self) -> bool {
        self.next_due.is_some()
    }

    /// Arm the timer; the first beat is due one interval after `now`. An
    /// interval past the clock's range never comes due.
    pub fn start(&mut self, now: Instant) {
        self.next_due = self.interval.and_then(|interval| now.checked_add(interval));
    }

    /// Disarm the timer.
    pub fn stop(&mut self) {
        self.next_due = None;
    }

    /// `true` if a beat is due at `now`. The next beat is scheduled one
    /// interval after `now`, so a stalled loop never fires a burst.
    pub fn poll(&mut self, now: Instant) -> bool {
        match (self.interval, self.next_due) {
            (Some(interval), Some(due)) if now >= due => {
                self.next_due = now.checked_add(interval);
                true
            }
            _ => false,
        }
    }
}

/// What to do when the connection drops without the client asking for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconnectPolicy {
    /// Stay disconnected; the application decides when to connect again.
    #[default]
    Disabled,
    /// Retry up to `max_attempts` times, waiting the configured delay before
    /// each attempt. The counter resets once a connection opens.
    Bounded { max_attempts: u32 },
}

/// Timer for the next automatic reconnect attempt.
#[derive(Debug, Clone)]
pub struct ReconnectSchedule {
    policy: ReconnectPolicy,
    delay: Duration,
    attempts: u32,
    next_attempt: Option<Instant>,
    suppressed: bool,
}

impl ReconnectSchedule {
    /// Timer for `policy`, waiting `delay` before each attempt.
    pub fn new(policy: ReconnectPolicy, delay: Duration) -> Self {
        Self {
            policy,
            delay,
            attempts: 0,
            next_attempt: None,
            suppressed: false,
        }
    }

    /// The configured policy.
    pub fn policy(&self) -> ReconnectPolicy {
        self.policy
    }

    /// Attempts made since the last successful connection.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// `true` while an attempt is scheduled.
    pub fn is_pending(&self) -> bool {
        self.next_attempt.is_some()
    }

    /// The application asked for a connection; allow automatic retries.
    pub fn resume(&mut self) {
        self.suppressed = false;
    }

    /// The application asked to disconnect; cancel and block retries until
    /// [`resume`](Self::resume).
    pub fn suppress(&mut self) {
        self.suppressed = true;
        self.next_attempt = None;
    }

    /// A connection opened: reset the attempt counter.
    pub fn on_connected(&mut self) {
        self.attempts = 0;
        self.next_attempt = None;
    }

    /// A connection ended: arm the next attempt if the policy allows one.
    pub fn on_disconnected(&mut self, now: Instant) {
        if self.suppressed {
            return;
        }
        match self.policy {
            ReconnectPolicy::Disabled => {}
            ReconnectPolicy::Bounded { max_attempts } if self.attempts < max_attempts => {
                info!(
                    attempt = self.attempts + 1,
                    max_attempts,
                    delay_ms = self.delay.as_millis() as u64,
                    "scheduling reconnect"
                );
                self.next_attempt = now.checked_add(self.delay);
                if self.next_attempt.is_none() {
                    warn!("reconnect delay exceeds the clock range, not scheduling");
                }
            }
            ReconnectPolicy::Bounded { max_attempts } => {
                warn!(max_attempts, "reconnect attempts exhausted");
                self.next_attempt = None;
            }
        }
    }

    /// `true` if an attempt should start at `now`. Consumes the timer.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.next_attempt {
            Some(due) if now >= due => {
                self.next_attempt = None;
                self.attempts += 1;
                debug!(attempt = self.attempts, "reconnect due");
                true
            }
            _ => false,
        }
    }
}

/// Both liveness timers, owned by the consumer thread.
#[derive(Debug, Clone)]
pub struct Liveness {
    pub heartbeat: Heartbeat,
    pub reconnect: ReconnectSchedule,
}

impl Liveness {
    /// Both timers from the client configuration.
    pub fn new(heartbeat_interval: Duration, policy: ReconnectPolicy, reconnect_delay: Duration) -> Self {
        Self {
            heartbeat: Heartbeat::new(heartbeat_interval),
            reconnect: ReconnectSchedule::new(policy, reconnect_delay),
        }
    }
}
