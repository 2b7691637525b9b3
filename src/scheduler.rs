//! Hand-off queue between the I/O context and the consumer thread.
//!
//! The receive loop never runs handler code. It packages each decoded message
//! into a [`PendingAction`] and [`enqueue`](SchedulerHandle::enqueue)s it; the
//! consumer thread runs the queued actions once per tick with
//! [`Scheduler::drain`]. This queue is the only structure shared between the
//! two contexts.

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{error, trace};

use crate::error::Result;

/// A unit of work captured on the I/O side and run exactly once on the
/// consumer thread with mutable access to the consumer context `C`.
pub type PendingAction<C> = Box<dyn FnOnce(&mut C) -> Result<()> + Send>;

type Queue<C> = Arc<Mutex<VecDeque<PendingAction<C>>>>;

/// Consumer-side owner of the queue.
pub struct Scheduler<C> {
    queue: Queue<C>,
}

/// Producer-side handle. Cheap to clone and safe to use from any thread.
pub struct SchedulerHandle<C> {
    queue: Queue<C>,
}

impl<C> Clone for SchedulerHandle<C> {
    fn clone(&self) -> Self {
        Self {
            queue: Arc::clone(&self.queue),
        }
    }
}

/// Outcome of one drain cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Actions run (including failed ones).
    pub executed: usize,
    /// Actions that returned an error or panicked.
    pub failed: usize,
}

impl<C> Scheduler<C> {
    /// An empty queue.
    pub fn new() -> Self {
        Self {
            queue: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// A producer handle for the I/O context.
    pub fn handle(&self) -> SchedulerHandle<C> {
        SchedulerHandle {
            queue: Arc::clone(&self.queue),
        }
    }

    /// Number of actions waiting for the next drain.
    pub fn pending(&self) -> usize {
        lock(&self.queue).len()
    }

    /// Run every action queued so far, in FIFO order.
    ///
    /// The queue is swapped out under the lock and the lock is released
    /// before any action runs, so producers never wait on handler code and
    /// actions enqueued while draining are left for the next cycle.
    ///
    /// An action that returns `Err` or panics is logged and counted in
    /// [`DrainReport::failed`]; the remaining actions still run.
    pub fn drain(&self, ctx: &mut C) -> DrainReport {
        let batch = std::mem::take(&mut *lock(&self.queue));
        let mut report = DrainReport::default();

        for action in batch {
            report.executed += 1;
            match catch_unwind(AssertUnwindSafe(|| action(ctx))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    report.failed += 1;
                    error!("scheduled action failed: {e}");
                }
                Err(panic) => {
                    report.failed += 1;
                    error!("scheduled action panicked: {}", panic_message(panic.as_ref()));
                }
            }
        }

        if report.executed > 0 {
            trace!(executed = report.executed, failed = report.failed, "drain cycle complete");
        }
        report
    }
}

impl<C> Default for Scheduler<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> SchedulerHandle<C> {
    /// Queue `action` for the next drain cycle.
    pub fn enqueue(&self, action: PendingAction<C>) {
        lock(&self.queue).push_back(action);
    }

    /// Queue a closure, boxing it.
    pub fn enqueue_fn<F>(&self, action: F)
    where
        F: FnOnce(&mut C) -> Result<()> + Send + 'static,
    {
        self.enqueue(Box::new(action));
    }
}

impl<C> std::fmt::Debug for Scheduler<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("pending", &self.pending())
            .finish()
    }
}

// A panicking action cannot leave the queue half-updated: the lock is never
// held while actions run. Recover the guard instead of propagating poison.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
