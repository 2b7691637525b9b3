//! Typed publish/subscribe bus owned by the client.
//!
//! Every message payload type (and the lifecycle events in [`crate::event`])
//! is its own event kind. Any number of independent subsystems may subscribe
//! to the same kind; each gets a [`SubscriptionId`] it can later pass to
//! [`EventBus::unsubscribe`].
//!
//! Handlers are not required to be `Send`, which makes the bus itself `!Send`:
//! it lives on the consumer thread and handlers only ever run there.
//!
//! ```
//! use gamelink_client::event_bus::EventBus;
//! use gamelink_client::protocol::ChatMessage;
//!
//! let mut bus = EventBus::new();
//! let id = bus.subscribe(|chat: &ChatMessage| {
//!     println!("{}: {}", chat.sender_id, chat.message);
//!     Ok(())
//! });
//! assert_eq!(bus.subscriber_count::<ChatMessage>(), 1);
//! assert!(bus.unsubscribe(id));
//! ```

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::trace;

use crate::error::{GameLinkError, Result};
use crate::scheduler::panic_message;

/// Error type subscribers may return.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// What a subscriber returns. `Err` is logged by the drain cycle; it never
/// prevents other subscribers or other queued messages from running.
pub type HandlerResult = std::result::Result<(), HandlerError>;

/// Token identifying one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type ErasedHandler = Box<dyn FnMut(&dyn Any) -> HandlerResult>;

struct Subscriber {
    id: SubscriptionId,
    handler: ErasedHandler,
}

/// Per-event-type subscriber lists.
#[derive(Default)]
pub struct EventBus {
    subscribers: HashMap<TypeId, Vec<Subscriber>>,
    kinds: HashMap<SubscriptionId, TypeId>,
    next_id: u64,
}

impl EventBus {
    /// An empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for events of type `E`. Handlers for the same type
    /// run in subscription order.
    pub fn subscribe<E, F>(&mut self, mut handler: F) -> SubscriptionId
    where
        E: 'static,
        F: FnMut(&E) -> HandlerResult + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;

        let erased: ErasedHandler = Box::new(move |event: &dyn Any| match event.downcast_ref::<E>() {
            Some(event) => handler(event),
            None => Ok(()),
        });

        let kind = TypeId::of::<E>();
        self.subscribers.entry(kind).or_default().push(Subscriber {
            id,
            handler: erased,
        });
        self.kinds.insert(id, kind);
        trace!(event = type_name::<E>(), ?id, "subscribed");
        id
    }

    /// Remove a subscription. Returns `false` if `id` was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let Some(kind) = self.kinds.remove(&id) else {
            return false;
        };
        if let Some(list) = self.subscribers.get_mut(&kind) {
            list.retain(|s| s.id != id);
            if list.is_empty() {
                self.subscribers.remove(&kind);
            }
        }
        true
    }

    /// Number of handlers currently registered for `E`.
    pub fn subscriber_count<E: 'static>(&self) -> usize {
        self.subscribers
            .get(&TypeId::of::<E>())
            .map_or(0, Vec::len)
    }

    /// Invoke every handler registered for `E`.
    ///
    /// All handlers run even if some fail. Returns how many handlers were
    /// invoked.
    ///
    /// # Errors
    ///
    /// Returns [`GameLinkError::Handler`] summarising every handler that
    /// returned an error or panicked.
    pub fn publish<E: 'static>(&mut self, event: &E) -> Result<usize> {
        let Some(list) = self.subscribers.get_mut(&TypeId::of::<E>()) else {
            trace!(event = type_name::<E>(), "no subscribers");
            return Ok(0);
        };

        let mut failures = Vec::new();
        for sub in list.iter_mut() {
            match catch_unwind(AssertUnwindSafe(|| (sub.handler)(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => failures.push(e.to_string()),
                Err(panic) => failures.push(format!("panicked: {}", panic_message(panic.as_ref()))),
            }
        }

        if failures.is_empty() {
            Ok(list.len())
        } else {
            Err(GameLinkError::Handler(format!(
                "{} subscriber(s) of {} failed: {}",
                failures.len(),
                type_name::<E>(),
                failures.join("; ")
            )))
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("event_kinds", &self.subscribers.len())
            .field("subscriptions", &self.kinds.len())
            .finish()
    }
}
