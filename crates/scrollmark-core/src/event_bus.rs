#![forbid(unsafe_code)]

//! Explicitly owned publish/subscribe dispatch.
//!
//! # Design
//!
//! An [`EventBus<E>`] is a plain value owned by whoever publishes on it.
//! Subscribers are boxed `FnMut(&E)` callbacks registered with
//! [`subscribe`](EventBus::subscribe), which hands back a
//! [`SubscriptionHandle`]. Passing that handle to
//! [`unsubscribe`](EventBus::unsubscribe) removes the callback. Owners
//! collect their handles and release them on teardown; there is no global
//! registry.
//!
//! # Invariants
//!
//! 1. Subscribers are invoked in registration order.
//! 2. Handles are never reused within one bus.
//! 3. Unsubscribing an unknown or already-removed handle is a no-op.

use tracing::trace;

/// Opaque token identifying one subscription on one bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[must_use = "dropping a handle leaks the subscription until the bus is dropped"]
pub struct SubscriptionHandle(u64);

impl SubscriptionHandle {
    #[must_use]
    pub fn id(self) -> u64 {
        self.0
    }
}

type Callback<E> = Box<dyn FnMut(&E)>;

/// Publish/subscribe dispatcher for events of type `E`.
pub struct EventBus<E> {
    subscribers: Vec<(SubscriptionHandle, Callback<E>)>,
    next_id: u64,
    published: u64,
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self {
            subscribers: Vec::new(),
            next_id: 1,
            published: 0,
        }
    }
}

impl<E> std::fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscribers.len())
            .field("published", &self.published)
            .finish()
    }
}

impl<E> EventBus<E> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback.
    pub fn subscribe(&mut self, callback: impl FnMut(&E) + 'static) -> SubscriptionHandle {
        let handle = SubscriptionHandle(self.next_id);
        self.next_id += 1;
        self.subscribers.push((handle, Box::new(callback)));
        handle
    }

    /// Remove a callback. Returns `true` if it was registered.
    pub fn unsubscribe(&mut self, handle: SubscriptionHandle) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(h, _)| *h != handle);
        before != self.subscribers.len()
    }

    /// Deliver `event` to every subscriber.
    pub fn publish(&mut self, event: &E) {
        self.published += 1;
        trace!(subscribers = self.subscribers.len(), "event bus publish");
        for (_, callback) in &mut self.subscribers {
            callback(event);
        }
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Total number of `publish` calls.
    #[must_use]
    pub fn published(&self) -> u64 {
        self.published
    }
}
