//! Subscriber identifiers and subscription handles.
//!
//! Every call to `subscribe` on a store registers a callback under a fresh
//! [`SubscriberId`] and hands back a [`Subscription`]. Dropping the handle (or
//! calling [`Subscription::unsubscribe`]) removes the callback again; when the
//! last subscriber of a lazily started store goes away, the store stops.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    ///
    /// Uses an atomic counter to ensure uniqueness across threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

type Release = Box<dyn FnOnce() + Send + Sync>;

/// Handle to a registered subscriber callback.
///
/// The callback stays registered for as long as this handle is alive.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: SubscriberId,
    release: Option<Release>,
}

impl Subscription {
    /// Wrap the closure that removes a subscriber.
    pub(crate) fn new<F>(id: SubscriberId, release: F) -> Self
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        Self {
            id,
            release: Some(Box::new(release)),
        }
    }

    /// The subscriber this handle controls.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Remove the subscriber now.
    pub fn unsubscribe(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.release.is_some())
            .finish()
    }
}
