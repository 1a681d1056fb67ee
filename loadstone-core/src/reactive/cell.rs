//! Writable Cell Implementation
//!
//! A [`Writable`] is the fundamental reactive primitive. It holds a value and
//! notifies subscribers whenever that value changes.
//!
//! # How Cells Work
//!
//! 1. `subscribe` registers a callback and immediately invokes it with the
//!    current value.
//!
//! 2. `set` replaces the value. If the new value differs from the old one,
//!    every subscriber is notified.
//!
//! 3. A cell may carry a *start* function. It runs when the first subscriber
//!    arrives and receives a [`Setter`] for pushing values into the cell. The
//!    teardown it returns runs when the last subscriber leaves. Every derived
//!    and asynchronous store in this crate is built on this lazy start/stop
//!    pair.
//!
//! # Thread Safety
//!
//! The value lives behind an `RwLock` and the subscriber list behind a
//! `Mutex`. Callbacks are always invoked with no lock held, so a callback may
//! freely read or write the cell it was notified by.

use std::fmt::{self, Debug};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use super::subscriber::{SubscriberId, Subscription};
use crate::loadable::{Capability, Readable};

/// Counter for generating unique cell IDs.
static CELL_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a new unique cell ID.
fn next_cell_id() -> u64 {
    CELL_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Subscriber callback, shared so the list can be snapshotted before calling.
pub(crate) type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Cleanup returned by a start function.
pub type Teardown = Box<dyn FnOnce() + Send + Sync>;

type StartFn<T> = dyn Fn(Setter<T>) -> Option<Teardown> + Send + Sync;

struct CellInner<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    id: u64,
    value: RwLock<T>,
    subscribers: Mutex<Vec<(SubscriberId, Callback<T>)>>,
    start: Option<Arc<StartFn<T>>>,
    stop: Mutex<Option<Teardown>>,
    /// Serializes start and teardown against subscriber arrivals.
    lifecycle: Mutex<()>,
}

/// A reactive value cell holding a value of type `T`.
///
/// # Example
///
/// ```rust
/// use loadstone_core::reactive::Writable;
///
/// let count = Writable::new(0);
/// let _sub = count.subscribe(|value| println!("count is {value}"));
///
/// count.set(5);
/// assert_eq!(count.get(), 5);
/// ```
pub struct Writable<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    inner: Arc<CellInner<T>>,
}

impl<T> Writable<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create a new cell with the given initial value.
    pub fn new(value: T) -> Self {
        Self::build(value, None)
    }

    /// Create a cell that runs `start` on its first subscriber.
    ///
    /// `start` may return a teardown, which runs once the last subscriber
    /// unsubscribes. The next first subscriber runs `start` again.
    pub fn with_start<F>(value: T, start: F) -> Self
    where
        F: Fn(Setter<T>) -> Option<Teardown> + Send + Sync + 'static,
    {
        Self::build(value, Some(Arc::new(start)))
    }

    fn build(value: T, start: Option<Arc<StartFn<T>>>) -> Self {
        Self {
            inner: Arc::new(CellInner {
                id: next_cell_id(),
                value: RwLock::new(value),
                subscribers: Mutex::new(Vec::new()),
                start,
                stop: Mutex::new(None),
                lifecycle: Mutex::new(()),
            }),
        }
    }

    /// Get the cell's unique ID.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Get a snapshot of the current value.
    pub fn get(&self) -> T {
        self.inner.value.read().clone()
    }

    /// Set a new value and notify subscribers if it changed.
    pub fn set(&self, value: T) {
        set_inner(&self.inner, value);
    }

    /// Update the value using a function of the current one.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let new_value = {
            let guard = self.inner.value.read();
            f(&guard)
        };
        self.set(new_value);
    }

    /// A setter handle that does not keep the cell alive.
    pub fn setter(&self) -> Setter<T> {
        Setter {
            inner: Arc::downgrade(&self.inner),
            after_set: None,
        }
    }

    /// Register a callback for value changes.
    ///
    /// The callback runs immediately with the current value. If this is the
    /// first subscriber, the start function runs first, and values it sets
    /// synchronously are only seen through that initial call.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = SubscriberId::new();
        let callback: Callback<T> = Arc::new(callback);

        {
            let _lifecycle = self.inner.lifecycle.lock();
            if self.inner.subscribers.lock().is_empty() {
                if let Some(start) = self.inner.start.clone() {
                    let teardown = start(self.setter());
                    *self.inner.stop.lock() = teardown;
                }
            }
            self.inner
                .subscribers
                .lock()
                .push((id, Arc::clone(&callback)));
        }

        callback(&self.get());

        let weak = Arc::downgrade(&self.inner);
        Subscription::new(id, move || {
            if let Some(inner) = weak.upgrade() {
                unsubscribe_inner(&inner, id);
            }
        })
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().len()
    }

    /// Whether the cell currently has at least one subscriber.
    pub fn is_active(&self) -> bool {
        self.subscriber_count() > 0
    }
}

fn set_inner<T>(inner: &CellInner<T>, value: T)
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    {
        let mut guard = inner.value.write();
        if *guard == value {
            return;
        }
        *guard = value;
    }
    notify_subscribers(inner);
}

fn notify_subscribers<T>(inner: &CellInner<T>)
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    let callbacks: Vec<Callback<T>> = inner
        .subscribers
        .lock()
        .iter()
        .map(|(_, callback)| Arc::clone(callback))
        .collect();
    let value = inner.value.read().clone();
    for callback in callbacks {
        callback(&value);
    }
}

fn unsubscribe_inner<T>(inner: &CellInner<T>, id: SubscriberId)
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    let _lifecycle = inner.lifecycle.lock();
    let now_empty = {
        let mut subscribers = inner.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        before != subscribers.len() && subscribers.is_empty()
    };

    if now_empty {
        let teardown = inner.stop.lock().take();
        if let Some(teardown) = teardown {
            teardown();
        }
    }
}

/// Write access to a cell handed to start functions.
///
/// Holds only a weak reference, so capturing it inside a parent's callback
/// never keeps the cell alive.
pub struct Setter<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    inner: Weak<CellInner<T>>,
    after_set: Option<Arc<dyn Fn() + Send + Sync>>,
}

impl<T> Setter<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Set the cell's value if the cell still exists.
    pub fn set(&self, value: T) {
        if let Some(inner) = self.inner.upgrade() {
            set_inner(&inner, value);
            if let Some(after_set) = &self.after_set {
                after_set();
            }
        }
    }

    /// Run `hook` after every set made through this setter.
    pub(crate) fn with_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.after_set = Some(Arc::new(hook));
        self
    }
}

impl<T> Clone for Setter<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
            after_set: self.after_set.clone(),
        }
    }
}

impl<T> Clone for Writable<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Writable<T>
where
    T: Clone + PartialEq + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Writable")
            .field("id", &self.inner.id)
            .field("value", &self.get())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

impl<T> Readable for Writable<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    type Value = T;

    fn get(&self) -> T {
        Writable::get(self)
    }

    fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        Writable::subscribe(self, callback)
    }

    fn capability(&self) -> Capability {
        Capability::Plain
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};

    #[test]
    fn cell_get_and_set() {
        let cell = Writable::new(0);
        assert_eq!(cell.get(), 0);

        cell.set(42);
        assert_eq!(cell.get(), 42);
    }

    #[test]
    fn cell_update() {
        let cell = Writable::new(10);
        cell.update(|v| v + 5);
        assert_eq!(cell.get(), 15);
    }

    #[test]
    fn subscribe_calls_immediately_then_on_change() {
        let cell = Writable::new(0);
        let seen = Arc::new(AtomicI32::new(-1));
        let calls = Arc::new(AtomicUsize::new(0));

        let _sub = cell.subscribe({
            let seen = seen.clone();
            let calls = calls.clone();
            move |v| {
                seen.store(*v, Ordering::SeqCst);
                calls.fetch_add(1, Ordering::SeqCst);
            }
        });

        assert_eq!(seen.load(Ordering::SeqCst), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        cell.set(7);
        assert_eq!(seen.load(Ordering::SeqCst), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn equal_value_does_not_notify() {
        let cell = Writable::new(3);
        let calls = Arc::new(AtomicUsize::new(0));
        let _sub = cell.subscribe({
            let calls = calls.clone();
            move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
            }
        });

        cell.set(3);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_stops_notifications() {
        let cell = Writable::new(0);
        let calls = Arc::new(AtomicUsize::new(0));
        let sub = cell.subscribe({
            let calls = calls.clone();
            move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
            }
        });

        cell.set(1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        sub.unsubscribe();
        cell.set(2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cell.subscriber_count(), 0);
    }

    #[test]
    fn start_and_teardown_follow_subscriber_count() {
        let starts = Arc::new(AtomicUsize::new(0));
        let stops = Arc::new(AtomicUsize::new(0));

        let cell = Writable::with_start(0, {
            let starts = starts.clone();
            let stops = stops.clone();
            move |set: Setter<i32>| {
                starts.fetch_add(1, Ordering::SeqCst);
                set.set(99);
                let stops = stops.clone();
                Some(Box::new(move || {
                    stops.fetch_add(1, Ordering::SeqCst);
                }) as Teardown)
            }
        });

        let first = cell.subscribe(|_| {});
        let second = cell.subscribe(|_| {});
        assert_eq!(starts.load(Ordering::SeqCst), 1);
        assert_eq!(cell.get(), 99);

        drop(first);
        assert_eq!(stops.load(Ordering::SeqCst), 0);
        drop(second);
        assert_eq!(stops.load(Ordering::SeqCst), 1);

        let _again = cell.subscribe(|_| {});
        assert_eq!(starts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn value_set_during_start_is_delivered_once() {
        let cell = Writable::with_start(0, |set: Setter<i32>| {
            set.set(5);
            None
        });
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let _sub = cell.subscribe({
            let seen = seen.clone();
            move |v| seen.lock().push(*v)
        });
        assert_eq!(*seen.lock(), vec![5]);
    }

    #[test]
    fn setter_outliving_cell_is_noop() {
        let cell = Writable::new(1);
        let setter = cell.setter();
        drop(cell);
        setter.set(2);
    }

    #[test]
    fn cell_clone_shares_state() {
        let cell1 = Writable::new(0);
        let cell2 = cell1.clone();

        cell1.set(42);
        assert_eq!(cell2.get(), 42);
        assert_eq!(cell1.id(), cell2.id());
    }
}
