//! Derived Store Implementation
//!
//! A [`Derived`] store computes its value synchronously from a set of parent
//! stores.
//!
//! # How Derived Stores Work
//!
//! 1. While nothing subscribes, `get` computes the value straight from the
//!    parents' current values.
//!
//! 2. The first subscriber starts the store: it subscribes to every parent
//!    and recomputes on each parent change, publishing through its own cell.
//!
//! 3. The last subscriber leaving releases the parent subscriptions.
//!
//! There is no deduplication: every parent change reruns the mapping
//! function. Equal results are still not republished, since the underlying
//! cell ignores sets that do not change the value.
//!
//! # Inherited Capabilities
//!
//! A derived store has no asynchronous work of its own, but its value is only
//! meaningful once its parents have loaded. If any parent is loadable, so is
//! the derived store: `load` awaits [`load_all`](crate::loadable::load_all)
//! over the parents and then reads the already-recomputed value. `reload`
//! works the same way through `reload_all` when any parent is reloadable.

use std::fmt::{self, Debug};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use futures_util::FutureExt;

use super::cell::{Setter, Teardown, Writable};
use super::subscriber::Subscription;
use crate::loadable::{Capability, Dependencies, LoadFuture, Readable};

type MapFn<V, T> = dyn Fn(V) -> T + Send + Sync;

struct DerivedInner<D, T>
where
    D: Dependencies,
    T: Clone + PartialEq + Send + Sync + 'static,
{
    stores: D,
    map: Arc<MapFn<D::Values, T>>,
    cell: Writable<T>,
    capability: Capability,
}

/// A store whose value is a pure function of its parents.
///
/// # Example
///
/// ```rust
/// use loadstone_core::reactive::{derived, Writable};
///
/// let first = Writable::new("Ada".to_string());
/// let last = Writable::new("Lovelace".to_string());
/// let full = derived((first.clone(), last), |(f, l)| format!("{f} {l}"));
///
/// assert_eq!(full.get(), "Ada Lovelace");
/// first.set("Augusta".to_string());
/// assert_eq!(full.get(), "Augusta Lovelace");
/// ```
pub struct Derived<D, T>
where
    D: Dependencies,
    T: Clone + PartialEq + Send + Sync + 'static,
{
    inner: Arc<DerivedInner<D, T>>,
}

/// Create a derived store.
pub fn derived<D, T, F>(stores: D, map: F) -> Derived<D, T>
where
    D: Dependencies,
    T: Clone + PartialEq + Send + Sync + 'static,
    F: Fn(D::Values) -> T + Send + Sync + 'static,
{
    Derived::new(stores, map)
}

impl<D, T> Derived<D, T>
where
    D: Dependencies,
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create a derived store from parents and a mapping function.
    ///
    /// The mapping function runs once immediately to seed the value.
    pub fn new<F>(stores: D, map: F) -> Self
    where
        F: Fn(D::Values) -> T + Send + Sync + 'static,
    {
        let map: Arc<MapFn<D::Values, T>> = Arc::new(map);
        let initial = map(stores.current());
        let capability = stores.capability();

        let inner = Arc::new_cyclic(|weak: &Weak<DerivedInner<D, T>>| {
            let weak = weak.clone();
            let cell = Writable::with_start(initial, move |set: Setter<T>| {
                let inner = weak.upgrade()?;
                Some(start(&inner, set))
            });
            DerivedInner {
                stores,
                map,
                cell,
                capability,
            }
        });

        Self { inner }
    }

    /// Get the cell ID backing this store.
    pub fn id(&self) -> u64 {
        self.inner.cell.id()
    }

    /// Get the current value.
    ///
    /// Without subscribers the value is recomputed from the parents.
    pub fn get(&self) -> T {
        if self.inner.cell.is_active() {
            self.inner.cell.get()
        } else {
            (self.inner.map)(self.inner.stores.current())
        }
    }

    /// Register a callback for value changes.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.inner.cell.subscribe(callback)
    }

    /// Capabilities inherited from the parents.
    pub fn capability(&self) -> Capability {
        self.inner.capability
    }

    /// Load the parents, then read this store.
    ///
    /// `None` if no parent is loadable.
    pub fn load(&self) -> Option<LoadFuture<T>> {
        if !self.inner.capability.is_loadable() {
            return None;
        }
        let parents = self.inner.stores.load_all();
        let this = self.clone();
        Some(
            async move {
                parents.await?;
                Ok(this.get())
            }
            .boxed(),
        )
    }

    /// Reload the parents, then read this store.
    ///
    /// `None` if no parent is reloadable.
    pub fn reload(&self) -> Option<LoadFuture<T>> {
        if !self.inner.capability.is_reloadable() {
            return None;
        }
        let parents = self.inner.stores.reload_all();
        let this = self.clone();
        Some(
            async move {
                parents.await?;
                Ok(this.get())
            }
            .boxed(),
        )
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.cell.subscriber_count()
    }
}

fn start<D, T>(inner: &DerivedInner<D, T>, set: Setter<T>) -> Teardown
where
    D: Dependencies,
    T: Clone + PartialEq + Send + Sync + 'static,
{
    // Subscribing fires every parent's callback once; recompute a single time
    // after all of them are attached instead.
    let armed = Arc::new(AtomicBool::new(false));
    let stores = inner.stores.clone();
    let map = Arc::clone(&inner.map);

    let subscriptions = inner.stores.subscribe_all({
        let armed = Arc::clone(&armed);
        let set = set.clone();
        let stores = stores.clone();
        let map = Arc::clone(&map);
        Arc::new(move || {
            if armed.load(Ordering::SeqCst) {
                set.set(map(stores.current()));
            }
        })
    });

    armed.store(true, Ordering::SeqCst);
    set.set(map(stores.current()));

    Box::new(move || drop(subscriptions))
}

impl<D, T> Clone for Derived<D, T>
where
    D: Dependencies,
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<D, T> Debug for Derived<D, T>
where
    D: Dependencies,
    T: Clone + PartialEq + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Derived")
            .field("id", &self.id())
            .field("value", &self.get())
            .field("capability", &self.inner.capability)
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

impl<D, T> Readable for Derived<D, T>
where
    D: Dependencies,
    T: Clone + PartialEq + Send + Sync + 'static,
{
    type Value = T;

    fn get(&self) -> T {
        Derived::get(self)
    }

    fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        Derived::subscribe(self, callback)
    }

    fn capability(&self) -> Capability {
        Derived::capability(self)
    }

    fn load(&self) -> Option<LoadFuture<T>> {
        Derived::load(self)
    }

    fn reload(&self) -> Option<LoadFuture<T>> {
        Derived::reload(self)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
