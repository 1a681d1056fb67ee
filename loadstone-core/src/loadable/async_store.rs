//! Asynchronous Derived Store
//!
//! An [`AsyncStore`] wraps a set of parent stores and an asynchronous mapping
//! function. Its value is whatever the mapping function last produced for the
//! parents' values.
//!
//! # Load Cycles
//!
//! Every trigger (a parent change, `load`, or `reload`) runs a *cycle*:
//!
//! 1. Load the parents (`load_all`, or `reload_all` for a forced cycle).
//!    A parent failure ends the cycle with that same error.
//!
//! 2. Read the parents' current values. Reading after the parents settle
//!    means a burst of changes made while they were loading is seen as one.
//!
//! 3. Compare the values with those of the last computation. Equal values
//!    reuse the current computation and no new work starts. Only a forced
//!    cycle on a store built reloadable skips this check; a store that is
//!    reloadable merely through its parents reruns only if they changed.
//!
//! 4. Otherwise bump the generation, record the values, and start the
//!    mapping function once the cycle lock is released. The computation is shared, so every caller that
//!    reaches step 3 with the same values awaits the same work.
//!
//! # Superseded Computations
//!
//! Computations are never cancelled. When one finishes, it publishes to the
//! cell only if its generation is still the latest. An older computation that
//! finishes late resolves the future of whoever started it, but never
//! overwrites the value of a newer one.
//!
//! # Lifecycle
//!
//! Nothing runs at construction. The first subscriber starts the store: it
//! subscribes to every parent and spawns a cycle, and each parent change
//! spawns another. The last subscriber leaving drops the parent
//! subscriptions. `load` and `reload` work with or without subscribers.

use std::fmt::{self, Debug};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use futures_util::future::{FutureExt, Shared};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, trace};

use super::capability::{Capability, Readable};
use super::dependencies::Dependencies;
use super::options::LoadOptions;
use super::LoadFuture;
use crate::error::{StoreError, StoreResult};
use crate::reactive::runtime::spawn_cycle;
use crate::reactive::{Setter, Subscription, Teardown, Writable};

/// Type-erased mapping function.
pub(crate) type LoadFn<V, T> = dyn Fn(V) -> LoadFuture<T> + Send + Sync;

type SharedLoad<T> = Shared<LoadFuture<T>>;

/// Where an asynchronous store is in its load cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// No computation has started yet.
    Idle,

    /// The latest computation is in flight.
    Pending,

    /// The latest computation resolved and its value is published.
    Settled,

    /// The latest computation failed. The previous value stays published.
    Failed,
}

struct Cycle<V, T> {
    /// Parent values the current computation was started with.
    loaded_values: Option<V>,
    current: Option<SharedLoad<T>>,
    generation: u64,
    state: LoadState,
}

pub(crate) struct AsyncInner<D, T>
where
    D: Dependencies,
    T: Clone + PartialEq + Send + Sync + 'static,
{
    pub(crate) stores: D,
    mapping: Arc<LoadFn<D::Values, T>>,
    pub(crate) reloadable: bool,
    capability: Capability,
    pub(crate) name: Option<Arc<str>>,
    pub(crate) cell: Writable<T>,
    cycle: Mutex<Cycle<D::Values, T>>,
    /// Held while a settled computation publishes, so a stale publish can
    /// never land after a newer one.
    publish: Mutex<()>,
}

impl<D, T> AsyncInner<D, T>
where
    D: Dependencies,
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn id(&self) -> u64 {
        self.cell.id()
    }

    /// Spawn an unforced cycle in the background.
    fn trigger(self: &Arc<Self>) {
        let cycle = Arc::clone(self).run_cycle(false).boxed();
        spawn_cycle(self.id(), self.name.clone(), cycle);
    }

    pub(crate) async fn run_cycle(self: Arc<Self>, forced: bool) -> StoreResult<T> {
        let parents = if forced {
            self.stores.reload_all()
        } else {
            self.stores.load_all()
        };

        if let Err(error) = parents.await {
            debug!(store = self.id(), forced, error = %error, "dependency failed to load");
            return Err(error);
        }

        let values = self.stores.current();
        let computation = self.begin(values, forced);
        computation.await
    }

    /// Reuse the current computation or start a new one.
    ///
    /// A forced cycle only bypasses the reuse check on a store built
    /// reloadable; any other store reruns only for changed parent values.
    fn begin(self: &Arc<Self>, values: D::Values, forced: bool) -> SharedLoad<T> {
        let rerun = forced && self.reloadable;

        let (computation, mapped_tx, generation) = {
            let mut cycle = self.cycle.lock();

            if !rerun {
                if let (Some(previous), Some(current)) = (&cycle.loaded_values, &cycle.current) {
                    if *previous == values {
                        trace!(
                            store = self.id(),
                            generation = cycle.generation,
                            "dependencies unchanged, reusing current load"
                        );
                        return current.clone();
                    }
                }
            }

            cycle.generation += 1;
            let generation = cycle.generation;
            cycle.loaded_values = Some(values.clone());
            cycle.state = LoadState::Pending;

            // The mapping future is handed over once the lock is released.
            let (mapped_tx, mapped_rx) = oneshot::channel::<LoadFuture<T>>();
            let weak = Arc::downgrade(self);
            let computation = async move {
                let result = match mapped_rx.await {
                    Ok(mapped) => mapped.await,
                    Err(closed) => Err(StoreError::new(closed)),
                };
                if let Some(inner) = weak.upgrade() {
                    inner.settle(generation, &result);
                }
                result
            }
            .boxed()
            .shared();

            cycle.current = Some(computation.clone());
            (computation, mapped_tx, generation)
        };

        debug!(
            store = self.id(),
            name = self.name.as_deref().unwrap_or(""),
            generation,
            forced,
            "starting load"
        );

        // `computation` holds the receiver, so the send cannot fail.
        let _ = mapped_tx.send((self.mapping)(values));
        computation
    }

    fn settle(&self, generation: u64, result: &StoreResult<T>) {
        let _publishing = self.publish.lock();
        {
            let mut cycle = self.cycle.lock();
            if cycle.generation != generation {
                debug!(
                    store = self.id(),
                    generation,
                    latest = cycle.generation,
                    "discarding superseded load"
                );
                return;
            }
            cycle.state = match result {
                Ok(_) => LoadState::Settled,
                Err(_) => LoadState::Failed,
            };
        }

        match result {
            Ok(value) => {
                trace!(store = self.id(), generation, "publishing loaded value");
                self.cell.set(value.clone());
            }
            Err(error) => {
                debug!(store = self.id(), generation, error = %error, "load failed");
            }
        }
    }

    fn state(&self) -> LoadState {
        self.cycle.lock().state
    }
}

fn start<D, T>(inner: &Arc<AsyncInner<D, T>>) -> Teardown
where
    D: Dependencies,
    T: Clone + PartialEq + Send + Sync + 'static,
{
    // Parents call back once each while subscribing; one cycle covers them.
    let armed = Arc::new(AtomicBool::new(false));
    let weak = Arc::downgrade(inner);

    let subscriptions = inner.stores.subscribe_all({
        let armed = Arc::clone(&armed);
        Arc::new(move || {
            if !armed.load(Ordering::SeqCst) {
                return;
            }
            if let Some(inner) = weak.upgrade() {
                inner.trigger();
            }
        })
    });

    armed.store(true, Ordering::SeqCst);
    inner.trigger();

    Box::new(move || drop(subscriptions))
}

/// A store whose value comes from an asynchronous mapping of its parents.
///
/// # Example
///
/// ```rust
/// use loadstone_core::loadable::{async_derived, LoadOptions};
/// use loadstone_core::reactive::Writable;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let user_id = Writable::new(7u32);
/// let profile = async_derived(
///     user_id.clone(),
///     |id| async move { Ok(format!("user #{id}")) },
///     LoadOptions::new(String::new()),
/// );
///
/// assert_eq!(profile.load().await.unwrap(), "user #7");
/// # });
/// ```
pub struct AsyncStore<D, T>
where
    D: Dependencies,
    T: Clone + PartialEq + Send + Sync + 'static,
{
    inner: Arc<AsyncInner<D, T>>,
}

/// Create an asynchronous store with no parents.
pub fn async_readable<T, F, Fut>(initial: T, load: F, reloadable: bool) -> AsyncStore<(), T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = StoreResult<T>> + Send + 'static,
{
    let options = LoadOptions::new(initial).with_reloadable(reloadable);
    AsyncStore::new((), move |()| load(), options)
}

/// Create an asynchronous store derived from `stores`.
pub fn async_derived<D, T, F, Fut>(stores: D, load: F, options: LoadOptions<T>) -> AsyncStore<D, T>
where
    D: Dependencies,
    T: Clone + PartialEq + Send + Sync + 'static,
    F: Fn(D::Values) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = StoreResult<T>> + Send + 'static,
{
    AsyncStore::new(stores, load, options)
}

impl<D, T> AsyncStore<D, T>
where
    D: Dependencies,
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create a store from parents, a mapping function, and options.
    pub fn new<F, Fut>(stores: D, load: F, options: LoadOptions<T>) -> Self
    where
        F: Fn(D::Values) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = StoreResult<T>> + Send + 'static,
    {
        let mapping: Arc<LoadFn<D::Values, T>> = Arc::new(move |values| load(values).boxed());
        Self::from_mapping(stores, mapping, options)
    }

    pub(crate) fn from_mapping(
        stores: D,
        mapping: Arc<LoadFn<D::Values, T>>,
        options: LoadOptions<T>,
    ) -> Self {
        let LoadOptions {
            initial,
            reloadable,
            name,
        } = options;

        let capability = if reloadable || stores.capability().is_reloadable() {
            Capability::Reloadable
        } else {
            Capability::Loadable
        };

        let inner = Arc::new_cyclic(|weak: &Weak<AsyncInner<D, T>>| {
            let weak = weak.clone();
            let cell = Writable::with_start(initial, move |_set: Setter<T>| {
                let inner = weak.upgrade()?;
                Some(start(&inner))
            });
            AsyncInner {
                stores,
                mapping,
                reloadable,
                capability,
                name,
                cell,
                cycle: Mutex::new(Cycle {
                    loaded_values: None,
                    current: None,
                    generation: 0,
                    state: LoadState::Idle,
                }),
                publish: Mutex::new(()),
            }
        });

        Self { inner }
    }

    pub(crate) fn inner(&self) -> &Arc<AsyncInner<D, T>> {
        &self.inner
    }

    /// Get the cell ID backing this store.
    pub fn id(&self) -> u64 {
        self.inner.id()
    }

    /// The configured name, if any.
    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    /// Get a snapshot of the current value.
    pub fn get(&self) -> T {
        self.inner.cell.get()
    }

    /// Register a callback for value changes.
    ///
    /// The first subscriber starts loading.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.inner.cell.subscribe(callback)
    }

    /// `Reloadable` if built reloadable or any parent is; else `Loadable`.
    pub fn capability(&self) -> Capability {
        self.inner.capability
    }

    /// Resolve with this store's value once it has loaded for the current
    /// parent values.
    pub fn load(&self) -> LoadFuture<T> {
        Arc::clone(&self.inner).run_cycle(false).boxed()
    }

    /// Reload reloadable parents, then rerun the mapping function.
    ///
    /// A store built reloadable always reruns. One that is reloadable only
    /// through its parents reruns if the reload changed their values.
    /// `None` unless the store is reloadable.
    pub fn reload(&self) -> Option<LoadFuture<T>> {
        if !self.inner.capability.is_reloadable() {
            return None;
        }
        Some(Arc::clone(&self.inner).run_cycle(true).boxed())
    }

    /// Where the store is in its load cycle.
    pub fn state(&self) -> LoadState {
        self.inner.state()
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.cell.subscriber_count()
    }
}

impl<D, T> Clone for AsyncStore<D, T>
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

impl<D, T> Debug for AsyncStore<D, T>
where
    D: Dependencies,
    T: Clone + PartialEq + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncStore")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("value", &self.get())
            .field("state", &self.state())
            .field("capability", &self.capability())
            .finish()
    }
}

impl<D, T> Readable for AsyncStore<D, T>
where
    D: Dependencies,
    T: Clone + PartialEq + Send + Sync + 'static,
{
    type Value = T;

    fn get(&self) -> T {
        AsyncStore::get(self)
    }

    fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        AsyncStore::subscribe(self, callback)
    }

    fn capability(&self) -> Capability {
        AsyncStore::capability(self)
    }

    fn load(&self) -> Option<LoadFuture<T>> {
        Some(AsyncStore::load(self))
    }

    fn reload(&self) -> Option<LoadFuture<T>> {
        AsyncStore::reload(self)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
