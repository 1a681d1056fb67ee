//! Asynchronous Writable Store
//!
//! An [`AsyncWritable`] is an [`AsyncStore`] that can also be written to.
//! Writes follow an optimistic-update pattern:
//!
//! 1. The new value is published immediately.
//! 2. The parents are loaded and the write function persists the value.
//! 3. If the write function returns `Some(canonical)`, that value replaces
//!    the optimistic one.
//! 4. A reloadable store then reloads to reconcile with the source of truth.
//!
//! A failing write leaves the optimistic value in place; rolling back is up
//! to the caller.

use std::fmt::{self, Debug};
use std::future::Future;
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};
use tracing::debug;

use super::async_store::{AsyncStore, LoadState};
use super::capability::{Capability, Readable};
use super::dependencies::Dependencies;
use super::options::LoadOptions;
use super::LoadFuture;
use crate::error::StoreResult;
use crate::reactive::Subscription;

type WriteFn<V, T> = dyn Fn(T, V) -> BoxFuture<'static, StoreResult<Option<T>>> + Send + Sync;

/// An asynchronous store that accepts writes.
///
/// # Example
///
/// ```rust
/// use loadstone_core::loadable::{async_writable, LoadOptions};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let title = async_writable(
///     (),
///     |()| async { Ok("draft".to_string()) },
///     |new: String, ()| async move { Ok(Some(new.trim().to_string())) },
///     LoadOptions::new(String::new()),
/// );
///
/// let saving = title.set("  final  ".to_string());
/// assert_eq!(title.get(), "  final  ");
/// saving.await.unwrap();
/// assert_eq!(title.get(), "final");
/// # });
/// ```
pub struct AsyncWritable<D, T>
where
    D: Dependencies,
    T: Clone + PartialEq + Send + Sync + 'static,
{
    store: AsyncStore<D, T>,
    write: Arc<WriteFn<D::Values, T>>,
}

/// Create a writable asynchronous store derived from `stores`.
pub fn async_writable<D, T, L, LFut, W, WFut>(
    stores: D,
    load: L,
    write: W,
    options: LoadOptions<T>,
) -> AsyncWritable<D, T>
where
    D: Dependencies,
    T: Clone + PartialEq + Send + Sync + 'static,
    L: Fn(D::Values) -> LFut + Send + Sync + 'static,
    LFut: Future<Output = StoreResult<T>> + Send + 'static,
    W: Fn(T, D::Values) -> WFut + Send + Sync + 'static,
    WFut: Future<Output = StoreResult<Option<T>>> + Send + 'static,
{
    AsyncWritable::new(stores, load, write, options)
}

impl<D, T> AsyncWritable<D, T>
where
    D: Dependencies,
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create a store from parents, load and write functions, and options.
    pub fn new<L, LFut, W, WFut>(stores: D, load: L, write: W, options: LoadOptions<T>) -> Self
    where
        L: Fn(D::Values) -> LFut + Send + Sync + 'static,
        LFut: Future<Output = StoreResult<T>> + Send + 'static,
        W: Fn(T, D::Values) -> WFut + Send + Sync + 'static,
        WFut: Future<Output = StoreResult<Option<T>>> + Send + 'static,
    {
        let write: Arc<WriteFn<D::Values, T>> =
            Arc::new(move |value, values| write(value, values).boxed());
        Self {
            store: AsyncStore::new(stores, load, options),
            write,
        }
    }

    /// Publish `value` now, then persist it through the write function.
    ///
    /// The returned future resolves once the write (and, for reloadable
    /// stores, the follow-up reload) has finished. The optimistic value is
    /// visible through [`get`](Self::get) before the future is polled.
    pub fn set(&self, value: T) -> LoadFuture<()> {
        let inner = Arc::clone(self.store.inner());
        inner.cell.set(value.clone());

        let write = Arc::clone(&self.write);
        async move {
            inner.stores.load_all().await?;
            let values = inner.stores.current();

            if let Some(canonical) = write(value, values).await? {
                inner.cell.set(canonical);
            }

            if inner.reloadable {
                debug!(store = inner.cell.id(), "reloading after write");
                Arc::clone(&inner).run_cycle(true).await?;
            }
            Ok(())
        }
        .boxed()
    }

    /// Get the cell ID backing this store.
    pub fn id(&self) -> u64 {
        self.store.id()
    }

    /// Get a snapshot of the current value.
    pub fn get(&self) -> T {
        self.store.get()
    }

    /// Register a callback for value changes.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.store.subscribe(callback)
    }

    /// See [`AsyncStore::capability`].
    pub fn capability(&self) -> Capability {
        self.store.capability()
    }

    /// See [`AsyncStore::load`].
    pub fn load(&self) -> LoadFuture<T> {
        self.store.load()
    }

    /// See [`AsyncStore::reload`].
    pub fn reload(&self) -> Option<LoadFuture<T>> {
        self.store.reload()
    }

    /// See [`AsyncStore::state`].
    pub fn state(&self) -> LoadState {
        self.store.state()
    }

    /// The read side of this store.
    pub fn as_store(&self) -> &AsyncStore<D, T> {
        &self.store
    }
}

impl<D, T> Clone for AsyncWritable<D, T>
where
    D: Dependencies,
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            write: Arc::clone(&self.write),
        }
    }
}

impl<D, T> Debug for AsyncWritable<D, T>
where
    D: Dependencies,
    T: Clone + PartialEq + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncWritable")
            .field("store", &self.store)
            .finish()
    }
}

impl<D, T> Readable for AsyncWritable<D, T>
where
    D: Dependencies,
    T: Clone + PartialEq + Send + Sync + 'static,
{
    type Value = T;

    fn get(&self) -> T {
        AsyncWritable::get(self)
    }

    fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        AsyncWritable::subscribe(self, callback)
    }

    fn capability(&self) -> Capability {
        AsyncWritable::capability(self)
    }

    fn load(&self) -> Option<LoadFuture<T>> {
        Some(AsyncWritable::load(self))
    }

    fn reload(&self) -> Option<LoadFuture<T>> {
        AsyncWritable::reload(self)
    }
}
