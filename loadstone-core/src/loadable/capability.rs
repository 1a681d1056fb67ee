//! Store capabilities.
//!
//! Whether a store can be loaded or reloaded is a property of the store
//! instance, decided once when it is built. Callers never look at the
//! concrete type: they ask the store for its [`Capability`] and branch on
//! that.

use crate::error::StoreResult;
use crate::reactive::Subscription;

use super::dependencies::Dependencies;
use super::LoadFuture;

/// What asynchronous operations a store exposes.
///
/// Tiers are ordered: every reloadable store is also loadable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Capability {
    /// Synchronous reads only.
    #[default]
    Plain,

    /// Exposes `load`.
    Loadable,

    /// Exposes `load` and `reload`.
    Reloadable,
}

impl Capability {
    /// Whether `load` is available.
    pub fn is_loadable(self) -> bool {
        self >= Capability::Loadable
    }

    /// Whether `reload` is available.
    pub fn is_reloadable(self) -> bool {
        self == Capability::Reloadable
    }

    /// The strongest of two capabilities.
    pub fn combine(self, other: Capability) -> Capability {
        self.max(other)
    }

    /// Capability inherited from a set of parents.
    pub fn inherit<I>(parents: I) -> Capability
    where
        I: IntoIterator<Item = Capability>,
    {
        parents
            .into_iter()
            .fold(Capability::Plain, Capability::combine)
    }
}

/// A reactive store.
///
/// `load` returns `None` exactly when [`Readable::capability`] is
/// [`Capability::Plain`], and `reload` returns `None` unless it is
/// [`Capability::Reloadable`].
pub trait Readable: Clone + Send + Sync + 'static {
    /// The value held by the store.
    type Value: Clone + PartialEq + Send + Sync + 'static;

    /// Synchronous snapshot of the current value.
    fn get(&self) -> Self::Value;

    /// Register a change callback. It runs once immediately.
    fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Self::Value) + Send + Sync + 'static;

    /// The operations this store exposes.
    fn capability(&self) -> Capability {
        Capability::Plain
    }

    /// Resolve once this store and its ancestors have loaded.
    fn load(&self) -> Option<LoadFuture<Self::Value>> {
        None
    }

    /// Re-run asynchronous work even if inputs are unchanged.
    fn reload(&self) -> Option<LoadFuture<Self::Value>> {
        None
    }
}

/// Whether `store` exposes `load`.
pub fn has_load<S: Readable>(store: &S) -> bool {
    store.capability().is_loadable()
}

/// Whether `store` exposes `reload`.
pub fn has_reload<S: Readable>(store: &S) -> bool {
    store.capability().is_reloadable()
}

/// Whether any store in the set exposes `load`.
pub fn any_loadable<D: Dependencies>(stores: &D) -> bool {
    stores.capability().is_loadable()
}

/// Whether any store in the set exposes `reload`.
pub fn any_reloadable<D: Dependencies>(stores: &D) -> bool {
    stores.capability().is_reloadable()
}

/// Await `store.load()` and report whether it succeeded.
///
/// Plain stores always succeed. The error is logged and dropped.
pub async fn safe_load<S: Readable>(store: &S) -> bool {
    let result: StoreResult<S::Value> = match store.load() {
        Some(load) => load.await,
        None => return true,
    };
    match result {
        Ok(_) => true,
        Err(err) => {
            tracing::debug!(error = %err, "safe_load swallowed a load failure");
            false
        }
    }
}
