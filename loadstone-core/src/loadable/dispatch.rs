//! Aggregate load and reload.
//!
//! [`load_all`] and [`reload_all`] turn a dependency set into one future that
//! resolves with every member's value, in the shape the set was declared in.
//! A lone store counts as a list of one.
//! Member operations are issued together and joined; the first failure wins
//! and the remaining results are ignored.
//!
//! Per member, loading means `load()` if the store has it, otherwise a
//! synchronous read. Reloading falls back one more step: `reload()`, then
//! `load()`, then a read. Only stores built as reloadable therefore redo
//! asynchronous work during a reload.

use futures_util::future::{self, FutureExt, TryFutureExt};

use super::capability::Readable;
use super::dependencies::Dependencies;
use super::LoadFuture;

/// Load a single store, or read it if it is plain.
pub fn load_one<S: Readable>(store: &S) -> LoadFuture<S::Value> {
    match store.load() {
        Some(load) => load,
        None => future::ready(Ok(store.get())).boxed(),
    }
}

/// Reload a single store, falling back to load and then to a read.
pub fn reload_one<S: Readable>(store: &S) -> LoadFuture<S::Value> {
    match store.reload() {
        Some(reload) => reload,
        None => load_one(store),
    }
}

/// Load every store in the set.
///
/// # Example
///
/// ```rust
/// use loadstone_core::loadable::load_all;
/// use loadstone_core::reactive::Writable;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let a = Writable::new(1);
/// let b = Writable::new("two");
/// let (x, y) = load_all(&(a, b)).await.unwrap();
/// assert_eq!((x, y), (1, "two"));
/// # });
/// ```
pub fn load_all<D: Dependencies>(stores: &D) -> LoadFuture<D::Listed> {
    stores.load_all().map_ok(D::listed).boxed()
}

/// Reload every store in the set.
pub fn reload_all<D: Dependencies>(stores: &D) -> LoadFuture<D::Listed> {
    stores.reload_all().map_ok(D::listed).boxed()
}
