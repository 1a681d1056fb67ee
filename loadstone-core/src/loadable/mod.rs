//! Loadable Stores
//!
//! Stores whose values depend on asynchronous work, and the machinery for
//! loading a whole dependency graph of them.
//!
//! # Capabilities
//!
//! Every store reports a [`Capability`]: plain stores are read
//! synchronously, loadable stores expose `load`, and reloadable stores also
//! expose `reload`. Capabilities propagate downstream: a store derived from a
//! loadable parent is itself loadable.
//!
//! # Loading a Graph
//!
//! `load` on any store resolves only after every ancestor has loaded, however
//! deep the chain. Each asynchronous store remembers the parent values its
//! last computation ran with and skips the mapping function when they have
//! not changed. `reload` forces the mapping function to run again and
//! reloads only the ancestors that were built reloadable; the rest are
//! merely loaded.

use futures_util::future::BoxFuture;

use crate::error::StoreResult;

mod async_store;
mod async_writable;
mod capability;
mod dependencies;
mod dispatch;
mod options;
mod readable;

pub use async_store::{async_derived, async_readable, AsyncStore, LoadState};
pub use async_writable::{async_writable, AsyncWritable};
pub use capability::{
    any_loadable, any_reloadable, has_load, has_reload, safe_load, Capability, Readable,
};
pub use dependencies::{ChangeHook, Dependencies};
pub use dispatch::{load_all, load_one, reload_all, reload_one};
pub use options::LoadOptions;
pub use readable::{readable, LoadableReadable};

/// Future returned by `load`, `reload`, and `set`.
pub type LoadFuture<T> = BoxFuture<'static, StoreResult<T>>;
