//! Loadstone Core
//!
//! Reactive stores with first-class asynchronous loading. A store's value may
//! come from network or other asynchronous work, and that work may depend on
//! other stores, some of them asynchronous too. This crate coordinates load
//! and reload across the whole dependency graph:
//!
//! - awaiting `load()` on any store yields its fully resolved value, however
//!   deep its ancestry,
//! - asynchronous work is skipped when the parent values have not changed,
//! - `reload()` re-fetches only through stores built as reloadable,
//! - overlapping triggers resolve to the last-triggered computation.
//!
//! # Architecture
//!
//! - `reactive`: value cells, synchronous derived stores, background runtime
//! - `loadable`: capabilities, aggregate load/reload, asynchronous stores
//! - `error`: the shared, cloneable error type
//!
//! # Example
//!
//! ```rust
//! use loadstone_core::loadable::{async_derived, LoadOptions};
//! use loadstone_core::reactive::{derived, Writable};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let query = Writable::new("rust".to_string());
//! let results = async_derived(
//!     query.clone(),
//!     |q| async move { Ok(vec![format!("{q} book"), format!("{q} course")]) },
//!     LoadOptions::new(Vec::new()),
//! );
//! let count = derived(results.clone(), |r| r.len());
//!
//! assert_eq!(count.load().unwrap().await.unwrap(), 2);
//! # });
//! ```

pub mod error;
pub mod loadable;
pub mod reactive;

pub use error::{StoreError, StoreResult};
pub use loadable::{
    async_derived, async_readable, async_writable, load_all, readable, reload_all, LoadOptions,
    Readable,
};
pub use reactive::{derived, Writable};
