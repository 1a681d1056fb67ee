//! Reactive Primitives
//!
//! This module implements the synchronous side of the store system: value
//! cells, derived stores, and the runtime that drives background work.
//!
//! # Concepts
//!
//! ## Cells
//!
//! A [`Writable`] is a container for mutable state. Subscribers are called
//! with the current value straight away and again on every change. A cell can
//! carry a start function that runs when the first subscriber arrives and a
//! teardown that runs when the last one leaves.
//!
//! ## Derived Stores
//!
//! A [`Derived`] store maps the values of its parents synchronously. It
//! recomputes eagerly while subscribed and inherits `load`/`reload` from any
//! loadable parent.
//!
//! ## Runtime
//!
//! Load cycles triggered by subscriptions run on the ambient tokio runtime.
//! Their errors go to the handler installed with [`log_async_errors`].

mod cell;
mod derived;
pub(crate) mod runtime;
mod subscriber;

pub use cell::{Setter, Teardown, Writable};
pub use derived::{derived, Derived};
pub use runtime::{clear_async_error_handler, log_async_errors, AsyncErrorHandler, ErrorSource};
pub use subscriber::{SubscriberId, Subscription};
