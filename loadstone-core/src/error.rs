//! Error types shared by every store.
//!
//! A failing load is observed by every caller awaiting the same computation,
//! so errors have to be cheap to clone. Both variants hold their payload
//! behind an `Arc`; cloning never copies the underlying error and callers can
//! check identity with [`StoreError::same_as`].

use std::error::Error as StdError;
use std::sync::Arc;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type StoreResult<T> = Result<T, StoreError>;

/// An error raised by a load, reload, or write.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// A plain textual failure.
    #[error("{0}")]
    Message(Arc<str>),

    /// A wrapped error from a mapping function or transport.
    #[error(transparent)]
    Source(Arc<dyn StdError + Send + Sync + 'static>),
}

impl StoreError {
    /// Create an error from a message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Message(Arc::from(message.into()))
    }

    /// Wrap an arbitrary error.
    pub fn new<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Source(Arc::new(error))
    }

    /// Whether both errors share the same underlying allocation.
    ///
    /// Errors propagate unchanged from the failing store to every dependent,
    /// so this holds between an ancestor's error and the one surfaced by a
    /// store several hops downstream.
    pub fn same_as(&self, other: &StoreError) -> bool {
        match (self, other) {
            (Self::Message(a), Self::Message(b)) => Arc::ptr_eq(a, b),
            (Self::Source(a), Self::Source(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}
