//! Reactive Runtime
//!
//! Load cycles started by a subscription have no caller awaiting them. The
//! runtime gives them somewhere to run and somewhere to report failures.
//!
//! # How It Works
//!
//! 1. A store notices a dependency change and builds a load cycle future.
//!
//! 2. [`spawn_cycle`] hands that future to the ambient tokio runtime.
//!
//! 3. If the cycle fails, the error goes to the handler installed with
//!    [`log_async_errors`], or to a `tracing` warning when none is set.
//!
//! Outside a tokio runtime nothing is spawned. The store stays as it was until
//! someone awaits `load()`, which drives the same work directly.

use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use tokio::runtime::Handle;
use tracing::{trace, warn};

use crate::error::StoreError;

/// Where an unobserved load failure came from.
#[derive(Debug, Clone, Copy)]
pub struct ErrorSource<'a> {
    /// Cell ID of the failing store.
    pub store: u64,

    /// The store's configured name, if any.
    pub name: Option<&'a str>,
}

/// Handler for failures of subscription-driven load cycles.
pub type AsyncErrorHandler = dyn Fn(ErrorSource<'_>, &StoreError) + Send + Sync;

// Global handler slot. Replaced wholesale by `log_async_errors`.
static ERROR_HANDLER: OnceLock<RwLock<Option<Arc<AsyncErrorHandler>>>> = OnceLock::new();

fn error_handler() -> &'static RwLock<Option<Arc<AsyncErrorHandler>>> {
    ERROR_HANDLER.get_or_init(|| RwLock::new(None))
}

/// Install a handler for errors nobody awaited.
///
/// Errors returned to a caller of `load`, `reload`, or `set` never reach the
/// handler; only cycles spawned by subscriptions do.
pub fn log_async_errors<F>(handler: F)
where
    F: Fn(ErrorSource<'_>, &StoreError) + Send + Sync + 'static,
{
    let handler: Arc<AsyncErrorHandler> = Arc::new(handler);
    *error_handler().write() = Some(handler);
}

/// Remove the installed handler, falling back to `tracing`.
pub fn clear_async_error_handler() {
    *error_handler().write() = None;
}

pub(crate) fn report_async_error(source: ErrorSource<'_>, error: &StoreError) {
    let handler = error_handler().read().clone();
    match handler {
        Some(handler) => handler(source, error),
        None => warn!(
            store = source.store,
            name = source.name.unwrap_or(""),
            error = %error,
            "background load failed"
        ),
    }
}

/// Run a load cycle in the background.
pub(crate) fn spawn_cycle<T>(
    store: u64,
    name: Option<Arc<str>>,
    cycle: futures_util::future::BoxFuture<'static, Result<T, StoreError>>,
) where
    T: Send + 'static,
{
    let handle = match Handle::try_current() {
        Ok(handle) => handle,
        Err(_) => {
            warn!(store, "no tokio runtime; load deferred until the next load()");
            return;
        }
    };

    trace!(store, "spawning load cycle");
    handle.spawn(async move {
        if let Err(error) = cycle.await {
            let source = ErrorSource {
                store,
                name: name.as_deref(),
            };
            report_async_error(source, &error);
        }
    });
}
