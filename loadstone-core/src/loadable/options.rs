//! Per-store configuration.

use std::sync::Arc;

/// Settings fixed when an asynchronous store is built.
///
/// # Example
///
/// ```rust
/// use loadstone_core::loadable::LoadOptions;
///
/// let options = LoadOptions::new(Vec::<String>::new())
///     .reloadable()
///     .named("todos");
/// assert!(options.reloadable);
/// ```
#[derive(Debug, Clone)]
pub struct LoadOptions<T> {
    /// Value published before the first successful load, and kept if it fails.
    pub initial: T,

    /// Whether the store exposes `reload` of its own accord.
    pub reloadable: bool,

    /// Label attached to log events and error reports.
    pub name: Option<Arc<str>>,
}

impl<T> LoadOptions<T> {
    /// Options with the given initial value, not reloadable, unnamed.
    pub fn new(initial: T) -> Self {
        Self {
            initial,
            reloadable: false,
            name: None,
        }
    }

    /// Make the store reloadable.
    pub fn reloadable(mut self) -> Self {
        self.reloadable = true;
        self
    }

    /// Set whether the store is reloadable.
    pub fn with_reloadable(mut self, reloadable: bool) -> Self {
        self.reloadable = reloadable;
        self
    }

    /// Name the store for diagnostics.
    pub fn named(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl<T: Default> Default for LoadOptions<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
