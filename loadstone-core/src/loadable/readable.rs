//! Loadable readable stores.
//!
//! A [`LoadableReadable`] is fed by its start function, typically from a
//! socket or a timer. It counts as loaded once the start function has pushed
//! its first value, so `load` subscribes for as long as it takes for that to
//! happen. Stopping the store clears the flag again.

use std::fmt::{self, Debug};
use std::sync::Arc;

use futures_util::FutureExt;
use tokio::sync::watch;

use super::capability::{Capability, Readable};
use super::LoadFuture;
use crate::error::StoreError;
use crate::reactive::{Setter, Subscription, Teardown, Writable};

/// A readable store that loads on the first value its start function sets.
pub struct LoadableReadable<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    cell: Writable<T>,
    loaded: Arc<watch::Sender<bool>>,
}

/// Create a loadable readable store.
///
/// # Example
///
/// ```rust
/// use loadstone_core::loadable::readable;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let greeting = readable(String::new(), |set| {
///     tokio::spawn(async move { set.set("hello".to_string()) });
///     None
/// });
///
/// assert_eq!(greeting.load().await.unwrap(), "hello");
/// # });
/// ```
pub fn readable<T, F>(initial: T, start: F) -> LoadableReadable<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
    F: Fn(Setter<T>) -> Option<Teardown> + Send + Sync + 'static,
{
    let (loaded, _) = watch::channel(false);
    let loaded = Arc::new(loaded);
    let flag = Arc::clone(&loaded);

    let cell = Writable::with_start(initial, move |set: Setter<T>| {
        let hook_flag = Arc::clone(&flag);
        let teardown = start(set.with_hook(move || {
            hook_flag.send_replace(true);
        }));

        // A restarted store counts as loaded only after its next first value.
        let reset_flag = Arc::clone(&flag);
        Some(Box::new(move || {
            if let Some(teardown) = teardown {
                teardown();
            }
            reset_flag.send_replace(false);
        }) as Teardown)
    });

    LoadableReadable { cell, loaded }
}

impl<T> LoadableReadable<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Get the cell ID backing this store.
    pub fn id(&self) -> u64 {
        self.cell.id()
    }

    /// Get a snapshot of the current value.
    pub fn get(&self) -> T {
        self.cell.get()
    }

    /// Register a callback for value changes.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.cell.subscribe(callback)
    }

    /// Always `Loadable`.
    pub fn capability(&self) -> Capability {
        Capability::Loadable
    }

    /// Resolve once the start function has set a value.
    pub fn load(&self) -> LoadFuture<T> {
        let mut loaded = self.loaded.subscribe();
        let cell = self.cell.clone();
        async move {
            let _running = cell.subscribe(|_| {});
            loaded
                .wait_for(|done| *done)
                .await
                .map(|_| ())
                .map_err(StoreError::new)?;
            Ok(cell.get())
        }
        .boxed()
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.cell.subscriber_count()
    }
}

impl<T> Clone for LoadableReadable<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
            loaded: Arc::clone(&self.loaded),
        }
    }
}

impl<T> Debug for LoadableReadable<T>
where
    T: Clone + PartialEq + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadableReadable")
            .field("id", &self.id())
            .field("value", &self.get())
            .field("loaded", &*self.loaded.borrow())
            .finish()
    }
}

impl<T> Readable for LoadableReadable<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    type Value = T;

    fn get(&self) -> T {
        LoadableReadable::get(self)
    }

    fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        LoadableReadable::subscribe(self, callback)
    }

    fn capability(&self) -> Capability {
        Capability::Loadable
    }

    fn load(&self) -> Option<LoadFuture<T>> {
        Some(LoadableReadable::load(self))
    }
}
