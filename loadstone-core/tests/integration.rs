//! Integration Tests for Loadable Stores
//!
//! These tests verify that cells, derived stores, and asynchronous stores
//! load and reload correctly across a dependency graph.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures_util::FutureExt;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

use loadstone_core::loadable::{
    async_derived, async_readable, async_writable, has_load, has_reload, load_all, reload_all,
    safe_load, Capability, LoadFuture, LoadOptions, LoadState,
};
use loadstone_core::reactive::{derived, log_async_errors, Writable};
use loadstone_core::StoreError;

/// Mapping function returning how many times it has been called.
fn counter(calls: &Arc<AtomicUsize>) -> impl Fn() -> LoadFuture<usize> + Send + Sync + 'static {
    let calls = Arc::clone(calls);
    move || {
        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        async move { Ok(n) }.boxed()
    }
}

/// Plain stores load without waiting.
#[test]
fn plain_stores_load_immediately() {
    let a = Writable::new(1);
    let b = Writable::new(2);

    let values = load_all(&vec![a.clone(), b.clone()]).now_or_never();
    assert_eq!(values.unwrap().unwrap(), vec![1, 2]);

    let single = load_all(&a).now_or_never();
    assert_eq!(single.unwrap().unwrap(), vec![1]);
}

/// A single rejection fails the whole aggregate with that exact error.
#[tokio::test]
async fn aggregate_rejects_with_member_error() {
    let err = StoreError::msg("members unavailable");
    let failing = async_readable(
        0usize,
        {
            let err = err.clone();
            move || {
                let err = err.clone();
                async move { Err::<usize, _>(err) }
            }
        },
        true,
    );
    let calls = Arc::new(AtomicUsize::new(0));
    let fine = async_readable(0usize, counter(&calls), false);

    let loaded = load_all(&vec![fine.clone(), failing.clone()]).await;
    assert!(loaded.unwrap_err().same_as(&err));

    let reloaded = reload_all(&(failing, fine)).await;
    assert!(reloaded.unwrap_err().same_as(&err));
}

/// Non-reloadable stores expose no reload and run their mapping once.
#[tokio::test]
async fn async_readable_without_reload() {
    let calls = Arc::new(AtomicUsize::new(0));
    let store = async_readable(0, counter(&calls), false);

    assert!(has_load(&store));
    assert!(!has_reload(&store));
    assert!(store.reload().is_none());

    assert_eq!(store.load().await.unwrap(), 1);
    assert_eq!(store.load().await.unwrap(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

/// Reload on a reloadable store reruns the mapping and publishes the result.
#[tokio::test]
async fn async_readable_with_reload() {
    let calls = Arc::new(AtomicUsize::new(0));
    let store = async_readable(0, counter(&calls), true);

    assert_eq!(store.load().await.unwrap(), 1);
    assert_eq!(store.reload().unwrap().await.unwrap(), 2);
    assert_eq!(store.get(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

/// A single-parent async store recomputes only when the parent value changes.
#[tokio::test]
async fn async_derived_dedups_on_parent_value() {
    let parent = Writable::new(1);
    let calls = Arc::new(AtomicUsize::new(0));
    let child = async_derived(
        parent.clone(),
        {
            let calls = calls.clone();
            move |v: i32| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Ok(v * 10) }
            }
        },
        LoadOptions::new(0),
    );

    assert_eq!(child.load().await.unwrap(), 10);
    parent.set(2);
    assert_eq!(child.load().await.unwrap(), 20);
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    parent.set(2);
    assert_eq!(child.load().await.unwrap(), 20);
    parent.set(3);
    parent.set(2);
    assert_eq!(child.load().await.unwrap(), 20);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

/// A store over several parents waits for the asynchronous one.
#[tokio::test]
async fn async_derived_waits_for_async_parent() {
    let (release, gate) = oneshot::channel::<()>();
    let gate = Arc::new(Mutex::new(Some(gate)));
    let slow = async_readable(
        0,
        move || {
            let gate = gate.lock().take();
            async move {
                if let Some(gate) = gate {
                    gate.await.map_err(StoreError::new)?;
                }
                Ok(100)
            }
        },
        false,
    );
    let fast = Writable::new(1);
    let sum = async_derived(
        (slow, fast),
        |(s, f)| async move { Ok(s + f) },
        LoadOptions::new(0),
    );

    let pending = tokio::spawn(sum.load());
    tokio::task::yield_now().await;
    assert!(!pending.is_finished());
    assert_eq!(sum.get(), 0);

    release.send(()).unwrap();
    assert_eq!(pending.await.unwrap().unwrap(), 101);
    assert_eq!(sum.get(), 101);
}

/// Rapid parent changes while a slow parent loads resolve to the last one.
#[tokio::test]
async fn rapid_changes_resolve_to_last_value() {
    let (release, gate) = oneshot::channel::<()>();
    let gate = Arc::new(Mutex::new(Some(gate)));
    let slow = async_readable(
        String::new(),
        move || {
            let gate = gate.lock().take();
            async move {
                if let Some(gate) = gate {
                    gate.await.map_err(StoreError::new)?;
                }
                Ok("slow".to_string())
            }
        },
        false,
    );
    let fast = Writable::new("-".to_string());
    let calls = Arc::new(AtomicUsize::new(0));
    let combined = async_derived(
        (slow, fast.clone()),
        {
            let calls = calls.clone();
            move |(s, f): (String, String)| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Ok(format!("{s}+{f}")) }
            }
        },
        LoadOptions::new(String::new()),
    );

    let _sub = combined.subscribe(|_| {});
    for letter in 'A'..='L' {
        fast.set(letter.to_string());
    }
    tokio::task::yield_now().await;

    release.send(()).unwrap();
    assert_eq!(combined.load().await.unwrap(), "slow+L");
    assert_eq!(combined.get(), "slow+L");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

/// Writes are visible before the write function settles.
#[tokio::test]
async fn async_writable_publishes_before_write_settles() {
    let (release, gate) = oneshot::channel::<()>();
    let gate = Arc::new(Mutex::new(Some(gate)));
    let store = async_writable(
        (),
        |()| async { Ok(String::from("server")) },
        move |value: String, ()| {
            let gate = gate.lock().take();
            async move {
                if let Some(gate) = gate {
                    gate.await.map_err(StoreError::new)?;
                }
                Ok(Some(value.to_uppercase()))
            }
        },
        LoadOptions::new(String::new()),
    );

    let saving = tokio::spawn(store.set("draft".to_string()));
    assert_eq!(store.get(), "draft");

    release.send(()).unwrap();
    saving.await.unwrap().unwrap();
    assert_eq!(store.get(), "DRAFT");
}

/// Reload reruns reloadable ancestors and only loads the rest.
#[tokio::test]
async fn reload_is_selective() {
    let reloadable_calls = Arc::new(AtomicUsize::new(0));
    let loadable_calls = Arc::new(AtomicUsize::new(0));
    let reloadable = async_readable(0, counter(&reloadable_calls), true);
    let loadable = async_readable(0, counter(&loadable_calls), false);

    let sum = async_derived(
        (reloadable, loadable),
        |(r, l)| async move { Ok(r + l) },
        LoadOptions::new(0),
    );
    let scaled = derived(sum.clone(), |s| s * 10);

    assert_eq!(sum.capability(), Capability::Reloadable);
    assert_eq!(scaled.capability(), Capability::Reloadable);

    assert_eq!(scaled.load().unwrap().await.unwrap(), 20);
    assert_eq!(scaled.reload().unwrap().await.unwrap(), 30);
    assert_eq!(reloadable_calls.load(Ordering::SeqCst), 2);
    assert_eq!(loadable_calls.load(Ordering::SeqCst), 1);
}

/// A failure deep in the graph surfaces unchanged at the leaf.
#[tokio::test]
async fn deep_failure_surfaces_at_leaf() {
    let err = StoreError::msg("root unavailable");
    let root = async_readable(
        0,
        {
            let err = err.clone();
            move || {
                let err = err.clone();
                async move { Err::<i32, _>(err) }
            }
        },
        false,
    );
    let middle = derived(root, |v| v + 1);
    let leaf_calls = Arc::new(AtomicUsize::new(0));
    let leaf = async_derived(
        middle,
        {
            let leaf_calls = leaf_calls.clone();
            move |v: i32| {
                leaf_calls.fetch_add(1, Ordering::SeqCst);
                async move { Ok(v * 2) }
            }
        },
        LoadOptions::new(-1),
    );

    assert!(leaf.load().await.unwrap_err().same_as(&err));
    assert_eq!(leaf.get(), -1);
    assert_eq!(leaf_calls.load(Ordering::SeqCst), 0);
    assert!(!safe_load(&leaf).await);
}

/// Subscribed stores follow parent changes without anyone calling load.
#[tokio::test]
async fn subscription_follows_parent_changes() {
    let parent = Writable::new(1);
    let child = async_derived(
        parent.clone(),
        |v: i32| async move { Ok(v + 1000) },
        LoadOptions::new(0).named("follower"),
    );

    let (tx, mut rx) = mpsc::unbounded_channel();
    let sub = child.subscribe(move |v| {
        let _ = tx.send(*v);
    });

    assert_eq!(rx.recv().await, Some(0));
    assert_eq!(rx.recv().await, Some(1001));

    parent.set(5);
    assert_eq!(rx.recv().await, Some(1005));
    assert_eq!(child.state(), LoadState::Settled);

    assert_eq!(parent.subscriber_count(), 1);
    drop(sub);
    assert_eq!(parent.subscriber_count(), 0);
}

/// Background failures go to the installed handler with the store's name.
#[tokio::test]
async fn background_failures_reach_handler() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    log_async_errors(move |source, error| {
        if source.name == Some("flaky-feed") {
            let _ = tx.send(error.to_string());
        }
    });

    let feed = async_derived(
        (),
        |()| async { Err::<i32, _>(StoreError::msg("feed offline")) },
        LoadOptions::new(0).named("flaky-feed"),
    );
    let _sub = feed.subscribe(|_| {});

    assert_eq!(rx.recv().await.as_deref(), Some("feed offline"));
    assert_eq!(feed.get(), 0);
    assert_eq!(feed.state(), LoadState::Failed);
}
