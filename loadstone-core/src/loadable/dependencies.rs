//! Dependency sets.
//!
//! A derived store reads from an ordered set of parents. The shape of that
//! set decides the shape of the values handed to the mapping function:
//!
//! | Declared as            | Mapping function receives | `load_all` resolves to |
//! |------------------------|---------------------------|------------------------|
//! | `()`                   | `()`                      | `()`                   |
//! | a single store `s`     | `s`'s value, bare         | `vec![value]`          |
//! | `(a,)`, `(a, b)`, ...  | a tuple of values         | the same tuple         |
//! | `Vec<S>`               | `Vec<S::Value>`           | the same `Vec`         |
//!
//! Tuples carry stores of different value types; a `Vec` carries any number
//! of stores of one type.

use std::sync::Arc;

use futures_util::future::{self, FutureExt, TryFutureExt};

use super::async_store::AsyncStore;
use super::async_writable::AsyncWritable;
use super::capability::{Capability, Readable};
use super::dispatch::{load_one, reload_one};
use super::readable::LoadableReadable;
use super::LoadFuture;
use crate::reactive::{Derived, Subscription, Writable};

/// Callback fired when any member of a dependency set changes.
pub type ChangeHook = Arc<dyn Fn() + Send + Sync>;

/// An ordered set of parent stores.
pub trait Dependencies: Clone + Send + Sync + 'static {
    /// Values of every member, in declaration shape.
    type Values: Clone + PartialEq + Send + Sync + 'static;

    /// Values as [`load_all`](crate::loadable::load_all) reports them.
    type Listed: Send + 'static;

    /// Convert a snapshot into its listed form.
    fn listed(values: Self::Values) -> Self::Listed;

    /// Strongest capability among the members.
    fn capability(&self) -> Capability;

    /// Synchronous snapshot of every member.
    fn current(&self) -> Self::Values;

    /// Load every member concurrently and join.
    fn load_all(&self) -> LoadFuture<Self::Values>;

    /// Reload every member concurrently and join.
    fn reload_all(&self) -> LoadFuture<Self::Values>;

    /// Subscribe `on_change` to every member.
    ///
    /// Subscribing invokes the hook once per member straight away, as
    /// [`Readable::subscribe`] does.
    fn subscribe_all(&self, on_change: ChangeHook) -> Vec<Subscription>;
}

impl Dependencies for () {
    type Values = ();
    type Listed = ();

    fn listed(values: Self::Values) -> Self::Listed {
        values
    }

    fn capability(&self) -> Capability {
        Capability::Plain
    }

    fn current(&self) -> Self::Values {}

    fn load_all(&self) -> LoadFuture<()> {
        future::ready(Ok(())).boxed()
    }

    fn reload_all(&self) -> LoadFuture<()> {
        future::ready(Ok(())).boxed()
    }

    fn subscribe_all(&self, _on_change: ChangeHook) -> Vec<Subscription> {
        Vec::new()
    }
}

macro_rules! single_store_dependencies {
    ($store:ident < $($param:ident),+ > where $($bounds:tt)+) => {
        impl<$($param),+> Dependencies for $store<$($param),+>
        where
            $($bounds)+
        {
            type Values = <Self as Readable>::Value;
            type Listed = Vec<Self::Values>;

            fn listed(values: Self::Values) -> Self::Listed {
                vec![values]
            }

            fn capability(&self) -> Capability {
                Readable::capability(self)
            }

            fn current(&self) -> Self::Values {
                Readable::get(self)
            }

            fn load_all(&self) -> LoadFuture<Self::Values> {
                load_one(self)
            }

            fn reload_all(&self) -> LoadFuture<Self::Values> {
                reload_one(self)
            }

            fn subscribe_all(&self, on_change: ChangeHook) -> Vec<Subscription> {
                vec![Readable::subscribe(self, move |_| on_change())]
            }
        }
    };
}

single_store_dependencies!(Writable<T> where T: Clone + PartialEq + Send + Sync + 'static);
single_store_dependencies!(LoadableReadable<T> where T: Clone + PartialEq + Send + Sync + 'static);
single_store_dependencies!(Derived<D, T> where D: Dependencies, T: Clone + PartialEq + Send + Sync + 'static);
single_store_dependencies!(AsyncStore<D, T> where D: Dependencies, T: Clone + PartialEq + Send + Sync + 'static);
single_store_dependencies!(AsyncWritable<D, T> where D: Dependencies, T: Clone + PartialEq + Send + Sync + 'static);

impl<S: Readable> Dependencies for Vec<S> {
    type Values = Vec<S::Value>;
    type Listed = Self::Values;

    fn listed(values: Self::Values) -> Self::Listed {
        values
    }

    fn capability(&self) -> Capability {
        Capability::inherit(self.iter().map(Readable::capability))
    }

    fn current(&self) -> Self::Values {
        self.iter().map(Readable::get).collect()
    }

    fn load_all(&self) -> LoadFuture<Self::Values> {
        future::try_join_all(self.iter().map(load_one)).boxed()
    }

    fn reload_all(&self) -> LoadFuture<Self::Values> {
        future::try_join_all(self.iter().map(reload_one)).boxed()
    }

    fn subscribe_all(&self, on_change: ChangeHook) -> Vec<Subscription> {
        self.iter()
            .map(|store| {
                let on_change = Arc::clone(&on_change);
                store.subscribe(move |_| on_change())
            })
            .collect()
    }
}

impl<A: Readable> Dependencies for (A,) {
    type Values = (A::Value,);
    type Listed = Self::Values;

    fn listed(values: Self::Values) -> Self::Listed {
        values
    }

    fn capability(&self) -> Capability {
        Readable::capability(&self.0)
    }

    fn current(&self) -> Self::Values {
        (self.0.get(),)
    }

    fn load_all(&self) -> LoadFuture<Self::Values> {
        load_one(&self.0).map_ok(|a| (a,)).boxed()
    }

    fn reload_all(&self) -> LoadFuture<Self::Values> {
        reload_one(&self.0).map_ok(|a| (a,)).boxed()
    }

    fn subscribe_all(&self, on_change: ChangeHook) -> Vec<Subscription> {
        vec![self.0.subscribe(move |_| on_change())]
    }
}

macro_rules! tuple_dependencies {
    ($($param:ident $var:ident),+) => {
        impl<$($param: Readable),+> Dependencies for ($($param,)+) {
            type Values = ($(<$param as Readable>::Value,)+);
            type Listed = Self::Values;

            fn listed(values: Self::Values) -> Self::Listed {
                values
            }

            fn capability(&self) -> Capability {
                let ($($var,)+) = self;
                Capability::inherit([$(Readable::capability($var)),+])
            }

            fn current(&self) -> Self::Values {
                let ($($var,)+) = self;
                ($($var.get(),)+)
            }

            fn load_all(&self) -> LoadFuture<Self::Values> {
                let ($($var,)+) = self;
                $(let $var = load_one($var);)+
                async move { futures_util::try_join!($($var),+) }.boxed()
            }

            fn reload_all(&self) -> LoadFuture<Self::Values> {
                let ($($var,)+) = self;
                $(let $var = reload_one($var);)+
                async move { futures_util::try_join!($($var),+) }.boxed()
            }

            fn subscribe_all(&self, on_change: ChangeHook) -> Vec<Subscription> {
                let ($($var,)+) = self;
                vec![$({
                    let on_change = Arc::clone(&on_change);
                    $var.subscribe(move |_| on_change())
                }),+]
            }
        }
    };
}

tuple_dependencies!(A a, B b);
tuple_dependencies!(A a, B b, C c);
tuple_dependencies!(A a, B b, C c, D d);
tuple_dependencies!(A a, B b, C c, D d, E e);
tuple_dependencies!(A a, B b, C c, D d, E e, F f);

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn single_store_is_bare() {
        let cell = Writable::new(4);
        let value: i32 = Dependencies::current(&cell);
        assert_eq!(value, 4);
    }

    #[test]
    fn one_tuple_is_wrapped() {
        let cell = Writable::new(4);
        assert_eq!((cell,).current(), (4,));
    }

    #[test]
    fn heterogeneous_tuple_snapshot() {
        let a = Writable::new(1);
        let b = Writable::new(String::from("b"));
        let c = Writable::new(true);
        assert_eq!((a, b, c).current(), (1, String::from("b"), true));
    }

    #[test]
    fn subscribe_all_fires_for_each_member() {
        let a = Writable::new(1);
        let b = Writable::new(2);
        let hits = Arc::new(AtomicUsize::new(0));

        let subs = (a.clone(), b.clone()).subscribe_all({
            let hits = hits.clone();
            Arc::new(move || {
                hits.fetch_add(1, Ordering::SeqCst);
            })
        });
        assert_eq!(subs.len(), 2);
        assert_eq!(hits.load(Ordering::SeqCst), 2);

        a.set(10);
        b.set(20);
        assert_eq!(hits.load(Ordering::SeqCst), 4);

        drop(subs);
        a.set(11);
        assert_eq!(hits.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn empty_set_is_plain() {
        assert_eq!(().capability(), Capability::Plain);
        assert!(().subscribe_all(Arc::new(|| {})).is_empty());
    }
}
