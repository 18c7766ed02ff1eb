//! Fan-in: wait for several independent promises at once.
//!
//! Inputs all start when the joined promise starts. Results are collected in
//! input order. The first error wins: every other input is cancelled and the
//! joined promise rejects with that error straight away.
use crate::{guarded::Guarded, promise::Cancellable, Promise, Resolver};
use std::{mem, sync::Arc};
use tracing::{debug, warn};

struct Gather<S> {
    slots: S,
    pending: usize,
    settled: bool,
}

/// Shared bookkeeping of one joined promise.
struct Join<S, O, E> {
    gather: Guarded<Gather<S>>,
    inputs: Vec<Box<dyn Cancellable>>,
    resolver: Resolver<O, E>,
    finish: fn(S) -> Option<O>,
}

impl<S, O, E> Join<S, O, E>
where
    S: Default + Send + 'static,
    O: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn start(
        slots: S,
        inputs: Vec<Box<dyn Cancellable>>,
        resolver: Resolver<O, E>,
        finish: fn(S) -> Option<O>,
    ) -> Arc<Self> {
        let join = Arc::new(Join {
            gather: Guarded::new(Gather {
                slots,
                pending: inputs.len(),
                settled: false,
            }),
            inputs,
            resolver: resolver.clone(),
            finish,
        });
        let weak = Arc::downgrade(&join);
        resolver.on_cancel(move || {
            if let Some(join) = weak.upgrade() {
                for input in &join.inputs {
                    input.cancel();
                }
            }
        });
        join
    }

    fn fulfil(&self, fill: impl FnOnce(&mut S)) {
        let filled = self.gather.modify(|gather| {
            if gather.settled {
                return None;
            }
            fill(&mut gather.slots);
            gather.pending -= 1;
            if gather.pending > 0 {
                return None;
            }
            gather.settled = true;
            Some(mem::take(&mut gather.slots))
        });
        let Some(slots) = filled else { return };
        match (self.finish)(slots) {
            Some(output) => self.resolver.resolve(output),
            None => warn!("fan-in finished with an empty slot"),
        }
    }

    fn fail(&self, index: usize, error: E) {
        let first = self
            .gather
            .modify(|gather| !mem::replace(&mut gather.settled, true));
        if !first {
            return;
        }
        debug!(index, inputs = self.inputs.len(), "fan-in input failed; cancelling the rest");
        for (sibling, input) in self.inputs.iter().enumerate() {
            if sibling != index {
                input.cancel();
            }
        }
        self.resolver.reject(error);
    }
}

/// A fixed group of promises that can be joined into one.
///
/// Implemented for `Vec<Promise<T, E>>` and for tuples of two to four
/// promises sharing an error type, where each slot keeps its own value type.
pub trait AllPromises {
    type Output;
    type Error;
    fn all(self) -> Promise<Self::Output, Self::Error>;
}

/// Joins a group of promises, see [`AllPromises`].
///
/// ```
/// use cancellable_promise::{all, Promise};
///
/// let joined = all((
///     Promise::<i32, ()>::value(42),
///     Promise::<&str, ()>::value("42"),
///     Promise::<bool, ()>::value(false),
/// ));
/// joined.subscribe(|result| assert_eq!(result, Ok((42, "42", false))));
/// ```
pub fn all<A: AllPromises>(promises: A) -> Promise<A::Output, A::Error> {
    promises.all()
}

impl<T, E> AllPromises for Vec<Promise<T, E>>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    type Output = Vec<T>;
    type Error = E;

    fn all(self) -> Promise<Vec<T>, E> {
        Promise::new(move |resolver| {
            if self.is_empty() {
                resolver.resolve(Vec::new());
                return;
            }
            let slots: Vec<Option<T>> = self.iter().map(|_| None).collect();
            let inputs = self
                .iter()
                .map(|promise| Box::new(promise.clone()) as Box<dyn Cancellable>)
                .collect();
            let join = Join::start(slots, inputs, resolver, |slots| {
                slots.into_iter().collect()
            });
            for (index, promise) in self.into_iter().enumerate() {
                let join = join.clone();
                promise.subscribe(move |result| match result {
                    Ok(value) => join.fulfil(move |slots| slots[index] = Some(value)),
                    Err(error) => join.fail(index, error),
                });
            }
        })
    }
}

macro_rules! impl_all_promises {
    ($($index:tt => $value:ident),+) => {
        impl<$($value,)+ E> AllPromises for ($(Promise<$value, E>,)+)
        where
            $($value: Clone + Send + 'static,)+
            E: Clone + Send + 'static,
        {
            type Output = ($($value,)+);
            type Error = E;

            fn all(self) -> Promise<Self::Output, E> {
                Promise::new(move |resolver| {
                    let inputs: Vec<Box<dyn Cancellable>> = vec![$(Box::new(self.$index.clone()) as Box<dyn Cancellable>,)+];
                    let join = Join::start(
                        Default::default(),
                        inputs,
                        resolver,
                        |slots: ($(Option<$value>,)+)| Some(($(slots.$index?,)+)),
                    );
                    $(
                        let watcher = join.clone();
                        self.$index.subscribe(move |result| match result {
                            Ok(value) => watcher.fulfil(move |slots| slots.$index = Some(value)),
                            Err(error) => watcher.fail($index, error),
                        });
                    )+
                })
            }
        }
    };
}

impl_all_promises!(0 => A, 1 => B);
impl_all_promises!(0 => A, 1 => B, 2 => C);
impl_all_promises!(0 => A, 1 => B, 2 => C, 3 => D);

impl<T, E> Promise<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Joins promises of one type, resolving with their values in the order
    /// they were given, not the order they completed in.
    pub fn all(promises: impl IntoIterator<Item = Promise<T, E>>) -> Promise<Vec<T>, E> {
        promises.into_iter().collect::<Vec<_>>().all()
    }
}
