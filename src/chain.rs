//! Sequential composition: run one computation, then derive the next one
//! from its outcome.
use crate::{guarded::Guarded, Promise};
use std::sync::Arc;
use tracing::debug;

/// What a chained promise knows about its two stages.
struct Link<P, N> {
    cancelled: bool,
    /// Held until the first stage reports, after which nothing here needs it.
    upstream: Option<P>,
    inner: Option<N>,
}

impl<T, E> Promise<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Builds a promise that, once started, waits for `self` and then runs
    /// whatever promise `transform` makes out of its result.
    ///
    /// Cancelling the chained promise cancels the second stage if it exists
    /// already, and prevents `transform` from running at all if it does not.
    /// `self` is left alone: other subscribers may still be waiting on it.
    pub fn chain<T1, E1>(
        &self,
        transform: impl FnOnce(Result<T, E>) -> Promise<T1, E1> + Send + 'static,
    ) -> Promise<T1, E1>
    where
        T1: Clone + Send + 'static,
        E1: Clone + Send + 'static,
    {
        let parent = self.clone();
        Promise::new(move |resolver| {
            let link: Arc<Guarded<Link<Promise<T, E>, Promise<T1, E1>>>> =
                Arc::new(Guarded::new(Link {
                    cancelled: false,
                    upstream: Some(parent.clone()),
                    inner: None,
                }));

            let cancelling = link.clone();
            resolver.on_cancel(move || {
                let (upstream, inner) = cancelling.modify(|link| {
                    link.cancelled = true;
                    (link.upstream.take(), link.inner.take())
                });
                drop(upstream);
                if let Some(inner) = inner {
                    inner.cancel();
                }
            });

            parent.subscribe(move |result| {
                let (upstream, cancelled) =
                    link.modify(|link| (link.upstream.take(), link.cancelled));
                drop(upstream);
                if cancelled {
                    debug!("chained promise cancelled before its parent finished; skipping transform");
                    return;
                }
                let inner = transform(result);
                // cancellation may have landed while `transform` was running
                let recorded = link.modify(|link| {
                    if !link.cancelled {
                        link.inner = Some(inner.clone());
                    }
                    !link.cancelled
                });
                if !recorded {
                    inner.cancel();
                    return;
                }
                inner.subscribe(move |result| resolver.complete(result));
            });
        })
    }

    /// Continues with `transform` on success. Errors skip it and pass
    /// through unchanged.
    ///
    /// ```
    /// use cancellable_promise::Promise;
    ///
    /// let sum = Promise::<i32, ()>::value(42).then(|v| Promise::value(v + 10));
    /// sum.subscribe(|result| assert_eq!(result, Ok(52)));
    /// ```
    pub fn then<V>(
        &self,
        transform: impl FnOnce(T) -> Promise<V, E> + Send + 'static,
    ) -> Promise<V, E>
    where
        V: Clone + Send + 'static,
    {
        self.chain(move |result| match result {
            Ok(value) => transform(value),
            Err(error) => Promise::error(error),
        })
    }

    /// Recovers from an error with `transform`. Successes pass through.
    pub fn or_else<F>(
        &self,
        transform: impl FnOnce(E) -> Promise<T, F> + Send + 'static,
    ) -> Promise<T, F>
    where
        F: Clone + Send + 'static,
    {
        self.chain(move |result| match result {
            Ok(value) => Promise::value(value),
            Err(error) => transform(error),
        })
    }

    pub fn map<V>(&self, transform: impl FnOnce(T) -> V + Send + 'static) -> Promise<V, E>
    where
        V: Clone + Send + 'static,
    {
        self.then(move |value| Promise::value(transform(value)))
    }

    pub fn map_err<F>(&self, transform: impl FnOnce(E) -> F + Send + 'static) -> Promise<T, F>
    where
        F: Clone + Send + 'static,
    {
        self.or_else(move |error| Promise::error(transform(error)))
    }
}

#[cfg(test)]
mod tests {
    use crate::{Promise, Resolver, Status};
    use parking_lot::Mutex;
    use std::sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    };

    type Parked<T, E> = Arc<Mutex<Option<Resolver<T, E>>>>;

    fn parked<T, E>() -> (Promise<T, E>, Parked<T, E>)
    where
        T: Clone + Send + 'static,
        E: Clone + Send + 'static,
    {
        let slot: Parked<T, E> = Arc::new(Mutex::new(None));
        let keep = slot.clone();
        (Promise::new(move |resolver| *keep.lock() = Some(resolver)), slot)
    }

    fn record<T>(promise: &Promise<T, &'static str>) -> Arc<Mutex<Vec<Result<T, &'static str>>>>
    where
        T: Clone + Send + 'static,
    {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        promise.subscribe(move |result| sink.lock().push(result));
        seen
    }

    #[test]
    fn test_then_waits_for_parent() {
        let (parent, slot) = parked::<i32, &'static str>();
        let chained = parent.then(|v| Promise::value(v * 2));
        let seen = record(&chained);
        assert_eq!(parent.status(), Status::Executing);
        assert!(seen.lock().is_empty());
        slot.lock().take().unwrap().resolve(21);
        assert_eq!(*seen.lock(), vec![Ok(42)]);
    }

    #[test]
    fn test_then_passes_errors_through() {
        let called = Arc::new(AtomicBool::new(false));
        let flag = called.clone();
        let chained = Promise::<i32, &'static str>::error("💥").then(move |v| {
            flag.store(true, Ordering::SeqCst);
            Promise::value(v)
        });
        assert_eq!(*record(&chained).lock(), vec![Err("💥")]);
        assert!(!called.load(Ordering::SeqCst));
    }

    #[test]
    fn test_or_else_recovers() {
        let recovered = Promise::<i32, &'static str>::error("💥")
            .or_else(|_| Promise::<i32, &'static str>::value(42));
        assert_eq!(*record(&recovered).lock(), vec![Ok(42)]);
    }

    #[test]
    fn test_map_and_map_err() {
        let mapped = Promise::<i32, &'static str>::value(4).map(|v| v + 1);
        assert_eq!(mapped.peek(), None);
        assert_eq!(*record(&mapped).lock(), vec![Ok(5)]);

        let mapped = Promise::<i32, &'static str>::error("x").map_err(|e| e.len());
        mapped.subscribe(|result| assert_eq!(result, Err(1)));
    }

    #[test]
    fn test_cancel_before_parent_skips_transform() {
        let (parent, slot) = parked::<i32, &'static str>();
        let called = Arc::new(AtomicBool::new(false));
        let flag = called.clone();
        let chained = parent.then(move |v| {
            flag.store(true, Ordering::SeqCst);
            Promise::value(v)
        });
        let seen = record(&chained);
        chained.cancel();
        slot.lock().take().unwrap().resolve(1);
        assert!(!called.load(Ordering::SeqCst));
        assert!(seen.lock().is_empty());
        // the parent is not owned by the chain and completes normally
        assert_eq!(parent.peek(), Some(Ok(1)));
    }

    #[test]
    fn test_cancel_reaches_inner_stage() {
        let (inner, inner_slot) = parked::<i32, &'static str>();
        let stopped = Arc::new(AtomicUsize::new(0));
        let chained = {
            let inner = inner.clone();
            Promise::<i32, &'static str>::value(1).then(move |_| inner)
        };
        record(&chained);
        let counted = stopped.clone();
        inner_slot
            .lock()
            .as_ref()
            .unwrap()
            .on_cancel(move || {
                counted.fetch_add(1, Ordering::SeqCst);
            });
        chained.cancel();
        assert_eq!(stopped.load(Ordering::SeqCst), 1);
        assert_eq!(inner.status(), Status::Cancelled);
    }

    #[test]
    fn test_cancel_while_transform_runs_cancels_new_stage() {
        let handle: Arc<Mutex<Option<Promise<i32, &'static str>>>> = Arc::default();
        let (inner, _inner_slot) = parked::<i32, &'static str>();
        let chained = {
            let handle = handle.clone();
            let inner = inner.clone();
            Promise::<i32, &'static str>::value(1).then(move |_| {
                // cancel lands between producing the stage and recording it
                let chained = handle.lock().clone().unwrap();
                chained.cancel();
                inner
            })
        };
        *handle.lock() = Some(chained.clone());
        let seen = record(&chained);
        assert_eq!(inner.status(), Status::Cancelled);
        assert!(seen.lock().is_empty());
    }
}
