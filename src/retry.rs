use crate::{guarded::Guarded, Promise, Resolver};
use std::{mem, sync::Arc};
use tracing::debug;

impl<T, E> Promise<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Runs the computation made by `generator`, retrying up to `retries`
    /// more times while it fails.
    ///
    /// Every try gets a fresh promise from `generator`. The first success
    /// resolves the returned promise; once the retries are used up it
    /// rejects with the last error. Cancelling it cancels whichever try is
    /// in flight.
    ///
    /// ```
    /// use cancellable_promise::Promise;
    /// use std::sync::{atomic::{AtomicUsize, Ordering}, Arc};
    ///
    /// let tries = Arc::new(AtomicUsize::new(0));
    /// let counted = tries.clone();
    /// let flaky = Promise::attempt(5, move || {
    ///     match counted.fetch_add(1, Ordering::SeqCst) {
    ///         0..=2 => Promise::error("not yet"),
    ///         _ => Promise::value(42),
    ///     }
    /// });
    /// flaky.subscribe(|result| assert_eq!(result, Ok(42)));
    /// assert_eq!(tries.load(Ordering::SeqCst), 4);
    /// ```
    pub fn attempt(
        retries: usize,
        generator: impl Fn() -> Promise<T, E> + Send + Sync + 'static,
    ) -> Promise<T, E> {
        let generator = Arc::new(generator);
        Promise::new(move |resolver| launch(generator, resolver, retries, 1))
    }
}

/// Where an attempt's result goes: back to the loop that made the attempt if
/// it arrived during `subscribe`, otherwise to the callback.
enum Handoff<T, E> {
    Waiting,
    Ready(Result<T, E>),
    Detached,
}

fn launch<T, E, G>(generator: Arc<G>, resolver: Resolver<T, E>, mut remaining: usize, mut attempt: usize)
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
    G: Fn() -> Promise<T, E> + Send + Sync + 'static,
{
    // attempts that fail synchronously are retried here instead of recursing
    loop {
        if resolver.is_cancelled() {
            return;
        }
        let current = generator();
        let in_flight = current.clone();
        // runs at once if the outer promise got cancelled in the meantime
        resolver.on_cancel(move || in_flight.cancel());

        let handoff: Arc<Guarded<Handoff<T, E>>> = Arc::new(Guarded::new(Handoff::Waiting));
        let late = handoff.clone();
        let (next, target) = (generator.clone(), resolver.clone());
        current.subscribe(move |result| {
            let arrived = late.modify(move |handoff| match handoff {
                Handoff::Detached => Some(result),
                _ => {
                    *handoff = Handoff::Ready(result);
                    None
                }
            });
            if let Some(result) = arrived {
                if let Some((remaining, attempt)) = conclude(&target, result, remaining, attempt) {
                    launch(next, target, remaining, attempt)
                }
            }
        });

        let ready = handoff.modify(|handoff| match mem::replace(handoff, Handoff::Detached) {
            Handoff::Ready(result) => Some(result),
            _ => None,
        });
        let Some(result) = ready else { return };
        match conclude(&resolver, result, remaining, attempt) {
            Some((left, next)) => {
                remaining = left;
                attempt = next;
            }
            None => return,
        }
    }
}

/// Settles `resolver` with a final result, or hands back the budget for the
/// next attempt.
fn conclude<T, E>(
    resolver: &Resolver<T, E>,
    result: Result<T, E>,
    remaining: usize,
    attempt: usize,
) -> Option<(usize, usize)>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    match result {
        Ok(value) => {
            resolver.resolve(value);
            None
        }
        Err(_) if remaining > 0 => {
            debug!(attempt, remaining, "attempt failed; retrying");
            Some((remaining - 1, attempt + 1))
        }
        Err(error) => {
            debug!(attempt, "attempt failed; giving up");
            resolver.reject(error);
            None
        }
    }
}
