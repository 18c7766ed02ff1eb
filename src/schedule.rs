//! Moving promise work onto a scheduler.
//!
//! The promise core never hops threads by itself. The adapters here take
//! the [`Scheduler`] to use as an explicit argument; there is no default.
use crate::Promise;
use parking_lot::Mutex;
use std::{sync::Arc, thread, time::Duration};
use tracing::warn;

/// A unit of work handed to a [`Scheduler`].
pub type Work = Box<dyn FnOnce() + Send>;

/// Something that runs work now or after a delay, somewhere.
pub trait Scheduler: Send + Sync + 'static {
    fn run_now(&self, work: Work);
    fn run_after(&self, delay: Duration, work: Work);
}

impl<S: Scheduler + ?Sized> Scheduler for Arc<S> {
    fn run_now(&self, work: Work) {
        (**self).run_now(work)
    }

    fn run_after(&self, delay: Duration, work: Work) {
        (**self).run_after(delay, work)
    }
}

/// Runs every piece of work on a fresh thread.
///
/// If a thread cannot be spawned the work runs on the calling thread
/// instead, so that it is never lost.
#[derive(Debug, Clone)]
pub struct ThreadScheduler {
    name: String,
}

impl ThreadScheduler {
    pub fn new() -> Self {
        Self::named("promise")
    }

    /// Names the spawned threads `name`.
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn spawn(&self, delay: Option<Duration>, work: Work) {
        let slot = Arc::new(Mutex::new(Some(work)));
        let job = slot.clone();
        let spawned = thread::Builder::new().name(self.name.clone()).spawn(move || {
            if let Some(delay) = delay {
                thread::sleep(delay);
            }
            let work = job.lock().take();
            if let Some(work) = work {
                work()
            }
        });
        if let Err(error) = spawned {
            warn!(%error, name = %self.name, "could not spawn scheduler thread; running inline");
            if let Some(delay) = delay {
                thread::sleep(delay);
            }
            let work = slot.lock().take();
            if let Some(work) = work {
                work()
            }
        }
    }
}

impl Default for ThreadScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for ThreadScheduler {
    fn run_now(&self, work: Work) {
        self.spawn(None, work)
    }

    fn run_after(&self, delay: Duration, work: Work) {
        self.spawn(Some(delay), work)
    }
}

/// Runs work on the calling thread, sleeping it for delayed work.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineScheduler;

impl Scheduler for InlineScheduler {
    fn run_now(&self, work: Work) {
        work()
    }

    fn run_after(&self, delay: Duration, work: Work) {
        thread::sleep(delay);
        work()
    }
}

impl<T, E> Promise<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// A promise that starts `self` through `scheduler`.
    pub fn start_on<S: Scheduler>(&self, scheduler: S) -> Promise<T, E> {
        let source = self.clone();
        Promise::new(move |resolver| {
            let cancel = source.clone();
            resolver.on_cancel(move || cancel.cancel());
            scheduler.run_now(Box::new(move || {
                source.subscribe(move |result| resolver.complete(result));
            }));
        })
    }

    /// A promise that hands `self`'s result to its subscribers through
    /// `scheduler`.
    pub fn complete_on<S: Scheduler>(&self, scheduler: S) -> Promise<T, E> {
        let source = self.clone();
        Promise::new(move |resolver| {
            let cancel = source.clone();
            resolver.on_cancel(move || cancel.cancel());
            source.subscribe(move |result| {
                scheduler.run_now(Box::new(move || resolver.complete(result)));
            });
        })
    }

    /// A promise that reports `self`'s result `delay` after it arrives.
    ///
    /// Only the observation is postponed. If the delayed promise gets
    /// cancelled meanwhile, the postponed result is dropped.
    ///
    /// ```
    /// use cancellable_promise::{schedule::ThreadScheduler, Promise};
    /// use std::time::{Duration, Instant};
    ///
    /// let begin = Instant::now();
    /// let late = Promise::<i32, ()>::value(42)
    ///     .delayed(Duration::from_millis(50), ThreadScheduler::new());
    /// assert_eq!(late.wait(), Ok(Ok(42)));
    /// assert!(begin.elapsed() >= Duration::from_millis(50));
    /// ```
    pub fn delayed<S: Scheduler>(&self, delay: Duration, scheduler: S) -> Promise<T, E> {
        let source = self.clone();
        Promise::new(move |resolver| {
            let cancel = source.clone();
            resolver.on_cancel(move || cancel.cancel());
            source.subscribe(move |result| {
                scheduler.run_after(delay, Box::new(move || resolver.complete(result)));
            });
        })
    }
}
