//! Waiting on a promise from code that is not callback driven: blocking
//! threads and `async` blocks.
//!
//! Both flavours subscribe a callback that owns an [`Arm`]. A cancelled
//! promise drops its callbacks without calling them, and dropping an unfired
//! arm is what tells the waiter that no result is coming.
use crate::{Error, Promise};
use parking_lot::{Condvar, Mutex};
use std::{
    future::{Future, IntoFuture},
    pin::Pin,
    sync::Arc,
    task::{Context, Poll, Waker},
    time::{Duration, Instant},
};

type Outcome<T, E> = Result<Result<T, E>, Error>;

struct Slot<T, E> {
    outcome: Option<Outcome<T, E>>,
    settled: bool,
    waker: Option<Waker>,
}

struct Latch<T, E> {
    slot: Mutex<Slot<T, E>>,
    ready: Condvar,
}

impl<T, E> Latch<T, E> {
    fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                outcome: None,
                settled: false,
                waker: None,
            }),
            ready: Condvar::new(),
        }
    }

    fn settle(&self, outcome: Outcome<T, E>) {
        let waker = {
            let mut slot = self.slot.lock();
            if slot.settled {
                return;
            }
            slot.settled = true;
            slot.outcome = Some(outcome);
            self.ready.notify_all();
            slot.waker.take()
        };
        if let Some(waker) = waker {
            waker.wake()
        }
    }

    fn block(&self, timeout: Option<Duration>) -> Outcome<T, E> {
        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        let mut slot = self.slot.lock();
        loop {
            if let Some(outcome) = slot.outcome.take() {
                return outcome;
            }
            match (deadline, timeout) {
                (Some(deadline), Some(timeout)) => {
                    if self.ready.wait_until(&mut slot, deadline).timed_out() {
                        return slot.outcome.take().unwrap_or(Err(Error::Timeout(timeout)));
                    }
                }
                _ => self.ready.wait(&mut slot),
            }
        }
    }

    fn poll(&self, cx: &mut Context<'_>) -> Poll<Outcome<T, E>> {
        let mut slot = self.slot.lock();
        match slot.outcome.take() {
            Some(outcome) => Poll::Ready(outcome),
            None => {
                slot.waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}

/// Reports into a [`Latch`] exactly once: with the result when fired, or
/// with [`Error::Cancelled`] when dropped unfired.
struct Arm<T, E>(Arc<Latch<T, E>>);

impl<T, E> Arm<T, E> {
    fn fire(self, result: Result<T, E>) {
        self.0.settle(Ok(result));
    }
}

impl<T, E> Drop for Arm<T, E> {
    fn drop(&mut self) {
        self.0.settle(Err(Error::Cancelled));
    }
}

impl<T, E> Promise<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn latch(&self) -> Arc<Latch<T, E>> {
        let latch = Arc::new(Latch::new());
        let arm = Arm(latch.clone());
        self.subscribe(move |result| arm.fire(result));
        latch
    }

    /// Blocks the calling thread until the promise completes, starting it if
    /// needed.
    ///
    /// Fails with [`Error::Cancelled`] if the promise is or gets cancelled. A
    /// computation that never reports back blocks forever; see
    /// [`wait_timeout`](Promise::wait_timeout).
    pub fn wait(&self) -> Result<Result<T, E>, Error> {
        self.latch().block(None)
    }

    /// Like [`wait`](Promise::wait), giving up with [`Error::Timeout`] after
    /// `timeout`. Giving up does not cancel the promise.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<Result<T, E>, Error> {
        self.latch().block(Some(timeout))
    }
}

/// Future returned by awaiting a [`Promise`]. The first poll subscribes.
///
/// ```
/// use cancellable_promise::Promise;
/// use futures::executor::block_on;
/// use std::thread;
///
/// let promise = Promise::<String, ()>::new(|resolver| {
///     thread::spawn(move || resolver.resolve("Hi".into()));
/// });
/// let received = block_on(async { promise.await });
/// assert_eq!(received, Ok(Ok("Hi".to_string())));
/// ```
pub struct Waiter<T, E> {
    promise: Promise<T, E>,
    latch: Option<Arc<Latch<T, E>>>,
}

impl<T, E> Future for Waiter<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    type Output = Result<Result<T, E>, Error>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let latch = match self.latch.clone() {
            Some(latch) => latch,
            None => {
                let latch = self.promise.latch();
                self.latch = Some(latch.clone());
                latch
            }
        };
        latch.poll(cx)
    }
}

impl<T, E> IntoFuture for Promise<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    type Output = Result<Result<T, E>, Error>;
    type IntoFuture = Waiter<T, E>;

    fn into_future(self) -> Self::IntoFuture {
        Waiter {
            promise: self,
            latch: None,
        }
    }
}
