//! The single-assignment promise and its state machine.
//!
//! A [`Promise`] moves through `Pending -> Executing -> Complete`, or to
//! `Cancelled` from anywhere before a result has been observed. Every
//! transition goes through the promise's [`Guarded`] cell, and everything a
//! transition triggers (start functions, callbacks, cancellation actions)
//! runs after that cell's lock has been released.
use crate::{guarded::Guarded, resolver::Resolver};
use std::{fmt::Debug, mem, sync::Arc};
use tracing::{trace, warn};

pub(crate) type Callback<T, E> = Box<dyn FnOnce(Result<T, E>) + Send>;
pub(crate) type StartFn<T, E> = Box<dyn FnOnce(Resolver<T, E>) + Send>;
pub(crate) type CancelFn = Box<dyn FnOnce() + Send>;

pub(crate) enum State<T, E> {
    Pending(StartFn<T, E>, Vec<Callback<T, E>>),
    Executing(CancelFn, Vec<Callback<T, E>>),
    Complete(Result<T, E>),
    Cancelled,
}

pub(crate) type Shared<T, E> = Arc<Guarded<State<T, E>>>;

/// Observable lifecycle of a [`Promise`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Not subscribed to yet; the start function has not run.
    Pending,
    /// Started and waiting for its computation to report back.
    Executing,
    /// Holds a result.
    Complete,
    /// Cancelled; will never notify anybody again.
    Cancelled,
}

/// Anything that can be asked to stop.
///
/// Implemented by every [`Promise`] regardless of its value and error types,
/// which lets combinators keep a list of differently typed inputs around
/// purely for the purpose of cancelling them.
pub trait Cancellable: Send + Sync {
    fn cancel(&self);
}

enum Subscription<T, E> {
    Queued { start: bool },
    Deliver(Callback<T, E>, Result<T, E>),
    Discard(Callback<T, E>),
}

/// A value of type `T` (or an error of type `E`) that becomes available
/// asynchronously, exactly once.
///
/// Promises are lazy: the start function given to [`Promise::new`] does not
/// run until somebody [subscribes](Promise::subscribe). Cloning a promise
/// hands out another handle to the same computation.
///
/// # Examples
///
/// ```
/// use cancellable_promise::Promise;
/// use std::{sync::mpsc, thread};
///
/// let promise = Promise::<String, ()>::new(|resolver| {
///     thread::spawn(move || resolver.resolve("🍓".into()));
/// });
/// let (tx, rx) = mpsc::channel();
/// promise.subscribe(move |result| tx.send(result).unwrap());
/// assert_eq!(rx.recv().unwrap(), Ok("🍓".to_string()));
/// ```
pub struct Promise<T, E> {
    state: Shared<T, E>,
}

impl<T, E> Clone for Promise<T, E> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<T, E> Promise<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn with_state(state: State<T, E>) -> Self {
        Self {
            state: Arc::new(Guarded::new(state)),
        }
    }

    /// Creates a promise that is already resolved with `value`.
    pub fn value(value: T) -> Self {
        Self::with_state(State::Complete(Ok(value)))
    }

    /// Creates a promise that is already rejected with `error`.
    pub fn error(error: E) -> Self {
        Self::with_state(State::Complete(Err(error)))
    }

    pub fn from_result(result: Result<T, E>) -> Self {
        Self::with_state(State::Complete(result))
    }

    /// Wraps an asynchronous computation.
    ///
    /// `start` runs at most once, on the thread of the first
    /// [`subscribe`](Promise::subscribe) call. It receives a [`Resolver`] to
    /// report the outcome with and to register a cancellation action on.
    ///
    /// ```
    /// use cancellable_promise::{Promise, Status};
    /// use std::sync::{atomic::{AtomicBool, Ordering}, Arc};
    ///
    /// let started = Arc::new(AtomicBool::new(false));
    /// let flag = started.clone();
    /// let promise = Promise::<i32, ()>::new(move |resolver| {
    ///     flag.store(true, Ordering::SeqCst);
    ///     resolver.resolve(42);
    /// });
    /// assert!(!started.load(Ordering::SeqCst));
    /// assert_eq!(promise.status(), Status::Pending);
    ///
    /// promise.subscribe(|_| {});
    /// assert!(started.load(Ordering::SeqCst));
    /// assert_eq!(promise.peek(), Some(Ok(42)));
    /// ```
    pub fn new(start: impl FnOnce(Resolver<T, E>) + Send + 'static) -> Self {
        Self::with_state(State::Pending(Box::new(start), Vec::new()))
    }

    /// Registers `callback` to observe the result, starting the computation
    /// if this is the first subscription.
    ///
    /// If the result is already known the callback runs right away on the
    /// calling thread. Otherwise it runs on whichever thread completes the
    /// promise. It never runs if the promise is cancelled first.
    pub fn subscribe(&self, callback: impl FnOnce(Result<T, E>) + Send + 'static) -> &Self {
        let callback: Callback<T, E> = Box::new(callback);
        let subscription = self.state.modify(move |state| match state {
            State::Pending(_, callbacks) => {
                callbacks.push(callback);
                Subscription::Queued { start: true }
            }
            State::Executing(_, callbacks) => {
                callbacks.push(callback);
                Subscription::Queued { start: false }
            }
            State::Complete(result) => Subscription::Deliver(callback, result.clone()),
            State::Cancelled => Subscription::Discard(callback),
        });
        match subscription {
            Subscription::Queued { start: true } => self.start(),
            Subscription::Queued { start: false } => {}
            Subscription::Deliver(callback, result) => callback(result),
            Subscription::Discard(callback) => drop(callback),
        }
        self
    }

    fn start(&self) {
        let shared = self.state.clone();
        let begun = self.state.transition(move |state| {
            match mem::replace(state, State::Cancelled) {
                State::Pending(start, callbacks) => {
                    let resolver = Resolver::new(shared);
                    let slot = resolver.cancel_slot();
                    // flip before running `start` so that a synchronous resolve
                    // sees a legal Executing -> Complete transition
                    *state = State::Executing(Box::new(move || slot.fire()), callbacks);
                    Some(move || {
                        trace!("promise started");
                        start(resolver)
                    })
                }
                other => {
                    *state = other;
                    None
                }
            }
        });
        if begun.is_none() {
            trace!("promise already started or cancelled");
        }
    }

    /// Cancels the promise.
    ///
    /// A running computation gets its cancellation action invoked. From here
    /// on no callback will ever fire, and the computation's attempts to
    /// resolve or reject are ignored. Cancelling a completed promise only
    /// stops future subscribers from being served.
    pub fn cancel(&self) {
        self.state.transition(|state| match mem::replace(state, State::Cancelled) {
            State::Cancelled => None,
            old => Some(move || match old {
                State::Executing(cancel, callbacks) => {
                    trace!(waiting = callbacks.len(), "cancelling running promise");
                    drop(callbacks);
                    cancel();
                }
                State::Pending(_, callbacks) => {
                    trace!(waiting = callbacks.len(), "cancelling promise before start");
                }
                State::Complete(_) => trace!("cancelling completed promise"),
                State::Cancelled => {}
            }),
        });
    }

    pub fn status(&self) -> Status {
        self.state.with_value(|state| match state {
            State::Pending(..) => Status::Pending,
            State::Executing(..) => Status::Executing,
            State::Complete(_) => Status::Complete,
            State::Cancelled => Status::Cancelled,
        })
    }

    /// The cached result, if the promise has completed and was not cancelled.
    pub fn peek(&self) -> Option<Result<T, E>> {
        self.state.with_value(|state| match state {
            State::Complete(result) => Some(result.clone()),
            _ => None,
        })
    }

    pub fn is_cancelled(&self) -> bool {
        self.status() == Status::Cancelled
    }
}

/// Moves an executing promise to `Complete` and fans the result out to every
/// callback registered so far, in registration order.
///
/// Returns `false` when the promise was not executing, which is the case
/// after cancellation or a previous completion.
pub(crate) fn settle<T, E>(state: &Guarded<State<T, E>>, result: Result<T, E>) -> bool
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    let settled = state.transition(move |state| match state {
        State::Executing(..) => {
            let old = mem::replace(state, State::Complete(result.clone()));
            Some(move || {
                if let State::Executing(_, callbacks) = old {
                    trace!(subscribers = callbacks.len(), ok = result.is_ok(), "promise completed");
                    for callback in callbacks {
                        callback(result.clone());
                    }
                }
            })
        }
        State::Complete(_) => {
            warn!("promise completed twice; keeping the first result");
            None
        }
        State::Pending(..) | State::Cancelled => None,
    });
    settled.is_some()
}

pub(crate) fn is_cancelled<T, E>(state: &Guarded<State<T, E>>) -> bool {
    state.with_value(|state| matches!(state, State::Cancelled))
}

impl<T, E> From<Result<T, E>> for Promise<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn from(result: Result<T, E>) -> Self {
        Self::from_result(result)
    }
}

impl<T, E> Cancellable for Promise<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn cancel(&self) {
        Promise::cancel(self)
    }
}

impl<T, E> Debug for Promise<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Promise").field("status", &self.status()).finish()
    }
}
