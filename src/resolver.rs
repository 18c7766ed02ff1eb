use crate::{
    guarded::Guarded,
    promise::{self, CancelFn, State},
};
use std::{fmt::Debug, mem, sync::Arc};
use tracing::trace;

enum CancelAction {
    Armed(Option<CancelFn>),
    Fired,
    Disarmed,
}

/// Where a running computation parks its cancellation action.
pub(crate) struct CancelSlot {
    action: Guarded<CancelAction>,
}

impl CancelSlot {
    fn new() -> Self {
        Self {
            action: Guarded::new(CancelAction::Armed(None)),
        }
    }

    fn set(&self, action: CancelFn) {
        let run_now = self.action.modify(move |slot| match slot {
            CancelAction::Armed(current) => {
                *current = Some(action);
                None
            }
            CancelAction::Fired => Some(action),
            CancelAction::Disarmed => None,
        });
        if let Some(action) = run_now {
            trace!("cancellation already happened; running action now");
            action()
        }
    }

    /// Runs the registered action at most once.
    pub(crate) fn fire(&self) {
        let action = self.action.modify(|slot| match mem::replace(slot, CancelAction::Fired) {
            CancelAction::Armed(action) => action,
            CancelAction::Fired => None,
            CancelAction::Disarmed => {
                *slot = CancelAction::Disarmed;
                None
            }
        });
        if let Some(action) = action {
            action()
        }
    }

    fn disarm(&self) {
        let old = self.action.modify(|slot| mem::replace(slot, CancelAction::Disarmed));
        drop(old);
    }
}

/// The completion side of a [`Promise`](crate::Promise), handed to its start
/// function.
///
/// Clones share the same target, so a resolver can be moved into as many
/// callbacks as the computation needs. The first completion wins; anything
/// after it, or after the promise was cancelled, is silently dropped.
///
/// ```
/// use cancellable_promise::Promise;
/// use std::sync::{atomic::{AtomicBool, Ordering}, Arc};
///
/// let stopped = Arc::new(AtomicBool::new(false));
/// let flag = stopped.clone();
/// let promise = Promise::<(), ()>::new(move |resolver| {
///     resolver.on_cancel(move || flag.store(true, Ordering::SeqCst));
/// });
/// promise.subscribe(|_| {});
/// promise.cancel();
/// assert!(stopped.load(Ordering::SeqCst));
/// ```
pub struct Resolver<T, E> {
    promise: Arc<Guarded<State<T, E>>>,
    cancel: Arc<CancelSlot>,
}

impl<T, E> Clone for Resolver<T, E> {
    fn clone(&self) -> Self {
        Self {
            promise: self.promise.clone(),
            cancel: self.cancel.clone(),
        }
    }
}

impl<T, E> Resolver<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    pub(crate) fn new(promise: Arc<Guarded<State<T, E>>>) -> Self {
        Self {
            promise,
            cancel: Arc::new(CancelSlot::new()),
        }
    }

    pub(crate) fn cancel_slot(&self) -> Arc<CancelSlot> {
        self.cancel.clone()
    }

    pub fn resolve(&self, value: T) {
        self.complete(Ok(value))
    }

    pub fn reject(&self, error: E) {
        self.complete(Err(error))
    }

    /// Reports the outcome, forwarding it synchronously to every subscriber
    /// (chained promises included) unless the promise was cancelled.
    ///
    /// The resolver keeps the promise alive, so subscribers are served even
    /// if every [`Promise`](crate::Promise) handle was dropped meanwhile.
    pub fn complete(&self, result: Result<T, E>) {
        if promise::settle(&self.promise, result) {
            self.cancel.disarm();
        } else {
            trace!("promise not executing; result dropped");
        }
    }

    /// Sets the action to run when the promise is cancelled, replacing any
    /// previous one.
    ///
    /// If the promise has already been cancelled the action runs right away.
    /// Once the promise has completed the action is discarded.
    pub fn on_cancel(&self, action: impl FnOnce() + Send + 'static) {
        self.cancel.set(Box::new(action))
    }

    /// Whether the promise was cancelled, so that long-running work can stop
    /// early.
    pub fn is_cancelled(&self) -> bool {
        promise::is_cancelled(&self.promise)
    }
}

impl<T, E> Debug for Resolver<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
