//! Observing a promise's lifecycle without changing its outcome.
//!
//! Each method returns a new promise that behaves like `self` and runs the
//! given action at the matching moment. Cancelling the returned promise
//! cancels `self`.
use crate::Promise;

impl<T, E> Promise<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Runs `action` when the returned promise starts, before `self` is
    /// subscribed to.
    pub fn on_start(&self, action: impl FnOnce() + Send + 'static) -> Promise<T, E> {
        let source = self.clone();
        Promise::new(move |resolver| {
            action();
            let cancel = source.clone();
            resolver.on_cancel(move || cancel.cancel());
            source.subscribe(move |result| resolver.complete(result));
        })
    }

    /// Runs `action` with the result before passing it on.
    pub fn on_complete(
        &self,
        action: impl FnOnce(&Result<T, E>) + Send + 'static,
    ) -> Promise<T, E> {
        let source = self.clone();
        Promise::new(move |resolver| {
            let cancel = source.clone();
            resolver.on_cancel(move || cancel.cancel());
            source.subscribe(move |result| {
                action(&result);
                resolver.complete(result);
            });
        })
    }

    pub fn on_success(&self, action: impl FnOnce(&T) + Send + 'static) -> Promise<T, E> {
        self.on_complete(move |result| {
            if let Ok(value) = result {
                action(value)
            }
        })
    }

    pub fn on_error(&self, action: impl FnOnce(&E) + Send + 'static) -> Promise<T, E> {
        self.on_complete(move |result| {
            if let Err(error) = result {
                action(error)
            }
        })
    }
}
