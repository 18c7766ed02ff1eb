//! Helpers for promises that statically cannot fail.
use crate::{NoError, Promise};

impl<T> Promise<T, NoError>
where
    T: Clone + Send + 'static,
{
    /// Subscribes with a callback that takes the value directly.
    ///
    /// ```
    /// use cancellable_promise::{NoError, Promise};
    ///
    /// Promise::<i32, NoError>::value(42).when_success(|v| assert_eq!(v, 42));
    /// ```
    pub fn when_success(&self, callback: impl FnOnce(T) + Send + 'static) -> &Self {
        self.subscribe(move |result| match result {
            Ok(value) => callback(value),
            Err(never) => match never {},
        })
    }

    /// Retypes the error channel so this promise can be chained or joined
    /// with fallible ones. It still never rejects.
    pub fn promote_errors<E>(&self) -> Promise<T, E>
    where
        E: Clone + Send + 'static,
    {
        self.map_err(|never| match never {})
    }
}

impl<T, E> Promise<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Swallows errors: a rejection turns into a promise that never
    /// completes, a resolution passes through.
    pub fn ignore_errors(&self) -> Promise<T, NoError> {
        self.or_else(|_| Promise::never())
    }

    /// A promise that neither resolves nor rejects.
    pub fn never() -> Self {
        Promise::new(|_resolver| {})
    }
}
