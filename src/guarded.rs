//! A value behind a lock. Every read-modify-write goes through one scoped
//! acquisition, and any work a modification leaves behind runs only after
//! the lock has been released.
use parking_lot::Mutex;
use std::fmt::Debug;

pub struct Guarded<V> {
    value: Mutex<V>,
}

impl<V> Guarded<V> {
    pub fn new(value: V) -> Self {
        Self {
            value: Mutex::new(value),
        }
    }

    /// Applies `f` to the value under the lock and returns its output.
    pub fn modify<R>(&self, f: impl FnOnce(&mut V) -> R) -> R {
        let mut value = self.value.lock();
        f(&mut value)
    }

    /// Read-only access under the lock.
    pub fn with_value<R>(&self, f: impl FnOnce(&V) -> R) -> R {
        let value = self.value.lock();
        f(&value)
    }

    /// Like [`modify`](Self::modify), but `f` may hand back a hook that is
    /// invoked once the guard is dropped.
    ///
    /// This is the cell's post-transition hook. Instead of one observer fixed
    /// at construction that is handed `(old, new)`, each transition builds its
    /// own hook, which can own whatever it moved out of the old value. Hooks
    /// are where observer-visible side effects belong: a hook may call
    /// straight back into this cell without deadlocking.
    ///
    /// ```
    /// use cancellable_promise::Guarded;
    ///
    /// let cell = &Guarded::new(1);
    /// let seen = cell.transition(|v| {
    ///     let old = *v;
    ///     *v += 1;
    ///     // the lock is free again by the time this runs
    ///     Some(move || (old, cell.with_value(|v| *v)))
    /// });
    /// assert_eq!(seen, Some((1, 2)));
    /// ```
    pub fn transition<H, R>(&self, f: impl FnOnce(&mut V) -> Option<H>) -> Option<R>
    where
        H: FnOnce() -> R,
    {
        let hook = {
            let mut value = self.value.lock();
            f(&mut value)
        };
        hook.map(|hook| hook())
    }
}

impl<V: Default> Default for Guarded<V> {
    fn default() -> Self {
        Self::new(V::default())
    }
}

impl<V: Debug> Debug for Guarded<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.value.try_lock() {
            Some(value) => f.debug_struct("Guarded").field("value", &*value).finish(),
            None => f.debug_struct("Guarded").field("value", &"<locked>").finish(),
        }
    }
}
