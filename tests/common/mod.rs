#![allow(dead_code)]
use cancellable_promise::Promise;
use std::{thread, time::Duration};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestError {
    Error1,
    Error2,
}

/// A promise that reports `result` from a background thread `delay_ms`
/// after it is started.
pub fn after<T>(result: Result<T, TestError>, delay_ms: u64) -> Promise<T, TestError>
where
    T: Clone + Send + 'static,
{
    Promise::new(move |resolver| {
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(delay_ms));
            resolver.complete(result)
        });
    })
}

/// Waits long enough for anything scheduled by a test to have happened.
pub fn settle(delay_ms: u64) {
    thread::sleep(Duration::from_millis(delay_ms))
}
