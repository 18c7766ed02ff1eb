//! Lazy, cancellable promises that do not depend on any particular executor.
//!
//! A [`Promise`] holds a value that shows up asynchronously exactly once and
//! can be observed by any number of subscribers. Nothing runs until the first
//! [`subscribe`](Promise::subscribe); callbacks fire on whichever thread
//! completes the promise, and [`cancel`](Promise::cancel) silences a promise
//! for good.
//!
//! Promises compose:
//! * [`then`](Promise::then), [`or_else`](Promise::or_else),
//!   [`map`](Promise::map) and [`map_err`](Promise::map_err) sequence work
//!   and carry cancellation to whichever stage is running,
//! * [`Promise::all`] and [`all`] join independent promises,
//! * [`Promise::attempt`] retries a failing computation.
//!
//! # Examples
//!
//! ```
//! use cancellable_promise::Promise;
//! use std::thread;
//!
//! let answer = Promise::<i32, String>::new(|resolver| {
//!     thread::spawn(move || resolver.resolve(40));
//! })
//! .map(|v| v + 2);
//!
//! assert_eq!(answer.wait(), Ok(Ok(42)));
//! ```
use std::time::Duration;

mod all;
mod chain;
mod guarded;
mod no_error;
mod promise;
mod resolver;
mod retry;
pub mod schedule;
mod side_effects;
mod wait;

pub use all::{all, AllPromises};
pub use guarded::Guarded;
pub use promise::{Cancellable, Promise, Status};
pub use resolver::Resolver;
pub use schedule::Scheduler;
pub use wait::Waiter;

/// Error type of promises that cannot fail.
pub type NoError = std::convert::Infallible;

/// Reasons an observer stopped waiting for a promise.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("promise was cancelled")]
    Cancelled,
    #[error("promise did not complete within {0:?}")]
    Timeout(Duration),
}
