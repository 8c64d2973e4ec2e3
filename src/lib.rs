//! Futures and promises with queue-targeted continuations.
//!
//! A [`Promise`] resolves its paired [`Future`] exactly once, with a result,
//! an error or a cancellation. Continuations chained onto a future run on the
//! resolving thread or on an [`ExecutionQueue`] of the caller's choosing, and
//! build new futures from the outcome. [`Future::all_of`] joins many futures
//! into one. [`Progress`] is a cancellable token for reporting progress of
//! long running work.
//!
//! ```
//! use promise_chain::{Future, Promise, SerialQueue};
//! use std::thread;
//!
//! let queue = SerialQueue::new().unwrap();
//! let promise = Promise::<u32, String>::new();
//! let length = promise
//!     .future()
//!     .then_on_success(|v| Ok(v.to_string()))
//!     .then_on_success_on(&queue, |s| Ok(s.len()));
//!
//! thread::spawn(move || promise.resolve(12345));
//! assert_eq!(length.result(), Some(5));
//! ```
//!
mod chain;
mod error;
pub mod future;
pub mod progress;
mod promise;
pub mod queue;
mod sync;
mod when_all;

pub use error::Error;
pub use future::{Future, FutureState, Resolution, Waiter};
pub use progress::{CancellableProgress, Progress};
pub use promise::Promise;
pub use queue::{Dispatch, ExecutionQueue, Job, ManualQueue, SerialQueue, SerialQueueBuilder};
