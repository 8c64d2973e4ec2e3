use crate::future::FutureState;
use thiserror::Error;

/// Errors raised by the promise machinery itself.
///
/// Failures of the asynchronous work are never reported here; they travel as
/// the `E` payload of a resolved [`Future`](crate::Future).
#[derive(Debug, Error)]
pub enum Error {
    /// A resolving call reached a future that was already resolved, or a
    /// promise that had already committed to a resolution. Carries the state
    /// the future was in at that point.
    #[error("promise has already been resolved (future state: {0:?})")]
    AlreadyResolved(FutureState),
    #[error("failed to spawn queue worker: {0}")]
    QueueSpawn(#[from] std::io::Error),
}
