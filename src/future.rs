//! The single-assignment [`Future`] and its resolution state machine.
//!
//! A future starts unresolved and moves exactly once to one of three terminal
//! states. Continuations registered before that move are queued under the
//! future's lock; the resolving call drains them and runs them after the lock
//! is released. Continuations registered afterwards run right away.
//!
use crate::queue::{Dispatch, ExecutionQueue};
use crate::sync::{guarded, lock};
use crate::{Error, Promise};
use std::fmt::{self, Debug};
use std::mem;
use std::pin::Pin;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::task::{Context, Poll, Waker};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FutureState {
    Unresolved,
    ResolvedWithResult,
    ResolvedWithError,
    ResolvedWithCancellation,
}

/// The terminal outcome of a [`Future`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution<T, E> {
    Result(T),
    Error(E),
    Cancelled,
}

impl<T, E> Resolution<T, E> {
    pub fn state(&self) -> FutureState {
        match self {
            Resolution::Result(_) => FutureState::ResolvedWithResult,
            Resolution::Error(_) => FutureState::ResolvedWithError,
            Resolution::Cancelled => FutureState::ResolvedWithCancellation,
        }
    }

    pub fn result(&self) -> Option<&T> {
        match self {
            Resolution::Result(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&E> {
        match self {
            Resolution::Error(err) => Some(err),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Resolution::Cancelled)
    }

    /// Converts into a `Result`, with `None` standing for cancellation.
    pub fn into_result(self) -> Option<Result<T, E>> {
        match self {
            Resolution::Result(value) => Some(Ok(value)),
            Resolution::Error(err) => Some(Err(err)),
            Resolution::Cancelled => None,
        }
    }
}

type Continuation<T, E> = Box<dyn FnOnce(Future<T, E>) + Send + 'static>;

struct Registration<T, E> {
    dispatch: Dispatch,
    callback: Continuation<T, E>,
}

struct Slot<T, E> {
    resolution: Option<Resolution<T, E>>,
    continuations: Vec<Registration<T, E>>,
    wakers: Vec<Waker>,
}

struct Shared<T, E> {
    slot: Mutex<Slot<T, E>>,
    resolved: Condvar,
}

/// Runs one continuation. A panicking continuation is logged and must not stop
/// the ones registered after it.
fn fire<T, E>(dispatch: &Dispatch, callback: Continuation<T, E>, future: Future<T, E>)
where
    T: Send + 'static,
    E: Send + 'static,
{
    dispatch.run(move || {
        let _ = guarded("continuation", move || callback(future));
    });
}

/// Read handle to the eventual outcome of an asynchronous operation.
///
/// Handles are cheap to clone and may be shared between threads; every clone
/// observes the same resolution.
///
/// # Examples
///
/// ```
/// use promise_chain::{Future, Promise};
/// use std::thread;
/// let promise = Promise::<i32, String>::new();
/// let future = promise.future().then_on_success(|v| Ok(v + 1));
/// thread::spawn(move || promise.resolve(41));
/// assert_eq!(future.result(), Some(42));
/// ```
pub struct Future<T, E> {
    shared: Arc<Shared<T, E>>,
}

impl<T, E> Clone for Future<T, E> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T, E> Debug for Future<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Future").field("state", &self.state()).finish()
    }
}

impl<T, E> Future<T, E> {
    fn with_slot(resolution: Option<Resolution<T, E>>) -> Self {
        Self {
            shared: Arc::new(Shared {
                slot: Mutex::new(Slot {
                    resolution,
                    continuations: Vec::new(),
                    wakers: Vec::new(),
                }),
                resolved: Condvar::new(),
            }),
        }
    }

    pub(crate) fn pending() -> Self {
        Self::with_slot(None)
    }

    pub fn from_result(value: T) -> Self {
        Self::with_slot(Some(Resolution::Result(value)))
    }

    pub fn from_error(err: E) -> Self {
        Self::with_slot(Some(Resolution::Error(err)))
    }

    pub fn cancelled() -> Self {
        Self::with_slot(Some(Resolution::Cancelled))
    }

    pub fn state(&self) -> FutureState {
        match &lock(&self.shared.slot).resolution {
            Some(resolution) => resolution.state(),
            None => FutureState::Unresolved,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.state() != FutureState::Unresolved
    }

    /// Non-blocking; check this before [`result`](Future::result) to avoid waiting.
    pub fn has_result(&self) -> bool {
        self.state() == FutureState::ResolvedWithResult
    }

    /// Non-blocking; check this before [`error`](Future::error) to avoid waiting.
    pub fn has_error(&self) -> bool {
        self.state() == FutureState::ResolvedWithError
    }

    pub fn is_cancelled(&self) -> bool {
        self.state() == FutureState::ResolvedWithCancellation
    }

    /// Blocks the calling thread until the future is resolved.
    ///
    /// Waits forever if the paired promise is dropped without resolving.
    pub fn wait(&self) {
        let slot = lock(&self.shared.slot);
        let _slot = self
            .shared
            .resolved
            .wait_while(slot, |slot| slot.resolution.is_none())
            .unwrap_or_else(PoisonError::into_inner);
    }

    /// Blocks until the future is resolved or `deadline` passes. Returns
    /// whether the future was resolved in time.
    pub fn wait_until(&self, deadline: Instant) -> bool {
        let mut slot = lock(&self.shared.slot);
        loop {
            if slot.resolution.is_some() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self
                .shared
                .resolved
                .wait_timeout(slot, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            slot = guard;
        }
    }

    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.wait_until(Instant::now() + timeout)
    }

    /// Returns an awaitable view of this future.
    pub fn waiter(&self) -> Waiter<T, E> {
        Waiter {
            future: self.clone(),
        }
    }
}

impl<T, E> Future<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Moves the future to its terminal state and fires the pending
    /// continuations in registration order.
    pub(crate) fn settle(&self, resolution: Resolution<T, E>) -> Result<(), Error> {
        let state = resolution.state();
        let (continuations, wakers) = {
            let mut slot = lock(&self.shared.slot);
            if let Some(existing) = &slot.resolution {
                return Err(Error::AlreadyResolved(existing.state()));
            }
            slot.resolution = Some(resolution);
            (
                mem::take(&mut slot.continuations),
                mem::take(&mut slot.wakers),
            )
        };
        self.shared.resolved.notify_all();
        tracing::trace!(?state, continuations = continuations.len(), "future resolved");
        for waker in wakers {
            waker.wake();
        }
        for Registration { dispatch, callback } in continuations {
            fire(&dispatch, callback, self.clone());
        }
        Ok(())
    }

    /// Same as [`settle`](Future::settle), treating a second resolution as a
    /// programmer error.
    pub(crate) fn settle_or_panic(&self, resolution: Resolution<T, E>) {
        if let Err(err) = self.settle(resolution) {
            panic!("{err}");
        }
    }

    pub(crate) fn register(&self, dispatch: Dispatch, callback: Continuation<T, E>) {
        {
            let mut slot = lock(&self.shared.slot);
            if slot.resolution.is_none() {
                slot.continuations.push(Registration { dispatch, callback });
                return;
            }
        }
        fire(&dispatch, callback, self.clone());
    }

    /// Registers `continuation` to run once the future is resolved, on the
    /// resolving thread. Runs it right away if the future is already resolved.
    pub fn on_resolve<F>(&self, continuation: F)
    where
        F: FnOnce(&Future<T, E>) + Send + 'static,
    {
        self.on_resolve_with(Dispatch::Inline, continuation)
    }

    /// Like [`on_resolve`](Future::on_resolve), but the continuation is
    /// submitted to `queue`.
    pub fn on_resolve_on<Q, F>(&self, queue: &Q, continuation: F)
    where
        Q: ExecutionQueue + Clone + 'static,
        F: FnOnce(&Future<T, E>) + Send + 'static,
    {
        self.on_resolve_with(Dispatch::on(queue), continuation)
    }

    pub fn on_resolve_with<F>(&self, dispatch: Dispatch, continuation: F)
    where
        F: FnOnce(&Future<T, E>) + Send + 'static,
    {
        self.register(dispatch, Box::new(move |future| continuation(&future)))
    }
}

impl<T, E> Future<T, E>
where
    T: Clone,
    E: Clone,
{
    /// Blocks until resolved and returns the outcome.
    pub fn resolution(&self) -> Resolution<T, E> {
        self.wait();
        match &lock(&self.shared.slot).resolution {
            Some(resolution) => resolution.clone(),
            None => unreachable!("wait returned on an unresolved future"),
        }
    }

    /// Blocks until resolved; `None` unless the future succeeded.
    pub fn result(&self) -> Option<T> {
        self.resolution().into_result()?.ok()
    }

    /// Blocks until resolved; `None` unless the future failed.
    pub fn error(&self) -> Option<E> {
        self.resolution().into_result()?.err()
    }
}

impl<T, E> Future<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// A future that ends up in whatever state `source` reaches.
    pub fn mirroring(source: &Future<T, E>) -> Self {
        let promise = Promise::new();
        promise.mirror(source);
        promise.future()
    }
}

/// Awaitable view of a [`Future`], yielding its [`Resolution`].
#[derive(Debug)]
pub struct Waiter<T, E> {
    future: Future<T, E>,
}

impl<T, E> std::future::Future for Waiter<T, E>
where
    T: Clone,
    E: Clone,
{
    type Output = Resolution<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut slot = lock(&self.future.shared.slot);
        match slot.resolution {
            Some(ref resolution) => Poll::Ready(resolution.clone()),
            None => {
                if !slot.wakers.iter().any(|w| w.will_wake(cx.waker())) {
                    slot.wakers.push(cx.waker().clone());
                }
                Poll::Pending
            }
        }
    }
}

impl<T, E> std::future::IntoFuture for Future<T, E>
where
    T: Clone,
    E: Clone,
{
    type Output = Resolution<T, E>;
    type IntoFuture = Waiter<T, E>;

    fn into_future(self) -> Self::IntoFuture {
        Waiter { future: self }
    }
}
