//! Continuation chaining.
//!
//! Every combinator here creates a fresh [`Promise`], registers one
//! continuation on the source future and hands back the new future straight
//! away. They differ in what the block receives and returns:
//!
//! | combinator              | runs on         | block                          |
//! |-------------------------|-----------------|--------------------------------|
//! | `then`                  | any outcome     | `&Future<T, E> -> Result<U, E>`|
//! | `then_task`             | any outcome     | `&Future<T, E> -> Future<U, E>`|
//! | `then_on_success`       | result only     | `T -> Result<U, E>`            |
//! | `then_task_on_success`  | result only     | `T -> Future<U, E>`            |
//! | `then_on_error`         | error only      | `E -> Result<T, E>`            |
//!
//! The `_on` forms run the block on the given queue instead of the resolving
//! thread. A block that panics cancels the downstream future.
//!
use crate::future::{Future, Resolution};
use crate::queue::{Dispatch, ExecutionQueue};
use crate::sync::guarded;
use crate::Promise;

/// Resolves `promise` from the value a block returned.
fn settle_with<U, E>(promise: &Promise<U, E>, outcome: Option<Result<U, E>>)
where
    U: Send + 'static,
    E: Send + 'static,
{
    match outcome {
        Some(Ok(value)) => promise.resolve(value),
        Some(Err(err)) => promise.reject(err),
        None => promise.cancel(),
    }
}

/// Resolves `promise` with the outcome of the future a task returned.
fn flatten<U, E>(promise: &Promise<U, E>, task: Option<Future<U, E>>)
where
    U: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    match task {
        Some(inner) => promise.mirror(&inner),
        None => promise.cancel(),
    }
}

impl<T, E> Future<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn chain<U, F>(&self, dispatch: Dispatch, step: F) -> Future<U, E>
    where
        U: Send + 'static,
        F: FnOnce(&Future<T, E>, &Promise<U, E>) + Send + 'static,
    {
        let promise = Promise::new();
        let next = promise.future();
        self.on_resolve_with(dispatch, move |source| step(source, &promise));
        next
    }

    fn then_with<U, F>(&self, dispatch: Dispatch, block: F) -> Future<U, E>
    where
        U: Send + 'static,
        F: FnOnce(&Future<T, E>) -> Result<U, E> + Send + 'static,
    {
        self.chain(dispatch, move |source, promise| {
            settle_with(promise, guarded("then", || block(source)))
        })
    }

    fn then_task_with<U, F>(&self, dispatch: Dispatch, block: F) -> Future<U, E>
    where
        U: Clone + Send + 'static,
        F: FnOnce(&Future<T, E>) -> Future<U, E> + Send + 'static,
    {
        self.chain(dispatch, move |source, promise| {
            flatten(promise, guarded("then_task", || block(source)))
        })
    }

    fn then_on_success_with<U, F>(&self, dispatch: Dispatch, block: F) -> Future<U, E>
    where
        U: Send + 'static,
        F: FnOnce(T) -> Result<U, E> + Send + 'static,
    {
        self.chain(dispatch, move |source, promise| match source.resolution() {
            Resolution::Result(value) => {
                settle_with(promise, guarded("then_on_success", || block(value)))
            }
            Resolution::Error(err) => promise.reject(err),
            Resolution::Cancelled => promise.cancel(),
        })
    }

    fn then_task_on_success_with<U, F>(&self, dispatch: Dispatch, block: F) -> Future<U, E>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> Future<U, E> + Send + 'static,
    {
        self.chain(dispatch, move |source, promise| match source.resolution() {
            Resolution::Result(value) => {
                flatten(promise, guarded("then_task_on_success", || block(value)))
            }
            Resolution::Error(err) => promise.reject(err),
            Resolution::Cancelled => promise.cancel(),
        })
    }

    fn then_on_error_with<F>(&self, dispatch: Dispatch, block: F) -> Future<T, E>
    where
        F: FnOnce(E) -> Result<T, E> + Send + 'static,
    {
        self.chain(dispatch, move |source, promise| match source.resolution() {
            Resolution::Result(value) => promise.resolve(value),
            Resolution::Error(err) => {
                settle_with(promise, guarded("then_on_error", || block(err)))
            }
            Resolution::Cancelled => promise.cancel(),
        })
    }

    /// Runs `block` on the resolving thread once this future is resolved,
    /// whatever the outcome, and resolves the returned future with its value.
    ///
    /// `Ok` resolves the returned future with a result and `Err` with that
    /// error. A panic in `block` cannot be turned into an `E`, so it is logged
    /// and the returned future is cancelled instead. The same holds for every
    /// other combinator in this module.
    ///
    /// ```
    /// use promise_chain::Future;
    /// let describe = Future::<i32, String>::cancelled()
    ///     .then(|f| Ok(if f.is_cancelled() { "cancelled" } else { "done" }));
    /// assert_eq!(describe.result(), Some("cancelled"));
    /// ```
    pub fn then<U, F>(&self, block: F) -> Future<U, E>
    where
        U: Send + 'static,
        F: FnOnce(&Future<T, E>) -> Result<U, E> + Send + 'static,
    {
        self.then_with(Dispatch::Inline, block)
    }

    pub fn then_on<Q, U, F>(&self, queue: &Q, block: F) -> Future<U, E>
    where
        Q: ExecutionQueue + Clone + 'static,
        U: Send + 'static,
        F: FnOnce(&Future<T, E>) -> Result<U, E> + Send + 'static,
    {
        self.then_with(Dispatch::on(queue), block)
    }

    /// Like [`then`](Future::then), but `block` starts more asynchronous work
    /// and returns its future. The returned future follows that one, and is
    /// cancelled if `block` panics.
    pub fn then_task<U, F>(&self, block: F) -> Future<U, E>
    where
        U: Clone + Send + 'static,
        F: FnOnce(&Future<T, E>) -> Future<U, E> + Send + 'static,
    {
        self.then_task_with(Dispatch::Inline, block)
    }

    pub fn then_task_on<Q, U, F>(&self, queue: &Q, block: F) -> Future<U, E>
    where
        Q: ExecutionQueue + Clone + 'static,
        U: Clone + Send + 'static,
        F: FnOnce(&Future<T, E>) -> Future<U, E> + Send + 'static,
    {
        self.then_task_with(Dispatch::on(queue), block)
    }

    /// Maps the result. Errors and cancellation skip `block` and are passed
    /// on unchanged. If `block` panics, the returned future is cancelled.
    ///
    /// ```
    /// use promise_chain::Future;
    /// let next = Future::<i32, &str>::from_result(5).then_on_success(|v| Ok(v + 1));
    /// assert_eq!(next.result(), Some(6));
    ///
    /// let next = Future::<i32, &str>::from_error("E1").then_on_success(|v| Ok(v + 1));
    /// assert_eq!(next.error(), Some("E1"));
    /// ```
    pub fn then_on_success<U, F>(&self, block: F) -> Future<U, E>
    where
        U: Send + 'static,
        F: FnOnce(T) -> Result<U, E> + Send + 'static,
    {
        self.then_on_success_with(Dispatch::Inline, block)
    }

    pub fn then_on_success_on<Q, U, F>(&self, queue: &Q, block: F) -> Future<U, E>
    where
        Q: ExecutionQueue + Clone + 'static,
        U: Send + 'static,
        F: FnOnce(T) -> Result<U, E> + Send + 'static,
    {
        self.then_on_success_with(Dispatch::on(queue), block)
    }

    pub fn then_task_on_success<U, F>(&self, block: F) -> Future<U, E>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> Future<U, E> + Send + 'static,
    {
        self.then_task_on_success_with(Dispatch::Inline, block)
    }

    pub fn then_task_on_success_on<Q, U, F>(&self, queue: &Q, block: F) -> Future<U, E>
    where
        Q: ExecutionQueue + Clone + 'static,
        U: Clone + Send + 'static,
        F: FnOnce(T) -> Future<U, E> + Send + 'static,
    {
        self.then_task_on_success_with(Dispatch::on(queue), block)
    }

    /// Gives `block` a chance to recover from an error. Results and
    /// cancellation are passed on unchanged.
    pub fn then_on_error<F>(&self, block: F) -> Future<T, E>
    where
        F: FnOnce(E) -> Result<T, E> + Send + 'static,
    {
        self.then_on_error_with(Dispatch::Inline, block)
    }

    pub fn then_on_error_on<Q, F>(&self, queue: &Q, block: F) -> Future<T, E>
    where
        Q: ExecutionQueue + Clone + 'static,
        F: FnOnce(E) -> Result<T, E> + Send + 'static,
    {
        self.then_on_error_with(Dispatch::on(queue), block)
    }
}
