use crate::future::{Future, Resolution};
use crate::queue::Dispatch;
use crate::Error;
use std::sync::atomic::{AtomicBool, Ordering};

/// The write side of a [`Future`].
///
/// A promise resolves its future exactly once. Resolving twice, or resolving
/// after [`mirror`](Promise::mirror), is a programmer error: the plain methods
/// panic, the `try_` variants report [`Error::AlreadyResolved`].
///
/// Dropping a promise without resolving it leaves the future unresolved for
/// good; waiters on it block forever.
///
/// # Examples
///
/// ```
/// use promise_chain::Promise;
/// use std::thread;
/// let promise = Promise::<String, ()>::new();
/// let future = promise.future();
///
/// let task1 = thread::spawn(move || {
///     println!("Received {:?}", future.result());
/// });
/// promise.resolve("Hi".into());
/// task1.join().expect("The task1 thread has panicked.");
/// ```
#[derive(Debug)]
pub struct Promise<T, E> {
    future: Future<T, E>,
    committed: AtomicBool,
}

impl<T, E> Default for Promise<T, E> {
    fn default() -> Self {
        Self {
            future: Future::pending(),
            committed: AtomicBool::new(false),
        }
    }
}

impl<T, E> Promise<T, E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn future(&self) -> Future<T, E> {
        self.future.clone()
    }

    fn commit(&self) -> Result<(), Error> {
        if self.committed.swap(true, Ordering::AcqRel) {
            return Err(Error::AlreadyResolved(self.future.state()));
        }
        Ok(())
    }
}

impl<T, E> Promise<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    pub fn try_resolve(&self, value: T) -> Result<(), Error> {
        self.commit()?;
        self.future.settle(Resolution::Result(value))
    }

    pub fn try_reject(&self, err: E) -> Result<(), Error> {
        self.commit()?;
        self.future.settle(Resolution::Error(err))
    }

    pub fn try_cancel(&self) -> Result<(), Error> {
        self.commit()?;
        self.future.settle(Resolution::Cancelled)
    }

    /// Resolves the future with a result.
    ///
    /// # Panics
    ///
    /// If the promise was already resolved.
    pub fn resolve(&self, value: T) {
        if let Err(err) = self.try_resolve(value) {
            panic!("{err}");
        }
    }

    /// Resolves the future with an error.
    ///
    /// # Panics
    ///
    /// If the promise was already resolved.
    pub fn reject(&self, err: E) {
        if let Err(err) = self.try_reject(err) {
            panic!("{err}");
        }
    }

    /// Resolves the future as cancelled.
    ///
    /// # Panics
    ///
    /// If the promise was already resolved.
    pub fn cancel(&self) {
        if let Err(err) = self.try_cancel() {
            panic!("{err}");
        }
    }
}

impl<T, E> Promise<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Commits the promise to whatever outcome `source` eventually reaches.
    pub fn try_mirror(&self, source: &Future<T, E>) -> Result<(), Error> {
        self.commit()?;
        let target = self.future.clone();
        source.register(
            Dispatch::Inline,
            Box::new(move |source| target.settle_or_panic(source.resolution())),
        );
        Ok(())
    }

    /// # Panics
    ///
    /// If the promise was already resolved.
    pub fn mirror(&self, source: &Future<T, E>) {
        if let Err(err) = self.try_mirror(source) {
            panic!("{err}");
        }
    }
}

impl<T, E> Drop for Promise<T, E> {
    fn drop(&mut self) {
        if !*self.committed.get_mut() {
            tracing::trace!("promise dropped unresolved; its future stays unresolved");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Promise;
    use crate::{Error, FutureState};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_promise_resolve() {
        let op = Promise::<String, ()>::new();
        let op_a = op.future();
        let task1 = thread::spawn(move || op_a.result());
        let task2 = thread::spawn(move || op.resolve(String::from("🍓")));
        task2.join().expect("The task2 thread has panicked");
        let value = task1.join().expect("The task1 thread has panicked");
        assert_eq!(value.as_deref(), Some("🍓"));
    }

    #[test]
    fn test_promise_reject() {
        let promise = Promise::<(), String>::new();
        let future = promise.future();
        let task = thread::spawn(move || promise.reject("reject!!".into()));
        assert_eq!(future.error().as_deref(), Some("reject!!"));
        assert_eq!(future.state(), FutureState::ResolvedWithError);
        task.join().expect("The task thread has panicked");
    }

    #[test]
    fn test_promise_unresolved_when_dropped() {
        let promise = Promise::<String, ()>::new();
        let future = promise.future();
        thread::spawn(move || drop(promise))
            .join()
            .expect("The task thread has panicked");
        assert!(!future.wait_timeout(Duration::from_millis(20)));
        assert_eq!(future.state(), FutureState::Unresolved);
    }

    #[test]
    fn test_try_resolve_twice_is_rejected() {
        let promise = Promise::<i32, ()>::new();
        promise.try_resolve(1).unwrap();
        let err = promise.try_cancel().unwrap_err();
        assert!(matches!(
            err,
            Error::AlreadyResolved(FutureState::ResolvedWithResult)
        ));
        assert_eq!(promise.future().result(), Some(1));
    }

    #[test]
    #[should_panic(expected = "already been resolved")]
    fn test_promise_resolve_twice_panics() {
        let promise = Promise::<String, ()>::new();
        promise.resolve("hi".into());
        promise.resolve("hi".into());
    }

    #[test]
    fn test_resolve_after_mirror_is_rejected() {
        let source = Promise::<i32, ()>::new();
        let promise = Promise::<i32, ()>::new();
        promise.mirror(&source.future());
        assert!(matches!(
            promise.try_resolve(2),
            Err(Error::AlreadyResolved(FutureState::Unresolved))
        ));
        source.resolve(5);
        assert_eq!(promise.future().result(), Some(5));
    }

    #[test]
    fn test_concurrent_resolvers_only_one_wins() {
        let promise = std::sync::Arc::new(Promise::<usize, ()>::new());
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let promise = promise.clone();
                thread::spawn(move || promise.try_resolve(i).is_ok())
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().expect("resolver thread panicked"))
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
        assert!(promise.future().has_result());
    }
}
