use crate::queue::Dispatch;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Locks `mutex`, ignoring poisoning.
///
/// User code never runs while one of our locks is held, so a poisoned lock can
/// only come from a panic between two plain field writes.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Runs `f`, returning `None` if it panicked.
pub(crate) fn guarded<R>(what: &'static str, f: impl FnOnce() -> R) -> Option<R> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Some(value),
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "<non-string panic>".to_string());
            tracing::error!(what, %message, "continuation panicked");
            None
        }
    }
}

/// A multi-shot handler together with where it has to run.
pub(crate) struct Handler<A: ?Sized> {
    dispatch: Dispatch,
    callback: Arc<dyn Fn(&A) + Send + Sync>,
}

impl<A: ?Sized> Clone for Handler<A> {
    fn clone(&self) -> Self {
        Self {
            dispatch: self.dispatch.clone(),
            callback: self.callback.clone(),
        }
    }
}

impl<A> Handler<A>
where
    A: Clone + Send + 'static,
{
    pub(crate) fn new<F>(dispatch: Dispatch, callback: F) -> Self
    where
        F: Fn(&A) + Send + Sync + 'static,
    {
        Self {
            dispatch,
            callback: Arc::new(callback),
        }
    }

    /// Invokes the handler with `arg`, inline or on its queue.
    ///
    /// Must be called without holding the lock that guards the slot.
    pub(crate) fn invoke(&self, arg: &A) {
        let callback = self.callback.clone();
        let arg = arg.clone();
        self.dispatch.run(move || {
            let _ = guarded("progress handler", move || callback(&arg));
        });
    }
}
