//! Cancellable progress reporting.
//!
//! A [`Progress`] token is shared between the party doing some work and the
//! parties interested in it. The worker reports completed units, a numeric
//! state and a description; observers register one handler per facet and get
//! called on every update. Cancellation flows the other way: an observer
//! calls [`cancel`](Progress::cancel) and the worker either polls
//! [`is_cancelled`](CancellableProgress::is_cancelled) or registers a
//! cancellation handler.
//!
use crate::queue::{Dispatch, ExecutionQueue};
use crate::sync::{guarded, lock, Handler};
use std::fmt;
use std::mem;
use std::sync::{Arc, Mutex};

/// The side of a progress token a worker sees.
pub trait CancellableProgress: Send + Sync {
    fn is_cancelled(&self) -> bool;

    /// Registers `handler` to run once, when the token gets cancelled. Runs it
    /// right away if the token is already cancelled.
    fn set_cancellation_handler<F>(&self, handler: F)
    where
        F: FnOnce(&Self) + Send + 'static,
        Self: Sized;

    fn update_progress(&self, completed: u64, total: u64);

    fn update_state(&self, state: u64);

    fn update_description(&self, description: &str);
}

type CancellationHandler = Box<dyn FnOnce(&Progress) + Send + 'static>;

#[derive(Default)]
struct State {
    cancelled: bool,
    cancellation_handlers: Vec<(Dispatch, CancellationHandler)>,
    completed: u64,
    total: u64,
    code: u64,
    description: String,
    progress_handler: Option<Handler<Progress>>,
    state_handler: Option<Handler<Progress>>,
    description_handler: Option<Handler<Progress>>,
}

/// A cancellable handle carrying unit counts, a state code and a description.
///
/// # Examples
///
/// ```
/// use promise_chain::{CancellableProgress, Progress};
/// use std::sync::{Arc, Mutex};
/// let progress = Progress::new();
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let log = seen.clone();
/// progress.set_progress_handler(move |p| log.lock().unwrap().push(p.progress()));
/// progress.update_progress(1, 4);
/// progress.update_progress(4, 4);
/// assert_eq!(*seen.lock().unwrap(), vec![(1, 4), (4, 4)]);
/// ```
#[derive(Clone, Default)]
pub struct Progress {
    state: Arc<Mutex<State>>,
}

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels the token. Only the first call has an effect.
    pub fn cancel(&self) {
        let handlers = {
            let mut state = lock(&self.state);
            if state.cancelled {
                return;
            }
            state.cancelled = true;
            mem::take(&mut state.cancellation_handlers)
        };
        tracing::trace!(handlers = handlers.len(), "progress cancelled");
        for (dispatch, handler) in handlers {
            self.fire_cancellation(&dispatch, handler);
        }
    }

    pub fn set_cancellation_handler_on<Q, F>(&self, queue: &Q, handler: F)
    where
        Q: ExecutionQueue + Clone + 'static,
        F: FnOnce(&Progress) + Send + 'static,
    {
        self.set_cancellation_handler_with(Dispatch::on(queue), handler)
    }

    pub fn set_cancellation_handler_with<F>(&self, dispatch: Dispatch, handler: F)
    where
        F: FnOnce(&Progress) + Send + 'static,
    {
        {
            let mut state = lock(&self.state);
            if !state.cancelled {
                state.cancellation_handlers.push((dispatch, Box::new(handler)));
                return;
            }
        }
        self.fire_cancellation(&dispatch, Box::new(handler));
    }

    fn fire_cancellation(&self, dispatch: &Dispatch, handler: CancellationHandler) {
        let progress = self.clone();
        dispatch.run(move || {
            let _ = guarded("cancellation handler", move || handler(&progress));
        });
    }

    /// The last reported `(completed, total)` pair.
    pub fn progress(&self) -> (u64, u64) {
        let state = lock(&self.state);
        (state.completed, state.total)
    }

    pub fn state(&self) -> u64 {
        lock(&self.state).code
    }

    pub fn description(&self) -> String {
        lock(&self.state).description.clone()
    }

    /// Sets the handler called on every [`update_progress`](CancellableProgress::update_progress),
    /// replacing the previous one.
    pub fn set_progress_handler<F>(&self, handler: F)
    where
        F: Fn(&Progress) + Send + Sync + 'static,
    {
        lock(&self.state).progress_handler = Some(Handler::new(Dispatch::Inline, handler));
    }

    pub fn set_progress_handler_on<Q, F>(&self, queue: &Q, handler: F)
    where
        Q: ExecutionQueue + Clone + 'static,
        F: Fn(&Progress) + Send + Sync + 'static,
    {
        lock(&self.state).progress_handler = Some(Handler::new(Dispatch::on(queue), handler));
    }

    /// Sets the handler called on every [`update_state`](CancellableProgress::update_state),
    /// replacing the previous one.
    pub fn set_state_handler<F>(&self, handler: F)
    where
        F: Fn(&Progress) + Send + Sync + 'static,
    {
        lock(&self.state).state_handler = Some(Handler::new(Dispatch::Inline, handler));
    }

    pub fn set_state_handler_on<Q, F>(&self, queue: &Q, handler: F)
    where
        Q: ExecutionQueue + Clone + 'static,
        F: Fn(&Progress) + Send + Sync + 'static,
    {
        lock(&self.state).state_handler = Some(Handler::new(Dispatch::on(queue), handler));
    }

    /// Sets the handler called on every [`update_description`](CancellableProgress::update_description),
    /// replacing the previous one.
    pub fn set_description_handler<F>(&self, handler: F)
    where
        F: Fn(&Progress) + Send + Sync + 'static,
    {
        lock(&self.state).description_handler = Some(Handler::new(Dispatch::Inline, handler));
    }

    pub fn set_description_handler_on<Q, F>(&self, queue: &Q, handler: F)
    where
        Q: ExecutionQueue + Clone + 'static,
        F: Fn(&Progress) + Send + Sync + 'static,
    {
        lock(&self.state).description_handler = Some(Handler::new(Dispatch::on(queue), handler));
    }

    fn notify(&self, handler: Option<Handler<Progress>>) {
        if let Some(handler) = handler {
            handler.invoke(self);
        }
    }
}

impl CancellableProgress for Progress {
    fn is_cancelled(&self) -> bool {
        lock(&self.state).cancelled
    }

    fn set_cancellation_handler<F>(&self, handler: F)
    where
        F: FnOnce(&Self) + Send + 'static,
    {
        self.set_cancellation_handler_with(Dispatch::Inline, handler)
    }

    fn update_progress(&self, completed: u64, total: u64) {
        let handler = {
            let mut state = lock(&self.state);
            state.completed = completed;
            state.total = total;
            state.progress_handler.clone()
        };
        tracing::trace!(completed, total, "progress updated");
        self.notify(handler);
    }

    fn update_state(&self, code: u64) {
        let handler = {
            let mut state = lock(&self.state);
            state.code = code;
            state.state_handler.clone()
        };
        tracing::trace!(state = code, "progress state updated");
        self.notify(handler);
    }

    fn update_description(&self, description: &str) {
        let handler = {
            let mut state = lock(&self.state);
            state.description = description.to_string();
            state.description_handler.clone()
        };
        tracing::trace!(description, "progress description updated");
        self.notify(handler);
    }
}

impl fmt::Debug for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock(&self.state);
        f.debug_struct("Progress")
            .field("cancelled", &state.cancelled)
            .field("completed", &state.completed)
            .field("total", &state.total)
            .field("state", &state.code)
            .field("description", &state.description)
            .finish()
    }
}
