//! Execution queues continuations and handlers can be dispatched onto.
//!
//! The core only needs [`ExecutionQueue::submit`]; it never schedules work
//! itself. Two small queues ship with the crate: [`SerialQueue`], a FIFO
//! drained by one worker thread, and [`ManualQueue`], a FIFO drained by whoever
//! owns it (typically a main or UI loop calling [`ManualQueue::run_pending`]).
//!
use crate::sync::{guarded, lock};
use crate::Error;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{
    mpsc::{channel, Sender},
    Arc, Mutex,
};
use std::thread;

/// A unit of work submitted to a queue.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// An executor accepting closures for (usually asynchronous) execution.
///
/// Submission is fire-and-forget; the queue is expected to run the job
/// eventually, with no guarantee on timing.
pub trait ExecutionQueue: Send + Sync {
    fn submit(&self, job: Job);
}

impl<Q: ExecutionQueue + ?Sized> ExecutionQueue for Arc<Q> {
    fn submit(&self, job: Job) {
        (**self).submit(job)
    }
}

/// Where a continuation or handler runs.
#[derive(Clone, Default)]
pub enum Dispatch {
    /// Synchronously, on the thread that triggered it.
    #[default]
    Inline,
    /// Submitted to the given queue.
    On(Arc<dyn ExecutionQueue>),
}

impl Dispatch {
    pub fn on<Q>(queue: &Q) -> Self
    where
        Q: ExecutionQueue + Clone + 'static,
    {
        Dispatch::On(Arc::new(queue.clone()))
    }

    pub fn run<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        match self {
            Dispatch::Inline => job(),
            Dispatch::On(queue) => queue.submit(Box::new(job)),
        }
    }
}

impl fmt::Debug for Dispatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dispatch::Inline => f.write_str("Inline"),
            Dispatch::On(_) => f.write_str("On(..)"),
        }
    }
}

/// A FIFO queue backed by a single worker thread.
///
/// Handles are cheap to clone; the worker exits once every handle is dropped
/// and the remaining jobs have run.
///
/// # Examples
///
/// ```
/// use promise_chain::{Future, SerialQueue};
/// let queue = SerialQueue::new().unwrap();
/// let doubled = Future::<i32, ()>::from_result(21).then_on_success_on(&queue, |v| Ok(v * 2));
/// assert_eq!(doubled.result(), Some(42));
/// ```
#[derive(Debug, Clone)]
pub struct SerialQueue {
    sender: Sender<Job>,
    name: Arc<str>,
}

impl SerialQueue {
    pub fn new() -> Result<Self, Error> {
        Self::builder().spawn()
    }

    pub fn builder() -> SerialQueueBuilder {
        SerialQueueBuilder::default()
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl ExecutionQueue for SerialQueue {
    fn submit(&self, job: Job) {
        if self.sender.send(job).is_err() {
            tracing::warn!(queue = %self.name, "queue worker is gone, dropping job");
        }
    }
}

/// Configuration for a [`SerialQueue`] worker.
#[derive(Debug, Clone)]
pub struct SerialQueueBuilder {
    name: String,
    stack_size: Option<usize>,
}

impl Default for SerialQueueBuilder {
    fn default() -> Self {
        Self {
            name: "promise-chain-queue".to_string(),
            stack_size: None,
        }
    }
}

impl SerialQueueBuilder {
    /// Name of the worker thread.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.stack_size = Some(size);
        self
    }

    pub fn spawn(self) -> Result<SerialQueue, Error> {
        let (tx, rx) = channel::<Job>();
        let mut builder = thread::Builder::new().name(self.name.clone());
        if let Some(size) = self.stack_size {
            builder = builder.stack_size(size);
        }
        let name: Arc<str> = self.name.into();
        let worker_name = name.clone();
        builder.spawn(move || {
            tracing::debug!(queue = %worker_name, "queue worker started");
            for job in rx {
                // A panicking job must not take the remaining jobs down with it.
                let _ = guarded("queued job", job);
            }
            tracing::debug!(queue = %worker_name, "queue worker stopped");
        })?;
        Ok(SerialQueue { sender: tx, name })
    }
}

/// A FIFO queue whose jobs only run when the owner pumps it.
///
/// This is the shape of a main-thread queue: work is posted from anywhere and
/// executed on the thread that calls [`run_pending`](ManualQueue::run_pending).
#[derive(Clone, Default)]
pub struct ManualQueue {
    jobs: Arc<Mutex<VecDeque<Job>>>,
}

impl ManualQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs queued jobs, including ones submitted while running, until the
    /// queue is empty. Returns how many jobs ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            let job = lock(&self.jobs).pop_front();
            match job {
                Some(job) => {
                    job();
                    ran += 1;
                }
                None => return ran,
            }
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.jobs).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ExecutionQueue for ManualQueue {
    fn submit(&self, job: Job) {
        lock(&self.jobs).push_back(job);
    }
}

impl fmt::Debug for ManualQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualQueue").field("pending", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_serial_queue_runs_in_order() {
        let queue = SerialQueue::builder().name("test-serial").spawn().unwrap();
        assert_eq!(queue.name(), "test-serial");
        let (tx, rx) = channel();
        for i in 0..10 {
            let tx = tx.clone();
            queue.submit(Box::new(move || {
                tx.send((i, thread::current().name().map(str::to_owned))).unwrap();
            }));
        }
        for i in 0..10 {
            let (got, name) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
            assert_eq!(got, i);
            assert_eq!(name.as_deref(), Some("test-serial"));
        }
    }

    #[test]
    fn test_serial_queue_survives_panicking_job() {
        let queue = SerialQueue::new().unwrap();
        let (tx, rx) = channel();
        queue.submit(Box::new(|| panic!("boom")));
        queue.submit(Box::new(move || tx.send(1).unwrap()));
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 1);
    }

    #[test]
    fn test_manual_queue_runs_only_when_pumped() {
        let queue = ManualQueue::new();
        let count = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let count = count.clone();
            queue.submit(Box::new(move || {
                count.fetch_add(1, Ordering::SeqCst);
            }));
        }
        assert_eq!(queue.len(), 3);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(queue.run_pending(), 3);
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_manual_queue_runs_jobs_submitted_while_running() {
        let queue = ManualQueue::new();
        let inner = queue.clone();
        queue.submit(Box::new(move || inner.submit(Box::new(|| {}))));
        assert_eq!(queue.run_pending(), 2);
    }

    #[test]
    fn test_dispatch_inline_runs_immediately() {
        let hit = Arc::new(AtomicUsize::new(0));
        let h = hit.clone();
        Dispatch::Inline.run(move || {
            h.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(hit.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dispatch_accepts_shared_trait_object() {
        let manual = ManualQueue::new();
        let shared: Arc<dyn ExecutionQueue> = Arc::new(manual.clone());
        Dispatch::on(&shared).run(|| {});
        assert_eq!(manual.len(), 1);
    }
}
