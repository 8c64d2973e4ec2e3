use crate::future::{Future, Resolution};
use crate::queue::Dispatch;
use crate::sync::lock;
use crate::Promise;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

struct Gather<T, E> {
    remaining: AtomicUsize,
    outcomes: Mutex<Vec<Option<Resolution<T, E>>>>,
    promise: Promise<Vec<T>, E>,
}

impl<T, E> Gather<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn record(&self, index: usize, resolution: Resolution<T, E>) {
        lock(&self.outcomes)[index] = Some(resolution);
        // Only the input that brings the count to zero resolves the aggregate.
        if self.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.finish();
        }
    }

    fn finish(&self) {
        let outcomes = std::mem::take(&mut *lock(&self.outcomes));
        let mut values = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            match outcome {
                Some(Resolution::Result(value)) => values.push(value),
                Some(Resolution::Error(err)) => return self.promise.reject(err),
                Some(Resolution::Cancelled) => return self.promise.cancel(),
                None => unreachable!("every input records before the count reaches zero"),
            }
        }
        self.promise.resolve(values)
    }
}

impl<T, E> Future<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// A future resolved once every input is resolved.
    ///
    /// On success it carries the inputs' results in input order. If any input
    /// failed or was cancelled, the aggregate takes the outcome of the failing
    /// or cancelled input with the lowest index. An empty input resolves
    /// immediately with an empty vector.
    ///
    /// The inputs are not consumed; more continuations can still be added to
    /// them.
    ///
    /// Completion is decided by one atomic countdown. The outcomes themselves
    /// are parked in a small mutex-guarded table, locked only for the slot
    /// write and the final read, never while another lock is held and never
    /// around user code.
    ///
    /// ```
    /// use promise_chain::{Future, Promise};
    /// let a = Promise::<i32, String>::new();
    /// let b = Future::from_result(2);
    /// let all = Future::all_of([a.future(), b]);
    /// assert!(!all.is_resolved());
    /// a.resolve(1);
    /// assert_eq!(all.result(), Some(vec![1, 2]));
    /// ```
    pub fn all_of<I>(futures: I) -> Future<Vec<T>, E>
    where
        I: IntoIterator<Item = Future<T, E>>,
    {
        let futures: Vec<_> = futures.into_iter().collect();
        if futures.is_empty() {
            return Future::from_result(Vec::new());
        }
        let gather = Arc::new(Gather {
            remaining: AtomicUsize::new(futures.len()),
            outcomes: Mutex::new((0..futures.len()).map(|_| None).collect()),
            promise: Promise::new(),
        });
        let aggregate = gather.promise.future();
        for (index, future) in futures.iter().enumerate() {
            let gather = gather.clone();
            future.register(
                Dispatch::Inline,
                Box::new(move |source| gather.record(index, source.resolution())),
            );
        }
        aggregate
    }
}
