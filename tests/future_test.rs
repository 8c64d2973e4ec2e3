#[cfg(test)]
mod tests {
    use futures::executor::block_on;
    use promise_chain::{
        CancellableProgress, Future, ManualQueue, Progress, Promise, Resolution, SerialQueue,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier, Once};
    use std::{thread, time::Duration};

    static INIT_LOGGING: Once = Once::new();

    fn init_test_logging() {
        INIT_LOGGING.call_once(|| {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                .with_test_writer()
                .with_thread_ids(true)
                .try_init();
        });
    }

    #[test]
    fn test_promise_resolved_from_thread() {
        init_test_logging();
        let promise = Promise::<i32, String>::new();
        let future = promise.future();

        thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            promise.resolve(42);
        });

        assert_eq!(future.result(), Some(42));
    }

    #[test]
    fn test_chain_across_queues() {
        init_test_logging();
        let first = SerialQueue::builder().name("first").spawn().unwrap();
        let second = SerialQueue::builder().name("second").spawn().unwrap();
        let promise = Promise::<u32, String>::new();

        let end = promise
            .future()
            .then_on_success_on(&first, |v| Ok(v + 1))
            .then_task_on_success_on(&second, |v| {
                let inner = Promise::new();
                let future = inner.future();
                thread::spawn(move || inner.resolve(v * 2));
                future
            })
            .then_on(&first, |f| Ok(f.result().map(|v| format!("{v}!"))));

        promise.resolve(20);
        assert!(end.wait_timeout(Duration::from_secs(5)));
        assert_eq!(end.result(), Some(Some("42!".to_string())));
    }

    #[test]
    fn test_cancellation_propagates_to_end_of_chain() {
        init_test_logging();
        let promise = Promise::<u32, String>::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let end = promise
            .future()
            .then_on_success(move |v| {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(v)
            })
            .then_on_error(|_| Ok(0));
        promise.cancel();
        assert!(end.is_cancelled());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_all_of_stress() {
        init_test_logging();
        for _ in 0..20 {
            const N: usize = 32;
            let promises: Vec<_> = (0..N).map(|_| Promise::<usize, usize>::new()).collect();
            let all = Future::all_of(promises.iter().map(Promise::future));
            let resolutions = Arc::new(AtomicUsize::new(0));
            let r = resolutions.clone();
            all.on_resolve(move |_| {
                r.fetch_add(1, Ordering::SeqCst);
            });

            let barrier = Arc::new(Barrier::new(N));
            let handles: Vec<_> = promises
                .into_iter()
                .enumerate()
                .map(|(i, promise)| {
                    let barrier = barrier.clone();
                    thread::spawn(move || {
                        barrier.wait();
                        if i % 7 == 3 {
                            promise.reject(i);
                        } else {
                            promise.resolve(i);
                        }
                    })
                })
                .collect();
            for handle in handles {
                handle.join().expect("resolver thread panicked");
            }

            assert_eq!(all.error(), Some(3));
            assert_eq!(resolutions.load(Ordering::SeqCst), 1);
        }
    }

    #[test]
    fn test_all_of_can_be_awaited() {
        init_test_logging();
        let a = Promise::<&str, ()>::new();
        let b = Promise::<&str, ()>::new();
        let all = Future::all_of([a.future(), b.future()]);
        let waiter = thread::spawn(move || block_on(all.waiter()));
        b.resolve("b");
        a.resolve("a");
        let resolution = waiter.join().expect("waiter thread panicked");
        assert_eq!(resolution, Resolution::Result(vec!["a", "b"]));
    }

    #[test]
    fn test_progress_drives_cancellation_of_work() {
        init_test_logging();
        let main = ManualQueue::new();
        let progress = Progress::new();
        let promise = Promise::<u64, String>::new();
        let future = promise.future();

        let reported = Arc::new(AtomicUsize::new(0));
        let r = reported.clone();
        progress.set_progress_handler_on(&main, move |_| {
            r.fetch_add(1, Ordering::SeqCst);
        });

        let token = progress.clone();
        let worker = thread::spawn(move || {
            let mut done = 0;
            while !token.is_cancelled() {
                done += 1;
                token.update_progress(done, u64::MAX);
                thread::sleep(Duration::from_millis(1));
            }
            promise.cancel();
        });

        while progress.progress().0 < 5 {
            thread::sleep(Duration::from_millis(1));
        }
        progress.cancel();
        worker.join().expect("worker thread panicked");

        assert!(future.is_cancelled());
        let (completed, _) = progress.progress();
        assert_eq!(main.run_pending() as u64, completed);
        assert_eq!(reported.load(Ordering::SeqCst) as u64, completed);
    }
}
