mod common;

#[cfg(test)]
mod tests {
    use super::common::{after, settle, TestError};
    use cancellable_promise::{Error, NoError, Promise, Status};
    use std::{
        sync::{
            atomic::{AtomicBool, AtomicUsize, Ordering},
            mpsc, Arc,
        },
        thread,
        time::Duration,
    };

    #[test]
    fn test_promise_unit() {
        assert_eq!(Promise::<i32, TestError>::value(42).wait(), Ok(Ok(42)));
        assert_eq!(
            Promise::<i32, TestError>::error(TestError::Error2).wait(),
            Ok(Err(TestError::Error2))
        );
    }

    #[test]
    fn test_promise_async() {
        let promise = after(Ok(42), 100);
        let timeout = Duration::from_millis(1000);
        assert_eq!(promise.wait_timeout(timeout), Ok(Ok(42)));
    }

    #[test]
    fn test_each_subscriber_called_once() {
        let promise = after(Ok(1), 50);
        let calls = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::channel();
        for _ in 0..4 {
            let calls = calls.clone();
            let tx = tx.clone();
            promise.subscribe(move |result| {
                calls.fetch_add(1, Ordering::SeqCst);
                tx.send(result).unwrap();
            });
        }
        for _ in 0..4 {
            assert_eq!(rx.recv_timeout(Duration::from_secs(1)), Ok(Ok(1)));
        }
        settle(50);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_promise_retains_value() {
        let promise = after(Ok(42), 100);
        promise.subscribe(|_| {});
        settle(200);
        assert_eq!(promise.status(), Status::Complete);

        // a late subscriber is served synchronously from the cache
        let served = Arc::new(AtomicBool::new(false));
        let flag = served.clone();
        promise.subscribe(move |result| {
            assert_eq!(result, Ok(42));
            flag.store(true, Ordering::SeqCst);
        });
        assert!(served.load(Ordering::SeqCst));
    }

    #[test]
    fn test_lazy_start() {
        let started = Arc::new(AtomicBool::new(false));
        let flag = started.clone();
        let promise = Promise::<(), TestError>::new(move |resolver| {
            flag.store(true, Ordering::SeqCst);
            resolver.resolve(())
        });
        settle(50);
        assert!(!started.load(Ordering::SeqCst));
        assert_eq!(promise.status(), Status::Pending);
        promise.subscribe(|_| {});
        assert!(started.load(Ordering::SeqCst));
    }

    #[test]
    fn test_non_cancellable_promise_cancel() {
        let promise = after(Ok(42), 100);
        let received = Arc::new(AtomicBool::new(false));
        let flag = received.clone();
        promise.subscribe(move |_| flag.store(true, Ordering::SeqCst));

        let canceller = promise.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            canceller.cancel();
        });

        settle(200);
        assert!(!received.load(Ordering::SeqCst));
        assert_eq!(promise.status(), Status::Cancelled);
    }

    #[test]
    fn test_cancellable_promise_cancel() {
        let cancelled = Arc::new(AtomicUsize::new(0));
        let counted = cancelled.clone();
        let promise = Promise::<(), TestError>::new(move |resolver| {
            resolver.on_cancel(move || {
                counted.fetch_add(1, Ordering::SeqCst);
            });
        });
        promise.subscribe(|_| {});
        promise.cancel();
        promise.cancel();
        assert_eq!(cancelled.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cancel_before_complete_ignores_late_resolve() {
        let (tx, rx) = mpsc::channel();
        let promise = Promise::<i32, TestError>::new(move |resolver| {
            tx.send(resolver).unwrap();
        });
        let received = Arc::new(AtomicUsize::new(0));
        let counted = received.clone();
        promise.subscribe(move |_| {
            counted.fetch_add(1, Ordering::SeqCst);
        });
        let resolver = rx.recv().unwrap();
        promise.cancel();

        thread::spawn(move || {
            resolver.resolve(1);
            resolver.reject(TestError::Error1);
        })
        .join()
        .expect("The resolver thread has panicked");

        assert_eq!(received.load(Ordering::SeqCst), 0);
        assert_eq!(promise.peek(), None);
    }

    fn verify_cancelled<T>(promise: Promise<T, TestError>)
    where
        T: Clone + Send + 'static + std::fmt::Debug + PartialEq,
    {
        promise.cancel();
        let received = Arc::new(AtomicBool::new(false));
        let flag = received.clone();
        promise.subscribe(move |_| flag.store(true, Ordering::SeqCst));
        settle(200);
        assert!(!received.load(Ordering::SeqCst));
        assert_eq!(promise.wait(), Err(Error::Cancelled));
    }

    #[test]
    fn test_cancelled_promise_subscribe() {
        verify_cancelled(Promise::<i32, TestError>::value(42));
        verify_cancelled(Promise::<i32, TestError>::error(TestError::Error1));
        verify_cancelled(after(Ok(42), 1));
    }

    #[test]
    fn test_concurrent_subscribe_and_resolve() {
        for _ in 0..50 {
            let (tx, rx) = mpsc::channel();
            let promise = Promise::<usize, NoError>::new(move |resolver| {
                tx.send(resolver).unwrap();
            });
            promise.subscribe(|_| {});
            let resolver = rx.recv().unwrap();

            let delivered = Arc::new(AtomicUsize::new(0));
            let subscribers: Vec<_> = (0..4)
                .map(|_| {
                    let promise = promise.clone();
                    let delivered = delivered.clone();
                    thread::spawn(move || {
                        promise.when_success(move |v| {
                            assert_eq!(v, 7);
                            delivered.fetch_add(1, Ordering::SeqCst);
                        });
                    })
                })
                .collect();
            let completer = thread::spawn(move || resolver.resolve(7));

            completer.join().expect("The completer thread has panicked");
            for subscriber in subscribers {
                subscriber.join().expect("A subscriber thread has panicked");
            }
            assert_eq!(delivered.load(Ordering::SeqCst), 4);
        }
    }

    #[test]
    fn test_concurrent_cancel_and_resolve() {
        for _ in 0..50 {
            let (tx, rx) = mpsc::channel();
            let promise = Promise::<usize, TestError>::new(move |resolver| {
                tx.send(resolver).unwrap();
            });
            let delivered = Arc::new(AtomicUsize::new(0));
            let counted = delivered.clone();
            promise.subscribe(move |_| {
                counted.fetch_add(1, Ordering::SeqCst);
            });
            let resolver = rx.recv().unwrap();

            let canceller = promise.clone();
            let cancel = thread::spawn(move || canceller.cancel());
            let resolve = thread::spawn(move || resolver.resolve(1));
            cancel.join().expect("The cancel thread has panicked");
            resolve.join().expect("The resolve thread has panicked");

            // whichever side won, the subscriber heard at most once and the
            // promise ends up terminal
            assert!(delivered.load(Ordering::SeqCst) <= 1);
            assert_eq!(promise.status(), Status::Cancelled);
        }
    }
}
