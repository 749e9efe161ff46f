// src/rendezvous.rs

//! Worker thread rendezvous
//!
//! A counter of in-flight worker threads guarded by a mutex/condition-variable
//! pair. Workers register when they start and deregister when they end,
//! including when they unwind from a panic, because deregistration lives in the
//! `Drop` of [`ThreadRegistration`]. [`ThreadCounter::wait_for_all`] is a
//! barrier: it blocks until the count returns to zero and has no timeout.

use crate::error::Result;
use std::sync::{Arc, Condvar, LazyLock, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

#[derive(Debug, Default)]
struct CounterState {
    count: Mutex<usize>,
    idle: Condvar,
}

/// Shared count of registered worker threads
#[derive(Debug, Clone, Default)]
pub struct ThreadCounter {
    inner: Arc<CounterState>,
}

static GLOBAL_COUNTER: LazyLock<ThreadCounter> = LazyLock::new(ThreadCounter::new);

impl ThreadCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide counter used by [`TrackedThread::spawn`]
    pub fn global() -> Self {
        GLOBAL_COUNTER.clone()
    }

    fn lock(&self) -> MutexGuard<'_, usize> {
        self.inner
            .count
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn increase(&self) {
        *self.lock() += 1;
    }

    pub fn decrease(&self) {
        let mut count = self.lock();
        if *count == 0 {
            tracing::warn!("Thread counter decreased below zero; ignoring");
        } else {
            *count -= 1;
        }
        if *count == 0 {
            self.inner.idle.notify_all();
        }
    }

    pub fn count(&self) -> usize {
        *self.lock()
    }

    /// Block until every registered worker has deregistered
    pub fn wait_for_all(&self) {
        let count = self.lock();
        let _idle = self
            .inner
            .idle
            .wait_while(count, |count| *count > 0)
            .unwrap_or_else(PoisonError::into_inner);
    }

    /// Register the current unit of work; deregisters on drop
    pub fn register(&self) -> ThreadRegistration {
        self.increase();
        ThreadRegistration {
            counter: self.clone(),
        }
    }
}

/// Live registration in a [`ThreadCounter`]
#[must_use = "dropping the registration deregisters immediately"]
#[derive(Debug)]
pub struct ThreadRegistration {
    counter: ThreadCounter,
}

impl Drop for ThreadRegistration {
    fn drop(&mut self) {
        self.counter.decrease();
    }
}

pub fn increase_thread_count() {
    GLOBAL_COUNTER.increase();
}

pub fn decrease_thread_count() {
    GLOBAL_COUNTER.decrease();
}

pub fn thread_count() -> usize {
    GLOBAL_COUNTER.count()
}

/// Block until every worker registered in the process-wide counter is done
pub fn wait_for_all_threads() {
    GLOBAL_COUNTER.wait_for_all();
}

/// A spawned thread that stays registered in a [`ThreadCounter`] for its whole life
#[derive(Debug)]
pub struct TrackedThread<T> {
    handle: JoinHandle<T>,
}

impl<T: Send + 'static> TrackedThread<T> {
    /// Spawn a worker registered in the process-wide counter
    pub fn spawn<F>(f: F) -> Result<Self>
    where
        F: FnOnce() -> T + Send + 'static,
    {
        Self::spawn_in(&ThreadCounter::global(), f)
    }

    /// Spawn a worker registered in `counter`
    ///
    /// Registration happens before the thread starts so a concurrent
    /// `wait_for_all` cannot miss it.
    pub fn spawn_in<F>(counter: &ThreadCounter, f: F) -> Result<Self>
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let registration = counter.register();
        let handle = thread::Builder::new().spawn(move || {
            let _registration = registration;
            f()
        })?;
        Ok(Self { handle })
    }

    pub fn join(self) -> thread::Result<T> {
        self.handle.join()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn thread(&self) -> &thread::Thread {
        self.handle.thread()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn test_register_and_drop() {
        let counter = ThreadCounter::new();
        let first = counter.register();
        let second = counter.register();
        assert_eq!(counter.count(), 2);

        drop(first);
        assert_eq!(counter.count(), 1);
        drop(second);
        assert_eq!(counter.count(), 0);
    }

    #[test]
    fn test_decrease_never_goes_negative() {
        let counter = ThreadCounter::new();
        counter.decrease();
        assert_eq!(counter.count(), 0);
    }

    #[test]
    fn test_wait_with_no_workers_returns() {
        let counter = ThreadCounter::new();
        counter.wait_for_all();
    }

    #[test]
    fn test_wait_for_all_including_panicking_worker() {
        let counter = ThreadCounter::new();
        let done = Arc::new(AtomicUsize::new(0));
        let mut workers = Vec::new();

        for i in 0..8 {
            let done = Arc::clone(&done);
            workers.push(
                TrackedThread::spawn_in(&counter, move || {
                    thread::sleep(Duration::from_millis(5 * i));
                    done.fetch_add(1, Ordering::SeqCst);
                    if i == 3 {
                        panic!("worker {} failed", i);
                    }
                })
                .unwrap(),
            );
        }

        counter.wait_for_all();
        assert_eq!(done.load(Ordering::SeqCst), 8);
        assert_eq!(counter.count(), 0);

        let panicked = workers
            .into_iter()
            .map(TrackedThread::join)
            .filter(|r| r.is_err())
            .count();
        assert_eq!(panicked, 1);
    }

    #[test]
    fn test_wait_blocks_until_last_worker_leaves() {
        let counter = ThreadCounter::new();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let worker = TrackedThread::spawn_in(&counter, move || {
            release_rx.recv().ok();
        })
        .unwrap();

        let returned = Arc::new(AtomicBool::new(false));
        let waiter = {
            let counter = counter.clone();
            let returned = Arc::clone(&returned);
            thread::spawn(move || {
                counter.wait_for_all();
                returned.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!returned.load(Ordering::SeqCst));
        assert_eq!(counter.count(), 1);

        release_tx.send(()).unwrap();
        waiter.join().unwrap();
        assert!(returned.load(Ordering::SeqCst));
        worker.join().unwrap();
    }
}
