// src/guard.rs

//! Interruption guard
//!
//! A scope-bound coordinator over the interruption latch and the worker
//! rendezvous. When the guard leaves scope it first waits for every registered
//! worker, then runs the registered cleanup action if cancellation was
//! requested or the scope is failing (an error was reported through the guard,
//! or a panic is unwinding). The cleanup is taken out of its slot before it
//! runs, so it executes at most once however many paths reach it. Failures
//! raised by the cleanup itself are logged and dropped.
//!
//! # Example
//!
//! ```ignore
//! use txplan::guard::InterruptionGuard;
//!
//! let mut guard = InterruptionGuard::new(|| {
//!     remove_partial_downloads()?;
//!     Ok(())
//! });
//! guard.spawn(|| fetch_all())?;
//! guard.run(|| link_packages(&plan))?;
//! ```

use crate::error::{Result, safe_invoke};
use crate::interrupt::InterruptFlag;
use crate::rendezvous::{ThreadCounter, TrackedThread};
use std::fmt;
use std::sync::{Arc, LazyLock, Mutex, PoisonError};
use std::thread;

type CleanupFn = Box<dyn FnOnce() -> anyhow::Result<()> + Send>;

/// Holder for the single cleanup action
#[derive(Clone, Default)]
pub struct CleanupSlot {
    action: Arc<Mutex<Option<CleanupFn>>>,
}

static GLOBAL_CLEANUP: LazyLock<CleanupSlot> = LazyLock::new(CleanupSlot::new);

impl CleanupSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide slot used by [`InterruptionGuard::new`]
    pub fn global() -> Self {
        GLOBAL_CLEANUP.clone()
    }

    /// Register `action`, replacing any previous one
    pub fn set<F>(&self, action: F)
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        let previous = self
            .action
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(Box::new(action));
        if previous.is_some() {
            tracing::debug!("Replaced previously registered cleanup action");
        }
    }

    pub fn clear(&self) {
        self.action
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    pub fn is_armed(&self) -> bool {
        self.action
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Take the action out of the slot and run it
    ///
    /// Returns whether an action was present. Errors and panics from the
    /// action are logged, never propagated.
    pub fn invoke(&self) -> bool {
        let action = self
            .action
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(action) = action else {
            return false;
        };

        if let Err(e) = safe_invoke(action) {
            tracing::error!("Interruption guard cleanup failed: {}", e);
        }
        true
    }
}

impl fmt::Debug for CleanupSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CleanupSlot")
            .field("armed", &self.is_armed())
            .finish()
    }
}

/// Finalizes guarded work when dropped
#[must_use = "the guard finalizes when it is dropped"]
#[derive(Debug)]
pub struct InterruptionGuard {
    flag: InterruptFlag,
    counter: ThreadCounter,
    cleanup: CleanupSlot,
    failed: bool,
}

impl InterruptionGuard {
    /// Guard the process-wide latch and worker counter, registering `cleanup`
    /// in the process-wide slot
    pub fn new<F>(cleanup: F) -> Self
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        let slot = CleanupSlot::global();
        slot.set(cleanup);
        Self::with_parts(InterruptFlag::global(), ThreadCounter::global(), slot)
    }

    /// Guard an explicit latch, counter and cleanup slot
    pub fn with_parts(flag: InterruptFlag, counter: ThreadCounter, cleanup: CleanupSlot) -> Self {
        Self {
            flag,
            counter,
            cleanup,
            failed: false,
        }
    }

    pub fn flag(&self) -> &InterruptFlag {
        &self.flag
    }

    pub fn counter(&self) -> &ThreadCounter {
        &self.counter
    }

    /// Record that an error is leaving the guarded scope
    pub fn mark_failed(&mut self) {
        self.failed = true;
    }

    pub fn is_failing(&self) -> bool {
        self.failed
    }

    /// Run `f`, marking the guard as failing if it returns an error
    ///
    /// The result is handed back unchanged.
    pub fn run<T, E, F>(&mut self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce() -> std::result::Result<T, E>,
    {
        let result = f();
        if result.is_err() {
            self.failed = true;
        }
        result
    }

    /// Spawn a worker tracked by this guard's counter
    pub fn spawn<T, F>(&self, f: F) -> Result<TrackedThread<T>>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        TrackedThread::spawn_in(&self.counter, f)
    }
}

impl Drop for InterruptionGuard {
    fn drop(&mut self) {
        self.counter.wait_for_all();

        let interrupted = self.flag.is_set();
        let unwinding = thread::panicking();
        if !(interrupted || self.failed || unwinding) {
            return;
        }

        if interrupted {
            tracing::info!("Interrupted; running cleanup");
        } else {
            tracing::warn!("Guarded scope failed; running cleanup");
        }

        if !self.cleanup.invoke() {
            tracing::debug!("No cleanup action registered");
        }
    }
}
