// src/interrupt.rs

//! Cooperative interruption
//!
//! The interruption latch moves one way only, from running to cancelled. It is
//! set by the SIGINT handler or by an explicit request and observed at
//! interruption points in long-running code. Observing a set latch yields
//! [`Interrupted`], a control value kept apart from [`crate::Error`].
//!
//! The process-wide latch is a plain static atomic so the signal handler can
//! store to it without allocating or locking. [`InterruptFlag`] wraps either
//! that latch or a private one, which lets isolated components (and tests)
//! carry their own cancellation state.

use crate::error::{Error, ErrorCode, Result};
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

static SIG_INTERRUPTED: AtomicBool = AtomicBool::new(false);
static HANDLER_INSTALLED: AtomicBool = AtomicBool::new(false);

/// Returned by an interruption point once cancellation was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, thiserror::Error)]
#[error("Interrupted by user")]
pub struct Interrupted;

/// Handle to an interruption latch
#[derive(Debug, Clone)]
pub struct InterruptFlag {
    latch: Latch,
}

#[derive(Debug, Clone)]
enum Latch {
    Process,
    Local(Arc<AtomicBool>),
}

impl InterruptFlag {
    /// The process-wide latch written by the SIGINT handler
    pub fn global() -> Self {
        Self {
            latch: Latch::Process,
        }
    }

    /// A fresh latch shared only between clones of the returned flag
    pub fn new() -> Self {
        Self {
            latch: Latch::Local(Arc::new(AtomicBool::new(false))),
        }
    }

    fn atomic(&self) -> &AtomicBool {
        match &self.latch {
            Latch::Process => &SIG_INTERRUPTED,
            Latch::Local(flag) => flag,
        }
    }

    pub fn is_global(&self) -> bool {
        matches!(self.latch, Latch::Process)
    }

    /// Request cancellation. Never reset.
    pub fn set(&self) {
        self.atomic().store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.atomic().load(Ordering::SeqCst)
    }

    /// Interruption point
    pub fn check(&self) -> std::result::Result<(), Interrupted> {
        if self.is_set() {
            Err(Interrupted)
        } else {
            Ok(())
        }
    }
}

impl Default for InterruptFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// Request cancellation of everything observing the process-wide latch
pub fn set_interrupted() {
    SIG_INTERRUPTED.store(true, Ordering::SeqCst);
}

pub fn is_interrupted() -> bool {
    SIG_INTERRUPTED.load(Ordering::SeqCst)
}

/// Process-wide interruption point
pub fn interruption_point() -> std::result::Result<(), Interrupted> {
    if is_interrupted() {
        Err(Interrupted)
    } else {
        Ok(())
    }
}

extern "C" fn on_interrupt(_signum: libc::c_int) {
    SIG_INTERRUPTED.store(true, Ordering::SeqCst);
}

/// Installed SIGINT handler; restores the previous disposition on `restore` or drop
#[derive(Debug)]
pub struct InterruptHandler {
    previous: Option<SigAction>,
}

/// Route SIGINT to the process-wide interruption latch
///
/// Only one handler may be installed at a time.
pub fn install_interrupt_handler() -> Result<InterruptHandler> {
    if HANDLER_INSTALLED.swap(true, Ordering::SeqCst) {
        return Err(Error::incorrect_usage(
            "SIGINT interruption handler is already installed",
        ));
    }

    let action = SigAction::new(
        SigHandler::Handler(on_interrupt),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );

    // SAFETY: on_interrupt performs a single lock-free atomic store.
    let previous = match unsafe { signal::sigaction(Signal::SIGINT, &action) } {
        Ok(previous) => previous,
        Err(errno) => {
            HANDLER_INSTALLED.store(false, Ordering::SeqCst);
            return Err(Error::new(
                format!("Failed to install SIGINT handler: {}", errno),
                ErrorCode::Io,
            ));
        }
    };

    tracing::info!("Installed SIGINT interruption handler");
    Ok(InterruptHandler {
        previous: Some(previous),
    })
}

impl InterruptHandler {
    /// Put back the SIGINT disposition that was active before installation
    pub fn restore(mut self) -> Result<()> {
        self.restore_previous()
    }

    fn restore_previous(&mut self) -> Result<()> {
        let Some(previous) = self.previous.take() else {
            return Ok(());
        };

        // SAFETY: reinstalls the disposition returned by sigaction at install time.
        unsafe { signal::sigaction(Signal::SIGINT, &previous) }.map_err(|errno| {
            Error::new(
                format!("Failed to restore SIGINT handler: {}", errno),
                ErrorCode::Io,
            )
        })?;

        HANDLER_INSTALLED.store(false, Ordering::SeqCst);
        tracing::info!("Restored previous SIGINT handler");
        Ok(())
    }
}

impl Drop for InterruptHandler {
    fn drop(&mut self) {
        if let Err(e) = self.restore_previous() {
            tracing::warn!("{}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_flag_starts_clear() {
        let flag = InterruptFlag::new();
        assert!(!flag.is_set());
        assert!(!flag.is_global());
        assert_eq!(flag.check(), Ok(()));
    }

    #[test]
    fn test_local_flag_is_one_way() {
        let flag = InterruptFlag::new();
        flag.set();
        assert!(flag.is_set());
        flag.set();
        assert!(flag.is_set());
        assert_eq!(flag.check(), Err(Interrupted));
    }

    #[test]
    fn test_clones_share_latch() {
        let flag = InterruptFlag::new();
        let observer = flag.clone();
        let other = InterruptFlag::new();

        flag.set();

        assert!(observer.is_set());
        assert!(!other.is_set());
    }

    #[test]
    fn test_flag_visible_across_threads() {
        let flag = InterruptFlag::new();
        let writer = flag.clone();
        std::thread::spawn(move || writer.set()).join().unwrap();
        assert!(flag.is_set());
    }

    #[test]
    fn test_interrupted_message() {
        assert_eq!(Interrupted.to_string(), "Interrupted by user");
    }
}
