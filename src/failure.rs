// src/failure.rs

//! Fatal failure handlers
//!
//! Fail-fast policy for conditions nothing can recover from: a segmentation
//! fault, which means native state is corrupted, and a panic that nothing
//! caught. Both print a banner and a backtrace to stderr and abort the process.
//!
//! Installation is an explicit lifecycle. Call [`FailureHandlers::install`]
//! once at process start and [`FailureHandlers::restore`] at shutdown (dropping
//! the handle restores too). Uncaught panics are handled at the entry point with
//! [`abort_on_panic`]; panics that a worker join or `catch_unwind` recovers stay
//! recoverable.
//!
//! Formatting a backtrace inside a signal handler is not async-signal-safe. The
//! process is about to abort anyway, so the report is best effort.

use crate::error::{Error, ErrorCode, Result, panic_message};
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};
use std::backtrace::Backtrace;
use std::fmt;
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};

static INSTALLED: AtomicBool = AtomicBool::new(false);

/// Fatal condition being reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatalKind {
    /// SIGSEGV with its signal number
    Segfault(i32),
    Panic,
}

/// Banner printed ahead of the backtrace
pub fn fatal_banner(kind: FatalKind) -> String {
    match kind {
        FatalKind::Segfault(signum) => format!(
            "############\nFATAL: SIGSEGV (segmentation fault, signal {}) - ABORTING",
            signum
        ),
        FatalKind::Panic => "############\nFATAL: unrecoverable panic - ABORTING".to_string(),
    }
}

fn report_fatal(kind: FatalKind, detail: Option<&str>) {
    let trace = Backtrace::force_capture();
    let mut stderr = std::io::stderr().lock();
    let _ = writeln!(stderr, "{}", fatal_banner(kind));
    if let Some(detail) = detail {
        let _ = writeln!(stderr, "{}", detail);
    }
    let _ = writeln!(stderr, "{}", trace);
    let _ = stderr.flush();
}

extern "C" fn on_segfault(signum: libc::c_int) {
    report_fatal(FatalKind::Segfault(signum), None);
    std::process::abort();
}

/// Run `f`, aborting the process if a panic escapes it
///
/// Meant for the outermost frame of `main`: a panic reaching it was not
/// handled anywhere, so the banner and a backtrace are printed and the process
/// aborts instead of unwinding further.
pub fn abort_on_panic<T, F>(f: F) -> T
where
    F: FnOnce() -> T,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => value,
        Err(payload) => {
            report_fatal(FatalKind::Panic, Some(&panic_message(payload.as_ref())));
            std::process::abort();
        }
    }
}

/// Installed fatal handlers and the state they replaced
pub struct FailureHandlers {
    previous_segv: Option<SigAction>,
}

impl FailureHandlers {
    /// Install the SIGSEGV handler
    ///
    /// Fails with [`ErrorCode::IncorrectUsage`] if handlers are already installed.
    pub fn install() -> Result<Self> {
        if INSTALLED.swap(true, Ordering::SeqCst) {
            return Err(Error::incorrect_usage(
                "Fatal failure handlers are already installed",
            ));
        }

        let action = SigAction::new(
            SigHandler::Handler(on_segfault),
            SaFlags::SA_RESETHAND,
            SigSet::empty(),
        );

        // SAFETY: on_segfault never returns; it reports and aborts.
        let previous_segv = match unsafe { signal::sigaction(Signal::SIGSEGV, &action) } {
            Ok(previous) => previous,
            Err(errno) => {
                INSTALLED.store(false, Ordering::SeqCst);
                return Err(Error::new(
                    format!("Failed to install SIGSEGV handler: {}", errno),
                    ErrorCode::Io,
                ));
            }
        };

        tracing::info!("Installed fatal failure handlers");
        Ok(Self {
            previous_segv: Some(previous_segv),
        })
    }

    pub fn is_installed() -> bool {
        INSTALLED.load(Ordering::SeqCst)
    }

    /// Put back the SIGSEGV disposition that was replaced
    pub fn restore(mut self) -> Result<()> {
        self.restore_previous()
    }

    fn restore_previous(&mut self) -> Result<()> {
        if let Some(previous) = self.previous_segv.take() {
            // SAFETY: reinstalls the disposition returned by sigaction at install time.
            unsafe { signal::sigaction(Signal::SIGSEGV, &previous) }.map_err(|errno| {
                Error::new(
                    format!("Failed to restore SIGSEGV handler: {}", errno),
                    ErrorCode::Io,
                )
            })?;
            INSTALLED.store(false, Ordering::SeqCst);
            tracing::info!("Restored previous fatal failure handlers");
        }

        Ok(())
    }
}

impl fmt::Debug for FailureHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FailureHandlers")
            .field("active", &self.previous_segv.is_some())
            .finish()
    }
}

impl Drop for FailureHandlers {
    fn drop(&mut self) {
        if let Err(e) = self.restore_previous() {
            tracing::warn!("{}", e);
        }
    }
}
