// tests/failure_handlers.rs

//! Fatal failure handlers and the process context.
//!
//! The handlers are process-wide, so the lifecycle runs in a single test and
//! every path that panics or aborts runs in a child process.

use std::process::{Command, Output};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use txplan::failure::{FatalKind, fatal_banner};
use txplan::{
    CleanupSlot, Config, Context, ContextOptions, ErrorCode, FailureHandlers, InterruptFlag,
    InterruptionGuard, ThreadCounter, TrackedThread, abort_on_panic,
};

const CHILD_ENV: &str = "TXPLAN_FATAL_CHILD";
const SURVIVED: &str = "child survived";

/// Re-run this test binary for the single ignored test `name`
fn run_child(name: &str) -> Output {
    let exe = std::env::current_exe().unwrap();
    Command::new(exe)
        .args(["--exact", name, "--ignored", "--nocapture", "--test-threads=1"])
        .env(CHILD_ENV, name)
        .output()
        .unwrap()
}

fn is_child(name: &str) -> bool {
    std::env::var(CHILD_ENV).is_ok_and(|v| v == name)
}

#[test]
fn test_install_restore_lifecycle() {
    assert!(!FailureHandlers::is_installed());

    let handlers = FailureHandlers::install().unwrap();
    assert!(FailureHandlers::is_installed());

    let err = FailureHandlers::install().unwrap_err();
    assert_eq!(err.code(), ErrorCode::IncorrectUsage);

    handlers.restore().unwrap();
    assert!(!FailureHandlers::is_installed());

    // The context installs the same handlers and gives them back on shutdown
    let ctx = Context::new(Config::default(), ContextOptions::default()).unwrap();
    assert!(ctx.handles_signals());
    assert!(FailureHandlers::is_installed());
    ctx.shutdown().unwrap();
    assert!(!FailureHandlers::is_installed());

    let handlers = FailureHandlers::install().unwrap();
    drop(handlers);
    assert!(!FailureHandlers::is_installed());
}

#[test]
#[ignore = "runs only as the child of test_uncaught_panic_aborts_with_banner"]
fn test_child_uncaught_panic() {
    if !is_child("test_child_uncaught_panic") {
        return;
    }
    let _handlers = FailureHandlers::install().unwrap();
    abort_on_panic(|| panic!("corrupted state"));
}

#[test]
fn test_uncaught_panic_aborts_with_banner() {
    let output = run_child("test_child_uncaught_panic");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains(&fatal_banner(FatalKind::Panic)));
    assert!(stderr.contains("corrupted state"));
}

#[test]
#[ignore = "runs only as the child of test_recovered_panics_survive_installed_handlers"]
fn test_child_recovered_panics() {
    if !is_child("test_child_recovered_panics") {
        return;
    }
    let _handlers = FailureHandlers::install().unwrap();

    // A panicking worker still deregisters and its join reports the panic
    let counter = ThreadCounter::new();
    let worker = TrackedThread::<()>::spawn_in(&counter, || panic!("worker failed")).unwrap();
    counter.wait_for_all();
    assert_eq!(counter.count(), 0);
    assert!(worker.join().is_err());

    // A panicking cleanup is swallowed by the guard
    let flag = InterruptFlag::new();
    let slot = CleanupSlot::new();
    let calls = Arc::new(AtomicUsize::new(0));
    {
        let calls = Arc::clone(&calls);
        slot.set(move || {
            calls.fetch_add(1, Ordering::SeqCst);
            panic!("cleanup failed");
        });
    }
    {
        let _guard = InterruptionGuard::with_parts(flag.clone(), ThreadCounter::new(), slot);
        flag.set();
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    abort_on_panic(|| eprintln!("{}", SURVIVED));
}

#[test]
fn test_recovered_panics_survive_installed_handlers() {
    let output = run_child("test_child_recovered_panics");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(output.status.success(), "child failed:\n{}", stderr);
    assert!(stderr.contains(SURVIVED));
    assert!(!stderr.contains("ABORTING"));
}
