// src/lib.rs

//! txplan: transaction planning for package environments
//!
//! Turns a solved package set into an ordered, classified, cancellable plan.
//!
//! # Architecture
//!
//! - **Universe** (`universe`): installed and available packages, loaded from
//!   channel indexes and prefix records
//! - **Resolver** (`resolver`): the solver interface and its decisions
//! - **Transaction** (`transaction`): steps, classification, ordering and the
//!   executor plan
//! - **Execution safety** (`interrupt`, `rendezvous`, `guard`): cooperative
//!   cancellation, worker rendezvous and cleanup that runs exactly once
//! - **Errors** (`error`, `failure`): structured and aggregated errors, fatal
//!   signal and panic handlers
//!
//! # Example
//!
//! ```ignore
//! let mut universe = Universe::new();
//! load_channels(&mut universe, &channels, &LoadOptions::default(), &InterruptFlag::global())?;
//! let solution = ExplicitSolver::new().solve(&universe, &request).map_err(conflicts_to_error)?;
//! let mut tx = Transaction::from_solver(&universe, &solution);
//! tx.order(&universe, OrderFlags::default())?;
//! println!("{}", tx.classify(&universe, TransactionMode::default()).summary());
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod failure;
pub mod guard;
pub mod interrupt;
pub mod rendezvous;
pub mod resolver;
pub mod transaction;
pub mod universe;
pub mod version;

pub use config::{ChannelPriority, Config};
pub use context::{Context, ContextOptions};
pub use error::{AggregatedError, Error, ErrorCode, Failure, Result, safe_invoke};
pub use failure::{FailureHandlers, abort_on_panic};
pub use guard::{CleanupSlot, InterruptionGuard};
pub use interrupt::{
    InterruptFlag, Interrupted, install_interrupt_handler, interruption_point, is_interrupted,
    set_interrupted,
};
pub use rendezvous::{ThreadCounter, TrackedThread, wait_for_all_threads};
pub use resolver::{Conflict, Decision, ExplicitSolver, Request, Solution, Solver};
pub use transaction::{
    Classification, OrderFlags, PlannedStep, StepType, Transaction, TransactionMode,
};
pub use universe::{Dependency, PackageRecord, SolvableId, Universe};
pub use version::{Version, VersionConstraint};
