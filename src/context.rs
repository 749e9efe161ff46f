// src/context.rs

//! Process context
//!
//! Owns the process-wide handlers for the lifetime of an application:
//! the `tracing` subscriber, the SIGINT interruption handler and the fatal
//! failure handlers. Libraries embedding the planner usually turn this off
//! and keep their own handlers.

use crate::config::Config;
use crate::error::Result;
use crate::failure::FailureHandlers;
use crate::interrupt::{InterruptHandler, install_interrupt_handler};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextOptions {
    /// Install the subscriber, the SIGINT handler and the fatal handlers
    pub enable_logging_and_signal_handling: bool,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            enable_logging_and_signal_handling: true,
        }
    }
}

/// Configuration plus the handlers installed for it
///
/// Dropping the context restores the previous signal disposition and panic
/// hook.
#[derive(Debug)]
pub struct Context {
    config: Config,
    interrupt: Option<InterruptHandler>,
    failure: Option<FailureHandlers>,
}

/// Install a `fmt` subscriber filtered by `RUST_LOG`, falling back to `default_filter`
///
/// Returns false if a global subscriber was already set.
pub fn init_logging(default_filter: &str) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}

impl Context {
    pub fn new(config: Config, options: ContextOptions) -> Result<Self> {
        if !options.enable_logging_and_signal_handling {
            return Ok(Self {
                config,
                interrupt: None,
                failure: None,
            });
        }

        if !init_logging(&config.logging.filter) {
            tracing::debug!("Global subscriber already set; keeping it");
        }
        let interrupt = install_interrupt_handler()?;
        let failure = FailureHandlers::install()?;

        Ok(Self {
            config,
            interrupt: Some(interrupt),
            failure: Some(failure),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn handles_signals(&self) -> bool {
        self.interrupt.is_some()
    }

    /// Restore every handler, reporting the first failure
    pub fn shutdown(mut self) -> Result<()> {
        let failure = self.failure.take().map(FailureHandlers::restore);
        let interrupt = self.interrupt.take().map(InterruptHandler::restore);
        failure.transpose()?;
        interrupt.transpose()?;
        Ok(())
    }
}
