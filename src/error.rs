// src/error.rs

//! Structured errors, aggregated error reporting and panic-safe invocation
//!
//! Recoverable failures carry an [`ErrorCode`], a message and an optional typed
//! payload for programmatic inspection. Independent failures from several
//! sub-operations are combined into an [`AggregatedError`]. Cancellation is not
//! an error: it travels as [`Interrupted`] inside [`Failure`] so callers can
//! tell "the user stopped this" from "this broke".

use crate::interrupt::Interrupted;
use std::any::Any;
use std::backtrace::Backtrace;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};
use strum_macros::{AsRefStr, Display, EnumString};

/// Closed set of error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorCode {
    Unknown,
    /// Several errors combined into one report
    Aggregated,
    /// Broken internal invariant; a backtrace is captured on construction
    InternalFailure,
    UserInterrupted,
    /// API used outside of its contract in a recoverable way
    IncorrectUsage,
    InvalidInput,
    Io,
    RepodataNotLoaded,
    PrefixDataNotLoaded,
    SatisfiabilityError,
}

/// A structured, recoverable error
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct Error {
    message: String,
    code: ErrorCode,
    payload: Option<Arc<dyn Any + Send + Sync>>,
    trace: Option<Arc<Backtrace>>,
}

impl Error {
    /// Create an error with a message and code
    pub fn new(message: impl Into<String>, code: ErrorCode) -> Self {
        let message = message.into();
        let trace = if code == ErrorCode::InternalFailure {
            let trace = Backtrace::capture();
            tracing::error!(code = %code, "{}\n{}", message, trace);
            Some(Arc::new(trace))
        } else {
            None
        };

        Self {
            message,
            code,
            payload: None,
            trace,
        }
    }

    /// Create an error carrying a typed payload
    pub fn with_payload<T>(message: impl Into<String>, code: ErrorCode, payload: T) -> Self
    where
        T: Any + Send + Sync,
    {
        let mut err = Self::new(message, code);
        err.payload = Some(Arc::new(payload));
        err
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(message, ErrorCode::InternalFailure)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(message, ErrorCode::InvalidInput)
    }

    pub fn incorrect_usage(message: impl Into<String>) -> Self {
        Self::new(message, ErrorCode::IncorrectUsage)
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Borrow the payload if one is attached and it has type `T`
    pub fn payload<T: Any>(&self) -> Option<&T> {
        self.payload.as_deref().and_then(|p| p.downcast_ref::<T>())
    }

    pub fn has_payload(&self) -> bool {
        self.payload.is_some()
    }

    /// Backtrace captured for internal failures
    pub fn backtrace(&self) -> Option<&Backtrace> {
        self.trace.as_deref()
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::new(format!("I/O error: {}", err), ErrorCode::Io)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::new(format!("Invalid JSON: {}", err), ErrorCode::InvalidInput)
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::new(format!("Invalid TOML: {}", err), ErrorCode::InvalidInput)
    }
}

/// Result type alias using txplan's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Several independent errors reported as one failure
///
/// The combined message is built on first use and cached. Errors pushed after
/// that point are kept in the list but do not show up in [`message`](Self::message).
#[derive(Debug, Clone, Default)]
pub struct AggregatedError {
    errors: Vec<Error>,
    message: OnceLock<String>,
}

impl AggregatedError {
    pub const BASE_MESSAGE: &'static str = "Many errors occurred:\n";

    pub fn new(errors: Vec<Error>) -> Self {
        Self {
            errors,
            message: OnceLock::new(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        ErrorCode::Aggregated
    }

    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    pub fn errors_mut(&mut self) -> &mut Vec<Error> {
        &mut self.errors
    }

    pub fn push(&mut self, err: Error) {
        self.errors.push(err);
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Combined message, computed once
    pub fn message(&self) -> &str {
        self.message.get_or_init(|| {
            let mut message = String::from(Self::BASE_MESSAGE);
            for err in &self.errors {
                message.push_str(err.message());
                message.push('\n');
            }
            message
        })
    }

    /// `Ok(())` when nothing was collected, otherwise `Err(self)`
    pub fn into_result(self) -> std::result::Result<(), Self> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    pub fn into_errors(self) -> Vec<Error> {
        self.errors
    }
}

impl fmt::Display for AggregatedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for AggregatedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.errors
            .first()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl From<Vec<Error>> for AggregatedError {
    fn from(errors: Vec<Error>) -> Self {
        Self::new(errors)
    }
}

impl FromIterator<Error> for AggregatedError {
    fn from_iter<I: IntoIterator<Item = Error>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Everything a long-running operation can stop with
#[derive(Debug, thiserror::Error)]
pub enum Failure {
    /// Stopped by request; not a failure and never logged as one
    #[error(transparent)]
    Interrupted(#[from] Interrupted),

    #[error(transparent)]
    Error(#[from] Error),

    #[error(transparent)]
    Aggregated(#[from] AggregatedError),
}

impl Failure {
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Interrupted(_))
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Interrupted(_) => ErrorCode::UserInterrupted,
            Self::Error(err) => err.code(),
            Self::Aggregated(agg) => agg.code(),
        }
    }
}

/// Run `f`, turning both returned errors and panics into an [`Error`]
///
/// An [`Error`] returned through `anyhow` is passed back unchanged; other
/// errors become [`ErrorCode::Unknown`] and panics become
/// [`ErrorCode::InternalFailure`].
pub fn safe_invoke<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> anyhow::Result<T>,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => match err.downcast::<Error>() {
            Ok(err) => Err(err),
            Err(other) => Err(Error::new(format!("{:#}", other), ErrorCode::Unknown)),
        },
        Err(panic) => Err(Error::internal(format!(
            "panic during invocation: {}",
            panic_message(panic.as_ref())
        ))),
    }
}

/// Best-effort text of a panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
