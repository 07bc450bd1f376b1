//! Error types and error handling strategy for Oxco.
//!
//! Errors are the runtime's "exceptions": any `Err` returned from an
//! awaitable's `await_suspend` or `await_resume` is captured by the frame that
//! drove it and re-raised from the enclosing combinator's `await_resume`.
//!
//! - Errors are explicit and typed (no stringly-typed errors)
//! - Cancellation is *not* an error on the normal path; it is the absence of
//!   a value. [`ErrorKind::Cancelled`] only surfaces when a caller demands a
//!   value that a cancelled child never produced (e.g. `all_of`).
//! - Panics are not caught; they unwind through the runtime like any other
//!   Rust panic.
//!
//! # Error Categories
//!
//! - **Cancellation**: a value was required but the producer was cancelled
//! - **Time**: deadlines composed with `timeout`
//! - **Execution**: the executor stopped or ran out of work before the root
//!   task finished
//! - **Protocol**: an awaitable violated the suspend/resume contract
//! - **Configuration**: invalid runtime configuration
//! - **User**: errors raised by user awaitables and task bodies

use core::fmt;
use std::sync::Arc;

use crate::types::TaskId;

/// The kind of error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    // === Cancellation ===
    /// A value was required but the operation producing it was cancelled.
    Cancelled,

    // === Time ===
    /// A deadline elapsed before the guarded operation finished.
    DeadlineExceeded,

    // === Execution ===
    /// The executor was stopped before the root task finished.
    Stopped,
    /// Nothing was runnable and no timer was pending, but the root task was
    /// still suspended.
    Deadlock,
    /// The configured step limit was reached.
    StepLimit,

    // === Protocol ===
    /// An awaitable broke the suspend/resume/cancel contract.
    ProtocolViolation,

    // === Configuration ===
    /// Runtime configuration could not be applied.
    Config,

    // === Internal ===
    /// Internal runtime error (bug).
    Internal,

    // === User ===
    /// User-provided error.
    User,
}

impl ErrorKind {
    /// Returns the error category for this kind.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Cancelled => ErrorCategory::Cancellation,
            Self::DeadlineExceeded => ErrorCategory::Time,
            Self::Stopped | Self::Deadlock | Self::StepLimit => ErrorCategory::Execution,
            Self::ProtocolViolation => ErrorCategory::Protocol,
            Self::Config => ErrorCategory::Configuration,
            Self::Internal => ErrorCategory::Internal,
            Self::User => ErrorCategory::User,
        }
    }
}

/// High-level error category for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Cancellation-related failures.
    Cancellation,
    /// Deadline failures.
    Time,
    /// Executor lifecycle failures.
    Execution,
    /// Awaiter contract violations.
    Protocol,
    /// Configuration failures.
    Configuration,
    /// Internal runtime errors.
    Internal,
    /// User-originated errors.
    User,
}

/// The main error type for Oxco operations.
///
/// Cloning is cheap: the source chain is shared.
#[derive(Debug, Clone)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
    task: Option<TaskId>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub const fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            source: None,
            task: None,
        }
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns true if this error represents a missing value due to cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self.kind, ErrorKind::Cancelled)
    }

    /// Returns true if this error is a deadline condition.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self.kind, ErrorKind::DeadlineExceeded)
    }

    /// Adds a message description to the error.
    #[must_use]
    pub fn with_message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Adds a source error to the chain.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// Records the task the error escaped from, if not already recorded.
    #[must_use]
    pub fn in_task(mut self, task: TaskId) -> Self {
        self.task.get_or_insert(task);
        self
    }

    /// Creates a user error with a message.
    #[must_use]
    pub fn user(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::User).with_message(msg)
    }

    /// Wraps an arbitrary error as a user error, keeping it as the source.
    #[must_use]
    pub fn from_std(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        let message = err.to_string();
        Self::new(ErrorKind::User)
            .with_message(message)
            .with_source(err)
    }

    /// Creates the "operation cancelled" error raised when a value is demanded
    /// from a child that was cancelled.
    #[must_use]
    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled).with_message("operation cancelled")
    }

    /// Creates a deadline error.
    #[must_use]
    pub fn deadline_exceeded() -> Self {
        Self::new(ErrorKind::DeadlineExceeded)
    }

    /// Creates a protocol violation error.
    #[must_use]
    pub fn protocol(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::ProtocolViolation).with_message(detail)
    }

    /// Creates an internal error (runtime bug).
    #[must_use]
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal).with_message(detail)
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        self.kind.category()
    }

    /// Returns the error message, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    fn prepend(mut self, context: String) -> Self {
        self.message = Some(match self.message.take() {
            Some(inner) => format!("{context}: {inner}"),
            None => context,
        });
        self
    }

    /// Returns the task the error escaped from, if known.
    #[must_use]
    pub const fn task(&self) -> Option<TaskId> {
        self.task
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Cancelled => "cancelled",
            Self::DeadlineExceeded => "deadline exceeded",
            Self::Stopped => "executor stopped",
            Self::Deadlock => "deadlock",
            Self::StepLimit => "step limit reached",
            Self::ProtocolViolation => "protocol violation",
            Self::Config => "configuration error",
            Self::Internal => "internal error",
            Self::User => "error",
        })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.message, self.kind) {
            (Some(msg), ErrorKind::User) => f.write_str(msg)?,
            (Some(msg), kind) => write!(f, "{kind}: {msg}")?,
            (None, kind) => write!(f, "{kind}")?,
        }
        if let Some(task) = self.task {
            write!(f, " (in {task})")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as _)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        let message = e.to_string();
        Self::new(ErrorKind::Config)
            .with_message(message)
            .with_source(e)
    }
}

/// Errors raised while resolving a runtime configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable held a value that could not be parsed.
    #[error("invalid value for {var}: {detail}")]
    InvalidEnv {
        /// Variable name.
        var: &'static str,
        /// What was wrong with it.
        detail: String,
    },
    /// A configuration file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path that was being read.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// A configuration file could not be parsed.
    #[error("failed to parse config: {0}")]
    Parse(String),
}

/// Adds context to a failing result.
///
/// Context is prepended to any existing message, so the outermost caller's
/// note reads first: `"loading config: invalid value for OXCO_CLOCK: ..."`.
#[allow(clippy::result_large_err)]
pub trait ResultExt<T> {
    /// Prepends `msg` to the error's message.
    fn context(self, msg: impl Into<String>) -> Result<T>;
    /// Like [`context`](Self::context), building the message only on error.
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for core::result::Result<T, E> {
    fn context(self, msg: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().prepend(msg.into()))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| e.into().prepend(f()))
    }
}

/// A specialized Result type for Oxco operations.
#[allow(clippy::result_large_err)]
pub type Result<T> = core::result::Result<T, Error>;
