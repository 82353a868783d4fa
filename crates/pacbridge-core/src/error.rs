//! Error types for pacbridge.

use std::fmt;
use thiserror::Error;

/// The main error type for pacbridge operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("No targets specified")]
    EmptyTargetList,

    #[error("No targets found")]
    NoResolvedTargets,

    #[error("package '{0}' was not found")]
    PackageNotFound(String),

    #[error("Transaction failed: {0}")]
    TransactionError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Backend not available: {0}")]
    BackendUnavailable(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A type alias for Results using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// A fatal `error` event was queued.
///
/// Carries the augmented error text. Only the top-level driver acts on it:
/// wait for the event queue to drain, then terminate with a non-zero status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fatal {
    pub message: String,
}

impl Fatal {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for Fatal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fatal: {}", self.message)
    }
}

impl std::error::Error for Fatal {}

/// Process exit status of a top-level operation.
pub type ExitCode = i32;
