// Allow unused assignments for diagnostic fields - they're used by the macros
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

/// Scheduler error type
///
/// Insufficient capacity and missing records are scheduling outcomes, not
/// errors; only failures of the store or of internal bookkeeping end up here.
#[derive(Error, Debug, Diagnostic)]
pub enum SchedulerError {
    /// Storage error
    #[error("Storage error: {0}")]
    #[diagnostic(
        code(scheduler::storage_error),
        help("Check the underlying storage system")
    )]
    StorageError(#[from] capstan_storage::StorageError),

    /// Core error
    #[error("Core error: {0}")]
    #[diagnostic(
        code(scheduler::core_error),
        help("A record was asked to do something its state does not allow")
    )]
    CoreError(#[from] capstan_core::CapstanError),

    /// Internal error
    #[error("Internal error: {message}")]
    #[diagnostic(
        code(scheduler::internal_error),
        help("This is likely a bug. Please report it")
    )]
    InternalError { message: String },
}

/// Result type for scheduler operations
pub type Result<T> = std::result::Result<T, SchedulerError>;

impl SchedulerError {
    /// Create an InternalError
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }
}
