//! Error handling for burrow-store
//!
//! Wraps burrow-core ExError with store-specific helpers

use burrow_core::errors::{ExError, ExErrorKind};
use std::fmt::Display;

/// Result type alias using ExError
pub type Result<T> = std::result::Result<T, ExError>;

/// Create a database error from rusqlite::Error
pub fn from_rusqlite(err: rusqlite::Error) -> ExError {
    ExError::new(ExErrorKind::Persistence)
        .with_op("sqlite")
        .with_message(err.to_string())
}

/// Create an IO error
pub fn io_error(operation: &str, err: std::io::Error) -> ExError {
    ExError::new(ExErrorKind::Io)
        .with_op(operation.to_string())
        .with_message(err.to_string())
}

/// The store at `locator` cannot be opened or is not a store of this schema
pub fn store_unreadable(locator: &str, reason: impl Display) -> ExError {
    ExError::new(ExErrorKind::StoreUnreadable)
        .with_op("open")
        .with_locator(locator)
        .with_message(reason.to_string())
}

/// Migration between two schema versions failed
pub fn migration_failed(from_version: u32, to_version: u32, reason: impl Display) -> ExError {
    ExError::new(ExErrorKind::MigrationFailed)
        .with_op("migrate")
        .with_message(format!(
            "Migration {} -> {} failed: {}",
            from_version, to_version, reason
        ))
}

/// The locator is held by another handle in this process
pub fn already_open(locator: &str) -> ExError {
    ExError::new(ExErrorKind::AlreadyOpen)
        .with_op("open")
        .with_locator(locator)
        .with_message("Store is already open in this process")
}

/// The open deadline passed or the cancel token fired before `stage`
pub fn cancelled(stage: &str, reason: &str) -> ExError {
    ExError::new(ExErrorKind::Cancelled)
        .with_op(stage.to_string())
        .with_message(format!("Open {} before {}", reason, stage))
}

/// The operation is not allowed in the current lifecycle state
pub fn invalid_state(op: &str, state: impl Display) -> ExError {
    ExError::new(ExErrorKind::InvalidState)
        .with_op(op.to_string())
        .with_message(format!("Operation {} is not allowed while {}", op, state))
}
