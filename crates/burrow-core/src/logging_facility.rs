//! Structured logging facility for Burrow
//!
//! This module provides a canonical logging facility with:
//! - Single initialization point via `init(profile)` for binaries that want a global subscriber
//! - Structured logging macros (`log_op_start!`, `log_op_end!`, `log_op_error!`)
//! - Injectable capture sink for deterministic assertions in tests
//!
//! Containers never install a subscriber themselves. A caller either installs
//! one globally with [`init`] or hands a `tracing::Dispatch` to the container
//! configuration, in which case every event of that container goes there.
//!
//! # Usage
//!
//! ```rust
//! use burrow_core::logging_facility::{init, Profile};
//!
//! // Initialize once at application startup
//! init(Profile::Development);
//! ```
//!
//! # Logging Macros
//!
//! - `log_op_start!(op, ...)` - Log operation start
//! - `log_op_end!(op, duration_ms = ...)` - Log operation end
//! - `log_op_error!(op, err, duration_ms = ...)` - Log operation error

pub mod init;
pub mod macros;
pub mod test_capture;

pub use init::{init, Profile};
pub use test_capture::{capture, CapturedEvent, TestCapture};
