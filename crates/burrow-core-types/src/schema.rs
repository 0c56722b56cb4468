//! Canonical schema constants for structured logging and events
//!
//! These constants ensure consistency across all logging and error reporting.

// Canonical field keys for structured logging
pub const FIELD_COMPONENT: &str = "component";
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";
pub const FIELD_DURATION_MS: &str = "duration_ms";
pub const FIELD_ATTEMPT_ID: &str = "attempt_id";

// Store identity
pub const FIELD_SCHEMA_NAME: &str = "schema_name";
pub const FIELD_SCHEMA_VERSION: &str = "schema_version";
pub const FIELD_LOCATOR: &str = "locator";
pub const FIELD_STORAGE: &str = "storage";

// Migration
pub const FIELD_FROM_VERSION: &str = "from_version";
pub const FIELD_TO_VERSION: &str = "to_version";
pub const FIELD_STEPS: &str = "steps";

// Error fields
pub const FIELD_ERR_KIND: &str = "err_kind";
pub const FIELD_ERR_CODE: &str = "err_code";

// Canonical event names
pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";
