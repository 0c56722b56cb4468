//! Correlation types for open attempts
//!
//! Every `open()` on a container gets its own AttemptId so that the
//! start/end events, migration events and any resulting error can be
//! matched up in a log stream.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a single open attempt
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttemptId(String);

impl AttemptId {
    /// Generate a new time-ordered AttemptId using UUIDv7
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Create from an existing string (for deserialization)
    pub fn from_string(s: String) -> Self {
        Self(s)
    }
}

impl Default for AttemptId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AttemptId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attempt_ids_are_unique() {
        let a = AttemptId::new();
        let b = AttemptId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn test_attempt_id_is_uuid_shaped() {
        let id = AttemptId::new();
        assert!(Uuid::parse_str(id.as_str()).is_ok());
    }

    #[test]
    fn test_attempt_id_serde_is_transparent_string() {
        let id = AttemptId::from_string("attempt-1".to_string());
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"attempt-1\"");
        let back: AttemptId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
