use burrow_core_types::AttemptId;
use thiserror::Error;

/// Result type alias using BurrowError
pub type Result<T> = std::result::Result<T, BurrowError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// This taxonomy provides a stable, structured classification of every error
/// a container, loader or store handle can return. Each kind maps to a stable
/// error code that can be used for programmatic error handling and testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExErrorKind {
    // Schema resolution
    SchemaNotFound,
    SchemaInvalid,

    // Store lifecycle
    StoreUnreadable,
    MigrationFailed,
    AlreadyOpen,
    Cancelled,

    // Structural/Validation
    InvalidInput,
    InvalidState,
    NotFound,

    // Integration/IO
    Persistence,
    Io,
    Serialization,

    // Internal
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::SchemaNotFound => "ERR_SCHEMA_NOT_FOUND",
            ExErrorKind::SchemaInvalid => "ERR_SCHEMA_INVALID",
            ExErrorKind::StoreUnreadable => "ERR_STORE_UNREADABLE",
            ExErrorKind::MigrationFailed => "ERR_MIGRATION_FAILED",
            ExErrorKind::AlreadyOpen => "ERR_ALREADY_OPEN",
            ExErrorKind::Cancelled => "ERR_CANCELLED",
            ExErrorKind::InvalidInput => "ERR_INVALID_INPUT",
            ExErrorKind::InvalidState => "ERR_INVALID_STATE",
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::Persistence => "ERR_PERSISTENCE",
            ExErrorKind::Io => "ERR_IO",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }
}

/// Canonical structured error type
///
/// This error type provides a structured representation of errors with
/// classification fields for programmatic handling and rich context for debugging.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    schema_name: Option<String>,
    locator: Option<String>,
    entity: Option<String>,
    attempt_id: Option<AttemptId>,
    message: String,
    source: Option<Box<ExError>>,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            schema_name: None,
            locator: None,
            entity: None,
            attempt_id: None,
            message: String::new(),
            source: None,
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add schema name context
    pub fn with_schema_name(mut self, name: impl Into<String>) -> Self {
        self.schema_name = Some(name.into());
        self
    }

    /// Add store locator context
    pub fn with_locator(mut self, locator: impl Into<String>) -> Self {
        self.locator = Some(locator.into());
        self
    }

    /// Add entity name context
    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    /// Add the open attempt this error belongs to
    pub fn with_attempt_id(mut self, attempt_id: AttemptId) -> Self {
        self.attempt_id = Some(attempt_id);
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add source error
    pub fn with_source(mut self, source: ExError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Get the operation context, if any
    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    /// Get the schema name context, if any
    pub fn schema_name(&self) -> Option<&str> {
        self.schema_name.as_deref()
    }

    /// Get the store locator context, if any
    pub fn locator(&self) -> Option<&str> {
        self.locator.as_deref()
    }

    /// Get the entity context, if any
    pub fn entity(&self) -> Option<&str> {
        self.entity.as_deref()
    }

    /// Get the open attempt id, if any
    pub fn attempt_id(&self) -> Option<&AttemptId> {
        self.attempt_id.as_ref()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the source error, if any
    pub fn source_error(&self) -> Option<&ExError> {
        self.source.as_deref()
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(schema_name) = &self.schema_name {
            write!(f, " (schema: {})", schema_name)?;
        }
        if let Some(entity) = &self.entity {
            write!(f, " (entity: {})", entity)?;
        }
        if let Some(locator) = &self.locator {
            write!(f, " (locator: {})", locator)?;
        }
        if let Some(source) = &self.source {
            write!(f, " caused by {}", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|source| source as &(dyn std::error::Error + 'static))
    }
}

// ========== End Error Facility ==========

/// Error taxonomy for schema loading and record access
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BurrowError {
    // ===== Schema Resolution =====
    /// No resource matched name + extension in the search location
    #[error("Schema resource not found: {name}.{extension} in {location}")]
    SchemaNotFound {
        name: String,
        extension: String,
        location: String,
    },

    /// The resource provider failed while looking the resource up
    #[error("Schema resource {name}.{extension} could not be read: {reason}")]
    ResourceUnavailable {
        name: String,
        extension: String,
        reason: String,
    },

    /// Resource bytes do not describe a consistent schema
    #[error("Invalid schema {name}: {reason}")]
    SchemaInvalid { name: String, reason: String },

    // ===== Configuration =====
    /// Container configuration is unusable
    #[error("Invalid configuration: {reason}")]
    InvalidConfiguration { reason: String },

    // ===== Record Access =====
    /// Entity is not declared in the schema
    #[error("Entity not found in schema: {entity}")]
    EntityNotFound { entity: String },

    /// Field is not declared on the entity
    #[error("Field {field} is not declared on entity {entity}")]
    FieldNotFound { entity: String, field: String },

    /// A required field has neither a value nor a default
    #[error("Required field {field} on entity {entity} has no value")]
    RequiredFieldMissing { entity: String, field: String },

    /// Value does not match the declared field type
    #[error("Field {entity}.{field} expects {expected}, got {found}")]
    TypeMismatch {
        entity: String,
        field: String,
        expected: String,
        found: String,
    },

    /// Record id does not exist
    #[error("Record {id} not found in entity {entity}")]
    RecordNotFound { entity: String, id: i64 },

    // ===== Serialization =====
    /// Serialization/deserialization failure
    #[error("Serialization error: {reason}")]
    Serialization { reason: String },
}

impl From<BurrowError> for ExError {
    fn from(err: BurrowError) -> Self {
        match err {
            BurrowError::SchemaNotFound {
                name,
                extension,
                location,
            } => ExError::new(ExErrorKind::SchemaNotFound)
                .with_op("load_schema")
                .with_schema_name(name.clone())
                .with_message(format!(
                    "No resource {}.{} in {}",
                    name, extension, location
                )),

            BurrowError::ResourceUnavailable {
                name,
                extension,
                reason,
            } => ExError::new(ExErrorKind::SchemaNotFound)
                .with_op("load_schema")
                .with_schema_name(name.clone())
                .with_message(format!(
                    "Resource {}.{} could not be read: {}",
                    name, extension, reason
                )),

            BurrowError::SchemaInvalid { name, reason } => {
                ExError::new(ExErrorKind::SchemaInvalid)
                    .with_op("load_schema")
                    .with_schema_name(name)
                    .with_message(reason)
            }

            BurrowError::InvalidConfiguration { reason } => {
                ExError::new(ExErrorKind::InvalidInput)
                    .with_op("configure")
                    .with_message(reason)
            }

            BurrowError::EntityNotFound { entity } => ExError::new(ExErrorKind::NotFound)
                .with_entity(entity)
                .with_message("Entity is not declared in the schema"),

            BurrowError::FieldNotFound { entity, field } => {
                ExError::new(ExErrorKind::InvalidInput)
                    .with_entity(entity)
                    .with_message(format!("Unknown field {}", field))
            }

            BurrowError::RequiredFieldMissing { entity, field } => {
                ExError::new(ExErrorKind::InvalidInput)
                    .with_entity(entity)
                    .with_message(format!("Required field {} has no value", field))
            }

            BurrowError::TypeMismatch {
                entity,
                field,
                expected,
                found,
            } => ExError::new(ExErrorKind::InvalidInput)
                .with_entity(entity)
                .with_message(format!(
                    "Field {} expects {}, got {}",
                    field, expected, found
                )),

            BurrowError::RecordNotFound { entity, id } => ExError::new(ExErrorKind::NotFound)
                .with_entity(entity)
                .with_message(format!("Record {} not found", id)),

            BurrowError::Serialization { reason } => {
                ExError::new(ExErrorKind::Serialization).with_message(reason)
            }
        }
    }
}

impl From<serde_json::Error> for BurrowError {
    fn from(err: serde_json::Error) -> Self {
        BurrowError::Serialization {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_error_kind_codes() {
        assert_eq!(ExErrorKind::SchemaNotFound.code(), "ERR_SCHEMA_NOT_FOUND");
        assert_eq!(ExErrorKind::SchemaInvalid.code(), "ERR_SCHEMA_INVALID");
        assert_eq!(ExErrorKind::StoreUnreadable.code(), "ERR_STORE_UNREADABLE");
        assert_eq!(ExErrorKind::MigrationFailed.code(), "ERR_MIGRATION_FAILED");
        assert_eq!(ExErrorKind::AlreadyOpen.code(), "ERR_ALREADY_OPEN");
        assert_eq!(ExErrorKind::Cancelled.code(), "ERR_CANCELLED");
    }

    #[test]
    fn test_resource_unavailable_maps_to_schema_not_found() {
        let err: ExError = BurrowError::ResourceUnavailable {
            name: "userModel".to_string(),
            extension: "model".to_string(),
            reason: "permission denied".to_string(),
        }
        .into();

        assert_eq!(err.kind(), ExErrorKind::SchemaNotFound);
        assert_eq!(err.schema_name(), Some("userModel"));
        assert!(err.message().contains("permission denied"));
    }

    #[test]
    fn test_display_includes_code_op_and_context() {
        let err = ExError::new(ExErrorKind::AlreadyOpen)
            .with_op("open")
            .with_locator("/tmp/userModel.store")
            .with_message("Store is already open");

        let text = err.to_string();
        assert!(text.starts_with("[ERR_ALREADY_OPEN] in operation 'open'"));
        assert!(text.contains("/tmp/userModel.store"));
    }

    #[test]
    fn test_source_chain_is_exposed() {
        let inner = ExError::new(ExErrorKind::Persistence).with_message("disk I/O error");
        let outer = ExError::new(ExErrorKind::MigrationFailed).with_source(inner);

        let source = std::error::Error::source(&outer).expect("source should be set");
        assert!(source.to_string().contains("disk I/O error"));
        assert_eq!(
            outer.source_error().map(|e| e.kind()),
            Some(ExErrorKind::Persistence)
        );
    }
}
