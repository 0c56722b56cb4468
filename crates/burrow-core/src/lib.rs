//! Burrow Core - schema model, schema loading and the shared facilities
//!
//! This crate provides:
//! - The schema document format and the validated, immutable `SchemaDefinition`
//! - Schema resolution through pluggable resource providers (`SchemaLoader`)
//! - Record values (`Value`, `Fields`, `Record`) shared with the store
//! - The error facility (`ExError`, `ExErrorKind`, `BurrowError`)
//! - The structured logging facility and its capture sink

pub mod errors;
pub mod loader;
pub mod logging_facility;
pub mod model;
pub mod rules;

// Re-export commonly used types
pub use errors::{BurrowError, ExError, ExErrorKind, Result};
pub use loader::{
    DirectoryResources, ResourceProvider, SchemaLoader, SearchLocation, StaticResources,
    DEFAULT_SCHEMA_EXTENSION,
};
pub use model::{
    EntityDef, FieldDef, FieldType, Fields, Record, RecordId, SchemaDefinition, Value,
};
