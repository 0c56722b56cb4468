//! Schema resolution
//!
//! A [`ResourceProvider`] turns `(name, extension, location)` into raw bytes;
//! the [`SchemaLoader`] parses and validates those bytes into a
//! [`SchemaDefinition`](crate::model::SchemaDefinition). Packaging formats stay
//! behind the provider.

pub mod resource;
pub mod schema_loader;

pub use resource::{DirectoryResources, ResourceProvider, SearchLocation, StaticResources};
pub use schema_loader::{parse_schema_bytes, SchemaLoader, DEFAULT_SCHEMA_EXTENSION};
