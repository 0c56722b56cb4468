//! Schema migration framework
//!
//! Provides:
//! - Store metadata and migration history tables
//! - Plan inference between a stored and a loaded schema
//! - A transactional runner with checksummed history rows
//! - Copy → migrate → swap staging so the live file is never half-migrated

mod checksums;
pub mod metadata;
pub mod plan;
mod runner;
pub mod staging;

pub use metadata::{history, MigrationRecord, StoredMetadata, FORMAT_VERSION};
pub use plan::{check, ColumnMapping, ColumnSource, EntityMapping, MigrationCheck, MigrationPlan};
pub use runner::{apply_plan, initialize};
pub use staging::{migrate_file, migrate_staged, stage_copy, swap};

use crate::errors::{store_unreadable, Result};
use burrow_core::SchemaDefinition;
use rusqlite::Connection;

/// What an opened store file holds relative to the schema being opened
#[derive(Debug, Clone, PartialEq)]
pub enum StoreStatus {
    /// No tables at all; a new store
    Empty,
    /// Built from exactly this schema
    Current,
    /// Built from an older version; the plan brings it up to date
    Outdated(MigrationPlan),
}

/// Inspect the store behind `conn` without writing to it
///
/// # Errors
/// - `StoreUnreadable` for foreign tables without metadata, metadata of
///   another schema or an unknown format, or an unreadable stored schema
/// - `MigrationFailed` when the stored schema cannot be migrated to `schema`
pub fn inspect(conn: &Connection, schema: &SchemaDefinition, locator: &str) -> Result<StoreStatus> {
    let Some(stored) = metadata::read_metadata(conn, locator)? else {
        let tables = metadata::entity_tables(conn)?;
        if tables.is_empty() {
            return Ok(StoreStatus::Empty);
        }
        return Err(store_unreadable(
            locator,
            format!(
                "database has tables ({}) but no store metadata",
                tables.join(", ")
            ),
        ));
    };

    if stored.format_version > FORMAT_VERSION {
        return Err(store_unreadable(
            locator,
            format!("unsupported store format {}", stored.format_version),
        ));
    }
    if stored.schema_name != schema.name() {
        return Err(store_unreadable(
            locator,
            format!(
                "store holds schema '{}', not '{}'",
                stored.schema_name,
                schema.name()
            ),
        ));
    }

    let stored_schema = SchemaDefinition::from_canonical_json(&stored.schema_document, schema.name())
        .map_err(|e| store_unreadable(locator, format!("stored schema is invalid: {}", e)))?;
    if stored_schema.digest() != stored.schema_digest
        || stored_schema.version() != stored.schema_version
    {
        return Err(store_unreadable(
            locator,
            "stored schema does not match its recorded digest",
        ));
    }

    match check(&stored_schema, schema)? {
        MigrationCheck::UpToDate => Ok(StoreStatus::Current),
        MigrationCheck::Required(plan) => Ok(StoreStatus::Outdated(plan)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burrow_core::errors::ExErrorKind;
    use burrow_core::model::SchemaDocument;

    fn schema(name: &str, version: u32) -> SchemaDefinition {
        let doc: SchemaDocument = serde_json::from_value(serde_json::json!({
            "version": version,
            "entities": [{ "name": "User", "fields": [{ "name": "firstName", "type": "string" }] }]
        }))
        .unwrap();
        SchemaDefinition::from_document(doc, name).unwrap()
    }

    #[test]
    fn test_inspect_empty_and_current() {
        let mut conn = Connection::open_in_memory().unwrap();
        let v1 = schema("userModel", 1);
        assert_eq!(inspect(&conn, &v1, "mem").unwrap(), StoreStatus::Empty);

        initialize(&mut conn, &v1).unwrap();
        assert_eq!(inspect(&conn, &v1, "mem").unwrap(), StoreStatus::Current);
        assert!(matches!(
            inspect(&conn, &schema("userModel", 2), "mem").unwrap(),
            StoreStatus::Outdated(_)
        ));
    }

    #[test]
    fn test_foreign_database_is_unreadable() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE notes (body TEXT)").unwrap();

        let err = inspect(&conn, &schema("userModel", 1), "mem").unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::StoreUnreadable);
    }

    #[test]
    fn test_other_schema_is_unreadable() {
        let mut conn = Connection::open_in_memory().unwrap();
        initialize(&mut conn, &schema("teamModel", 1)).unwrap();

        let err = inspect(&conn, &schema("userModel", 1), "mem").unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::StoreUnreadable);
    }

    #[test]
    fn test_downgrade_is_migration_failure() {
        let mut conn = Connection::open_in_memory().unwrap();
        initialize(&mut conn, &schema("userModel", 3)).unwrap();

        let err = inspect(&conn, &schema("userModel", 2), "mem").unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::MigrationFailed);
    }
}
