//! Store metadata and migration history tables
//!
//! `burrow_metadata` is a key/value table describing which schema a store
//! holds; `burrow_migrations` keeps one row per applied migration.

use crate::errors::{from_rusqlite, store_unreadable, Result};
use burrow_core::SchemaDefinition;
use rusqlite::{Connection, OptionalExtension};
use std::collections::HashMap;

pub const METADATA_TABLE: &str = "burrow_metadata";
pub const HISTORY_TABLE: &str = "burrow_migrations";

/// Layout version of the store file itself
pub const FORMAT_VERSION: u32 = 1;

const KEY_FORMAT_VERSION: &str = "format_version";
const KEY_SCHEMA_NAME: &str = "schema_name";
const KEY_SCHEMA_VERSION: &str = "schema_version";
const KEY_SCHEMA_DIGEST: &str = "schema_digest";
const KEY_SCHEMA_DOCUMENT: &str = "schema_document";

/// Contents of `burrow_metadata`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMetadata {
    pub format_version: u32,
    pub schema_name: String,
    pub schema_version: u32,
    pub schema_digest: String,
    /// Canonical JSON of the schema the tables were built from
    pub schema_document: String,
}

/// One row of `burrow_migrations`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationRecord {
    pub from_version: u32,
    pub to_version: u32,
    /// Epoch seconds
    pub applied_at: i64,
    pub checksum: String,
}

/// Create the metadata and history tables if they don't exist
pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {METADATA_TABLE} (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS {HISTORY_TABLE} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            from_version INTEGER NOT NULL,
            to_version INTEGER NOT NULL,
            applied_at INTEGER NOT NULL,
            checksum TEXT NOT NULL
        );"
    ))
    .map_err(from_rusqlite)
}

/// Whether a table of this name exists
pub fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    conn.query_row(
        "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |_| Ok(()),
    )
    .optional()
    .map(|found| found.is_some())
    .map_err(from_rusqlite)
}

/// Names of tables that are neither SQLite's nor Burrow's own
pub fn entity_tables(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare(
            "SELECT name FROM sqlite_master
             WHERE type = 'table' AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\'
             ORDER BY name",
        )
        .map_err(from_rusqlite)?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(from_rusqlite)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(from_rusqlite)?;

    Ok(names
        .into_iter()
        .filter(|name| name != METADATA_TABLE && name != HISTORY_TABLE)
        .collect())
}

/// Read the metadata table; `None` when the store has none
///
/// # Errors
/// `StoreUnreadable` when entries are missing or malformed.
pub fn read_metadata(conn: &Connection, locator: &str) -> Result<Option<StoredMetadata>> {
    if !table_exists(conn, METADATA_TABLE)? {
        return Ok(None);
    }

    let mut stmt = conn
        .prepare(&format!("SELECT key, value FROM {METADATA_TABLE}"))
        .map_err(from_rusqlite)?;
    let entries: HashMap<String, String> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .map_err(from_rusqlite)?
        .collect::<std::result::Result<_, _>>()
        .map_err(from_rusqlite)?;

    let text = |key: &str| -> Result<String> {
        entries
            .get(key)
            .cloned()
            .ok_or_else(|| store_unreadable(locator, format!("metadata entry '{}' is missing", key)))
    };
    let number = |key: &str| -> Result<u32> {
        text(key)?.parse().map_err(|_| {
            store_unreadable(locator, format!("metadata entry '{}' is not a number", key))
        })
    };

    Ok(Some(StoredMetadata {
        format_version: number(KEY_FORMAT_VERSION)?,
        schema_name: text(KEY_SCHEMA_NAME)?,
        schema_version: number(KEY_SCHEMA_VERSION)?,
        schema_digest: text(KEY_SCHEMA_DIGEST)?,
        schema_document: text(KEY_SCHEMA_DOCUMENT)?,
    }))
}

/// Record `schema` as the store's current schema
pub fn write_metadata(conn: &Connection, schema: &SchemaDefinition) -> Result<()> {
    let document = schema.to_canonical_json()?;
    let entries = [
        (KEY_FORMAT_VERSION, FORMAT_VERSION.to_string()),
        (KEY_SCHEMA_NAME, schema.name().to_string()),
        (KEY_SCHEMA_VERSION, schema.version().to_string()),
        (KEY_SCHEMA_DIGEST, schema.digest().to_string()),
        (KEY_SCHEMA_DOCUMENT, document),
    ];

    let mut stmt = conn
        .prepare(&format!(
            "INSERT OR REPLACE INTO {METADATA_TABLE} (key, value) VALUES (?1, ?2)"
        ))
        .map_err(from_rusqlite)?;
    for (key, value) in entries {
        stmt.execute(rusqlite::params![key, value])
            .map_err(from_rusqlite)?;
    }
    Ok(())
}

/// Append a row to the migration history
pub fn record_migration(
    conn: &Connection,
    from_version: u32,
    to_version: u32,
    checksum: &str,
) -> Result<()> {
    let now = chrono::Utc::now().timestamp();
    conn.execute(
        &format!(
            "INSERT INTO {HISTORY_TABLE} (from_version, to_version, applied_at, checksum)
             VALUES (?1, ?2, ?3, ?4)"
        ),
        rusqlite::params![from_version, to_version, now, checksum],
    )
    .map_err(from_rusqlite)?;
    Ok(())
}

/// Applied migrations, oldest first
pub fn history(conn: &Connection) -> Result<Vec<MigrationRecord>> {
    if !table_exists(conn, HISTORY_TABLE)? {
        return Ok(Vec::new());
    }

    let mut stmt = conn
        .prepare(&format!(
            "SELECT from_version, to_version, applied_at, checksum FROM {HISTORY_TABLE} ORDER BY id"
        ))
        .map_err(from_rusqlite)?;
    let records = stmt
        .query_map([], |row| {
            Ok(MigrationRecord {
                from_version: row.get(0)?,
                to_version: row.get(1)?,
                applied_at: row.get(2)?,
                checksum: row.get(3)?,
            })
        })
        .map_err(from_rusqlite)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(from_rusqlite)?;
    Ok(records)
}
