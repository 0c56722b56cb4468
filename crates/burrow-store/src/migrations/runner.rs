//! Migration runner
//!
//! Applies an inferred plan inside one transaction: every stored entity table
//! is moved aside, the new tables are created and filled with
//! `INSERT ... SELECT`, the old tables are dropped and the metadata is
//! rewritten. Row ids are preserved, and so is each table's AUTOINCREMENT
//! high-water mark, so ids of deleted records are never handed out again.

use crate::config::OpenGuard;
use crate::ddl::{create_entity_tables, create_table_sql, quote_ident, ID_COLUMN};
use crate::errors::{from_rusqlite, migration_failed, Result};
use crate::migrations::checksums::compute_checksum;
use crate::migrations::metadata::{create_tables, record_migration, write_metadata};
use crate::migrations::plan::{ColumnSource, EntityMapping, MigrationPlan};
use crate::repo::hydration::to_sql;
use burrow_core::errors::BurrowError;
use burrow_core::SchemaDefinition;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

/// Prefix for stored tables while a migration rebuilds them
const PREVIOUS_PREFIX: &str = "burrow_prev_";

/// Create the bookkeeping and entity tables of a brand-new store
pub fn initialize(conn: &mut Connection, schema: &SchemaDefinition) -> Result<()> {
    let tx = conn.transaction().map_err(from_rusqlite)?;
    create_tables(&tx)?;
    create_entity_tables(&tx, schema)?;
    write_metadata(&tx, schema)?;
    tx.commit().map_err(from_rusqlite)?;
    Ok(())
}

/// Apply `plan`, leaving the store at `target`
pub fn apply_plan(
    conn: &mut Connection,
    plan: &MigrationPlan,
    target: &SchemaDefinition,
    guard: &OpenGuard,
) -> Result<()> {
    let stored_tables: Vec<&str> = plan
        .entities()
        .iter()
        .filter_map(|m| m.source.as_deref())
        .chain(plan.dropped().iter().map(String::as_str))
        .collect();

    let tx = conn.transaction().map_err(from_rusqlite)?;

    for table in &stored_tables {
        tx.execute_batch(&format!(
            "ALTER TABLE {} RENAME TO {}",
            quote_ident(table),
            quote_ident(&previous_name(table))
        ))
        .map_err(from_rusqlite)?;
    }

    for mapping in plan.entities() {
        guard.check("migrate")?;
        let entity = target.entity(&mapping.entity).ok_or_else(|| {
            BurrowError::EntityNotFound {
                entity: mapping.entity.clone(),
            }
        })?;
        tx.execute_batch(&create_table_sql(entity.name(), entity))
            .map_err(from_rusqlite)?;
        if let Some(source) = &mapping.source {
            copy_rows(&tx, plan, mapping, source)?;
            carry_sequence(&tx, source, &mapping.entity)?;
        }
        tracing::debug!(
            entity = %mapping.entity,
            source = mapping.source.as_deref().unwrap_or("-"),
            "entity migrated"
        );
    }

    for table in &stored_tables {
        tx.execute_batch(&format!(
            "DROP TABLE {}",
            quote_ident(&previous_name(table))
        ))
        .map_err(from_rusqlite)?;
    }

    create_tables(&tx)?;
    write_metadata(&tx, target)?;
    record_migration(
        &tx,
        plan.from_version(),
        plan.to_version(),
        &compute_checksum(&plan.describe()),
    )?;

    guard.check("migrate")?;
    tx.commit().map_err(from_rusqlite)?;
    Ok(())
}

fn previous_name(table: &str) -> String {
    format!("{}{}", PREVIOUS_PREFIX, table)
}

/// Raise the new table's AUTOINCREMENT counter to the stored table's
///
/// `ALTER TABLE .. RENAME` moved the stored counter to the previous name.
fn carry_sequence(conn: &Connection, source: &str, entity: &str) -> Result<()> {
    let stored: Option<i64> = conn
        .query_row(
            "SELECT seq FROM sqlite_sequence WHERE name = ?1",
            [previous_name(source)],
            |row| row.get(0),
        )
        .optional()
        .map_err(from_rusqlite)?;
    let Some(seq) = stored else {
        return Ok(());
    };

    let raised = conn
        .execute(
            "UPDATE sqlite_sequence SET seq = MAX(seq, ?2) WHERE name = ?1",
            params![entity, seq],
        )
        .map_err(from_rusqlite)?;
    if raised == 0 {
        conn.execute(
            "INSERT INTO sqlite_sequence (name, seq) VALUES (?1, ?2)",
            params![entity, seq],
        )
        .map_err(from_rusqlite)?;
    }
    Ok(())
}

fn copy_rows(
    conn: &Connection,
    plan: &MigrationPlan,
    mapping: &EntityMapping,
    source: &str,
) -> Result<()> {
    let source_table = quote_ident(&previous_name(source));

    let unfilled = mapping
        .columns
        .iter()
        .find(|c| c.required && c.source == ColumnSource::Null);
    if let Some(column) = unfilled {
        let rows: i64 = conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", source_table), [], |row| {
                row.get(0)
            })
            .map_err(from_rusqlite)?;
        if rows > 0 {
            return Err(migration_failed(
                plan.from_version(),
                plan.to_version(),
                format!(
                    "required field {}.{} has no source and no default",
                    mapping.entity, column.field
                ),
            ));
        }
    }

    let mut columns = vec![quote_ident(ID_COLUMN)];
    let mut selects = vec![quote_ident(ID_COLUMN)];
    let mut params: Vec<SqlValue> = Vec::new();
    for column in &mapping.columns {
        columns.push(quote_ident(&column.field));
        let select = match &column.source {
            ColumnSource::Copy(from) => quote_ident(from),
            ColumnSource::CopyOr(from, default) => {
                params.push(to_sql(default));
                format!("COALESCE({}, ?{})", quote_ident(from), params.len())
            }
            ColumnSource::Default(default) => {
                params.push(to_sql(default));
                format!("?{}", params.len())
            }
            ColumnSource::Null => "NULL".to_string(),
        };
        selects.push(select);
    }

    conn.execute(
        &format!(
            "INSERT INTO {} ({}) SELECT {} FROM {}",
            quote_ident(&mapping.entity),
            columns.join(", "),
            selects.join(", "),
            source_table
        ),
        params_from_iter(params),
    )
    .map_err(from_rusqlite)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::metadata::{history, read_metadata};
    use crate::repo::RecordRepo;
    use burrow_core::errors::ExErrorKind;
    use burrow_core::model::SchemaDocument;
    use burrow_core::{Fields, RecordId, Value};

    fn schema(json: serde_json::Value) -> SchemaDefinition {
        let doc: SchemaDocument = serde_json::from_value(json).unwrap();
        SchemaDefinition::from_document(doc, "userModel").unwrap()
    }

    fn v1() -> SchemaDefinition {
        schema(serde_json::json!({
            "version": 1,
            "entities": [{ "name": "User", "fields": [
                { "name": "firstName", "type": "string" },
                { "name": "lastName", "type": "string" }
            ]}]
        }))
    }

    fn populated_v1() -> (Connection, SchemaDefinition) {
        let mut conn = Connection::open_in_memory().unwrap();
        let schema = v1();
        initialize(&mut conn, &schema).unwrap();
        for (first, last) in [("Bob", "Evans"), ("Ann", "Lee")] {
            RecordRepo::insert(
                &conn,
                &schema,
                "User",
                &Fields::new().set("firstName", first).set("lastName", last),
            )
            .unwrap();
        }
        (conn, schema)
    }

    #[test]
    fn test_initialize_writes_metadata() {
        let mut conn = Connection::open_in_memory().unwrap();
        initialize(&mut conn, &v1()).unwrap();

        let stored = read_metadata(&conn, ":memory:").unwrap().unwrap();
        assert_eq!(stored.schema_version, 1);
        assert!(history(&conn).unwrap().is_empty());
    }

    #[test]
    fn test_apply_plan_renames_and_fills_defaults() {
        let (mut conn, stored) = populated_v1();
        let target = schema(serde_json::json!({
            "version": 2,
            "entities": [{ "name": "User", "fields": [
                { "name": "givenName", "type": "string", "renamed_from": "firstName" },
                { "name": "lastName", "type": "string" },
                { "name": "isActive", "type": "bool", "default": true }
            ]}]
        }));
        let plan = MigrationPlan::infer(&stored, &target).unwrap();

        apply_plan(&mut conn, &plan, &target, &OpenGuard::unbounded()).unwrap();

        let bob = RecordRepo::get(&conn, &target, "User", RecordId(1))
            .unwrap()
            .unwrap();
        assert_eq!(bob.get("givenName"), Some(&Value::from("Bob")));
        assert_eq!(bob.get("isActive"), Some(&Value::Bool(true)));
        assert_eq!(RecordRepo::count(&conn, &target, "User").unwrap(), 2);

        let next = RecordRepo::insert(
            &conn,
            &target,
            "User",
            &Fields::new().set("givenName", "Cy").set("lastName", "Ng"),
        )
        .unwrap();
        assert_eq!(next, RecordId(3));

        let stored = read_metadata(&conn, ":memory:").unwrap().unwrap();
        assert_eq!(stored.schema_version, 2);
        let history = history(&conn).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].checksum, compute_checksum(&plan.describe()));
    }

    #[test]
    fn test_apply_plan_keeps_deleted_ids_retired() {
        let (mut conn, stored) = populated_v1();
        RecordRepo::delete(&conn, &stored, "User", RecordId(2)).unwrap();
        let target = schema(serde_json::json!({
            "version": 2,
            "entities": [{ "name": "User", "fields": [
                { "name": "firstName", "type": "string" },
                { "name": "lastName", "type": "string" },
                { "name": "nickname", "type": "string", "optional": true }
            ]}]
        }));
        let plan = MigrationPlan::infer(&stored, &target).unwrap();

        apply_plan(&mut conn, &plan, &target, &OpenGuard::unbounded()).unwrap();

        let next = RecordRepo::insert(
            &conn,
            &target,
            "User",
            &Fields::new().set("firstName", "Cy").set("lastName", "Ng"),
        )
        .unwrap();
        assert_eq!(next, RecordId(3));
    }

    #[test]
    fn test_apply_plan_keeps_counter_of_emptied_table() {
        let (mut conn, stored) = populated_v1();
        RecordRepo::delete(&conn, &stored, "User", RecordId(1)).unwrap();
        RecordRepo::delete(&conn, &stored, "User", RecordId(2)).unwrap();
        let target = schema(serde_json::json!({
            "version": 2,
            "entities": [{ "name": "Person", "renamed_from": "User", "fields": [
                { "name": "firstName", "type": "string" },
                { "name": "lastName", "type": "string" }
            ]}]
        }));
        let plan = MigrationPlan::infer(&stored, &target).unwrap();

        apply_plan(&mut conn, &plan, &target, &OpenGuard::unbounded()).unwrap();

        let next = RecordRepo::insert(
            &conn,
            &target,
            "Person",
            &Fields::new().set("firstName", "Cy").set("lastName", "Ng"),
        )
        .unwrap();
        assert_eq!(next, RecordId(3));
    }

    #[test]
    fn test_required_field_without_source_fails_on_rows() {
        let (mut conn, stored) = populated_v1();
        let target = schema(serde_json::json!({
            "version": 2,
            "entities": [{ "name": "User", "fields": [
                { "name": "firstName", "type": "string" },
                { "name": "lastName", "type": "string" },
                { "name": "email", "type": "string" }
            ]}]
        }));
        let plan = MigrationPlan::infer(&stored, &target).unwrap();

        let err = apply_plan(&mut conn, &plan, &target, &OpenGuard::unbounded()).unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::MigrationFailed);

        // Rolled back: still at version 1 with both rows
        let meta = read_metadata(&conn, ":memory:").unwrap().unwrap();
        assert_eq!(meta.schema_version, 1);
        assert_eq!(RecordRepo::count(&conn, &stored, "User").unwrap(), 2);
    }

    #[test]
    fn test_required_field_without_source_allowed_when_empty() {
        let mut conn = Connection::open_in_memory().unwrap();
        let stored = v1();
        initialize(&mut conn, &stored).unwrap();
        let target = schema(serde_json::json!({
            "version": 2,
            "entities": [{ "name": "User", "fields": [
                { "name": "email", "type": "string" }
            ]}]
        }));
        let plan = MigrationPlan::infer(&stored, &target).unwrap();

        assert!(apply_plan(&mut conn, &plan, &target, &OpenGuard::unbounded()).is_ok());
    }
}
