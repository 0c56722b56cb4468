//! Table layout for entities
//!
//! One table per entity, named after it: `"_id" INTEGER PRIMARY KEY
//! AUTOINCREMENT` followed by one column per field in declaration order.
//! Required fields are `NOT NULL`.

use crate::errors::{from_rusqlite, Result};
use burrow_core::{EntityDef, FieldType, SchemaDefinition};
use rusqlite::Connection;

/// Row id column present in every entity table
pub const ID_COLUMN: &str = "_id";

/// Quote an identifier for SQL
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// SQLite storage class used for a field type
pub fn column_type(field_type: FieldType) -> &'static str {
    match field_type {
        FieldType::String => "TEXT",
        FieldType::Integer | FieldType::Bool | FieldType::Date | FieldType::Reference => {
            "INTEGER"
        }
        FieldType::Double => "REAL",
        FieldType::Binary => "BLOB",
    }
}

/// `CREATE TABLE` statement for `entity` under the given table name
pub fn create_table_sql(table: &str, entity: &EntityDef) -> String {
    let mut columns = vec![format!(
        "{} INTEGER PRIMARY KEY AUTOINCREMENT",
        quote_ident(ID_COLUMN)
    )];
    for field in entity.fields() {
        let mut column = format!(
            "{} {}",
            quote_ident(field.name()),
            column_type(field.field_type())
        );
        if !field.is_optional() {
            column.push_str(" NOT NULL");
        }
        columns.push(column);
    }
    format!("CREATE TABLE {} ({})", quote_ident(table), columns.join(", "))
}

pub fn create_entity_table(conn: &Connection, entity: &EntityDef) -> Result<()> {
    conn.execute_batch(&create_table_sql(entity.name(), entity))
        .map_err(from_rusqlite)
}

/// Create the tables of every entity in `schema`
pub fn create_entity_tables(conn: &Connection, schema: &SchemaDefinition) -> Result<()> {
    for entity in schema.entities() {
        create_entity_table(conn, entity)?;
    }
    Ok(())
}
