//! SQLite repository for schema-defined records
//!
//! Every operation resolves the entity against the schema first, so unknown
//! entities, unknown fields and mistyped values fail before the store is
//! touched.

use crate::ddl::{quote_ident, ID_COLUMN};
use crate::errors::{from_rusqlite, Result};
use crate::filter::Filter;
use crate::repo::hydration::{hydrate_record, read_row, to_sql};
use burrow_core::errors::BurrowError;
use burrow_core::{EntityDef, FieldDef, Fields, Record, RecordId, SchemaDefinition, Value};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection, OptionalExtension};

/// SQLite repository for records of any entity in a schema
pub struct RecordRepo;

impl RecordRepo {
    /// Insert a record and return its new id
    ///
    /// Absent fields take the schema default, then `Null` when optional.
    pub fn insert(
        conn: &Connection,
        schema: &SchemaDefinition,
        entity: &str,
        fields: &Fields,
    ) -> Result<RecordId> {
        let def = entity_def(schema, entity)?;
        check_known_fields(def, fields)?;

        let mut values = Vec::with_capacity(def.fields().len());
        for field in def.fields() {
            let value = match fields.get(field.name()) {
                Some(value) => checked_value(def, field, value)?,
                None => match field.default_value() {
                    Some(default) => default.clone(),
                    None if field.is_optional() => Value::Null,
                    None => return Err(required_missing(def, field).into()),
                },
            };
            values.push(to_sql(&value));
        }

        let table = quote_ident(def.name());
        let sql = if def.fields().is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", table)
        } else {
            let columns: Vec<String> = def.fields().iter().map(|f| quote_ident(f.name())).collect();
            let placeholders: Vec<String> = (1..=values.len()).map(|i| format!("?{}", i)).collect();
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                table,
                columns.join(", "),
                placeholders.join(", ")
            )
        };

        let mut stmt = conn.prepare_cached(&sql).map_err(from_rusqlite)?;
        stmt.execute(params_from_iter(values))
            .map_err(|e| from_rusqlite(e).with_entity(def.name()))?;

        Ok(RecordId(conn.last_insert_rowid()))
    }

    /// Get a record by id
    pub fn get(
        conn: &Connection,
        schema: &SchemaDefinition,
        entity: &str,
        id: RecordId,
    ) -> Result<Option<Record>> {
        let def = entity_def(schema, entity)?;
        let sql = format!(
            "{} WHERE {} = ?1",
            select_sql(def),
            quote_ident(ID_COLUMN)
        );

        let mut stmt = conn.prepare_cached(&sql).map_err(from_rusqlite)?;
        let row = stmt
            .query_row([id.get()], |row| read_row(row, def.fields().len()))
            .optional()
            .map_err(from_rusqlite)?;

        row.map(|(id, columns)| hydrate_record(def, id, columns))
            .transpose()
    }

    /// All records of an entity, in id order
    pub fn fetch_all(
        conn: &Connection,
        schema: &SchemaDefinition,
        entity: &str,
    ) -> Result<Vec<Record>> {
        Self::fetch_where(conn, schema, entity, &Filter::new())
    }

    /// Records matching `filter`, in id order
    pub fn fetch_where(
        conn: &Connection,
        schema: &SchemaDefinition,
        entity: &str,
        filter: &Filter,
    ) -> Result<Vec<Record>> {
        let def = entity_def(schema, entity)?;
        let (predicate, params) = filter.to_sql(def)?;
        let sql = format!(
            "{} WHERE {} ORDER BY {}",
            select_sql(def),
            predicate,
            quote_ident(ID_COLUMN)
        );

        let mut stmt = conn.prepare_cached(&sql).map_err(from_rusqlite)?;
        let rows = stmt
            .query_map(params_from_iter(params), |row| {
                read_row(row, def.fields().len())
            })
            .map_err(from_rusqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(from_rusqlite)?;

        rows.into_iter()
            .map(|(id, columns)| hydrate_record(def, id, columns))
            .collect()
    }

    pub fn count(conn: &Connection, schema: &SchemaDefinition, entity: &str) -> Result<u64> {
        Self::count_where(conn, schema, entity, &Filter::new())
    }

    pub fn count_where(
        conn: &Connection,
        schema: &SchemaDefinition,
        entity: &str,
        filter: &Filter,
    ) -> Result<u64> {
        let def = entity_def(schema, entity)?;
        let (predicate, params) = filter.to_sql(def)?;
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE {}",
            quote_ident(def.name()),
            predicate
        );

        let count: i64 = conn
            .prepare_cached(&sql)
            .map_err(from_rusqlite)?
            .query_row(params_from_iter(params), |row| row.get(0))
            .map_err(from_rusqlite)?;

        Ok(count.max(0) as u64)
    }

    /// Overwrite the given fields of an existing record
    ///
    /// # Errors
    /// `NotFound` when no record has this id.
    pub fn update(
        conn: &Connection,
        schema: &SchemaDefinition,
        entity: &str,
        id: RecordId,
        fields: &Fields,
    ) -> Result<()> {
        let def = entity_def(schema, entity)?;
        check_known_fields(def, fields)?;

        let mut assignments = Vec::with_capacity(fields.len());
        let mut params: Vec<SqlValue> = Vec::with_capacity(fields.len() + 1);
        for field in def.fields() {
            if let Some(value) = fields.get(field.name()) {
                let value = checked_value(def, field, value)?;
                params.push(to_sql(&value));
                assignments.push(format!("{} = ?{}", quote_ident(field.name()), params.len()));
            }
        }

        let table = quote_ident(def.name());
        let id_column = quote_ident(ID_COLUMN);
        params.push(SqlValue::Integer(id.get()));
        let sql = if assignments.is_empty() {
            format!(
                "UPDATE {} SET {} = {} WHERE {} = ?1",
                table, id_column, id_column, id_column
            )
        } else {
            format!(
                "UPDATE {} SET {} WHERE {} = ?{}",
                table,
                assignments.join(", "),
                id_column,
                params.len()
            )
        };

        let changed = conn
            .prepare_cached(&sql)
            .map_err(from_rusqlite)?
            .execute(params_from_iter(params))
            .map_err(|e| from_rusqlite(e).with_entity(def.name()))?;

        if changed == 0 {
            return Err(BurrowError::RecordNotFound {
                entity: def.name().to_string(),
                id: id.get(),
            }
            .into());
        }
        Ok(())
    }

    /// Delete a record; `false` when it did not exist
    pub fn delete(
        conn: &Connection,
        schema: &SchemaDefinition,
        entity: &str,
        id: RecordId,
    ) -> Result<bool> {
        let def = entity_def(schema, entity)?;
        let sql = format!(
            "DELETE FROM {} WHERE {} = ?1",
            quote_ident(def.name()),
            quote_ident(ID_COLUMN)
        );

        let deleted = conn
            .prepare_cached(&sql)
            .map_err(from_rusqlite)?
            .execute([id.get()])
            .map_err(from_rusqlite)?;
        Ok(deleted > 0)
    }

    /// Batch delete every record matching `filter`; returns how many went
    pub fn delete_where(
        conn: &Connection,
        schema: &SchemaDefinition,
        entity: &str,
        filter: &Filter,
    ) -> Result<usize> {
        let def = entity_def(schema, entity)?;
        let (predicate, params) = filter.to_sql(def)?;
        let sql = format!("DELETE FROM {} WHERE {}", quote_ident(def.name()), predicate);

        conn.prepare_cached(&sql)
            .map_err(from_rusqlite)?
            .execute(params_from_iter(params))
            .map_err(from_rusqlite)
    }
}

fn entity_def<'a>(schema: &'a SchemaDefinition, entity: &str) -> Result<&'a EntityDef> {
    schema.entity(entity).ok_or_else(|| {
        BurrowError::EntityNotFound {
            entity: entity.to_string(),
        }
        .into()
    })
}

fn select_sql(def: &EntityDef) -> String {
    let mut columns = vec![quote_ident(ID_COLUMN)];
    columns.extend(def.fields().iter().map(|f| quote_ident(f.name())));
    format!("SELECT {} FROM {}", columns.join(", "), quote_ident(def.name()))
}

fn check_known_fields(def: &EntityDef, fields: &Fields) -> Result<()> {
    for (name, _) in fields.iter() {
        if def.field(name).is_none() {
            return Err(BurrowError::FieldNotFound {
                entity: def.name().to_string(),
                field: name.clone(),
            }
            .into());
        }
    }
    Ok(())
}

/// Coerce a supplied value to the field's type, rejecting `Null` for
/// required fields
fn checked_value(def: &EntityDef, field: &FieldDef, value: &Value) -> Result<Value> {
    let coerced = value
        .clone()
        .coerce(field.field_type())
        .ok_or_else(|| BurrowError::TypeMismatch {
            entity: def.name().to_string(),
            field: field.name().to_string(),
            expected: field.field_type().to_string(),
            found: value.type_name().to_string(),
        })?;

    if coerced.is_null() && !field.is_optional() {
        return Err(required_missing(def, field).into());
    }
    Ok(coerced)
}

fn required_missing(def: &EntityDef, field: &FieldDef) -> BurrowError {
    BurrowError::RequiredFieldMissing {
        entity: def.name().to_string(),
        field: field.name().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ddl::create_entity_tables;
    use burrow_core::errors::ExErrorKind;
    use burrow_core::model::value::date_from_millis;
    use burrow_core::model::SchemaDocument;

    fn setup() -> (Connection, SchemaDefinition) {
        let doc: SchemaDocument = serde_json::from_value(serde_json::json!({
            "version": 1,
            "entities": [
                {
                    "name": "User",
                    "fields": [
                        { "name": "firstName", "type": "string" },
                        { "name": "lastName", "type": "string" },
                        { "name": "isActive", "type": "bool", "default": false },
                        { "name": "dob", "type": "date", "optional": true },
                        { "name": "team", "type": "reference", "target": "Team", "optional": true }
                    ]
                },
                { "name": "Team", "fields": [] }
            ]
        }))
        .unwrap();
        let schema = SchemaDefinition::from_document(doc, "userModel").unwrap();
        let conn = Connection::open_in_memory().unwrap();
        create_entity_tables(&conn, &schema).unwrap();
        (conn, schema)
    }

    fn user(first: &str, last: &str) -> Fields {
        Fields::new().set("firstName", first).set("lastName", last)
    }

    #[test]
    fn test_insert_fills_defaults() {
        let (conn, schema) = setup();
        let id = RecordRepo::insert(&conn, &schema, "User", &user("Bob", "Evans")).unwrap();

        let record = RecordRepo::get(&conn, &schema, "User", id).unwrap().unwrap();
        assert_eq!(record.get("isActive"), Some(&Value::Bool(false)));
        assert_eq!(record.get("dob"), Some(&Value::Null));
        assert_eq!(record.get("firstName"), Some(&Value::from("Bob")));
    }

    #[test]
    fn test_insert_validation() {
        let (conn, schema) = setup();

        let err = RecordRepo::insert(&conn, &schema, "User", &Fields::new().set("firstName", "Bob"))
            .unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::InvalidInput);

        let err = RecordRepo::insert(&conn, &schema, "User", &user("Bob", "Evans").set("age", 3))
            .unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::InvalidInput);

        let err = RecordRepo::insert(&conn, &schema, "User", &user("Bob", "Evans").set("isActive", "yes"))
            .unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::InvalidInput);

        let err = RecordRepo::insert(&conn, &schema, "Ghost", &Fields::new()).unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::NotFound);

        assert_eq!(RecordRepo::count(&conn, &schema, "User").unwrap(), 0);
    }

    #[test]
    fn test_entity_without_fields_and_references() {
        let (conn, schema) = setup();
        let team = RecordRepo::insert(&conn, &schema, "Team", &Fields::new()).unwrap();
        let id = RecordRepo::insert(&conn, &schema, "User", &user("Ann", "Lee").set("team", team))
            .unwrap();

        let record = RecordRepo::get(&conn, &schema, "User", id).unwrap().unwrap();
        assert_eq!(record.get("team").and_then(Value::as_reference), Some(team));
    }

    #[test]
    fn test_update_and_delete() {
        let (conn, schema) = setup();
        let id = RecordRepo::insert(&conn, &schema, "User", &user("Bob", "Evans")).unwrap();

        RecordRepo::update(
            &conn,
            &schema,
            "User",
            id,
            &Fields::new().set("isActive", true).set("dob", date_from_millis(0)),
        )
        .unwrap();
        let record = RecordRepo::get(&conn, &schema, "User", id).unwrap().unwrap();
        assert_eq!(record.get("isActive"), Some(&Value::Bool(true)));

        let err = RecordRepo::update(&conn, &schema, "User", id, &Fields::new().set("lastName", None::<String>))
            .unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::InvalidInput);

        let missing = RecordRepo::update(&conn, &schema, "User", RecordId(999), &Fields::new())
            .unwrap_err();
        assert_eq!(missing.kind(), ExErrorKind::NotFound);

        assert!(RecordRepo::delete(&conn, &schema, "User", id).unwrap());
        assert!(!RecordRepo::delete(&conn, &schema, "User", id).unwrap());
        assert!(RecordRepo::get(&conn, &schema, "User", id).unwrap().is_none());
    }

    #[test]
    fn test_fetch_and_delete_where() {
        let (conn, schema) = setup();
        for (first, last) in [("Bob", "Evans"), ("Ann", "Lee"), ("Bob", "Stone")] {
            RecordRepo::insert(&conn, &schema, "User", &user(first, last)).unwrap();
        }

        let bobs = RecordRepo::fetch_where(&conn, &schema, "User", &Filter::new().eq("firstName", "Bob"))
            .unwrap();
        assert_eq!(bobs.len(), 2);
        assert!(bobs[0].id() < bobs[1].id());

        let filter = Filter::new().ne("firstName", "Bob").ne("lastName", "Evans");
        assert_eq!(RecordRepo::count_where(&conn, &schema, "User", &filter).unwrap(), 1);
        assert_eq!(RecordRepo::delete_where(&conn, &schema, "User", &filter).unwrap(), 1);
        assert_eq!(RecordRepo::fetch_all(&conn, &schema, "User").unwrap().len(), 2);
    }
}
