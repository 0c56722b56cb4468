//! Hydration layer - converts between record values and SQLite columns
//!
//! Bools are stored as 0/1, dates as epoch milliseconds and references as
//! the target's row id. Reading is driven by the declared field type.

use crate::errors::Result;
use burrow_core::errors::{ExError, ExErrorKind};
use burrow_core::model::value::date_from_millis;
use burrow_core::{EntityDef, FieldDef, FieldType, Fields, Record, RecordId, Value};
use rusqlite::types::Value as SqlValue;

/// Column value for a record value
pub fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::String(s) => SqlValue::Text(s.clone()),
        Value::Integer(i) => SqlValue::Integer(*i),
        Value::Double(d) => SqlValue::Real(*d),
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Date(d) => SqlValue::Integer(d.timestamp_millis()),
        Value::Binary(b) => SqlValue::Blob(b.clone()),
        Value::Reference(r) => SqlValue::Integer(r.get()),
    }
}

/// Record value for a column, interpreted as `field`'s declared type
pub fn from_sql(entity: &str, field: &FieldDef, raw: SqlValue) -> Result<Value> {
    let value = match (field.field_type(), raw) {
        (_, SqlValue::Null) => Some(Value::Null),
        (FieldType::String, SqlValue::Text(s)) => Some(Value::String(s)),
        (FieldType::Integer, SqlValue::Integer(i)) => Some(Value::Integer(i)),
        (FieldType::Double, SqlValue::Real(d)) => Some(Value::Double(d)),
        (FieldType::Double, SqlValue::Integer(i)) => Some(Value::Double(i as f64)),
        (FieldType::Bool, SqlValue::Integer(i)) => Some(Value::Bool(i != 0)),
        (FieldType::Date, SqlValue::Integer(ms)) => date_from_millis(ms).map(Value::Date),
        (FieldType::Binary, SqlValue::Blob(b)) => Some(Value::Binary(b)),
        (FieldType::Reference, SqlValue::Integer(i)) => Some(Value::Reference(RecordId(i))),
        _ => None,
    };

    value.ok_or_else(|| {
        ExError::new(ExErrorKind::Persistence)
            .with_op("hydrate")
            .with_entity(entity)
            .with_message(format!(
                "Column {} does not hold a {}",
                field.name(),
                field.field_type()
            ))
    })
}

/// Build a record from its row id and its columns in field order
pub fn hydrate_record(entity: &EntityDef, id: i64, columns: Vec<SqlValue>) -> Result<Record> {
    let mut fields = Fields::new();
    for (field, raw) in entity.fields().iter().zip(columns) {
        fields.insert(field.name(), from_sql(entity.name(), field, raw)?);
    }
    Ok(Record::new(RecordId(id), entity.name(), fields))
}

/// Read `_id` followed by one column per field from a result row
pub(crate) fn read_row(row: &rusqlite::Row<'_>, field_count: usize) -> rusqlite::Result<(i64, Vec<SqlValue>)> {
    let id: i64 = row.get(0)?;
    let mut columns = Vec::with_capacity(field_count);
    for index in 0..field_count {
        columns.push(row.get::<_, SqlValue>(index + 1)?);
    }
    Ok((id, columns))
}

#[cfg(test)]
mod tests {
    use super::*;
    use burrow_core::model::SchemaDocument;
    use burrow_core::SchemaDefinition;

    fn user_entity() -> EntityDef {
        let doc: SchemaDocument = serde_json::from_value(serde_json::json!({
            "version": 1,
            "entities": [{
                "name": "User",
                "fields": [
                    { "name": "isActive", "type": "bool" },
                    { "name": "dob", "type": "date", "optional": true },
                    { "name": "score", "type": "double", "optional": true }
                ]
            }]
        }))
        .unwrap();
        let schema = SchemaDefinition::from_document(doc, "m").unwrap();
        schema.entity("User").unwrap().clone()
    }

    #[test]
    fn test_bool_and_date_encoding() {
        assert_eq!(to_sql(&Value::Bool(true)), SqlValue::Integer(1));
        let epoch = date_from_millis(0).unwrap();
        assert_eq!(to_sql(&Value::Date(epoch)), SqlValue::Integer(0));
    }

    #[test]
    fn test_hydrate_record_uses_field_types() {
        let entity = user_entity();
        let record = hydrate_record(
            &entity,
            7,
            vec![SqlValue::Integer(1), SqlValue::Integer(0), SqlValue::Integer(3)],
        )
        .unwrap();

        assert_eq!(record.id(), RecordId(7));
        assert_eq!(record.get("isActive"), Some(&Value::Bool(true)));
        assert_eq!(
            record.get("dob"),
            Some(&Value::Date(date_from_millis(0).unwrap()))
        );
        assert_eq!(record.get("score"), Some(&Value::Double(3.0)));
    }

    #[test]
    fn test_wrong_storage_class_is_persistence_error() {
        let entity = user_entity();
        let field = entity.field("isActive").unwrap();
        let err = from_sql("User", field, SqlValue::Text("yes".into())).unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::Persistence);
    }
}
