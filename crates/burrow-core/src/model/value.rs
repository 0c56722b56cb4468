use std::collections::BTreeMap;

use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Declared type of an entity field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Integer,
    Double,
    Bool,
    /// UTC instant, stored as epoch milliseconds
    Date,
    Binary,
    /// Row id of a record in the field's target entity
    Reference,
}

impl FieldType {
    /// Canonical lowercase name, as written in schema documents
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Double => "double",
            FieldType::Bool => "bool",
            FieldType::Date => "date",
            FieldType::Binary => "binary",
            FieldType::Reference => "reference",
        }
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier of a stored record, unique within its entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(pub i64);

impl RecordId {
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single field value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    String(String),
    Integer(i64),
    Double(f64),
    Bool(bool),
    Date(DateTime<Utc>),
    Binary(Vec<u8>),
    Reference(RecordId),
}

impl Value {
    /// Short type name used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::String(_) => "string",
            Value::Integer(_) => "integer",
            Value::Double(_) => "double",
            Value::Bool(_) => "bool",
            Value::Date(_) => "date",
            Value::Binary(_) => "binary",
            Value::Reference(_) => "reference",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Convert this value to the given field type, if the two are compatible
    ///
    /// `Null` is compatible with every type; optionality is checked by the
    /// caller. Integers widen to doubles and integers stand in for references.
    pub fn coerce(self, field_type: FieldType) -> Option<Value> {
        match (self, field_type) {
            (Value::Null, _) => Some(Value::Null),
            (Value::String(s), FieldType::String) => Some(Value::String(s)),
            (Value::Integer(i), FieldType::Integer) => Some(Value::Integer(i)),
            (Value::Integer(i), FieldType::Double) => Some(Value::Double(i as f64)),
            (Value::Double(d), FieldType::Double) => Some(Value::Double(d)),
            (Value::Bool(b), FieldType::Bool) => Some(Value::Bool(b)),
            (Value::Date(d), FieldType::Date) => Some(Value::Date(d)),
            (Value::Binary(b), FieldType::Binary) => Some(Value::Binary(b)),
            (Value::Reference(r), FieldType::Reference) => Some(Value::Reference(r)),
            (Value::Integer(i), FieldType::Reference) => Some(Value::Reference(RecordId(i))),
            _ => None,
        }
    }

    /// Interpret a JSON/YAML scalar as a value of the given type
    ///
    /// Dates accept epoch milliseconds or RFC 3339 strings; binary accepts
    /// standard base64.
    pub fn from_json(field_type: FieldType, json: &serde_json::Value) -> Option<Value> {
        use serde_json::Value as Json;

        match (field_type, json) {
            (_, Json::Null) => Some(Value::Null),
            (FieldType::String, Json::String(s)) => Some(Value::String(s.clone())),
            (FieldType::Integer, Json::Number(n)) => n.as_i64().map(Value::Integer),
            (FieldType::Double, Json::Number(n)) => n.as_f64().map(Value::Double),
            (FieldType::Bool, Json::Bool(b)) => Some(Value::Bool(*b)),
            (FieldType::Date, Json::Number(n)) => n.as_i64().and_then(date_from_millis).map(Value::Date),
            (FieldType::Date, Json::String(s)) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|d| Value::Date(d.with_timezone(&Utc))),
            (FieldType::Binary, Json::String(s)) => base64::engine::general_purpose::STANDARD
                .decode(s)
                .ok()
                .map(Value::Binary),
            _ => None,
        }
    }

    /// Canonical JSON form, the inverse of [`Value::from_json`]
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;

        match self {
            Value::Null => Json::Null,
            Value::String(s) => Json::String(s.clone()),
            Value::Integer(i) => Json::from(*i),
            Value::Double(d) => Json::from(*d),
            Value::Bool(b) => Json::Bool(*b),
            Value::Date(d) => Json::from(d.timestamp_millis()),
            Value::Binary(b) => Json::String(base64::engine::general_purpose::STANDARD.encode(b)),
            Value::Reference(r) => Json::from(r.0),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<RecordId> {
        match self {
            Value::Reference(r) => Some(*r),
            _ => None,
        }
    }
}

/// Convert epoch milliseconds to a UTC instant
pub fn date_from_millis(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(value as i64)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::Date(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Binary(value)
    }
}

impl From<RecordId> for Value {
    fn from(value: RecordId) -> Self {
        Value::Reference(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Field values keyed by field name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields(BTreeMap<String, Value>);

impl Fields {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Builder-style insert
    pub fn set(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Fields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// A stored record of one entity
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    id: RecordId,
    entity: String,
    fields: Fields,
}

impl Record {
    pub fn new(id: RecordId, entity: impl Into<String>, fields: Fields) -> Self {
        Self {
            id,
            entity: entity.into(),
            fields,
        }
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    /// Value of a field; absent only for names the entity does not declare
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coerce_widens_integer_to_double() {
        assert_eq!(
            Value::Integer(3).coerce(FieldType::Double),
            Some(Value::Double(3.0))
        );
        assert_eq!(Value::Double(3.5).coerce(FieldType::Integer), None);
    }

    #[test]
    fn test_null_coerces_to_any_type() {
        assert_eq!(Value::Null.coerce(FieldType::Date), Some(Value::Null));
    }

    #[test]
    fn test_date_from_json_accepts_millis_and_rfc3339() {
        let epoch = date_from_millis(0).unwrap();
        assert_eq!(
            Value::from_json(FieldType::Date, &serde_json::json!(0)),
            Some(Value::Date(epoch))
        );
        assert_eq!(
            Value::from_json(FieldType::Date, &serde_json::json!("1970-01-01T00:00:00Z")),
            Some(Value::Date(epoch))
        );
    }

    #[test]
    fn test_binary_json_is_base64() {
        let value = Value::Binary(vec![0xde, 0xad, 0xbe, 0xef]);
        let json = value.to_json();
        assert_eq!(json, serde_json::json!("3q2+7w=="));
        assert_eq!(Value::from_json(FieldType::Binary, &json), Some(value));
    }

    #[test]
    fn test_mismatched_json_is_rejected() {
        assert_eq!(
            Value::from_json(FieldType::Bool, &serde_json::json!("yes")),
            None
        );
        assert_eq!(
            Value::from_json(FieldType::Integer, &serde_json::json!(1.5)),
            None
        );
    }

    #[test]
    fn test_fields_builder() {
        let fields = Fields::new()
            .set("firstName", "Bob")
            .set("isActive", true)
            .set("nickname", None::<String>);

        assert_eq!(fields.len(), 3);
        assert_eq!(fields.get("firstName").and_then(Value::as_str), Some("Bob"));
        assert_eq!(fields.get("nickname"), Some(&Value::Null));
    }
}
