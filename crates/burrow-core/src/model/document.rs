//! Schema document format
//!
//! Defines the YAML structure of a schema resource. JSON documents parse too,
//! since JSON is valid YAML. A document is only a parse target; it becomes a
//! [`SchemaDefinition`](super::SchemaDefinition) after validation.

use serde::{Deserialize, Serialize};

use super::value::FieldType;

/// Top-level schema document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaDocument {
    /// Schema name; when present it must equal the requested resource name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Schema version, compared numerically to decide on migration
    pub version: u32,

    /// Entity types, in declaration order
    #[serde(default)]
    pub entities: Vec<EntityDocument>,
}

/// Entity type definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntityDocument {
    pub name: String,

    /// Name this entity had in the previous schema version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renamed_from: Option<String>,

    #[serde(default)]
    pub fields: Vec<FieldDocument>,
}

/// Field definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldDocument {
    pub name: String,

    #[serde(rename = "type")]
    pub field_type: FieldType,

    #[serde(default)]
    pub optional: bool,

    /// Value used when an insert or a migration has nothing for this field
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,

    /// Name this field had in the previous schema version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renamed_from: Option<String>,

    /// Target entity of a reference field
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_field_defaults() {
        let yaml = "name: age\ntype: integer\n";
        let field: FieldDocument = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(field.field_type, FieldType::Integer);
        assert!(!field.optional);
        assert!(field.default.is_none());
        assert!(field.renamed_from.is_none());
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let yaml = "version: 1\nentites: []\n";
        let result: std::result::Result<SchemaDocument, _> = serde_yaml::from_str(yaml);
        assert!(result.is_err());
    }

    #[test]
    fn test_json_document_parses_as_yaml() {
        let json = r#"{"version": 3, "entities": [{"name": "User", "fields": []}]}"#;
        let doc: SchemaDocument = serde_yaml::from_str(json).unwrap();
        assert_eq!(doc.version, 3);
        assert_eq!(doc.entities[0].name, "User");
    }
}
