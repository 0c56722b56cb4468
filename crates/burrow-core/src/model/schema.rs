use sha2::{Digest, Sha256};

use super::document::{EntityDocument, FieldDocument, SchemaDocument};
use super::value::{FieldType, Value};
use crate::errors::Result;
use crate::rules::validation;

/// A validated, immutable schema
///
/// Only obtainable through [`SchemaDefinition::from_document`] (or the loader),
/// so every instance satisfies the schema rules: unique entity names, unique
/// field names per entity, resolvable reference targets and typed defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaDefinition {
    name: String,
    version: u32,
    entities: Vec<EntityDef>,
    digest: String,
}

/// One entity type of a schema
#[derive(Debug, Clone, PartialEq)]
pub struct EntityDef {
    name: String,
    renamed_from: Option<String>,
    fields: Vec<FieldDef>,
}

/// One field of an entity type
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    name: String,
    field_type: FieldType,
    optional: bool,
    default: Option<Value>,
    renamed_from: Option<String>,
    target: Option<String>,
}

impl SchemaDefinition {
    /// Validate a parsed document against the name it was requested under
    pub fn from_document(doc: SchemaDocument, expected_name: &str) -> Result<Self> {
        validation::validate_document(&doc, expected_name)?;

        let entities = doc
            .entities
            .into_iter()
            .map(|entity| EntityDef {
                fields: entity
                    .fields
                    .into_iter()
                    .map(|field| {
                        let default = field
                            .default
                            .as_ref()
                            .and_then(|json| Value::from_json(field.field_type, json))
                            .filter(|value| !value.is_null());
                        FieldDef {
                            name: field.name,
                            field_type: field.field_type,
                            optional: field.optional,
                            default,
                            renamed_from: field.renamed_from,
                            target: field.target,
                        }
                    })
                    .collect(),
                name: entity.name,
                renamed_from: entity.renamed_from,
            })
            .collect();

        let mut schema = Self {
            name: expected_name.to_string(),
            version: doc.version,
            entities,
            digest: String::new(),
        };
        schema.digest = compute_digest(&schema.to_document())?;
        Ok(schema)
    }

    /// Rebuild a schema from its canonical JSON form (as kept in store metadata)
    pub fn from_canonical_json(json: &str, expected_name: &str) -> Result<Self> {
        let doc: SchemaDocument = serde_json::from_str(json)?;
        Self::from_document(doc, expected_name)
    }

    /// Canonical document form; `name` is always present
    pub fn to_document(&self) -> SchemaDocument {
        SchemaDocument {
            name: Some(self.name.clone()),
            version: self.version,
            entities: self
                .entities
                .iter()
                .map(|entity| EntityDocument {
                    name: entity.name.clone(),
                    renamed_from: entity.renamed_from.clone(),
                    fields: entity
                        .fields
                        .iter()
                        .map(|field| FieldDocument {
                            name: field.name.clone(),
                            field_type: field.field_type,
                            optional: field.optional,
                            default: field.default.as_ref().map(Value::to_json),
                            renamed_from: field.renamed_from.clone(),
                            target: field.target.clone(),
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    /// Canonical JSON serialization; the digest is computed over these bytes
    pub fn to_canonical_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_document())?)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn entities(&self) -> &[EntityDef] {
        &self.entities
    }

    pub fn entity(&self, name: &str) -> Option<&EntityDef> {
        self.entities.iter().find(|e| e.name == name)
    }

    /// Hex-encoded SHA256 of the canonical JSON form
    pub fn digest(&self) -> &str {
        &self.digest
    }
}

impl EntityDef {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn renamed_from(&self) -> Option<&str> {
        self.renamed_from.as_deref()
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }
}

impl FieldDef {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn renamed_from(&self) -> Option<&str> {
        self.renamed_from.as_deref()
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }
}

fn compute_digest(doc: &SchemaDocument) -> Result<String> {
    let canonical = serde_json::to_string(doc)?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}
