//! Migration plan inference
//!
//! Compares the schema a store was built from with the schema being opened
//! and derives, per entity, where every column of the new table comes from.
//! Only add / remove / rename changes are inferred; a type change fails.

use crate::errors::{migration_failed, Result};
use burrow_core::{EntityDef, FieldDef, SchemaDefinition, Value};
use std::fmt::Write;

/// Where a column of a migrated table gets its values
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnSource {
    /// Copy the named column of the source table
    Copy(String),
    /// Copy the named column, replacing `NULL` with a default
    CopyOr(String, Value),
    /// Every row gets the field's default
    Default(Value),
    /// Every row gets `NULL`
    Null,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMapping {
    pub field: String,
    pub required: bool,
    pub source: ColumnSource,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntityMapping {
    /// Entity (and table) name in the new schema
    pub entity: String,
    /// Table rows are copied from; `None` for a new entity
    pub source: Option<String>,
    pub columns: Vec<ColumnMapping>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MigrationPlan {
    from_version: u32,
    to_version: u32,
    entities: Vec<EntityMapping>,
    dropped: Vec<String>,
}

/// Outcome of comparing a stored schema with the one being opened
#[derive(Debug, Clone, PartialEq)]
pub enum MigrationCheck {
    UpToDate,
    Required(MigrationPlan),
}

/// Decide whether a store built from `stored` can be opened with `target`
///
/// # Errors
/// `MigrationFailed` for a downgrade, for a changed schema at the same
/// version, or when no plan can be inferred.
pub fn check(stored: &SchemaDefinition, target: &SchemaDefinition) -> Result<MigrationCheck> {
    let (from, to) = (stored.version(), target.version());

    if to < from {
        return Err(migration_failed(
            from,
            to,
            "store was written by a newer schema version",
        ));
    }
    if to == from {
        if stored.digest() == target.digest() {
            return Ok(MigrationCheck::UpToDate);
        }
        return Err(migration_failed(
            from,
            to,
            "schema changed without a version bump",
        ));
    }

    MigrationPlan::infer(stored, target).map(MigrationCheck::Required)
}

impl MigrationPlan {
    /// Infer the mapping from `stored` to `target`
    pub fn infer(stored: &SchemaDefinition, target: &SchemaDefinition) -> Result<Self> {
        let (from, to) = (stored.version(), target.version());

        let mut entities = Vec::with_capacity(target.entities().len());
        let mut used = Vec::new();
        for entity in target.entities() {
            let source = source_entity(stored, entity);
            if let Some(source) = source {
                used.push(source.name().to_string());
            }
            let columns = entity
                .fields()
                .iter()
                .map(|field| map_field(entity, field, source))
                .collect::<std::result::Result<Vec<_>, String>>()
                .map_err(|reason| migration_failed(from, to, reason))?;

            entities.push(EntityMapping {
                entity: entity.name().to_string(),
                source: source.map(|s| s.name().to_string()),
                columns,
            });
        }

        let dropped = stored
            .entities()
            .iter()
            .map(|e| e.name().to_string())
            .filter(|name| !used.contains(name))
            .collect();

        Ok(Self {
            from_version: from,
            to_version: to,
            entities,
            dropped,
        })
    }

    pub fn from_version(&self) -> u32 {
        self.from_version
    }

    pub fn to_version(&self) -> u32 {
        self.to_version
    }

    pub fn entities(&self) -> &[EntityMapping] {
        &self.entities
    }

    /// Stored entities with no counterpart; their tables are dropped
    pub fn dropped(&self) -> &[String] {
        &self.dropped
    }

    /// Number of tables the plan rebuilds or drops
    pub fn steps(&self) -> usize {
        self.entities.len() + self.dropped.len()
    }

    /// Stable text form, checksummed into the migration history
    pub fn describe(&self) -> String {
        let mut out = format!("{} -> {}\n", self.from_version, self.to_version);
        for mapping in &self.entities {
            let _ = write!(
                out,
                "{} <- {}:",
                mapping.entity,
                mapping.source.as_deref().unwrap_or("(new)")
            );
            for column in &mapping.columns {
                let _ = match &column.source {
                    ColumnSource::Copy(from) => write!(out, " {}=copy({})", column.field, from),
                    ColumnSource::CopyOr(from, value) => write!(
                        out,
                        " {}=copy({}, {})",
                        column.field,
                        from,
                        value.to_json()
                    ),
                    ColumnSource::Default(value) => {
                        write!(out, " {}=default({})", column.field, value.to_json())
                    }
                    ColumnSource::Null => write!(out, " {}=null", column.field),
                };
            }
            out.push('\n');
        }
        for name in &self.dropped {
            let _ = writeln!(out, "drop {}", name);
        }
        out
    }
}

fn source_entity<'a>(stored: &'a SchemaDefinition, entity: &EntityDef) -> Option<&'a EntityDef> {
    entity
        .renamed_from()
        .and_then(|previous| stored.entity(previous))
        .or_else(|| stored.entity(entity.name()))
}

fn map_field(
    entity: &EntityDef,
    field: &FieldDef,
    source: Option<&EntityDef>,
) -> std::result::Result<ColumnMapping, String> {
    let previous = source.and_then(|s| {
        field
            .renamed_from()
            .and_then(|name| s.field(name))
            .or_else(|| s.field(field.name()))
    });

    let source = match previous {
        Some(previous) if previous.field_type() != field.field_type() => {
            return Err(format!(
                "field {}.{} changes type from {} to {}",
                entity.name(),
                field.name(),
                previous.field_type(),
                field.field_type()
            ));
        }
        Some(previous) => match field.default_value() {
            Some(default) if previous.is_optional() && !field.is_optional() => {
                ColumnSource::CopyOr(previous.name().to_string(), default.clone())
            }
            _ => ColumnSource::Copy(previous.name().to_string()),
        },
        None => match field.default_value() {
            Some(default) => ColumnSource::Default(default.clone()),
            None => ColumnSource::Null,
        },
    };

    Ok(ColumnMapping {
        field: field.name().to_string(),
        required: !field.is_optional(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use burrow_core::errors::ExErrorKind;
    use burrow_core::model::SchemaDocument;

    fn schema(json: serde_json::Value) -> SchemaDefinition {
        let doc: SchemaDocument = serde_json::from_value(json).unwrap();
        SchemaDefinition::from_document(doc, "userModel").unwrap()
    }

    fn v1() -> SchemaDefinition {
        schema(serde_json::json!({
            "version": 1,
            "entities": [
                { "name": "User", "fields": [
                    { "name": "firstName", "type": "string" },
                    { "name": "nickname", "type": "string", "optional": true },
                    { "name": "age", "type": "integer", "optional": true }
                ]},
                { "name": "Legacy", "fields": [] }
            ]
        }))
    }

    #[test]
    fn test_same_version_same_digest_is_up_to_date() {
        assert_eq!(check(&v1(), &v1()).unwrap(), MigrationCheck::UpToDate);
    }

    #[test]
    fn test_same_version_changed_schema_fails() {
        let changed = schema(serde_json::json!({
            "version": 1,
            "entities": [{ "name": "User", "fields": [] }]
        }));
        let err = check(&v1(), &changed).unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::MigrationFailed);
    }

    #[test]
    fn test_downgrade_fails() {
        let newer = schema(serde_json::json!({ "version": 5 }));
        let err = check(&newer, &v1()).unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::MigrationFailed);
    }

    #[test]
    fn test_infer_renames_defaults_and_drops() {
        let v2 = schema(serde_json::json!({
            "version": 2,
            "entities": [
                { "name": "User", "fields": [
                    { "name": "givenName", "type": "string", "renamed_from": "firstName" },
                    { "name": "nickname", "type": "string", "default": "none" },
                    { "name": "isActive", "type": "bool", "default": true },
                    { "name": "email", "type": "string", "optional": true }
                ]},
                { "name": "Team", "fields": [] }
            ]
        }));

        let plan = match check(&v1(), &v2).unwrap() {
            MigrationCheck::Required(plan) => plan,
            other => panic!("expected a plan, got {:?}", other),
        };

        let user = &plan.entities()[0];
        assert_eq!(user.source.as_deref(), Some("User"));
        let sources: Vec<&ColumnSource> = user.columns.iter().map(|c| &c.source).collect();
        assert_eq!(
            sources,
            vec![
                &ColumnSource::Copy("firstName".into()),
                &ColumnSource::CopyOr("nickname".into(), Value::from("none")),
                &ColumnSource::Default(Value::Bool(true)),
                &ColumnSource::Null,
            ]
        );

        assert_eq!(plan.entities()[1].source, None);
        assert_eq!(plan.dropped(), &["Legacy".to_string()]);
        assert_eq!(plan.steps(), 3);
        assert!(plan.describe().contains("givenName=copy(firstName)"));
    }

    #[test]
    fn test_entity_rename_maps_source_table() {
        let v2 = schema(serde_json::json!({
            "version": 2,
            "entities": [
                { "name": "Person", "renamed_from": "User", "fields": [
                    { "name": "firstName", "type": "string" }
                ]}
            ]
        }));

        let plan = MigrationPlan::infer(&v1(), &v2).unwrap();
        assert_eq!(plan.entities()[0].source.as_deref(), Some("User"));
        assert_eq!(plan.dropped(), &["Legacy".to_string()]);
    }

    #[test]
    fn test_type_change_fails() {
        let v2 = schema(serde_json::json!({
            "version": 2,
            "entities": [{ "name": "User", "fields": [
                { "name": "firstName", "type": "string" },
                { "name": "age", "type": "double", "optional": true }
            ]}]
        }));

        let err = MigrationPlan::infer(&v1(), &v2).unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::MigrationFailed);
        assert!(err.message().contains("User.age"));
    }
}
