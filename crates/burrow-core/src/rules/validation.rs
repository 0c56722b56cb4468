use std::collections::HashSet;

use crate::errors::{BurrowError, Result};
use crate::model::document::{EntityDocument, SchemaDocument};
use crate::model::{FieldType, Value};

/// Prefix reserved for the store's own tables and staging names
pub const RESERVED_PREFIX: &str = "burrow_";

/// Validate a parsed schema document
///
/// Checks, in order:
///
/// 1. Version is at least 1
/// 2. The document name, when given, matches the requested name
/// 3. Entity names are identifiers, unreserved and unique
/// 4. Entity renames are unique and never shadow a live entity name
/// 5. Per entity: field names are identifiers, unreserved and unique,
///    field renames are unique and never shadow a live field name
/// 6. Reference fields name an existing target and carry no default;
///    other fields carry no target
/// 7. Defaults convert to the declared field type
///
/// # Errors
/// Returns the first violation as `BurrowError::SchemaInvalid`.
pub fn validate_document(doc: &SchemaDocument, expected_name: &str) -> Result<()> {
    let invalid = |reason: String| BurrowError::SchemaInvalid {
        name: expected_name.to_string(),
        reason,
    };

    if doc.version == 0 {
        return Err(invalid("version must be at least 1".to_string()));
    }

    if let Some(name) = &doc.name {
        if name != expected_name {
            return Err(invalid(format!(
                "document declares name '{}' but was requested as '{}'",
                name, expected_name
            )));
        }
    }

    let mut entity_names = HashSet::new();
    for entity in &doc.entities {
        check_name(&entity.name, "entity").map_err(&invalid)?;
        if !entity_names.insert(entity.name.as_str()) {
            return Err(invalid(format!("duplicate entity '{}'", entity.name)));
        }
    }

    check_renames(
        doc.entities
            .iter()
            .filter_map(|e| e.renamed_from.as_deref()),
        &entity_names,
        "entity",
    )
    .map_err(&invalid)?;

    for entity in &doc.entities {
        validate_entity(entity, &entity_names).map_err(&invalid)?;
    }

    Ok(())
}

fn validate_entity(
    entity: &EntityDocument,
    entity_names: &HashSet<&str>,
) -> std::result::Result<(), String> {
    let mut field_names = HashSet::new();
    for field in &entity.fields {
        check_name(&field.name, "field").map_err(|e| format!("entity '{}': {}", entity.name, e))?;
        if !field_names.insert(field.name.as_str()) {
            return Err(format!(
                "duplicate field '{}' on entity '{}'",
                field.name, entity.name
            ));
        }
    }

    check_renames(
        entity
            .fields
            .iter()
            .filter_map(|f| f.renamed_from.as_deref()),
        &field_names,
        "field",
    )
    .map_err(|e| format!("entity '{}': {}", entity.name, e))?;

    for field in &entity.fields {
        let qualified = format!("{}.{}", entity.name, field.name);

        match (field.field_type, field.target.as_deref()) {
            (FieldType::Reference, None) => {
                return Err(format!("reference field {} has no target", qualified));
            }
            (FieldType::Reference, Some(target)) if !entity_names.contains(target) => {
                return Err(format!(
                    "reference field {} targets unknown entity '{}'",
                    qualified, target
                ));
            }
            (FieldType::Reference, Some(_)) => {
                if field.default.is_some() {
                    return Err(format!(
                        "reference field {} cannot have a default",
                        qualified
                    ));
                }
            }
            (_, Some(_)) => {
                return Err(format!(
                    "field {} is not a reference but declares a target",
                    qualified
                ));
            }
            (_, None) => {}
        }

        if let Some(default) = &field.default {
            match Value::from_json(field.field_type, default) {
                Some(Value::Null) if !field.optional => {
                    return Err(format!(
                        "required field {} has a null default",
                        qualified
                    ));
                }
                Some(_) => {}
                None => {
                    return Err(format!(
                        "default for {} is not a valid {}",
                        qualified, field.field_type
                    ));
                }
            }
        }
    }

    Ok(())
}

fn check_name(name: &str, what: &str) -> std::result::Result<(), String> {
    if !is_identifier(name) {
        return Err(format!(
            "{} name '{}' must start with a letter and contain only letters, digits and '_'",
            what, name
        ));
    }
    if name.to_ascii_lowercase().starts_with(RESERVED_PREFIX) {
        return Err(format!(
            "{} name '{}' uses the reserved prefix '{}'",
            what, name, RESERVED_PREFIX
        ));
    }
    Ok(())
}

fn check_renames<'a>(
    renames: impl Iterator<Item = &'a str>,
    live_names: &HashSet<&str>,
    what: &str,
) -> std::result::Result<(), String> {
    let mut seen = HashSet::new();
    for previous in renames {
        check_name(previous, what)?;
        if live_names.contains(previous) {
            return Err(format!(
                "{} '{}' is both renamed from and still declared",
                what, previous
            ));
        }
        if !seen.insert(previous) {
            return Err(format!("{} '{}' is renamed more than once", what, previous));
        }
    }
    Ok(())
}

/// `[A-Za-z][A-Za-z0-9_]*`
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}
