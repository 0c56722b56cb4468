use std::sync::Arc;

use super::resource::{ResourceProvider, SearchLocation};
use crate::errors::{BurrowError, Result};
use crate::model::{SchemaDefinition, SchemaDocument};

/// Extension used when a configuration does not name one
pub const DEFAULT_SCHEMA_EXTENSION: &str = "model";

/// Resolves schema resources through a provider
#[derive(Clone)]
pub struct SchemaLoader {
    provider: Arc<dyn ResourceProvider>,
}

impl SchemaLoader {
    pub fn new(provider: impl ResourceProvider + 'static) -> Self {
        Self {
            provider: Arc::new(provider),
        }
    }

    pub fn from_shared(provider: Arc<dyn ResourceProvider>) -> Self {
        Self { provider }
    }

    /// Load and validate the schema `name.extension` from `location`
    ///
    /// # Errors
    /// - `SchemaNotFound` when the provider has no matching resource
    /// - `ResourceUnavailable` when the provider fails to look it up
    /// - `SchemaInvalid` when the bytes are not a consistent schema
    pub fn load(
        &self,
        name: &str,
        extension: &str,
        location: &SearchLocation,
    ) -> Result<SchemaDefinition> {
        let bytes = self
            .provider
            .fetch(name, extension, location)
            .map_err(|e| BurrowError::ResourceUnavailable {
                name: name.to_string(),
                extension: extension.to_string(),
                reason: e.to_string(),
            })?
            .ok_or_else(|| BurrowError::SchemaNotFound {
                name: name.to_string(),
                extension: extension.to_string(),
                location: location.to_string(),
            })?;

        parse_schema_bytes(&bytes, name)
    }
}

impl std::fmt::Debug for SchemaLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaLoader").finish_non_exhaustive()
    }
}

/// Parse schema resource bytes requested under `name`
pub fn parse_schema_bytes(bytes: &[u8], name: &str) -> Result<SchemaDefinition> {
    let invalid = |reason: String| BurrowError::SchemaInvalid {
        name: name.to_string(),
        reason,
    };

    let text = std::str::from_utf8(bytes)
        .map_err(|e| invalid(format!("resource is not UTF-8: {}", e)))?;

    let doc: SchemaDocument =
        serde_yaml::from_str(text).map_err(|e| invalid(format!("parse error: {}", e)))?;

    SchemaDefinition::from_document(doc, name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::StaticResources;
    use std::io;

    struct FailingResources;

    impl ResourceProvider for FailingResources {
        fn fetch(&self, _: &str, _: &str, _: &SearchLocation) -> io::Result<Option<Vec<u8>>> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"))
        }
    }

    const USER_MODEL: &str = r#"
version: 1
entities:
  - name: User
    fields:
      - { name: firstName, type: string }
"#;

    #[test]
    fn test_load_found() {
        let loader = SchemaLoader::new(StaticResources::new().with(
            SearchLocation::Root,
            "userModel",
            DEFAULT_SCHEMA_EXTENSION,
            USER_MODEL,
        ));
        let schema = loader
            .load("userModel", DEFAULT_SCHEMA_EXTENSION, &SearchLocation::Root)
            .unwrap();
        assert_eq!(schema.name(), "userModel");
        assert!(schema.entity("User").is_some());
    }

    #[test]
    fn test_load_wrong_extension_is_not_found() {
        let loader = SchemaLoader::new(StaticResources::new().with(
            SearchLocation::Root,
            "userModel",
            DEFAULT_SCHEMA_EXTENSION,
            USER_MODEL,
        ));
        let err = loader
            .load("userModel", "model_copy", &SearchLocation::Root)
            .unwrap_err();
        assert!(matches!(err, BurrowError::SchemaNotFound { .. }));
    }

    #[test]
    fn test_provider_failure_is_resource_unavailable() {
        let loader = SchemaLoader::new(FailingResources);
        let err = loader
            .load("userModel", "model", &SearchLocation::Root)
            .unwrap_err();
        assert!(matches!(err, BurrowError::ResourceUnavailable { .. }));
    }

    #[test]
    fn test_non_utf8_is_invalid() {
        let err = parse_schema_bytes(&[0xff, 0xfe, 0x00], "m").unwrap_err();
        assert!(matches!(err, BurrowError::SchemaInvalid { .. }));
    }

    #[test]
    fn test_malformed_yaml_is_invalid() {
        let err = parse_schema_bytes(b"version: [1, 2", "m").unwrap_err();
        assert!(matches!(err, BurrowError::SchemaInvalid { .. }));
    }
}
