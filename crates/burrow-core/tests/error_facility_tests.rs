use burrow_core::errors::{BurrowError, ExError, ExErrorKind};

#[test]
fn test_schema_not_found_verifiable_by_kind() {
    let err = BurrowError::SchemaNotFound {
        name: "doesNotExist".to_string(),
        extension: "model".to_string(),
        location: "<root>".to_string(),
    };

    let ex_err: ExError = err.into();

    assert_eq!(ex_err.kind(), ExErrorKind::SchemaNotFound);
    assert_eq!(ex_err.code(), "ERR_SCHEMA_NOT_FOUND");
    assert_eq!(ex_err.schema_name(), Some("doesNotExist"));
    assert_eq!(ex_err.op(), Some("load_schema"));
}

#[test]
fn test_schema_invalid_carries_reason() {
    let err = BurrowError::SchemaInvalid {
        name: "userModel".to_string(),
        reason: "duplicate entity 'User'".to_string(),
    };

    let ex_err: ExError = err.into();

    assert_eq!(ex_err.kind(), ExErrorKind::SchemaInvalid);
    assert!(ex_err.message().contains("duplicate entity"));
}

#[test]
fn test_record_errors_map_to_input_and_not_found() {
    let missing: ExError = BurrowError::RequiredFieldMissing {
        entity: "User".to_string(),
        field: "lastName".to_string(),
    }
    .into();
    assert_eq!(missing.kind(), ExErrorKind::InvalidInput);
    assert_eq!(missing.entity(), Some("User"));

    let unknown: ExError = BurrowError::EntityNotFound {
        entity: "Ghost".to_string(),
    }
    .into();
    assert_eq!(unknown.kind(), ExErrorKind::NotFound);
    assert_ne!(unknown.kind(), ExErrorKind::InvalidInput);
}

#[test]
fn test_invalid_configuration_is_invalid_input() {
    let ex_err: ExError = BurrowError::InvalidConfiguration {
        reason: "schema name must not be empty".to_string(),
    }
    .into();

    assert_eq!(ex_err.kind(), ExErrorKind::InvalidInput);
    assert_eq!(ex_err.op(), Some("configure"));
}

#[test]
fn test_error_kind_code_mapping() {
    // Test that each kind has a stable, unique code
    let kinds = vec![
        (ExErrorKind::SchemaNotFound, "ERR_SCHEMA_NOT_FOUND"),
        (ExErrorKind::SchemaInvalid, "ERR_SCHEMA_INVALID"),
        (ExErrorKind::StoreUnreadable, "ERR_STORE_UNREADABLE"),
        (ExErrorKind::MigrationFailed, "ERR_MIGRATION_FAILED"),
        (ExErrorKind::AlreadyOpen, "ERR_ALREADY_OPEN"),
        (ExErrorKind::Cancelled, "ERR_CANCELLED"),
        (ExErrorKind::InvalidInput, "ERR_INVALID_INPUT"),
        (ExErrorKind::InvalidState, "ERR_INVALID_STATE"),
        (ExErrorKind::NotFound, "ERR_NOT_FOUND"),
        (ExErrorKind::Persistence, "ERR_PERSISTENCE"),
        (ExErrorKind::Io, "ERR_IO"),
        (ExErrorKind::Serialization, "ERR_SERIALIZATION"),
        (ExErrorKind::Internal, "ERR_INTERNAL"),
    ];

    let mut seen = std::collections::HashSet::new();
    for (kind, expected_code) in kinds {
        assert_eq!(kind.code(), expected_code);
        assert!(seen.insert(expected_code), "duplicate code {}", expected_code);
    }
}

#[test]
fn test_builder_context_round_trip() {
    let attempt = burrow_core_types::AttemptId::new();
    let err = ExError::new(ExErrorKind::StoreUnreadable)
        .with_op("open")
        .with_schema_name("userModel")
        .with_locator("/data/userModel.store")
        .with_attempt_id(attempt.clone())
        .with_message("file is not a database");

    assert_eq!(err.op(), Some("open"));
    assert_eq!(err.schema_name(), Some("userModel"));
    assert_eq!(err.locator(), Some("/data/userModel.store"));
    assert_eq!(err.attempt_id(), Some(&attempt));
    assert_eq!(err.message(), "file is not a database");
}
