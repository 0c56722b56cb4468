use burrow_core::model::value::date_from_millis;
use burrow_core::{DirectoryResources, Fields, SchemaLoader, SearchLocation};
use burrow_store::{ContainerConfig, PersistenceContainer, StorageKind};
use std::path::{Path, PathBuf};

pub const USER_MODEL: &str = "userModel";
pub const USER: &str = "User";

pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

pub fn fixture_loader() -> SchemaLoader {
    SchemaLoader::new(DirectoryResources::new(fixtures_dir()))
}

/// Durable userModel store under `base`, schema resolved from `version_dir`
/// (`None` for the version 1 fixture at the root)
#[allow(dead_code)]
pub fn durable_config(base: &Path, version_dir: Option<&str>) -> ContainerConfig {
    let location = match version_dir {
        Some(dir) => SearchLocation::Path(PathBuf::from(dir)),
        None => SearchLocation::Root,
    };
    ContainerConfig::new(USER_MODEL)
        .with_base_directory(base)
        .with_search_location(location)
}

#[allow(dead_code)]
pub fn ephemeral_config() -> ContainerConfig {
    ContainerConfig::new(USER_MODEL).with_storage(StorageKind::Ephemeral)
}

#[allow(dead_code)]
pub fn container(config: ContainerConfig) -> PersistenceContainer {
    PersistenceContainer::with_config(fixture_loader(), config).expect("valid configuration")
}

/// A version 1 User record
#[allow(dead_code)]
pub fn user(first: &str, last: &str, active: bool, dob_millis: i64) -> Fields {
    Fields::new()
        .set("firstName", first)
        .set("lastName", last)
        .set("isActive", active)
        .set("dob", date_from_millis(dob_millis))
}

#[allow(dead_code)]
pub fn bob() -> Fields {
    user("Bob", "Evans", true, 0)
}
