//! Store placement
//!
//! A durable store lives at `{base}/{schema}.{suffix}`; an ephemeral store is
//! addressed by the null device sentinel and never touches the filesystem.

use std::fmt;
use std::path::{Path, PathBuf};

/// Locator reported for ephemeral stores
pub const NULL_DEVICE: &str = "/dev/null";

/// File suffix used when a configuration does not name one
pub const DEFAULT_STORE_SUFFIX: &str = "store";

/// Directory created under the platform data directory
pub const BASE_DIRECTORY_NAME: &str = "burrow";

/// Suffix appended to a store path for its migration copy
pub const STAGED_SUFFIX: &str = "migrating";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum StorageKind {
    /// File-backed, survives the process
    #[default]
    Durable,
    /// Private in-memory database, gone at close
    Ephemeral,
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageKind::Durable => f.write_str("durable"),
            StorageKind::Ephemeral => f.write_str("ephemeral"),
        }
    }
}

/// Where a configured store lives; fixed once derived from a configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageDescriptor {
    Durable(PathBuf),
    Ephemeral,
}

impl StorageDescriptor {
    pub fn kind(&self) -> StorageKind {
        match self {
            StorageDescriptor::Durable(_) => StorageKind::Durable,
            StorageDescriptor::Ephemeral => StorageKind::Ephemeral,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            StorageDescriptor::Durable(path) => Some(path),
            StorageDescriptor::Ephemeral => None,
        }
    }

    /// Printable locator: the file path, or the null device sentinel
    pub fn locator(&self) -> String {
        match self {
            StorageDescriptor::Durable(path) => path.display().to_string(),
            StorageDescriptor::Ephemeral => NULL_DEVICE.to_string(),
        }
    }
}

impl fmt::Display for StorageDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.locator())
    }
}

/// `{base}/{schema_name}.{suffix}`
pub fn store_path(base: &Path, schema_name: &str, suffix: &str) -> PathBuf {
    base.join(format!("{}.{}", schema_name, suffix))
}

/// Path of the migration copy that sits next to a store file
pub fn staged_path(store: &Path) -> PathBuf {
    append(store, &format!(".{}", STAGED_SUFFIX))
}

/// A database file together with its WAL side files
pub fn database_files(path: &Path) -> [PathBuf; 3] {
    [path.to_path_buf(), append(path, "-wal"), append(path, "-shm")]
}

fn append(path: &Path, tail: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(tail);
    PathBuf::from(name)
}

/// Platform per-user data directory joined with `burrow`, or the temp dir
pub fn default_base_directory() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join(BASE_DIRECTORY_NAME))
        .unwrap_or_else(std::env::temp_dir)
}
