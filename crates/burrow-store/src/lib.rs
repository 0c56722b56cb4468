//! Burrow Store - embedded persistence container over SQLite
//!
//! Provides:
//! - `PersistenceContainer`: configure, open (with automatic migration), close
//! - Durable (file-backed, WAL) and ephemeral (in-memory) storage
//! - `StoreHandle` with read and write transactions over schema records
//! - Copy → migrate → swap schema migrations with a recorded history

pub mod config;
pub mod container;
pub mod db;
pub mod ddl;
pub mod errors;
pub mod filter;
pub mod handle;
pub mod locator;
pub mod migrations;
pub mod registry;
pub mod repo;

// Re-export key types
pub use config::{CancelToken, ContainerConfig, OpenGuard, OpenOptions};
pub use container::{ContainerState, PersistenceContainer};
pub use errors::Result;
pub use filter::{Comparison, Filter};
pub use handle::{ReadTxn, StoreHandle, WriteTxn};
pub use locator::{
    default_base_directory, StorageDescriptor, StorageKind, DEFAULT_STORE_SUFFIX, NULL_DEVICE,
};
