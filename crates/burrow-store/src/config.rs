//! Container configuration and open options
//!
//! Building a configuration is pure value construction: nothing here touches
//! the filesystem or a store.

use crate::errors::{cancelled, Result};
use crate::locator::{
    default_base_directory, store_path, StorageDescriptor, StorageKind, DEFAULT_STORE_SUFFIX,
};
use burrow_core::errors::{BurrowError, ExError};
use burrow_core::{SearchLocation, DEFAULT_SCHEMA_EXTENSION};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Dispatch;

/// Everything a container needs to locate its schema and its store
#[derive(Debug, Clone)]
pub struct ContainerConfig {
    schema_name: String,
    extension: String,
    search_location: SearchLocation,
    storage: StorageKind,
    base_directory: PathBuf,
    store_suffix: String,
    dispatch: Option<Dispatch>,
}

impl ContainerConfig {
    pub fn new(schema_name: impl Into<String>) -> Self {
        Self {
            schema_name: schema_name.into(),
            extension: DEFAULT_SCHEMA_EXTENSION.to_string(),
            search_location: SearchLocation::Root,
            storage: StorageKind::Durable,
            base_directory: default_base_directory(),
            store_suffix: DEFAULT_STORE_SUFFIX.to_string(),
            dispatch: None,
        }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn with_search_location(mut self, location: SearchLocation) -> Self {
        self.search_location = location;
        self
    }

    pub fn with_storage(mut self, storage: StorageKind) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_base_directory(mut self, base: impl Into<PathBuf>) -> Self {
        self.base_directory = base.into();
        self
    }

    pub fn with_store_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.store_suffix = suffix.into();
        self
    }

    /// Route this container's log events to `dispatch` instead of the
    /// global subscriber
    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = Some(dispatch);
        self
    }

    pub fn schema_name(&self) -> &str {
        &self.schema_name
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn search_location(&self) -> &SearchLocation {
        &self.search_location
    }

    pub fn storage(&self) -> StorageKind {
        self.storage
    }

    pub fn base_directory(&self) -> &Path {
        &self.base_directory
    }

    pub fn store_suffix(&self) -> &str {
        &self.store_suffix
    }

    pub fn dispatch(&self) -> Option<&Dispatch> {
        self.dispatch.as_ref()
    }

    /// Store placement derived from this configuration
    pub fn descriptor(&self) -> StorageDescriptor {
        match self.storage {
            StorageKind::Durable => StorageDescriptor::Durable(store_path(
                &self.base_directory,
                &self.schema_name,
                &self.store_suffix,
            )),
            StorageKind::Ephemeral => StorageDescriptor::Ephemeral,
        }
    }

    /// Check the names that end up in file paths
    ///
    /// # Errors
    /// `InvalidInput` when the schema name is empty or not a plain file name,
    /// or the extension or store suffix is empty.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| -> ExError {
            BurrowError::InvalidConfiguration { reason }.into()
        };

        if self.schema_name.is_empty() {
            return Err(invalid("schema name must not be empty".to_string()));
        }
        if !is_plain_name(&self.schema_name) {
            return Err(invalid(format!(
                "schema name '{}' must not contain path separators",
                self.schema_name
            )));
        }
        if self.extension.is_empty() || !is_plain_name(&self.extension) {
            return Err(invalid(format!("invalid extension '{}'", self.extension)));
        }
        if self.store_suffix.is_empty() || !is_plain_name(&self.store_suffix) {
            return Err(invalid(format!(
                "invalid store suffix '{}'",
                self.store_suffix
            )));
        }
        Ok(())
    }
}

fn is_plain_name(name: &str) -> bool {
    name != "." && name != ".." && !name.contains(['/', '\\', '\0'])
}

/// Shared flag a caller sets to abandon an in-progress open
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-call limits for `open()`
#[derive(Debug, Clone, Default)]
pub struct OpenOptions {
    timeout: Option<Duration>,
    cancel: Option<CancelToken>,
}

impl OpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn cancel(&self) -> Option<&CancelToken> {
        self.cancel.as_ref()
    }
}

/// Deadline and token of one open attempt, checked between stages
#[derive(Debug, Clone, Default)]
pub struct OpenGuard {
    deadline: Option<Instant>,
    cancel: Option<CancelToken>,
}

impl OpenGuard {
    /// Start the clock for one attempt
    pub fn start(options: &OpenOptions) -> Self {
        Self {
            deadline: options.timeout.map(|t| Instant::now() + t),
            cancel: options.cancel.clone(),
        }
    }

    /// A guard that never fires
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// # Errors
    /// `Cancelled` when the token is set or the deadline has passed.
    pub fn check(&self, stage: &str) -> Result<()> {
        if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            return Err(cancelled(stage, "cancelled"));
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(cancelled(stage, "timed out"));
        }
        Ok(())
    }
}
