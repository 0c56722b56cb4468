//! The persistence container
//!
//! Owns one configuration, one loaded schema and at most one open store
//! handle. `open()` is the only call that advances the state machine:
//!
//! ```text
//! Unconfigured -> Configured -> Opening -> { Open, Failed }
//! Open --close()--> Configured        Failed --open()--> Opening
//! ```

use crate::config::{ContainerConfig, OpenGuard, OpenOptions};
use crate::db;
use crate::errors::{already_open, invalid_state, store_unreadable, Result};
use crate::handle::StoreHandle;
use crate::locator::{database_files, StorageDescriptor};
use crate::migrations::{self, MigrationPlan, StoreStatus};
use crate::registry::LocatorLease;
use burrow_core::errors::{ExError, ExErrorKind};
use burrow_core::{log_op_end, log_op_error, log_op_start, SchemaDefinition, SchemaLoader};
use burrow_core_types::AttemptId;
use rusqlite::Connection;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::Dispatch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerState {
    Unconfigured,
    Configured,
    Opening,
    Open,
    Failed,
}

impl fmt::Display for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContainerState::Unconfigured => "unconfigured",
            ContainerState::Configured => "configured",
            ContainerState::Opening => "opening",
            ContainerState::Open => "open",
            ContainerState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Embedded persistence container
pub struct PersistenceContainer {
    loader: SchemaLoader,
    config: Option<ContainerConfig>,
    state: ContainerState,
    schema: Option<Arc<SchemaDefinition>>,
    handle: Option<StoreHandle>,
    last_error: Option<ExError>,
}

impl PersistenceContainer {
    /// An unconfigured container resolving schemas through `loader`
    pub fn new(loader: SchemaLoader) -> Self {
        Self {
            loader,
            config: None,
            state: ContainerState::Unconfigured,
            schema: None,
            handle: None,
            last_error: None,
        }
    }

    /// Shorthand for `new` followed by `configure`
    ///
    /// # Errors
    /// `InvalidInput` when the configuration is rejected.
    pub fn with_config(loader: SchemaLoader, config: ContainerConfig) -> Result<Self> {
        let mut container = Self::new(loader);
        container.configure(config)?;
        Ok(container)
    }

    /// Replace the configuration; touches neither the filesystem nor a store
    ///
    /// # Errors
    /// - `InvalidState` while the container is open
    /// - `InvalidInput` when the configuration is rejected
    pub fn configure(&mut self, config: ContainerConfig) -> Result<()> {
        if matches!(self.state, ContainerState::Open | ContainerState::Opening) {
            return Err(invalid_state("configure", self.state));
        }
        config.validate()?;

        self.config = Some(config);
        self.state = ContainerState::Configured;
        self.schema = None;
        self.last_error = None;
        Ok(())
    }

    /// Open with no deadline and no cancel token
    ///
    /// # Errors
    /// See [`PersistenceContainer::open_with`].
    pub fn open(&mut self) -> Result<StoreHandle> {
        self.open_with(&OpenOptions::default())
    }

    /// Load the schema, place the store, migrate it if needed and hand back
    /// a session handle
    ///
    /// # Errors
    /// - `InvalidState` before `configure`
    /// - `AlreadyOpen` when this container is open, or another handle in the
    ///   process holds the store
    /// - `SchemaNotFound` / `SchemaInvalid` from schema loading
    /// - `StoreUnreadable`, `MigrationFailed` or `Cancelled` from opening
    ///
    /// Once the attempt has started, a failure leaves the container `Failed`
    /// with the error kept in [`PersistenceContainer::last_error`].
    pub fn open_with(&mut self, options: &OpenOptions) -> Result<StoreHandle> {
        let config = match (self.state, &self.config) {
            (ContainerState::Open, Some(config)) => {
                return Err(already_open(&config.descriptor().locator()));
            }
            (ContainerState::Configured | ContainerState::Failed, Some(config)) => config.clone(),
            (state, _) => return Err(invalid_state("open", state)),
        };

        let dispatch = config.dispatch().cloned();
        with_dispatch(dispatch.as_ref(), || self.open_attempt(&config, options))
    }

    fn open_attempt(
        &mut self,
        config: &ContainerConfig,
        options: &OpenOptions,
    ) -> Result<StoreHandle> {
        let attempt = AttemptId::new();
        let descriptor = config.descriptor();
        let locator = descriptor.locator();
        let start = Instant::now();

        self.state = ContainerState::Opening;
        log_op_start!(
            "open",
            schema_name = config.schema_name(),
            storage = %descriptor.kind(),
            locator = %locator,
            attempt_id = attempt.as_str()
        );

        let guard = OpenGuard::start(options);
        match open_store(&self.loader, config, &descriptor, &guard) {
            Ok((handle, schema)) => {
                log_op_end!(
                    "open",
                    duration_ms = start.elapsed().as_millis() as u64,
                    schema_version = schema.version(),
                    attempt_id = attempt.as_str()
                );
                self.state = ContainerState::Open;
                self.schema = Some(schema);
                self.handle = Some(handle.clone());
                self.last_error = None;
                Ok(handle)
            }
            Err(err) => {
                let err = with_context(err, config.schema_name(), &locator, &attempt);
                log_op_error!(
                    "open",
                    err.clone(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    attempt_id = attempt.as_str()
                );
                self.state = ContainerState::Failed;
                self.schema = None;
                self.last_error = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Release the handle; the next `open()` starts from scratch
    ///
    /// Closing a configured or failed container does nothing.
    ///
    /// # Errors
    /// `InvalidState` before `configure`.
    pub fn close(&mut self) -> Result<()> {
        match self.state {
            ContainerState::Unconfigured => return Err(invalid_state("close", self.state)),
            ContainerState::Open => {}
            _ => return Ok(()),
        }

        let dispatch = self.config.as_ref().and_then(|c| c.dispatch().cloned());
        with_dispatch(dispatch.as_ref(), || {
            let start = Instant::now();
            let locator = self
                .handle
                .as_ref()
                .map(StoreHandle::locator)
                .unwrap_or_default();
            log_op_start!("close", locator = %locator);

            if let Some(handle) = self.handle.take() {
                handle.close();
            }
            self.schema = None;
            self.state = ContainerState::Configured;

            log_op_end!("close", duration_ms = start.elapsed().as_millis() as u64);
        });
        Ok(())
    }

    pub fn state(&self) -> ContainerState {
        self.state
    }

    /// Error of the last failed `open()`, cleared by a successful one
    pub fn last_error(&self) -> Option<&ExError> {
        self.last_error.as_ref()
    }

    pub fn config(&self) -> Option<&ContainerConfig> {
        self.config.as_ref()
    }

    /// Schema loaded by the current open session
    pub fn schema(&self) -> Option<Arc<SchemaDefinition>> {
        self.schema.clone()
    }

    /// Handle of the current open session
    pub fn handle(&self) -> Option<StoreHandle> {
        self.handle.clone()
    }
}

impl Drop for PersistenceContainer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.close();
        }
    }
}

impl fmt::Debug for PersistenceContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistenceContainer")
            .field("state", &self.state)
            .field("config", &self.config)
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

fn with_dispatch<T>(dispatch: Option<&Dispatch>, f: impl FnOnce() -> T) -> T {
    match dispatch {
        Some(dispatch) => tracing::dispatcher::with_default(dispatch, f),
        None => f(),
    }
}

fn with_context(err: ExError, schema_name: &str, locator: &str, attempt: &AttemptId) -> ExError {
    let mut err = err.with_attempt_id(attempt.clone());
    if err.schema_name().is_none() {
        err = err.with_schema_name(schema_name);
    }
    if err.locator().is_none() {
        err = err.with_locator(locator);
    }
    err
}

fn open_store(
    loader: &SchemaLoader,
    config: &ContainerConfig,
    descriptor: &StorageDescriptor,
    guard: &OpenGuard,
) -> Result<(StoreHandle, Arc<SchemaDefinition>)> {
    guard.check("load_schema")?;
    let schema = Arc::new(loader.load(
        config.schema_name(),
        config.extension(),
        config.search_location(),
    )?);

    guard.check("open_store")?;
    let handle = match descriptor {
        StorageDescriptor::Ephemeral => open_ephemeral(&schema, guard)?,
        StorageDescriptor::Durable(path) => open_durable(path, &schema, guard)?,
    };
    Ok((handle, schema))
}

fn open_ephemeral(schema: &Arc<SchemaDefinition>, guard: &OpenGuard) -> Result<StoreHandle> {
    let mut conn = db::open_in_memory()?;
    db::configure(&conn)?;
    guard.check("initialize")?;
    migrations::initialize(&mut conn, schema)?;
    Ok(StoreHandle::new(
        Arc::clone(schema),
        StorageDescriptor::Ephemeral,
        conn,
        None,
    ))
}

fn open_durable(
    path: &Path,
    schema: &Arc<SchemaDefinition>,
    guard: &OpenGuard,
) -> Result<StoreHandle> {
    let locator = path.display().to_string();

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            store_unreadable(&locator, format!("cannot create {}: {}", parent.display(), e))
        })?;
    }
    let lease = LocatorLease::acquire(path).map_err(|e| match e.kind() {
        ExErrorKind::AlreadyOpen => e,
        _ => unreadable(&locator, e),
    })?;

    let existed = path.exists();
    match open_durable_file(path, schema, guard, &locator) {
        Ok(conn) => Ok(StoreHandle::new(
            Arc::clone(schema),
            StorageDescriptor::Durable(path.to_path_buf()),
            conn,
            Some(lease),
        )),
        Err(err) => {
            // Leave nothing behind for a store this attempt created
            if !existed {
                for file in database_files(path) {
                    let _ = fs::remove_file(file);
                }
            }
            Err(err)
        }
    }
}

fn open_durable_file(
    path: &Path,
    schema: &SchemaDefinition,
    guard: &OpenGuard,
    locator: &str,
) -> Result<Connection> {
    let mut conn = open_writer(path, locator)?;
    let status = migrations::inspect(&conn, schema, locator).map_err(|e| match e.kind() {
        ExErrorKind::Persistence => unreadable(locator, e),
        _ => e,
    })?;

    // Nothing is written before the file is known to be this store
    let conn = match status {
        StoreStatus::Current => conn,
        StoreStatus::Empty => {
            guard.check("initialize")?;
            migrations::initialize(&mut conn, schema)?;
            conn
        }
        StoreStatus::Outdated(plan) => {
            // The swap replaces the file under this connection. Once it has
            // happened the store is migrated, so the guard is not consulted
            // again for this attempt.
            drop(conn);
            run_migration(path, &plan, schema, guard)?;
            open_writer(path, locator)?
        }
    };
    enable_wal(&conn, locator)?;
    Ok(conn)
}

fn open_writer(path: &Path, locator: &str) -> Result<Connection> {
    let conn = db::open(path).map_err(|e| unreadable(locator, e))?;
    db::configure(&conn).map_err(|e| unreadable(locator, e))?;
    Ok(conn)
}

fn enable_wal(conn: &Connection, locator: &str) -> Result<()> {
    db::enable_wal(conn).map_err(|e| unreadable(locator, e))
}

fn unreadable(locator: &str, err: ExError) -> ExError {
    store_unreadable(locator, err.message()).with_source(err)
}

fn run_migration(
    path: &Path,
    plan: &MigrationPlan,
    schema: &SchemaDefinition,
    guard: &OpenGuard,
) -> Result<()> {
    let start = Instant::now();
    log_op_start!(
        "migrate",
        schema_name = schema.name(),
        from_version = plan.from_version(),
        to_version = plan.to_version(),
        steps = plan.steps()
    );

    match migrations::migrate_staged(path, plan, schema, guard) {
        Ok(()) => {
            log_op_end!(
                "migrate",
                duration_ms = start.elapsed().as_millis() as u64,
                from_version = plan.from_version(),
                to_version = plan.to_version()
            );
            Ok(())
        }
        Err(err) => {
            log_op_error!(
                "migrate",
                err.clone(),
                duration_ms = start.elapsed().as_millis() as u64
            );
            Err(err)
        }
    }
}
