//! Session handle over an open store
//!
//! One writer connection behind a mutex serializes write transactions.
//! Durable stores serve reads from a pool of read-only connections, each
//! read running in its own snapshot; ephemeral stores have a single private
//! connection, so their reads go through the writer.

use crate::db;
use crate::errors::{from_rusqlite, invalid_state, Result};
use crate::filter::Filter;
use crate::locator::StorageDescriptor;
use crate::registry::LocatorLease;
use crate::repo::RecordRepo;
use burrow_core::{Fields, Record, RecordId, SchemaDefinition};
use rusqlite::{Connection, TransactionBehavior};
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Idle read connections kept per handle
const MAX_IDLE_READERS: usize = 4;

/// Cloneable reference to one open store session
///
/// Clones share the session; after the owning container closes it, every
/// operation fails with `InvalidState`.
#[derive(Clone)]
pub struct StoreHandle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    schema: Arc<SchemaDefinition>,
    descriptor: StorageDescriptor,
    writer: Mutex<Option<Connection>>,
    readers: Mutex<Vec<Connection>>,
    closed: AtomicBool,
    lease: Mutex<Option<LocatorLease>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl StoreHandle {
    pub(crate) fn new(
        schema: Arc<SchemaDefinition>,
        descriptor: StorageDescriptor,
        writer: Connection,
        lease: Option<LocatorLease>,
    ) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                schema,
                descriptor,
                writer: Mutex::new(Some(writer)),
                readers: Mutex::new(Vec::new()),
                closed: AtomicBool::new(false),
                lease: Mutex::new(lease),
            }),
        }
    }

    pub fn schema(&self) -> &SchemaDefinition {
        &self.inner.schema
    }

    pub fn descriptor(&self) -> &StorageDescriptor {
        &self.inner.descriptor
    }

    /// File path, or the null device sentinel for ephemeral stores
    pub fn locator(&self) -> String {
        self.inner.descriptor.locator()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Run `f` in one write transaction: `Ok` commits, `Err` rolls back
    ///
    /// On ephemeral stores `f` must not call back into the handle; use the
    /// reads on `WriteTxn`.
    ///
    /// # Errors
    /// `InvalidState` once closed, otherwise whatever `f` or the commit
    /// returns.
    pub fn write<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&WriteTxn<'_>) -> Result<T>,
    {
        self.ensure_open("write")?;
        let mut writer = lock(&self.inner.writer);
        let conn = writer
            .as_mut()
            .ok_or_else(|| invalid_state("write", "closed"))?;

        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(from_rusqlite)?;
        let result = f(&WriteTxn {
            read: ReadTxn {
                conn: &tx,
                schema: &self.inner.schema,
            },
        });

        match result {
            Ok(value) => {
                tx.commit().map_err(from_rusqlite)?;
                Ok(value)
            }
            Err(err) => {
                tx.rollback().map_err(from_rusqlite)?;
                Err(err)
            }
        }
    }

    /// Run `f` against a snapshot of the last committed state
    ///
    /// # Errors
    /// `InvalidState` once closed, otherwise whatever `f` returns.
    pub fn read<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&ReadTxn<'_>) -> Result<T>,
    {
        self.ensure_open("read")?;
        match &self.inner.descriptor {
            StorageDescriptor::Durable(path) => {
                let pooled = lock(&self.inner.readers).pop();
                let mut conn = match pooled {
                    Some(conn) => conn,
                    None => db::open_read_only(path)?,
                };
                let result = run_read(&mut conn, &self.inner.schema, f);
                self.release_reader(conn);
                result
            }
            StorageDescriptor::Ephemeral => {
                let mut writer = lock(&self.inner.writer);
                let conn = writer
                    .as_mut()
                    .ok_or_else(|| invalid_state("read", "closed"))?;
                run_read(conn, &self.inner.schema, f)
            }
        }
    }

    fn release_reader(&self, conn: Connection) {
        if self.is_closed() {
            return;
        }
        let mut readers = lock(&self.inner.readers);
        if readers.len() < MAX_IDLE_READERS {
            readers.push(conn);
        }
    }

    fn ensure_open(&self, op: &str) -> Result<()> {
        if self.is_closed() {
            return Err(invalid_state(op, "the store is closed").with_locator(self.locator()));
        }
        Ok(())
    }

    /// Close the session: readers first, then the writer, then the lease
    pub(crate) fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        lock(&self.inner.readers).clear();
        // Waits for an in-flight write to finish
        lock(&self.inner.writer).take();
        lock(&self.inner.lease).take();
    }
}

impl std::fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreHandle")
            .field("schema", &self.inner.schema.name())
            .field("locator", &self.locator())
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn run_read<T, F>(conn: &mut Connection, schema: &SchemaDefinition, f: F) -> Result<T>
where
    F: FnOnce(&ReadTxn<'_>) -> Result<T>,
{
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Deferred)
        .map_err(from_rusqlite)?;
    let result = f(&ReadTxn { conn: &tx, schema });
    // Nothing to keep from a read
    tx.rollback().map_err(from_rusqlite)?;
    result
}

/// Read access inside a transaction
pub struct ReadTxn<'a> {
    conn: &'a Connection,
    schema: &'a SchemaDefinition,
}

impl<'a> ReadTxn<'a> {
    pub fn schema(&self) -> &SchemaDefinition {
        self.schema
    }

    pub fn get(&self, entity: &str, id: RecordId) -> Result<Option<Record>> {
        RecordRepo::get(self.conn, self.schema, entity, id)
    }

    pub fn fetch_all(&self, entity: &str) -> Result<Vec<Record>> {
        RecordRepo::fetch_all(self.conn, self.schema, entity)
    }

    pub fn fetch_where(&self, entity: &str, filter: &Filter) -> Result<Vec<Record>> {
        RecordRepo::fetch_where(self.conn, self.schema, entity, filter)
    }

    pub fn count(&self, entity: &str) -> Result<u64> {
        RecordRepo::count(self.conn, self.schema, entity)
    }

    pub fn count_where(&self, entity: &str, filter: &Filter) -> Result<u64> {
        RecordRepo::count_where(self.conn, self.schema, entity, filter)
    }
}

/// Write access inside a transaction; derefs to the read operations
pub struct WriteTxn<'a> {
    read: ReadTxn<'a>,
}

impl<'a> WriteTxn<'a> {
    pub fn insert(&self, entity: &str, fields: &Fields) -> Result<RecordId> {
        RecordRepo::insert(self.read.conn, self.read.schema, entity, fields)
    }

    pub fn update(&self, entity: &str, id: RecordId, fields: &Fields) -> Result<()> {
        RecordRepo::update(self.read.conn, self.read.schema, entity, id, fields)
    }

    pub fn delete(&self, entity: &str, id: RecordId) -> Result<bool> {
        RecordRepo::delete(self.read.conn, self.read.schema, entity, id)
    }

    /// Batch delete; returns the number of records removed
    pub fn delete_where(&self, entity: &str, filter: &Filter) -> Result<usize> {
        RecordRepo::delete_where(self.read.conn, self.read.schema, entity, filter)
    }
}

impl<'a> Deref for WriteTxn<'a> {
    type Target = ReadTxn<'a>;

    fn deref(&self) -> &Self::Target {
        &self.read
    }
}
