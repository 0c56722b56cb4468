//! Copy → migrate → swap
//!
//! A migration never writes to the live store file. The store is copied to
//! `{file}.migrating`, the plan runs against the copy, the copy is checked
//! with `PRAGMA integrity_check` and only then renamed over the original.
//! Any failure removes the copy and leaves the original untouched.

use crate::config::OpenGuard;
use crate::db;
use crate::errors::{from_rusqlite, io_error, migration_failed, Result};
use crate::locator::{database_files, staged_path};
use crate::migrations::plan::MigrationPlan;
use crate::migrations::runner::apply_plan;
use burrow_core::errors::{ExError, ExErrorKind};
use burrow_core::SchemaDefinition;
use std::fs;
use std::io;
use std::path::Path;

/// Migrate the store at `original` to `target`
///
/// # Errors
/// `MigrationFailed` wrapping the underlying error, or `Cancelled` when the
/// guard fires between stages. The original file is intact in both cases.
pub fn migrate_staged(
    original: &Path,
    plan: &MigrationPlan,
    target: &SchemaDefinition,
    guard: &OpenGuard,
) -> Result<()> {
    let staged = staged_path(original);

    if let Err(err) = run_stages(original, &staged, plan, target, guard) {
        remove_staged(&staged);
        return Err(as_migration_error(plan, err));
    }
    Ok(())
}

fn run_stages(
    original: &Path,
    staged: &Path,
    plan: &MigrationPlan,
    target: &SchemaDefinition,
    guard: &OpenGuard,
) -> Result<()> {
    guard.check("stage_copy")?;
    stage_copy(original, staged)?;
    guard.check("migrate")?;
    migrate_file(staged, plan, target, guard)?;
    guard.check("swap")?;
    swap(staged, original)
}

/// Write a consistent copy of `original` to `staged`
pub fn stage_copy(original: &Path, staged: &Path) -> Result<()> {
    remove_staged(staged);
    let conn = db::open(original)?;
    conn.execute("VACUUM INTO ?1", [staged.to_string_lossy()])
        .map_err(from_rusqlite)?;
    Ok(())
}

/// Apply `plan` to the staged copy and verify the result
pub fn migrate_file(
    staged: &Path,
    plan: &MigrationPlan,
    target: &SchemaDefinition,
    guard: &OpenGuard,
) -> Result<()> {
    let mut conn = db::open(staged)?;
    db::configure(&conn)?;
    db::enable_wal(&conn)?;
    apply_plan(&mut conn, plan, target, guard)?;

    let verdict = db::integrity_check(&conn)?;
    if verdict != "ok" {
        return Err(migration_failed(
            plan.from_version(),
            plan.to_version(),
            format!("integrity check failed: {}", verdict),
        ));
    }

    // Closing checkpoints the WAL back into the staged file
    conn.close().map_err(|(_, e)| from_rusqlite(e))?;
    Ok(())
}

/// Atomically replace `original` with `staged`
pub fn swap(staged: &Path, original: &Path) -> Result<()> {
    fs::rename(staged, original).map_err(|e| io_error("swap_store", e))
}

/// Remove a staged copy and its WAL side files, ignoring missing ones
pub fn remove_staged(staged: &Path) {
    for path in database_files(staged) {
        if let Err(e) = fs::remove_file(&path) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!(path = %path.display(), error = %e, "could not remove staged file");
            }
        }
    }
}

fn as_migration_error(plan: &MigrationPlan, err: ExError) -> ExError {
    match err.kind() {
        ExErrorKind::Cancelled | ExErrorKind::MigrationFailed => err,
        _ => migration_failed(plan.from_version(), plan.to_version(), err.message())
            .with_source(err),
    }
}
