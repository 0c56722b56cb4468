//! Repository layer for reading and writing records in SQLite

pub mod hydration;
pub mod record_repo;

pub use record_repo::RecordRepo;
