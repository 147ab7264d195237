//! Local-first data layer for Snapfeed (`SQLite`).
//!
//! Posts and users live in an on-device `SQLite` database. Every mutation
//! runs inside a [`WriteScope`] (writer lock plus transaction), so a write
//! either applies completely or leaves no trace.
//!
//! # Architecture
//!
//! ```text
//! LocalStore (pool + writer lock)
//!     |
//!     +-- query / count ----------> read connections
//!     |
//!     +-- write() -> WriteScope --> one transaction at a time
//!         |-- create / update / destroy   (generic over Record)
//!         |-- upsert_post / ensure_user
//!         +-- commit (drop = rollback)
//!
//! DedupReconciler --> one WriteScope per pass, latched per process
//! seed           --> one WriteScope for the sample content
//! ```
//!
//! # Modules
//!
//! - [`schema`] -- Table descriptors, field values, predicates, the [`Record`] trait
//! - [`records`] -- [`Record`] mappings for users and posts, typed post patches
//! - [`sqlite`] -- Connection pool, [`LocalStore`] and [`WriteScope`]
//! - [`dedup`] -- Duplicate post reconciliation
//! - [`seed`] -- Sample content
//! - [`error`] -- Shared error types

pub mod dedup;
pub mod error;
pub mod records;
pub mod schema;
pub mod seed;
pub mod sqlite;

// Re-export primary types for convenience.
pub use dedup::{DedupReconciler, ReconcileReport};
pub use error::DbError;
pub use records::PostPatch;
pub use schema::{
    ColumnSchema, ColumnType, FieldValue, Fields, POSTS, Patch, Predicate, ROW_KEY_COLUMN, Record,
    RecordKey, Stored, TableSchema, USERS,
};
pub use seed::{SeedData, SeedReport, sample_content, seed};
pub use sqlite::{ClearReport, IN_MEMORY_URL, LocalStore, SqliteConfig, UpsertOutcome, WriteScope};
