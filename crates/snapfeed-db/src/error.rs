//! Error types for the local store.
//!
//! All errors are propagated via [`DbError`], which wraps the underlying
//! [`sqlx`] errors and adds the store-level conditions (missing relation,
//! missing record, schema violations).

/// Errors that can occur in the data layer.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A `SQLite` operation failed.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] sqlx::Error),

    /// Applying the versioned schema failed.
    #[error("SQLite migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A `belongs_to` lookup found no related record.
    ///
    /// This is an expected condition, not a fatal one: callers such as the
    /// feed projector substitute a fallback record.
    #[error("no {table} record with id {id}")]
    RelationNotFound {
        /// Table that was searched.
        table: &'static str,
        /// Identifier that did not resolve.
        id: String,
    },

    /// An update or destroy targeted a record that does not exist.
    #[error("{table} record {key} not found")]
    RecordNotFound {
        /// Table that was targeted.
        table: &'static str,
        /// Record key or identifier that was targeted.
        key: String,
    },

    /// A patch, predicate or field list named a column the table lacks,
    /// or carried a value of the wrong type.
    #[error("invalid column {column} for table {table}: {reason}")]
    InvalidColumn {
        /// Table the column was checked against.
        table: &'static str,
        /// Offending column name.
        column: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A stored value could not be mapped back into a domain type.
    #[error("cannot decode {table}.{column}: {reason}")]
    Decode {
        /// Table the row came from.
        table: &'static str,
        /// Column that failed to decode.
        column: &'static str,
        /// Why decoding failed.
        reason: String,
    },

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DbError {
    /// Whether this error is the expected "relation not found" condition.
    pub const fn is_relation_not_found(&self) -> bool {
        matches!(self, Self::RelationNotFound { .. })
    }
}
