//! Table schema descriptors and the record mapping contract.
//!
//! Each durable table is described by a static [`TableSchema`] listing its
//! columns and their semantic types. Domain structs stay plain data; the
//! [`Record`] trait supplies the explicit serialize ([`Record::to_fields`])
//! and deserialize ([`Record::from_row`]) pair that maps them onto rows.
//!
//! Column names that reach SQL text always come from these descriptors,
//! never from caller input: patches and predicates are validated against
//! the schema before a statement is built, and every value is bound as a
//! parameter.

use sqlx::sqlite::SqliteRow;

use crate::error::DbError;

/// Name of the physical record key column present on every table.
pub const ROW_KEY_COLUMN: &str = "row_key";

/// Semantic type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// UTF-8 text.
    Text,
    /// 64-bit signed integer.
    Integer,
    /// Boolean, stored as 0/1.
    Boolean,
}

impl ColumnType {
    /// The `SQLite` type name used in the migration for this column type.
    pub const fn sql_name(self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Integer => "INTEGER",
            Self::Boolean => "BOOLEAN",
        }
    }
}

/// Description of one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSchema {
    /// Column name.
    pub name: &'static str,
    /// Semantic type.
    pub column_type: ColumnType,
    /// Whether the column carries an index.
    pub indexed: bool,
}

impl ColumnSchema {
    const fn new(name: &'static str, column_type: ColumnType) -> Self {
        Self {
            name,
            column_type,
            indexed: false,
        }
    }

    const fn indexed(name: &'static str, column_type: ColumnType) -> Self {
        Self {
            name,
            column_type,
            indexed: true,
        }
    }
}

/// Description of one table (excluding the implicit [`ROW_KEY_COLUMN`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSchema {
    /// Table name.
    pub name: &'static str,
    /// Data columns, in storage order.
    pub columns: &'static [ColumnSchema],
}

impl TableSchema {
    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Comma-separated data column names, in storage order.
    pub fn column_list(&self) -> String {
        self.columns
            .iter()
            .map(|c| c.name)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Check that `column` exists and that `value` fits its type.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidColumn`] on an unknown column or a type
    /// mismatch. `NULL` is accepted for every column.
    pub fn check(&self, column: &str, value: &FieldValue) -> Result<(), DbError> {
        let Some(schema) = self.column(column) else {
            return Err(DbError::InvalidColumn {
                table: self.name,
                column: column.to_owned(),
                reason: "no such column".to_owned(),
            });
        };
        match value.column_type() {
            Some(actual) if actual != schema.column_type => Err(DbError::InvalidColumn {
                table: self.name,
                column: column.to_owned(),
                reason: format!(
                    "expected {}, got {}",
                    schema.column_type.sql_name(),
                    actual.sql_name()
                ),
            }),
            _ => Ok(()),
        }
    }
}

/// The `users` table.
pub const USERS: TableSchema = TableSchema {
    name: "users",
    columns: &[
        ColumnSchema::indexed("id", ColumnType::Text),
        ColumnSchema::indexed("username", ColumnType::Text),
        ColumnSchema::new("avatar_uri", ColumnType::Text),
    ],
};

/// The `posts` table.
pub const POSTS: TableSchema = TableSchema {
    name: "posts",
    columns: &[
        ColumnSchema::indexed("id", ColumnType::Text),
        ColumnSchema::new("content_uri", ColumnType::Text),
        ColumnSchema::new("content_type", ColumnType::Text),
        ColumnSchema::indexed("user_id", ColumnType::Text),
        ColumnSchema::new("likes", ColumnType::Integer),
        ColumnSchema::new("comments", ColumnType::Integer),
        ColumnSchema::new("shares", ColumnType::Integer),
        ColumnSchema::new("liked", ColumnType::Boolean),
        ColumnSchema::new("saved", ColumnType::Boolean),
        ColumnSchema::new("caption", ColumnType::Text),
    ],
};

// ---------------------------------------------------------------------------
// Values, fields, patches, predicates
// ---------------------------------------------------------------------------

/// A single column value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// Text value.
    Text(String),
    /// Integer value.
    Integer(i64),
    /// Boolean value.
    Boolean(bool),
    /// SQL `NULL`.
    Null,
}

impl FieldValue {
    /// The column type this value belongs to, or `None` for `NULL`.
    pub const fn column_type(&self) -> Option<ColumnType> {
        match self {
            Self::Text(_) => Some(ColumnType::Text),
            Self::Integer(_) => Some(ColumnType::Integer),
            Self::Boolean(_) => Some(ColumnType::Boolean),
            Self::Null => None,
        }
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<u32> for FieldValue {
    fn from(v: u32) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

/// Ordered column/value pairs making up a row or a partial row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields {
    entries: Vec<(&'static str, FieldValue)>,
}

impl Fields {
    /// An empty field list.
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append a column value (builder style).
    #[must_use]
    pub fn set(mut self, column: &'static str, value: impl Into<FieldValue>) -> Self {
        self.entries.push((column, value.into()));
        self
    }

    /// Whether no column is set.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of columns set.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterate over the column/value pairs.
    pub fn iter(&self) -> impl Iterator<Item = &(&'static str, FieldValue)> {
        self.entries.iter()
    }

    /// Value set for `column`, if any.
    pub fn get(&self, column: &str) -> Option<&FieldValue> {
        self.entries
            .iter()
            .find(|(name, _)| *name == column)
            .map(|(_, value)| value)
    }

    /// Validate every entry against `schema`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidColumn`] for the first invalid entry.
    pub fn validate(&self, schema: &TableSchema) -> Result<(), DbError> {
        self.entries
            .iter()
            .try_for_each(|(column, value)| schema.check(column, value))
    }

    pub(crate) fn into_entries(self) -> Vec<(&'static str, FieldValue)> {
        self.entries
    }
}

/// A partial update of one record.
pub type Patch = Fields;

/// Row filter for [`crate::LocalStore::query`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// `column = value` (or `column IS NULL` for [`FieldValue::Null`]).
    Eq {
        /// Column to compare.
        column: &'static str,
        /// Value to compare against.
        value: FieldValue,
    },
    /// Conjunction of predicates. An empty list matches every row.
    And(Vec<Predicate>),
}

impl Predicate {
    /// `column = value`.
    pub fn eq(column: &'static str, value: impl Into<FieldValue>) -> Self {
        Self::Eq {
            column,
            value: value.into(),
        }
    }

    /// Conjunction of `self` and `other`.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        match self {
            Self::And(mut all) => {
                all.push(other);
                Self::And(all)
            }
            first @ Self::Eq { .. } => Self::And(vec![first, other]),
        }
    }

    /// Validate every referenced column against `schema`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidColumn`] for the first invalid column.
    pub fn validate(&self, schema: &TableSchema) -> Result<(), DbError> {
        match self {
            Self::Eq { column, value } => schema.check(column, value),
            Self::And(all) => all.iter().try_for_each(|p| p.validate(schema)),
        }
    }
}

/// Physical key of a stored row, assigned on insert.
///
/// Keys grow monotonically, so ordering by key is storage insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordKey(pub i64);

impl core::fmt::Display for RecordKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A record together with the key of the row it was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stored<R> {
    /// Row key.
    pub key: RecordKey,
    /// Decoded record.
    pub record: R,
}

/// Mapping between a plain domain struct and a table row.
pub trait Record: Sized {
    /// The table this record lives in.
    const SCHEMA: &'static TableSchema;

    /// Serialize the record into a full set of column values.
    fn to_fields(&self) -> Fields;

    /// Deserialize a record from a row selected with every schema column.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a column is missing or cannot be decoded.
    fn from_row(row: &SqliteRow) -> Result<Self, DbError>;
}
