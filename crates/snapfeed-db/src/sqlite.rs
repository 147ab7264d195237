//! `SQLite` local store: connection pool, scoped write transactions and the
//! record-level operations built on them.
//!
//! Uses [`sqlx`] with runtime query construction (not compile-time checked)
//! so no database is needed at build time. Statement text is assembled from
//! the static [`TableSchema`] descriptors only; every value is bound.
//!
//! All mutations go through a [`WriteScope`]. A scope holds the store-wide
//! writer lock together with an open transaction, so writes from concurrent
//! tasks apply one at a time and either land completely or not at all.
//!
//! An in-memory database lives inside a single connection. Its pool is
//! therefore capped at one connection, and a task holding a [`WriteScope`]
//! must do its reads through that scope rather than through the store.

use std::sync::Arc;
use std::time::Duration;

use snapfeed_types::{Post, PostId, User, UserId};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection, SqlitePool, Transaction};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::DbError;
use crate::records::PostPatch;
use crate::schema::{
    FieldValue, Fields, POSTS, Patch, Predicate, ROW_KEY_COLUMN, Record, RecordKey, Stored,
    TableSchema, USERS,
};

/// Default maximum number of connections in the pool.
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Default connection acquire timeout in seconds.
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// URL of a private in-memory database.
pub const IN_MEMORY_URL: &str = "sqlite::memory:";

/// Configuration for the `SQLite` connection pool.
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// `SQLite` connection URL.
    ///
    /// Format: `sqlite://path/to/file.db` or `sqlite::memory:`
    pub url: String,
    /// Maximum number of connections in the pool.
    pub max_connections: u32,
    /// Connection acquire timeout.
    pub connect_timeout: Duration,
}

impl SqliteConfig {
    /// Create a new configuration from a database URL.
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_owned(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }

    /// Configuration for a private in-memory database.
    pub fn in_memory() -> Self {
        Self::new(IN_MEMORY_URL)
    }

    /// Set the maximum number of connections.
    #[must_use]
    pub const fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the connection acquire timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Whether the URL names an in-memory database.
    pub fn is_in_memory(&self) -> bool {
        self.url.contains(":memory:") || self.url.contains("mode=memory")
    }
}

/// Result of [`LocalStore::upsert_post`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// No row carried the post id; a new row was inserted.
    Inserted(RecordKey),
    /// This many existing rows carrying the post id were overwritten.
    Updated(u64),
}

/// Rows removed by [`LocalStore::clear_all`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClearReport {
    /// Post rows destroyed.
    pub posts: u64,
    /// User rows destroyed.
    pub users: u64,
}

/// Handle to the local `SQLite` store.
///
/// Cheap to clone; clones share the pool and the writer lock.
#[derive(Clone)]
pub struct LocalStore {
    pool: SqlitePool,
    writer: Arc<Mutex<()>>,
}

impl LocalStore {
    /// Connect to `SQLite` using the provided configuration.
    ///
    /// The database file is created if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the connection fails.
    /// Returns [`DbError::Config`] if the URL cannot be parsed.
    pub async fn connect(config: &SqliteConfig) -> Result<Self, DbError> {
        let connect_options: SqliteConnectOptions = config
            .url
            .parse()
            .map_err(|e: sqlx::Error| DbError::Config(format!("Invalid database URL: {e}")))?;
        let connect_options = connect_options.create_if_missing(true);

        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.connect_timeout);
        if config.is_in_memory() {
            pool_options = pool_options
                .max_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>);
        }

        let pool = pool_options.connect_with(connect_options).await?;

        tracing::info!(
            url = %config.url,
            in_memory = config.is_in_memory(),
            "Connected to SQLite"
        );

        Ok(Self {
            pool,
            writer: Arc::new(Mutex::new(())),
        })
    }

    /// Connect using a database URL string with default pool settings.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the connection fails.
    pub async fn connect_url(url: &str) -> Result<Self, DbError> {
        Self::connect(&SqliteConfig::new(url)).await
    }

    /// Apply all pending migrations from the `migrations/` directory.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Migration`] if any migration fails.
    pub async fn run_migrations(&self) -> Result<(), DbError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::info!("Database migrations completed");
        Ok(())
    }

    /// Return a reference to the underlying [`SqlitePool`].
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close all connections in the pool gracefully.
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("SQLite pool closed");
    }

    /// Open a write scope: take the writer lock, then begin a transaction.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the transaction cannot be started.
    /// The writer lock is released again in that case.
    pub async fn write(&self) -> Result<WriteScope, DbError> {
        let guard = Arc::clone(&self.writer).lock_owned().await;
        let tx = self.pool.begin().await?;
        Ok(WriteScope { tx, _guard: guard })
    }

    // -----------------------------------------------------------------------
    // Generic record operations
    // -----------------------------------------------------------------------

    /// Fetch every record matching `predicate` (all records if `None`), in
    /// storage insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidColumn`] for a predicate on an unknown
    /// column, or [`DbError`] if the query or decoding fails.
    pub async fn query<R: Record>(
        &self,
        predicate: Option<&Predicate>,
    ) -> Result<Vec<Stored<R>>, DbError> {
        let mut conn = self.pool.acquire().await?;
        select::<R>(&mut *conn, predicate).await
    }

    /// Count records matching `predicate`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    pub async fn count<R: Record>(&self, predicate: Option<&Predicate>) -> Result<u64, DbError> {
        let mut conn = self.pool.acquire().await?;
        count_rows(&mut *conn, R::SCHEMA, predicate).await
    }

    /// Insert a record in its own write scope.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the insert fails; nothing is written.
    pub async fn create<R: Record>(&self, record: &R) -> Result<RecordKey, DbError> {
        let mut scope = self.write().await?;
        let key = scope.create(record).await?;
        scope.commit().await?;
        Ok(key)
    }

    /// Apply `patch` to the record at `key` in its own write scope.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::RecordNotFound`] if no row has that key.
    pub async fn update<R: Record>(&self, key: RecordKey, patch: Patch) -> Result<(), DbError> {
        let mut scope = self.write().await?;
        scope.update::<R>(key, patch).await?;
        scope.commit().await
    }

    /// Destroy the record at `key` in its own write scope.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::RecordNotFound`] if no row has that key.
    pub async fn destroy<R: Record>(&self, key: RecordKey) -> Result<(), DbError> {
        let mut scope = self.write().await?;
        scope.destroy::<R>(key).await?;
        scope.commit().await
    }

    // -----------------------------------------------------------------------
    // Users
    // -----------------------------------------------------------------------

    /// Resolve the `belongs_to` relation from a post to its author.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::RelationNotFound`] if no user has this id.
    pub async fn resolve_user(&self, user_id: &UserId) -> Result<User, DbError> {
        let predicate = Predicate::eq("id", user_id.as_str());
        self.query::<User>(Some(&predicate))
            .await?
            .into_iter()
            .next()
            .map(|stored| stored.record)
            .ok_or_else(|| DbError::RelationNotFound {
                table: USERS.name,
                id: user_id.to_string(),
            })
    }

    /// Look up a user by username.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    pub async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, DbError> {
        let predicate = Predicate::eq("username", username);
        Ok(self
            .query::<User>(Some(&predicate))
            .await?
            .into_iter()
            .next()
            .map(|stored| stored.record))
    }

    /// Return the user named `username`, creating it with a fresh id and
    /// `avatar_uri` if it does not exist yet. Lookup and insert share one
    /// write scope.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the lookup or insert fails.
    pub async fn find_or_create_user(
        &self,
        username: &str,
        avatar_uri: &str,
    ) -> Result<User, DbError> {
        let mut scope = self.write().await?;
        let predicate = Predicate::eq("username", username);
        if let Some(existing) = scope.query::<User>(Some(&predicate)).await?.into_iter().next() {
            scope.commit().await?;
            return Ok(existing.record);
        }

        let user = User {
            id: UserId::generate(),
            username: username.to_owned(),
            avatar_uri: avatar_uri.to_owned(),
        };
        scope.create(&user).await?;
        scope.commit().await?;
        tracing::info!(user_id = %user.id, username, "Created user");
        Ok(user)
    }

    // -----------------------------------------------------------------------
    // Posts
    // -----------------------------------------------------------------------

    /// Insert `post`, or overwrite every row carrying its id.
    ///
    /// When `author` is given and no user with its id exists, the author is
    /// inserted in the same write scope.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if any statement fails; nothing is written.
    pub async fn upsert_post(
        &self,
        post: &Post,
        author: Option<&User>,
    ) -> Result<UpsertOutcome, DbError> {
        let mut scope = self.write().await?;
        if let Some(user) = author {
            scope.ensure_user(user).await?;
        }
        let outcome = scope.upsert_post(post).await?;
        scope.commit().await?;
        Ok(outcome)
    }

    /// Upsert a batch of posts in one write scope.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if any statement fails; nothing is written.
    pub async fn upsert_posts(&self, posts: &[Post]) -> Result<usize, DbError> {
        let mut scope = self.write().await?;
        for post in posts {
            scope.upsert_post(post).await?;
        }
        scope.commit().await?;
        Ok(posts.len())
    }

    /// Apply an interaction patch to every row carrying `post_id`.
    ///
    /// Returns the number of rows updated. An empty patch writes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::RecordNotFound`] if no row carries `post_id`.
    pub async fn apply_post_patch(
        &self,
        post_id: &PostId,
        patch: &PostPatch,
    ) -> Result<u64, DbError> {
        if patch.is_empty() {
            return Ok(0);
        }
        let mut scope = self.write().await?;
        let predicate = Predicate::eq("id", post_id.as_str());
        let updated = scope
            .update_where::<Post>(&predicate, patch.into_patch())
            .await?;
        if updated == 0 {
            return Err(DbError::RecordNotFound {
                table: POSTS.name,
                key: post_id.to_string(),
            });
        }
        scope.commit().await?;
        tracing::debug!(post_id = %post_id, rows = updated, "Applied post patch");
        Ok(updated)
    }

    /// Destroy every post, then every user, in one write scope.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if either delete fails; nothing is removed.
    pub async fn clear_all(&self) -> Result<ClearReport, DbError> {
        let mut scope = self.write().await?;
        let posts = scope.destroy_where::<Post>(None).await?;
        let users = scope.destroy_where::<User>(None).await?;
        scope.commit().await?;
        tracing::info!(posts, users, "Cleared local store");
        Ok(ClearReport { posts, users })
    }
}

/// An open write transaction holding the store-wide writer lock.
///
/// Changes become visible to other readers on [`WriteScope::commit`].
/// Dropping the scope without committing rolls the transaction back and
/// releases the lock, including on early return through `?`.
pub struct WriteScope {
    // Field order matters: the transaction rolls back before the lock is
    // released.
    tx: Transaction<'static, Sqlite>,
    _guard: OwnedMutexGuard<()>,
}

impl WriteScope {
    /// Insert a record and return its key.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the insert fails.
    pub async fn create<R: Record>(&mut self, record: &R) -> Result<RecordKey, DbError> {
        insert(&mut *self.tx, R::SCHEMA, record.to_fields()).await
    }

    /// Fetch records matching `predicate`, seeing this scope's own writes.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query or decoding fails.
    pub async fn query<R: Record>(
        &mut self,
        predicate: Option<&Predicate>,
    ) -> Result<Vec<Stored<R>>, DbError> {
        select::<R>(&mut *self.tx, predicate).await
    }

    /// Apply `patch` to the record at `key`. An empty patch is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::RecordNotFound`] if no row has that key.
    pub async fn update<R: Record>(&mut self, key: RecordKey, patch: Patch) -> Result<(), DbError> {
        if patch.is_empty() {
            return Ok(());
        }
        let updated = update_rows(&mut *self.tx, R::SCHEMA, &key_predicate(key), patch).await?;
        if updated == 0 {
            return Err(not_found(R::SCHEMA, key));
        }
        Ok(())
    }

    /// Apply `patch` to every record matching `predicate`; returns the
    /// number of rows changed.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the update fails.
    pub async fn update_where<R: Record>(
        &mut self,
        predicate: &Predicate,
        patch: Patch,
    ) -> Result<u64, DbError> {
        if patch.is_empty() {
            return Ok(0);
        }
        predicate.validate(R::SCHEMA)?;
        update_rows(&mut *self.tx, R::SCHEMA, &Filter::Predicate(predicate), patch).await
    }

    /// Destroy the record at `key`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::RecordNotFound`] if no row has that key.
    pub async fn destroy<R: Record>(&mut self, key: RecordKey) -> Result<(), DbError> {
        let removed = delete_rows(&mut *self.tx, R::SCHEMA, &key_predicate(key)).await?;
        if removed == 0 {
            return Err(not_found(R::SCHEMA, key));
        }
        Ok(())
    }

    /// Destroy every record matching `predicate` (all records if `None`);
    /// returns the number of rows removed.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the delete fails.
    pub async fn destroy_where<R: Record>(
        &mut self,
        predicate: Option<&Predicate>,
    ) -> Result<u64, DbError> {
        let filter = match predicate {
            Some(p) => {
                p.validate(R::SCHEMA)?;
                Filter::Predicate(p)
            }
            None => Filter::All,
        };
        delete_rows(&mut *self.tx, R::SCHEMA, &filter).await
    }

    /// Insert `user` unless a user with its id already exists.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the lookup or insert fails.
    pub async fn ensure_user(&mut self, user: &User) -> Result<(), DbError> {
        let predicate = Predicate::eq("id", user.id.as_str());
        if self.query::<User>(Some(&predicate)).await?.is_empty() {
            self.create(user).await?;
        }
        Ok(())
    }

    /// Insert `post`, or overwrite every row carrying its id.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a statement fails.
    pub async fn upsert_post(&mut self, post: &Post) -> Result<UpsertOutcome, DbError> {
        let predicate = Predicate::eq("id", post.id.as_str());
        let updated = self
            .update_where::<Post>(&predicate, post.to_fields())
            .await?;
        if updated > 0 {
            return Ok(UpsertOutcome::Updated(updated));
        }
        let key = self.create(post).await?;
        Ok(UpsertOutcome::Inserted(key))
    }

    /// Commit the transaction, then release the writer lock.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the commit fails; the transaction is
    /// rolled back in that case.
    pub async fn commit(self) -> Result<(), DbError> {
        self.tx.commit().await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Statement builders
// ---------------------------------------------------------------------------

/// Row selection for update and delete statements.
enum Filter<'p> {
    All,
    Key(RecordKey),
    Predicate(&'p Predicate),
}

const fn key_predicate(key: RecordKey) -> Filter<'static> {
    Filter::Key(key)
}

fn not_found(schema: &TableSchema, key: RecordKey) -> DbError {
    DbError::RecordNotFound {
        table: schema.name,
        key: key.to_string(),
    }
}

fn push_value(builder: &mut QueryBuilder<'_, Sqlite>, value: FieldValue) {
    match value {
        FieldValue::Text(v) => {
            builder.push_bind(v);
        }
        FieldValue::Integer(v) => {
            builder.push_bind(v);
        }
        FieldValue::Boolean(v) => {
            builder.push_bind(v);
        }
        FieldValue::Null => {
            builder.push("NULL");
        }
    }
}

fn push_condition(builder: &mut QueryBuilder<'_, Sqlite>, predicate: &Predicate) {
    match predicate {
        Predicate::Eq {
            column,
            value: FieldValue::Null,
        } => {
            builder.push(*column).push(" IS NULL");
        }
        Predicate::Eq { column, value } => {
            builder.push(*column).push(" = ");
            push_value(builder, value.clone());
        }
        Predicate::And(all) if all.is_empty() => {
            builder.push("1 = 1");
        }
        Predicate::And(all) => {
            builder.push("(");
            let mut first = true;
            for inner in all {
                if !first {
                    builder.push(" AND ");
                }
                first = false;
                push_condition(builder, inner);
            }
            builder.push(")");
        }
    }
}

fn push_filter(builder: &mut QueryBuilder<'_, Sqlite>, filter: &Filter<'_>) {
    match filter {
        Filter::All => {}
        Filter::Key(key) => {
            builder.push(format!(" WHERE {ROW_KEY_COLUMN} = "));
            builder.push_bind(key.0);
        }
        Filter::Predicate(predicate) => {
            builder.push(" WHERE ");
            push_condition(builder, predicate);
        }
    }
}

async fn insert(
    conn: &mut SqliteConnection,
    schema: &TableSchema,
    fields: Fields,
) -> Result<RecordKey, DbError> {
    fields.validate(schema)?;
    let entries = fields.into_entries();

    let mut builder = QueryBuilder::<Sqlite>::new(format!("INSERT INTO {}", schema.name));
    if entries.is_empty() {
        builder.push(" DEFAULT VALUES");
    } else {
        let columns = entries
            .iter()
            .map(|(column, _)| *column)
            .collect::<Vec<_>>()
            .join(", ");
        builder.push(format!(" ({columns}) VALUES ("));
        let mut first = true;
        for (_, value) in entries {
            if !first {
                builder.push(", ");
            }
            first = false;
            push_value(&mut builder, value);
        }
        builder.push(")");
    }

    let result = builder.build().execute(&mut *conn).await?;
    let key = RecordKey(result.last_insert_rowid());
    tracing::debug!(table = schema.name, key = key.0, "Inserted record");
    Ok(key)
}

async fn select<R: Record>(
    conn: &mut SqliteConnection,
    predicate: Option<&Predicate>,
) -> Result<Vec<Stored<R>>, DbError> {
    let schema = R::SCHEMA;
    let filter = match predicate {
        Some(p) => {
            p.validate(schema)?;
            Filter::Predicate(p)
        }
        None => Filter::All,
    };

    let mut builder = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {ROW_KEY_COLUMN}, {} FROM {}",
        schema.column_list(),
        schema.name
    ));
    push_filter(&mut builder, &filter);
    builder.push(format!(" ORDER BY {ROW_KEY_COLUMN} ASC"));

    let rows = builder.build().fetch_all(&mut *conn).await?;
    rows.iter()
        .map(|row| -> Result<Stored<R>, DbError> {
            Ok(Stored {
                key: RecordKey(row.try_get::<i64, _>(ROW_KEY_COLUMN)?),
                record: R::from_row(row)?,
            })
        })
        .collect()
}

async fn count_rows(
    conn: &mut SqliteConnection,
    schema: &TableSchema,
    predicate: Option<&Predicate>,
) -> Result<u64, DbError> {
    let filter = match predicate {
        Some(p) => {
            p.validate(schema)?;
            Filter::Predicate(p)
        }
        None => Filter::All,
    };
    let mut builder =
        QueryBuilder::<Sqlite>::new(format!("SELECT COUNT(*) FROM {}", schema.name));
    push_filter(&mut builder, &filter);
    let count: i64 = builder.build_query_scalar().fetch_one(&mut *conn).await?;
    Ok(u64::try_from(count).unwrap_or_default())
}

async fn update_rows(
    conn: &mut SqliteConnection,
    schema: &TableSchema,
    filter: &Filter<'_>,
    patch: Patch,
) -> Result<u64, DbError> {
    patch.validate(schema)?;
    let mut builder = QueryBuilder::<Sqlite>::new(format!("UPDATE {} SET ", schema.name));
    let mut first = true;
    for (column, value) in patch.into_entries() {
        if !first {
            builder.push(", ");
        }
        first = false;
        builder.push(column).push(" = ");
        push_value(&mut builder, value);
    }
    push_filter(&mut builder, filter);

    let result = builder.build().execute(&mut *conn).await?;
    tracing::debug!(table = schema.name, rows = result.rows_affected(), "Updated records");
    Ok(result.rows_affected())
}

async fn delete_rows(
    conn: &mut SqliteConnection,
    schema: &TableSchema,
    filter: &Filter<'_>,
) -> Result<u64, DbError> {
    let mut builder = QueryBuilder::<Sqlite>::new(format!("DELETE FROM {}", schema.name));
    push_filter(&mut builder, filter);

    let result = builder.build().execute(&mut *conn).await?;
    tracing::debug!(table = schema.name, rows = result.rows_affected(), "Deleted records");
    Ok(result.rows_affected())
}
