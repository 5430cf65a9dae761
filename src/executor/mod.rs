// ABOUTME: Query executor capability shared by the sync engine and its backends
// ABOUTME: Defines the row model, backend detection from URLs, and connection setup

pub mod mysql;
pub mod postgres;
pub mod sqlite;

use std::fmt;
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;

pub use mysql::MySqlExecutor;
pub use postgres::PostgresExecutor;
pub use sqlite::SqliteExecutor;

/// A result row with positional column access.
///
/// Values are kept in their textual form because they are only ever spliced
/// back into generated statements. SQL NULL is `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    values: Vec<Option<String>>,
}

impl Row {
    pub fn new(values: Vec<Option<String>>) -> Self {
        Self { values }
    }

    /// Column `index` (0-based). `None` for NULL or an out-of-range index.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.values.get(index).and_then(|v| v.as_deref())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[Option<String>] {
        &self.values
    }
}

impl<S: Into<String>> FromIterator<Option<S>> for Row {
    fn from_iter<I: IntoIterator<Item = Option<S>>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(|v| v.map(Into::into)).collect())
    }
}

/// Database engines a connection URL can point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseKind {
    Sqlite,
    MySql,
    PostgreSql,
}

impl DatabaseKind {
    /// Detect the engine from a connection URL's scheme.
    pub fn detect(url: &str) -> Result<Self> {
        let url = url.trim();
        if url.starts_with("sqlite:") {
            Ok(DatabaseKind::Sqlite)
        } else if url.starts_with("mysql://") {
            Ok(DatabaseKind::MySql)
        } else if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            Ok(DatabaseKind::PostgreSql)
        } else {
            bail!(
                "Unsupported database URL '{}'. Expected sqlite://, mysql://, postgres:// or postgresql://",
                url
            )
        }
    }
}

impl fmt::Display for DatabaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseKind::Sqlite => f.write_str("SQLite"),
            DatabaseKind::MySql => f.write_str("MySQL"),
            DatabaseKind::PostgreSql => f.write_str("PostgreSQL"),
        }
    }
}

/// Options applied when opening a connection.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConnectOptions {
    /// Accept self-signed TLS certificates (PostgreSQL only).
    pub allow_self_signed_certs: bool,
}

/// Runs statements against one database on behalf of the sync engine.
///
/// The engine owns two of these, one for the source and one for the
/// destination, and never calls either concurrently with itself. Calls have
/// no timeout: a hung backend hangs the pass that issued the call.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Run a read query and return its rows in the order the database produced them.
    async fn execute_read(&self, query: &str) -> Result<Vec<Row>>;

    /// Run a write statement and return the number of affected rows.
    async fn execute_write(&self, statement: &str) -> Result<u64>;

    /// Release the underlying connection. Later calls fail.
    async fn close(&self) -> Result<()> {
        Ok(())
    }

    fn kind(&self) -> DatabaseKind;
}

/// Open a connection for `url` and wrap it in the matching executor.
pub async fn connect(url: &str, options: &ConnectOptions) -> Result<Arc<dyn QueryExecutor>> {
    let executor: Arc<dyn QueryExecutor> = match DatabaseKind::detect(url)? {
        DatabaseKind::Sqlite => Arc::new(SqliteExecutor::open_url(url)?),
        DatabaseKind::MySql => Arc::new(MySqlExecutor::connect(url).await?),
        DatabaseKind::PostgreSql => {
            Arc::new(PostgresExecutor::connect(url, options.allow_self_signed_certs).await?)
        }
    };
    Ok(executor)
}
