// ABOUTME: SQLite query executor backed by rusqlite
// ABOUTME: Converts SQLite values to the textual row model used by the sync engine

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use rusqlite::types::Value;
use rusqlite::Connection;
use tokio::sync::Mutex;

use super::{DatabaseKind, QueryExecutor, Row};

const IN_MEMORY: &str = ":memory:";

/// Executes statements on a single SQLite connection.
pub struct SqliteExecutor {
    path: PathBuf,
    conn: Mutex<Option<Connection>>,
}

impl SqliteExecutor {
    /// Open (or create) the SQLite database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = if path.as_os_str() == IN_MEMORY {
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?
        } else {
            Connection::open(path)
                .with_context(|| format!("Failed to open SQLite database {}", path.display()))?
        };
        tracing::debug!("Opened SQLite database {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            conn: Mutex::new(Some(conn)),
        })
    }

    /// Open from a `sqlite://path` or `sqlite:path` URL.
    pub fn open_url(url: &str) -> Result<Self> {
        Self::open(sqlite_path_from_url(url)?)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn sqlite_path_from_url(url: &str) -> Result<PathBuf> {
    let trimmed = url.trim();
    let path = trimmed
        .strip_prefix("sqlite://")
        .or_else(|| trimmed.strip_prefix("sqlite:"))
        .ok_or_else(|| anyhow!("Not a SQLite URL: {}", url))?;
    if path.is_empty() {
        anyhow::bail!("SQLite URL '{}' does not name a database file", url);
    }
    Ok(PathBuf::from(path))
}

fn value_to_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Integer(i) => Some(i.to_string()),
        Value::Real(f) => Some(f.to_string()),
        Value::Text(s) => Some(s),
        Value::Blob(b) => Some(String::from_utf8_lossy(&b).into_owned()),
    }
}

fn read_rows(conn: &Connection, query: &str) -> Result<Vec<Row>> {
    let mut stmt = conn
        .prepare(query)
        .with_context(|| format!("Failed to prepare query: {}", query))?;
    let column_count = stmt.column_count();

    let mut rows = stmt
        .query([])
        .with_context(|| format!("Failed to run query: {}", query))?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(column_count);
        for idx in 0..column_count {
            let value: Value = row.get(idx)?;
            values.push(value_to_text(value));
        }
        out.push(Row::new(values));
    }
    Ok(out)
}

#[async_trait]
impl QueryExecutor for SqliteExecutor {
    async fn execute_read(&self, query: &str) -> Result<Vec<Row>> {
        let guard = self.conn.lock().await;
        let conn = guard
            .as_ref()
            .ok_or_else(|| anyhow!("SQLite connection {} is closed", self.path.display()))?;
        read_rows(conn, query)
    }

    async fn execute_write(&self, statement: &str) -> Result<u64> {
        let guard = self.conn.lock().await;
        let conn = guard
            .as_ref()
            .ok_or_else(|| anyhow!("SQLite connection {} is closed", self.path.display()))?;
        let affected = conn
            .execute(statement, [])
            .with_context(|| format!("Failed to execute statement: {}", statement))?;
        Ok(affected as u64)
    }

    async fn close(&self) -> Result<()> {
        if let Some(conn) = self.conn.lock().await.take() {
            conn.close()
                .map_err(|(_, err)| err)
                .with_context(|| format!("Failed to close SQLite database {}", self.path.display()))?;
        }
        Ok(())
    }

    fn kind(&self) -> DatabaseKind {
        DatabaseKind::Sqlite
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_path_from_url() {
        assert_eq!(
            sqlite_path_from_url("sqlite:///var/data/shop.db").unwrap(),
            PathBuf::from("/var/data/shop.db")
        );
        assert_eq!(
            sqlite_path_from_url("sqlite:relative.db").unwrap(),
            PathBuf::from("relative.db")
        );
        assert_eq!(
            sqlite_path_from_url("sqlite::memory:").unwrap(),
            PathBuf::from(":memory:")
        );
        assert!(sqlite_path_from_url("sqlite://").is_err());
        assert!(sqlite_path_from_url("mysql://host/db").is_err());
    }

    #[tokio::test]
    async fn test_read_and_write_round_trip() {
        let executor = SqliteExecutor::open(IN_MEMORY).unwrap();
        executor
            .execute_write("CREATE TABLE t (id INTEGER, name TEXT, score REAL, note TEXT)")
            .await
            .unwrap();
        let affected = executor
            .execute_write("insert into t(id,name,score,note) values (1,'alpha',2.5,NULL)")
            .await
            .unwrap();
        assert_eq!(affected, 1);

        let rows = executor
            .execute_read("select id, name, score, note from t")
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get(0), Some("1"));
        assert_eq!(rows[0].get(1), Some("alpha"));
        assert_eq!(rows[0].get(2), Some("2.5"));
        assert_eq!(rows[0].get(3), None);
    }

    #[tokio::test]
    async fn test_max_over_empty_table_is_null() {
        let executor = SqliteExecutor::open(IN_MEMORY).unwrap();
        executor
            .execute_write("CREATE TABLE t (ts TEXT)")
            .await
            .unwrap();
        let rows = executor.execute_read("select max(ts) from t").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get(0), None);
    }

    #[tokio::test]
    async fn test_closed_executor_rejects_calls() {
        let executor = SqliteExecutor::open(IN_MEMORY).unwrap();
        executor.close().await.unwrap();
        assert!(executor.execute_read("select 1").await.is_err());
        assert!(executor.execute_write("select 1").await.is_err());
        // Closing twice is a no-op.
        executor.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_bad_statement_is_an_error() {
        let executor = SqliteExecutor::open(IN_MEMORY).unwrap();
        let err = executor
            .execute_read("select * from missing_table")
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("missing_table"));
    }
}
