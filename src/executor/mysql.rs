// ABOUTME: MySQL query executor backed by mysql_async
// ABOUTME: Runs text-protocol queries and renders MySQL values as text

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use mysql_async::prelude::Queryable;
use mysql_async::{Conn, Value};
use tokio::sync::Mutex;

use super::{DatabaseKind, QueryExecutor, Row};

/// Executes statements on a single MySQL connection.
pub struct MySqlExecutor {
    conn: Mutex<Option<Conn>>,
}

impl MySqlExecutor {
    pub async fn connect(url: &str) -> Result<Self> {
        let conn = Conn::from_url(url)
            .await
            .context("Failed to connect to MySQL")?;
        Ok(Self {
            conn: Mutex::new(Some(conn)),
        })
    }
}

/// Render a MySQL value the way it would appear in a SQL literal.
fn value_to_text(value: Value) -> Option<String> {
    match value {
        Value::NULL => None,
        Value::Bytes(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Value::Int(i) => Some(i.to_string()),
        Value::UInt(u) => Some(u.to_string()),
        Value::Float(f) => Some(f.to_string()),
        Value::Double(d) => Some(d.to_string()),
        Value::Date(year, month, day, hour, minute, second, micros) => {
            let mut text = format!(
                "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                year, month, day, hour, minute, second
            );
            if micros > 0 {
                text.push_str(&format!(".{:06}", micros));
            }
            Some(text)
        }
        Value::Time(negative, days, hours, minutes, seconds, micros) => {
            let total_hours = days * 24 + u32::from(hours);
            let mut text = format!(
                "{}{:02}:{:02}:{:02}",
                if negative { "-" } else { "" },
                total_hours,
                minutes,
                seconds
            );
            if micros > 0 {
                text.push_str(&format!(".{:06}", micros));
            }
            Some(text)
        }
    }
}

#[async_trait]
impl QueryExecutor for MySqlExecutor {
    async fn execute_read(&self, query: &str) -> Result<Vec<Row>> {
        let mut guard = self.conn.lock().await;
        let conn = guard
            .as_mut()
            .ok_or_else(|| anyhow!("MySQL connection is closed"))?;
        let rows: Vec<mysql_async::Row> = conn
            .query(query)
            .await
            .with_context(|| format!("Failed to run query: {}", query))?;

        // `Row::unwrap` hands back the raw column values, it does not panic.
        Ok(rows
            .into_iter()
            .map(|row| Row::new(row.unwrap().into_iter().map(value_to_text).collect()))
            .collect())
    }

    async fn execute_write(&self, statement: &str) -> Result<u64> {
        let mut guard = self.conn.lock().await;
        let conn = guard
            .as_mut()
            .ok_or_else(|| anyhow!("MySQL connection is closed"))?;
        conn.query_drop(statement)
            .await
            .with_context(|| format!("Failed to execute statement: {}", statement))?;
        Ok(conn.affected_rows())
    }

    async fn close(&self) -> Result<()> {
        let conn = self.conn.lock().await.take();
        if let Some(conn) = conn {
            conn.disconnect()
                .await
                .context("Failed to disconnect from MySQL")?;
        }
        Ok(())
    }

    fn kind(&self) -> DatabaseKind {
        DatabaseKind::MySql
    }
}
