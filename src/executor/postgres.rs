// ABOUTME: PostgreSQL query executor backed by tokio-postgres
// ABOUTME: Uses the simple query protocol so every value arrives as text

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use postgres_native_tls::MakeTlsConnector;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_postgres::{Client, SimpleQueryMessage};

use super::{DatabaseKind, QueryExecutor, Row};

struct Session {
    client: Client,
    connection: JoinHandle<()>,
}

/// Executes statements on a single PostgreSQL connection.
pub struct PostgresExecutor {
    session: Mutex<Option<Session>>,
}

impl PostgresExecutor {
    pub async fn connect(url: &str, allow_self_signed_certs: bool) -> Result<Self> {
        let tls = native_tls::TlsConnector::builder()
            .danger_accept_invalid_certs(allow_self_signed_certs)
            .build()
            .context("Failed to build TLS connector")?;
        let (client, connection) = tokio_postgres::connect(url, MakeTlsConnector::new(tls))
            .await
            .context("Failed to connect to PostgreSQL")?;

        let connection = tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!("PostgreSQL connection error: {}", e);
            }
        });

        Ok(Self {
            session: Mutex::new(Some(Session { client, connection })),
        })
    }
}

fn collect_rows(messages: Vec<SimpleQueryMessage>) -> Vec<Row> {
    messages
        .into_iter()
        .filter_map(|message| match message {
            SimpleQueryMessage::Row(row) => Some(Row::new(
                (0..row.len())
                    .map(|idx| row.get(idx).map(str::to_string))
                    .collect(),
            )),
            _ => None,
        })
        .collect()
}

fn affected_rows(messages: &[SimpleQueryMessage]) -> u64 {
    messages
        .iter()
        .map(|message| match message {
            SimpleQueryMessage::CommandComplete(count) => *count,
            _ => 0,
        })
        .sum()
}

#[async_trait]
impl QueryExecutor for PostgresExecutor {
    async fn execute_read(&self, query: &str) -> Result<Vec<Row>> {
        let guard = self.session.lock().await;
        let session = guard
            .as_ref()
            .ok_or_else(|| anyhow!("PostgreSQL connection is closed"))?;
        let messages = session
            .client
            .simple_query(query)
            .await
            .with_context(|| format!("Failed to run query: {}", query))?;
        Ok(collect_rows(messages))
    }

    async fn execute_write(&self, statement: &str) -> Result<u64> {
        let guard = self.session.lock().await;
        let session = guard
            .as_ref()
            .ok_or_else(|| anyhow!("PostgreSQL connection is closed"))?;
        let messages = session
            .client
            .simple_query(statement)
            .await
            .with_context(|| format!("Failed to execute statement: {}", statement))?;
        Ok(affected_rows(&messages))
    }

    async fn close(&self) -> Result<()> {
        let session = self.session.lock().await.take();
        if let Some(Session { client, connection }) = session {
            // Dropping the client ends the connection task.
            drop(client);
            connection
                .await
                .context("PostgreSQL connection task panicked")?;
        }
        Ok(())
    }

    fn kind(&self) -> DatabaseKind {
        DatabaseKind::PostgreSql
    }
}
