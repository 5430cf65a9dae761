// ABOUTME: Scripted in-memory QueryExecutor for sync engine unit tests
// ABOUTME: Records every statement and fails or cancels on request

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::executor::{DatabaseKind, QueryExecutor, Row};

#[derive(Default)]
struct Script {
    responses: HashMap<String, Vec<Row>>,
    failures: HashSet<String>,
    reads: Vec<String>,
    writes: Vec<String>,
    cancel_after: Option<(usize, CancellationToken)>,
}

/// Executor whose answers are set up by the test.
///
/// Reads without a scripted response return no rows. Writes succeed unless
/// scripted to fail.
#[derive(Default)]
pub(crate) struct ScriptedExecutor {
    script: Mutex<Script>,
}

impl ScriptedExecutor {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(&self, query: &str, rows: Vec<Row>) {
        self.script
            .lock()
            .unwrap()
            .responses
            .insert(query.to_string(), rows);
    }

    pub(crate) fn fail(&self, statement: &str) {
        self.script
            .lock()
            .unwrap()
            .failures
            .insert(statement.to_string());
    }

    /// Cancel `token` once `count` writes have been attempted.
    pub(crate) fn cancel_after_writes(&self, count: usize, token: CancellationToken) {
        self.script.lock().unwrap().cancel_after = Some((count, token));
    }

    pub(crate) fn reads(&self) -> Vec<String> {
        self.script.lock().unwrap().reads.clone()
    }

    pub(crate) fn writes(&self) -> Vec<String> {
        self.script.lock().unwrap().writes.clone()
    }
}

#[async_trait]
impl QueryExecutor for ScriptedExecutor {
    async fn execute_read(&self, query: &str) -> Result<Vec<Row>> {
        let mut script = self.script.lock().unwrap();
        script.reads.push(query.to_string());
        if script.failures.contains(query) {
            bail!("scripted failure: {}", query);
        }
        Ok(script.responses.get(query).cloned().unwrap_or_default())
    }

    async fn execute_write(&self, statement: &str) -> Result<u64> {
        let mut script = self.script.lock().unwrap();
        script.writes.push(statement.to_string());
        if let Some((count, token)) = &script.cancel_after {
            if script.writes.len() >= *count {
                token.cancel();
            }
        }
        if script.failures.contains(statement) {
            bail!("scripted failure: {}", statement);
        }
        Ok(1)
    }

    fn kind(&self) -> DatabaseKind {
        DatabaseKind::Sqlite
    }
}
