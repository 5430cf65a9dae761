// ABOUTME: SyncEngine for timestamp-driven sync - copies new source rows into the destination
// ABOUTME: One pass walks every table map, isolating failures to the statement that caused them

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use dmml::{DbMap, TableMap};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::statements::{
    high_water_mark_from_rows, high_water_mark_query, insert_statement, select_query,
};
use crate::executor::QueryExecutor;

/// Statistics from one sync pass.
#[derive(Debug, Clone)]
pub struct SyncStats {
    pub started_at: DateTime<Utc>,
    pub tables_synced: usize,
    pub tables_failed: usize,
    pub rows_synced: u64,
    pub rows_failed: u64,
    /// The pass observed a stop request and skipped the remaining work.
    pub cancelled: bool,
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

impl SyncStats {
    fn new() -> Self {
        Self {
            started_at: Utc::now(),
            tables_synced: 0,
            tables_failed: 0,
            rows_synced: 0,
            rows_failed: 0,
            cancelled: false,
            errors: Vec::new(),
            duration_ms: 0,
        }
    }

    /// Check if the pass completed without errors.
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// SyncEngine copies rows from a source database into a destination database
/// according to a [`DbMap`].
///
/// For every table map, one pass:
/// 1. Reads the destination high-water mark (`max` of the destination timestamp)
/// 2. Selects source rows with a strictly newer timestamp
/// 3. Inserts each selected row into the destination, one statement per row
///
/// A failing statement is logged and recorded in [`SyncStats`]; the pass moves
/// on to the next row or table. Passes never overlap.
pub struct SyncEngine {
    map: Arc<DbMap>,
    source: Arc<dyn QueryExecutor>,
    destination: Arc<dyn QueryExecutor>,
    pub(super) cancel: CancellationToken,
    pass_lock: Mutex<()>,
    pub(super) worker: StdMutex<Option<JoinHandle<u64>>>,
}

impl SyncEngine {
    pub fn new(
        map: Arc<DbMap>,
        source: Arc<dyn QueryExecutor>,
        destination: Arc<dyn QueryExecutor>,
    ) -> Self {
        Self {
            map,
            source,
            destination,
            cancel: CancellationToken::new(),
            pass_lock: Mutex::new(()),
            worker: StdMutex::new(None),
        }
    }

    pub fn map(&self) -> &DbMap {
        &self.map
    }

    /// Token cancelled by [`SyncEngine::stop_sync`]. Cancelling a clone stops the engine too.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Stop the engine.
    ///
    /// A pass in flight finishes its current statement and then skips its
    /// remaining rows and tables; no scheduled pass starts afterwards. A
    /// stopped engine stays stopped.
    pub fn stop_sync(&self) {
        if !self.cancel.is_cancelled() {
            tracing::info!("Stopping sync");
        }
        self.cancel.cancel();
    }

    /// Run one pass, waiting for any pass already in progress to finish first.
    pub async fn sync(&self) -> SyncStats {
        let _pass = self.pass_lock.lock().await;
        self.run_pass().await
    }

    /// Run one pass unless another pass is in progress, in which case return `None`.
    pub async fn try_sync(&self) -> Option<SyncStats> {
        let _pass = self.pass_lock.try_lock().ok()?;
        Some(self.run_pass().await)
    }

    async fn run_pass(&self) -> SyncStats {
        let start = Instant::now();
        let mut stats = SyncStats::new();

        for table in self.map.table_maps() {
            if self.cancel.is_cancelled() {
                tracing::info!(
                    "Sync stopped before {} -> {}",
                    table.source_table(),
                    table.destination_table()
                );
                stats.cancelled = true;
                break;
            }

            match self.sync_table(table, &mut stats).await {
                Ok(_) => stats.tables_synced += 1,
                Err(e) => {
                    // Log with :? to show full error chain including root cause
                    tracing::error!(
                        "Failed to sync {} -> {}: {:?}",
                        table.source_table(),
                        table.destination_table(),
                        e
                    );
                    stats.tables_failed += 1;
                    stats.errors.push(format!(
                        "Failed to sync {} -> {}: {:#}",
                        table.source_table(),
                        table.destination_table(),
                        e
                    ));
                }
            }
        }

        stats.duration_ms = start.elapsed().as_millis() as u64;
        stats
    }

    /// Sync a single table map, returning the number of rows written.
    ///
    /// Errors abandon the table; row-level failures are recorded in `stats`
    /// and do not end the row loop.
    async fn sync_table(&self, table: &TableMap, stats: &mut SyncStats) -> Result<u64> {
        let hwm_query = high_water_mark_query(table);
        let hwm_rows = self
            .destination
            .execute_read(&hwm_query)
            .await
            .with_context(|| {
                format!(
                    "Failed to read high-water mark from {}",
                    table.destination_table()
                )
            })?;
        let high_water_mark = high_water_mark_from_rows(&hwm_rows);

        let query = select_query(table, &high_water_mark);
        tracing::debug!("Select: {}", query);
        let rows = self
            .source
            .execute_read(&query)
            .await
            .with_context(|| format!("Failed to read changes from {}", table.source_table()))?;

        let mut written = 0u64;
        for row in &rows {
            if self.cancel.is_cancelled() {
                tracing::info!(
                    "Sync stopped during {} -> {} after {} of {} rows",
                    table.source_table(),
                    table.destination_table(),
                    written,
                    rows.len()
                );
                stats.cancelled = true;
                break;
            }

            let outcome = match insert_statement(table, row) {
                Ok(statement) => {
                    tracing::debug!("Insert: {}", statement);
                    self.destination
                        .execute_write(&statement)
                        .await
                        .map(|_| ())
                }
                Err(e) => Err(e),
            };

            match outcome {
                Ok(()) => {
                    written += 1;
                    stats.rows_synced += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to copy row into {}: {:#}",
                        table.destination_table(),
                        e
                    );
                    stats.rows_failed += 1;
                    stats.errors.push(format!(
                        "Failed to copy row into {}: {:#}",
                        table.destination_table(),
                        e
                    ));
                }
            }
        }

        if rows.is_empty() {
            tracing::debug!(
                "No changes in {} since {}",
                table.source_table(),
                high_water_mark
            );
        } else {
            tracing::info!(
                "Synced {} -> {}: {} of {} rows (since {})",
                table.source_table(),
                table.destination_table(),
                written,
                rows.len(),
                high_water_mark
            );
        }

        Ok(written)
    }
}
