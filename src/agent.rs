// ABOUTME: SyncAgent lifecycle - owns the source and destination connections around a SyncEngine
// ABOUTME: connect -> sync / live_sync -> stop_sync -> hold -> disconnect

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use dmml::DbMap;

use crate::config::{sanitize_url, AgentConfig};
use crate::executor::{self, ConnectOptions, QueryExecutor};
use crate::sync::{SyncEngine, SyncStats};

struct Connected {
    source: Arc<dyn QueryExecutor>,
    destination: Arc<dyn QueryExecutor>,
    engine: Arc<SyncEngine>,
}

/// Coordinates one replication job.
///
/// The agent opens both connections, hands them to a [`SyncEngine`] and is the
/// only owner of those connections, so nothing outside the engine issues
/// statements on them.
pub struct SyncAgent {
    config: AgentConfig,
    map: Arc<DbMap>,
    connected: Option<Connected>,
}

impl SyncAgent {
    pub fn new(config: AgentConfig, map: DbMap) -> Self {
        Self {
            config,
            map: Arc::new(map),
            connected: None,
        }
    }

    /// Build an agent, loading the mapping file named in `config`.
    pub fn from_config(config: AgentConfig) -> Result<Self> {
        let map = dmml::parse_file(&config.mapping_path).with_context(|| {
            format!(
                "Failed to load mapping file {}",
                config.mapping_path.display()
            )
        })?;
        tracing::info!(
            "Loaded {} table maps from {}",
            map.len(),
            config.mapping_path.display()
        );
        Ok(Self::new(config, map))
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn map(&self) -> &DbMap {
        &self.map
    }

    pub fn is_connected(&self) -> bool {
        self.connected.is_some()
    }

    /// Open the source and destination connections.
    pub async fn connect(&mut self) -> Result<()> {
        if self.connected.is_some() {
            bail!("Already connected");
        }

        let options = ConnectOptions {
            allow_self_signed_certs: self.config.allow_self_signed_certs,
        };

        tracing::info!("Connecting to source {}", sanitize_url(&self.config.source_url));
        let source = executor::connect(&self.config.source_url, &options)
            .await
            .context("Failed to connect to source database")?;

        tracing::info!(
            "Connecting to destination {}",
            sanitize_url(&self.config.destination_url)
        );
        let destination = match executor::connect(&self.config.destination_url, &options).await {
            Ok(destination) => destination,
            Err(e) => {
                if let Err(close_err) = source.close().await {
                    tracing::warn!("Failed to close source connection: {:#}", close_err);
                }
                return Err(e.context("Failed to connect to destination database"));
            }
        };

        let engine = Arc::new(SyncEngine::new(
            Arc::clone(&self.map),
            Arc::clone(&source),
            Arc::clone(&destination),
        ));
        self.connected = Some(Connected {
            source,
            destination,
            engine,
        });
        Ok(())
    }

    fn engine(&self) -> Result<&Arc<SyncEngine>> {
        match &self.connected {
            Some(connected) => Ok(&connected.engine),
            None => bail!("Not connected; call connect() first"),
        }
    }

    /// Engine for the next run. A stopped engine is joined and replaced, so
    /// `stop_sync` only ends the runs that were started before it.
    async fn active_engine(&mut self) -> Result<Arc<SyncEngine>> {
        let connected = self
            .connected
            .as_mut()
            .ok_or_else(|| anyhow!("Not connected; call connect() first"))?;

        if connected.engine.is_stopped() {
            let passes = connected.engine.hold().await?;
            tracing::debug!("Previous live sync ran {} passes", passes);
            connected.engine = Arc::new(SyncEngine::new(
                Arc::clone(&self.map),
                Arc::clone(&connected.source),
                Arc::clone(&connected.destination),
            ));
        }
        Ok(Arc::clone(&connected.engine))
    }

    /// Run one pass now.
    pub async fn sync(&mut self) -> Result<SyncStats> {
        Ok(self.active_engine().await?.sync().await)
    }

    /// Start repeating passes every `period`, the first one `period` from now.
    pub async fn live_sync(&mut self, period: Duration) -> Result<()> {
        self.active_engine().await?.live_sync(period)
    }

    /// Stop the current and all future passes. No-op when not connected.
    pub fn stop_sync(&self) {
        if let Some(connected) = &self.connected {
            connected.engine.stop_sync();
        }
    }

    /// Wait for the live schedule to end, returning how many passes it ran.
    pub async fn hold(&self) -> Result<u64> {
        self.engine()?.hold().await
    }

    /// Stop syncing, wait for the worker, and close both connections.
    pub async fn disconnect(&mut self) -> Result<()> {
        let Some(connected) = self.connected.take() else {
            return Ok(());
        };

        connected.engine.stop_sync();
        let passes = connected.engine.hold().await?;
        tracing::debug!("Live sync ran {} passes", passes);

        // Close both even if the first fails
        let source_result = connected
            .source
            .close()
            .await
            .context("Failed to close source connection");
        let destination_result = connected
            .destination
            .close()
            .await
            .context("Failed to close destination connection");
        source_result?;
        destination_result?;

        tracing::info!("Disconnected");
        Ok(())
    }
}
