// ABOUTME: Library root for dmml-replicator
// ABOUTME: Timestamp-driven table replication between databases, driven by DMML mapping files

pub mod agent;
pub mod config;
pub mod executor;
pub mod sync;

pub use agent::SyncAgent;
pub use config::AgentConfig;
pub use dmml;
pub use sync::{SyncEngine, SyncStats};
