// ABOUTME: Timestamp-driven incremental sync between two databases
// ABOUTME: Statement generation, the pass engine, and the live schedule

pub mod engine;
pub mod live;
pub mod statements;

#[cfg(test)]
pub(crate) mod testing;

pub use engine::{SyncEngine, SyncStats};
pub use statements::MIN_TIMESTAMP;
