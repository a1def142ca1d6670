//! Checkpoint emission.
//!
//! Checkpoints are observability snapshots, not resume points. The sink
//! is pluggable so a durable implementation can be swapped in without
//! touching the discovery loop; the default sink logs.

use tracing::info;

use super::types::Checkpoint;

/// Receives checkpoint snapshots as discovery progresses.
pub trait CheckpointSink: Send + Sync {
    fn record(&self, checkpoint: &Checkpoint);
}

/// Default sink: one info line per checkpoint.
#[derive(Debug, Default)]
pub struct LogCheckpointSink;

impl CheckpointSink for LogCheckpointSink {
    fn record(&self, checkpoint: &Checkpoint) {
        let counters = &checkpoint.counters;
        info!(
            "checkpoint at iteration {}: {} brands discovered, {} processed, \
             {} products discovered, {} processed, {} errors",
            checkpoint.iteration,
            counters.brands_discovered,
            counters.brands_processed,
            counters.products_discovered,
            counters.products_processed,
            counters.errors_encountered,
        );
    }
}
