//! `EngineStats`/`EngineMetrics`: a thin set of atomic counters updated
//! as the pipeline runs, parallel to the teacher's `WALStats` pattern -
//! plain structs read with `Ordering::Relaxed`, no external metrics
//! backend wired in.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct EngineMetrics {
    pub blocks_read: AtomicU64,
    pub records_framed: AtomicU64,
    pub vectors_decoded: AtomicU64,
    pub changes_emitted: AtomicU64,
    pub transactions_committed: AtomicU64,
    pub transactions_rolled_back: AtomicU64,
    pub decode_errors: AtomicU64,
    pub checkpoints_flushed: AtomicU64,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> EngineStats {
        EngineStats {
            blocks_read: self.blocks_read.load(Ordering::Relaxed),
            records_framed: self.records_framed.load(Ordering::Relaxed),
            vectors_decoded: self.vectors_decoded.load(Ordering::Relaxed),
            changes_emitted: self.changes_emitted.load(Ordering::Relaxed),
            transactions_committed: self.transactions_committed.load(Ordering::Relaxed),
            transactions_rolled_back: self.transactions_rolled_back.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            checkpoints_flushed: self.checkpoints_flushed.load(Ordering::Relaxed),
        }
    }

    pub fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// A point-in-time copy of `EngineMetrics`, serializable for logging or
/// an operator status line.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct EngineStats {
    pub blocks_read: u64,
    pub records_framed: u64,
    pub vectors_decoded: u64,
    pub changes_emitted: u64,
    pub transactions_committed: u64,
    pub transactions_rolled_back: u64,
    pub decode_errors: u64,
    pub checkpoints_flushed: u64,
}
