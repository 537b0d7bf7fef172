//! Engine error types.
//!
//! Only unrecoverable conditions surface as errors. Per-request problems
//! (duplicate ids, unknown ids, uncrossable FAK orders) are absorbed
//! silently by the engine; its correctness is defined by the book
//! invariants, not per-request acknowledgements.

use std::io;

use thiserror::Error;

/// Fatal engine conditions.
#[derive(Debug, Error)]
pub enum EngineError {
    /// An Add request arrived while the order pool had no free slot.
    /// Capacity must be sized for peak concurrent resting orders.
    #[error("order pool exhausted (capacity {0})")]
    PoolExhausted(u32),

    /// Ring buffer capacity must be a non-zero power of two.
    #[error("ring capacity must be a power of two, got {0}")]
    InvalidRingCapacity(usize),

    /// Pool capacity must be a positive integer.
    #[error("pool capacity must be positive")]
    InvalidPoolCapacity,

    /// The worker thread could not be spawned.
    #[error("failed to spawn worker thread")]
    WorkerSpawn(#[from] io::Error),
}
