//! Single-writer snapshot publication.
//!
//! The cell holds an `Arc` to the current tracking index. Readers clone the
//! `Arc` and keep a value that never changes; the writer swaps in a new `Arc`.
//! The lock only guards the pointer copy, never a reduce or a query.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::core::index::TrackingIndex;

/// Atomically swapped reference to the current snapshot.
#[derive(Debug)]
pub struct SnapshotCell {
    current: RwLock<Arc<TrackingIndex>>,
    /// Number of snapshots published since construction.
    generation: AtomicU64,
}

impl SnapshotCell {
    /// Create a cell holding the initial snapshot (generation 0).
    pub fn new(initial: TrackingIndex) -> Self {
        Self {
            current: RwLock::new(Arc::new(initial)),
            generation: AtomicU64::new(0),
        }
    }

    /// The snapshot current at call time.
    pub fn load(&self) -> Arc<TrackingIndex> {
        Arc::clone(&self.current.read())
    }

    /// Replace the current snapshot and return the new generation.
    pub fn publish(&self, next: TrackingIndex) -> u64 {
        let next = Arc::new(next);
        let previous = {
            let mut guard = self.current.write();
            std::mem::replace(&mut *guard, next)
        };
        // Drop the old snapshot outside the lock; readers may still hold it.
        drop(previous);
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Number of snapshots published so far.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}

impl Default for SnapshotCell {
    fn default() -> Self {
        Self::new(TrackingIndex::default())
    }
}
