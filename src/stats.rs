//! Search counters.
//!
//! Optional per-run statistics, collected through the [`Context`] rather
//! than a process-global sink. All counters are relaxed atomics; they are
//! informational and never synchronize work.
//!
//! [`Context`]: crate::context::Context

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters shared across worker threads of a build or query.
#[derive(Debug, Default)]
pub struct SearchStats {
    /// Distance kernel invocations.
    pub distance_comps: AtomicU64,
    /// Vertices visited by graph searches.
    pub visited_vertices: AtomicU64,
    /// Partitions gathered by IVF queries.
    pub partitions_loaded: AtomicU64,
    /// Blocks materialized by the finite-RAM path.
    pub blocks_loaded: AtomicU64,
}

impl SearchStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn add_distance_comps(&self, n: u64) {
        self.distance_comps.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_visited_vertices(&self, n: u64) {
        self.visited_vertices.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_partitions_loaded(&self, n: u64) {
        self.partitions_loaded.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_blocks_loaded(&self, n: u64) {
        self.blocks_loaded.fetch_add(n, Ordering::Relaxed);
    }

    /// Read all counters at once.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            distance_comps: self.distance_comps.load(Ordering::Relaxed),
            visited_vertices: self.visited_vertices.load(Ordering::Relaxed),
            partitions_loaded: self.partitions_loaded.load(Ordering::Relaxed),
            blocks_loaded: self.blocks_loaded.load(Ordering::Relaxed),
        }
    }
}

/// Plain-value copy of [`SearchStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub distance_comps: u64,
    pub visited_vertices: u64,
    pub partitions_loaded: u64,
    pub blocks_loaded: u64,
}
