//! Execution context threaded through build and query entry points.
//!
//! Carries the RNG seed, the worker count, and an optional stats sink.
//! All randomness in the crate derives from the seed, which is what makes
//! training reproducible and lets the thread-count invariance tests hold.

use crate::stats::SearchStats;
use std::sync::Arc;

/// Build/query context: seed, worker pool size, optional counters.
#[derive(Debug, Clone, Default)]
pub struct Context {
    /// Seed for all internal randomness (k-means init).
    pub seed: u64,
    /// Worker count for parallel regions. 0 means available parallelism.
    pub nthreads: usize,
    /// Optional counter sink.
    pub stats: Option<Arc<SearchStats>>,
}

impl Context {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            nthreads: 0,
            stats: None,
        }
    }

    #[must_use]
    pub fn with_threads(mut self, nthreads: usize) -> Self {
        self.nthreads = nthreads;
        self
    }

    #[must_use]
    pub fn with_stats(mut self, stats: Arc<SearchStats>) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Derive a context whose seed is mixed with `salt` (used to give each
    /// PQ subspace its own RNG stream).
    #[must_use]
    pub fn derive(&self, salt: u64) -> Self {
        Self {
            seed: self.seed ^ salt.wrapping_mul(0x9E37_79B9_7F4A_7C15),
            nthreads: self.nthreads,
            stats: self.stats.clone(),
        }
    }

    /// Resolved worker count.
    pub fn threads(&self) -> usize {
        if self.nthreads > 0 {
            self.nthreads
        } else {
            std::thread::available_parallelism()
                .map(std::num::NonZeroUsize::get)
                .unwrap_or(1)
        }
    }

    /// Run `f` inside a rayon pool sized to this context.
    ///
    /// Falls back to the caller's thread if a pool cannot be built; the
    /// parallel regions in this crate are pure maps, so results are the same
    /// either way.
    pub fn run<R: Send>(&self, f: impl FnOnce() -> R + Send) -> R {
        match rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads())
            .build()
        {
            Ok(pool) => pool.install(f),
            Err(_) => f(),
        }
    }

    #[inline]
    pub(crate) fn stats(&self) -> Option<&SearchStats> {
        self.stats.as_deref()
    }
}
