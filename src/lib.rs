//! proxima: approximate nearest-neighbor search primitives.
//!
//! In-memory indexes over corpora of fixed-dimension vectors (`f32` or
//! `u8`), scored by squared Euclidean distance:
//!
//! - **Partition-based**: [`ivf`] — k-means partitioned corpus, probe-based
//!   top-k search, optionally PQ-compressed ([`pq`]). The query engine has
//!   an all-resident path and a streamed path that honors a RAM budget.
//! - **Graph-based**: [`vamana`] — DiskANN-style proximity graph with
//!   bounded out-degree, built by greedy search + RobustPrune.
//! - **Exact**: [`flat`] — brute-force top-k, the recall baseline.
//!
//! # Which index should I use?
//!
//! | Situation | Recommendation |
//! |-----------|----------------|
//! | Corpus fits in RAM, best recall/speed | [`vamana::VamanaIndex`] |
//! | Large corpus, bounded memory | [`ivf::IvfIndex`] with PQ |
//! | Small corpus (< 10K vectors) | [`flat::qv_query_heap`] |
//!
//! # Determinism
//!
//! Every entry point takes a [`Context`] carrying the RNG seed and the
//! worker count. All randomness derives from the seed, and per-query
//! results are independent of the worker count and (for the streamed IVF
//! path) of the block size: ties across equal scores always resolve to the
//! smaller id.
//!
//! ```no_run
//! use proxima::{Context, ColMajorMatrix};
//! use proxima::ivf::{IvfIndex, IvfParams};
//!
//! # fn main() -> proxima::Result<()> {
//! let corpus: ColMajorMatrix<f32> = ColMajorMatrix::zeroed(128, 10_000);
//! let ctx = Context::new(42);
//! let index = IvfIndex::train(&corpus, IvfParams { nlist: 100, ..Default::default() }, &ctx)?;
//!
//! let queries: ColMajorMatrix<f32> = ColMajorMatrix::zeroed(128, 10);
//! let (scores, ids) = index.query_infinite_ram(&queries, 10, 8, &ctx)?;
//! # let _ = (scores, ids);
//! # Ok(())
//! # }
//! ```

pub mod context;
pub mod distance;
pub mod error;
pub mod evaluation;
pub mod flat;
pub mod ivf;
pub mod kmeans;
pub mod matrix;
pub mod minset;
pub mod persistence;
pub mod pq;
pub mod stats;
pub mod vamana;

pub use context::Context;
pub use error::{Result, SearchError};
pub use matrix::{ColMajorMatrix, Feature, VectorArray};
pub use minset::BoundedMinSet;
pub use stats::{SearchStats, StatsSnapshot};
