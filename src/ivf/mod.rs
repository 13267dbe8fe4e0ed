//! Inverted-file (IVF) index: k-means partitioned corpus with probe-based
//! top-k search.
//!
//! The corpus is clustered, permuted into the shuffled layout (cluster
//! members contiguous, described by an offset index), and optionally
//! PQ-encoded. Queries probe the `nprobe` nearest partitions either fully
//! resident (infinite-RAM) or streamed under a block budget (finite-RAM).

pub mod index;
pub mod partition;
pub mod query;

pub use index::{IvfIndex, IvfParams, PqCodes, PqParams};
pub use partition::{offsets_to_sizes, partition, sizes_to_offsets, Partitioning};
