//! Corpus partitioning into the shuffled IVF layout.
//!
//! Each corpus vector is assigned to its nearest centroid, then the corpus
//! is permuted so the members of every cluster are contiguous. The layout
//! is described by an offset index of length K+1: cluster c occupies
//! shuffled positions `[offsets[c], offsets[c+1])`.

use crate::context::Context;
use crate::error::{Result, SearchError};
use crate::kmeans::nearest_centroids;
use crate::matrix::{ColMajorMatrix, Feature};

/// The shuffled corpus layout produced by [`partition`].
#[derive(Debug, Clone, PartialEq)]
pub struct Partitioning<T> {
    /// Exclusive prefix sum of cluster sizes, with a trailing total.
    /// `offsets.len() == nlist + 1`, `offsets[0] == 0`, `offsets[nlist] == N`.
    pub offsets: Vec<u64>,
    /// Corpus columns permuted so each cluster is contiguous.
    pub shuffled_vectors: ColMajorMatrix<T>,
    /// `shuffled_ids[j]` is the original id of the vector at position j.
    pub shuffled_ids: Vec<u32>,
}

impl<T: Feature> Partitioning<T> {
    pub fn nlist(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn ntotal(&self) -> usize {
        self.shuffled_vectors.num_cols()
    }

    /// Span of shuffled positions covered by cluster `c`.
    #[inline]
    pub fn cluster_range(&self, c: usize) -> std::ops::Range<usize> {
        self.offsets[c] as usize..self.offsets[c + 1] as usize
    }

    /// Number of vectors in cluster `c`.
    #[inline]
    pub fn cluster_size(&self, c: usize) -> usize {
        (self.offsets[c + 1] - self.offsets[c]) as usize
    }

    /// Size of the largest cluster.
    pub fn max_cluster_size(&self) -> usize {
        (0..self.nlist())
            .map(|c| self.cluster_size(c))
            .max()
            .unwrap_or(0)
    }
}

/// Assign every corpus column to its nearest centroid and build the shuffled
/// layout.
pub fn partition<T: Feature>(
    centroids: &ColMajorMatrix<f32>,
    corpus: &ColMajorMatrix<T>,
    ctx: &Context,
) -> Result<Partitioning<T>> {
    if corpus.num_rows() != centroids.num_rows() {
        return Err(SearchError::DimensionMismatch {
            expected: centroids.num_rows(),
            actual: corpus.num_rows(),
        });
    }

    let nlist = centroids.num_cols();
    let n = corpus.num_cols();

    let assignments = ctx.run(|| nearest_centroids(centroids, corpus));

    let mut sizes = vec![0u64; nlist];
    for &a in &assignments {
        sizes[a as usize] += 1;
    }
    let offsets = sizes_to_offsets(&sizes);

    // Second pass: place each column at its cluster cursor. The cursors
    // start at the cluster offsets and end at the next cluster's offsets.
    let mut cursors: Vec<u64> = offsets[..nlist].to_vec();
    let mut shuffled_vectors = ColMajorMatrix::<T>::zeroed(corpus.num_rows(), n);
    let mut shuffled_ids = vec![0u32; n];
    for (i, &a) in assignments.iter().enumerate() {
        let pos = cursors[a as usize] as usize;
        cursors[a as usize] += 1;
        shuffled_vectors.copy_column_from(pos, corpus, i);
        shuffled_ids[pos] = i as u32;
    }

    Ok(Partitioning {
        offsets,
        shuffled_vectors,
        shuffled_ids,
    })
}

/// Exclusive prefix sum with a trailing total: `sizes` → `offsets`.
pub fn sizes_to_offsets(sizes: &[u64]) -> Vec<u64> {
    let mut offsets = Vec::with_capacity(sizes.len() + 1);
    let mut acc = 0u64;
    offsets.push(0);
    for &s in sizes {
        acc += s;
        offsets.push(acc);
    }
    offsets
}

/// Adjacent differences: `offsets` → `sizes`.
pub fn offsets_to_sizes(offsets: &[u64]) -> Vec<u64> {
    offsets.windows(2).map(|w| w[1] - w[0]).collect()
}
