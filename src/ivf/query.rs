//! IVF query engines.
//!
//! Both paths share the same plan: pick the `nprobe` nearest centroids per
//! query, score every vector in the probed clusters, and keep the k best in
//! a bounded min-set. The infinite-RAM path walks the resident shuffled
//! corpus directly; the finite-RAM path streams the probed clusters through
//! fixed-size blocks so at most `blocksize` vectors are materialized at
//! once.
//!
//! Result guarantee: the per-query top-k is the k smallest `(score, id)`
//! pairs under the lexicographic order (smaller id wins ties), so it is
//! identical across thread counts and block sizes.

use crate::context::Context;
use crate::distance::sum_of_squares;
use crate::error::{Result, SearchError};
use crate::ivf::index::IvfIndex;
use crate::ivf::partition::Partitioning;
use crate::matrix::{ColMajorMatrix, Feature, VectorArray};
use crate::minset::BoundedMinSet;
use rayon::prelude::*;
use smallvec::SmallVec;
use std::collections::BTreeSet;

type ProbeList = SmallVec<[u32; 16]>;

/// Top-`nprobe` centroid ids for every query, sorted ascending by id.
pub(crate) fn select_probes<T: Feature>(
    centroids: &ColMajorMatrix<f32>,
    queries: &ColMajorMatrix<T>,
    nprobe: usize,
) -> Vec<ProbeList> {
    (0..queries.num_cols())
        .into_par_iter()
        .map(|j| {
            let q = queries.column(j);
            let mut set = BoundedMinSet::new(nprobe);
            for c in 0..centroids.num_cols() {
                set.insert(sum_of_squares(q, centroids.column(c)), c as u32);
            }
            let mut probes: ProbeList = set.drain_sorted().into_iter().map(|(_, c)| c).collect();
            probes.sort_unstable();
            probes
        })
        .collect()
}

/// Pack drained per-query rankings into k-row column-major result matrices.
/// Unfilled slots (fewer than k candidates gathered) are padded with
/// `f32::INFINITY` / `u32::MAX`.
fn assemble_results(
    per_query: Vec<Vec<(f32, u32)>>,
    k: usize,
) -> (ColMajorMatrix<f32>, ColMajorMatrix<u32>) {
    let nq = per_query.len();
    let mut scores = ColMajorMatrix::<f32>::zeroed(k, nq);
    let mut ids = ColMajorMatrix::<u32>::zeroed(k, nq);
    for (j, ranked) in per_query.into_iter().enumerate() {
        let score_col = scores.column_mut(j);
        for (i, slot) in score_col.iter_mut().enumerate() {
            *slot = ranked.get(i).map_or(f32::INFINITY, |&(s, _)| s);
        }
        let id_col = ids.column_mut(j);
        for (i, slot) in id_col.iter_mut().enumerate() {
            *slot = ranked.get(i).map_or(u32::MAX, |&(_, id)| id);
        }
    }
    (scores, ids)
}

/// One streamed block: whole clusters gathered into a resident matrix.
struct Block<T> {
    /// `(cluster, local_start, len)` sorted ascending by cluster id.
    clusters: Vec<(u32, usize, usize)>,
    matrix: ColMajorMatrix<T>,
    ids: Vec<u32>,
    codes: Option<Vec<u8>>,
}

impl<T: Feature> VectorArray<T> for Block<T> {
    fn dimension(&self) -> usize {
        self.matrix.num_rows()
    }

    fn num_vectors(&self) -> usize {
        self.matrix.num_cols()
    }

    fn vector(&self, i: usize) -> &[T] {
        self.matrix.column(i)
    }
}

/// Restartable sequence of partition blocks. Clusters are packed greedily in
/// offset order; the cumulative block size never exceeds the budget except
/// when a single cluster is larger than the budget, in which case that
/// cluster becomes its own oversized block (clusters are never split).
struct PartitionBlocks<'a, T> {
    partitioning: &'a Partitioning<T>,
    codes: Option<(&'a [u8], usize)>,
    active: Vec<u32>,
    pos: usize,
    budget: usize,
}

impl<'a, T: Feature> PartitionBlocks<'a, T> {
    fn new(
        partitioning: &'a Partitioning<T>,
        codes: Option<(&'a [u8], usize)>,
        active: Vec<u32>,
        budget: usize,
    ) -> Self {
        Self {
            partitioning,
            codes,
            active,
            pos: 0,
            budget,
        }
    }

    fn next_block(&mut self) -> Option<Block<T>> {
        if self.pos >= self.active.len() {
            return None;
        }

        let mut clusters: Vec<(u32, usize, usize)> = Vec::new();
        let mut total = 0usize;
        while self.pos < self.active.len() {
            let c = self.active[self.pos];
            let size = self.partitioning.cluster_size(c as usize);
            if !clusters.is_empty() && total + size > self.budget {
                break;
            }
            clusters.push((c, total, size));
            total += size;
            self.pos += 1;
            if total >= self.budget {
                break;
            }
        }

        let dim = self.partitioning.shuffled_vectors.num_rows();
        let mut matrix = ColMajorMatrix::<T>::zeroed(dim, total);
        let mut ids = Vec::with_capacity(total);
        let mut codes = self.codes.map(|(_, stride)| Vec::with_capacity(total * stride));
        for &(c, local_start, _) in &clusters {
            let range = self.partitioning.cluster_range(c as usize);
            for (offset, j) in range.clone().enumerate() {
                matrix.copy_column_from(
                    local_start + offset,
                    &self.partitioning.shuffled_vectors,
                    j,
                );
            }
            ids.extend_from_slice(&self.partitioning.shuffled_ids[range.clone()]);
            if let (Some(out), Some((all_codes, stride))) = (codes.as_mut(), self.codes) {
                out.extend_from_slice(&all_codes[range.start * stride..range.end * stride]);
            }
        }

        Some(Block {
            clusters,
            matrix,
            ids,
            codes,
        })
    }
}

impl<T: Feature> IvfIndex<T> {
    fn validate_query(
        &self,
        queries: &ColMajorMatrix<T>,
        k: usize,
        nprobe: usize,
    ) -> Result<()> {
        if self.ntotal() == 0 {
            return Err(SearchError::EmptyIndex);
        }
        if queries.num_rows() != self.dimension {
            return Err(SearchError::DimensionMismatch {
                expected: self.dimension,
                actual: queries.num_rows(),
            });
        }
        if k == 0 {
            return Err(SearchError::InvalidParameter("k must be at least 1".to_string()));
        }
        if k > self.ntotal() {
            return Err(SearchError::InvalidParameter(format!(
                "k {} exceeds index size {}",
                k,
                self.ntotal()
            )));
        }
        if nprobe == 0 {
            return Err(SearchError::InvalidParameter(
                "nprobe must be at least 1".to_string(),
            ));
        }
        if nprobe > self.nlist() {
            return Err(SearchError::InvalidParameter(format!(
                "nprobe {} exceeds partition count {}",
                nprobe,
                self.nlist()
            )));
        }
        Ok(())
    }

    /// Per-query asymmetric PQ tables, or `None` for a raw index.
    fn pq_tables(&self, queries: &ColMajorMatrix<T>) -> Result<Option<Vec<Vec<f32>>>> {
        match &self.pq {
            Some(pq) => {
                let tables = (0..queries.num_cols())
                    .into_par_iter()
                    .map(|j| pq.quantizer.asymmetric_table(queries.column(j)))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Some(tables))
            }
            None => Ok(None),
        }
    }

    /// Top-k query with the whole shuffled corpus resident.
    ///
    /// Returns k-row column-major matrices of scores and original ids, one
    /// column per query, ascending by score.
    pub fn query_infinite_ram(
        &self,
        queries: &ColMajorMatrix<T>,
        k: usize,
        nprobe: usize,
        ctx: &Context,
    ) -> Result<(ColMajorMatrix<f32>, ColMajorMatrix<u32>)> {
        self.validate_query(queries, k, nprobe)?;

        ctx.run(|| {
            let probe_lists = select_probes(&self.centroids, queries, nprobe);
            let tables = self.pq_tables(queries)?;

            if let Some(stats) = ctx.stats() {
                let probed: u64 = probe_lists.iter().map(|p| p.len() as u64).sum();
                stats.add_partitions_loaded(probed);
            }

            let per_query: Vec<Vec<(f32, u32)>> = (0..queries.num_cols())
                .into_par_iter()
                .map(|qi| {
                    let q = queries.column(qi);
                    let mut heap = BoundedMinSet::new(k);
                    let mut comps = 0u64;
                    for &c in &probe_lists[qi] {
                        for j in self.partitioning.cluster_range(c as usize) {
                            let score = match (&self.pq, &tables) {
                                (Some(pq), Some(tables)) => {
                                    let stride = pq.quantizer.num_subspaces();
                                    let code = &pq.codes[j * stride..(j + 1) * stride];
                                    pq.quantizer.table_distance(&tables[qi], code)
                                }
                                _ => sum_of_squares(
                                    q,
                                    self.partitioning.shuffled_vectors.column(j),
                                ),
                            };
                            heap.insert(score, self.partitioning.shuffled_ids[j]);
                            comps += 1;
                        }
                    }
                    if let Some(stats) = ctx.stats() {
                        stats.add_distance_comps(comps);
                    }
                    heap.drain_sorted()
                })
                .collect();

            Ok(assemble_results(per_query, k))
        })
    }

    /// Top-k query streaming the probed clusters within a RAM budget of
    /// `blocksize` vectors.
    ///
    /// Produces the same per-query result set as
    /// [`query_infinite_ram`](Self::query_infinite_ram) for any budget.
    pub fn query_finite_ram(
        &self,
        queries: &ColMajorMatrix<T>,
        k: usize,
        nprobe: usize,
        blocksize: usize,
        ctx: &Context,
    ) -> Result<(ColMajorMatrix<f32>, ColMajorMatrix<u32>)> {
        self.validate_query(queries, k, nprobe)?;
        if blocksize == 0 {
            return Err(SearchError::InvalidParameter(
                "blocksize must be at least 1".to_string(),
            ));
        }

        ctx.run(|| {
            let probe_lists = select_probes(&self.centroids, queries, nprobe);
            let tables = self.pq_tables(queries)?;

            // Invert the probe plan: the clusters any query wants, ascending,
            // skipping empty ones.
            let active: Vec<u32> = probe_lists
                .iter()
                .flat_map(|p| p.iter().copied())
                .filter(|&c| self.partitioning.cluster_size(c as usize) > 0)
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();

            let codes = self
                .pq
                .as_ref()
                .map(|pq| (pq.codes.as_slice(), pq.quantizer.num_subspaces()));
            let mut blocks =
                PartitionBlocks::new(&self.partitioning, codes, active, blocksize);

            let mut heaps: Vec<BoundedMinSet> =
                (0..queries.num_cols()).map(|_| BoundedMinSet::new(k)).collect();

            while let Some(block) = blocks.next_block() {
                if let Some(stats) = ctx.stats() {
                    stats.add_blocks_loaded(1);
                    stats.add_partitions_loaded(block.clusters.len() as u64);
                }

                heaps.par_iter_mut().enumerate().for_each(|(qi, heap)| {
                    let q = queries.column(qi);
                    for &c in &probe_lists[qi] {
                        let Ok(slot) =
                            block.clusters.binary_search_by_key(&c, |&(id, _, _)| id)
                        else {
                            continue;
                        };
                        let (_, local_start, len) = block.clusters[slot];
                        for j in local_start..local_start + len {
                            let score = match (&self.pq, &tables, &block.codes) {
                                (Some(pq), Some(tables), Some(codes)) => {
                                    let stride = pq.quantizer.num_subspaces();
                                    let code = &codes[j * stride..(j + 1) * stride];
                                    pq.quantizer.table_distance(&tables[qi], code)
                                }
                                _ => sum_of_squares(q, block.vector(j)),
                            };
                            heap.insert(score, block.ids[j]);
                        }
                    }
                });
            }

            let per_query: Vec<Vec<(f32, u32)>> =
                heaps.into_iter().map(BoundedMinSet::drain_sorted).collect();
            Ok(assemble_results(per_query, k))
        })
    }
}
