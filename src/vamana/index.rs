//! Vamana index: build by repeated greedy search + RobustPrune, query by
//! greedy search from the medoid.

use crate::context::Context;
use crate::error::{Result, SearchError};
use crate::matrix::{ColMajorMatrix, Feature};
use crate::vamana::graph::AdjacencyGraph;
use crate::vamana::search::{greedy_search, medoid, robust_prune};
use rayon::prelude::*;

/// Vamana build/query parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VamanaParams {
    /// Candidate list size L (build-time and default query-time).
    pub l_build: usize,
    /// Degree bound R.
    pub r_max_degree: usize,
    /// Backtrack list size. Reserved; 0 means "same as L".
    pub b_backtrack: usize,
    /// Pruning slack for the documented two-pass variant's first pass.
    pub alpha_min: f32,
    /// Pruning slack used by the training pass.
    pub alpha_max: f32,
}

impl Default for VamanaParams {
    fn default() -> Self {
        Self {
            l_build: 100,
            r_max_degree: 64,
            b_backtrack: 0,
            alpha_min: 1.0,
            alpha_max: 1.2,
        }
    }
}

/// Graph index over a corpus of fixed-dimension vectors.
#[derive(Debug, Clone)]
pub struct VamanaIndex<T> {
    pub(crate) dimension: usize,
    pub(crate) params: VamanaParams,
    pub(crate) vectors: ColMajorMatrix<T>,
    pub(crate) graph: AdjacencyGraph,
    pub(crate) medoid: u32,
}

impl<T: Feature> VamanaIndex<T> {
    /// Build the graph over `corpus`.
    ///
    /// One pass at `alpha_max` in ascending id order: for each vertex p,
    /// greedy-search the current graph from the medoid toward p, prune p's
    /// neighborhood from the visited set, then backlink: every new neighbor
    /// j gets the edge j → p, pruning j first if that would exceed R.
    pub fn train(corpus: &ColMajorMatrix<T>, params: VamanaParams, ctx: &Context) -> Result<Self> {
        let n = corpus.num_cols();
        if n == 0 {
            return Err(SearchError::EmptyIndex);
        }
        if params.l_build == 0 || params.r_max_degree == 0 {
            return Err(SearchError::InvalidParameter(
                "L and R must be at least 1".to_string(),
            ));
        }

        let vectors = corpus.clone();
        let mut graph = AdjacencyGraph::new(n);
        let medoid = medoid(&vectors);
        let alpha = params.alpha_max;

        for p in 0..n as u32 {
            let found = greedy_search(
                &graph,
                &vectors,
                medoid,
                vectors.column(p as usize),
                1,
                params.l_build,
                ctx.stats(),
            );
            robust_prune(
                &mut graph,
                &vectors,
                p,
                found.visited,
                alpha,
                params.r_max_degree,
            );

            let new_edges: Vec<(f32, u32)> = graph.out_edges(p).to_vec();
            for (score_pj, j) in new_edges {
                let mut linked: Vec<u32> =
                    graph.out_edges(j).iter().map(|&(_, dst)| dst).collect();
                if !linked.contains(&p) {
                    linked.push(p);
                }
                if linked.len() > params.r_max_degree {
                    robust_prune(
                        &mut graph,
                        &vectors,
                        j,
                        linked,
                        alpha,
                        params.r_max_degree,
                    );
                } else if !graph.has_edge(j, p) {
                    graph.add_edge(j, p, score_pj);
                }
            }
        }

        Ok(Self {
            dimension: vectors.num_rows(),
            params,
            vectors,
            graph,
            medoid,
        })
    }

    /// Assemble an index from already-built parts (used by persistence).
    pub fn from_parts(
        params: VamanaParams,
        vectors: ColMajorMatrix<T>,
        graph: AdjacencyGraph,
        medoid: u32,
    ) -> Result<Self> {
        if graph.num_vertices() != vectors.num_cols() {
            return Err(SearchError::InvalidParameter(format!(
                "graph has {} vertices for {} vectors",
                graph.num_vertices(),
                vectors.num_cols()
            )));
        }
        if (medoid as usize) >= vectors.num_cols() {
            return Err(SearchError::InvalidParameter(format!(
                "medoid {} out of range",
                medoid
            )));
        }
        Ok(Self {
            dimension: vectors.num_rows(),
            params,
            vectors,
            graph,
            medoid,
        })
    }

    /// Top-k for a batch of queries; `l` defaults to the build-time L and
    /// must be at least k.
    pub fn query(
        &self,
        queries: &ColMajorMatrix<T>,
        k: usize,
        l: Option<usize>,
        ctx: &Context,
    ) -> Result<(ColMajorMatrix<f32>, ColMajorMatrix<u32>)> {
        let l = l.unwrap_or(self.params.l_build);
        self.validate(queries.num_rows(), k, l)?;

        let per_query: Vec<(Vec<f32>, Vec<u32>)> = ctx.run(|| {
            (0..queries.num_cols())
                .into_par_iter()
                .map(|j| {
                    let found = greedy_search(
                        &self.graph,
                        &self.vectors,
                        self.medoid,
                        queries.column(j),
                        k,
                        l,
                        ctx.stats(),
                    );
                    (found.scores, found.ids)
                })
                .collect()
        });

        let nq = queries.num_cols();
        let mut scores = ColMajorMatrix::<f32>::zeroed(k, nq);
        let mut ids = ColMajorMatrix::<u32>::zeroed(k, nq);
        for (j, (qs, qi)) in per_query.into_iter().enumerate() {
            for i in 0..k {
                scores.set(i, j, qs.get(i).copied().unwrap_or(f32::INFINITY));
                ids.set(i, j, qi.get(i).copied().unwrap_or(u32::MAX));
            }
        }
        Ok((scores, ids))
    }

    /// Top-k for a single query vector.
    pub fn query_one(
        &self,
        query: &[T],
        k: usize,
        l: Option<usize>,
        ctx: &Context,
    ) -> Result<(Vec<f32>, Vec<u32>)> {
        let l = l.unwrap_or(self.params.l_build);
        self.validate(query.len(), k, l)?;
        let found = greedy_search(
            &self.graph,
            &self.vectors,
            self.medoid,
            query,
            k,
            l,
            ctx.stats(),
        );
        Ok((found.scores, found.ids))
    }

    fn validate(&self, query_dim: usize, k: usize, l: usize) -> Result<()> {
        if query_dim != self.dimension {
            return Err(SearchError::DimensionMismatch {
                expected: self.dimension,
                actual: query_dim,
            });
        }
        if k == 0 {
            return Err(SearchError::InvalidParameter("k must be at least 1".to_string()));
        }
        if k > l {
            return Err(SearchError::InvalidParameter(format!(
                "k {k} exceeds search list size {l}"
            )));
        }
        Ok(())
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    pub fn ntotal(&self) -> usize {
        self.vectors.num_cols()
    }

    #[inline]
    pub fn medoid(&self) -> u32 {
        self.medoid
    }

    pub fn params(&self) -> &VamanaParams {
        &self.params
    }

    pub fn graph(&self) -> &AdjacencyGraph {
        &self.graph
    }

    pub fn vectors(&self) -> &ColMajorMatrix<T> {
        &self.vectors
    }

    // Comparison helpers for persistence round-trip checks.

    pub fn compare_metadata(&self, other: &Self) -> bool {
        self.dimension == other.dimension
            && self.ntotal() == other.ntotal()
            && self.params == other.params
            && self.medoid == other.medoid
    }

    pub fn compare_feature_vectors(&self, other: &Self) -> bool {
        self.vectors == other.vectors
    }

    pub fn compare_graph_edges(&self, other: &Self) -> bool {
        if self.graph.num_vertices() != other.graph.num_vertices() {
            return false;
        }
        (0..self.graph.num_vertices() as u32)
            .all(|v| self.graph.out_edges(v) == other.graph.out_edges(v))
    }
}
