//! Directed weighted graph over vector ids.
//!
//! Out-edges carry the L2² score between the endpoints. The in-memory form
//! is one edge list per vertex; the persisted (arena) form is three flat
//! arrays: all scores, all destination ids, and an offset index of length
//! N+1 giving each vertex its edge span.

use crate::error::{Result, SearchError};
use smallvec::SmallVec;

type EdgeList = SmallVec<[(f32, u32); 16]>;

/// Adjacency lists indexed by vertex id.
#[derive(Debug, Clone, Default)]
pub struct AdjacencyGraph {
    edges: Vec<EdgeList>,
}

impl AdjacencyGraph {
    /// Graph with `num_vertices` vertices and no edges.
    pub fn new(num_vertices: usize) -> Self {
        Self {
            edges: vec![EdgeList::new(); num_vertices],
        }
    }

    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.edges.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.iter().map(|list| list.len()).sum()
    }

    #[inline]
    pub fn out_edges(&self, v: u32) -> &[(f32, u32)] {
        &self.edges[v as usize]
    }

    #[inline]
    pub fn out_degree(&self, v: u32) -> usize {
        self.edges[v as usize].len()
    }

    pub fn add_edge(&mut self, src: u32, dst: u32, score: f32) {
        self.edges[src as usize].push((score, dst));
    }

    pub fn clear_edges(&mut self, v: u32) {
        self.edges[v as usize].clear();
    }

    pub fn has_edge(&self, src: u32, dst: u32) -> bool {
        self.edges[src as usize].iter().any(|&(_, d)| d == dst)
    }

    /// Flatten into `(adj_scores, adj_ids, adj_index)`; `adj_index` has
    /// length N+1 and `adj_index[v]..adj_index[v+1]` is the edge span of v.
    pub fn to_arena(&self) -> (Vec<f32>, Vec<u32>, Vec<u64>) {
        let total = self.num_edges();
        let mut scores = Vec::with_capacity(total);
        let mut ids = Vec::with_capacity(total);
        let mut index = Vec::with_capacity(self.edges.len() + 1);
        let mut offset = 0u64;
        for list in &self.edges {
            index.push(offset);
            for &(s, dst) in list {
                scores.push(s);
                ids.push(dst);
            }
            offset += list.len() as u64;
        }
        index.push(offset);
        (scores, ids, index)
    }

    /// Rebuild from the arena form.
    pub fn from_arena(scores: &[f32], ids: &[u32], index: &[u64]) -> Result<Self> {
        if scores.len() != ids.len() {
            return Err(SearchError::InvalidParameter(format!(
                "adjacency arrays disagree: {} scores, {} ids",
                scores.len(),
                ids.len()
            )));
        }
        if index.is_empty() || index[index.len() - 1] as usize != ids.len() {
            return Err(SearchError::InvalidParameter(
                "adjacency index does not cover the edge arrays".to_string(),
            ));
        }
        let mut graph = Self::new(index.len() - 1);
        for v in 0..graph.num_vertices() {
            let start = index[v] as usize;
            let end = index[v + 1] as usize;
            if start > end || end > ids.len() {
                return Err(SearchError::InvalidParameter(format!(
                    "adjacency index entry {v} is out of order"
                )));
            }
            for j in start..end {
                graph.add_edge(v as u32, ids[j], scores[j]);
            }
        }
        Ok(graph)
    }
}
