//! Vamana index persistence.
//!
//! Group layout: metadata keys `dimension`, `ntotal`, `L`, `R`, `B`,
//! `alpha_min`, `alpha_max`, `medioid` (the historical spelling is the wire
//! format); member arrays `feature_vectors`, `adj_scores`, `adj_ids`, and
//! `adj_index` (length N+1, `adj_index[i]..adj_index[i+1]` is the edge span
//! of vertex i).

use crate::error::{Result, SearchError};
use crate::matrix::{ColMajorMatrix, Feature};
use crate::persistence::group::{metadata_f32, metadata_u64, Group};
use crate::vamana::graph::AdjacencyGraph;
use crate::vamana::index::{VamanaIndex, VamanaParams};
use std::path::Path;

const VECTORS: &str = "feature_vectors";
const ADJ_SCORES: &str = "adj_scores";
const ADJ_IDS: &str = "adj_ids";
const ADJ_INDEX: &str = "adj_index";

impl<T: Feature> VamanaIndex<T> {
    /// Persist the index as a group under `path`.
    pub fn write_index(&self, path: &Path) -> Result<()> {
        let mut group = Group::create(path)?;

        let params = self.params();
        group.put_metadata("dimension", self.dimension() as u64);
        group.put_metadata("ntotal", self.ntotal() as u64);
        group.put_metadata("L", params.l_build as u64);
        group.put_metadata("R", params.r_max_degree as u64);
        group.put_metadata("B", params.b_backtrack as u64);
        group.put_metadata("alpha_min", f64::from(params.alpha_min));
        group.put_metadata("alpha_max", f64::from(params.alpha_max));
        group.put_metadata("medioid", u64::from(self.medoid()));

        group.write_matrix(VECTORS, self.vectors())?;

        let (adj_scores, adj_ids, adj_index) = self.graph().to_arena();
        group.write_vector(ADJ_SCORES, &adj_scores)?;
        group.write_vector(ADJ_IDS, &adj_ids)?;
        group.write_vector(ADJ_INDEX, &adj_index)?;

        group.finish()?;
        Ok(())
    }

    /// Load a persisted index from `path`.
    pub fn read_index(path: &Path) -> Result<Self> {
        let group = Group::open(path)?;

        let dimension = metadata_u64(&group, "dimension")? as usize;
        let ntotal = metadata_u64(&group, "ntotal")? as usize;
        let params = VamanaParams {
            l_build: metadata_u64(&group, "L")? as usize,
            r_max_degree: metadata_u64(&group, "R")? as usize,
            b_backtrack: metadata_u64(&group, "B")? as usize,
            alpha_min: metadata_f32(&group, "alpha_min")?,
            alpha_max: metadata_f32(&group, "alpha_max")?,
        };
        let medoid = metadata_u64(&group, "medioid")? as u32;

        let vectors: ColMajorMatrix<T> = group.read_matrix(VECTORS, None)?;
        if vectors.num_rows() != dimension || vectors.num_cols() != ntotal {
            return Err(SearchError::InvalidParameter(format!(
                "feature vectors are {}x{}, metadata says {}x{}",
                vectors.num_rows(),
                vectors.num_cols(),
                dimension,
                ntotal
            )));
        }

        let adj_scores: Vec<f32> = group.read_vector(ADJ_SCORES)?;
        let adj_ids: Vec<u32> = group.read_vector(ADJ_IDS)?;
        let adj_index: Vec<u64> = group.read_vector(ADJ_INDEX)?;
        let graph = AdjacencyGraph::from_arena(&adj_scores, &adj_ids, &adj_index)?;

        VamanaIndex::from_parts(params, vectors, graph, medoid)
    }
}
