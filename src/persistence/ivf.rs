//! IVF index persistence.
//!
//! Group layout: metadata keys `dimension`, `ntotal`, `nlist`,
//! `num_subspaces`, `bits_per_subspace`, `size_index`; member arrays
//! `partition_centroids`, `partition_indexes`, `shuffled_vector_ids`,
//! `shuffled_vectors`, and for PQ indexes `pq_codebooks` + `pq_codes`.
//!
//! `partition_indexes` holds offsets when `size_index` is false and cluster
//! sizes when it is true; the reader derives one from the other by prefix
//! sum.

use crate::error::{Result, SearchError};
use crate::ivf::index::{IvfIndex, IvfParams, PqCodes, PqParams};
use crate::ivf::partition::{sizes_to_offsets, Partitioning};
use crate::matrix::{ColMajorMatrix, Feature};
use crate::persistence::group::{metadata_bool, metadata_u64, Group};
use crate::pq::ProductQuantizer;
use std::path::Path;

const CENTROIDS: &str = "partition_centroids";
const INDEXES: &str = "partition_indexes";
const IDS: &str = "shuffled_vector_ids";
const VECTORS: &str = "shuffled_vectors";
const PQ_CODEBOOKS: &str = "pq_codebooks";
const PQ_CODES: &str = "pq_codes";

impl<T: Feature> IvfIndex<T> {
    /// Persist the index as a group under `path`.
    pub fn write_index(&self, path: &Path) -> Result<()> {
        self.write_index_with(path, false)
    }

    /// Persist the index, storing `partition_indexes` as cluster sizes
    /// instead of offsets when `size_index` is set.
    pub fn write_index_with(&self, path: &Path, size_index: bool) -> Result<()> {
        let mut group = Group::create(path)?;

        group.put_metadata("dimension", self.dimension() as u64);
        group.put_metadata("ntotal", self.ntotal() as u64);
        group.put_metadata("nlist", self.nlist() as u64);
        let (num_subspaces, bits) = match self.pq() {
            Some(pq) => (
                pq.quantizer.num_subspaces() as u64,
                u64::from(pq.quantizer.bits_per_subspace()),
            ),
            None => (0, 0),
        };
        group.put_metadata("num_subspaces", num_subspaces);
        group.put_metadata("bits_per_subspace", bits);
        group.put_metadata("size_index", size_index);

        group.write_matrix(CENTROIDS, self.centroids())?;
        let partitioning = self.partitioning();
        if size_index {
            let sizes = crate::ivf::partition::offsets_to_sizes(&partitioning.offsets);
            group.write_vector(INDEXES, &sizes)?;
        } else {
            group.write_vector(INDEXES, &partitioning.offsets)?;
        }
        group.write_vector(IDS, &partitioning.shuffled_ids)?;
        group.write_matrix(VECTORS, &partitioning.shuffled_vectors)?;

        if let Some(pq) = self.pq() {
            group.write_vector(PQ_CODEBOOKS, pq.quantizer.codebooks())?;
            group.write_vector(PQ_CODES, &pq.codes)?;
            // The quantizer itself carries the symmetric tables; persist it
            // whole so a load does not retrain them.
            let encoded = bincode::serialize(&pq.quantizer)
                .map_err(|e| SearchError::Persistence(e.to_string()))?;
            group.write_vector("pq_quantizer", &encoded)?;
        }

        group.finish()?;
        Ok(())
    }

    /// Load a persisted index from `path`.
    pub fn read_index(path: &Path) -> Result<Self> {
        let group = Group::open(path)?;

        let dimension = metadata_u64(&group, "dimension")? as usize;
        let ntotal = metadata_u64(&group, "ntotal")? as usize;
        let nlist = metadata_u64(&group, "nlist")? as usize;
        let num_subspaces = metadata_u64(&group, "num_subspaces")? as usize;
        let bits_per_subspace = metadata_u64(&group, "bits_per_subspace")? as u32;
        let size_index = metadata_bool(&group, "size_index")?;

        let centroids: ColMajorMatrix<f32> = group.read_matrix(CENTROIDS, None)?;
        let indexes: Vec<u64> = group.read_vector(INDEXES)?;
        let offsets = if size_index {
            sizes_to_offsets(&indexes)
        } else {
            indexes
        };
        let shuffled_ids: Vec<u32> = group.read_vector(IDS)?;
        let shuffled_vectors: ColMajorMatrix<T> = group.read_matrix(VECTORS, None)?;

        if shuffled_vectors.num_rows() != dimension || shuffled_vectors.num_cols() != ntotal {
            return Err(SearchError::InvalidParameter(format!(
                "shuffled vectors are {}x{}, metadata says {}x{}",
                shuffled_vectors.num_rows(),
                shuffled_vectors.num_cols(),
                dimension,
                ntotal
            )));
        }
        if offsets.len() != nlist + 1 {
            return Err(SearchError::InvalidParameter(format!(
                "partition index has {} entries for {} clusters",
                offsets.len(),
                nlist
            )));
        }

        let pq = if num_subspaces > 0 {
            let encoded: Vec<u8> = group.read_vector("pq_quantizer")?;
            let quantizer: ProductQuantizer = bincode::deserialize(&encoded)
                .map_err(|e| SearchError::Persistence(e.to_string()))?;
            let codes: Vec<u8> = group.read_vector(PQ_CODES)?;
            if quantizer.num_subspaces() != num_subspaces
                || quantizer.bits_per_subspace() != bits_per_subspace
            {
                return Err(SearchError::UnsupportedDatatype(
                    "pq_quantizer disagrees with group metadata".to_string(),
                ));
            }
            Some(PqCodes { quantizer, codes })
        } else {
            None
        };

        let params = IvfParams {
            nlist,
            pq: pq.as_ref().map(|p| PqParams {
                num_subspaces: p.quantizer.num_subspaces(),
                bits_per_subspace: p.quantizer.bits_per_subspace(),
            }),
            ..IvfParams::default()
        };

        IvfIndex::from_parts(
            params,
            centroids,
            Partitioning {
                offsets,
                shuffled_vectors,
                shuffled_ids,
            },
            pq,
        )
    }
}
