//! Inverted-file index.
//!
//! Build pipeline: k-means over the training set produces the coarse
//! centroids; the corpus is partitioned into the shuffled layout; optionally
//! every shuffled vector is PQ-encoded. The built index is read-only; there
//! is no online insert or delete.

use crate::context::Context;
use crate::error::{Result, SearchError};
use crate::ivf::partition::{partition, Partitioning};
use crate::kmeans::{KMeans, KMeansInit, KMeansParams};
use crate::matrix::{ColMajorMatrix, Feature};
use crate::pq::ProductQuantizer;

/// Product-quantization settings for an IVF index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PqParams {
    /// Number of subspaces M (dimension must be divisible by M).
    pub num_subspaces: usize,
    /// Bits per subspace code; the codebook has 2^bits entries.
    pub bits_per_subspace: u32,
}

impl Default for PqParams {
    fn default() -> Self {
        Self {
            num_subspaces: 8,
            bits_per_subspace: 8,
        }
    }
}

/// IVF build parameters.
#[derive(Debug, Clone, Copy)]
pub struct IvfParams {
    /// Partition count (k-means cluster count).
    pub nlist: usize,
    /// k-means Lloyd iterations.
    pub max_iter: usize,
    /// k-means tolerance. Reserved; see [`crate::kmeans::KMeansParams::tol`].
    pub tol: f64,
    /// When set, the shuffled corpus is also stored PQ-encoded and queries
    /// score candidates through distance tables.
    pub pq: Option<PqParams>,
}

impl Default for IvfParams {
    fn default() -> Self {
        Self {
            nlist: 100,
            max_iter: 10,
            tol: 1e-4,
            pq: None,
        }
    }
}

/// PQ-encoded form of the shuffled corpus.
#[derive(Debug, Clone)]
pub struct PqCodes {
    pub quantizer: ProductQuantizer,
    /// Shuffled-order codes, contiguous with stride `num_subspaces`.
    pub codes: Vec<u8>,
}

/// Inverted-file index over a corpus of fixed-dimension vectors.
#[derive(Debug, Clone)]
pub struct IvfIndex<T> {
    pub(crate) dimension: usize,
    pub(crate) params: IvfParams,
    pub(crate) centroids: ColMajorMatrix<f32>,
    pub(crate) partitioning: Partitioning<T>,
    pub(crate) pq: Option<PqCodes>,
}

impl<T: Feature> IvfIndex<T> {
    /// Cluster the corpus on itself and build the index.
    pub fn train(corpus: &ColMajorMatrix<T>, params: IvfParams, ctx: &Context) -> Result<Self> {
        Self::train_with(corpus, corpus, params, ctx)
    }

    /// Build the index with a separate training set for k-means and PQ.
    pub fn train_with(
        training: &ColMajorMatrix<T>,
        corpus: &ColMajorMatrix<T>,
        params: IvfParams,
        ctx: &Context,
    ) -> Result<Self> {
        if corpus.num_cols() == 0 {
            return Err(SearchError::EmptyIndex);
        }
        if training.num_rows() != corpus.num_rows() {
            return Err(SearchError::DimensionMismatch {
                expected: corpus.num_rows(),
                actual: training.num_rows(),
            });
        }
        let dimension = corpus.num_rows();

        let mut km_params = KMeansParams::new(params.nlist);
        km_params.max_iter = params.max_iter;
        km_params.tol = params.tol;
        let mut km = KMeans::new(dimension, km_params)?;
        km.train(training, KMeansInit::KMeansPlusPlus, ctx)?;
        let centroids = km.into_centroids().ok_or(SearchError::EmptyIndex)?;

        let partitioning = partition(&centroids, corpus, ctx)?;

        let pq = match params.pq {
            Some(pq_params) => {
                let mut quantizer = ProductQuantizer::new(
                    dimension,
                    pq_params.num_subspaces,
                    pq_params.bits_per_subspace,
                )?;
                quantizer.train(training, params.max_iter, ctx)?;
                let codes = ctx.run(|| quantizer.encode_all(&partitioning.shuffled_vectors));
                Some(PqCodes { quantizer, codes })
            }
            None => None,
        };

        Ok(Self {
            dimension,
            params,
            centroids,
            partitioning,
            pq,
        })
    }

    /// Assemble an index from already-built parts (used by persistence).
    pub fn from_parts(
        params: IvfParams,
        centroids: ColMajorMatrix<f32>,
        partitioning: Partitioning<T>,
        pq: Option<PqCodes>,
    ) -> Result<Self> {
        let dimension = centroids.num_rows();
        if partitioning.shuffled_vectors.num_rows() != dimension {
            return Err(SearchError::DimensionMismatch {
                expected: dimension,
                actual: partitioning.shuffled_vectors.num_rows(),
            });
        }
        if partitioning.nlist() != centroids.num_cols() {
            return Err(SearchError::InvalidParameter(format!(
                "offset index describes {} clusters but there are {} centroids",
                partitioning.nlist(),
                centroids.num_cols()
            )));
        }
        Ok(Self {
            dimension,
            params,
            centroids,
            partitioning,
            pq,
        })
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Total number of indexed vectors.
    #[inline]
    pub fn ntotal(&self) -> usize {
        self.partitioning.ntotal()
    }

    #[inline]
    pub fn nlist(&self) -> usize {
        self.centroids.num_cols()
    }

    pub fn params(&self) -> &IvfParams {
        &self.params
    }

    pub fn centroids(&self) -> &ColMajorMatrix<f32> {
        &self.centroids
    }

    pub fn partitioning(&self) -> &Partitioning<T> {
        &self.partitioning
    }

    pub fn pq(&self) -> Option<&PqCodes> {
        self.pq.as_ref()
    }

    pub fn is_pq(&self) -> bool {
        self.pq.is_some()
    }

    // Comparison helpers for persistence round-trip checks.

    pub fn compare_metadata(&self, other: &Self) -> bool {
        self.dimension == other.dimension
            && self.ntotal() == other.ntotal()
            && self.nlist() == other.nlist()
            && self.params.pq == other.params.pq
    }

    pub fn compare_centroids(&self, other: &Self) -> bool {
        self.centroids == other.centroids
    }

    pub fn compare_shuffled_ids(&self, other: &Self) -> bool {
        self.partitioning.shuffled_ids == other.partitioning.shuffled_ids
            && self.partitioning.offsets == other.partitioning.offsets
    }

    pub fn compare_shuffled_vectors(&self, other: &Self) -> bool {
        self.partitioning.shuffled_vectors == other.partitioning.shuffled_vectors
    }
}
