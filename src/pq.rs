//! Product quantization.
//!
//! Splits the dimension into M equal-width subspaces and trains one small
//! codebook per subspace with k-means. A vector is encoded as M code bytes;
//! distances against codes are table lookups:
//!
//! - *asymmetric*: a per-query M × C table of query-subvector-to-codeword
//!   distances; query-to-code distance is one lookup per subspace.
//! - *symmetric*: per-subspace C × C codeword-to-codeword tables computed
//!   once at training time; code-to-code distance is one lookup per subspace.

use crate::context::Context;
use crate::distance::sum_of_squares;
use crate::error::{Result, SearchError};
use crate::kmeans::{KMeans, KMeansInit, KMeansParams};
use crate::matrix::{ColMajorMatrix, Feature};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Trained product quantizer: per-subspace codebooks plus the symmetric
/// distance tables derived from them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductQuantizer {
    dimension: usize,
    num_subspaces: usize,
    bits_per_subspace: u32,
    sub_dimension: usize,
    /// One codebook per subspace, each of shape (D/M, C).
    codebooks: Vec<ColMajorMatrix<f32>>,
    /// One C × C table per subspace, flattened row-major: `t[c1 * C + c2]`.
    symmetric_tables: Vec<Vec<f32>>,
}

impl ProductQuantizer {
    pub fn new(dimension: usize, num_subspaces: usize, bits_per_subspace: u32) -> Result<Self> {
        if dimension == 0 || num_subspaces == 0 {
            return Err(SearchError::InvalidParameter(
                "dimension and subspace count must be greater than 0".to_string(),
            ));
        }
        if dimension % num_subspaces != 0 {
            return Err(SearchError::InvalidParameter(format!(
                "dimension {dimension} is not divisible by {num_subspaces} subspaces"
            )));
        }
        if bits_per_subspace == 0 || bits_per_subspace > 8 {
            return Err(SearchError::InvalidParameter(format!(
                "bits per subspace must be in 1..=8, got {bits_per_subspace}"
            )));
        }
        Ok(Self {
            dimension,
            num_subspaces,
            bits_per_subspace,
            sub_dimension: dimension / num_subspaces,
            codebooks: Vec::new(),
            symmetric_tables: Vec::new(),
        })
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    pub fn num_subspaces(&self) -> usize {
        self.num_subspaces
    }

    #[inline]
    pub fn bits_per_subspace(&self) -> u32 {
        self.bits_per_subspace
    }

    #[inline]
    pub fn sub_dimension(&self) -> usize {
        self.sub_dimension
    }

    /// Codewords per subspace (2^bits).
    #[inline]
    pub fn num_codewords(&self) -> usize {
        1 << self.bits_per_subspace
    }

    pub fn codebooks(&self) -> &[ColMajorMatrix<f32>] {
        &self.codebooks
    }

    pub fn is_trained(&self) -> bool {
        !self.codebooks.is_empty()
    }

    /// Train one codebook per subspace by k-means over the dimension slice,
    /// then precompute the symmetric tables.
    pub fn train<T: Feature>(
        &mut self,
        training: &ColMajorMatrix<T>,
        max_iter: usize,
        ctx: &Context,
    ) -> Result<()> {
        if training.num_rows() != self.dimension {
            return Err(SearchError::DimensionMismatch {
                expected: self.dimension,
                actual: training.num_rows(),
            });
        }

        let c = self.num_codewords();
        self.codebooks = Vec::with_capacity(self.num_subspaces);
        for m in 0..self.num_subspaces {
            let slice = self.subspace_slice(training, m);
            let mut params = KMeansParams::new(c);
            params.max_iter = max_iter;
            let mut km = KMeans::new(self.sub_dimension, params)?;
            km.train(&slice, KMeansInit::KMeansPlusPlus, &ctx.derive(m as u64))?;
            self.codebooks
                .push(km.into_centroids().ok_or(SearchError::EmptyIndex)?);
        }

        self.symmetric_tables = self
            .codebooks
            .iter()
            .map(|book| {
                let mut table = vec![0.0f32; c * c];
                for c1 in 0..c {
                    for c2 in 0..c {
                        table[c1 * c + c2] = sum_of_squares(book.column(c1), book.column(c2));
                    }
                }
                table
            })
            .collect();
        Ok(())
    }

    /// Project the training columns onto subspace `m` as an (D/M, N) matrix.
    fn subspace_slice<T: Feature>(
        &self,
        data: &ColMajorMatrix<T>,
        m: usize,
    ) -> ColMajorMatrix<f32> {
        let lo = m * self.sub_dimension;
        let hi = lo + self.sub_dimension;
        let mut out = ColMajorMatrix::<f32>::zeroed(self.sub_dimension, data.num_cols());
        for i in 0..data.num_cols() {
            let src = &data.column(i)[lo..hi];
            for (slot, x) in out.column_mut(i).iter_mut().zip(src) {
                *slot = x.to_f32();
            }
        }
        out
    }

    /// Encode one vector into `out` (length M).
    pub fn encode_into<T: Feature>(&self, v: &[T], out: &mut [u8]) {
        for (m, slot) in out.iter_mut().enumerate() {
            let lo = m * self.sub_dimension;
            let sub = &v[lo..lo + self.sub_dimension];
            let book = &self.codebooks[m];
            let mut best = 0usize;
            let mut best_score = f32::INFINITY;
            for cw in 0..book.num_cols() {
                let score = sum_of_squares(sub, book.column(cw));
                if score < best_score {
                    best_score = score;
                    best = cw;
                }
            }
            *slot = best as u8;
        }
    }

    /// Encode one vector to an M-byte code.
    pub fn encode<T: Feature>(&self, v: &[T]) -> Vec<u8> {
        let mut out = vec![0u8; self.num_subspaces];
        self.encode_into(v, &mut out);
        out
    }

    /// Encode every column; codes are laid out contiguously with stride M.
    pub fn encode_all<T: Feature>(&self, data: &ColMajorMatrix<T>) -> Vec<u8> {
        let m = self.num_subspaces;
        let mut codes = vec![0u8; data.num_cols() * m];
        codes
            .par_chunks_mut(m)
            .enumerate()
            .for_each(|(i, chunk)| self.encode_into(data.column(i), chunk));
        codes
    }

    /// Nearest reconstruction of a code: concatenated codewords.
    pub fn reconstruct(&self, code: &[u8]) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.dimension);
        for (m, &cw) in code.iter().enumerate() {
            out.extend_from_slice(self.codebooks[m].column(cw as usize));
        }
        out
    }

    /// Per-query asymmetric table, flattened as `t[m * C + c]`.
    pub fn asymmetric_table<T: Feature>(&self, query: &[T]) -> Result<Vec<f32>> {
        if query.len() != self.dimension {
            return Err(SearchError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        let c = self.num_codewords();
        let mut table = vec![0.0f32; self.num_subspaces * c];
        for m in 0..self.num_subspaces {
            let lo = m * self.sub_dimension;
            let sub = &query[lo..lo + self.sub_dimension];
            let book = &self.codebooks[m];
            let row = &mut table[m * c..(m + 1) * c];
            for (cw, slot) in row.iter_mut().enumerate() {
                *slot = sum_of_squares(sub, book.column(cw));
            }
        }
        Ok(table)
    }

    /// Query-to-code distance via a precomputed asymmetric table.
    #[inline]
    pub fn table_distance(&self, table: &[f32], code: &[u8]) -> f32 {
        let c = self.num_codewords();
        let mut total = 0.0f32;
        for (m, &cw) in code.iter().enumerate() {
            total += table[m * c + cw as usize];
        }
        total
    }

    /// Code-to-code distance via the symmetric tables.
    #[inline]
    pub fn symmetric_distance(&self, code_a: &[u8], code_b: &[u8]) -> f32 {
        let c = self.num_codewords();
        let mut total = 0.0f32;
        for (m, (&a, &b)) in code_a.iter().zip(code_b.iter()).enumerate() {
            total += self.symmetric_tables[m][a as usize * c + b as usize];
        }
        total
    }

    /// Average relative reconstruction error over a sample of `data`:
    /// `L2²(v, reconstruct(encode(v))) / L2²(v, 0)`.
    pub fn verify_encoding<T: Feature>(&self, data: &ColMajorMatrix<T>) -> f32 {
        let mut total = 0.0f64;
        let mut counted = 0usize;
        for i in sample_indices(data.num_cols(), 256) {
            let v = data.column(i);
            let recon = self.reconstruct(&self.encode(v));
            let norm: f32 = v.iter().map(|x| x.to_f32() * x.to_f32()).sum();
            if norm > 0.0 {
                total += f64::from(sum_of_squares(v, &recon) / norm);
                counted += 1;
            }
        }
        if counted == 0 {
            0.0
        } else {
            (total / counted as f64) as f32
        }
    }

    /// (average, max) relative error of reconstruction-based distances
    /// against true L2² over sampled pairs.
    pub fn verify_distances<T: Feature>(&self, data: &ColMajorMatrix<T>) -> (f32, f32) {
        self.verify_pairs(data, |a, b| {
            let ra = self.reconstruct(&self.encode(a));
            let rb = self.reconstruct(&self.encode(b));
            sum_of_squares(&ra, &rb)
        })
    }

    /// (average, max) relative error of asymmetric table distances against
    /// true L2² over sampled pairs.
    pub fn verify_asymmetric_distances<T: Feature>(&self, data: &ColMajorMatrix<T>) -> (f32, f32) {
        self.verify_pairs(data, |a, b| {
            let table = match self.asymmetric_table(a) {
                Ok(t) => t,
                Err(_) => return f32::INFINITY,
            };
            self.table_distance(&table, &self.encode(b))
        })
    }

    /// (average, max) relative error of symmetric table distances against
    /// true L2² over sampled pairs.
    pub fn verify_symmetric_distances<T: Feature>(&self, data: &ColMajorMatrix<T>) -> (f32, f32) {
        self.verify_pairs(data, |a, b| {
            self.symmetric_distance(&self.encode(a), &self.encode(b))
        })
    }

    fn verify_pairs<T: Feature>(
        &self,
        data: &ColMajorMatrix<T>,
        approx: impl Fn(&[T], &[T]) -> f32,
    ) -> (f32, f32) {
        let sample = sample_indices(data.num_cols(), 64);
        let mut total = 0.0f64;
        let mut max = 0.0f32;
        let mut counted = 0usize;
        for (a_pos, &i) in sample.iter().enumerate() {
            for &j in &sample[a_pos + 1..] {
                let exact = sum_of_squares(data.column(i), data.column(j));
                if exact == 0.0 {
                    continue;
                }
                let rel = (approx(data.column(i), data.column(j)) - exact).abs() / exact;
                total += f64::from(rel);
                max = max.max(rel);
                counted += 1;
            }
        }
        if counted == 0 {
            (0.0, 0.0)
        } else {
            ((total / counted as f64) as f32, max)
        }
    }
}

/// Up to `limit` column indices spread evenly over `n`.
fn sample_indices(n: usize, limit: usize) -> Vec<usize> {
    if n <= limit {
        (0..n).collect()
    } else {
        let stride = n / limit;
        (0..limit).map(|i| i * stride).collect()
    }
}
