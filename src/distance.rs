//! Distance kernels.
//!
//! Every index in this crate scores candidates by squared Euclidean distance
//! (L2²). Scores are accumulated in `f32` regardless of the storage element
//! type.

use crate::matrix::{ColMajorMatrix, Feature};

/// Squared Euclidean distance between two vectors.
///
/// The slices may have different element types (e.g. a `u8` corpus column
/// against `f32` centroids). Mismatched lengths return `f32::INFINITY` so the
/// pair is never selected as a nearest neighbor.
#[inline]
#[must_use]
pub fn sum_of_squares<A: Feature, B: Feature>(a: &[A], b: &[B]) -> f32 {
    if a.len() != b.len() {
        return f32::INFINITY;
    }
    let mut acc = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        let d = x.to_f32() - y.to_f32();
        acc += d * d;
    }
    acc
}

/// Column-wise sum of squares: `out[i] = Σ_j m(j, i)²`.
#[must_use]
pub fn col_sum_of_squares<T: Feature>(m: &ColMajorMatrix<T>) -> Vec<f32> {
    (0..m.num_cols())
        .map(|i| {
            m.column(i)
                .iter()
                .map(|x| {
                    let v = x.to_f32();
                    v * v
                })
                .sum()
        })
        .collect()
}

/// Batched score matrix: `scores(i, j) = L2²(db[:, i], queries[:, j])`.
///
/// Expands the square as ‖a‖² + ‖b‖² − 2·a·b so the column norms are computed
/// once. This is the portable formulation of a GEMM-backed batch distance.
#[must_use]
pub fn batch_sum_of_squares<T: Feature>(
    db: &ColMajorMatrix<T>,
    queries: &ColMajorMatrix<T>,
) -> ColMajorMatrix<f32> {
    let db_norms = col_sum_of_squares(db);
    let q_norms = col_sum_of_squares(queries);

    let mut scores = ColMajorMatrix::<f32>::zeroed(db.num_cols(), queries.num_cols());
    for j in 0..queries.num_cols() {
        let q = queries.column(j);
        let out = scores.column_mut(j);
        for (i, slot) in out.iter_mut().enumerate() {
            let mut dot = 0.0f32;
            for (x, y) in db.column(i).iter().zip(q.iter()) {
                dot += x.to_f32() * y.to_f32();
            }
            // Clamp: the expanded form can go slightly negative from rounding.
            *slot = (db_norms[i] + q_norms[j] - 2.0 * dot).max(0.0);
        }
    }
    scores
}
