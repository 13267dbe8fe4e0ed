//! Brute-force top-k query.
//!
//! Scans every corpus column per query. Exact, and the recall baseline for
//! the approximate indexes; shares the bounded min-set merge and the result
//! shape of the IVF engine.

use crate::context::Context;
use crate::distance::sum_of_squares;
use crate::error::{Result, SearchError};
use crate::matrix::{ColMajorMatrix, Feature};
use crate::minset::BoundedMinSet;
use rayon::prelude::*;

/// Exact top-k per query column, sharded over queries.
///
/// Returns k-row column-major matrices of scores and ids, ascending by
/// score; ties broken by smaller id.
pub fn qv_query_heap<T: Feature>(
    db: &ColMajorMatrix<T>,
    queries: &ColMajorMatrix<T>,
    k: usize,
    ctx: &Context,
) -> Result<(ColMajorMatrix<f32>, ColMajorMatrix<u32>)> {
    if db.num_cols() == 0 {
        return Err(SearchError::EmptyIndex);
    }
    if queries.num_rows() != db.num_rows() {
        return Err(SearchError::DimensionMismatch {
            expected: db.num_rows(),
            actual: queries.num_rows(),
        });
    }
    if k == 0 || k > db.num_cols() {
        return Err(SearchError::InvalidParameter(format!(
            "k must be in 1..={}, got {k}",
            db.num_cols()
        )));
    }

    let per_query: Vec<Vec<(f32, u32)>> = ctx.run(|| {
        (0..queries.num_cols())
            .into_par_iter()
            .map(|j| {
                let q = queries.column(j);
                let mut heap = BoundedMinSet::new(k);
                for i in 0..db.num_cols() {
                    heap.insert(sum_of_squares(q, db.column(i)), i as u32);
                }
                heap.drain_sorted()
            })
            .collect()
    });

    let nq = queries.num_cols();
    let mut scores = ColMajorMatrix::<f32>::zeroed(k, nq);
    let mut ids = ColMajorMatrix::<u32>::zeroed(k, nq);
    for (j, ranked) in per_query.into_iter().enumerate() {
        for (i, (s, id)) in ranked.into_iter().enumerate() {
            scores.set(i, j, s);
            ids.set(i, j, id);
        }
    }
    Ok((scores, ids))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_exact_neighbors_on_a_line() {
        let db = ColMajorMatrix::from_columns(&[
            vec![0.0f32],
            vec![1.0],
            vec![2.0],
            vec![3.0],
            vec![4.0],
        ])
        .unwrap();
        let queries = ColMajorMatrix::from_columns(&[vec![2.2f32]]).unwrap();

        let (scores, ids) = qv_query_heap(&db, &queries, 3, &Context::new(0)).unwrap();
        assert_eq!(ids.column(0), &[2, 3, 1]);
        assert!(scores.column(0).windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn rejects_k_zero_and_oversized_k() {
        let db = ColMajorMatrix::<f32>::zeroed(2, 4);
        let q = ColMajorMatrix::<f32>::zeroed(2, 1);
        assert!(qv_query_heap(&db, &q, 0, &Context::new(0)).is_err());
        assert!(qv_query_heap(&db, &q, 5, &Context::new(0)).is_err());
    }
}
