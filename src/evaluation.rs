//! Recall accounting against a ground-truth ranking.

use crate::matrix::ColMajorMatrix;
use std::collections::HashSet;

/// Count, per query column, how many of the first k found ids appear in the
/// first k ground-truth ids, summed over all columns.
pub fn count_intersections(
    found: &ColMajorMatrix<u32>,
    truth: &ColMajorMatrix<u32>,
    k: usize,
) -> usize {
    let mut total = 0;
    for j in 0..found.num_cols().min(truth.num_cols()) {
        let truth_set: HashSet<u32> = truth.column(j).iter().take(k).copied().collect();
        total += found
            .column(j)
            .iter()
            .take(k)
            .filter(|id| truth_set.contains(id))
            .count();
    }
    total
}

/// Recall@k: `|found ∩ truth| / (num_queries · k)`.
pub fn recall(found: &ColMajorMatrix<u32>, truth: &ColMajorMatrix<u32>, k: usize) -> f64 {
    let nq = found.num_cols().min(truth.num_cols());
    if nq == 0 || k == 0 {
        return 0.0;
    }
    count_intersections(found, truth, k) as f64 / (nq * k) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_rankings_have_full_recall() {
        let ids = ColMajorMatrix::from_flat(3, 2, vec![1u32, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(count_intersections(&ids, &ids, 3), 6);
        assert_eq!(recall(&ids, &ids, 3), 1.0);
    }

    #[test]
    fn order_within_a_column_does_not_matter() {
        let found = ColMajorMatrix::from_flat(3, 1, vec![3u32, 1, 2]).unwrap();
        let truth = ColMajorMatrix::from_flat(3, 1, vec![1u32, 2, 3]).unwrap();
        assert_eq!(recall(&found, &truth, 3), 1.0);
    }

    #[test]
    fn disjoint_rankings_have_zero_recall() {
        let found = ColMajorMatrix::from_flat(2, 1, vec![8u32, 9]).unwrap();
        let truth = ColMajorMatrix::from_flat(2, 1, vec![1u32, 2]).unwrap();
        assert_eq!(recall(&found, &truth, 2), 0.0);
    }
}
