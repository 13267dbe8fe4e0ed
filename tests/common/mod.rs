//! Shared fixtures for the integration suites.

use proxima::ColMajorMatrix;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Clustered corpus: `num_blobs` centers drawn uniformly from [0, 100)^dim,
/// points jittered around them. Blob membership cycles with the index, so a
/// stride over columns covers all blobs.
pub fn blob_corpus(
    n: usize,
    dim: usize,
    num_blobs: usize,
    noise: f32,
    seed: u64,
) -> ColMajorMatrix<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    let centers: Vec<Vec<f32>> = (0..num_blobs)
        .map(|_| (0..dim).map(|_| rng.random::<f32>() * 100.0).collect())
        .collect();

    let mut cols = Vec::with_capacity(n);
    for i in 0..n {
        let center = &centers[i % num_blobs];
        let col: Vec<f32> = center
            .iter()
            .map(|&c| c + (rng.random::<f32>() * 2.0 - 1.0) * noise)
            .collect();
        cols.push(col);
    }
    ColMajorMatrix::from_columns(&cols).expect("fixture columns are uniform")
}

/// Split a corpus fixture into (corpus, queries): the last `nq` columns
/// become the held-out query set.
pub fn split_queries(data: ColMajorMatrix<f32>, nq: usize) -> (ColMajorMatrix<f32>, ColMajorMatrix<f32>) {
    let n = data.num_cols();
    let corpus_cols: Vec<Vec<f32>> = (0..n - nq).map(|i| data.column(i).to_vec()).collect();
    let query_cols: Vec<Vec<f32>> = (n - nq..n).map(|i| data.column(i).to_vec()).collect();
    (
        ColMajorMatrix::from_columns(&corpus_cols).expect("uniform"),
        ColMajorMatrix::from_columns(&query_cols).expect("uniform"),
    )
}
