//! k-means clustering.
//!
//! Trains the coarse centroids for IVF partitioning and the per-subspace
//! codebooks for product quantization. Seeding is random, k-means++, or
//! caller-supplied; refinement is plain Lloyd iteration.
//!
//! Determinism: all randomness comes from the context seed. Assignment is a
//! pure parallel map and accumulation runs sequentially in column order, so
//! a given seed produces bit-identical centroids for any worker count.

use crate::context::Context;
use crate::distance::sum_of_squares;
use crate::error::{Result, SearchError};
use crate::matrix::{ColMajorMatrix, Feature};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

/// Centroid seeding mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KMeansInit {
    /// Pick cluster count training columns uniformly (with replacement).
    Random,
    /// k-means++ seeding: weight each next pick by squared distance to the
    /// nearest already-chosen centroid.
    KMeansPlusPlus,
    /// Use centroids previously supplied via [`KMeans::set_centroids`].
    None,
}

/// Trainer parameters.
#[derive(Debug, Clone, Copy)]
pub struct KMeansParams {
    /// Cluster count K.
    pub nlist: usize,
    /// Lloyd iterations to run.
    pub max_iter: usize,
    /// Convergence tolerance. Reserved: the trainer currently runs exactly
    /// `max_iter` iterations and never consults this field.
    pub tol: f64,
}

impl KMeansParams {
    pub fn new(nlist: usize) -> Self {
        Self {
            nlist,
            max_iter: 10,
            tol: 1e-4,
        }
    }
}

/// k-means trainer holding the centroid matrix.
#[derive(Debug, Clone)]
pub struct KMeans {
    dimension: usize,
    params: KMeansParams,
    centroids: Option<ColMajorMatrix<f32>>,
}

impl KMeans {
    pub fn new(dimension: usize, params: KMeansParams) -> Result<Self> {
        if dimension == 0 || params.nlist == 0 {
            return Err(SearchError::InvalidParameter(
                "dimension and cluster count must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            dimension,
            params,
            centroids: None,
        })
    }

    /// Supply externally computed centroids (used with [`KMeansInit::None`]).
    pub fn set_centroids(&mut self, centroids: ColMajorMatrix<f32>) -> Result<()> {
        if centroids.num_rows() != self.dimension {
            return Err(SearchError::DimensionMismatch {
                expected: self.dimension,
                actual: centroids.num_rows(),
            });
        }
        if centroids.num_cols() != self.params.nlist {
            return Err(SearchError::InvalidParameter(format!(
                "expected {} centroids, got {}",
                self.params.nlist,
                centroids.num_cols()
            )));
        }
        self.centroids = Some(centroids);
        Ok(())
    }

    pub fn centroids(&self) -> Option<&ColMajorMatrix<f32>> {
        self.centroids.as_ref()
    }

    /// Consume the trainer, returning the centroid matrix.
    pub fn into_centroids(self) -> Option<ColMajorMatrix<f32>> {
        self.centroids
    }

    /// Seed centroids and run Lloyd iterations over the training set.
    pub fn train<T: Feature>(
        &mut self,
        training: &ColMajorMatrix<T>,
        init: KMeansInit,
        ctx: &Context,
    ) -> Result<&ColMajorMatrix<f32>> {
        if training.num_rows() != self.dimension {
            return Err(SearchError::DimensionMismatch {
                expected: self.dimension,
                actual: training.num_rows(),
            });
        }
        if training.num_cols() < self.params.nlist {
            return Err(SearchError::InvalidParameter(format!(
                "cluster count {} exceeds training set size {}",
                self.params.nlist,
                training.num_cols()
            )));
        }
        if matches!(init, KMeansInit::None) && self.centroids.is_none() {
            return Err(SearchError::InvalidParameter(
                "init mode `none` requires centroids to be set".to_string(),
            ));
        }

        // One pool for the whole training run; the seeding and Lloyd loops
        // below use whatever pool is installed.
        ctx.run(|| {
            match init {
                KMeansInit::Random => self.random_init(training, ctx),
                KMeansInit::KMeansPlusPlus => self.kmeans_pp(training, ctx),
                KMeansInit::None => {}
            }
            self.lloyd(training, ctx)
        })?;
        self.centroids.as_ref().ok_or(SearchError::EmptyIndex)
    }

    /// Choose initial centroids uniformly at random from the training set.
    fn random_init<T: Feature>(&mut self, training: &ColMajorMatrix<T>, ctx: &Context) {
        let mut rng = StdRng::seed_from_u64(ctx.seed);
        let mut centroids = ColMajorMatrix::<f32>::zeroed(self.dimension, self.params.nlist);
        for i in 0..self.params.nlist {
            let choice = rng.random_range(0..training.num_cols());
            copy_as_f32(training.column(choice), centroids.column_mut(i));
        }
        self.centroids = Some(centroids);
    }

    /// k-means++ seeding.
    fn kmeans_pp<T: Feature>(&mut self, training: &ColMajorMatrix<T>, ctx: &Context) {
        let n = training.num_cols();
        let mut rng = StdRng::seed_from_u64(ctx.seed);
        let mut centroids = ColMajorMatrix::<f32>::zeroed(self.dimension, self.params.nlist);

        let choice = rng.random_range(0..n);
        copy_as_f32(training.column(choice), centroids.column_mut(0));

        // weights[j] tracks the squared distance from column j to the nearest
        // centroid chosen so far; only the newest centroid can lower it.
        let mut weights = vec![f64::MAX / 8.0; n];
        for i in 1..self.params.nlist {
            let newest: Vec<f32> = centroids.column(i - 1).to_vec();
            weights.par_iter_mut().enumerate().for_each(|(j, w)| {
                let d = f64::from(sum_of_squares(training.column(j), &newest));
                if d < *w {
                    *w = d;
                }
            });

            let total: f64 = weights.iter().sum();
            let threshold = rng.random::<f64>() * total;
            let mut cumulative = 0.0;
            let mut next = n - 1;
            for (j, &w) in weights.iter().enumerate() {
                cumulative += w;
                if cumulative >= threshold {
                    next = j;
                    break;
                }
            }

            copy_as_f32(training.column(next), centroids.column_mut(i));
            weights[next] = 0.0;
        }
        self.centroids = Some(centroids);
    }

    /// Lloyd iteration: assign, accumulate, normalize.
    fn lloyd<T: Feature>(&mut self, training: &ColMajorMatrix<T>, _ctx: &Context) -> Result<()> {
        let nlist = self.params.nlist;
        let dimension = self.dimension;

        for _ in 0..self.params.max_iter {
            let centroids = self
                .centroids
                .as_ref()
                .ok_or(SearchError::EmptyIndex)?;
            let parts = nearest_centroids(centroids, training);

            let mut sums = vec![0.0f32; dimension * nlist];
            let mut counts = vec![0u64; nlist];
            for (i, &part) in parts.iter().enumerate() {
                let c = part as usize;
                counts[c] += 1;
                let acc = &mut sums[c * dimension..(c + 1) * dimension];
                for (slot, x) in acc.iter_mut().zip(training.column(i)) {
                    *slot += x.to_f32();
                }
            }

            let centroids = self.centroids.as_mut().ok_or(SearchError::EmptyIndex)?;
            for c in 0..nlist {
                // A cluster with no members keeps its previous centroid.
                if counts[c] == 0 {
                    continue;
                }
                let inv = 1.0 / counts[c] as f32;
                let col = centroids.column_mut(c);
                for (slot, &sum) in col.iter_mut().zip(&sums[c * dimension..]) {
                    *slot = sum * inv;
                }
            }
        }
        Ok(())
    }
}

/// Nearest-centroid assignment for every column of `data`.
///
/// Runs on the currently installed rayon pool. Strict `<` comparison means
/// the lowest-index centroid wins ties, so the result is deterministic.
pub fn nearest_centroids<T: Feature>(
    centroids: &ColMajorMatrix<f32>,
    data: &ColMajorMatrix<T>,
) -> Vec<u32> {
    (0..data.num_cols())
        .into_par_iter()
        .map(|j| {
            let v = data.column(j);
            let mut best = 0u32;
            let mut best_score = f32::INFINITY;
            for c in 0..centroids.num_cols() {
                let score = sum_of_squares(v, centroids.column(c));
                if score < best_score {
                    best_score = score;
                    best = c as u32;
                }
            }
            best
        })
        .collect()
}

fn copy_as_f32<T: Feature>(src: &[T], dst: &mut [f32]) {
    for (slot, x) in dst.iter_mut().zip(src) {
        *slot = x.to_f32();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(columns: &[[f32; 2]]) -> ColMajorMatrix<f32> {
        let cols: Vec<Vec<f32>> = columns.iter().map(|c| c.to_vec()).collect();
        ColMajorMatrix::from_columns(&cols).unwrap()
    }

    // Eight 2-D points with three externally supplied centroids; after one
    // Lloyd iteration each centroid must equal the mean of the points
    // assigned to its seed.
    #[test]
    fn one_lloyd_iteration_matches_cluster_means() {
        let training = matrix(&[
            [1.0573647, 5.082087],
            [-6.229642, -1.3590931],
            [0.7446737, 6.3828287],
            [-7.698864, -3.0493321],
            [2.1362762, -4.4448104],
            [1.04019, -4.0389647],
            [0.38996044, 5.7235265],
            [1.7470839, -4.717076],
        ]);
        let seeds = matrix(&[
            [-6.964253, -2.2042127],
            [1.6411834, -4.400284],
            [0.7306664, 5.7294807],
        ]);

        let ctx = Context::new(0).with_threads(1);
        let mut params = KMeansParams::new(3);
        params.max_iter = 1;
        let mut km = KMeans::new(2, params).unwrap();
        km.set_centroids(seeds.clone()).unwrap();

        // Reference: assign to nearest seed, then average per cluster.
        let parts = nearest_centroids(&seeds, &training);
        let mut expected = vec![[0.0f32; 2]; 3];
        let mut counts = [0usize; 3];
        for (i, &p) in parts.iter().enumerate() {
            counts[p as usize] += 1;
            expected[p as usize][0] += training.get(0, i);
            expected[p as usize][1] += training.get(1, i);
        }
        for (mean, &count) in expected.iter_mut().zip(&counts) {
            assert!(count > 0);
            mean[0] /= count as f32;
            mean[1] /= count as f32;
        }

        let trained = km.train(&training, KMeansInit::None, &ctx).unwrap();
        for c in 0..3 {
            assert!((trained.get(0, c) - expected[c][0]).abs() < 1e-5);
            assert!((trained.get(1, c) - expected[c][1]).abs() < 1e-5);
        }
    }

    #[test]
    fn cluster_count_larger_than_training_set_is_rejected() {
        let training = matrix(&[[0.0, 0.0], [1.0, 1.0]]);
        let mut km = KMeans::new(2, KMeansParams::new(3)).unwrap();
        let err = km
            .train(&training, KMeansInit::Random, &Context::new(1))
            .unwrap_err();
        assert!(matches!(err, SearchError::InvalidParameter(_)));
    }

    #[test]
    fn init_none_without_centroids_is_rejected() {
        let training = matrix(&[[0.0, 0.0], [1.0, 1.0]]);
        let mut km = KMeans::new(2, KMeansParams::new(2)).unwrap();
        let err = km
            .train(&training, KMeansInit::None, &Context::new(1))
            .unwrap_err();
        assert!(matches!(err, SearchError::InvalidParameter(_)));
    }

    #[test]
    fn training_is_deterministic_for_a_seed() {
        let columns: Vec<[f32; 2]> = (0..32)
            .map(|i| {
                let x = (i as f32 * 0.7).sin() * 10.0;
                let y = (i as f32 * 1.3).cos() * 10.0;
                [x, y]
            })
            .collect();
        let training = matrix(&columns);

        let train_once = |threads: usize| {
            let ctx = Context::new(99).with_threads(threads);
            let mut km = KMeans::new(2, KMeansParams::new(4)).unwrap();
            km.train(&training, KMeansInit::KMeansPlusPlus, &ctx)
                .unwrap()
                .clone()
        };

        let a = train_once(1);
        let b = train_once(4);
        assert_eq!(a, b);
    }

    #[test]
    fn seeding_picks_actual_training_columns() {
        let columns: Vec<[f32; 2]> = (0..8).map(|i| [i as f32, -(i as f32)]).collect();
        let training = matrix(&columns);
        let ctx = Context::new(5);

        for init in [KMeansInit::Random, KMeansInit::KMeansPlusPlus] {
            let mut params = KMeansParams::new(3);
            params.max_iter = 0;
            let mut km = KMeans::new(2, params).unwrap();
            km.train(&training, init, &ctx).unwrap();
            let centroids = km.centroids().unwrap();
            for c in 0..centroids.num_cols() {
                let found = (0..training.num_cols())
                    .any(|j| training.column(j) == centroids.column(c));
                assert!(found, "centroid {c} is not a training column");
            }
        }
    }
}
