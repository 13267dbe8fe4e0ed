//! Benchmarks for the distance kernels and the top-k container that
//! dominate query time.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use proxima::distance::{batch_sum_of_squares, sum_of_squares};
use proxima::{BoundedMinSet, ColMajorMatrix};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_matrix(dim: usize, n: usize, seed: u64) -> ColMajorMatrix<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    let data: Vec<f32> = (0..dim * n).map(|_| rng.random::<f32>() * 2.0 - 1.0).collect();
    ColMajorMatrix::from_flat(dim, n, data).expect("shape")
}

fn bench_sum_of_squares(c: &mut Criterion) {
    let mut group = c.benchmark_group("sum_of_squares");

    for dim in [64, 128, 256, 768].iter() {
        group.throughput(Throughput::Elements(*dim as u64));
        let m = random_matrix(*dim, 2, 42);

        group.bench_with_input(BenchmarkId::from_parameter(dim), dim, |bench, _| {
            bench.iter(|| sum_of_squares(black_box(m.column(0)), black_box(m.column(1))));
        });
    }

    group.finish();
}

fn bench_batch_scores(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_sum_of_squares");
    let dim = 128;

    for n in [100, 1000].iter() {
        group.throughput(Throughput::Elements(*n as u64));
        let db = random_matrix(dim, *n, 1);
        let queries = random_matrix(dim, 8, 2);

        group.bench_with_input(BenchmarkId::from_parameter(n), n, |bench, _| {
            bench.iter(|| batch_sum_of_squares(black_box(&db), black_box(&queries)));
        });
    }

    group.finish();
}

fn bench_minset_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("minset_insert");

    for k in [10, 100].iter() {
        group.throughput(Throughput::Elements(10_000));
        let mut rng = StdRng::seed_from_u64(7);
        let scores: Vec<f32> = (0..10_000).map(|_| rng.random()).collect();

        group.bench_with_input(BenchmarkId::from_parameter(k), k, |bench, &k| {
            bench.iter(|| {
                let mut set = BoundedMinSet::new(k);
                for (id, &s) in scores.iter().enumerate() {
                    set.insert(black_box(s), id as u32);
                }
                set.len()
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_sum_of_squares,
    bench_batch_scores,
    bench_minset_insert,
);
criterion_main!(benches);
