//! Benchmarks for the affinity Laplacian and both clusterers

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::prelude::*;
use rand_distr::StandardNormal;
use ruvector_infogeo::prelude::*;

/// Path-plus-grid information graph with noisy edge distances
fn generate_graph(side: usize, seed: u64) -> InformationGraph {
    let mut rng = StdRng::seed_from_u64(seed);
    let n = side * side;
    let nodes = (0..n).map(|i| NodeKey::spatial(format!("n{:05}", i))).collect();
    let counts = (0..n)
        .map(|i| {
            let share = if (i % side) < side / 2 { 0.8 } else { 0.2 };
            vec![100.0 * share, 100.0 * (1.0 - share)]
        })
        .collect();

    let mut edges = Vec::new();
    for i in 0..side {
        for j in 0..side {
            let a = i * side + j;
            let mut link = |b: usize| {
                let boundary = (a % side < side / 2) != (b % side < side / 2);
                let base = if boundary { 2.0 } else { 0.1 };
                let noise: f64 = rng.sample(StandardNormal);
                edges.push(InfoEdge {
                    source: a,
                    target: b,
                    distance: (base + 0.05 * noise).abs(),
                    kind: EdgeKind::Spatial,
                });
            };
            if j + 1 < side {
                link(a + 1);
            }
            if i + 1 < side {
                link(a + side);
            }
        }
    }

    InformationGraph::from_parts(nodes, counts, edges).unwrap()
}

fn bench_laplacian_spectrum(c: &mut Criterion) {
    let mut group = c.benchmark_group("laplacian_spectrum");
    group.sample_size(20);

    for side in [8, 16, 24] {
        let graph = generate_graph(side, 42);
        let affinity = AffinityMatrix::from_graph(&graph, 1.0).unwrap();

        for norm in [LaplacianNorm::Symmetric, LaplacianNorm::RandomWalk] {
            let laplacian = Laplacian::new(&affinity, norm);
            group.bench_with_input(
                BenchmarkId::new(format!("{:?}", norm), side * side),
                &laplacian,
                |b, lap| {
                    b.iter(|| black_box(lap).spectrum());
                },
            );
        }
    }

    group.finish();
}

fn bench_spectral_clustering(c: &mut Criterion) {
    let mut group = c.benchmark_group("spectral_clustering");
    group.sample_size(10);

    for side in [8, 16] {
        let graph = generate_graph(side, 42);
        let laplacian = Laplacian::random_walk(&AffinityMatrix::from_graph(&graph, 1.0).unwrap());

        for k in [2, 4] {
            let clusterer = SpectralClusterer::with_k(k);
            group.bench_with_input(
                BenchmarkId::new(format!("k={}", k), side * side),
                &laplacian,
                |b, lap| {
                    b.iter(|| clusterer.cluster(black_box(lap)));
                },
            );
        }
    }

    group.finish();
}

fn bench_agglomerative(c: &mut Criterion) {
    let mut group = c.benchmark_group("agglomerative");
    group.sample_size(20);

    for side in [8, 16, 32] {
        let graph = generate_graph(side, 7);
        let clusterer = AgglomerativeInfoClusterer::new();

        group.bench_with_input(BenchmarkId::new("dendrogram", side * side), &graph, |b, g| {
            b.iter(|| clusterer.cluster_with_defaults(black_box(g)));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_laplacian_spectrum,
    bench_spectral_clustering,
    bench_agglomerative,
);
criterion_main!(benches);
