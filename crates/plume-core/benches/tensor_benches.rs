//! Benchmarks for tensor broadcasting and stacking.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use plume_core::{batch, laplace, spatial, Dim, Extrapolation, Tensor};

fn bench_broadcast(c: &mut Criterion) {
    let grid = Tensor::ones(spatial(&[("x", 64), ("y", 64)]));
    let per_batch = Tensor::ones(batch("b", 8));

    c.bench_function("add_broadcast_64x64x8", |b| {
        b.iter(|| black_box(&grid).try_add(black_box(&per_batch)))
    });

    let transposed = Tensor::ones(spatial(&[("y", 64), ("x", 64)]));
    c.bench_function("add_transposed_64x64", |b| {
        b.iter(|| black_box(&grid).try_add(black_box(&transposed)))
    });
}

fn bench_stack(c: &mut Criterion) {
    let items: Vec<Tensor> = (0..32).map(|i| Tensor::vector(&[i as f64, 0.0, 1.0])).collect();

    c.bench_function("stack_32_vectors", |b| {
        b.iter(|| Tensor::stack(black_box(&items), Dim::instance("points", 0)))
    });

    let stacked = Tensor::stack(&items, Dim::instance("points", 0)).unwrap();
    c.bench_function("unstack_32_vectors", |b| {
        b.iter(|| black_box(&stacked).unstack("points"))
    });
}

fn bench_laplace(c: &mut Criterion) {
    let grid = Tensor::linspace(0.0, 1.0, Dim::spatial("x", 128))
        .expand(Dim::spatial("y", 128))
        .unwrap();

    c.bench_function("laplace_128x128", |b| {
        b.iter(|| laplace(black_box(&grid), 1.0, Extrapolation::Periodic))
    });
}

criterion_group!(benches, bench_broadcast, bench_stack, bench_laplace);
criterion_main!(benches);
