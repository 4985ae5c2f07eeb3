//! Benchmarks for compilation and batch evaluation.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use solidus::prelude::*;

/// A torus-like surface: a circle swept around an axis, scaled by a bump.
fn surface(arena: &mut ExprArena) -> ExprHandle {
    let u = arena.parameter(0, 2).unwrap();
    let v = arena.parameter(1, 2).unwrap();
    let tube = Matrix::from_rows(&[
        vec![0.25, 0.0, 0.0],
        vec![0.0, 0.25, 0.0],
        vec![0.0, 0.0, 0.25],
    ]);
    let sphere = arena.elliptical(&tube, &[1.0, 0.0, 0.0], &[true, false]).unwrap();
    let bump = arena.sin(u).unwrap();
    let bump = arena.product(bump, v).unwrap();
    let scale = arena.add_scalar(bump, 2.0).unwrap();
    let scaled = arena.product(scale, sphere).unwrap();
    let n = arena.normalized(scaled);
    let axis = arena.constant(&[0.0, 0.0, 1.0], 2).unwrap();
    arena.cross(n, axis).unwrap()
}

fn grid(columns: usize) -> Matrix<f64> {
    #[allow(clippy::cast_precision_loss)]
    let points: Vec<Vec<f64>> = (0..columns)
        .map(|j| {
            let t = j as f64 / columns as f64;
            vec![6.0 * t, 3.0 * (1.0 - t)]
        })
        .collect();
    Matrix::from_columns(&points)
}

/// Benchmark compilation of values and Jacobians.
fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");

    let mut arena = ExprArena::new();
    let f = surface(&mut arena);

    group.bench_function("value", |b| b.iter(|| black_box(compile::<f64>(&arena, f))));
    group.bench_function("jacobian", |b| {
        b.iter(|| black_box(compile_jacobian::<f64>(&arena, f)))
    });

    group.finish();
}

/// Benchmark batch evaluation in both domains.
fn bench_evaluate(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluate");

    let mut arena = ExprArena::new();
    let f = surface(&mut arena);
    let exact = compile::<f64>(&arena, f);
    let bounds = compile::<Interval>(&arena, f);

    for size in [16, 256, 4096] {
        let points = grid(size);
        group.bench_with_input(BenchmarkId::new("f64", size), &points, |b, points| {
            b.iter(|| black_box(exact.evaluate(points).unwrap()))
        });

        let boxes = points.map(|x| Interval::new(x, x + 0.01));
        group.bench_with_input(BenchmarkId::new("interval", size), &boxes, |b, boxes| {
            b.iter(|| black_box(bounds.evaluate(boxes).unwrap()))
        });

        let config = ParallelConfig {
            parallel_threshold: 256,
            chunk_columns: 256,
        };
        group.bench_with_input(BenchmarkId::new("parallel", size), &points, |b, points| {
            b.iter(|| black_box(evaluate_parallel(&exact, points, &config).unwrap()))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_compile, bench_evaluate);
criterion_main!(benches);
