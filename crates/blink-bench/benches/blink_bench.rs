//! Benchmarks for blink stack operations.
//!
//! Run with: `cargo bench`

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

use blink_cache::BudgetConfig;
use blink_core::{BitDepth, ImagePlane, PixelCoding};
use blink_cube::{AxisPermutation, BlinkRegistry, ContrastEngine, ContrastState, MultiFrameStack, RegistryConfig};

fn registry() -> BlinkRegistry {
    BlinkRegistry::new(RegistryConfig::with_budget(BudgetConfig::with_limit(1 << 30))).unwrap()
}

/// In-memory i16 stack with a gradient per frame.
fn stack(registry: &BlinkRegistry, size: usize, depth: usize) -> MultiFrameStack {
    let coding = PixelCoding::new(BitDepth::I16);
    let planes = (0..depth)
        .map(|z| {
            let values: Vec<f64> = (0..size * size).map(|i| ((i + z * 37) % 4096) as f64).collect();
            ImagePlane::from_display(size, size, vec![0; size * size], format!("f{z}"))
                .with_original(BitDepth::I16.encode_all(&values), coding)
                .unwrap()
        })
        .collect();
    registry.stack_from_images(planes, None).unwrap()
}

/// Benchmark remapping one coded slice to display pixels.
fn bench_remap(c: &mut Criterion) {
    let mut group = c.benchmark_group("remap");
    let engine = ContrastEngine::default();
    let coding = PixelCoding::new(BitDepth::I16);
    let state = ContrastState::new(0.0, 4095.0);

    for size in [256usize, 512, 1024] {
        let values: Vec<f64> = (0..size * size).map(|i| (i % 4096) as f64).collect();
        let coded = BitDepth::I16.encode_all(&values);
        group.throughput(Throughput::Elements((size * size) as u64));
        group.bench_with_input(BenchmarkId::new("i16_linear", size), &coded, |b, coded| {
            b.iter(|| engine.remap(black_box(coded), &coding, size, size, &state))
        });
    }

    group.finish();
}

/// Benchmark a synchronous stack-wide recut.
fn bench_recut_stack(c: &mut Criterion) {
    let mut group = c.benchmark_group("recut_stack");
    group.sample_size(20);
    let registry = registry();

    for depth in [8usize, 32] {
        let stack = stack(&registry, 256, depth);
        group.throughput(Throughput::Elements((256 * 256 * depth) as u64));
        group.bench_with_input(BenchmarkId::new("256px", depth), &stack, |b, stack| {
            b.iter(|| stack.recut_stack(black_box(0.0), black_box(4095.0), false).unwrap())
        });
    }

    group.finish();
}

/// Benchmark a width/depth transposition and its inverse.
fn bench_permute(c: &mut Criterion) {
    let mut group = c.benchmark_group("permute");
    group.sample_size(10);
    let registry = registry();

    for size in [64usize, 128] {
        let stack = stack(&registry, size, size);
        group.throughput(Throughput::Bytes((size * size * size * 2) as u64));
        group.bench_with_input(BenchmarkId::new("width_depth_round_trip", size), &stack, |b, stack| {
            b.iter(|| {
                stack.permute_axes(AxisPermutation::SwapWidthDepth).unwrap();
                stack.permute_axes(AxisPermutation::Natural).unwrap()
            })
        });
    }

    group.finish();
}

/// Benchmark voxel extraction across resident frames.
fn bench_extract(c: &mut Criterion) {
    let registry = registry();
    let stack = stack(&registry, 256, 16);

    c.bench_function("extract_64x64x16", |b| {
        b.iter(|| stack.extract_subvolume(black_box(96), black_box(96), 0, 64, 64, 16).unwrap())
    });
}

criterion_group!(benches, bench_remap, bench_recut_stack, bench_permute, bench_extract);
criterion_main!(benches);
