use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pakscan_analyzer::builder::{ExportSpec, PackageBuilder};
use pakscan_analyzer::{aggregate_dependents, analyze_package, ExtractOptions};
use pakscan_core::AssetSummary;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Package `i` with `exports` exports, each depending on a few of the
/// `packages` other packages.
fn make_package(i: usize, packages: usize, exports: usize) -> (String, Vec<u8>) {
    let mut b = PackageBuilder::new();
    let class = b.import_class("/Script/Engine", "StaticMesh");
    let deps: Vec<_> = (1..=4)
        .map(|k| b.import_package(&format!("/Game/P{}", (i * 7 + k * 13) % packages)))
        .collect();
    for e in 0..exports {
        let mut spec = ExportSpec::new(format!("Obj{e}")).class(class);
        if e == 0 {
            spec = spec.asset();
        }
        b.export(spec.depends(deps.iter().copied().chain([class])));
    }
    (format!("/Game/P{i}"), b.build())
}

fn make_summaries(count: usize) -> Vec<Option<AssetSummary>> {
    (0..count)
        .map(|i| {
            let (name, bytes) = make_package(i, count, 8);
            analyze_package(&bytes, &name, ExtractOptions::default()).ok()
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Benchmark: single package decode + extract
// ---------------------------------------------------------------------------

fn bench_analyze_package(c: &mut Criterion) {
    let mut group = c.benchmark_group("analyze_package");
    for exports in [1, 16, 128] {
        let (name, bytes) = make_package(0, 100, exports);
        group.bench_with_input(BenchmarkId::from_parameter(exports), &bytes, |b, bytes| {
            b.iter(|| black_box(analyze_package(bytes, &name, ExtractOptions::default()).unwrap()));
        });
    }
    group.finish();
}

// ---------------------------------------------------------------------------
// Benchmark: reverse aggregation
// ---------------------------------------------------------------------------

fn bench_aggregate(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregate_dependents");
    for count in [100, 1_000, 5_000] {
        let summaries = make_summaries(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &summaries, |b, s| {
            b.iter(|| {
                let mut slots = s.clone();
                black_box(aggregate_dependents(&mut slots))
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_analyze_package, bench_aggregate);
criterion_main!(benches);
