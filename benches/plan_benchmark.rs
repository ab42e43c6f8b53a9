//! Benchmarks for planning, slicing, and merging.
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pdfbatch::{all_kinds, ArtifactKind, BatchResult, MergedResult, PageRange};

#[path = "../src/testutil.rs"]
#[allow(dead_code)]
mod testutil;

use testutil::{sample_pdf, tree_pdf};

/// Benchmark batch planning for large page counts.
fn bench_planning(c: &mut Criterion) {
    c.bench_function("plan_10k_pages", |b| {
        b.iter(|| pdfbatch::plan(black_box(10_000), black_box(100)).unwrap());
    });
}

/// Benchmark sub-document slicing at various sizes.
fn bench_slicing(c: &mut Criterion) {
    let mut group = c.benchmark_group("slice");

    for page_count in [10u32, 100, 500, 2_000, 10_000].iter() {
        let doc = pdfbatch::inspect_bytes(&sample_pdf(*page_count)).unwrap();
        let range = PageRange::new(1, (*page_count).min(100)).unwrap();

        group.bench_function(format!("{}_pages", page_count), |b| {
            b.iter(|| doc.slice(black_box(range)).unwrap());
        });
    }

    // Pages spread over intermediate tree nodes, slicing from the middle.
    let doc = pdfbatch::inspect_bytes(&tree_pdf(10_000, 50)).unwrap();
    let range = PageRange::new(4_901, 5_000).unwrap();
    group.bench_function("10000_pages_nested", |b| {
        b.iter(|| doc.slice(black_box(range)).unwrap());
    });

    group.finish();
}

/// Benchmark merging many batches with colliding file names.
fn bench_merging(c: &mut Criterion) {
    c.bench_function("merge_100_batches", |b| {
        b.iter(|| {
            let mut merged = MergedResult::new(all_kinds());
            for i in 0..100u32 {
                let range = PageRange::new(i * 10 + 1, i * 10 + 10).unwrap();
                let batch = BatchResult::new()
                    .with_text("lorem ipsum dolor sit amet\n".repeat(20))
                    .with_file(ArtifactKind::Image, "fig1.png", vec![0; 64])
                    .with_file(ArtifactKind::Table, "table.csv", b"a,b\n1,2\n".to_vec());
                merged.merge(range, batch).unwrap();
            }
            merged
        });
    });
}

criterion_group!(benches, bench_planning, bench_slicing, bench_merging);
criterion_main!(benches);
