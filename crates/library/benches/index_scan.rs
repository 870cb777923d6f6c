//! Criterion benchmarks for the WOM index.
//!
//! Run: cargo bench -p library --features std --bench index_scan
//!
//! Results show:
//!   find_last_*  worst-case linear scan (key on the last page) vs index size
//!   iterate_all  full `next_entry` walk of a 10k-entry index
//!   build_*      IndexWriter throughput

#![allow(
    clippy::unwrap_used,              // benchmark helpers use unwrap for brevity
    clippy::expect_used,
    clippy::panic,
    missing_docs,                     // criterion_group! macro generates undocumented items
)]

use std::time::Duration;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use library::{IndexReader, IndexWriter};
use platform::config::INDEX_FILE_NAME;
use platform::storage_local::LocalFileStorage;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn title(n: u32) -> String {
    format!("Article {n:06}")
}

fn build_writer(entries: u32) -> IndexWriter {
    let mut w = IndexWriter::new();
    for n in 0..entries {
        w.add_article(&title(n), b"body").unwrap();
    }
    w
}

fn build_temp_index(entries: u32) -> TempDir {
    let tmp = TempDir::new().unwrap();
    build_writer(entries)
        .finish(&tmp.path().join(INDEX_FILE_NAME))
        .unwrap();
    tmp
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_find_last(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_last");
    group.measurement_time(Duration::from_secs(10));

    for entries in [1_000u32, 10_000, 50_000] {
        let tmp = build_temp_index(entries);
        let root = tmp.path().to_str().unwrap().to_owned();
        let last = title(entries.saturating_sub(1));

        group.bench_with_input(BenchmarkId::new("entries", entries), &root, |b, root| {
            let mut storage = LocalFileStorage::new(root);
            let mut reader = IndexReader::open(&mut storage, INDEX_FILE_NAME).unwrap();
            b.iter(|| {
                let hit = reader.find(last.as_bytes()).unwrap();
                assert!(hit.is_some());
            });
        });
    }
    group.finish();
}

fn bench_iterate_all(c: &mut Criterion) {
    let tmp = build_temp_index(10_000);
    let root = tmp.path().to_str().unwrap().to_owned();

    c.bench_function("iterate_all_10k", |b| {
        let mut storage = LocalFileStorage::new(&root);
        let mut reader = IndexReader::open(&mut storage, INDEX_FILE_NAME).unwrap();
        b.iter(|| {
            reader.rewind();
            let mut count = 0u32;
            while reader.next_entry().unwrap().is_some() {
                count = count.saturating_add(1);
            }
            assert_eq!(count, 10_000);
        });
    });
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");

    for entries in [1_000u32, 10_000] {
        group.bench_with_input(BenchmarkId::new("entries", entries), &entries, |b, &n| {
            b.iter(|| build_writer(n).into_bytes().unwrap());
        });
    }
    group.finish();
}

criterion_group!(benches, bench_find_last, bench_iterate_all, bench_build);
criterion_main!(benches);
