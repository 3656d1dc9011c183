use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rangedb::{FileStore, FileStoreConfig, MemoryStore, RangeBucket, RangeIterOptions};
use std::sync::Arc;
use std::time::Duration;

// Adjacent intervals of `width` points each
fn populated(count: u64, width: u64) -> RangeBucket<MemoryStore> {
    let bucket = RangeBucket::new(Arc::new(MemoryStore::new()), b"bench".to_vec());
    for i in 0..count {
        bucket.put(i * width, (i + 1) * width, i.to_be_bytes()).unwrap();
    }
    bucket
}

// Benchmark puts into empty space
fn bench_sequential_put(c: &mut Criterion) {
    let mut group = c.benchmark_group("sequential_put");
    group.measurement_time(Duration::from_secs(5));

    group.bench_function("memory", |b| {
        let bucket = RangeBucket::new(Arc::new(MemoryStore::new()), b"bench".to_vec());
        let mut next = 0u64;
        b.iter(|| {
            bucket.put(next, next + 10, black_box(b"owner")).unwrap();
            next += 10;
        })
    });

    let temp_dir = tempfile::tempdir().unwrap();
    let config = FileStoreConfig::with_path(temp_dir.path().join("bench.log")).with_sync_writes(false);
    let bucket = RangeBucket::new(Arc::new(FileStore::open(config).unwrap()), b"bench".to_vec());
    group.bench_function("file", |b| {
        let mut next = 0u64;
        b.iter(|| {
            bucket.put(next, next + 10, black_box(b"owner")).unwrap();
            next += 10;
        })
    });

    group.finish();
}

// Benchmark puts that split or swallow existing intervals
fn bench_overlapping_put(c: &mut Criterion) {
    let mut group = c.benchmark_group("overlapping_put");
    group.measurement_time(Duration::from_secs(5));

    for span in [5u64, 50, 500] {
        let bucket = populated(10_000, 10);
        let mut rng = StdRng::seed_from_u64(42);
        group.bench_with_input(BenchmarkId::from_parameter(span), &span, |b, &span| {
            b.iter(|| {
                let start = rng.gen_range(0..100_000 - span);
                bucket.put(start, start + span, black_box(b"new owner")).unwrap();
            })
        });
    }

    group.finish();
}

// Benchmark queries over a populated index
fn bench_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("get");
    let bucket = populated(100_000, 10);
    let mut rng = StdRng::seed_from_u64(7);

    for span in [1u64, 100, 10_000] {
        group.bench_with_input(BenchmarkId::new("window", span), &span, |b, &span| {
            b.iter(|| {
                let start = rng.gen_range(0..1_000_000 - span);
                black_box(bucket.get(start, start + span).unwrap())
            })
        });
    }

    group.bench_function("has_data_in_range", |b| {
        b.iter(|| {
            let start = rng.gen_range(0..999_000u64);
            black_box(bucket.has_data_in_range(start, start + 1_000).unwrap())
        })
    });

    group.bench_function("full_scan", |b| {
        b.iter(|| black_box(bucket.iterator(RangeIterOptions::new()).unwrap().count()))
    });

    group.finish();
}

criterion_group!(benches, bench_sequential_put, bench_overlapping_put, bench_get);
criterion_main!(benches);
