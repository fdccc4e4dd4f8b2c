// Read performance benchmarks for segkv

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use segkv::{Db, Options};
use std::hint::black_box;
use tempfile::TempDir;

fn populated_db(keys: usize) -> (TempDir, Db) {
    let temp_dir = TempDir::new().unwrap();
    let db = Db::open(temp_dir.path()).unwrap();

    for i in 0..keys {
        let key = format!("key{:08}", i);
        let value = format!("value{:08}", i);
        db.put(&key, &value).unwrap();
    }

    (temp_dir, db)
}

fn benchmark_sequential_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("sequential_read");

    for size in [100, 1000].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let (_dir, db) = populated_db(size);

            b.iter(|| {
                for i in 0..size {
                    let key = format!("key{:08}", i);
                    black_box(db.get(&key).unwrap());
                }
            });
        });
    }

    group.finish();
}

fn benchmark_random_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("random_read");

    group.throughput(Throughput::Elements(1000));
    group.bench_function("random_1000", |b| {
        let (_dir, db) = populated_db(1000);

        use rand::Rng;
        let mut rng = rand::rng();

        b.iter(|| {
            for _ in 0..1000 {
                let key = format!("key{:08}", rng.random_range(0..1000));
                black_box(db.get(&key).unwrap());
            }
        });
    });

    group.finish();
}

fn benchmark_read_across_segments(c: &mut Criterion) {
    let mut group = c.benchmark_group("read_across_segments");

    group.throughput(Throughput::Elements(1000));
    group.bench_function("segmented_1000", |b| {
        // Small segments spread the keys over many files
        let temp_dir = TempDir::new().unwrap();
        let options = Options::new().max_segment_size(4 * 1024).compaction_threshold(100);
        let db = Db::open_with_options(temp_dir.path(), options).unwrap();

        for i in 0..1000 {
            let key = format!("key{:08}", i);
            let value = format!("value{:08}", i);
            db.put(&key, &value).unwrap();
        }

        b.iter(|| {
            for i in 0..1000 {
                let key = format!("key{:08}", i);
                black_box(db.get(&key).unwrap());
            }
        });
    });

    group.finish();
}

criterion_group!(benches, benchmark_sequential_read, benchmark_random_read, benchmark_read_across_segments);
criterion_main!(benches);
