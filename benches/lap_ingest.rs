//! Benchmarks for end-to-end ingestion into SQLite
//!
//! - First delivery (every entity and lap is new)
//! - Re-delivery of the same payload (resolution hits, upserts overwrite)
//!
//! Uses a scratch database under the system temp directory.

use apex_laps::test_utils::bulk_payload;
use apex_laps::{Database, ingest};
use criterion::{BatchSize, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use std::path::PathBuf;

fn scratch_path(name: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("apex-laps-bench-{}-{name}.db", std::process::id()));
    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
    }
    path
}

fn bench_first_delivery(c: &mut Criterion) {
    let payload = bulk_payload(20, 10);

    let mut group = c.benchmark_group("ingest_first_delivery");
    group.throughput(Throughput::Elements(200));
    group.sample_size(20);

    group.bench_function("20x10", |b| {
        b.iter_batched(
            || {
                let database = Database::open(scratch_path("first")).expect("open store");
                database.connect().expect("connect")
            },
            |mut store| black_box(ingest(&mut store, black_box(&payload)).expect("ingest")),
            BatchSize::PerIteration,
        )
    });

    group.finish();
}

fn bench_redelivery(c: &mut Criterion) {
    let payload = bulk_payload(20, 10);
    let database = Database::open(scratch_path("again")).expect("open store");
    let mut store = database.connect().expect("connect");
    ingest(&mut store, &payload).expect("seed store");

    let mut group = c.benchmark_group("ingest_redelivery");
    group.throughput(Throughput::Elements(200));

    group.bench_function("20x10", |b| {
        b.iter(|| black_box(ingest(&mut store, black_box(&payload)).expect("ingest")))
    });

    group.finish();
}

criterion_group!(benches, bench_first_delivery, bench_redelivery);
criterion_main!(benches);
