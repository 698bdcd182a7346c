//! CBOR codec and collation benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use quarry_bench::random_rows;
use quarry_codec::{from_cbor_record, to_cbor_record, Value};

/// Benchmark encoding single values.
fn bench_encode_simple(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");

    for (name, value) in [
        ("null", Value::Null),
        ("integer", Value::Int(42)),
        ("float", Value::Float(3.25)),
        ("text_short", Value::Text("hello".into())),
        ("text_long", Value::Text("x".repeat(1000))),
        ("blob", Value::Blob(vec![0xAB; 1000])),
    ] {
        let record = [value];
        group.bench_function(name, |b| {
            b.iter(|| black_box(to_cbor_record(black_box(&record))));
        });
    }
    group.finish();
}

/// Benchmark record round trips of growing width.
fn bench_records(c: &mut Criterion) {
    let mut group = c.benchmark_group("record");

    for width in [1, 10, 100].iter() {
        let record: Vec<Value> = random_rows(*width).into_iter().flatten().collect();
        let bytes = to_cbor_record(&record);
        group.throughput(Throughput::Bytes(bytes.len() as u64));
        group.bench_with_input(BenchmarkId::new("encode", width), &record, |b, record| {
            b.iter(|| black_box(to_cbor_record(black_box(record))));
        });
        group.bench_with_input(BenchmarkId::new("decode", width), &bytes, |b, bytes| {
            b.iter(|| black_box(from_cbor_record(black_box(bytes)).unwrap()));
        });
    }
    group.finish();
}

/// Benchmark sorting rows by collation.
fn bench_collate(c: &mut Criterion) {
    let mut group = c.benchmark_group("collate");

    for count in [100, 10_000].iter() {
        let rows = random_rows(*count);
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::new("sort_rows", count), &rows, |b, rows| {
            b.iter(|| {
                let mut sorted = rows.clone();
                sorted.sort_by(|a, b| Value::collate_rows(a, b));
                black_box(sorted);
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_encode_simple, bench_records, bench_collate);
criterion_main!(benches);
