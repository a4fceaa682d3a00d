//! Benchmarks for the TAD container format: write, sequential read, indexing
//! and tag-list decoding.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tad_format::{Array, ElementType, TadStream, TagList};

/// Edge lengths of the square float32 arrays written per file.
const SIZES: [u64; 3] = [64, 256, 1024];

/// Create a tagged square float32 array.
fn test_array(edge: u64) -> Array {
    let mut array = Array::new([edge, edge], 1, ElementType::Float32).unwrap();
    for (i, chunk) in array.data_mut().chunks_exact_mut(4).enumerate() {
        chunk.copy_from_slice(&(i as f32).to_ne_bytes());
    }
    array
        .global_tags_mut()
        .set("TITLE", "benchmark")
        .unwrap()
        .set("EDGE", edge.to_string())
        .unwrap();
    array.dimension_tags_mut(0).set("INTERPRETATION", "X").unwrap();
    array.dimension_tags_mut(1).set("INTERPRETATION", "Y").unwrap();
    array
}

/// Write `count` arrays to a temp file and return the temp dir + path.
fn write_test_file(edge: u64, count: usize) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bench.tad");
    let array = test_array(edge);

    let mut stream = TadStream::create(&path).unwrap();
    for _ in 0..count {
        stream.write_array(&array).unwrap();
    }
    stream.close().unwrap();

    (dir, path)
}

fn bench_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("tad_write");
    for edge in SIZES {
        let array = test_array(edge);
        group.bench_with_input(BenchmarkId::new("edge", edge), &array, |b, array| {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("bench.tad");
            b.iter(|| {
                let mut stream = TadStream::create(black_box(&path)).unwrap();
                stream.write_array(black_box(array)).unwrap();
                stream.close().unwrap();
            });
        });
    }
    group.finish();
}

fn bench_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("tad_read");
    for edge in SIZES {
        let (_dir, path) = write_test_file(edge, 4);
        group.bench_with_input(BenchmarkId::new("edge", edge), &path, |b, path| {
            b.iter(|| {
                let mut stream = TadStream::open(black_box(path)).unwrap();
                while stream.has_more().unwrap() {
                    black_box(stream.read_next().unwrap());
                }
            });
        });
    }
    group.finish();
}

fn bench_index(c: &mut Criterion) {
    let mut group = c.benchmark_group("tad_index");
    for count in [16usize, 256, 4096] {
        let (_dir, path) = write_test_file(8, count);
        group.bench_with_input(BenchmarkId::new("arrays", count), &path, |b, path| {
            b.iter(|| {
                let mut stream = TadStream::open(black_box(path)).unwrap();
                black_box(stream.array_count().unwrap());
            });
        });
    }
    group.finish();
}

fn bench_taglist_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("taglist_decode");
    for entries in [4usize, 64, 1024] {
        let mut tags = TagList::new();
        for i in 0..entries {
            tags.set(format!("KEY_{i}"), format!("value number {i}"))
                .unwrap();
        }
        let bytes = tags.to_bytes();
        group.bench_with_input(BenchmarkId::new("entries", entries), &bytes, |b, bytes| {
            b.iter(|| black_box(TagList::from_bytes(black_box(bytes)).unwrap()));
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_write,
    bench_read,
    bench_index,
    bench_taglist_decode
);
criterion_main!(benches);
