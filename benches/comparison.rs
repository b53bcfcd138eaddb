mod vs;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rust_vcfmerge::CompressionMode;
use vs::{in_memory, spilled};

const PATH: &str = "resources/example.vcf";

fn benchmark_parse(c: &mut Criterion) {
    let path = PATH;
    let mut group = c.benchmark_group("PARSE");
    group.bench_with_input(BenchmarkId::new("RECORDS", path), &path, |b, &path| {
        b.iter(|| in_memory::parse(path))
    });
}

fn benchmark_sort(c: &mut Criterion) {
    let path = PATH;
    let mut group = c.benchmark_group("SORT");
    group.bench_with_input(BenchmarkId::new("IN_MEMORY", path), &path, |b, &path| {
        b.iter(|| in_memory::sort(path))
    });
    for compression in [
        CompressionMode::None,
        CompressionMode::Gzip,
        CompressionMode::Bzip2,
    ] {
        let id = format!("SPILLED_{}", compression.to_string().to_uppercase());
        group.bench_with_input(BenchmarkId::new(id, path), &path, |b, &path| {
            b.iter(|| spilled::sort(path, compression))
        });
    }
}

criterion_group!(benches, benchmark_parse, benchmark_sort);
criterion_main!(benches);
