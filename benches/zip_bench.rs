//! Extraction and packing throughput benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::{Rng, SeedableRng};
use std::fs::File;
use std::io::{Cursor, Write};
use std::path::Path;
use tempfile::TempDir;
use ziparc_core::{
    create_archive, extract_archive, extract_stream, ExtractOptions, NoProgress, PackOptions,
};
use ziparc_testing::{Method, StreamedZipBuilder};

/// Fill `dir` with `file_count` files of `file_size` bytes each
fn create_test_files(dir: &Path, file_count: usize, file_size: usize, compressible: bool) {
    let mut rng = rand::rngs::StdRng::seed_from_u64(42);
    for i in 0..file_count {
        let mut file = File::create(dir.join(format!("file_{}.dat", i))).unwrap();
        if compressible {
            let pattern = format!("Test data for file {} - Lorem ipsum dolor sit amet. ", i);
            let data = pattern.repeat(file_size / pattern.len() + 1);
            file.write_all(&data.as_bytes()[..file_size]).unwrap();
        } else {
            let data: Vec<u8> = (0..file_size).map(|_| rng.gen()).collect();
            file.write_all(&data).unwrap();
        }
    }
}

fn bench_pack(c: &mut Criterion) {
    let mut group = c.benchmark_group("pack");
    group.sample_size(10);

    for (label, compressible) in [("text", true), ("random", false)] {
        let source = TempDir::new().unwrap();
        create_test_files(source.path(), 100, 10 * 1024, compressible);
        group.throughput(Throughput::Bytes(100 * 10 * 1024));

        group.bench_with_input(
            BenchmarkId::new("pack_100_files", label),
            &source,
            |b, source| {
                b.iter_with_setup(
                    || TempDir::new().unwrap(),
                    |out| {
                        let archive = out.path().join("bench.zip");
                        create_archive(
                            black_box(source.path()),
                            &archive,
                            &PackOptions::default(),
                            &NoProgress,
                        )
                        .unwrap();
                    },
                );
            },
        );
    }

    group.finish();
}

fn bench_extract_file(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract_file");
    group.sample_size(10);

    let source = TempDir::new().unwrap();
    create_test_files(source.path(), 100, 10 * 1024, true);
    let archive_dir = TempDir::new().unwrap();
    let archive = archive_dir.path().join("bench.zip");
    create_archive(source.path(), &archive, &PackOptions::default(), &NoProgress).unwrap();
    group.throughput(Throughput::Bytes(100 * 10 * 1024));

    group.bench_function("extract_100_files", |b| {
        b.iter_with_setup(
            || TempDir::new().unwrap(),
            |out| {
                extract_archive(
                    black_box(&archive),
                    out.path(),
                    &ExtractOptions::default(),
                    &NoProgress,
                )
                .unwrap();
            },
        );
    });

    group.finish();
}

fn bench_extract_streamed(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract_streamed");
    group.sample_size(10);

    let data: Vec<u8> = "streamed entry payload ".repeat(40_000).into_bytes();
    for (label, method) in [("stored", Method::Stored), ("deflated", Method::Deflated)] {
        let bytes = StreamedZipBuilder::new()
            .streamed_file("payload.bin", &data, method)
            .build();
        group.throughput(Throughput::Bytes(data.len() as u64));

        group.bench_with_input(BenchmarkId::new("descriptor", label), &bytes, |b, bytes| {
            b.iter_with_setup(
                || TempDir::new().unwrap(),
                |out| {
                    extract_stream(
                        Cursor::new(black_box(bytes.as_slice())),
                        bytes.len() as u64,
                        "bench.zip",
                        out.path(),
                        &ExtractOptions::default(),
                        &NoProgress,
                    )
                    .unwrap();
                },
            );
        });
    }

    group.finish();
}

criterion_group!(benches, bench_pack, bench_extract_file, bench_extract_streamed);
criterion_main!(benches);
