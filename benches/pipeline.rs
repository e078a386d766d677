// benches/pipeline.rs — pipeline throughput and check-combiner cost.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};

use parz::io::check::{combine_adler32, combine_crc32};
use parz::io::compress::compress_stream_single;
use parz::io::compress_mt::compress_stream_parallel;
use parz::io::frame::HeaderMeta;
use parz::io::prefs::Prefs;

fn corpus(len: usize) -> Vec<u8> {
    // Mildly compressible: cycling text with a counter mixed in.
    let mut out = Vec::with_capacity(len);
    let text = b"the quick brown fox jumps over the lazy dog ";
    let mut i = 0usize;
    while out.len() < len {
        out.push(text[i % text.len()] ^ ((i >> 8) as u8 & 0x11));
        i += 1;
    }
    out
}

fn bench_compress(c: &mut Criterion) {
    let data = corpus(4 << 20);
    let mut group = c.benchmark_group("compress-4MiB");
    group.throughput(Throughput::Bytes(data.len() as u64));

    for workers in [1usize, 4] {
        let mut prefs = Prefs::default();
        prefs.nb_workers = workers;
        group.bench_function(format!("workers-{}", workers), |b| {
            b.iter(|| {
                let mut out = Vec::with_capacity(data.len());
                if workers > 1 {
                    compress_stream_parallel(
                        &mut black_box(&data[..]),
                        &mut out,
                        &prefs,
                        &HeaderMeta::default(),
                    )
                    .unwrap();
                } else {
                    compress_stream_single(
                        &mut black_box(&data[..]),
                        &mut out,
                        &prefs,
                        &HeaderMeta::default(),
                    )
                    .unwrap();
                }
                out
            })
        });
    }
    group.finish();
}

fn bench_combiners(c: &mut Criterion) {
    c.bench_function("combine_crc32", |b| {
        b.iter(|| combine_crc32(black_box(0x1234_5678), black_box(0x9abc_def0), 131_072))
    });
    c.bench_function("combine_adler32", |b| {
        b.iter(|| combine_adler32(black_box(0x1234_5678), black_box(0x0abc_def0), 131_072))
    });
}

criterion_group!(benches, bench_compress, bench_combiners);
criterion_main!(benches);
