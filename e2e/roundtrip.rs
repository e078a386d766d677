// e2e/roundtrip.rs — round-trip property over formats, worker counts, and
// block sizes, plus the large-input scenarios.

use std::io::Cursor;

use parz::io::check::check_update;
use parz::io::compress::compress_stream_single;
use parz::io::compress_mt::compress_stream_parallel;
use parz::io::decompress::decode_streams;
use parz::io::file_io::SourceReader;
use parz::io::frame::{read_header, HeaderMeta};
use parz::io::prefs::{Format, Prefs, KB};

fn prefs_for(format: Format, workers: usize, block_kib: usize) -> Prefs {
    let mut prefs = Prefs::default();
    prefs.format = format;
    prefs.nb_workers = workers;
    prefs.set_block_size(block_kib * KB).unwrap();
    prefs
}

fn compress(data: &[u8], prefs: &Prefs) -> Vec<u8> {
    let mut out = Vec::new();
    if prefs.nb_workers > 1 {
        compress_stream_parallel(&mut &data[..], &mut out, prefs, &HeaderMeta::default())
            .unwrap();
    } else {
        compress_stream_single(&mut &data[..], &mut out, prefs, &HeaderMeta::default())
            .unwrap();
    }
    out
}

fn decompress(stream: &[u8], prefs: &Prefs) -> Vec<u8> {
    let mut src = SourceReader::new(Cursor::new(stream.to_vec()));
    let header = read_header(&mut src, false).unwrap().expect("a header");
    let mut out = Vec::new();
    decode_streams(&mut src, header, Some(&mut out), prefs).unwrap();
    out
}

/// Deterministic pseudo-random bytes (xorshift64*).
fn random_bytes(n: usize, mut seed: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(n);
    while out.len() < n {
        seed ^= seed << 13;
        seed ^= seed >> 7;
        seed ^= seed << 17;
        out.extend_from_slice(&seed.wrapping_mul(0x2545F4914F6CDD1D).to_le_bytes());
    }
    out.truncate(n);
    out
}

#[test]
fn round_trip_matrix() {
    let data: Vec<u8> = b"The round trip matrix exercises every format. ".repeat(3000);
    for format in [Format::Gzip, Format::Zlib, Format::ZipWithDescriptor] {
        for workers in [1usize, 2, 4] {
            for block_kib in [32usize, 128] {
                let prefs = prefs_for(format, workers, block_kib);
                let stream = compress(&data, &prefs);
                assert_eq!(
                    decompress(&stream, &prefs),
                    data,
                    "format {:?} workers {} block {} KiB",
                    format,
                    workers,
                    block_kib
                );
            }
        }
    }
}

#[test]
fn round_trip_large_blocks() {
    // 1 MiB blocks over a 3 MiB input.
    let data = random_bytes(3 << 20, 7);
    let prefs = prefs_for(Format::Gzip, 4, 1024);
    let stream = compress(&data, &prefs);
    assert_eq!(decompress(&stream, &prefs), data);
}

#[test]
fn round_trip_block_boundary_sizes() {
    // Inputs exactly at, one below, and one above a block boundary.
    for len in [32 * KB - 1, 32 * KB, 32 * KB + 1, 64 * KB] {
        let data = random_bytes(len, len as u64);
        let prefs = prefs_for(Format::Gzip, 2, 32);
        let stream = compress(&data, &prefs);
        assert_eq!(decompress(&stream, &prefs), data, "len {}", len);
    }
}

#[test]
fn ten_megabytes_of_zeros_gzip() {
    // S1: zeros at the default level, 4 workers, 128 KiB blocks.
    let data = vec![0u8; 10_000_000];
    let prefs = prefs_for(Format::Gzip, 4, 128);
    let stream = compress(&data, &prefs);

    assert_eq!(decompress(&stream, &prefs), data);

    let crc = check_update(Format::Gzip, 0, &data);
    let n = stream.len();
    assert_eq!(&stream[n - 8..n - 4], &crc.to_le_bytes());
    assert_eq!(&stream[n - 4..], &10_000_000u32.to_le_bytes());
}

#[test]
fn random_megabyte_levels_compared() {
    // S2: both levels round-trip; level 9 is never larger than level 1.
    let data = random_bytes(1 << 20, 42);
    let mut fast = prefs_for(Format::Gzip, 4, 128);
    fast.set_level(1).unwrap();
    let mut best = prefs_for(Format::Gzip, 4, 128);
    best.set_level(9).unwrap();

    let out_fast = compress(&data, &fast);
    let out_best = compress(&data, &best);
    assert_eq!(decompress(&out_fast, &fast), data);
    assert_eq!(decompress(&out_best, &best), data);
    assert!(
        out_best.len() <= out_fast.len(),
        "level 9 ({}) larger than level 1 ({})",
        out_best.len(),
        out_fast.len()
    );
}

#[test]
fn single_and_parallel_agree_on_plaintext() {
    let data: Vec<u8> = b"agreement between engines ".repeat(10_000);
    let st = prefs_for(Format::Zlib, 1, 64);
    let mt = prefs_for(Format::Zlib, 4, 64);
    let from_st = decompress(&compress(&data, &st), &st);
    let from_mt = decompress(&compress(&data, &mt), &mt);
    assert_eq!(from_st, data);
    assert_eq!(from_mt, data);
}
