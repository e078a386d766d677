// e2e/corrupt.rs — damage detection: flipped bits, truncation, and the
// removal of partial output on a failed decode.

use std::fs;
use std::io::Cursor;

use parz::io::compress::{compress_filename, compress_stream_single};
use parz::io::decompress::{decode_streams, decompress_filename};
use parz::io::file_io::SourceReader;
use parz::io::frame::{read_header, HeaderMeta};
use parz::io::prefs::{Format, Prefs};

fn single_prefs(format: Format) -> Prefs {
    let mut prefs = Prefs::default();
    prefs.format = format;
    prefs.nb_workers = 1;
    prefs
}

fn compress(data: &[u8], prefs: &Prefs) -> Vec<u8> {
    let mut out = Vec::new();
    compress_stream_single(&mut &data[..], &mut out, prefs, &HeaderMeta::default()).unwrap();
    out
}

fn verify(stream: &[u8], prefs: &Prefs) -> std::io::Result<()> {
    let mut src = SourceReader::new(Cursor::new(stream.to_vec()));
    let header = read_header(&mut src, false)?.expect("a header");
    decode_streams(&mut src, header, None::<&mut std::io::Sink>, prefs).map(|_| ())
}

#[test]
fn valid_stream_verifies_clean() {
    let prefs = single_prefs(Format::Gzip);
    let stream = compress(&vec![9u8; 100_000], &prefs);
    assert!(verify(&stream, &prefs).is_ok());
}

#[test]
fn bit_flip_in_payload_fails_verification() {
    // Property 6: a flipped bit anywhere in the compressed payload makes
    // test mode fail with a corrupt-deflate or corrupt-trailer error.
    let prefs = single_prefs(Format::Gzip);
    let data: Vec<u8> = (0u8..=255).cycle().take(100_000).collect();
    let stream = compress(&data, &prefs);
    for pos in [12usize, stream.len() / 2, stream.len() - 10] {
        let mut bad = stream.clone();
        bad[pos] ^= 0x01;
        assert!(verify(&bad, &prefs).is_err(), "flip at {}", pos);
    }
}

#[test]
fn truncation_before_trailer_detected() {
    // S7: losing one byte before the trailer is a corrupt-trailer error.
    let prefs = single_prefs(Format::Gzip);
    let mut stream = compress(b"about to be truncated", &prefs);
    stream.pop();
    let err = verify(&stream, &prefs).unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
}

#[test]
fn truncation_inside_deflate_detected() {
    let prefs = single_prefs(Format::Gzip);
    let stream = compress(&vec![1u8; 200_000], &prefs);
    let cut = stream.len() / 2;
    assert!(verify(&stream[..cut], &prefs).is_err());
}

#[test]
fn zlib_and_zip_corruption_detected() {
    for format in [Format::Zlib, Format::ZipWithDescriptor] {
        let prefs = single_prefs(format);
        let stream = compress(&vec![4u8; 60_000], &prefs);
        // Byte 50 sits inside the deflate payload for both framings (zlib
        // header is 2 bytes, the zip local header 40).
        let mut bad = stream.clone();
        bad[50] ^= 0x80;
        assert!(verify(&bad, &prefs).is_err(), "format {:?}", format);
    }
}

#[test]
fn failed_decode_removes_partial_output_file() {
    let dir = tempfile::tempdir().unwrap();
    let plain = dir.path().join("data.bin");
    fs::write(&plain, vec![0x33u8; 150_000]).unwrap();

    let mut prefs = single_prefs(Format::Gzip);
    prefs.keep = true;
    compress_filename(plain.to_str().unwrap(), &prefs).unwrap();
    fs::remove_file(&plain).unwrap();

    let gz = dir.path().join("data.bin.gz");
    let mut bytes = fs::read(&gz).unwrap();
    let n = bytes.len();
    bytes[n - 6] ^= 0xff; // corrupt the stored CRC
    fs::write(&gz, &bytes).unwrap();

    assert!(decompress_filename(gz.to_str().unwrap(), &prefs).is_err());
    assert!(!plain.exists(), "partial output must not remain");
    assert!(gz.exists(), "failed input must remain");
}

#[test]
fn unrecognized_input_reports_not_compressed() {
    let prefs = single_prefs(Format::Gzip);
    let err = verify(b"plain text, nothing compressed here", &prefs).unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
}
