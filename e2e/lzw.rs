// e2e/lzw.rs — legacy compress (.Z) decoding through the public paths.

use std::fs;
use std::io::Cursor;

use parz::io::decompress::{decode_streams, decompress_filename};
use parz::io::file_io::SourceReader;
use parz::io::frame::{read_header, Method};
use parz::io::prefs::Prefs;

/// A real compress(1)-format file: "AAAAAAA" with 9-bit codes, block mode.
const SEVEN_A: [u8; 8] = [0x1f, 0x9d, 0x90, 0x41, 0x02, 0x0a, 0x0c, 0x02];

fn single_prefs() -> Prefs {
    let mut prefs = Prefs::default();
    prefs.nb_workers = 1;
    prefs
}

#[test]
fn magic_dispatches_to_lzw() {
    let mut src = SourceReader::new(Cursor::new(SEVEN_A.to_vec()));
    let header = read_header(&mut src, false).unwrap().unwrap();
    assert_eq!(header.method, Method::Lzw);
}

#[test]
fn seven_a_decodes() {
    // S6.
    let mut src = SourceReader::new(Cursor::new(SEVEN_A.to_vec()));
    let header = read_header(&mut src, false).unwrap().unwrap();
    let mut out = Vec::new();
    let stats = decode_streams(&mut src, header, Some(&mut out), &single_prefs()).unwrap();
    assert_eq!(out, b"AAAAAAA");
    assert_eq!(stats.out_tot, 7);
}

#[test]
fn dot_z_file_decompresses_by_suffix() {
    let dir = tempfile::tempdir().unwrap();
    let z = dir.path().join("letters.Z");
    fs::write(&z, SEVEN_A).unwrap();

    let prefs = single_prefs();
    decompress_filename(z.to_str().unwrap(), &prefs).unwrap();

    let out = dir.path().join("letters");
    assert_eq!(fs::read(&out).unwrap(), b"AAAAAAA");
    assert!(!z.exists(), "input removed after success");
}

#[test]
fn truncated_lzw_mid_code_fails() {
    let dir = tempfile::tempdir().unwrap();
    let z = dir.path().join("cut.Z");
    // Ends after one byte of code data: the first nine-bit code is torn.
    fs::write(&z, [0x1f, 0x9d, 0x90, 0x41]).unwrap();
    let prefs = single_prefs();
    assert!(decompress_filename(z.to_str().unwrap(), &prefs).is_err());
    assert!(z.exists(), "failed input remains");
}

#[test]
fn test_mode_verifies_lzw() {
    let mut prefs = single_prefs();
    prefs.test_mode = true;
    let dir = tempfile::tempdir().unwrap();
    let z = dir.path().join("v.Z");
    fs::write(&z, SEVEN_A).unwrap();
    let stats = decompress_filename(z.to_str().unwrap(), &prefs).unwrap();
    assert_eq!(stats.out_tot, 7);
    assert!(z.exists(), "test mode never consumes inputs");
    assert!(!dir.path().join("v").exists(), "test mode writes no output");
}
