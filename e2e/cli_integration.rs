// e2e/cli_integration.rs — black-box tests of the parz binary via
// std::process::Command: dispatch, exit codes, test and list modes, and the
// PARZ environment variable.

use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::TempDir;

fn parz_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_parz"))
}

fn make_input(dir: &TempDir, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

// ── 1. Compress / decompress round trip ─────────────────────────────────────

#[test]
fn cli_round_trip() {
    let dir = TempDir::new().unwrap();
    let original = b"CLI round trip content\n".repeat(4000);
    let input = make_input(&dir, "input.txt", &original);

    let status = Command::new(parz_bin())
        .args(["-k", "-p4", input.to_str().unwrap()])
        .status()
        .expect("run parz");
    assert!(status.success());
    let gz = dir.path().join("input.txt.gz");
    assert!(gz.exists());

    fs::remove_file(&input).unwrap();
    let status = Command::new(parz_bin())
        .args(["-d", gz.to_str().unwrap()])
        .status()
        .expect("run parz -d");
    assert!(status.success());
    assert_eq!(fs::read(&input).unwrap(), original);
    assert!(!gz.exists(), "decompression removes the source");
}

// ── 2. Formats by flag and suffix ───────────────────────────────────────────

#[test]
fn cli_zlib_and_zip_suffixes() {
    let dir = TempDir::new().unwrap();
    let input = make_input(&dir, "data.bin", &vec![0x7Eu8; 20_000]);

    for (flag, suffix) in [("-z", "data.bin.zz"), ("-K", "data.bin.zip")] {
        let status = Command::new(parz_bin())
            .args(["-k", "-f", flag, input.to_str().unwrap()])
            .status()
            .unwrap();
        assert!(status.success(), "{} failed", flag);
        assert!(dir.path().join(suffix).exists(), "{} missing", suffix);
    }
}

// ── 3. Test mode exit codes ─────────────────────────────────────────────────

#[test]
fn cli_test_mode_exit_codes() {
    let dir = TempDir::new().unwrap();
    let input = make_input(&dir, "t.txt", b"test me".repeat(100).as_slice());

    Command::new(parz_bin())
        .args(["-k", input.to_str().unwrap()])
        .status()
        .unwrap();
    let gz = dir.path().join("t.txt.gz");

    let ok = Command::new(parz_bin())
        .args(["-t", gz.to_str().unwrap()])
        .status()
        .unwrap();
    assert!(ok.success());

    // Flip a payload bit: -t must now exit 1.
    let mut bytes = fs::read(&gz).unwrap();
    let mid = bytes.len() / 2;
    bytes[mid] ^= 0x20;
    fs::write(&gz, &bytes).unwrap();
    let bad = Command::new(parz_bin())
        .args(["-q", "-t", gz.to_str().unwrap()])
        .status()
        .unwrap();
    assert_eq!(bad.code(), Some(1));
}

// ── 4. Stdout pipe mode ─────────────────────────────────────────────────────

#[test]
fn cli_stdout_round_trip() {
    let dir = TempDir::new().unwrap();
    let original = b"piped through stdout\n".repeat(500);
    let input = make_input(&dir, "pipe.txt", &original);

    let out = Command::new(parz_bin())
        .args(["-c", "-k", input.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(out.status.success());
    assert_eq!(&out.stdout[..2], &[0x1f, 0x8b]);
    assert!(input.exists(), "-c keeps the input");

    let gz = make_input(&dir, "pipe2.gz", &out.stdout);
    let back = Command::new(parz_bin())
        .args(["-dc", "-k", gz.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(back.status.success());
    assert_eq!(back.stdout, original);
}

// ── 5. List mode ────────────────────────────────────────────────────────────

#[test]
fn cli_list_shows_sizes() {
    let dir = TempDir::new().unwrap();
    let original = vec![0u8; 50_000];
    let input = make_input(&dir, "zeros.bin", &original);

    Command::new(parz_bin())
        .args(["-k", input.to_str().unwrap()])
        .status()
        .unwrap();
    let gz = dir.path().join("zeros.bin.gz");

    let out = Command::new(parz_bin())
        .args(["-l", gz.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(out.status.success());
    let text = String::from_utf8_lossy(&out.stdout);
    assert!(text.contains("gzip"), "listing: {}", text);
    assert!(text.contains("50000"), "listing: {}", text);
    assert!(text.contains("zeros.bin"), "listing: {}", text);
}

// ── 6. Version and help ─────────────────────────────────────────────────────

#[test]
fn cli_version_and_help() {
    let v = Command::new(parz_bin()).arg("-V").output().unwrap();
    assert!(v.status.success());
    assert!(String::from_utf8_lossy(&v.stdout).contains("parz"));

    let h = Command::new(parz_bin()).arg("-h").output().unwrap();
    assert!(h.status.success());
    assert!(String::from_utf8_lossy(&h.stderr).contains("Usage"));
}

// ── 7. Bad usage exits 1 ────────────────────────────────────────────────────

#[test]
fn cli_bad_options_exit_one() {
    for args in [&["-b1"][..], &["-p0"], &["-Z"], &["-b"]] {
        let status = Command::new(parz_bin()).args(args).status().unwrap();
        assert_eq!(status.code(), Some(1), "args {:?}", args);
    }
}

// ── 8. PARZ environment variable ────────────────────────────────────────────

#[test]
fn cli_env_options_accepted_and_files_rejected() {
    let dir = TempDir::new().unwrap();
    let input = make_input(&dir, "env.txt", b"env driven".repeat(50).as_slice());

    let status = Command::new(parz_bin())
        .env("PARZ", "-k -p2")
        .arg(input.to_str().unwrap())
        .status()
        .unwrap();
    assert!(status.success());
    assert!(input.exists(), "-k from the environment applies");

    let status = Command::new(parz_bin())
        .env("PARZ", "somefile.txt")
        .arg(input.to_str().unwrap())
        .status()
        .unwrap();
    assert_eq!(status.code(), Some(1));
}

// ── 9. Unknown suffix is skipped with exit 1 ────────────────────────────────

#[test]
fn cli_unknown_suffix_skipped() {
    let dir = TempDir::new().unwrap();
    let input = make_input(&dir, "plain.txt", b"nothing compressed");
    let out = Command::new(parz_bin())
        .args(["-d", input.to_str().unwrap()])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("unknown suffix"));
    assert!(input.exists());
}

// ── 10. Existing output without -f ──────────────────────────────────────────

#[test]
fn cli_refuses_existing_output_without_force() {
    let dir = TempDir::new().unwrap();
    let input = make_input(&dir, "a.txt", b"fresh data");
    make_input(&dir, "a.txt.gz", b"old bytes");

    let status = Command::new(parz_bin())
        .args(["-q", "-k", input.to_str().unwrap()])
        .status()
        .unwrap();
    assert_eq!(status.code(), Some(1));
    assert_eq!(
        fs::read(dir.path().join("a.txt.gz")).unwrap(),
        b"old bytes",
        "existing output untouched"
    );
}
