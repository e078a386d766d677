//! Decompression: header dispatch, streaming inflation with a parallel
//! check fold, trailer verification per format, and concatenated-stream
//! handling.
//!
//! The inflater pulls compressed input straight out of the
//! [`SourceReader`]'s window and pushes 32 KiB output chunks into an
//! [`OutSink`], which folds the running check — concurrently with the write
//! when more than one process is configured — and counts totals. After
//! end-of-stream the trailer is read and verified against the recomputed
//! values; gzip and zlib members may be followed by further members of the
//! same format, while zip decoding stops after its single entry.

use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;

use flate2::{Decompress, FlushDecompress, Status};

use crate::io::check::{check_init, check_update};
use crate::io::decompress_lzw::decode_lzw_stream;
use crate::io::file_io::{
    open_dst_file, open_src_file, DstFile, SourceReader, STDIN_MARK, STDOUT_MARK,
};
use crate::io::frame::{read_header, Method, StreamHeader, ZipEntry};
use crate::io::prefs::{display_level, Format, Prefs, KB};
use crate::util::copy_file_stat;

/// Output chunk size for inflation.
const OUT_CHUNK: usize = 32 * KB;

/// Optional signature preceding a zip data descriptor.
const ZIP_DESCRIPTOR_SIG: u32 = 0x0807_4b50;

const LOW32: u64 = 0xffff_ffff;

fn corrupt(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.to_owned())
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Byte counts produced by one decompression run.
#[derive(Clone, Copy, Debug, Default)]
pub struct DecompressStats {
    /// Compressed bytes consumed.
    pub in_tot: u64,
    /// Decompressed bytes produced.
    pub out_tot: u64,
}

// ---------------------------------------------------------------------------
// Output sink
// ---------------------------------------------------------------------------

/// Receives decompressed chunks: writes them (unless testing), folds the
/// member check, and tracks lengths.
struct OutSink<'a, W: Write + Send> {
    dst: Option<&'a mut W>,
    format: Format,
    /// Check over the current member's output.
    member_check: u32,
    /// Length of the current member's output.
    member_len: u64,
    /// Total output across members.
    out_tot: u64,
    /// Fold the check on a second thread while the write proceeds.
    parallel: bool,
}

impl<'a, W: Write + Send> OutSink<'a, W> {
    fn new(dst: Option<&'a mut W>, parallel: bool) -> Self {
        OutSink {
            dst,
            format: Format::Gzip,
            member_check: 0,
            member_len: 0,
            out_tot: 0,
            parallel,
        }
    }

    /// Resets the member check for a stream of `format`.
    fn begin_member(&mut self, format: Format) {
        self.format = format;
        self.member_check = check_init(format);
        self.member_len = 0;
    }

    fn push(&mut self, data: &[u8]) -> io::Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        self.member_len += data.len() as u64;
        self.out_tot += data.len() as u64;
        let format = self.format;
        let check = self.member_check;
        match self.dst.as_deref_mut() {
            Some(dst) if self.parallel => {
                let (write_res, new_check) = rayon::join(
                    || dst.write_all(data),
                    || check_update(format, check, data),
                );
                self.member_check = new_check;
                write_res
            }
            Some(dst) => {
                dst.write_all(data)?;
                self.member_check = check_update(format, check, data);
                Ok(())
            }
            None => {
                self.member_check = check_update(format, check, data);
                Ok(())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Inflation
// ---------------------------------------------------------------------------

/// Inflates one raw deflate stream, pulling input from `src` and pushing
/// output into `sink`, until the stream's final block. Unconsumed input
/// stays in `src` for the trailer.
fn inflate_member<R: Read, W: Write + Send>(
    src: &mut SourceReader<R>,
    sink: &mut OutSink<'_, W>,
) -> io::Result<()> {
    let mut z = Decompress::new(false);
    let mut out = vec![0u8; OUT_CHUNK];
    loop {
        let input = src.peek_slice()?;
        if input.is_empty() {
            return Err(corrupt("corrupted -- incomplete deflate stream"));
        }
        let before_in = z.total_in();
        let before_out = z.total_out();
        let status = z
            .decompress(input, &mut out, FlushDecompress::None)
            .map_err(|_| corrupt("corrupted -- invalid deflate data"))?;
        let consumed = (z.total_in() - before_in) as usize;
        let produced = (z.total_out() - before_out) as usize;
        src.consume(consumed);
        sink.push(&out[..produced])?;
        if status == Status::StreamEnd {
            return Ok(());
        }
    }
}

// ---------------------------------------------------------------------------
// Trailer verification
// ---------------------------------------------------------------------------

fn get4<R: Read>(src: &mut SourceReader<R>) -> io::Result<u32> {
    let mut b = [0u8; 4];
    src.read_exact_buf(&mut b)
        .map_err(|_| corrupt("corrupted -- missing trailer"))?;
    Ok(u32::from_le_bytes(b))
}

fn verify_gzip_trailer<R: Read, W: Write + Send>(
    src: &mut SourceReader<R>,
    sink: &OutSink<'_, W>,
) -> io::Result<()> {
    let crc = get4(src)?;
    let len = get4(src)?;
    if crc != sink.member_check {
        return Err(corrupt("corrupted -- crc32 mismatch"));
    }
    if len as u64 != sink.member_len & LOW32 {
        return Err(corrupt("corrupted -- length mismatch"));
    }
    Ok(())
}

fn verify_zlib_trailer<R: Read, W: Write + Send>(
    src: &mut SourceReader<R>,
    sink: &OutSink<'_, W>,
) -> io::Result<()> {
    let mut b = [0u8; 4];
    src.read_exact_buf(&mut b)
        .map_err(|_| corrupt("corrupted -- missing trailer"))?;
    if u32::from_be_bytes(b) != sink.member_check {
        return Err(corrupt("corrupted -- adler32 mismatch"));
    }
    Ok(())
}

/// Verifies a zip entry against its local-header values or data descriptor.
///
/// Descriptor layout detection follows the original tool: the first 32-bit
/// word is taken as the CRC unless it equals the optional descriptor
/// signature while not matching the computed check, in which case the
/// signature is skipped. When the length field still disagrees, the
/// descriptor is re-read assuming Zip64 64-bit lengths.
fn verify_zip_trailer<R: Read, W: Write + Send>(
    src: &mut SourceReader<R>,
    sink: &OutSink<'_, W>,
    entry: ZipEntry,
    descriptor: bool,
    entry_clen: u64,
) -> io::Result<()> {
    let (crc, clen, ulen) = if descriptor {
        let mut crc = get4(src)?;
        let mut clen = get4(src)?;
        let mut ulen = get4(src)?;
        if crc == ZIP_DESCRIPTOR_SIG && crc != sink.member_check {
            crc = clen;
            clen = ulen;
            ulen = get4(src)?;
        }
        if ulen as u64 != sink.member_len & LOW32 {
            // Zip64 descriptor: crc, 8-byte clen, 8-byte ulen.
            ulen = get4(src)?;
            let _ = get4(src)?;
        }
        (crc, clen as u64, ulen as u64)
    } else {
        (entry.crc, entry.clen & LOW32, entry.ulen & LOW32)
    };

    if clen != entry_clen & LOW32 || ulen != sink.member_len & LOW32 {
        return Err(corrupt("corrupted entry -- length mismatch"));
    }
    if crc != sink.member_check {
        return Err(corrupt("corrupted entry -- crc32 mismatch"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Stream decoding
// ---------------------------------------------------------------------------

/// Decodes the stream whose header has already been read, plus any
/// concatenated members of the same format, writing output to `dst` (`None`
/// verifies only). Returns total byte counts.
pub fn decode_streams<R: Read, W: Write + Send>(
    src: &mut SourceReader<R>,
    first: StreamHeader,
    dst: Option<&mut W>,
    prefs: &Prefs,
) -> io::Result<DecompressStats> {
    let mut sink = OutSink::new(dst, prefs.nb_workers > 1);
    let mut header = first;

    loop {
        match header.method {
            Method::Lzw => {
                // No trailer to verify; the stream runs to end of input.
                sink.begin_member(Format::Gzip);
                decode_lzw_stream(src, |chunk| sink.push(chunk))?;
                break;
            }
            Method::Deflate(format) => {
                sink.begin_member(format);
                let start_in = src.total_in();
                inflate_member(src, &mut sink)?;
                let entry_clen = src.total_in() - start_in;

                match format {
                    Format::Gzip => verify_gzip_trailer(src, &sink)?,
                    Format::Zlib => verify_zlib_trailer(src, &sink)?,
                    Format::ZipNoDescriptor | Format::ZipWithDescriptor => {
                        verify_zip_trailer(
                            src,
                            &sink,
                            header.zip.unwrap_or_default(),
                            format == Format::ZipWithDescriptor,
                            entry_clen,
                        )?;
                        // A zip archive holds one entry here; the central
                        // directory that follows is not decoded.
                        break;
                    }
                }

                // Concatenated members of the same format continue the
                // output; anything else is trailing junk.
                if src.at_eof()? {
                    break;
                }
                match read_header(src, false) {
                    Ok(Some(h)) if h.method == Method::Deflate(format) => {
                        header = h;
                    }
                    Err(e)
                        if e.kind() != io::ErrorKind::InvalidData
                            && e.kind() != io::ErrorKind::UnexpectedEof =>
                    {
                        return Err(e)
                    }
                    _ => {
                        display_level(2, "parz: trailing junk -- ignored\n");
                        break;
                    }
                }
            }
        }
    }

    Ok(DecompressStats {
        in_tot: src.total_in(),
        out_tot: sink.out_tot,
    })
}

// ---------------------------------------------------------------------------
// File-level orchestration
// ---------------------------------------------------------------------------

/// Derives the decompressed output name: the stored header name when `-N`
/// asked for it, otherwise the input with its suffix stripped.
fn derive_output_name(
    input: &str,
    header: &StreamHeader,
    prefs: &Prefs,
) -> io::Result<String> {
    if prefs.restore_meta {
        if let Some(stored) = header.name.as_deref() {
            // Only the base name; a stored path must not escape the
            // input's directory.
            if let Some(base) = Path::new(stored).file_name() {
                let dir = Path::new(input).parent().unwrap_or_else(|| Path::new(""));
                return Ok(dir.join(base).to_string_lossy().into_owned());
            }
        }
    }
    match crate::io::file_io::strip_known_suffix(input) {
        Some(stem) => Ok(stem.to_owned()),
        None => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{}: unknown suffix -- ignored", input),
        )),
    }
}

/// Decompresses (or, in test mode, verifies) one file or stdin.
///
/// Trailer mismatches are fatal for the file and leave any partial output
/// removed. On success the output inherits the input's metadata (or the
/// header timestamp under `-N`) and the input is removed unless kept.
pub fn decompress_filename(input: &str, prefs: &Prefs) -> io::Result<DecompressStats> {
    let to_stdout = prefs.to_stdout || input == STDIN_MARK;

    // When the output name comes from the input name, an unrecognized
    // suffix means the file is not ours to decompress.
    if !prefs.test_mode
        && !to_stdout
        && crate::io::file_io::strip_known_suffix(input).is_none()
    {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{}: unknown suffix -- ignored", input),
        ));
    }

    let raw = open_src_file(input)?;
    let mut src = SourceReader::new(raw);
    let header = read_header(&mut src, true)?.ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidData, "empty input")
    })?;

    if prefs.test_mode {
        return decode_streams(&mut src, header, None::<&mut io::Sink>, prefs);
    }

    let dst_name = if to_stdout {
        STDOUT_MARK.to_owned()
    } else {
        derive_output_name(input, &header, prefs)?
    };
    let mut dst = open_dst_file(&dst_name, prefs)?;
    let dst_is_stdout = dst.is_stdout;
    let stamp = header.stamp;

    let result = decode_streams::<_, DstFile>(&mut src, header, Some(&mut dst), prefs)
        .and_then(|s| dst.flush().map(|_| s));
    let stats = match result {
        Ok(s) => s,
        Err(e) => {
            drop(dst);
            if !dst_is_stdout {
                let _ = fs::remove_file(&dst_name);
            }
            return Err(e);
        }
    };
    drop(dst);

    if !dst_is_stdout && input != STDIN_MARK {
        let _ = copy_file_stat(Path::new(input), Path::new(&dst_name));
        if prefs.restore_meta && stamp > 0 {
            let _ = filetime::set_file_mtime(
                &dst_name,
                filetime::FileTime::from_unix_time(stamp, 0),
            );
        }
        if !prefs.keep {
            fs::remove_file(input)?;
        }
    }

    display_level(
        3,
        &format!(
            "{} -> {} ({} => {} bytes)\n",
            input, dst_name, stats.in_tot, stats.out_tot
        ),
    );
    Ok(stats)
}

/// Decompresses each name in `inputs`, skipping failures with a diagnostic.
/// Returns the number of failures.
pub fn decompress_multiple_filenames(inputs: &[&str], prefs: &Prefs) -> usize {
    let mut missed = 0;
    for input in inputs {
        if let Err(e) = decompress_filename(input, prefs) {
            display_level(1, &format!("parz: skipping {}: {}\n", input, e));
            missed += 1;
        }
    }
    missed
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::compress::compress_stream_single;
    use crate::io::compress_mt::compress_stream_parallel;
    use crate::io::frame::HeaderMeta;
    use std::io::Cursor;

    fn prefs_with(format: Format, workers: usize) -> Prefs {
        let mut prefs = Prefs::default();
        prefs.format = format;
        prefs.nb_workers = workers;
        prefs.set_block_size(32 * 1024).unwrap();
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

    fn decompress(stream: &[u8], prefs: &Prefs) -> io::Result<Vec<u8>> {
        let mut src = SourceReader::new(Cursor::new(stream.to_vec()));
        let header = read_header(&mut src, true)?.expect("header");
        let mut out = Vec::new();
        decode_streams(&mut src, header, Some(&mut out), prefs)?;
        Ok(out)
    }

    #[test]
    fn round_trip_all_formats_and_worker_counts() {
        let data: Vec<u8> = (0u8..=255).cycle().take(200_000).collect();
        for format in [Format::Gzip, Format::Zlib, Format::ZipWithDescriptor] {
            for workers in [1usize, 2, 4] {
                let prefs = prefs_with(format, workers);
                let stream = compress(&data, &prefs);
                let back = decompress(&stream, &prefs).unwrap();
                assert_eq!(back, data, "format {:?} workers {}", format, workers);
            }
        }
    }

    #[test]
    fn round_trip_empty_input() {
        for format in [Format::Gzip, Format::Zlib, Format::ZipWithDescriptor] {
            let prefs = prefs_with(format, 1);
            let stream = compress(b"", &prefs);
            assert_eq!(decompress(&stream, &prefs).unwrap(), b"");
        }
    }

    #[test]
    fn concatenated_gzip_members_decode_to_concatenation() {
        let prefs = prefs_with(Format::Gzip, 1);
        let mut stream = compress(b"", &prefs); // empty member first
        stream.extend_from_slice(&compress(b"hello world\n", &prefs));
        let out = decompress(&stream, &prefs).unwrap();
        assert_eq!(out, b"hello world\n");
    }

    #[test]
    fn concatenated_zlib_members_decode() {
        let prefs = prefs_with(Format::Zlib, 1);
        let mut stream = compress(b"first ", &prefs);
        stream.extend_from_slice(&compress(b"second", &prefs));
        assert_eq!(decompress(&stream, &prefs).unwrap(), b"first second");
    }

    #[test]
    fn trailing_junk_is_ignored() {
        let prefs = prefs_with(Format::Gzip, 1);
        let mut stream = compress(b"payload", &prefs);
        stream.extend_from_slice(b"not a header at all");
        assert_eq!(decompress(&stream, &prefs).unwrap(), b"payload");
    }

    #[test]
    fn corrupt_gzip_crc_detected() {
        let prefs = prefs_with(Format::Gzip, 1);
        let mut stream = compress(b"check me", &prefs);
        let n = stream.len();
        stream[n - 5] ^= 0xff; // inside the stored CRC
        let err = decompress(&stream, &prefs).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn truncated_gzip_trailer_detected() {
        let prefs = prefs_with(Format::Gzip, 1);
        let mut stream = compress(b"truncate me please", &prefs);
        stream.pop();
        let err = decompress(&stream, &prefs).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn corrupt_deflate_payload_detected() {
        let prefs = prefs_with(Format::Gzip, 1);
        let mut stream = compress(&vec![7u8; 50_000], &prefs);
        let mid = stream.len() / 2; // well inside the deflate data
        stream[mid] ^= 0x55;
        assert!(decompress(&stream, &prefs).is_err());
    }

    #[test]
    fn zlib_adler_mismatch_detected() {
        let prefs = prefs_with(Format::Zlib, 1);
        let mut stream = compress(b"zlib data here", &prefs);
        let n = stream.len();
        stream[n - 1] ^= 1;
        let err = decompress(&stream, &prefs).unwrap_err();
        assert!(err.to_string().contains("adler32"));
    }

    #[test]
    fn zip_descriptor_crc_mismatch_detected() {
        let prefs = prefs_with(Format::ZipWithDescriptor, 1);
        let data = b"zip entry payload".repeat(100);
        let stream = compress(&data, &prefs);
        // Flip a bit just past the 40-byte local header, inside the
        // deflate payload.
        let mut bad = stream.clone();
        bad[45] ^= 0x10;
        assert!(decompress(&bad, &prefs).is_err());
    }

    #[test]
    fn test_mode_verifies_without_output() {
        let prefs = prefs_with(Format::Gzip, 1);
        let data = b"verify only".repeat(10);
        let stream = compress(&data, &prefs);
        let mut src = SourceReader::new(Cursor::new(stream));
        let header = read_header(&mut src, false).unwrap().unwrap();
        let stats =
            decode_streams(&mut src, header, None::<&mut io::Sink>, &prefs).unwrap();
        assert_eq!(stats.out_tot, data.len() as u64);
    }

    #[test]
    fn lzw_stream_decodes_through_dispatch() {
        let payload = [0x1f, 0x9d, 0x90, 0x41, 0x02, 0x0a, 0x0c, 0x02];
        let prefs = prefs_with(Format::Gzip, 1);
        assert_eq!(decompress(&payload, &prefs).unwrap(), b"AAAAAAA");
    }

    #[test]
    fn decompress_filename_round_trip_and_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("notes.txt");
        fs::write(&plain, b"file contents\n".repeat(64)).unwrap();

        let mut prefs = Prefs::default();
        prefs.nb_workers = 1;
        crate::io::compress::compress_filename(plain.to_str().unwrap(), &prefs).unwrap();
        assert!(!plain.exists());

        let gz = dir.path().join("notes.txt.gz");
        decompress_filename(gz.to_str().unwrap(), &prefs).unwrap();
        assert!(!gz.exists());
        assert_eq!(fs::read(&plain).unwrap(), b"file contents\n".repeat(64));
    }

    #[test]
    fn decompress_filename_rejects_unknown_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let f = dir.path().join("plain.txt");
        fs::write(&f, b"data").unwrap();
        let mut prefs = Prefs::default();
        prefs.nb_workers = 1;
        let err = decompress_filename(f.to_str().unwrap(), &prefs).unwrap_err();
        assert!(err.to_string().contains("unknown suffix"));
    }

    #[test]
    fn partial_output_removed_on_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("big.bin");
        fs::write(&plain, vec![3u8; 100_000]).unwrap();

        let mut prefs = Prefs::default();
        prefs.nb_workers = 1;
        prefs.keep = true;
        crate::io::compress::compress_filename(plain.to_str().unwrap(), &prefs).unwrap();

        let gz = dir.path().join("big.bin.gz");
        let mut bytes = fs::read(&gz).unwrap();
        let n = bytes.len();
        bytes.truncate(n - 1); // lose the last trailer byte
        fs::write(&gz, &bytes).unwrap();
        fs::remove_file(&plain).unwrap();

        assert!(decompress_filename(gz.to_str().unwrap(), &prefs).is_err());
        assert!(!plain.exists(), "partial output must be removed");
    }
}
