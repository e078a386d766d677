//! Compression entry points and the single-thread path.
//!
//! [`compress_filename`] resolves source and destination, picks the parallel
//! or single-thread engine from `prefs.nb_workers`, and handles the
//! surrounding file management (metadata copy, source removal, partial-output
//! cleanup). The single-thread engine shares the framing and check logic with
//! the pipeline but reads and deflates synchronously in one loop using a
//! single work slot's worth of buffers.

use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;

use flate2::{Compress, Compression, FlushCompress, Status};

use crate::io::check::{check_init, check_update};
use crate::io::compress_mt::compress_stream_parallel;
use crate::io::file_io::{
    open_dst_file, open_src_file, read_to_capacity, STDIN_MARK, STDOUT_MARK,
};
use crate::io::frame::{write_header, write_trailer, HeaderMeta};
use crate::io::prefs::{display_level, out_buf_size, Prefs};
use crate::util::{copy_file_stat, file_mtime};

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Byte counts produced by one compression run.
#[derive(Clone, Copy, Debug, Default)]
pub struct CompressStats {
    /// Uncompressed bytes read.
    pub ulen: u64,
    /// Raw deflate bytes written (framing excluded).
    pub clen: u64,
}

// ---------------------------------------------------------------------------
// Block deflate helper (shared with the parallel pipeline)
// ---------------------------------------------------------------------------

/// Runs `input` through `z` into `out`, ending with `flush`, and returns the
/// number of bytes produced.
///
/// `out` must be sized for the worst case (see [`out_buf_size`]); exceeding
/// it reports the block as corrupt rather than silently truncating.
pub(crate) fn deflate_block(
    z: &mut Compress,
    input: &[u8],
    out: &mut [u8],
    flush: FlushCompress,
) -> io::Result<usize> {
    let finish = matches!(flush, FlushCompress::Finish);
    let mut in_pos = 0usize;
    let mut out_pos = 0usize;
    loop {
        let before_in = z.total_in();
        let before_out = z.total_out();
        let status = z
            .compress(&input[in_pos..], &mut out[out_pos..], flush)
            .map_err(|e| {
                io::Error::new(io::ErrorKind::Other, format!("deflate failed: {}", e))
            })?;
        in_pos += (z.total_in() - before_in) as usize;
        out_pos += (z.total_out() - before_out) as usize;
        match status {
            Status::StreamEnd => break,
            Status::Ok | Status::BufError => {
                if in_pos == input.len() && out_pos < out.len() {
                    if !finish {
                        break;
                    }
                    // Finish keeps producing until StreamEnd.
                    continue;
                }
                if out_pos == out.len() {
                    return Err(io::Error::new(
                        io::ErrorKind::Other,
                        "compressed block exceeds worst-case size",
                    ));
                }
            }
        }
    }
    Ok(out_pos)
}

// ---------------------------------------------------------------------------
// Single-thread stream engine
// ---------------------------------------------------------------------------

/// Runs `input` through `z` with `flush`, writing output to `dst` as it is
/// produced. Unlike [`deflate_block`], output may span multiple buffers:
/// with no-flush, deflate carries pending data across blocks.
fn deflate_to_writer(
    z: &mut Compress,
    input: &[u8],
    out_buf: &mut [u8],
    dst: &mut dyn Write,
    flush: FlushCompress,
) -> io::Result<u64> {
    let finish = matches!(flush, FlushCompress::Finish);
    let mut in_pos = 0usize;
    let mut written: u64 = 0;
    loop {
        let before_in = z.total_in();
        let before_out = z.total_out();
        let status = z
            .compress(&input[in_pos..], out_buf, flush)
            .map_err(|e| {
                io::Error::new(io::ErrorKind::Other, format!("deflate failed: {}", e))
            })?;
        in_pos += (z.total_in() - before_in) as usize;
        let produced = (z.total_out() - before_out) as usize;
        dst.write_all(&out_buf[..produced])?;
        written += produced as u64;
        match status {
            Status::StreamEnd => break,
            Status::Ok | Status::BufError => {
                // A flush is complete once deflate leaves output space.
                if in_pos == input.len() && produced < out_buf.len() && !finish {
                    break;
                }
            }
        }
    }
    Ok(written)
}

/// Compresses `src` to `dst` on the calling thread.
///
/// Block terminators: finish on the last block; otherwise no-flush when the
/// dictionary is enabled (deflate keeps its own history across blocks) or
/// full-flush when disabled (each block independently decodable).
pub fn compress_stream_single(
    src: &mut dyn Read,
    dst: &mut dyn Write,
    prefs: &Prefs,
    meta: &HeaderMeta,
) -> io::Result<CompressStats> {
    let block_size = prefs.block_size;
    let out_size = out_buf_size(block_size)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "block size too large"))?;

    let head_len = write_header(dst, prefs, meta)?;

    let mut z = Compress::new(Compression::new(prefs.level), false);
    let mut in_buf = vec![0u8; block_size];
    let mut out_buf = vec![0u8; out_size];
    let mut check = check_init(prefs.format);
    let mut ulen: u64 = 0;
    let mut clen: u64 = 0;

    loop {
        let n = read_to_capacity(src, &mut in_buf)?;
        check = check_update(prefs.format, check, &in_buf[..n]);
        ulen += n as u64;

        let last = n < block_size;
        let flush = if last {
            FlushCompress::Finish
        } else if prefs.dictionary {
            FlushCompress::None
        } else {
            FlushCompress::Full
        };
        clen += deflate_to_writer(&mut z, &in_buf[..n], &mut out_buf, dst, flush)?;

        if last {
            break;
        }
    }

    write_trailer(dst, prefs, meta, ulen, clen, check, head_len)?;
    Ok(CompressStats { ulen, clen })
}

// ---------------------------------------------------------------------------
// File-level orchestration
// ---------------------------------------------------------------------------

/// Derives the compressed output name for `input`.
fn output_name(input: &str, prefs: &Prefs) -> String {
    format!("{}{}", input, prefs.out_suffix())
}

/// Header metadata for `input`: base name and mtime for regular files,
/// nothing for stdin.
fn meta_for(input: &str) -> HeaderMeta {
    if input == STDIN_MARK {
        return HeaderMeta::default();
    }
    let name = Path::new(input)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned());
    HeaderMeta {
        name,
        mtime: file_mtime(Path::new(input)).unwrap_or(0),
    }
}

/// Compresses one file (or stdin) to its derived output (or stdout).
///
/// On success the destination inherits the source's metadata and the source
/// is removed unless `prefs.keep` is set or either end is a standard stream.
/// On failure a partial output file is removed.
pub fn compress_filename(input: &str, prefs: &Prefs) -> io::Result<CompressStats> {
    let to_stdout = prefs.to_stdout || input == STDIN_MARK;
    let dst_name = if to_stdout {
        STDOUT_MARK.to_owned()
    } else {
        output_name(input, prefs)
    };

    let mut src = open_src_file(input)?;
    let mut dst = open_dst_file(&dst_name, prefs)?;
    let dst_is_stdout = dst.is_stdout;
    let meta = meta_for(input);

    let result = if prefs.nb_workers > 1 {
        compress_stream_parallel(&mut *src, &mut dst, prefs, &meta)
    } else {
        compress_stream_single(&mut *src, &mut dst, prefs, &meta)
    };
    let stats = match result.and_then(|s| dst.flush().map(|_| s)) {
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
        if !prefs.keep {
            fs::remove_file(input)?;
        }
    }

    display_level(
        3,
        &format!(
            "{} -> {} ({} => {} bytes)\n",
            input, dst_name, stats.ulen, stats.clen
        ),
    );
    Ok(stats)
}

/// Compresses each name in `inputs`, skipping files that fail and reporting
/// them at notification level 1. Returns the number of failures.
pub fn compress_multiple_filenames(inputs: &[&str], prefs: &Prefs) -> usize {
    let mut missed = 0;
    for input in inputs {
        if let Err(e) = compress_filename(input, prefs) {
            display_level(1, &format!("parz: skipping {}: {}\n", input, e));
            missed += 1;
        }
    }
    missed
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
