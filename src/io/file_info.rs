//! The `-l` listing path: summarize each compressed source without decoding
//! it — method, stored check, timestamp, compressed and uncompressed sizes,
//! reduction, and the output name.
//!
//! Only the header is parsed. The trailer (which holds the gzip CRC and
//! length, or the zlib Adler-32) is located cheaply: by seeking to the end
//! for regular files, or by sliding a window of the final bytes over a
//! non-seekable stream. The sliding path assumes the input is a single
//! stream with no trailing bytes — for anything else the final bytes are
//! arbitrary data.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use crate::io::file_io::{open_src_file, strip_known_suffix, SourceReader, STDIN_MARK};
use crate::io::frame::{read_header, Method, StreamHeader};
use crate::io::prefs::{notification_level, Format, Prefs};
use crate::util::is_reg_file;

const LOW32: u64 = 0xffff_ffff;

// ---------------------------------------------------------------------------
// Collected facts about one source
// ---------------------------------------------------------------------------

struct ListEntry {
    method: &'static str,
    /// Stored check value; `None` prints as dashes.
    check: Option<u32>,
    stamp: i64,
    compressed: u64,
    /// Uncompressed size; 0 when the format does not record it.
    uncompressed: u64,
    name: String,
}

// ---------------------------------------------------------------------------
// Trailer location
// ---------------------------------------------------------------------------

/// Reads the last `keep` bytes of a non-seekable stream by sliding through
/// it, returning them with the total stream length.
fn tail_window(r: &mut dyn Read, keep: usize) -> io::Result<(Vec<u8>, u64)> {
    let mut tail: Vec<u8> = Vec::with_capacity(2 * keep);
    let mut total: u64 = 0;
    let mut buf = [0u8; 16 * 1024];
    loop {
        let n = r.read(&mut buf)?;
        if n == 0 {
            break;
        }
        total += n as u64;
        tail.extend_from_slice(&buf[..n]);
        if tail.len() > keep {
            let cut = tail.len() - keep;
            tail.drain(..cut);
        }
    }
    Ok((tail, total))
}

/// Returns the final `keep` bytes of `input` plus its total length, seeking
/// when the input is a regular file.
fn final_bytes(input: &str, keep: usize) -> io::Result<(Vec<u8>, u64)> {
    if input != STDIN_MARK && is_reg_file(Path::new(input)) {
        let mut f = File::open(input)?;
        let size = f.metadata()?.len();
        let start = size.saturating_sub(keep as u64);
        f.seek(SeekFrom::Start(start))?;
        let mut tail = Vec::with_capacity(keep);
        f.take(keep as u64).read_to_end(&mut tail)?;
        return Ok((tail, size));
    }
    let mut r = open_src_file(input)?;
    tail_window(&mut *r, keep)
}

// ---------------------------------------------------------------------------
// Time formatting
// ---------------------------------------------------------------------------

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// ls-style time column: `Mon dd hh:mm` within the current year, otherwise
/// `Mon dd  yyyy`; always 12 characters.
fn format_time(stamp: i64) -> String {
    if stamp <= 0 {
        return " ".repeat(12);
    }
    #[cfg(unix)]
    {
        let t = stamp as libc::time_t;
        let mut tm: libc::tm = unsafe { std::mem::zeroed() };
        // SAFETY: localtime_r writes only into the provided tm.
        if unsafe { libc::localtime_r(&t, &mut tm) }.is_null() {
            return " ".repeat(12);
        }
        let now = unsafe { libc::time(std::ptr::null_mut()) };
        let mut now_tm: libc::tm = unsafe { std::mem::zeroed() };
        let this_year = if unsafe { libc::localtime_r(&now, &mut now_tm) }.is_null() {
            -1
        } else {
            now_tm.tm_year
        };
        let mon = MONTHS[(tm.tm_mon.clamp(0, 11)) as usize];
        if tm.tm_year == this_year {
            format!("{} {:2} {:02}:{:02}", mon, tm.tm_mday, tm.tm_hour, tm.tm_min)
        } else {
            format!("{} {:2}  {:4}", mon, tm.tm_mday, tm.tm_year + 1900)
        }
    }
    #[cfg(not(unix))]
    {
        " ".repeat(12)
    }
}

// ---------------------------------------------------------------------------
// Entry construction
// ---------------------------------------------------------------------------

/// Derives the listed (output) name: the stored header name when present,
/// otherwise the input with its suffix stripped.
fn listed_name(input: &str, header: &StreamHeader) -> String {
    if let Some(stored) = header.name.as_deref() {
        return stored.to_owned();
    }
    strip_known_suffix(input)
        .map(|s| s.to_owned())
        .unwrap_or_else(|| input.to_owned())
}

fn entry_for(input: &str, header: StreamHeader) -> io::Result<ListEntry> {
    let name = listed_name(input, &header);
    match header.method {
        Method::Lzw => {
            // No check and no recorded length in the compress format.
            let (_, size) = final_bytes(input, 0)?;
            Ok(ListEntry {
                method: "lzw",
                check: None,
                stamp: header.stamp,
                compressed: size,
                uncompressed: 0,
                name,
            })
        }
        Method::Deflate(Format::Gzip) => {
            let (tail, size) = final_bytes(input, 8)?;
            if tail.len() < 8 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "too short to hold a trailer",
                ));
            }
            let check = u32::from_le_bytes(tail[0..4].try_into().unwrap());
            let ulen = u32::from_le_bytes(tail[4..8].try_into().unwrap());
            Ok(ListEntry {
                method: "gzip",
                check: Some(check),
                stamp: header.stamp,
                compressed: size,
                uncompressed: ulen as u64,
                name,
            })
        }
        Method::Deflate(Format::Zlib) => {
            // The zlib trailer records the check only; length stays 0.
            let (tail, size) = final_bytes(input, 4)?;
            if tail.len() < 4 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "too short to hold a trailer",
                ));
            }
            let check = u32::from_be_bytes(tail[0..4].try_into().unwrap());
            Ok(ListEntry {
                method: "zlib",
                check: Some(check),
                stamp: header.stamp,
                compressed: size,
                uncompressed: 0,
                name,
            })
        }
        Method::Deflate(Format::ZipNoDescriptor) => {
            let zip = header.zip.unwrap_or_default();
            let (_, size) = final_bytes(input, 0)?;
            Ok(ListEntry {
                method: "zip",
                check: Some(zip.crc),
                stamp: header.stamp,
                compressed: size,
                uncompressed: zip.ulen & LOW32,
                name,
            })
        }
        Method::Deflate(Format::ZipWithDescriptor) => {
            // Sizes and check live in the descriptor; listing stays cheap.
            let (_, size) = final_bytes(input, 0)?;
            Ok(ListEntry {
                method: "zip",
                check: None,
                stamp: header.stamp,
                compressed: size,
                uncompressed: 0,
                name,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Printing
// ---------------------------------------------------------------------------

/// Abbreviates `name` to `max` characters, marking a cut with a leading
/// ellipsis.
fn abbreviate(name: &str, max: usize) -> String {
    let chars: Vec<char> = name.chars().collect();
    if chars.len() <= max {
        return name.to_owned();
    }
    let kept: String = chars[chars.len() - (max - 3)..].iter().collect();
    format!("...{}", kept)
}

fn print_entry(e: &ListEntry) {
    let check = match e.check {
        Some(c) => format!("{:08x}", c),
        None => "--------".to_owned(),
    };
    let reduced = if e.uncompressed > 0 {
        format!(
            "{:5.1}%",
            (1.0 - e.compressed as f64 / e.uncompressed as f64) * 100.0
        )
    } else {
        "     -".to_owned()
    };
    let max_name = if notification_level() >= 3 { 16 } else { 48 };
    println!(
        "{:<6} {} {} {:>10} {:>10} {}  {}",
        e.method,
        check,
        format_time(e.stamp),
        e.compressed,
        e.uncompressed,
        reduced,
        abbreviate(&e.name, max_name),
    );
}

fn print_list_header() {
    println!(
        "{:<6} {} {} {:>10} {:>10} {}  {}",
        "method", "check   ", "timestamp   ", "compressed", "original", "reduce", "name"
    );
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Lists one source on stdout.
pub fn list_filename(input: &str, _prefs: &Prefs) -> io::Result<()> {
    let raw = open_src_file(input)?;
    let mut src = SourceReader::new(raw);
    let header = read_header(&mut src, true)?.ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidData, "empty input")
    })?;
    let entry = entry_for(input, header)?;
    print_entry(&entry);
    Ok(())
}

/// Lists every source, printing the column header once. Failures are
/// reported and skipped; returns the number of failures.
pub fn list_multiple_filenames(inputs: &[&str], prefs: &Prefs) -> usize {
    let mut missed = 0;
    let mut printed_header = false;
    for input in inputs {
        if notification_level() >= 2 && !printed_header {
            print_list_header();
            printed_header = true;
        }
        if let Err(e) = list_filename(input, prefs) {
            crate::io::prefs::display_level(
                1,
                &format!("parz: skipping {}: {}\n", input, e),
            );
            missed += 1;
        }
    }
    missed
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
