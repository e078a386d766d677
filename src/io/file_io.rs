//! File I/O primitives: source/destination resolution with stdin/stdout
//! sentinels and overwrite policy, suffix recognition for decompression, and
//! the buffered [`SourceReader`] the decoder and lister parse headers from.

use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, Read, Write};
use std::path::Path;
use std::sync::atomic::Ordering;

use crate::io::prefs::{Prefs, DISPLAY_LEVEL, KB};
use crate::util::is_directory;

// ---------------------------------------------------------------------------
// Sentinel strings
// ---------------------------------------------------------------------------

/// Sentinel: read from standard input.
pub const STDIN_MARK: &str = "-";

/// Sentinel: write to standard output.
pub const STDOUT_MARK: &str = "-";

// ---------------------------------------------------------------------------
// Suffixes
// ---------------------------------------------------------------------------

/// Suffixes recognized as compressed input for decompression and listing.
pub const KNOWN_SUFFIXES: [&str; 10] = [
    ".gz", "-gz", ".zz", "-zz", ".z", "-z", "_z", ".Z", ".zip", ".ZIP",
];

/// Returns the stem of `name` with its compressed suffix removed, or `None`
/// when no known suffix matches.
pub fn strip_known_suffix(name: &str) -> Option<&str> {
    for sfx in KNOWN_SUFFIXES {
        if let Some(stem) = name.strip_suffix(sfx) {
            if !stem.is_empty() {
                return Some(stem);
            }
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Buffered source reader
// ---------------------------------------------------------------------------

/// Input buffer size for header parsing and inflation.
pub const IN_BUF_SIZE: usize = 32 * KB;

/// A byte-granular buffered reader over the compressed input.
///
/// Tracks the cumulative number of bytes consumed so callers can account for
/// compressed size, and exposes the unread window directly
/// ([`SourceReader::peek_slice`] / [`SourceReader::consume`]) so the inflater
/// can pull input without copying.
pub struct SourceReader<R: Read> {
    inner: R,
    buf: Vec<u8>,
    next: usize,
    left: usize,
    eof: bool,
    tot: u64,
}

impl<R: Read> SourceReader<R> {
    pub fn new(inner: R) -> Self {
        SourceReader {
            inner,
            buf: vec![0u8; IN_BUF_SIZE],
            next: 0,
            left: 0,
            eof: false,
            tot: 0,
        }
    }

    /// Total bytes consumed so far.
    #[inline]
    pub fn total_in(&self) -> u64 {
        self.tot
    }

    fn refill(&mut self) -> io::Result<()> {
        debug_assert_eq!(self.left, 0);
        if self.eof {
            return Ok(());
        }
        self.next = 0;
        loop {
            match self.inner.read(&mut self.buf) {
                Ok(0) => {
                    self.eof = true;
                    break;
                }
                Ok(n) => {
                    self.left = n;
                    break;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Reads one byte; `None` at end of input.
    pub fn get(&mut self) -> io::Result<Option<u8>> {
        if self.left == 0 {
            self.refill()?;
            if self.left == 0 {
                return Ok(None);
            }
        }
        let b = self.buf[self.next];
        self.next += 1;
        self.left -= 1;
        self.tot += 1;
        Ok(Some(b))
    }

    /// Fills `out` completely or fails with `UnexpectedEof`.
    pub fn read_exact_buf(&mut self, out: &mut [u8]) -> io::Result<()> {
        let mut done = 0;
        while done < out.len() {
            if self.left == 0 {
                self.refill()?;
                if self.left == 0 {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "unexpected end of input",
                    ));
                }
            }
            let n = (out.len() - done).min(self.left);
            out[done..done + n].copy_from_slice(&self.buf[self.next..self.next + n]);
            self.next += n;
            self.left -= n;
            self.tot += n as u64;
            done += n;
        }
        Ok(())
    }

    /// Discards `n` bytes or fails with `UnexpectedEof`.
    pub fn skip(&mut self, mut n: u64) -> io::Result<()> {
        while n > 0 {
            if self.left == 0 {
                self.refill()?;
                if self.left == 0 {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "unexpected end of input",
                    ));
                }
            }
            let step = self.left.min(usize::try_from(n).unwrap_or(usize::MAX));
            self.next += step;
            self.left -= step;
            self.tot += step as u64;
            n -= step as u64;
        }
        Ok(())
    }

    /// Returns the unread window, refilling first if it is empty. An empty
    /// slice means end of input.
    pub fn peek_slice(&mut self) -> io::Result<&[u8]> {
        if self.left == 0 {
            self.refill()?;
        }
        Ok(&self.buf[self.next..self.next + self.left])
    }

    /// Marks `n` bytes of the unread window as consumed.
    pub fn consume(&mut self, n: usize) {
        debug_assert!(n <= self.left);
        self.next += n;
        self.left -= n;
        self.tot += n as u64;
    }

    /// `true` when no further byte can be produced.
    pub fn at_eof(&mut self) -> io::Result<bool> {
        if self.left > 0 {
            return Ok(false);
        }
        self.refill()?;
        Ok(self.left == 0)
    }
}

// ---------------------------------------------------------------------------
// read_to_capacity — fills buf fully from reader, short only at EOF
// ---------------------------------------------------------------------------

pub fn read_to_capacity(reader: &mut dyn Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match reader.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(total)
}

// ---------------------------------------------------------------------------
// Source file
// ---------------------------------------------------------------------------

/// Opens a source file for reading; the sentinel `"-"` selects stdin.
/// Directories are rejected.
pub fn open_src_file(path: &str) -> io::Result<Box<dyn Read>> {
    if path == STDIN_MARK {
        return Ok(Box::new(io::stdin()));
    }
    if is_directory(Path::new(path)) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{}: is a directory", path),
        ));
    }
    let f = File::open(path)?;
    Ok(Box::new(BufReader::new(f)))
}

// ---------------------------------------------------------------------------
// Destination file
// ---------------------------------------------------------------------------

/// A write-capable destination produced by [`open_dst_file`].
pub struct DstFile {
    inner: Box<dyn Write + Send>,
    pub is_stdout: bool,
}

impl std::fmt::Debug for DstFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DstFile")
            .field("is_stdout", &self.is_stdout)
            .finish()
    }
}

impl Write for DstFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }
    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Opens a destination for writing; the sentinel `"-"` selects stdout.
///
/// When the file exists and `prefs.force` is clear: at notification level
/// ≤ 1 the call refuses with `AlreadyExists`; at higher levels an interactive
/// y/N prompt is shown on stderr.
pub fn open_dst_file(path: &str, prefs: &Prefs) -> io::Result<DstFile> {
    if path == STDOUT_MARK {
        return Ok(DstFile {
            inner: Box::new(io::stdout()),
            is_stdout: true,
        });
    }

    if !prefs.force && Path::new(path).exists() {
        if DISPLAY_LEVEL.load(Ordering::Relaxed) <= 1 {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} exists; not overwritten", path),
            ));
        }
        eprint!("{} exists; overwrite (y/N)? ", path);
        let _ = io::stderr().flush();
        let mut line = String::new();
        io::stdin().read_line(&mut line)?;
        let first = line.trim_start().chars().next().unwrap_or('\0');
        if first != 'y' && first != 'Y' {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{}: not overwritten", path),
            ));
        }
    }

    let f = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    Ok(DstFile {
        inner: Box::new(f),
        is_stdout: false,
    })
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
