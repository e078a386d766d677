// prefs.rs — tunable preferences, stream format selector, display globals.
//
// All options live in a `Prefs` value owned by the caller and passed by
// reference into the compression/decompression engines; the only global is
// the notification level, which the display macros read from every module.

use std::sync::atomic::{AtomicI32, Ordering};

use crate::config::{
    default_nb_workers, BLOCKSIZE_DEFAULT, BLOCKSIZE_MIN, CLEVEL_DEFAULT,
};

// ---------------------------------------------------------------------------
// Numeric constants
// ---------------------------------------------------------------------------
pub const KB: usize = 1 << 10;
pub const MB: usize = 1 << 20;

// ---------------------------------------------------------------------------
// Display / notification globals
// ---------------------------------------------------------------------------

/// Global notification level. 0 = silent, 1 = errors only, 2 = results +
/// warnings (default), 3+ = progress and verbose detail.
pub static DISPLAY_LEVEL: AtomicI32 = AtomicI32::new(2);

/// Write `msg` to stderr if the current notification level is ≥ `level`.
#[inline]
pub fn display_level(level: i32, msg: &str) {
    if DISPLAY_LEVEL.load(Ordering::Relaxed) >= level {
        eprint!("{}", msg);
    }
}

/// Sets the global notification level. Returns the value stored.
pub fn set_notification_level(level: i32) -> i32 {
    DISPLAY_LEVEL.store(level, Ordering::Relaxed);
    level
}

/// Returns the current notification level.
#[inline]
pub fn notification_level() -> i32 {
    DISPLAY_LEVEL.load(Ordering::Relaxed)
}

// ---------------------------------------------------------------------------
// Stream format selector
// ---------------------------------------------------------------------------

/// On-wire framing around the raw deflate stream. Selects header/trailer
/// layout and the check algorithm: gzip and zip carry CRC-32, zlib carries
/// Adler-32.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    Gzip,
    Zlib,
    /// Zip local entry whose header already carries crc/sizes.
    /// Produced by other tools; decode-only here.
    ZipNoDescriptor,
    /// Zip local entry followed by a data descriptor. This is what the
    /// compressor emits (sizes are unknown until the entry is written).
    ZipWithDescriptor,
}

impl Format {
    /// `true` for both zip variants.
    #[inline]
    pub fn is_zip(self) -> bool {
        matches!(self, Format::ZipNoDescriptor | Format::ZipWithDescriptor)
    }

    /// Suffix appended to compressed output filenames.
    pub fn suffix(self) -> &'static str {
        match self {
            Format::Gzip => ".gz",
            Format::Zlib => ".zz",
            Format::ZipNoDescriptor | Format::ZipWithDescriptor => ".zip",
        }
    }
}

// ---------------------------------------------------------------------------
// Preferences
// ---------------------------------------------------------------------------

/// All tunable parameters for compression and decompression, bundled into a
/// value type so the engines receive configuration explicitly instead of
/// through globals.
#[derive(Clone, Debug)]
pub struct Prefs {
    /// Output framing. Default: gzip.
    pub format: Format,
    /// Compression level 0..=9. Default: 6.
    pub level: u32,
    /// Input block size in bytes. Default: 128 KiB, minimum 32 KiB.
    pub block_size: usize,
    /// Number of compression workers; 1 selects the single-thread path.
    pub nb_workers: usize,
    /// Prime each block's deflate state with the previous block's last
    /// 32 KiB. Disabled by -i (independent blocks).
    pub dictionary: bool,
    /// Overwrite existing destination files without prompting (-f).
    pub force: bool,
    /// Keep (do not delete) input files after successful processing (-k).
    pub keep: bool,
    /// Write to stdout (-c).
    pub to_stdout: bool,
    /// Recurse into directories (-r).
    pub recursive: bool,
    /// Store/restore the original file name in gzip headers (-N sets both
    /// name and time; -n clears the name).
    pub store_name: bool,
    /// Store the modification time in headers (-T clears it).
    pub store_time: bool,
    /// On decompression, restore name/mtime from the header (-N).
    pub restore_meta: bool,
    /// Custom suffix for compressed output (-s), replacing the format default.
    pub suffix: Option<String>,
    /// Decompress but discard output, verifying checks (-t).
    pub test_mode: bool,
}

impl Default for Prefs {
    fn default() -> Self {
        Prefs {
            format: Format::Gzip,
            level: CLEVEL_DEFAULT,
            block_size: BLOCKSIZE_DEFAULT,
            nb_workers: default_nb_workers(),
            dictionary: true,
            force: false,
            keep: false,
            to_stdout: false,
            recursive: false,
            store_name: true,
            store_time: true,
            restore_meta: false,
            suffix: None,
            test_mode: false,
        }
    }
}

impl Prefs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the block size in bytes. Rejects sizes below 32 KiB and sizes
    /// whose worst-case deflate expansion `B + B/2048 + 10` does not fit in
    /// `usize`. Returns the stored size.
    pub fn set_block_size(&mut self, block_size: usize) -> Result<usize, String> {
        if block_size < BLOCKSIZE_MIN {
            return Err(format!(
                "block size must be at least {} KiB",
                BLOCKSIZE_MIN / KB
            ));
        }
        if out_buf_size(block_size).is_none() {
            return Err("block size too large".to_owned());
        }
        self.block_size = block_size;
        Ok(block_size)
    }

    /// Sets the worker count; must be ≥ 1. Returns the stored count.
    pub fn set_nb_workers(&mut self, nb: usize) -> Result<usize, String> {
        if nb < 1 {
            return Err("need at least one process".to_owned());
        }
        self.nb_workers = nb;
        Ok(nb)
    }

    /// Sets the compression level 0..=9.
    pub fn set_level(&mut self, level: u32) -> Result<u32, String> {
        if level > 9 {
            return Err("compression level must be 0..9".to_owned());
        }
        self.level = level;
        Ok(level)
    }

    /// Suffix in effect for compressed output names.
    pub fn out_suffix(&self) -> &str {
        self.suffix.as_deref().unwrap_or_else(|| self.format.suffix())
    }
}

/// Worst-case compressed size of one block: the input plus one five-byte
/// stored-block header per 2 KiB plus room for the sync marker. `None` when
/// the arithmetic would overflow `usize`.
pub fn out_buf_size(block_size: usize) -> Option<usize> {
    block_size
        .checked_add(block_size / 2048)?
        .checked_add(10)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_prefs_fields() {
        let p = Prefs::default();
        assert_eq!(p.format, Format::Gzip);
        assert_eq!(p.level, 6);
        assert_eq!(p.block_size, 128 * KB);
        assert!(p.nb_workers >= 1);
        assert!(p.dictionary);
        assert!(!p.force);
        assert!(!p.keep);
        assert!(p.store_name);
        assert!(p.store_time);
        assert!(!p.test_mode);
    }

    #[test]
    fn set_block_size_rejects_small() {
        let mut p = Prefs::default();
        assert!(p.set_block_size(16 * KB).is_err());
        assert_eq!(p.set_block_size(32 * KB).unwrap(), 32 * KB);
    }

    #[test]
    fn set_block_size_rejects_overflow() {
        let mut p = Prefs::default();
        assert!(p.set_block_size(usize::MAX - 4).is_err());
    }

    #[test]
    fn set_level_bounds() {
        let mut p = Prefs::default();
        assert!(p.set_level(10).is_err());
        assert_eq!(p.set_level(9).unwrap(), 9);
        assert_eq!(p.set_level(0).unwrap(), 0);
    }

    #[test]
    fn set_nb_workers_rejects_zero() {
        let mut p = Prefs::default();
        assert!(p.set_nb_workers(0).is_err());
        assert_eq!(p.set_nb_workers(4).unwrap(), 4);
    }

    #[test]
    fn format_suffixes() {
        assert_eq!(Format::Gzip.suffix(), ".gz");
        assert_eq!(Format::Zlib.suffix(), ".zz");
        assert_eq!(Format::ZipWithDescriptor.suffix(), ".zip");
    }

    #[test]
    fn custom_suffix_overrides_format() {
        let mut p = Prefs::default();
        p.suffix = Some(".gzip".to_owned());
        assert_eq!(p.out_suffix(), ".gzip");
        p.suffix = None;
        assert_eq!(p.out_suffix(), ".gz");
    }

    #[test]
    fn out_buf_size_formula() {
        assert_eq!(out_buf_size(128 * KB), Some(128 * KB + 64 + 10));
        assert_eq!(out_buf_size(usize::MAX), None);
    }
}
