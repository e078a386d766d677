//! I/O engine: framing, checks, the compression pipeline, decompression,
//! listing, and file handling.

pub mod check;
pub mod compress;
pub mod compress_mt;
pub mod decompress;
pub mod decompress_lzw;
pub mod file_info;
pub mod file_io;
pub mod frame;
pub mod pool;
pub mod prefs;

// ── Common entry points ──────────────────────────────────────────────────────
pub use compress::{compress_filename, compress_multiple_filenames, CompressStats};
pub use decompress::{
    decompress_filename, decompress_multiple_filenames, DecompressStats,
};
pub use file_info::{list_filename, list_multiple_filenames};
pub use file_io::{STDIN_MARK, STDOUT_MARK};
pub use prefs::{set_notification_level, Format, Prefs};
