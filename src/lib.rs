// parz — parallel gzip/zlib/zip compression with legacy compress decoding.

pub mod cli;
pub mod config;
pub mod io;
pub mod threadpool;
pub mod util;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Stream format selector (gzip, zlib, or single-entry zip framing).
pub use io::prefs::Format;
/// Tunable compression/decompression preferences.
pub use io::prefs::Prefs;

/// Compress one file (or stdin) into its framed output.
pub use io::compress::compress_filename;
/// Decompress or verify one file (or stdin).
pub use io::decompress::decompress_filename;
/// Summarize compressed files without decoding them.
pub use io::file_info::list_multiple_filenames;
