//! Usage and version text.

/// Print brief usage to stderr.
pub fn print_usage() {
    eprintln!("Usage: parz [options] [files ...]");
    eprintln!("  will compress files in place, adding the suffix '.gz'");
    eprintln!("  standard input is compressed to standard output when no files are given");
    eprintln!("Options:");
    eprintln!("  -0 to -9   compression level (default 6)");
    eprintln!("  -b K       block size in KiB (default 128, minimum 32)");
    eprintln!("  -p N       number of compression processes (default 32)");
    eprintln!("  -i         compress blocks independently (no shared dictionary)");
    eprintln!("  -z         zlib output format instead of gzip (suffix .zz)");
    eprintln!("  -K         zip output format instead of gzip (suffix .zip)");
    eprintln!("  -d         decompress");
    eprintln!("  -t         test the integrity of compressed input");
    eprintln!("  -l         list compressed file contents");
    eprintln!("  -c         write to standard output, keep files");
    eprintln!("  -k         do not delete input files after processing");
    eprintln!("  -f         force overwrite, and output to a terminal");
    eprintln!("  -r         recurse into directories");
    eprintln!("  -s .suf    use suffix .suf instead of the format default");
    eprintln!("  -N         store/restore name and timestamp; -n no name, -T no timestamp");
    eprintln!("  -q / -v    decrease / increase verbosity");
    eprintln!("  -V         display the version; -h this help");
}

/// Print the version line to stdout.
pub fn print_version() {
    println!("parz {}", env!("CARGO_PKG_VERSION"));
}
