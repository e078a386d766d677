// config.rs — Compile-time configuration constants.
//
// Runtime overrides: block size via -b<KiB>, worker count via -p<N>,
// compression level via -0..-9. All three invalidate an existing work-unit
// pool (see io::pool).

/// Default compression level.
pub const CLEVEL_DEFAULT: u32 = 6;

/// Default block size in bytes (128 KiB). Overridable with -b, minimum 32 KiB.
pub const BLOCKSIZE_DEFAULT: usize = 128 * 1024;

/// Smallest accepted block size. The deflate window is 32 KiB; smaller blocks
/// would defeat the cross-block preset dictionary.
pub const BLOCKSIZE_MIN: usize = 32 * 1024;

/// Default number of compression workers. Overridable with -p; the ring of
/// work units has one slot per worker.
pub const NB_WORKERS_DEFAULT: usize = 32;

/// Size of the preset dictionary handed from one block to the next (the
/// deflate window, 32 KiB).
pub const DICT_SIZE: usize = 32 * 1024;

/// Returns the default number of compression workers.
pub fn default_nb_workers() -> usize {
    NB_WORKERS_DEFAULT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_workers_at_least_one() {
        assert!(default_nb_workers() >= 1);
    }

    #[test]
    fn default_block_size_at_least_min() {
        assert!(BLOCKSIZE_DEFAULT >= BLOCKSIZE_MIN);
    }
}
