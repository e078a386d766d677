// check.rs — stream check values: CRC-32 (gzip, zip) and Adler-32 (zlib),
// with closed-form combination over concatenated byte ranges.
//
// Combination lets the parallel writer fold per-block checks computed on
// worker threads into a whole-stream value without touching the data again:
// CRC-32 combines by zero-extending the first operand in the GF(2) polynomial
// domain, Adler-32 by modular arithmetic on its two halves.

use crate::io::prefs::Format;

/// Base of the Adler-32 sums, the largest prime below 65536.
const ADLER_BASE: u32 = 65521;

/// Reflected CRC-32 polynomial.
const CRC_POLY: u32 = 0xedb8_8320;

// ---------------------------------------------------------------------------
// Per-format helpers
// ---------------------------------------------------------------------------

/// Initial check value for a stream of `format`: 0 for CRC-32, 1 for Adler-32.
#[inline]
pub fn check_init(format: Format) -> u32 {
    match format {
        Format::Zlib => 1,
        _ => 0,
    }
}

/// Folds `data` into a running check value for `format`.
pub fn check_update(format: Format, check: u32, data: &[u8]) -> u32 {
    match format {
        Format::Zlib => {
            let mut a = adler32::RollingAdler32::from_value(check);
            a.update_buffer(data);
            a.hash()
        }
        _ => {
            let mut h = crc32fast::Hasher::new_with_initial(check);
            h.update(data);
            h.finalize()
        }
    }
}

/// Combines two running checks of `format`, where `check2` covers the `len2`
/// bytes that followed the range covered by `check1`.
#[inline]
pub fn check_combine(format: Format, check1: u32, check2: u32, len2: u64) -> u32 {
    match format {
        Format::Zlib => combine_adler32(check1, check2, len2),
        _ => combine_crc32(check1, check2, len2),
    }
}

// ---------------------------------------------------------------------------
// CRC-32 combination
// ---------------------------------------------------------------------------

/// Multiplies the GF(2) 32×32 matrix `mat` by the bit-vector `vec`.
#[inline]
fn gf2_matrix_times(mat: &[u32; 32], mut vec: u32) -> u32 {
    let mut sum = 0;
    let mut i = 0;
    while vec != 0 {
        if vec & 1 != 0 {
            sum ^= mat[i];
        }
        vec >>= 1;
        i += 1;
    }
    sum
}

/// `square = mat * mat` in GF(2).
fn gf2_matrix_square(square: &mut [u32; 32], mat: &[u32; 32]) {
    for n in 0..32 {
        square[n] = gf2_matrix_times(mat, mat[n]);
    }
}

/// Returns the CRC-32 of the concatenation of two byte ranges, given the
/// CRC-32 of each range and the length of the second.
///
/// `crc1` is advanced past `len2` zero bytes by applying the "append one zero
/// bit" operator matrix, squared repeatedly to obtain operators for power-of-
/// two byte counts selected by the bits of `len2`, then XORed with `crc2`.
/// The matrices live on the stack.
pub fn combine_crc32(crc1: u32, crc2: u32, mut len2: u64) -> u32 {
    if len2 == 0 {
        return crc1;
    }

    let mut even = [0u32; 32]; // even-power-of-two zero operator
    let mut odd = [0u32; 32]; // odd-power-of-two zero operator

    // Operator for one zero bit: the polynomial in row 0, a shifted identity
    // in the remaining rows.
    odd[0] = CRC_POLY;
    let mut row: u32 = 1;
    for n in 1..32 {
        odd[n] = row;
        row <<= 1;
    }

    // Square twice: odd now appends four zero bits, so the loop below starts
    // at the eight-bit (one byte) operator.
    gf2_matrix_square(&mut even, &odd);
    gf2_matrix_square(&mut odd, &even);

    let mut crc1 = crc1;
    loop {
        gf2_matrix_square(&mut even, &odd);
        if len2 & 1 != 0 {
            crc1 = gf2_matrix_times(&even, crc1);
        }
        len2 >>= 1;
        if len2 == 0 {
            break;
        }
        gf2_matrix_square(&mut odd, &even);
        if len2 & 1 != 0 {
            crc1 = gf2_matrix_times(&odd, crc1);
        }
        len2 >>= 1;
        if len2 == 0 {
            break;
        }
    }
    crc1 ^ crc2
}

// ---------------------------------------------------------------------------
// Adler-32 combination
// ---------------------------------------------------------------------------

/// Returns the Adler-32 of the concatenation of two byte ranges, given the
/// Adler-32 of each range and the length of the second.
pub fn combine_adler32(adler1: u32, adler2: u32, len2: u64) -> u32 {
    let base = ADLER_BASE as u64;
    let rem = len2 % base;
    let a1_lo = (adler1 & 0xffff) as u64;
    let a1_hi = (adler1 >> 16) as u64;
    let a2_lo = (adler2 & 0xffff) as u64;
    let a2_hi = (adler2 >> 16) as u64;

    // s1 of the concatenation: s1a + s1b - 1 (the second range started from 1).
    let sum1 = (a1_lo + a2_lo + base - 1) % base;
    // s2 of the concatenation: len2 copies of s1a fold into s2.
    let sum2 = (rem * a1_lo + a1_hi + a2_hi + base - rem) % base;
    (sum1 | (sum2 << 16)) as u32
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn crc(data: &[u8]) -> u32 {
        check_update(Format::Gzip, 0, data)
    }

    fn adler(data: &[u8]) -> u32 {
        check_update(Format::Zlib, 1, data)
    }

    #[test]
    fn crc_combine_matches_one_pass() {
        let a = b"The quick brown fox ";
        let b = b"jumps over the lazy dog";
        let whole: Vec<u8> = a.iter().chain(b.iter()).copied().collect();
        let combined = combine_crc32(crc(a), crc(b), b.len() as u64);
        assert_eq!(combined, crc(&whole));
    }

    #[test]
    fn crc_combine_zero_length_is_identity() {
        let c = crc(b"payload");
        assert_eq!(combine_crc32(c, 0, 0), c);
    }

    #[test]
    fn crc_combine_many_pieces() {
        let data: Vec<u8> = (0u8..=255).cycle().take(100_000).collect();
        let mut running = 0u32;
        for chunk in data.chunks(7777) {
            let part = crc(chunk);
            running = combine_crc32(running, part, chunk.len() as u64);
        }
        assert_eq!(running, crc(&data));
    }

    #[test]
    fn adler_combine_matches_one_pass() {
        let a = b"hello ";
        let b = b"world\n";
        let whole: Vec<u8> = a.iter().chain(b.iter()).copied().collect();
        let combined = combine_adler32(adler(a), adler(b), b.len() as u64);
        assert_eq!(combined, adler(&whole));
    }

    #[test]
    fn adler_combine_long_second_range() {
        // len2 exceeding the base exercises the rem reduction.
        let a: Vec<u8> = vec![0xAB; 1000];
        let b: Vec<u8> = (0u8..=255).cycle().take(200_000).collect();
        let whole: Vec<u8> = a.iter().chain(b.iter()).copied().collect();
        let combined = combine_adler32(adler(&a), adler(&b), b.len() as u64);
        assert_eq!(combined, adler(&whole));
    }

    #[test]
    fn adler_of_known_string() {
        // RFC 1950 check value for "hello world\n".
        assert_eq!(adler(b"hello world\n"), 0x1c49_043e);
    }

    #[test]
    fn check_init_per_format() {
        assert_eq!(check_init(Format::Gzip), 0);
        assert_eq!(check_init(Format::ZipWithDescriptor), 0);
        assert_eq!(check_init(Format::Zlib), 1);
    }

    #[test]
    fn combine_dispatch_matches_direct() {
        let a = b"abc";
        let b = b"defg";
        assert_eq!(
            check_combine(Format::Gzip, crc(a), crc(b), 4),
            combine_crc32(crc(a), crc(b), 4)
        );
        assert_eq!(
            check_combine(Format::Zlib, adler(a), adler(b), 4),
            combine_adler32(adler(a), adler(b), 4)
        );
    }
}
