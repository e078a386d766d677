//! Decoder for the legacy LZW "compress" format (magic `1f 9d`).
//!
//! Codes are 9 to `max_bits` bits wide, packed LSB-first. The historical
//! encoder emitted codes in chunks of eight (one chunk = `bits` bytes) and
//! padded the output to a chunk boundary whenever the code width changed or
//! a clear code was written; the decoder must discard those padding bytes.
//! That is modelled here with a `chunk` countdown of bytes remaining in the
//! current chunk: when the table is about to outgrow the current mask (or a
//! clear code arrives), the rest of the chunk is skipped before the width
//! changes.

use std::io::{self, Read};

use crate::io::file_io::SourceReader;
use crate::io::prefs::KB;

/// Output is delivered to the sink in chunks of this size.
const OUT_CHUNK: usize = 32 * KB;

/// Reserved flag bits in the header byte.
const FLAG_RESERVED: u8 = 0x60;
/// Block-compress mode: code 256 clears the table.
const FLAG_BLOCK: u8 = 0x80;

fn invalid(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}

/// Decodes one LZW stream from `src` (positioned after the 2-byte magic),
/// delivering output through `sink`. Returns the number of decoded bytes.
pub fn decode_lzw_stream<R, F>(src: &mut SourceReader<R>, mut sink: F) -> io::Result<u64>
where
    R: Read,
    F: FnMut(&[u8]) -> io::Result<()>,
{
    // Header byte: low five bits are the maximum code width, 0x80 selects
    // block-compress mode. A stored width of 9 means 10 in this format.
    let flags = src.get()?.ok_or_else(|| invalid("missing lzw data"))?;
    if flags & FLAG_RESERVED != 0 {
        return Err(invalid("unknown lzw flags set"));
    }
    let mut max_bits = (flags & 0x1f) as u32;
    if !(9..=16).contains(&max_bits) {
        return Err(invalid("lzw bits out of range"));
    }
    if max_bits == 9 {
        max_bits = 10;
    }
    let block_mode = flags & FLAG_BLOCK != 0;

    let mut bits: u32 = 9;
    let mut mask: u32 = 0x1ff;
    let mut end: u32 = if block_mode { 256 } else { 255 };

    // First code is the first output byte; it gets no table entry.
    let b0 = match src.get()? {
        None => return Ok(0), // no compressed data is ok
        Some(b) => b,
    };
    let b1 = src.get()?.ok_or_else(|| invalid("invalid lzw code"))?;
    if b1 & 1 != 0 {
        // The ninth bit of the first code would make it >= 256.
        return Err(invalid("invalid lzw code"));
    }
    let mut prev: u32 = b0 as u32;
    let mut final_: u32 = prev;
    let mut buf: u32 = (b1 as u32) >> 1; // remaining 7 bits
    let mut left: u32 = 7;
    let mut chunk: u32 = bits - 2; // bytes left in the current chunk

    let mut prefix = vec![0u16; 1 << 16];
    let mut suffix = vec![0u8; 1 << 16];
    let mut stack: Vec<u8> = Vec::with_capacity(65280 + 2);

    let mut out = Vec::with_capacity(OUT_CHUNK);
    out.push(b0);
    let mut out_tot: u64 = 1;

    loop {
        // The table will be full after this code: discard the rest of the
        // chunk and widen. Hitting end of input here is a normal stream end.
        if end >= mask && bits < max_bits {
            if chunk < bits {
                match src.skip(chunk as u64) {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                    Err(e) => return Err(e),
                }
            }
            buf = 0;
            left = 0;
            bits += 1;
            mask = (mask << 1) + 1;
            chunk = bits;
        }

        // Fetch a code of `bits` bits; end of input before the first byte
        // ends the stream, inside a code it is a truncation.
        let b = match src.get()? {
            None => break,
            Some(b) => b,
        };
        chunk -= 1;
        if chunk == 0 {
            chunk = bits;
        }
        buf += (b as u32) << left;
        left += 8;
        if left < bits {
            let b = src.get()?.ok_or_else(|| invalid("missing lzw data"))?;
            chunk -= 1;
            if chunk == 0 {
                chunk = bits;
            }
            buf += (b as u32) << left;
            left += 8;
        }
        let code = buf & mask;
        buf >>= bits;
        left -= bits;

        // Clear code: discard the rest of the chunk, return to nine bits.
        if code == 256 && block_mode {
            if chunk < bits {
                match src.skip(chunk as u64) {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                    Err(e) => return Err(e),
                }
            }
            buf = 0;
            left = 0;
            bits = 9;
            mask = 0x1ff;
            end = 255;
            chunk = bits;
            continue;
        }

        // KwKwK: the code about to be defined. Anything further ahead, or a
        // stale prev after a clear, is corrupt.
        let temp = code;
        let mut code = code;
        if code > end {
            if code != end + 1 || prev > end {
                return Err(invalid("invalid lzw code"));
            }
            stack.push(final_ as u8);
            code = prev;
        }

        // Walk the prefix chain, collecting the match in reverse.
        while code >= 256 {
            stack.push(suffix[code as usize]);
            code = prefix[code as usize] as u32;
        }
        stack.push(code as u8);
        final_ = code;

        // Link the new table entry.
        if end < mask {
            end += 1;
            prefix[end as usize] = prev as u16;
            suffix[end as usize] = final_ as u8;
        }
        prev = temp;

        // Emit the match in forward order, flushing full output chunks.
        out_tot += stack.len() as u64;
        while let Some(b) = stack.pop() {
            out.push(b);
        }
        while out.len() >= OUT_CHUNK {
            sink(&out[..OUT_CHUNK])?;
            out.drain(..OUT_CHUNK);
        }
    }

    if !out.is_empty() {
        sink(&out)?;
    }
    Ok(out_tot)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn decode(payload: &[u8]) -> io::Result<Vec<u8>> {
        let mut src = SourceReader::new(Cursor::new(payload.to_vec()));
        let mut out = Vec::new();
        decode_lzw_stream(&mut src, |chunk| {
            out.extend_from_slice(chunk);
            Ok(())
        })
        .map(|n| {
            assert_eq!(n as usize, out.len());
            out
        })
    }

    /// Reference encoder for test vectors. Mirrors the historical format:
    /// LSB-first packed codes with the output padded to a multiple of the
    /// code width (in bytes) at every width change and clear code.
    struct TestEncoder {
        bytes: Vec<u8>,
        bitbuf: u64,
        bitcnt: u32,
        bits: u32,
        written_since_mark: usize,
    }

    impl TestEncoder {
        fn new(block_mode: bool, max_bits: u8) -> Self {
            let flags = (if block_mode { 0x80 } else { 0 }) | max_bits;
            TestEncoder {
                bytes: vec![flags],
                bitbuf: 0,
                bitcnt: 0,
                bits: 9,
                written_since_mark: 0,
            }
        }

        fn put(&mut self, code: u32) {
            self.bitbuf |= (code as u64) << self.bitcnt;
            self.bitcnt += self.bits;
            while self.bitcnt >= 8 {
                self.bytes.push((self.bitbuf & 0xff) as u8);
                self.bitbuf >>= 8;
                self.bitcnt -= 8;
                self.written_since_mark += 1;
            }
        }

        /// Flush the partial byte and pad to a chunk boundary, as the
        /// historical encoder did before changing the code width.
        fn pad_to_chunk(&mut self) {
            if self.bitcnt > 0 {
                self.bytes.push((self.bitbuf & 0xff) as u8);
                self.bitbuf = 0;
                self.bitcnt = 0;
                self.written_since_mark += 1;
            }
            while self.written_since_mark % self.bits as usize != 0 {
                self.bytes.push(0);
                self.written_since_mark += 1;
            }
            self.written_since_mark = 0;
        }

        fn widen(&mut self) {
            self.pad_to_chunk();
            self.bits += 1;
        }

        fn finish(mut self) -> Vec<u8> {
            if self.bitcnt > 0 {
                self.bytes.push((self.bitbuf & 0xff) as u8);
            }
            self.bytes
        }
    }

    /// LZW-compress `data` in block mode with `max_bits`, mirroring the
    /// decoder's table growth so width changes land on the same codes.
    fn reference_compress(data: &[u8], max_bits: u8) -> Vec<u8> {
        use std::collections::HashMap;
        let mut enc = TestEncoder::new(true, max_bits);
        if data.is_empty() {
            return enc.finish();
        }
        let max_code = (1u32 << max_bits) - 1;
        let mut table: HashMap<(u32, u8), u32> = HashMap::new();
        let mut next_code: u32 = 257;
        // Decoder-side state, tracked so the encoder widens exactly where
        // the decoder will: `end` grows by one for every code after the
        // first, and the width bumps before the code that would pass `mask`.
        let mut end: u32 = 256;
        let mut mask: u32 = 0x1ff;
        let mut emitted: u32 = 0;
        let mut emit = |enc: &mut TestEncoder, code: u32, end: &mut u32, mask: &mut u32, emitted: &mut u32| {
            if *emitted > 0 && *end >= *mask && enc.bits < max_bits as u32 {
                enc.widen();
                *mask = (*mask << 1) + 1;
            }
            enc.put(code);
            if *emitted > 0 && *end < *mask {
                *end += 1;
            }
            *emitted += 1;
        };

        let mut w: u32 = data[0] as u32;
        for &b in &data[1..] {
            if let Some(&code) = table.get(&(w, b)) {
                w = code;
                continue;
            }
            emit(&mut enc, w, &mut end, &mut mask, &mut emitted);
            if next_code <= max_code {
                table.insert((w, b), next_code);
                next_code += 1;
            }
            w = b as u32;
        }
        emit(&mut enc, w, &mut end, &mut mask, &mut emitted);
        enc.finish()
    }

    // ── Handcrafted vectors ──────────────────────────────────────────────

    #[test]
    fn decodes_seven_a_at_nine_bits() {
        // "AAAAAAA" compresses to codes 65, 257, 258, 65 in block mode.
        let payload = [0x90, 0x41, 0x02, 0x0a, 0x0c, 0x02];
        assert_eq!(decode(&payload).unwrap(), b"AAAAAAA");
    }

    #[test]
    fn decodes_clear_code_with_chunk_padding() {
        // Codes 65, CLEAR, 66 — the clear pads the chunk to nine bytes.
        let payload = [
            0x90, 0x41, 0x00, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x42, 0x00,
        ];
        assert_eq!(decode(&payload).unwrap(), b"AB");
    }

    #[test]
    fn empty_payload_is_empty_output() {
        assert_eq!(decode(&[0x90]).unwrap(), b"");
    }

    #[test]
    fn reserved_flags_rejected() {
        assert!(decode(&[0xd0, 0x41]).is_err()); // 0x40 reserved bit
    }

    #[test]
    fn bits_out_of_range_rejected() {
        assert!(decode(&[0x88, 0x41]).is_err()); // max_bits = 8
        assert!(decode(&[0x80 | 17, 0x41]).is_err()); // max_bits = 17
    }

    #[test]
    fn single_byte_code_stream_is_invalid() {
        // Eight bits cannot hold a nine-bit first code.
        assert!(decode(&[0x90, 0x41]).is_err());
    }

    #[test]
    fn first_code_over_255_rejected() {
        // Second byte with its low bit set makes the first code >= 256.
        assert!(decode(&[0x90, 0x41, 0x01]).is_err());
    }

    #[test]
    fn code_beyond_table_rejected() {
        // First code 'A', then code 300 with only 257 defined.
        let mut val: u64 = 65;
        val |= 300 << 9;
        let payload = [
            0x90,
            (val & 0xff) as u8,
            ((val >> 8) & 0xff) as u8,
            ((val >> 16) & 0xff) as u8,
        ];
        assert!(decode(&payload).is_err());
    }

    #[test]
    fn kwkwk_case_decodes() {
        // 'A' then the not-yet-defined code 257 ("AA"): total "AAA".
        let mut val: u64 = 65;
        val |= 257 << 9;
        let payload = [
            0x90,
            (val & 0xff) as u8,
            ((val >> 8) & 0xff) as u8,
            ((val >> 16) & 0xff) as u8,
        ];
        assert_eq!(decode(&payload).unwrap(), b"AAA");
    }

    // ── Reference-encoder round trips ────────────────────────────────────

    #[test]
    fn round_trip_text_through_width_growth() {
        // Enough distinct digrams to push the table past 511 entries and
        // trigger the 9→10 bit width change with its chunk flush.
        let mut data = Vec::new();
        for i in 0..2000u32 {
            data.extend_from_slice(format!("{:04} ", i * 7 % 9973).as_bytes());
        }
        let payload = reference_compress(&data, 16);
        assert_eq!(decode(&payload).unwrap(), data);
    }

    #[test]
    fn round_trip_repetitive_data() {
        let data = b"the quick brown fox jumps over the lazy dog. ".repeat(400);
        let payload = reference_compress(&data, 16);
        assert_eq!(decode(&payload).unwrap(), data);
    }

    #[test]
    fn round_trip_capped_width() {
        // max_bits = 10: the table saturates and stops growing.
        let mut data = Vec::new();
        for i in 0..30000u32 {
            data.push((i % 251) as u8);
        }
        let payload = reference_compress(&data, 10);
        assert_eq!(decode(&payload).unwrap(), data);
    }
}
