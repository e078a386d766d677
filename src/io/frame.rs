// frame.rs — stream framing: gzip, zlib, and single-entry zip headers and
// trailers, plus header detection for decompression (including the legacy
// LZW magic).
//
// All multi-byte fields are little-endian except the zlib Adler-32 trailer,
// which RFC 1950 defines big-endian.

use std::io::{self, Read, Write};

use crate::io::file_io::SourceReader;
use crate::io::prefs::{Format, Prefs};

// ---------------------------------------------------------------------------
// Magic numbers and header flag bits
// ---------------------------------------------------------------------------

pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
pub const LZW_MAGIC: [u8; 2] = [0x1f, 0x9d];
pub const ZIP_LOCAL_MAGIC: [u8; 4] = [b'P', b'K', 3, 4];

/// gzip FLG bits (RFC 1952).
const FHCRC: u8 = 1 << 1;
const FEXTRA: u8 = 1 << 2;
const FNAME: u8 = 1 << 3;
const FCOMMENT: u8 = 1 << 4;
/// Reserved FLG bits; must be zero.
const FRESERVED: u8 = 0xe0;

/// Zip general-purpose flag: sizes deferred to a data descriptor.
const ZIP_FLAG_DESCRIPTOR: u16 = 0x0008;
/// Zip general-purpose flag: entry is encrypted (not supported).
const ZIP_FLAG_ENCRYPTED: u16 = 0x0001;

/// Extra-field ids recognized in zip local headers.
const XID_ZIP64: u16 = 0x0001;
const XID_PKWARE_UNIX: u16 = 0x000d;
const XID_INFOZIP_UNIX: u16 = 0x5855;
const XID_EXT_TIMESTAMP: u16 = 0x5455;

// ---------------------------------------------------------------------------
// Stream metadata carried alongside the data
// ---------------------------------------------------------------------------

/// Name and modification time recorded in (or recovered from) a header.
#[derive(Clone, Debug, Default)]
pub struct HeaderMeta {
    /// Base name to store, if any.
    pub name: Option<String>,
    /// Modification time as Unix seconds; 0 suppresses the field.
    pub mtime: i64,
}

/// Compression method found by [`read_header`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Method {
    /// Raw deflate inside the given framing.
    Deflate(Format),
    /// Legacy LZW (compress) stream; payload follows the 2-byte magic.
    Lzw,
}

/// Fields captured from a zip local header, for trailer verification.
#[derive(Clone, Copy, Debug, Default)]
pub struct ZipEntry {
    pub crc: u32,
    pub clen: u64,
    pub ulen: u64,
}

/// Everything [`read_header`] learns about the stream that follows.
#[derive(Clone, Debug)]
pub struct StreamHeader {
    pub method: Method,
    pub name: Option<String>,
    /// Header modification time (Unix seconds, 0 = absent).
    pub stamp: i64,
    /// Present when the header was a zip local header.
    pub zip: Option<ZipEntry>,
}

// ---------------------------------------------------------------------------
// DOS time
// ---------------------------------------------------------------------------

/// Converts Unix seconds to the 32-bit DOS date/time used by zip headers.
/// Years outside [1980, 2107] (and conversion failures) yield 0.
pub fn dos_time(unix: i64) -> u32 {
    #[cfg(unix)]
    {
        let t = unix as libc::time_t;
        let mut tm: libc::tm = unsafe { std::mem::zeroed() };
        // SAFETY: localtime_r writes only into the provided tm.
        if unsafe { libc::localtime_r(&t, &mut tm) }.is_null() {
            return 0;
        }
        let year = tm.tm_year + 1900;
        if !(1980..=2107).contains(&year) {
            return 0;
        }
        (((tm.tm_year - 80) as u32) << 25)
            | (((tm.tm_mon + 1) as u32) << 21)
            | ((tm.tm_mday as u32) << 16)
            | ((tm.tm_hour as u32) << 11)
            | ((tm.tm_min as u32) << 5)
            | (((tm.tm_sec + 1) as u32) >> 1)
    }
    #[cfg(not(unix))]
    {
        let _ = unix;
        0
    }
}

/// Converts a 32-bit DOS date/time back to Unix seconds (0 stays 0).
pub fn time_from_dos(dos: u32) -> i64 {
    if dos == 0 {
        return 0;
    }
    #[cfg(unix)]
    {
        let mut tm: libc::tm = unsafe { std::mem::zeroed() };
        tm.tm_year = (((dos >> 25) & 0x7f) + 80) as libc::c_int;
        tm.tm_mon = (((dos >> 21) & 0x0f) as libc::c_int) - 1;
        tm.tm_mday = ((dos >> 16) & 0x1f) as libc::c_int;
        tm.tm_hour = ((dos >> 11) & 0x1f) as libc::c_int;
        tm.tm_min = ((dos >> 5) & 0x3f) as libc::c_int;
        tm.tm_sec = ((dos & 0x1f) << 1) as libc::c_int;
        tm.tm_isdst = -1;
        // SAFETY: mktime reads and normalizes the tm in place.
        let t = unsafe { libc::mktime(&mut tm) };
        if t == -1 {
            0
        } else {
            t as i64
        }
    }
    #[cfg(not(unix))]
    {
        0
    }
}

// ---------------------------------------------------------------------------
// Header emission
// ---------------------------------------------------------------------------

/// Writes the stream header for `prefs.format` and returns its length.
///
/// The stored name honors `prefs.store_name`, the timestamp
/// `prefs.store_time`; zip always writes a name (`"-"` when none) and its
/// 9-byte extended-timestamp extra field.
pub fn write_header<W: Write + ?Sized>(
    dst: &mut W,
    prefs: &Prefs,
    meta: &HeaderMeta,
) -> io::Result<u64> {
    let name = if prefs.store_name {
        meta.name.as_deref()
    } else {
        None
    };
    let mtime = if prefs.store_time { meta.mtime } else { 0 };

    match prefs.format {
        Format::Gzip => {
            let mut head = Vec::with_capacity(10 + name.map_or(0, |n| n.len() + 1));
            head.extend_from_slice(&GZIP_MAGIC);
            head.push(8); // deflate
            head.push(if name.is_some() { FNAME } else { 0 });
            head.extend_from_slice(&((mtime.max(0) as u32).to_le_bytes()));
            head.push(match prefs.level {
                9 => 2,
                1 => 4,
                _ => 0,
            });
            head.push(3); // Unix
            if let Some(n) = name {
                head.extend_from_slice(n.as_bytes());
                head.push(0);
            }
            dst.write_all(&head)?;
            Ok(head.len() as u64)
        }
        Format::Zlib => {
            let cmf: u8 = 0x78; // deflate, 32 KiB window
            let tier: u8 = match prefs.level {
                9 => 3,
                1 => 0,
                l if l >= 6 => 1,
                _ => 2,
            };
            let mut flg = tier << 6;
            let rem = ((cmf as u16) * 256 + flg as u16) % 31;
            if rem != 0 {
                flg += (31 - rem) as u8;
            }
            dst.write_all(&[cmf, flg])?;
            Ok(2)
        }
        Format::ZipNoDescriptor | Format::ZipWithDescriptor => {
            let name = name.unwrap_or("-");
            let mut head = Vec::with_capacity(30 + name.len() + 9);
            head.extend_from_slice(&ZIP_LOCAL_MAGIC);
            head.extend_from_slice(&20u16.to_le_bytes()); // version needed
            head.extend_from_slice(&ZIP_FLAG_DESCRIPTOR.to_le_bytes());
            head.extend_from_slice(&8u16.to_le_bytes()); // deflate
            head.extend_from_slice(&dos_time(mtime).to_le_bytes());
            head.extend_from_slice(&[0; 12]); // crc, clen, ulen in descriptor
            head.extend_from_slice(&(name.len() as u16).to_le_bytes());
            head.extend_from_slice(&9u16.to_le_bytes()); // extra length
            head.extend_from_slice(name.as_bytes());
            head.extend_from_slice(&XID_EXT_TIMESTAMP.to_le_bytes());
            head.extend_from_slice(&5u16.to_le_bytes());
            head.push(0x01); // mod-time present
            head.extend_from_slice(&((mtime.max(0) as u32).to_le_bytes()));
            dst.write_all(&head)?;
            Ok(head.len() as u64)
        }
    }
}

/// Writes the stream trailer: gzip CRC+length, zlib Adler-32, or the zip
/// data descriptor followed by the central directory and end record.
///
/// `head_len` is the value returned by [`write_header`]; zip needs it to
/// compute the central-directory offset.
pub fn write_trailer<W: Write + ?Sized>(
    dst: &mut W,
    prefs: &Prefs,
    meta: &HeaderMeta,
    ulen: u64,
    clen: u64,
    check: u32,
    head_len: u64,
) -> io::Result<()> {
    match prefs.format {
        Format::Gzip => {
            let mut tail = [0u8; 8];
            tail[..4].copy_from_slice(&check.to_le_bytes());
            tail[4..].copy_from_slice(&((ulen as u32).to_le_bytes()));
            dst.write_all(&tail)
        }
        Format::Zlib => dst.write_all(&check.to_be_bytes()),
        Format::ZipNoDescriptor | Format::ZipWithDescriptor => {
            let name = if prefs.store_name {
                meta.name.as_deref().unwrap_or("-")
            } else {
                "-"
            };
            let mtime = if prefs.store_time { meta.mtime } else { 0 };

            let mut tail = Vec::with_capacity(12 + 46 + name.len() + 9 + 22);
            // Data descriptor (no signature): crc, clen, ulen.
            tail.extend_from_slice(&check.to_le_bytes());
            tail.extend_from_slice(&((clen as u32).to_le_bytes()));
            tail.extend_from_slice(&((ulen as u32).to_le_bytes()));

            // Central directory, one entry.
            let central_size = (46 + name.len() + 9) as u32;
            tail.extend_from_slice(&[b'P', b'K', 1, 2]);
            tail.extend_from_slice(&63u16.to_le_bytes()); // version made by
            tail.extend_from_slice(&20u16.to_le_bytes()); // version needed
            tail.extend_from_slice(&ZIP_FLAG_DESCRIPTOR.to_le_bytes());
            tail.extend_from_slice(&8u16.to_le_bytes());
            tail.extend_from_slice(&dos_time(mtime).to_le_bytes());
            tail.extend_from_slice(&check.to_le_bytes());
            tail.extend_from_slice(&((clen as u32).to_le_bytes()));
            tail.extend_from_slice(&((ulen as u32).to_le_bytes()));
            tail.extend_from_slice(&(name.len() as u16).to_le_bytes());
            tail.extend_from_slice(&9u16.to_le_bytes());
            tail.extend_from_slice(&0u16.to_le_bytes()); // comment length
            tail.extend_from_slice(&0u16.to_le_bytes()); // disk number
            tail.extend_from_slice(&0u16.to_le_bytes()); // internal attrs
            tail.extend_from_slice(&0u32.to_le_bytes()); // external attrs
            tail.extend_from_slice(&0u32.to_le_bytes()); // local header offset
            tail.extend_from_slice(name.as_bytes());
            tail.extend_from_slice(&XID_EXT_TIMESTAMP.to_le_bytes());
            tail.extend_from_slice(&5u16.to_le_bytes());
            tail.push(0x01);
            tail.extend_from_slice(&((mtime.max(0) as u32).to_le_bytes()));

            // End of central directory.
            let central_offset = (head_len + clen + 12) as u32;
            tail.extend_from_slice(&[b'P', b'K', 5, 6]);
            tail.extend_from_slice(&0u16.to_le_bytes());
            tail.extend_from_slice(&0u16.to_le_bytes());
            tail.extend_from_slice(&1u16.to_le_bytes());
            tail.extend_from_slice(&1u16.to_le_bytes());
            tail.extend_from_slice(&central_size.to_le_bytes());
            tail.extend_from_slice(&central_offset.to_le_bytes());
            tail.extend_from_slice(&0u16.to_le_bytes());
            dst.write_all(&tail)
        }
    }
}

// ---------------------------------------------------------------------------
// Header detection and parsing
// ---------------------------------------------------------------------------

fn truncated() -> io::Error {
    io::Error::new(io::ErrorKind::UnexpectedEof, "premature end of header")
}

fn bad_flags(what: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        format!("unknown header flags set ({})", what),
    )
}

/// Reads and classifies the next stream header.
///
/// Recognizes, in order: zlib (check-bits parity and deflate method nibble),
/// legacy LZW magic, zip local header, gzip. Returns `Ok(None)` on a clean
/// end of input before the first byte. Name and timestamp metadata are
/// captured only when `save_meta` is set.
pub fn read_header<R: Read>(
    src: &mut SourceReader<R>,
    save_meta: bool,
) -> io::Result<Option<StreamHeader>> {
    let b0 = match src.get()? {
        None => return Ok(None),
        Some(b) => b,
    };
    let b1 = src.get()?.ok_or_else(truncated)?;

    // zlib: deflate method nibble, window ≤ 32 KiB, 16-bit value divisible
    // by 31.
    if b0 & 0x0f == 8 && b0 >> 4 <= 7 && (b0 as u32 * 256 + b1 as u32) % 31 == 0 {
        if b1 & 0x20 != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "zlib stream requires a preset dictionary",
            ));
        }
        return Ok(Some(StreamHeader {
            method: Method::Deflate(Format::Zlib),
            name: None,
            stamp: 0,
            zip: None,
        }));
    }

    if [b0, b1] == LZW_MAGIC {
        return Ok(Some(StreamHeader {
            method: Method::Lzw,
            name: None,
            stamp: 0,
            zip: None,
        }));
    }

    if [b0, b1] == [b'P', b'K'] {
        let b2 = src.get()?.ok_or_else(truncated)?;
        let b3 = src.get()?.ok_or_else(truncated)?;
        if [b2, b3] != [3, 4] {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "not a zip local header",
            ));
        }
        return read_zip_header(src, save_meta).map(Some);
    }

    if [b0, b1] == GZIP_MAGIC {
        return read_gzip_header(src, save_meta).map(Some);
    }

    Err(io::Error::new(
        io::ErrorKind::InvalidData,
        "data not in a recognized compressed format",
    ))
}

fn read_gzip_header<R: Read>(
    src: &mut SourceReader<R>,
    save_meta: bool,
) -> io::Result<StreamHeader> {
    let method = src.get()?.ok_or_else(truncated)?;
    if method != 8 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unknown gzip compression method ({})", method),
        ));
    }
    let flags = src.get()?.ok_or_else(truncated)?;
    if flags & FRESERVED != 0 {
        return Err(bad_flags("gzip reserved bits"));
    }

    let mut t = [0u8; 4];
    src.read_exact_buf(&mut t)?;
    let stamp = u32::from_le_bytes(t) as i64;
    src.get()?.ok_or_else(truncated)?; // XFL
    src.get()?.ok_or_else(truncated)?; // OS

    if flags & FEXTRA != 0 {
        let mut x = [0u8; 2];
        src.read_exact_buf(&mut x)?;
        src.skip(u16::from_le_bytes(x) as u64)?;
    }

    let mut name = None;
    if flags & FNAME != 0 {
        let mut bytes = Vec::new();
        loop {
            match src.get()?.ok_or_else(truncated)? {
                0 => break,
                b => bytes.push(b),
            }
        }
        if save_meta {
            name = Some(String::from_utf8_lossy(&bytes).into_owned());
        }
    }
    if flags & FCOMMENT != 0 {
        while src.get()?.ok_or_else(truncated)? != 0 {}
    }
    if flags & FHCRC != 0 {
        src.skip(2)?;
    }

    Ok(StreamHeader {
        method: Method::Deflate(Format::Gzip),
        name,
        stamp,
        zip: None,
    })
}

fn read_zip_header<R: Read>(
    src: &mut SourceReader<R>,
    save_meta: bool,
) -> io::Result<StreamHeader> {
    let mut fixed = [0u8; 26]; // local header after the 4-byte signature
    src.read_exact_buf(&mut fixed)?;

    let flags = u16::from_le_bytes([fixed[2], fixed[3]]);
    if flags & !0x000f != 0 {
        return Err(bad_flags("zip general-purpose bits"));
    }
    let mut method = u16::from_le_bytes([fixed[4], fixed[5]]);
    if flags & ZIP_FLAG_ENCRYPTED != 0 {
        method = 255; // encrypted entries are not decodable here
    }
    let dos = u32::from_le_bytes([fixed[6], fixed[7], fixed[8], fixed[9]]);
    let mut stamp = time_from_dos(dos);
    let crc = u32::from_le_bytes([fixed[10], fixed[11], fixed[12], fixed[13]]);
    let mut clen = u32::from_le_bytes([fixed[14], fixed[15], fixed[16], fixed[17]]) as u64;
    let mut ulen = u32::from_le_bytes([fixed[18], fixed[19], fixed[20], fixed[21]]) as u64;
    let nlen = u16::from_le_bytes([fixed[22], fixed[23]]) as usize;
    let xlen = u16::from_le_bytes([fixed[24], fixed[25]]) as usize;

    let mut name_bytes = vec![0u8; nlen];
    src.read_exact_buf(&mut name_bytes)?;
    let name = if save_meta && nlen > 0 {
        Some(String::from_utf8_lossy(&name_bytes).into_owned())
    } else {
        None
    };

    // Extra fields: Zip64 size upgrade and the three Unix timestamp carriers.
    let mut extra = vec![0u8; xlen];
    src.read_exact_buf(&mut extra)?;
    let mut p = 0usize;
    while p + 4 <= extra.len() {
        let id = u16::from_le_bytes([extra[p], extra[p + 1]]);
        let size = u16::from_le_bytes([extra[p + 2], extra[p + 3]]) as usize;
        p += 4;
        if p + size > extra.len() {
            break;
        }
        let data = &extra[p..p + size];
        match id {
            XID_ZIP64 => {
                let mut q = 0;
                if ulen == u32::MAX as u64 && q + 8 <= data.len() {
                    ulen = u64::from_le_bytes(data[q..q + 8].try_into().unwrap());
                    q += 8;
                }
                if clen == u32::MAX as u64 && q + 8 <= data.len() {
                    clen = u64::from_le_bytes(data[q..q + 8].try_into().unwrap());
                }
            }
            XID_PKWARE_UNIX | XID_INFOZIP_UNIX if size >= 8 => {
                // atime then mtime, both 32-bit Unix seconds
                stamp =
                    u32::from_le_bytes(data[4..8].try_into().unwrap()) as i64;
            }
            XID_EXT_TIMESTAMP if size >= 5 && data[0] & 0x01 != 0 => {
                stamp =
                    u32::from_le_bytes(data[1..5].try_into().unwrap()) as i64;
            }
            _ => {}
        }
        p += size;
    }

    if method != 8 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            if method == 255 {
                "zip entry is encrypted".to_owned()
            } else {
                format!("unsupported zip compression method ({})", method)
            },
        ));
    }

    let format = if flags & ZIP_FLAG_DESCRIPTOR != 0 {
        Format::ZipWithDescriptor
    } else {
        Format::ZipNoDescriptor
    };
    Ok(StreamHeader {
        method: Method::Deflate(format),
        name,
        stamp,
        zip: Some(ZipEntry { crc, clen, ulen }),
    })
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn reader(bytes: &[u8]) -> SourceReader<Cursor<Vec<u8>>> {
        SourceReader::new(Cursor::new(bytes.to_vec()))
    }

    #[test]
    fn gzip_header_minimal_layout() {
        let mut prefs = Prefs::default();
        prefs.level = 9;
        let mut out = Vec::new();
        let n = write_header(&mut out, &prefs, &HeaderMeta::default()).unwrap();
        assert_eq!(n, 10);
        assert_eq!(&out[..4], &[0x1f, 0x8b, 8, 0]);
        assert_eq!(&out[4..8], &[0, 0, 0, 0]); // no mtime
        assert_eq!(out[8], 2); // XFL for level 9
        assert_eq!(out[9], 3); // OS = Unix
    }

    #[test]
    fn gzip_header_with_name() {
        let prefs = Prefs::default();
        let meta = HeaderMeta {
            name: Some("file.txt".to_owned()),
            mtime: 0,
        };
        let mut out = Vec::new();
        let n = write_header(&mut out, &prefs, &meta).unwrap();
        assert_eq!(n as usize, 10 + "file.txt".len() + 1);
        assert_eq!(out[3], 0x08); // FNAME
        assert_eq!(&out[10..18], b"file.txt");
        assert_eq!(out[18], 0);
    }

    #[test]
    fn zlib_header_parity() {
        for level in 0..=9u32 {
            let mut prefs = Prefs::default();
            prefs.format = Format::Zlib;
            prefs.level = level;
            let mut out = Vec::new();
            write_header(&mut out, &prefs, &HeaderMeta::default()).unwrap();
            assert_eq!(out.len(), 2);
            assert_eq!(out[0], 0x78);
            assert_eq!(
                (out[0] as u32 * 256 + out[1] as u32) % 31,
                0,
                "level {}",
                level
            );
        }
    }

    #[test]
    fn zlib_level_tiers() {
        // Level 9 -> tier 3, level 1 -> tier 0, level >= 6 -> tier 1.
        for (level, flg) in [(9u32, 0xda), (1, 0x01), (6, 0x5e)] {
            let mut prefs = Prefs::default();
            prefs.format = Format::Zlib;
            prefs.level = level;
            let mut out = Vec::new();
            write_header(&mut out, &prefs, &HeaderMeta::default()).unwrap();
            assert_eq!(out, vec![0x78, flg], "level {}", level);
        }
    }

    #[test]
    fn zip_header_layout() {
        let mut prefs = Prefs::default();
        prefs.format = Format::ZipWithDescriptor;
        let meta = HeaderMeta {
            name: Some("a.txt".to_owned()),
            mtime: 0,
        };
        let mut out = Vec::new();
        let n = write_header(&mut out, &prefs, &meta).unwrap();
        assert_eq!(n as usize, 30 + 5 + 9);
        assert_eq!(&out[..4], b"PK\x03\x04");
        assert_eq!(u16::from_le_bytes([out[6], out[7]]), 0x0008); // descriptor
        assert_eq!(u16::from_le_bytes([out[8], out[9]]), 8); // deflate
        assert_eq!(u16::from_le_bytes([out[26], out[27]]), 5); // name length
        assert_eq!(u16::from_le_bytes([out[28], out[29]]), 9); // extra length
        assert_eq!(&out[30..35], b"a.txt");
        assert_eq!(u16::from_le_bytes([out[35], out[36]]), XID_EXT_TIMESTAMP);
    }

    #[test]
    fn gzip_trailer_layout() {
        let prefs = Prefs::default();
        let mut out = Vec::new();
        write_trailer(
            &mut out,
            &prefs,
            &HeaderMeta::default(),
            0x1_0000_0001, // ulen folds mod 2^32
            5,
            0xdead_beef,
            10,
        )
        .unwrap();
        assert_eq!(out.len(), 8);
        assert_eq!(&out[..4], &0xdead_beefu32.to_le_bytes());
        assert_eq!(&out[4..], &1u32.to_le_bytes());
    }

    #[test]
    fn zlib_trailer_is_big_endian() {
        let mut prefs = Prefs::default();
        prefs.format = Format::Zlib;
        let mut out = Vec::new();
        write_trailer(&mut out, &prefs, &HeaderMeta::default(), 12, 14, 0x1c49_043e, 2)
            .unwrap();
        assert_eq!(out, vec![0x1c, 0x49, 0x04, 0x3e]);
    }

    #[test]
    fn zip_trailer_descriptor_and_eocd() {
        let mut prefs = Prefs::default();
        prefs.format = Format::ZipWithDescriptor;
        let meta = HeaderMeta {
            name: Some("a".to_owned()),
            mtime: 0,
        };
        let head_len = 30 + 1 + 9;
        let mut out = Vec::new();
        write_trailer(&mut out, &prefs, &meta, 100, 42, 0x0102_0304, head_len).unwrap();
        // Descriptor.
        assert_eq!(&out[..4], &0x0102_0304u32.to_le_bytes());
        assert_eq!(&out[4..8], &42u32.to_le_bytes());
        assert_eq!(&out[8..12], &100u32.to_le_bytes());
        // Central directory entry.
        assert_eq!(&out[12..16], b"PK\x01\x02");
        // End record with offset = head + clen + descriptor.
        let eocd = out.len() - 22;
        assert_eq!(&out[eocd..eocd + 4], b"PK\x05\x06");
        let offset =
            u32::from_le_bytes(out[eocd + 16..eocd + 20].try_into().unwrap());
        assert_eq!(offset as u64, head_len + 42 + 12);
    }

    #[test]
    fn read_header_round_trips_gzip() {
        let prefs = Prefs::default();
        let meta = HeaderMeta {
            name: Some("data.bin".to_owned()),
            mtime: 0,
        };
        let mut buf = Vec::new();
        write_header(&mut buf, &prefs, &meta).unwrap();
        let mut src = reader(&buf);
        let head = read_header(&mut src, true).unwrap().unwrap();
        assert_eq!(head.method, Method::Deflate(Format::Gzip));
        assert_eq!(head.name.as_deref(), Some("data.bin"));
    }

    #[test]
    fn read_header_round_trips_zlib() {
        let mut prefs = Prefs::default();
        prefs.format = Format::Zlib;
        let mut buf = Vec::new();
        write_header(&mut buf, &prefs, &HeaderMeta::default()).unwrap();
        let mut src = reader(&buf);
        let head = read_header(&mut src, false).unwrap().unwrap();
        assert_eq!(head.method, Method::Deflate(Format::Zlib));
    }

    #[test]
    fn read_header_round_trips_zip() {
        let mut prefs = Prefs::default();
        prefs.format = Format::ZipWithDescriptor;
        let meta = HeaderMeta {
            name: Some("x.dat".to_owned()),
            mtime: 0,
        };
        let mut buf = Vec::new();
        write_header(&mut buf, &prefs, &meta).unwrap();
        let mut src = reader(&buf);
        let head = read_header(&mut src, true).unwrap().unwrap();
        assert_eq!(head.method, Method::Deflate(Format::ZipWithDescriptor));
        assert_eq!(head.name.as_deref(), Some("x.dat"));
        let zip = head.zip.unwrap();
        assert_eq!((zip.crc, zip.clen, zip.ulen), (0, 0, 0));
    }

    #[test]
    fn read_header_detects_lzw() {
        let mut src = reader(&[0x1f, 0x9d, 0x90, 0x41]);
        let head = read_header(&mut src, false).unwrap().unwrap();
        assert_eq!(head.method, Method::Lzw);
    }

    #[test]
    fn read_header_clean_eof_is_none() {
        let mut src = reader(&[]);
        assert!(read_header(&mut src, false).unwrap().is_none());
    }

    #[test]
    fn read_header_rejects_unknown_magic() {
        let mut src = reader(b"0123456789");
        assert!(read_header(&mut src, false).is_err());
    }

    #[test]
    fn read_header_rejects_reserved_gzip_flags() {
        let mut src = reader(&[0x1f, 0x8b, 8, 0xe0, 0, 0, 0, 0, 0, 3]);
        let err = read_header(&mut src, false).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn read_header_truncated_gzip() {
        let mut src = reader(&[0x1f, 0x8b, 8]);
        let err = read_header(&mut src, false).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn zip64_extra_upgrades_sizes() {
        // Hand-built local header with 0xffffffff sizes and a Zip64 extra.
        let mut h: Vec<u8> = Vec::new();
        h.extend_from_slice(b"PK\x03\x04");
        h.extend_from_slice(&20u16.to_le_bytes());
        h.extend_from_slice(&0u16.to_le_bytes()); // no descriptor
        h.extend_from_slice(&8u16.to_le_bytes());
        h.extend_from_slice(&0u32.to_le_bytes()); // time
        h.extend_from_slice(&0x55u32.to_le_bytes()); // crc
        h.extend_from_slice(&u32::MAX.to_le_bytes()); // clen
        h.extend_from_slice(&u32::MAX.to_le_bytes()); // ulen
        h.extend_from_slice(&1u16.to_le_bytes()); // name len
        h.extend_from_slice(&20u16.to_le_bytes()); // extra len
        h.push(b'f');
        h.extend_from_slice(&XID_ZIP64.to_le_bytes());
        h.extend_from_slice(&16u16.to_le_bytes());
        h.extend_from_slice(&0x1_0000_0000u64.to_le_bytes()); // ulen
        h.extend_from_slice(&0x2_0000_0000u64.to_le_bytes()); // clen
        let mut src = reader(&h);
        let head = read_header(&mut src, false).unwrap().unwrap();
        assert_eq!(head.method, Method::Deflate(Format::ZipNoDescriptor));
        let zip = head.zip.unwrap();
        assert_eq!(zip.ulen, 0x1_0000_0000);
        assert_eq!(zip.clen, 0x2_0000_0000);
    }

    #[test]
    fn dos_time_zero_for_pre_1980() {
        assert_eq!(dos_time(0), 0); // 1970
    }

    #[cfg(unix)]
    #[test]
    fn dos_time_round_trip_resolution() {
        // 2021-07-14 some time; DOS time has 2-second resolution.
        let t: i64 = 1_626_262_626;
        let dos = dos_time(t);
        assert_ne!(dos, 0);
        let back = time_from_dos(dos);
        assert!((back - t).abs() <= 2, "t={} back={}", t, back);
    }
}
