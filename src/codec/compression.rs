//! Block decompressors for compressed WRP arrays.
//!
//! Both algorithms decode from the current stream position and must produce
//! exactly the size the caller expects. Arrays below [`RAW_THRESHOLD`] bytes
//! are stored without compression.

use std::io::{Read, Seek};

use byteorder::{ByteOrder, LittleEndian};

use super::reader::WorldReader;
use crate::error::{Error, Result};

/// Arrays smaller than this many bytes are never compressed.
pub const RAW_THRESHOLD: usize = 1024;
/// Upper bound on LZSS output per input byte: a flag byte and eight
/// two-byte references yield at most 144 bytes from 17.
const LZSS_MAX_EXPANSION: u64 = 9;

/// Compression algorithm used for a section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Lzss,
    Lzo,
}

impl Compression {
    /// OPRW switched codecs at version 23.
    pub fn for_oprw_version(version: u32) -> Self {
        if version >= 23 {
            Compression::Lzo
        } else {
            Compression::Lzss
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Compression::Lzss => "lzss",
            Compression::Lzo => "lzo",
        }
    }
}

/// Read `expected_size` bytes, decompressing them if the array is large
/// enough to have been compressed.
pub fn decompress_or_raw<R: Read + Seek>(
    reader: &mut WorldReader<R>,
    expected_size: usize,
    compression: Compression,
) -> Result<Vec<u8>> {
    if expected_size < RAW_THRESHOLD {
        return reader.read_bytes(expected_size);
    }
    match compression {
        Compression::Lzss => lzss_decompress(reader, expected_size),
        Compression::Lzo => lzo_decompress(reader, expected_size),
    }
}

pub fn read_compressed_u8<R: Read + Seek>(
    reader: &mut WorldReader<R>,
    count: usize,
    compression: Compression,
) -> Result<Vec<u8>> {
    decompress_or_raw(reader, count, compression)
}

pub fn read_compressed_u16<R: Read + Seek>(
    reader: &mut WorldReader<R>,
    count: usize,
    compression: Compression,
) -> Result<Vec<u16>> {
    let bytes = decompress_or_raw(reader, count * 2, compression)?;
    let mut out = vec![0u16; count];
    LittleEndian::read_u16_into(&bytes, &mut out);
    Ok(out)
}

pub fn read_compressed_u32<R: Read + Seek>(
    reader: &mut WorldReader<R>,
    count: usize,
    compression: Compression,
) -> Result<Vec<u32>> {
    let bytes = decompress_or_raw(reader, count * 4, compression)?;
    let mut out = vec![0u32; count];
    LittleEndian::read_u32_into(&bytes, &mut out);
    Ok(out)
}

pub fn read_compressed_f32<R: Read + Seek>(
    reader: &mut WorldReader<R>,
    count: usize,
    compression: Compression,
) -> Result<Vec<f32>> {
    let bytes = decompress_or_raw(reader, count * 4, compression)?;
    let mut out = vec![0f32; count];
    LittleEndian::read_f32_into(&bytes, &mut out);
    Ok(out)
}

fn lzss_error(reason: impl Into<String>) -> Error {
    Error::Decompression { algorithm: "lzss", reason: reason.into() }
}

/// Decode an LZSS block followed by its 32-bit additive checksum.
pub fn lzss_decompress<R: Read + Seek>(
    reader: &mut WorldReader<R>,
    expected_size: usize,
) -> Result<Vec<u8>> {
    let available = reader.remaining();
    if expected_size as u64 > available.saturating_mul(LZSS_MAX_EXPANSION) {
        return Err(lzss_error(format!(
            "{expected_size} bytes cannot come from the {available} bytes left"
        )));
    }
    let mut out = Vec::with_capacity(expected_size);
    let mut flags: u32 = 0;

    while out.len() < expected_size {
        flags >>= 1;
        if flags & 0x100 == 0 {
            flags = reader.read_u8()? as u32 | 0xFF00;
        }

        if flags & 1 != 0 {
            out.push(reader.read_u8()?);
            continue;
        }

        let b0 = reader.read_u8()? as usize;
        let b1 = reader.read_u8()? as usize;
        let offset = b0 | ((b1 & 0xF0) << 4);
        let len = (b1 & 0x0F) + 3;
        for _ in 0..len {
            if out.len() >= expected_size {
                break;
            }
            // References before the start of the block expand to spaces.
            let byte = if offset == 0 || offset > out.len() {
                b' '
            } else {
                out[out.len() - offset]
            };
            out.push(byte);
        }
    }

    let expected = reader.read_u32_le()?;
    let actual = out.iter().fold(0u32, |acc, &b| acc.wrapping_add(b as u32));
    if expected != actual {
        return Err(Error::ChecksumMismatch { expected, actual });
    }
    if out.len() != expected_size {
        return Err(lzss_error(format!("produced {} bytes, expected {}", out.len(), expected_size)));
    }
    Ok(out)
}

fn lzo_error(reason: impl Into<String>) -> Error {
    Error::Decompression { algorithm: "lzo", reason: reason.into() }
}

/// Decode an LZO1X stream up to its end-of-stream marker. The reader is left
/// just past the marker.
pub fn lzo_decompress<R: Read + Seek>(
    reader: &mut WorldReader<R>,
    expected_size: usize,
) -> Result<Vec<u8>> {
    let start = reader.position();
    let out = reader
        .with_inner(|inner| lzokay_native::decompress(inner, None))?
        .map_err(|e| lzo_error(format!("{e:?} in block at offset {start}")))?;
    if out.len() != expected_size {
        return Err(lzo_error(format!("produced {} bytes, expected {}", out.len(), expected_size)));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::writer::BinaryWriter;
    use std::io::Cursor;

    fn reader(data: &[u8]) -> WorldReader<Cursor<&[u8]>> {
        WorldReader::new(Cursor::new(data)).unwrap()
    }

    #[test]
    fn test_small_arrays_are_raw() {
        let data = [1u8, 2, 3, 4];
        let mut r = reader(&data);
        let out = decompress_or_raw(&mut r, 4, Compression::Lzo).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn test_lzss_literals() {
        let payload: Vec<u8> = (0..20u8).collect();
        let mut w = BinaryWriter::new();
        w.write_lzss_literals(&payload);
        let data = w.into_vec();
        let mut r = reader(&data);
        assert_eq!(lzss_decompress(&mut r, 20).unwrap(), payload);
        assert!(r.is_empty());
    }

    #[test]
    fn test_lzss_back_reference() {
        // "ab" as literals, then a 4-byte reference two bytes back.
        let data = [
            0b0000_0011, b'a', b'b', 0x02, 0x01,
            0x00, 0x00, 0x00, 0x00,
        ];
        let mut data = data.to_vec();
        let checksum = b"ababab".iter().map(|&b| b as u32).sum::<u32>();
        data[5..9].copy_from_slice(&checksum.to_le_bytes());
        let mut r = reader(&data);
        assert_eq!(lzss_decompress(&mut r, 6).unwrap(), b"ababab");
    }

    #[test]
    fn test_lzss_checksum_mismatch() {
        let mut w = BinaryWriter::new();
        w.write_u8(0xFF);
        w.write_bytes(b"abcd");
        w.write_u32_le(0);
        let data = w.into_vec();
        let mut r = reader(&data);
        assert!(matches!(lzss_decompress(&mut r, 4), Err(Error::ChecksumMismatch { .. })));
    }

    #[test]
    fn test_lzss_size_beyond_input_fails_early() {
        let mut w = BinaryWriter::new();
        w.write_lzss_literals(b"abcd");
        let data = w.into_vec();
        let mut r = reader(&data);
        let err = lzss_decompress(&mut r, 1 << 30).unwrap_err();
        assert!(matches!(err, Error::Decompression { algorithm: "lzss", .. }));
        assert_eq!(r.position(), 0);
    }

    #[test]
    fn test_lzo_literal_run() {
        let payload: Vec<u8> = (0..100u8).collect();
        let mut w = BinaryWriter::new();
        w.write_lzo_literals(&payload);
        let data = w.into_vec();
        let mut r = reader(&data);
        assert_eq!(lzo_decompress(&mut r, 100).unwrap(), payload);
        assert!(r.is_empty());
    }

    #[test]
    fn test_lzo_long_literal_run() {
        let payload: Vec<u8> = (0..2000u32).map(|i| (i * 7 % 251) as u8).collect();
        let mut w = BinaryWriter::new();
        w.write_lzo_literals(&payload);
        let data = w.into_vec();
        let mut r = reader(&data);
        assert_eq!(decompress_or_raw(&mut r, 2000, Compression::Lzo).unwrap(), payload);
    }

    #[test]
    fn test_lzo_match_copy() {
        // 4 literals "abcd", then M2 match: len 4 (t = 0x60 -> (3)+1), distance 4.
        // distance = 1 + ((t >> 2) & 7) + (b << 3) => t bits 2..4 = 3, b = 0.
        let t = (3 << 5) | (3 << 2);
        let data = [17 + 4, b'a', b'b', b'c', b'd', t as u8, 0x00, 0x11, 0x00, 0x00];
        let mut r = reader(&data);
        assert_eq!(lzo_decompress(&mut r, 8).unwrap(), b"abcdabcd");
    }

    #[test]
    fn test_lzo_leaves_reader_after_marker() {
        let mut w = BinaryWriter::new();
        w.write_lzo_literals(b"abcdef");
        w.write_u32_le(0xDEAD_BEEF);
        let data = w.into_vec();
        let mut r = reader(&data);
        assert_eq!(lzo_decompress(&mut r, 6).unwrap(), b"abcdef");
        assert_eq!(r.position(), data.len() as u64 - 4);
        assert_eq!(r.read_u32_le().unwrap(), 0xDEAD_BEEF);
    }

    #[test]
    fn test_lzo_look_behind_past_start_fails() {
        // Match distance 9 after only four bytes of output.
        let data = [17 + 4, b'a', b'b', b'c', b'd', 0x60, 0x01, 0x11, 0x00, 0x00];
        let mut r = reader(&data);
        let err = lzo_decompress(&mut r, 8).unwrap_err();
        assert!(matches!(err, Error::Decompression { algorithm: "lzo", .. }));
    }

    #[test]
    fn test_lzo_short_output_fails() {
        let mut w = BinaryWriter::new();
        w.write_lzo_literals(b"abcdef");
        let data = w.into_vec();
        let mut r = reader(&data);
        assert!(lzo_decompress(&mut r, 10).is_err());
    }

    #[test]
    fn test_codec_selection() {
        assert_eq!(Compression::for_oprw_version(22), Compression::Lzss);
        assert_eq!(Compression::for_oprw_version(23), Compression::Lzo);
    }
}
