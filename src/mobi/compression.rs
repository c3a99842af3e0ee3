//! PalmDOC LZ77 decompression and FONT resource decoding.
//!
//! PalmDOC-compressed text records use a byte-oriented LZ77 variant:
//!
//! | Byte | Meaning |
//! |------|---------|
//! | `0x00`, `0x09..=0x7F` | Literal byte |
//! | `0x01..=0x08` | Copy the next *n* bytes verbatim |
//! | `0x80..=0xBF` | Two-byte pair: 11-bit distance, 3-bit length (+3) |
//! | `0xC0..=0xFF` | A space followed by `byte ^ 0x80` |
//!
//! Embedded fonts are stored in `FONT` records: a 24-byte header, an
//! optional XOR obfuscation over the first 1040 bytes, and zlib compression.

use byteorder::{BigEndian, ByteOrder};
use flate2::read::ZlibDecoder;
use log::warn;
use std::io::Read;

use crate::mobi::constants::*;
use crate::MobiError;

/// Decompress one PalmDOC LZ77 text record.
///
/// # Examples
///
/// ```
/// use mobi::mobi::compression::palmdoc_decompress;
///
/// // "abc", then "abc" again via a back-reference of distance 3, length 3
/// let packed = [b'a', b'b', b'c', 0x80, 0x18];
/// assert_eq!(palmdoc_decompress(&packed).unwrap(), b"abcabc");
///
/// // 0xE8 is a space plus 'h'
/// assert_eq!(palmdoc_decompress(&[b'a', 0xE8]).unwrap(), b"a h");
/// ```
pub fn palmdoc_decompress(input: &[u8]) -> Result<Vec<u8>, MobiError> {
    let mut out = Vec::with_capacity(input.len() * 2);
    let mut pos = 0;
    while pos < input.len() {
        let c = input[pos];
        pos += 1;
        match c {
            0x01..=0x08 => {
                let n = c as usize;
                let run = input.get(pos..pos + n).ok_or_else(|| {
                    MobiError::Decompression(format!(
                        "PalmDOC literal run of {} bytes at {} exceeds input ({} bytes)",
                        n,
                        pos - 1,
                        input.len()
                    ))
                })?;
                out.extend_from_slice(run);
                pos += n;
            }
            0x00 | 0x09..=0x7f => out.push(c),
            0x80..=0xbf => {
                let next = *input.get(pos).ok_or_else(|| {
                    MobiError::Decompression(format!(
                        "PalmDOC distance pair truncated at {}",
                        pos - 1
                    ))
                })?;
                pos += 1;
                let pair = ((c as usize) << 8) | next as usize;
                let distance = (pair >> 3) & 0x7ff;
                let length = (pair & 0x7) + 3;
                if distance == 0 || distance > out.len() {
                    return Err(MobiError::Decompression(format!(
                        "PalmDOC back-reference distance {} invalid at output length {}",
                        distance,
                        out.len()
                    )));
                }
                let start = out.len() - distance;
                // Source and destination may overlap
                for i in 0..length {
                    let b = out[start + i];
                    out.push(b);
                }
            }
            0xc0..=0xff => {
                out.push(b' ');
                out.push(c ^ 0x80);
            }
        }
    }
    Ok(out)
}

/// Decompress a zlib stream with a known expected size.
pub fn decompress_zlib(data: &[u8], expected_size: usize) -> Result<Vec<u8>, MobiError> {
    let mut decoder = ZlibDecoder::new(data);
    let capacity = expected_size.min(data.len().saturating_mul(ZLIB_MAX_RATIO));
    let mut out = Vec::with_capacity(capacity);
    decoder
        .read_to_end(&mut out)
        .map_err(|e| MobiError::Decompression(format!("zlib stream: {}", e)))?;
    Ok(out)
}

/// Parsed FONT record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FontHeader {
    pub decoded_size: u32,
    pub flags: u32,
    pub data_offset: u32,
    pub xor_length: u32,
    pub xor_offset: u32,
}

impl FontHeader {
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < FONT_HEADER_SIZE || &data[..4] != b"FONT" {
            return None;
        }
        Some(FontHeader {
            decoded_size: BigEndian::read_u32(&data[4..]),
            flags: BigEndian::read_u32(&data[8..]),
            data_offset: BigEndian::read_u32(&data[12..]),
            xor_length: BigEndian::read_u32(&data[16..]),
            xor_offset: BigEndian::read_u32(&data[20..]),
        })
    }
}

/// Decode a FONT record into the raw TrueType/OpenType font.
pub fn decode_font(record: &[u8]) -> Result<Vec<u8>, MobiError> {
    let hdr = FontHeader::parse(record)
        .ok_or_else(|| MobiError::Decompression("FONT record header missing or truncated".to_string()))?;
    let mut payload = record
        .get(hdr.data_offset as usize..)
        .ok_or_else(|| {
            MobiError::Decompression(format!(
                "FONT data offset {} beyond record ({} bytes)",
                hdr.data_offset,
                record.len()
            ))
        })?
        .to_vec();

    if hdr.flags & FONT_FLAG_XOR != 0 && hdr.xor_length > 0 {
        let start = hdr.xor_offset as usize;
        let key = record
            .get(start..start + hdr.xor_length as usize)
            .ok_or_else(|| {
                MobiError::Decompression(format!(
                    "FONT XOR key ({} bytes at {}) beyond record",
                    hdr.xor_length, hdr.xor_offset
                ))
            })?;
        let span = payload.len().min(FONT_XOR_SPAN);
        for (i, b) in payload[..span].iter_mut().enumerate() {
            *b ^= key[i % key.len()];
        }
    }

    if hdr.flags & FONT_FLAG_ZLIB != 0 {
        payload = decompress_zlib(&payload, hdr.decoded_size as usize)?;
    }
    if payload.len() != hdr.decoded_size as usize {
        warn!(
            "FONT decoded to {} bytes, header declares {}",
            payload.len(),
            hdr.decoded_size
        );
    }
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::WriteBytesExt;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn test_literals_and_runs() {
        assert_eq!(palmdoc_decompress(b"Hello").unwrap(), b"Hello");
        // 0x03 copies three bytes verbatim, including high ones
        assert_eq!(
            palmdoc_decompress(&[0x03, 0xc3, 0xa9, 0x80, b'!']).unwrap(),
            vec![0xc3, 0xa9, 0x80, b'!']
        );
        assert_eq!(palmdoc_decompress(&[]).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_overlapping_copy() {
        // "ab" then distance 2, length 6 => "abababab"
        let pair: u16 = (2 << 3) | (6 - 3) | 0x8000;
        let mut input = b"ab".to_vec();
        input.extend_from_slice(&pair.to_be_bytes());
        assert_eq!(palmdoc_decompress(&input).unwrap(), b"abababab");
    }

    #[test]
    fn test_truncated_pair() {
        let err = palmdoc_decompress(&[b'a', 0x80]).unwrap_err();
        assert!(matches!(err, MobiError::Decompression(_)));
    }

    #[test]
    fn test_distance_beyond_output() {
        assert!(palmdoc_decompress(&[b'a', 0x80, 0x50]).is_err());
        // distance 0
        assert!(palmdoc_decompress(&[b'a', 0x80, 0x01]).is_err());
    }

    #[test]
    fn test_truncated_literal_run() {
        assert!(palmdoc_decompress(&[0x05, b'a', b'b']).is_err());
    }

    fn make_font(font: &[u8], xor_key: Option<&[u8]>) -> Vec<u8> {
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(font).unwrap();
        let mut payload = enc.finish().unwrap();
        let key = xor_key.unwrap_or(&[]);
        if let Some(k) = xor_key {
            let span = payload.len().min(FONT_XOR_SPAN);
            for (i, b) in payload[..span].iter_mut().enumerate() {
                *b ^= k[i % k.len()];
            }
        }
        let mut flags = FONT_FLAG_ZLIB;
        if xor_key.is_some() {
            flags |= FONT_FLAG_XOR;
        }
        let mut rec = b"FONT".to_vec();
        rec.write_u32::<BigEndian>(font.len() as u32).unwrap();
        rec.write_u32::<BigEndian>(flags).unwrap();
        rec.write_u32::<BigEndian>((FONT_HEADER_SIZE + key.len()) as u32).unwrap();
        rec.write_u32::<BigEndian>(key.len() as u32).unwrap();
        rec.write_u32::<BigEndian>(FONT_HEADER_SIZE as u32).unwrap();
        rec.extend_from_slice(key);
        rec.extend_from_slice(&payload);
        rec
    }

    #[test]
    fn test_decode_font_zlib() {
        let font = b"\x00\x01\x00\x00 pretend truetype tables".repeat(10);
        let rec = make_font(&font, None);
        assert_eq!(decode_font(&rec).unwrap(), font);
    }

    #[test]
    fn test_decode_font_xor_zlib() {
        let font = b"OTTO pretend opentype".repeat(100);
        let rec = make_font(&font, Some(b"\x12\x34\x56\x78\x9a"));
        assert_eq!(decode_font(&rec).unwrap(), font);
    }

    #[test]
    fn test_decode_font_size_is_not_trusted() {
        let font = b"\x00\x01\x00\x00 small font".repeat(3);
        let mut rec = make_font(&font, None);
        BigEndian::write_u32(&mut rec[4..], u32::MAX);
        assert_eq!(decode_font(&rec).unwrap(), font);
    }

    #[test]
    fn test_decode_font_bad_header() {
        assert!(decode_font(b"FONT\x00\x00").is_err());
        assert!(decode_font(&[0u8; 32]).is_err());
    }
}
