//! HUFF/CDIC text decompression.
//!
//! Books compressed with compression type 17480 (`DH`) store a Huffman
//! code table in a `HUFF` record and a phrase dictionary split across one or
//! more `CDIC` records. Each code selects a dictionary phrase; phrases whose
//! high flag bit is clear are themselves compressed and are expanded
//! recursively (the result is cached in place).
//!
//! HUFF record layout:
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0 | 8 | `HUFF\0\0\0\x18` |
//! | 8 | 4 | Offset of the 256-entry code length table |
//! | 12 | 4 | Offset of the 32 (min, max) code pairs |
//!
//! CDIC record layout: `CDIC\0\0\0\x10`, phrase count, index bits, then a
//! u16 offset table; each phrase is a u16 length (bit 15 = literal) and data.

use byteorder::{BigEndian, ByteOrder};
use log::debug;

use crate::mobi::constants::*;
use crate::MobiError;

#[derive(Debug, Clone, Copy, Default)]
struct CodeEntry {
    length: u32,
    terminal: bool,
    max_code: u64,
}

#[derive(Debug, Clone)]
enum Phrase {
    /// Expanded phrase ready for output.
    Literal(Vec<u8>),
    /// Phrase still to be decompressed.
    Packed(Vec<u8>),
    /// Being expanded; reaching it again means a cycle.
    Busy,
}

/// Huffman tables and phrase dictionary for one book part.
#[derive(Debug, Clone)]
pub struct HuffCdic {
    table1: Vec<CodeEntry>,
    min_codes: [u64; 33],
    max_codes: [u64; 33],
    phrases: Vec<Phrase>,
}

fn huff_error(msg: String) -> MobiError {
    MobiError::Decompression(msg)
}

impl HuffCdic {
    /// Load the HUFF record and its CDIC records.
    pub fn new(huff: &[u8], cdics: &[&[u8]]) -> Result<Self, MobiError> {
        if huff.len() < HUFF_HEADER_SIZE || &huff[..8] != b"HUFF\x00\x00\x00\x18" {
            return Err(huff_error("Missing HUFF record header".to_string()));
        }
        let off1 = BigEndian::read_u32(&huff[8..]) as usize;
        let off2 = BigEndian::read_u32(&huff[12..]) as usize;
        if off1 + 256 * 4 > huff.len() || off2 + 64 * 4 > huff.len() {
            return Err(huff_error(format!(
                "HUFF tables at {}/{} exceed record ({} bytes)",
                off1,
                off2,
                huff.len()
            )));
        }

        let mut table1 = Vec::with_capacity(256);
        for i in 0..256 {
            let v = BigEndian::read_u32(&huff[off1 + i * 4..]);
            let length = v & 0x1f;
            let terminal = v & 0x80 != 0;
            if length == 0 || (length <= 8 && !terminal) {
                return Err(huff_error(format!(
                    "HUFF code table entry {} is invalid ({:#010x})",
                    i, v
                )));
            }
            let max_code = (((v >> 8) as u64 + 1) << (32 - length)) - 1;
            table1.push(CodeEntry {
                length,
                terminal,
                max_code,
            });
        }

        let mut min_codes = [0u64; 33];
        let mut max_codes = [0u64; 33];
        max_codes[0] = u32::MAX as u64;
        for len in 1..=32 {
            let pair = off2 + (len - 1) * 8;
            let min = BigEndian::read_u32(&huff[pair..]) as u64;
            let max = BigEndian::read_u32(&huff[pair + 4..]) as u64;
            min_codes[len] = min << (32 - len);
            max_codes[len] = ((max + 1) << (32 - len)) - 1;
        }

        let mut phrases = Vec::new();
        for (n, cdic) in cdics.iter().enumerate() {
            load_cdic(cdic, n, &mut phrases)?;
        }
        debug!("HUFF/CDIC: {} phrases from {} CDIC records", phrases.len(), cdics.len());

        Ok(HuffCdic {
            table1,
            min_codes,
            max_codes,
            phrases,
        })
    }

    /// Number of dictionary phrases loaded.
    pub fn phrase_count(&self) -> usize {
        self.phrases.len()
    }

    /// Decompress one text record.
    pub fn decompress(&mut self, data: &[u8]) -> Result<Vec<u8>, MobiError> {
        let mut out = Vec::with_capacity(data.len() * 4);
        self.unpack(data, 0, &mut out)?;
        Ok(out)
    }

    fn unpack(&mut self, data: &[u8], depth: usize, out: &mut Vec<u8>) -> Result<(), MobiError> {
        if depth > HUFF_MAX_DEPTH {
            return Err(huff_error(format!(
                "HUFF/CDIC phrase nesting exceeds {} levels",
                HUFF_MAX_DEPTH
            )));
        }

        let mut padded = Vec::with_capacity(data.len() + 8);
        padded.extend_from_slice(data);
        padded.extend_from_slice(&[0u8; 8]);

        let mut bits_left = data.len() as i64 * 8;
        let mut pos = 0usize;
        let mut x = BigEndian::read_u64(&padded[pos..]);
        let mut n: i32 = 32;

        loop {
            if n <= 0 {
                pos += 4;
                x = BigEndian::read_u64(&padded[pos..]);
                n += 32;
            }
            let code = (x >> n) & 0xffff_ffff;
            let entry = self.table1[(code >> 24) as usize];
            let mut length = entry.length as usize;
            let mut max_code = entry.max_code;
            if !entry.terminal {
                while length <= 32 && code < self.min_codes[length] {
                    length += 1;
                }
                if length > 32 {
                    return Err(huff_error(format!("No HUFF code matches {:#010x}", code)));
                }
                max_code = self.max_codes[length];
            }
            n -= length as i32;
            bits_left -= length as i64;
            if bits_left < 0 {
                break;
            }

            let index = max_code
                .checked_sub(code)
                .map(|d| (d >> (32 - length)) as usize)
                .ok_or_else(|| huff_error(format!("HUFF code {:#010x} above max code", code)))?;
            let phrase = self.phrases.get_mut(index).ok_or_else(|| {
                huff_error(format!("CDIC phrase index {} out of range", index))
            })?;

            match std::mem::replace(phrase, Phrase::Busy) {
                Phrase::Literal(bytes) => {
                    out.extend_from_slice(&bytes);
                    self.phrases[index] = Phrase::Literal(bytes);
                }
                Phrase::Packed(packed) => {
                    let mut expanded = Vec::with_capacity(packed.len() * 2);
                    self.unpack(&packed, depth + 1, &mut expanded)?;
                    out.extend_from_slice(&expanded);
                    self.phrases[index] = Phrase::Literal(expanded);
                }
                Phrase::Busy => {
                    return Err(huff_error(format!(
                        "CDIC phrase {} refers to itself",
                        index
                    )));
                }
            }
        }
        Ok(())
    }
}

fn load_cdic(cdic: &[u8], n: usize, phrases: &mut Vec<Phrase>) -> Result<(), MobiError> {
    if cdic.len() < CDIC_HEADER_SIZE || &cdic[..8] != b"CDIC\x00\x00\x00\x10" {
        return Err(huff_error(format!("CDIC record {} has no CDIC header", n)));
    }
    let total = BigEndian::read_u32(&cdic[8..]) as usize;
    let bits = BigEndian::read_u32(&cdic[12..]);
    if bits > 16 {
        return Err(huff_error(format!("CDIC record {} index bits {} too large", n, bits)));
    }
    let count = (1usize << bits).min(total.saturating_sub(phrases.len()));

    for i in 0..count {
        let entry_pos = CDIC_HEADER_SIZE + i * 2;
        let offset = cdic
            .get(entry_pos..entry_pos + 2)
            .map(BigEndian::read_u16)
            .ok_or_else(|| huff_error(format!("CDIC record {} offset table truncated", n)))?
            as usize;
        let blen = cdic
            .get(CDIC_HEADER_SIZE + offset..CDIC_HEADER_SIZE + offset + 2)
            .map(BigEndian::read_u16)
            .ok_or_else(|| huff_error(format!("CDIC record {} phrase {} truncated", n, i)))?;
        let start = CDIC_HEADER_SIZE + 2 + offset;
        let len = (blen & 0x7fff) as usize;
        let bytes = cdic
            .get(start..start + len)
            .ok_or_else(|| huff_error(format!("CDIC record {} phrase {} truncated", n, i)))?
            .to_vec();
        phrases.push(if blen & 0x8000 != 0 {
            Phrase::Literal(bytes)
        } else {
            Phrase::Packed(bytes)
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::WriteBytesExt;

    /// Every byte value is an 8-bit terminal code selecting the phrase of
    /// the same number.
    fn make_huff() -> Vec<u8> {
        let mut huff = b"HUFF\x00\x00\x00\x18".to_vec();
        huff.write_u32::<BigEndian>(24).unwrap();
        huff.write_u32::<BigEndian>(24 + 1024).unwrap();
        huff.extend_from_slice(&[0u8; 8]);
        for b in 0u32..256 {
            huff.write_u32::<BigEndian>(((2 * b) << 8) | 0x80 | 8).unwrap();
        }
        huff.extend_from_slice(&[0u8; 256]);
        huff
    }

    fn make_cdic(phrases: &[(&[u8], bool)]) -> Vec<u8> {
        let mut cdic = b"CDIC\x00\x00\x00\x10".to_vec();
        cdic.write_u32::<BigEndian>(phrases.len() as u32).unwrap();
        cdic.write_u32::<BigEndian>(8).unwrap();
        let mut body = Vec::new();
        let table_len = phrases.len() * 2;
        for (data, literal) in phrases {
            cdic.write_u16::<BigEndian>((table_len + body.len()) as u16).unwrap();
            let flag = if *literal { 0x8000 } else { 0 };
            body.write_u16::<BigEndian>(data.len() as u16 | flag).unwrap();
            body.extend_from_slice(data);
        }
        cdic.extend_from_slice(&body);
        cdic
    }

    #[test]
    fn test_literal_and_nested_phrases() {
        let huff = make_huff();
        let cdic = make_cdic(&[
            (b"Hello", true),
            (b" ", true),
            (b"World", true),
            (&[0x00, 0x01], false),
        ]);
        let mut hc = HuffCdic::new(&huff, &[cdic.as_slice()]).unwrap();
        assert_eq!(hc.phrase_count(), 4);
        assert_eq!(hc.decompress(&[3, 1, 2]).unwrap(), b"Hello  World");
        // Cached expansion gives the same result
        assert_eq!(hc.decompress(&[3]).unwrap(), b"Hello ");
    }

    /// Bytes 0x80..=0xff are 8-bit terminal codes for phrases 0..=127.
    /// Prefixes below 0x80 are non-terminal: the search starts at length 9
    /// and settles on 16-bit codes `0x7fff - phrase`.
    fn make_mixed_huff() -> Vec<u8> {
        let mut huff = b"HUFF\x00\x00\x00\x18".to_vec();
        huff.write_u32::<BigEndian>(24).unwrap();
        huff.write_u32::<BigEndian>(24 + 1024).unwrap();
        huff.extend_from_slice(&[0u8; 8]);
        for b in 0u32..256 {
            let entry = if b >= 0x80 { ((2 * b - 0x80) << 8) | 0x80 | 8 } else { 9 };
            huff.write_u32::<BigEndian>(entry).unwrap();
        }
        for len in 1u32..=32 {
            let (min, max) = match len {
                9..=15 => ((1u32 << len) - 1, 0),
                16 => (0, 0x7fff),
                _ => (0, 0),
            };
            huff.write_u32::<BigEndian>(min).unwrap();
            huff.write_u32::<BigEndian>(max).unwrap();
        }
        huff
    }

    fn pack(codes: &[(u32, u32)]) -> Vec<u8> {
        let mut out = Vec::new();
        let (mut acc, mut nbits) = (0u64, 0u32);
        for &(code, len) in codes {
            acc = (acc << len) | code as u64;
            nbits += len;
            while nbits >= 8 {
                nbits -= 8;
                out.push((acc >> nbits) as u8);
            }
        }
        if nbits > 0 {
            out.push((acc << (8 - nbits)) as u8);
        }
        out
    }

    #[test]
    fn test_mixed_code_lengths() {
        let short = |b: u8| (0x80 + b as u32, 8);
        let long = |phrase: u32| (0x7fff - phrase, 16);

        let packed = pack(&[long(128), short(b'x')]);
        let mut owned: Vec<(Vec<u8>, bool)> = (0u8..0x80).map(|b| (vec![b], true)).collect();
        owned.push((b"long phrase".to_vec(), true));
        owned.push((packed, false));
        let phrases: Vec<(&[u8], bool)> = owned.iter().map(|(d, l)| (d.as_slice(), *l)).collect();

        let huff = make_mixed_huff();
        let cdic = make_cdic(&phrases);
        let mut hc = HuffCdic::new(&huff, &[cdic.as_slice()]).unwrap();
        assert_eq!(hc.phrase_count(), 130);

        let data = pack(&[short(b'H'), long(128), short(b'!'), long(129), short(b'.')]);
        assert_eq!(hc.decompress(&data).unwrap(), b"Hlong phrase!long phrasex.");
    }

    #[test]
    fn test_self_reference_is_error() {
        let huff = make_huff();
        let cdic = make_cdic(&[(&[0x00], false)]);
        let mut hc = HuffCdic::new(&huff, &[cdic.as_slice()]).unwrap();
        assert!(matches!(hc.decompress(&[0]), Err(MobiError::Decompression(_))));
    }

    #[test]
    fn test_phrase_out_of_range() {
        let huff = make_huff();
        let cdic = make_cdic(&[(b"a", true)]);
        let mut hc = HuffCdic::new(&huff, &[cdic.as_slice()]).unwrap();
        assert!(hc.decompress(&[5]).is_err());
    }

    #[test]
    fn test_bad_headers() {
        assert!(HuffCdic::new(b"HUFF", &[]).is_err());
        let huff = make_huff();
        let bad: &[u8] = b"CDIX\x00\x00\x00\x10\x00\x00\x00\x00\x00\x00\x00\x00";
        assert!(HuffCdic::new(&huff, &[bad]).is_err());
    }
}
