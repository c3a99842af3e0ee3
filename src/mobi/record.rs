//! PDB records and text record trailing entries.
//!
//! A [`Record`] is one raw block from the record directory. Text records of
//! MOBI version 5+ files may carry trailing entries after the compressed
//! payload (multibyte overlap, TBS indexing, uncrossable breaks); the
//! `extra_flags` field of the MOBI header says which ones are present, and
//! [`strip_trailing_entries`] removes them before decompression.

use serde::Serialize;

use crate::mobi::constants::*;
use crate::mobi::pdb::PdbRecordEntry;
use crate::MobiError;

/// A single PDB record with its directory metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    /// Position of the record in the directory.
    pub index: usize,
    /// Absolute file offset.
    pub offset: u32,
    /// Directory attribute flags.
    pub attributes: u8,
    /// 24-bit unique id.
    pub uid: u32,
    /// Raw record bytes.
    #[serde(skip)]
    pub data: Vec<u8>,
}

impl Record {
    /// Build a record from its directory entry and raw bytes.
    pub fn new(index: usize, entry: &PdbRecordEntry, data: Vec<u8>) -> Self {
        Record {
            index,
            offset: entry.offset,
            attributes: entry.attributes,
            uid: entry.uid,
            data,
        }
    }

    /// Record size in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// The first four bytes, if the record is at least that long.
    pub fn magic(&self) -> Option<&[u8]> {
        self.data.get(..4)
    }

    /// The first four bytes rendered as text when they are printable ASCII.
    pub fn magic_str(&self) -> Option<String> {
        let magic = self.magic()?;
        if magic.iter().all(|b| b.is_ascii_alphanumeric() || *b == b' ') {
            Some(String::from_utf8_lossy(magic).into_owned())
        } else {
            None
        }
    }

    /// Returns true if the record starts with `magic`.
    pub fn has_magic(&self, magic: &[u8]) -> bool {
        self.data.starts_with(magic)
    }

    /// Returns true for the end-of-file marker record.
    pub fn is_eof_marker(&self) -> bool {
        self.data.starts_with(&EOF_MARKER)
    }
}

/// Read a backward-encoded variable-width integer ending at `end`.
///
/// Bytes are consumed from `end - 1` towards the start; the byte with the
/// high bit set terminates the value. Returns `(value, bytes consumed)`.
pub fn read_varlen_backward(data: &[u8], end: usize) -> Option<(u32, usize)> {
    let mut value: u32 = 0;
    let mut shift = 0;
    let mut pos = end;
    while pos > 0 {
        pos -= 1;
        let byte = data[pos];
        value |= ((byte & 0x7f) as u32) << shift;
        shift += 7;
        if byte & 0x80 != 0 {
            return Some((value, end - pos));
        }
        if shift >= 28 {
            break;
        }
    }
    None
}

/// Strip the trailing entries flagged in `extra_flags` from a text record.
///
/// Bits 1-15 each announce an entry whose total size (including the size
/// field itself) is stored as a backward varint at the current end. Bit 0
/// announces multibyte overlap bytes, counted by the low two bits of the
/// last remaining byte, and is handled last.
pub fn strip_trailing_entries(data: &[u8], extra_flags: u16) -> Result<&[u8], MobiError> {
    let mut end = data.len();
    for bit in 1..16 {
        if extra_flags & (1 << bit) == 0 {
            continue;
        }
        let (size, _) = read_varlen_backward(data, end).ok_or_else(|| {
            MobiError::Format(format!(
                "Cannot read trailing entry size for flag bit {}",
                bit
            ))
        })?;
        let size = size as usize;
        if size > end {
            return Err(MobiError::Format(format!(
                "Trailing entry size {} exceeds remaining record length {}",
                size, end
            )));
        }
        end -= size;
    }
    if extra_flags & 1 != 0 && end > 0 {
        let overlap = (data[end - 1] & 0x3) as usize + 1;
        if overlap > end {
            return Err(MobiError::Format(format!(
                "Multibyte overlap {} exceeds remaining record length {}",
                overlap, end
            )));
        }
        end -= overlap;
    }
    Ok(&data[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(data: &[u8]) -> Record {
        let entry = PdbRecordEntry {
            offset: 100,
            attributes: 0,
            uid: 2,
        };
        Record::new(1, &entry, data.to_vec())
    }

    #[test]
    fn test_record_magic() {
        let rec = record(b"INDX\x00\x00\x00\xc0");
        assert_eq!(rec.magic(), Some(&b"INDX"[..]));
        assert_eq!(rec.magic_str().as_deref(), Some("INDX"));
        assert!(rec.has_magic(b"INDX"));
        assert!(!rec.is_eof_marker());
        assert_eq!(rec.size(), 8);

        let eof = record(&EOF_MARKER);
        assert!(eof.is_eof_marker());
        assert!(eof.magic_str().is_none());
    }

    #[test]
    fn test_read_varlen_backward() {
        // Single byte with high bit set
        assert_eq!(read_varlen_backward(&[0x00, 0x85], 2), Some((5, 1)));
        // Two bytes: 0x81 (stop) then 0x02 => (1 << 7) | 2
        assert_eq!(read_varlen_backward(&[0x81, 0x02], 2), Some((130, 2)));
        // No terminator
        assert_eq!(read_varlen_backward(&[0x01, 0x02], 2), None);
    }

    #[test]
    fn test_strip_no_flags() {
        let data = b"payload";
        assert_eq!(strip_trailing_entries(data, 0).unwrap(), b"payload");
    }

    #[test]
    fn test_strip_multibyte_only() {
        // Two overlap bytes plus the count byte itself (0b01 => 1 + 1)
        let data = b"text\xe2\x80\x01";
        assert_eq!(strip_trailing_entries(data, 0x1).unwrap(), b"text\xe2");
    }

    #[test]
    fn test_strip_tbs_then_multibyte() {
        // payload | multibyte count 0 | TBS entry of 3 bytes (2 data + size 0x83)
        let data = b"abc\x00\x11\x22\x83";
        assert_eq!(strip_trailing_entries(data, 0x3).unwrap(), b"abc");
    }

    #[test]
    fn test_strip_oversized_entry_is_error() {
        let data = b"\x90";
        assert!(strip_trailing_entries(data, 0x2).is_err());
    }
}
