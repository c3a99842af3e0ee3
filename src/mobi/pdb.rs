//! Palm Database container parsing.
//!
//! Every MOBI file is a Palm Database (PDB): a 78-byte header
//! ([`PdbHeader`]) followed by a directory of 8-byte entries
//! ([`PdbRecordEntry`]), one per record. The directory offsets are absolute
//! file positions; a record ends where the next one starts (the last record
//! ends at end of file).

use byteorder::{BigEndian, ByteOrder};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::mobi::constants::*;
use crate::MobiError;

/// Parsed Palm Database header (first 78 bytes of the file).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PdbHeader {
    /// Database name, NUL padding removed. Bytes 0-31.
    pub name: String,
    /// Attribute flags. Bytes 32-33.
    pub attributes: u16,
    /// File version. Bytes 34-35.
    pub version: u16,
    /// Creation time as stored. Bytes 36-39.
    pub ctime: u32,
    /// Modification time as stored. Bytes 40-43.
    pub mtime: u32,
    /// Last backup time as stored. Bytes 44-47.
    pub btime: u32,
    /// Decoded creation time.
    pub ctime_time: Option<DateTime<Utc>>,
    /// Decoded modification time.
    pub mtime_time: Option<DateTime<Utc>>,
    /// Decoded backup time.
    pub btime_time: Option<DateTime<Utc>>,
    /// Modification number. Bytes 48-51.
    pub mod_num: u32,
    /// Application info offset. Bytes 52-55.
    pub appinfo_offset: u32,
    /// Sort info offset. Bytes 56-59.
    pub sortinfo_offset: u32,
    /// Database type, "BOOK" for Mobipocket files. Bytes 60-63.
    #[serde(rename = "type")]
    pub db_type: String,
    /// Creator, "MOBI" for Mobipocket files. Bytes 64-67.
    pub creator: String,
    /// Unique id seed. Bytes 68-71.
    pub uid: u32,
    /// Next record list id (always 0). Bytes 72-75.
    pub next_rec: u32,
    /// Number of records in the directory. Bytes 76-77.
    pub record_count: u16,
}

impl PdbHeader {
    /// Parse the PDB header from the first bytes of a file.
    ///
    /// # Examples
    ///
    /// ```
    /// use mobi::mobi::pdb::PdbHeader;
    ///
    /// let mut data = vec![0u8; 78];
    /// data[..4].copy_from_slice(b"test");
    /// data[60..68].copy_from_slice(b"BOOKMOBI");
    /// data[77] = 3;
    ///
    /// let hdr = PdbHeader::parse(&data).unwrap();
    /// assert_eq!(hdr.name, "test");
    /// assert_eq!(hdr.db_type, "BOOK");
    /// assert_eq!(hdr.record_count, 3);
    /// assert!(hdr.is_mobipocket());
    /// ```
    pub fn parse(data: &[u8]) -> Result<Self, MobiError> {
        if data.len() < PDB_HEADER_SIZE {
            return Err(MobiError::Format(format!(
                "PDB header too short: {} bytes (need {})",
                data.len(),
                PDB_HEADER_SIZE
            )));
        }

        let db_type = read_fourcc(&data[PDB_TYPE..PDB_TYPE + 4], "type")?;
        let creator = read_fourcc(&data[PDB_CREATOR..PDB_CREATOR + 4], "creator")?;

        let name_bytes = &data[PDB_NAME..PDB_NAME + PDB_NAME_SIZE];
        let name_end = name_bytes
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(PDB_NAME_SIZE);
        let name = String::from_utf8_lossy(&name_bytes[..name_end]).into_owned();

        let ctime = BigEndian::read_u32(&data[PDB_CTIME..]);
        let mtime = BigEndian::read_u32(&data[PDB_MTIME..]);
        let btime = BigEndian::read_u32(&data[PDB_BTIME..]);

        Ok(PdbHeader {
            name,
            attributes: BigEndian::read_u16(&data[PDB_ATTRIBUTES..]),
            version: BigEndian::read_u16(&data[PDB_VERSION..]),
            ctime,
            mtime,
            btime,
            ctime_time: decode_pdb_time(ctime),
            mtime_time: decode_pdb_time(mtime),
            btime_time: decode_pdb_time(btime),
            mod_num: BigEndian::read_u32(&data[PDB_MOD_NUM..]),
            appinfo_offset: BigEndian::read_u32(&data[PDB_APPINFO..]),
            sortinfo_offset: BigEndian::read_u32(&data[PDB_SORTINFO..]),
            db_type,
            creator,
            uid: BigEndian::read_u32(&data[PDB_UID..]),
            next_rec: BigEndian::read_u32(&data[PDB_NEXT_REC..]),
            record_count: BigEndian::read_u16(&data[PDB_REC_COUNT..]),
        })
    }

    /// Returns true for Mobipocket databases (type "BOOK", creator "MOBI").
    pub fn is_mobipocket(&self) -> bool {
        self.db_type == "BOOK" && self.creator == "MOBI"
    }

    /// Returns true for plain PalmDOC databases (type "TEXt", creator "REAd").
    pub fn is_palmdoc(&self) -> bool {
        self.db_type == "TEXt" && self.creator == "REAd"
    }

    /// Size in bytes of the header plus the record directory.
    pub fn directory_end(&self) -> usize {
        PDB_HEADER_SIZE + self.record_count as usize * PDB_RECORD_INFO_SIZE
    }
}

/// One entry of the record directory (8 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PdbRecordEntry {
    /// Absolute file offset of the record data.
    pub offset: u32,
    /// Record attribute flags.
    pub attributes: u8,
    /// 24-bit unique record id.
    pub uid: u32,
}

impl PdbRecordEntry {
    /// Parse one directory entry. The slice must be at least 8 bytes.
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < PDB_RECORD_INFO_SIZE {
            return None;
        }
        Some(PdbRecordEntry {
            offset: BigEndian::read_u32(&data[0..]),
            attributes: data[4],
            uid: BigEndian::read_u24(&data[5..]),
        })
    }
}

/// Parse the record directory that follows the PDB header.
///
/// `data` starts at the directory (file offset 78). Offsets must be
/// non-decreasing, must not point into the directory itself, and must not
/// exceed `file_size`.
pub fn parse_directory(
    data: &[u8],
    header: &PdbHeader,
    file_size: u64,
) -> Result<Vec<PdbRecordEntry>, MobiError> {
    let count = header.record_count as usize;
    if count == 0 {
        return Err(MobiError::Format(
            "PDB record directory is empty".to_string(),
        ));
    }
    let needed = count * PDB_RECORD_INFO_SIZE;
    if data.len() < needed {
        return Err(MobiError::Format(format!(
            "PDB record directory truncated: {} entries need {} bytes, have {}",
            count,
            needed,
            data.len()
        )));
    }

    let directory_end = header.directory_end() as u64;
    let mut entries = Vec::with_capacity(count);
    let mut previous = directory_end;
    for i in 0..count {
        let pos = i * PDB_RECORD_INFO_SIZE;
        let entry = PdbRecordEntry::parse(&data[pos..]).ok_or_else(|| {
            MobiError::Format(format!("Cannot parse directory entry {}", i))
        })?;
        let offset = entry.offset as u64;
        if offset < previous {
            return Err(MobiError::Format(format!(
                "Record {} offset {} is before {} (directory or previous record)",
                i, offset, previous
            )));
        }
        if offset > file_size {
            return Err(MobiError::Format(format!(
                "Record {} offset {} is beyond file size {}",
                i, offset, file_size
            )));
        }
        previous = offset;
        entries.push(entry);
    }
    Ok(entries)
}

/// Byte range `[start, end)` of record `index` within the file.
pub fn record_range(entries: &[PdbRecordEntry], index: usize, file_size: u64) -> Option<(u64, u64)> {
    let start = entries.get(index)?.offset as u64;
    let end = match entries.get(index + 1) {
        Some(next) => next.offset as u64,
        None => file_size,
    };
    Some((start, end))
}

/// Decode a PDB timestamp.
///
/// Values with the high bit set count seconds from 1904-01-01 (the Palm
/// epoch); all other values are Unix seconds. Zero means "not set".
pub fn decode_pdb_time(value: u32) -> Option<DateTime<Utc>> {
    if value == 0 {
        return None;
    }
    let secs = if value & 0x8000_0000 != 0 {
        value as i64 - EPOCH_MAC_DIFF
    } else {
        value as i64
    };
    DateTime::<Utc>::from_timestamp(secs, 0)
}

fn read_fourcc(bytes: &[u8], field: &str) -> Result<String, MobiError> {
    if !bytes.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
        return Err(MobiError::Format(format!(
            "PDB {} field is not 4-byte ASCII: {:02x?}",
            field, bytes
        )));
    }
    Ok(String::from_utf8_lossy(bytes).into_owned())
}
