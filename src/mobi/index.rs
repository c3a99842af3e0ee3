//! INDX index decoding.
//!
//! MOBI indices (KF8 skeleton, fragment, NCX and guide tables, dictionary
//! orthographic and inflection tables) share one on-disk form:
//!
//! - a main `INDX` record whose header gives the number of entry records,
//!   the number of CNCX string records and the declared entry total, followed
//!   by a `TAGX` table describing the tagged values each entry carries;
//! - `count` entry records, each an `INDX` header plus an `IDXT` table of
//!   u16 entry positions;
//! - `ncncx` CNCX records holding strings referenced by tag values.
//!
//! Each entry is a length-prefixed label, a run of control bytes, and
//! forward-encoded variable-width integers. Which tags are present and how
//! many values they carry is decided by masking the control bytes with the
//! TAGX entries.

use byteorder::{BigEndian, ByteOrder};
use log::{debug, trace};
use serde::Serialize;

use crate::mobi::constants::*;
use crate::mobi::header::TextEncoding;
use crate::mobi::record::Record;
use crate::MobiError;

/// Header fields of an INDX record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndxHeader {
    pub header_length: u32,
    /// 0 normal, 2 inflection.
    pub index_type: u32,
    /// Offset of the IDXT table.
    pub idxt_offset: u32,
    /// Entry records (main record) or entries in this record (entry records).
    pub count: u32,
    /// Label code page.
    pub code: u32,
    pub lang: u32,
    /// Declared total number of entries (main record).
    pub total: u32,
    pub ordt_offset: u32,
    pub ligt_offset: u32,
    pub ligt_count: u32,
    /// Number of CNCX records following the entry records.
    pub cncx_count: u32,
}

impl IndxHeader {
    pub fn parse(data: &[u8]) -> Result<Self, MobiError> {
        if data.len() < INDX_MIN_HEADER || &data[..4] != b"INDX" {
            return Err(MobiError::Format(
                "Index record has no INDX header".to_string(),
            ));
        }
        let u32_at = |o: usize| BigEndian::read_u32(&data[o..]);
        Ok(IndxHeader {
            header_length: u32_at(INDX_HEADER_LENGTH),
            index_type: u32_at(INDX_TYPE),
            idxt_offset: u32_at(INDX_IDXT_OFFSET),
            count: u32_at(INDX_ENTRIES_COUNT),
            code: u32_at(INDX_CODE),
            lang: u32_at(INDX_LANG),
            total: u32_at(INDX_TOTAL),
            ordt_offset: u32_at(INDX_ORDT_OFFSET),
            ligt_offset: u32_at(INDX_LIGT_OFFSET),
            ligt_count: u32_at(INDX_LIGT_COUNT),
            cncx_count: u32_at(INDX_CNCX_COUNT),
        })
    }
}

/// One TAGX table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TagxEntry {
    pub tag: u8,
    pub values_per_entry: u8,
    pub mask: u8,
    /// 1 marks the end of a control byte.
    pub end_flag: u8,
}

/// The TAGX table of a main INDX record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tagx {
    pub control_byte_count: usize,
    pub entries: Vec<TagxEntry>,
}

impl Tagx {
    pub fn parse(data: &[u8]) -> Result<Self, MobiError> {
        if data.len() < TAGX_HEADER_SIZE || &data[..4] != b"TAGX" {
            return Err(MobiError::Format("Missing TAGX table in INDX record".to_string()));
        }
        let length = BigEndian::read_u32(&data[4..]) as usize;
        let control_byte_count = BigEndian::read_u32(&data[8..]) as usize;
        if length < TAGX_HEADER_SIZE || length > data.len() {
            return Err(MobiError::Format(format!(
                "TAGX length {} invalid ({} bytes available)",
                length,
                data.len()
            )));
        }
        let entries = data[TAGX_HEADER_SIZE..length]
            .chunks_exact(4)
            .map(|c| TagxEntry {
                tag: c[0],
                values_per_entry: c[1],
                mask: c[2],
                end_flag: c[3],
            })
            .collect();
        Ok(Tagx {
            control_byte_count,
            entries,
        })
    }
}

/// ORDT label translation tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ordt {
    /// 0: one byte per label character, 1: two bytes per character.
    pub ordt_type: u32,
    pub ordt1: Vec<u8>,
    pub ordt2: Vec<u16>,
}

impl Ordt {
    fn parse(data: &[u8]) -> Result<Option<Self>, MobiError> {
        if data.len() < INDX_ORDT2_OFFSET + 4 {
            return Ok(None);
        }
        let ordt_type = BigEndian::read_u32(&data[INDX_ORDT_TYPE..]);
        let entries = BigEndian::read_u32(&data[INDX_ORDT_ENTRIES..]) as usize;
        if entries == 0 {
            return Ok(None);
        }
        let off1 = BigEndian::read_u32(&data[INDX_ORDT1_OFFSET..]) as usize;
        let off2 = BigEndian::read_u32(&data[INDX_ORDT2_OFFSET..]) as usize;
        let table1 = data
            .get(off1..off1 + 4 + entries)
            .filter(|t| t.starts_with(b"ORDT"))
            .ok_or_else(|| MobiError::Format(format!("Bad ORDT1 table at {}", off1)))?;
        let table2 = data
            .get(off2..off2 + 4 + entries * 2)
            .filter(|t| t.starts_with(b"ORDT"))
            .ok_or_else(|| MobiError::Format(format!("Bad ORDT2 table at {}", off2)))?;
        Ok(Some(Ordt {
            ordt_type,
            ordt1: table1[4..].to_vec(),
            ordt2: table2[4..].chunks_exact(2).map(BigEndian::read_u16).collect(),
        }))
    }

    fn decode_label(&self, raw: &[u8]) -> String {
        let map = |c: u32| -> char {
            let code = self.ordt2.get(c as usize).map_or(c, |&v| v as u32);
            char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER)
        };
        if self.ordt_type == 1 {
            raw.chunks(2)
                .map(|c| {
                    let v = if c.len() == 2 {
                        BigEndian::read_u16(c) as u32
                    } else {
                        c[0] as u32
                    };
                    map(v)
                })
                .collect()
        } else {
            raw.iter().map(|&b| map(b as u32)).collect()
        }
    }
}

/// A tag and its decoded values within one entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexTag {
    pub tag: u8,
    pub values: Vec<u32>,
}

/// One index entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexEntry {
    pub label: String,
    pub tags: Vec<IndexTag>,
}

impl IndexEntry {
    /// All values of `tag`, if the entry carries it.
    pub fn values(&self, tag: u8) -> Option<&[u32]> {
        self.tags
            .iter()
            .find(|t| t.tag == tag)
            .map(|t| t.values.as_slice())
    }

    /// The `n`th value of `tag`.
    pub fn value(&self, tag: u8, n: usize) -> Option<u32> {
        self.values(tag).and_then(|v| v.get(n).copied())
    }
}

/// Read a forward-encoded variable-width integer.
///
/// Seven bits per byte, most significant group first; the byte with the
/// high bit set is the last. Returns `(value, bytes consumed)`.
///
/// ```
/// use mobi::mobi::index::read_varlen;
///
/// assert_eq!(read_varlen(&[0x85]), Some((5, 1)));
/// assert_eq!(read_varlen(&[0x01, 0x80]), Some((128, 2)));
/// assert_eq!(read_varlen(&[0x01]), None);
/// ```
pub fn read_varlen(data: &[u8]) -> Option<(u32, usize)> {
    let mut value: u32 = 0;
    for (i, &b) in data.iter().enumerate().take(5) {
        value = (value << 7) | (b & 0x7f) as u32;
        if b & 0x80 != 0 {
            return Some((value, i + 1));
        }
    }
    None
}

/// Strings referenced from tag values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cncx {
    records: Vec<Vec<u8>>,
    encoding: Option<TextEncoding>,
}

impl Cncx {
    pub fn new(records: Vec<Vec<u8>>, encoding: TextEncoding) -> Self {
        Cncx {
            records,
            encoding: Some(encoding),
        }
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Resolve a CNCX offset: `offset / 0x10000` selects the record, the
    /// remainder the position of a varint length followed by the text.
    pub fn get(&self, offset: u32) -> Result<String, MobiError> {
        let rec = (offset / CNCX_RECORD_SPAN) as usize;
        let pos = (offset % CNCX_RECORD_SPAN) as usize;
        let data = self.records.get(rec).ok_or_else(|| {
            MobiError::Format(format!(
                "CNCX offset {:#x} refers to missing record {} ({} present)",
                offset,
                rec,
                self.records.len()
            ))
        })?;
        let (len, consumed) = data
            .get(pos..)
            .and_then(read_varlen)
            .ok_or_else(|| MobiError::Format(format!("Bad CNCX string length at {:#x}", offset)))?;
        let start = pos + consumed;
        let bytes = data.get(start..start + len as usize).ok_or_else(|| {
            MobiError::Format(format!("CNCX string at {:#x} runs past its record", offset))
        })?;
        let encoding = self.encoding.unwrap_or(TextEncoding::Utf8);
        Ok(encoding.decode(bytes))
    }
}

/// A decoded index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Index {
    /// Record number of the main INDX record.
    pub record: usize,
    pub header: IndxHeader,
    pub tagx: Tagx,
    pub ordt: Option<Ordt>,
    pub entries: Vec<IndexEntry>,
    #[serde(skip)]
    pub cncx: Cncx,
}

impl Index {
    /// Decode the index whose main INDX record is `records[start]`.
    pub fn parse(records: &[Record], start: usize, encoding: TextEncoding) -> Result<Self, MobiError> {
        let main = records
            .get(start)
            .ok_or_else(|| {
                MobiError::Format(format!(
                    "Index record {} beyond record count {}",
                    start,
                    records.len()
                ))
            })?
            .data
            .as_slice();
        let header = IndxHeader::parse(main)
            .map_err(|e| MobiError::Format(format!("Index at record {}: {}", start, e)))?;
        let tagx_start = header.header_length as usize;
        let tagx = Tagx::parse(main.get(tagx_start..).unwrap_or(&[]))?;
        let ordt = Ordt::parse(main)?;
        let label_encoding = TextEncoding::from_codepage(header.code).unwrap_or(encoding);

        let entry_count = header.count as usize;
        let cncx_first = start + 1 + entry_count;
        let cncx_last = cncx_first + header.cncx_count as usize;
        if cncx_last > records.len() {
            return Err(MobiError::Format(format!(
                "Index at record {} needs records up to {}, file has {}",
                start,
                cncx_last,
                records.len()
            )));
        }
        let cncx = Cncx::new(
            records[cncx_first..cncx_last]
                .iter()
                .map(|r| r.data.clone())
                .collect(),
            encoding,
        );

        let mut entries = Vec::new();
        for rec in &records[start + 1..cncx_first] {
            parse_entry_record(&rec.data, rec.index, &tagx, ordt.as_ref(), label_encoding, &mut entries)?;
        }

        if entries.len() != header.total as usize {
            return Err(MobiError::Format(format!(
                "Index at record {} declares {} entries, found {}",
                start,
                header.total,
                entries.len()
            )));
        }

        debug!(
            "Index at record {}: {} entries in {} records, {} CNCX records",
            start,
            entries.len(),
            entry_count,
            cncx.record_count()
        );
        Ok(Index {
            record: start,
            header,
            tagx,
            ordt,
            entries,
            cncx,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First entry with the given label.
    pub fn get(&self, label: &str) -> Option<&IndexEntry> {
        self.entries.iter().find(|e| e.label == label)
    }

    /// Decode the entries as a KF8 skeleton table.
    pub fn skeletons(&self) -> Result<Vec<SkeletonEntry>, MobiError> {
        self.entries
            .iter()
            .map(|e| {
                Ok(SkeletonEntry {
                    label: e.label.clone(),
                    fragment_count: required(e, 1, 0, "skeleton")?,
                    start: required(e, 6, 0, "skeleton")?,
                    length: required(e, 6, 1, "skeleton")?,
                })
            })
            .collect()
    }

    /// Decode the entries as a KF8 fragment table.
    pub fn fragments(&self) -> Result<Vec<FragmentEntry>, MobiError> {
        self.entries
            .iter()
            .map(|e| {
                let insert_position = e.label.trim().parse::<u32>().map_err(|_| {
                    MobiError::Format(format!(
                        "Fragment label {:?} is not an insert position",
                        e.label
                    ))
                })?;
                Ok(FragmentEntry {
                    insert_position,
                    selector: self.cncx.get(required(e, 2, 0, "fragment")?)?,
                    file_number: required(e, 3, 0, "fragment")?,
                    sequence_number: required(e, 4, 0, "fragment")?,
                    start: required(e, 6, 0, "fragment")?,
                    length: required(e, 6, 1, "fragment")?,
                })
            })
            .collect()
    }

    /// Decode the entries as an NCX (table of contents) table.
    pub fn ncx_entries(&self) -> Result<Vec<NcxEntry>, MobiError> {
        self.entries
            .iter()
            .map(|e| {
                Ok(NcxEntry {
                    label: e.label.clone(),
                    pos: e.value(1, 0),
                    len: e.value(2, 0),
                    text: e.value(3, 0).map(|o| self.cncx.get(o)).transpose()?,
                    level: e.value(4, 0),
                    kind: e.value(5, 0).map(|o| self.cncx.get(o)).transpose()?,
                    pos_fid: pos_fid(e),
                    parent: e.value(21, 0),
                    first_child: e.value(22, 0),
                    last_child: e.value(23, 0),
                })
            })
            .collect()
    }

    /// Decode the entries as a guide table.
    pub fn guide_entries(&self) -> Result<Vec<GuideEntry>, MobiError> {
        self.entries
            .iter()
            .map(|e| {
                Ok(GuideEntry {
                    ref_type: e.label.clone(),
                    title: e.value(1, 0).map(|o| self.cncx.get(o)).transpose()?,
                    pos_fid: pos_fid(e),
                })
            })
            .collect()
    }
}

fn required(entry: &IndexEntry, tag: u8, n: usize, table: &str) -> Result<u32, MobiError> {
    entry.value(tag, n).ok_or_else(|| {
        MobiError::Format(format!(
            "{} entry {:?} lacks tag {} value {}",
            table, entry.label, tag, n
        ))
    })
}

fn pos_fid(entry: &IndexEntry) -> Option<(u32, u32)> {
    Some((entry.value(6, 0)?, entry.value(6, 1)?))
}

fn parse_entry_record(
    data: &[u8],
    record: usize,
    tagx: &Tagx,
    ordt: Option<&Ordt>,
    encoding: TextEncoding,
    out: &mut Vec<IndexEntry>,
) -> Result<(), MobiError> {
    let header = IndxHeader::parse(data)
        .map_err(|e| MobiError::Format(format!("Index entry record {}: {}", record, e)))?;
    let idxt = header.idxt_offset as usize;
    let count = header.count as usize;
    let table = data
        .get(idxt..idxt + 4 + count * 2)
        .filter(|t| t.starts_with(b"IDXT"))
        .ok_or_else(|| {
            MobiError::Format(format!(
                "Index entry record {} has no IDXT table at {}",
                record, idxt
            ))
        })?;

    let mut positions: Vec<usize> = table[4..]
        .chunks_exact(2)
        .map(|c| BigEndian::read_u16(c) as usize)
        .collect();
    positions.push(idxt);

    for (n, pair) in positions.windows(2).enumerate() {
        let (start, end) = (pair[0], pair[1]);
        if start >= end || end > data.len() {
            return Err(MobiError::Format(format!(
                "Index entry {} of record {} has invalid bounds {}..{}",
                n, record, start, end
            )));
        }
        let entry = parse_entry(&data[start..end], tagx, ordt, encoding).map_err(|e| {
            MobiError::Format(format!("Index entry {} of record {}: {}", n, record, e))
        })?;
        trace!("Index entry {:?}: {} tags", entry.label, entry.tags.len());
        out.push(entry);
    }
    Ok(())
}

/// Decode one entry: label, control bytes, tag values.
pub fn parse_entry(
    data: &[u8],
    tagx: &Tagx,
    ordt: Option<&Ordt>,
    encoding: TextEncoding,
) -> Result<IndexEntry, MobiError> {
    let label_len = *data
        .first()
        .ok_or_else(|| MobiError::Format("empty entry".to_string()))? as usize;
    let raw_label = data
        .get(1..1 + label_len)
        .ok_or_else(|| MobiError::Format(format!("label of {} bytes runs past entry", label_len)))?;
    let label = match ordt {
        Some(o) => o.decode_label(raw_label),
        None => encoding.decode(raw_label),
    };

    let mut pos = 1 + label_len;
    let control = data
        .get(pos..pos + tagx.control_byte_count)
        .ok_or_else(|| MobiError::Format("control bytes run past entry".to_string()))?;
    pos += tagx.control_byte_count;

    // (tag, values_per_entry, value count or byte length)
    enum Count {
        Values(usize),
        Bytes(usize),
    }
    let mut present = Vec::new();
    let mut cb = 0;
    for t in &tagx.entries {
        if t.end_flag == 1 {
            cb += 1;
            continue;
        }
        let byte = *control.get(cb).ok_or_else(|| {
            MobiError::Format(format!("TAGX refers to missing control byte {}", cb))
        })?;
        let value = byte & t.mask;
        if value == 0 {
            continue;
        }
        let count = if value == t.mask {
            if t.mask.count_ones() > 1 {
                let (n, used) = data
                    .get(pos..)
                    .and_then(read_varlen)
                    .ok_or_else(|| MobiError::Format(format!("bad byte count for tag {}", t.tag)))?;
                pos += used;
                Count::Bytes(n as usize)
            } else {
                Count::Values(1)
            }
        } else {
            Count::Values((value >> t.mask.trailing_zeros()) as usize)
        };
        present.push((t.tag, t.values_per_entry as usize, count));
    }

    let mut tags = Vec::with_capacity(present.len());
    for (tag, per_entry, count) in present {
        let mut values = Vec::new();
        match count {
            Count::Values(n) => {
                for _ in 0..n * per_entry {
                    let (v, used) = data.get(pos..).and_then(read_varlen).ok_or_else(|| {
                        MobiError::Format(format!("values of tag {} run past entry", tag))
                    })?;
                    pos += used;
                    values.push(v);
                }
            }
            Count::Bytes(n) => {
                let mut consumed = 0;
                while consumed < n {
                    let (v, used) = data.get(pos..).and_then(read_varlen).ok_or_else(|| {
                        MobiError::Format(format!("values of tag {} run past entry", tag))
                    })?;
                    pos += used;
                    consumed += used;
                    values.push(v);
                }
                if consumed != n {
                    return Err(MobiError::Format(format!(
                        "tag {} should consume {} bytes, consumed {}",
                        tag, n, consumed
                    )));
                }
            }
        }
        tags.push(IndexTag { tag, values });
    }

    Ok(IndexEntry { label, tags })
}

/// KF8 skeleton entry: one reconstructed file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkeletonEntry {
    pub label: String,
    pub fragment_count: u32,
    /// Offset of the skeleton markup in flow 0.
    pub start: u32,
    pub length: u32,
}

/// KF8 fragment entry: markup inserted into a skeleton.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FragmentEntry {
    /// Absolute insert position in flow 0.
    pub insert_position: u32,
    pub selector: String,
    pub file_number: u32,
    pub sequence_number: u32,
    pub start: u32,
    pub length: u32,
}

/// Table of contents entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NcxEntry {
    pub label: String,
    pub pos: Option<u32>,
    pub len: Option<u32>,
    pub text: Option<String>,
    pub level: Option<u32>,
    pub kind: Option<String>,
    pub pos_fid: Option<(u32, u32)>,
    pub parent: Option<u32>,
    pub first_child: Option<u32>,
    pub last_child: Option<u32>,
}

/// Guide (landmark) entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuideEntry {
    pub ref_type: String,
    pub title: Option<String>,
    pub pos_fid: Option<(u32, u32)>,
}
