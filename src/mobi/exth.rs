//! EXTH extended metadata.
//!
//! When bit 0x40 of the MOBI header's `exth_flags` is set, an EXTH block
//! follows the MOBI header inside record 0:
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0 | 4 | `EXTH` |
//! | 4 | 4 | Block length |
//! | 8 | 4 | Record count |
//! | 12 | ... | Records: tag (u32), size including this 8-byte prefix (u32), value |
//!
//! Tag ids map onto [`ExthTag`] through a static table. Each tag has a fixed
//! value kind: numeric tags are big-endian integers, binary tags keep raw
//! bytes, and the rest are strings in the book's text encoding.

use byteorder::{BigEndian, ByteOrder};
use log::{debug, trace};
use serde::{Serialize, Serializer};
use std::fmt;

use crate::mobi::constants::*;
use crate::mobi::header::TextEncoding;
use crate::MobiError;

/// How the value of an EXTH tag is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExthKind {
    Numeric,
    Text,
    Binary,
}

macro_rules! exth_tags {
    ($( $id:literal => $variant:ident, $name:literal, $kind:ident; )*) => {
        /// Known EXTH tags. Ids outside the table are kept as `Unknown(id)`.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum ExthTag {
            $( $variant, )*
            Unknown(u32),
        }

        impl ExthTag {
            pub fn from_u32(id: u32) -> Self {
                match id {
                    $( $id => ExthTag::$variant, )*
                    other => ExthTag::Unknown(other),
                }
            }

            pub fn as_u32(self) -> u32 {
                match self {
                    $( ExthTag::$variant => $id, )*
                    ExthTag::Unknown(id) => id,
                }
            }

            /// Short snake_case name, `unknown` for ids outside the table.
            pub fn name(self) -> &'static str {
                match self {
                    $( ExthTag::$variant => $name, )*
                    ExthTag::Unknown(_) => "unknown",
                }
            }

            pub fn kind(self) -> ExthKind {
                match self {
                    $( ExthTag::$variant => ExthKind::$kind, )*
                    ExthTag::Unknown(_) => ExthKind::Binary,
                }
            }
        }
    };
}

exth_tags! {
    1 => DrmServer, "drm_server", Text;
    2 => DrmCommerce, "drm_commerce", Text;
    3 => DrmEbookbase, "drm_ebookbase", Text;
    100 => Author, "author", Text;
    101 => Publisher, "publisher", Text;
    102 => Imprint, "imprint", Text;
    103 => Description, "description", Text;
    104 => Isbn, "isbn", Text;
    105 => Subject, "subject", Text;
    106 => PublishDate, "publishdate", Text;
    107 => Review, "review", Text;
    108 => Contributor, "contributor", Text;
    109 => Rights, "rights", Text;
    110 => SubjectCode, "subject_code", Text;
    111 => Type, "type", Text;
    112 => Source, "source", Text;
    113 => Asin, "asin", Text;
    114 => Version, "version", Numeric;
    115 => Sample, "sample", Numeric;
    116 => StartReading, "start_reading", Numeric;
    117 => Adult, "adult", Text;
    118 => Price, "price", Text;
    119 => Currency, "currency", Text;
    121 => Kf8Boundary, "kf8_boundary", Numeric;
    122 => FixedLayout, "fixed_layout", Text;
    123 => BookType, "book_type", Text;
    124 => OrientationLock, "orientation_lock", Text;
    125 => CountResources, "count_resources", Numeric;
    126 => OrigResolution, "orig_resolution", Text;
    127 => ZeroGutter, "zero_gutter", Text;
    128 => ZeroMargin, "zero_margin", Text;
    129 => Kf8CoverUri, "kf8_cover_uri", Text;
    131 => RescOffset, "resc_offset", Numeric;
    132 => RegionMagnification, "region_magnification", Text;
    200 => DictName, "dict_name", Text;
    201 => CoverOffset, "cover_offset", Numeric;
    202 => ThumbOffset, "thumb_offset", Numeric;
    203 => HasFakeCover, "has_fake_cover", Numeric;
    204 => CreatorSoftware, "creator_software", Numeric;
    205 => CreatorMajor, "creator_major", Numeric;
    206 => CreatorMinor, "creator_minor", Numeric;
    207 => CreatorBuild, "creator_build", Numeric;
    208 => Watermark, "watermark", Text;
    209 => TamperKeys, "tamper_keys", Binary;
    300 => FontSignature, "font_signature", Binary;
    401 => ClippingLimit, "clipping_limit", Numeric;
    402 => PublisherLimit, "publisher_limit", Numeric;
    404 => TtsDisable, "tts_disable", Numeric;
    405 => ReadForFree, "read_for_free", Numeric;
    406 => Rental, "rental", Numeric;
    501 => CdeType, "cde_type", Text;
    502 => LastUpdate, "last_update", Text;
    503 => TitleUpdated, "title_updated", Text;
    504 => ContentAsin, "content_asin", Text;
    508 => TitleFileAs, "title_file_as", Text;
    517 => CreatorFileAs, "creator_file_as", Text;
    522 => PublisherFileAs, "publisher_file_as", Text;
    524 => Language, "language", Text;
    525 => Alignment, "alignment", Text;
    527 => PageDir, "page_dir", Text;
    528 => OverrideFonts, "override_fonts", Text;
    529 => SourceDescription, "source_description", Text;
    531 => DictLangIn, "dict_lang_in", Text;
    532 => DictLangOut, "dict_lang_out", Text;
    534 => InputSource, "input_source", Text;
    535 => CreatorBuildRev, "creator_build_rev", Text;
}

impl fmt::Display for ExthTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExthTag::Unknown(id) => write!(f, "unknown({})", id),
            tag => f.write_str(tag.name()),
        }
    }
}

impl Serialize for ExthTag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Decoded value of an EXTH record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ExthValue {
    Text(String),
    Number(u32),
    Binary(Vec<u8>),
}

impl ExthValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ExthValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<u32> {
        match self {
            ExthValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for ExthValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExthValue::Text(s) => f.write_str(s),
            ExthValue::Number(n) => write!(f, "{}", n),
            ExthValue::Binary(b) => {
                for byte in b {
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
        }
    }
}

/// One EXTH record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExthRecord {
    /// Numeric tag id as stored.
    pub id: u32,
    pub tag: ExthTag,
    /// Value size in bytes (without the 8-byte prefix).
    pub size: u32,
    pub value: ExthValue,
}

/// The EXTH block of record 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExthHeader {
    /// Block length as stored.
    pub length: u32,
    /// Declared record count.
    pub count: u32,
    /// Records in file order, repeats included.
    pub records: Vec<ExthRecord>,
}

impl ExthHeader {
    /// Parse the EXTH block starting at `offset` in record 0.
    pub fn parse(data: &[u8], offset: usize, encoding: TextEncoding) -> Result<Self, MobiError> {
        let header = data
            .get(offset..offset + EXTH_HEADER_SIZE)
            .ok_or_else(|| {
                MobiError::Format(format!(
                    "EXTH header at {} runs past record 0 ({} bytes)",
                    offset,
                    data.len()
                ))
            })?;
        if &header[..4] != b"EXTH" {
            return Err(MobiError::Format(format!(
                "Bad EXTH magic {:02x?} at record 0 offset {}",
                &header[..4],
                offset
            )));
        }
        let length = BigEndian::read_u32(&header[4..]);
        let count = BigEndian::read_u32(&header[8..]);
        let end = offset + length as usize;
        if end > data.len() || (length as usize) < EXTH_HEADER_SIZE {
            return Err(MobiError::Format(format!(
                "EXTH length {} at offset {} does not fit record 0 ({} bytes)",
                length,
                offset,
                data.len()
            )));
        }

        let mut records = Vec::with_capacity(count.min(1024) as usize);
        let mut pos = offset + EXTH_HEADER_SIZE;
        for n in 0..count {
            if pos + EXTH_RECORD_HEADER_SIZE > end {
                return Err(MobiError::Format(format!(
                    "EXTH record {} of {} runs past the EXTH header",
                    n, count
                )));
            }
            let id = BigEndian::read_u32(&data[pos..]);
            let size = BigEndian::read_u32(&data[pos + 4..]) as usize;
            if size < EXTH_RECORD_HEADER_SIZE || pos + size > end {
                return Err(MobiError::Format(format!(
                    "EXTH record {} (tag {}) has invalid size {}",
                    n, id, size
                )));
            }
            let raw = &data[pos + EXTH_RECORD_HEADER_SIZE..pos + size];
            let tag = ExthTag::from_u32(id);
            let value = decode_value(tag, raw, encoding);
            trace!("EXTH {} ({}): {} bytes", id, tag, raw.len());
            records.push(ExthRecord {
                id,
                tag,
                size: raw.len() as u32,
                value,
            });
            pos += size;
        }

        debug!("EXTH: {} records in {} bytes", records.len(), length);
        Ok(ExthHeader {
            length,
            count,
            records,
        })
    }

    /// First record with the given tag.
    pub fn get(&self, tag: ExthTag) -> Option<&ExthRecord> {
        self.records.iter().find(|r| r.tag == tag)
    }

    /// All records with the given tag, in file order.
    pub fn all(&self, tag: ExthTag) -> impl Iterator<Item = &ExthRecord> {
        self.records.iter().filter(move |r| r.tag == tag)
    }

    /// First text value of the given tag.
    pub fn text(&self, tag: ExthTag) -> Option<&str> {
        self.get(tag).and_then(|r| r.value.as_text())
    }

    /// First numeric value of the given tag.
    pub fn number(&self, tag: ExthTag) -> Option<u32> {
        self.get(tag).and_then(|r| r.value.as_number())
    }

    /// All values of a repeatable tag joined with `sep`.
    pub fn joined(&self, tag: ExthTag, sep: &str) -> Option<String> {
        let values: Vec<String> = self.all(tag).map(|r| r.value.to_string()).collect();
        if values.is_empty() {
            None
        } else {
            Some(values.join(sep))
        }
    }
}

fn decode_value(tag: ExthTag, raw: &[u8], encoding: TextEncoding) -> ExthValue {
    match tag.kind() {
        ExthKind::Numeric if raw.len() <= 4 => {
            ExthValue::Number(raw.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32))
        }
        ExthKind::Numeric | ExthKind::Binary => ExthValue::Binary(raw.to_vec()),
        ExthKind::Text => {
            let end = raw.iter().rposition(|&b| b != 0).map_or(0, |p| p + 1);
            ExthValue::Text(encoding.decode(&raw[..end]))
        }
    }
}
