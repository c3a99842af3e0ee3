//! Record 0 header parsing.
//!
//! Record 0 of a MOBI file opens with the 16-byte PalmDOC header
//! ([`Record0Header`]) describing how the text records are stored. When the
//! record is longer than that, a MOBI header ([`MobiHeader`]) follows at
//! offset 16. Its `header_length` field counts from the `MOBI` magic and
//! bounds every field that is read: newer fields are `None` on files whose
//! header is too short to contain them.

use byteorder::{BigEndian, ByteOrder};
use log::{debug, warn};
use serde::Serialize;
use std::fmt;

use crate::mobi::constants::*;
use crate::mobi::locale::locale_string;
use crate::MobiError;

/// Text record compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Compression {
    None,
    PalmDoc,
    HuffCdic,
}

impl Compression {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            COMPRESSION_NONE => Some(Compression::None),
            COMPRESSION_PALMDOC => Some(Compression::PalmDoc),
            COMPRESSION_HUFFCDIC => Some(Compression::HuffCdic),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Compression::None => "none",
            Compression::PalmDoc => "palm_doc",
            Compression::HuffCdic => "huff_cdic",
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Encryption scheme declared in the PalmDOC header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Encryption {
    None,
    OldMobipocket,
    Mobipocket,
}

impl Encryption {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            ENCRYPTION_NONE => Some(Encryption::None),
            ENCRYPTION_OLD => Some(Encryption::OldMobipocket),
            ENCRYPTION_MOBIPOCKET => Some(Encryption::Mobipocket),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Encryption::None => "none",
            Encryption::OldMobipocket => "old_mobipocket",
            Encryption::Mobipocket => "mobipocket",
        }
    }
}

impl fmt::Display for Encryption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The 16-byte PalmDOC header at the start of record 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record0Header {
    /// Text compression (bytes 0-1).
    pub compression: Compression,
    /// Uncompressed text length (bytes 4-7).
    pub text_length: u32,
    /// Number of text records (bytes 8-9).
    pub text_record_count: u16,
    /// Maximum uncompressed size of a text record, usually 4096 (bytes 10-11).
    pub text_record_size: u16,
    /// Encryption type (bytes 12-13).
    pub encryption: Encryption,
    /// Unused trailing field (bytes 14-15).
    pub unknown: u16,
}

impl Record0Header {
    /// Parse the PalmDOC header from record 0.
    ///
    /// # Examples
    ///
    /// ```
    /// use mobi::mobi::header::{Compression, Record0Header};
    ///
    /// let mut rec0 = vec![0u8; 16];
    /// rec0[1] = 2; // PalmDOC
    /// rec0[4..8].copy_from_slice(&1840u32.to_be_bytes());
    /// rec0[9] = 1;
    /// rec0[10..12].copy_from_slice(&4096u16.to_be_bytes());
    ///
    /// let hdr = Record0Header::parse(&rec0).unwrap();
    /// assert_eq!(hdr.compression, Compression::PalmDoc);
    /// assert_eq!(hdr.text_length, 1840);
    /// assert_eq!(hdr.text_record_count, 1);
    /// ```
    pub fn parse(data: &[u8]) -> Result<Self, MobiError> {
        if data.len() < RECORD0_HEADER_SIZE {
            return Err(MobiError::Format(format!(
                "Record 0 too short for PalmDOC header: {} bytes",
                data.len()
            )));
        }

        let raw_compression = BigEndian::read_u16(&data[RECORD0_COMPRESSION..]);
        let compression = Compression::from_u16(raw_compression).ok_or_else(|| {
            MobiError::Format(format!("Unknown compression type {}", raw_compression))
        })?;
        let raw_encryption = BigEndian::read_u16(&data[RECORD0_ENCRYPTION..]);
        let encryption = Encryption::from_u16(raw_encryption).ok_or_else(|| {
            MobiError::Format(format!("Unknown encryption type {}", raw_encryption))
        })?;

        Ok(Record0Header {
            compression,
            text_length: BigEndian::read_u32(&data[RECORD0_TEXT_LENGTH..]),
            text_record_count: BigEndian::read_u16(&data[RECORD0_TEXT_COUNT..]),
            text_record_size: BigEndian::read_u16(&data[RECORD0_TEXT_SIZE..]),
            encryption,
            unknown: BigEndian::read_u16(&data[RECORD0_UNKNOWN..]),
        })
    }

    pub fn is_encrypted(&self) -> bool {
        self.encryption != Encryption::None
    }
}

/// Character encoding of text and metadata strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TextEncoding {
    Cp1252,
    Utf8,
}

impl TextEncoding {
    /// Map a MOBI code page number to an encoding.
    pub fn from_codepage(codepage: u32) -> Result<Self, MobiError> {
        match codepage {
            CODEPAGE_CP1252 => Ok(TextEncoding::Cp1252),
            CODEPAGE_UTF8 => Ok(TextEncoding::Utf8),
            other => Err(MobiError::UnsupportedEncoding(format!(
                "Unknown text encoding code page {}",
                other
            ))),
        }
    }

    pub fn codepage(self) -> u32 {
        match self {
            TextEncoding::Cp1252 => CODEPAGE_CP1252,
            TextEncoding::Utf8 => CODEPAGE_UTF8,
        }
    }

    /// Decode bytes to a string. Invalid sequences are replaced.
    pub fn decode(self, bytes: &[u8]) -> String {
        match self {
            TextEncoding::Cp1252 => encoding_rs::WINDOWS_1252
                .decode_without_bom_handling(bytes)
                .0
                .into_owned(),
            TextEncoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TextEncoding::Cp1252 => "cp1252",
            TextEncoding::Utf8 => "utf8",
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The MOBI header stored in record 0 after the PalmDOC header.
///
/// Offsets in the field docs are relative to the start of record 0. Index
/// fields hold raw record numbers; `0xFFFFFFFF` means "not set", see
/// [`valid_index`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MobiHeader {
    /// "MOBI" (16).
    pub magic: String,
    /// Header length counted from the magic (20).
    pub header_length: u32,
    /// Book type, 2 for Mobipocket books (24).
    pub mobi_type: u32,
    /// Code page as stored (28).
    pub text_encoding: u32,
    /// Decoded text encoding.
    pub encoding: TextEncoding,
    /// Unique id (32).
    pub uid: u32,
    /// File format version, 8 for KF8 (36).
    pub version: u32,
    pub orth_index: Option<u32>,
    pub infl_index: Option<u32>,
    pub names_index: Option<u32>,
    pub keys_index: Option<u32>,
    pub extra0_index: Option<u32>,
    pub extra1_index: Option<u32>,
    pub extra2_index: Option<u32>,
    pub extra3_index: Option<u32>,
    pub extra4_index: Option<u32>,
    pub extra5_index: Option<u32>,
    /// First record after the text (80).
    pub non_text_index: Option<u32>,
    pub full_name_offset: Option<u32>,
    pub full_name_length: Option<u32>,
    /// Locale code (92), see [`crate::mobi::locale`].
    pub locale: Option<u32>,
    /// The locale as a language tag such as `en-us`, if the code is known.
    pub locale_str: Option<String>,
    pub dict_input_lang: Option<u32>,
    pub dict_output_lang: Option<u32>,
    pub min_version: Option<u32>,
    /// First resource record (108).
    pub image_index: Option<u32>,
    pub huff_rec_index: Option<u32>,
    pub huff_rec_count: Option<u32>,
    pub datp_rec_index: Option<u32>,
    pub datp_rec_count: Option<u32>,
    /// Bit 0x40 signals an EXTH header (128).
    pub exth_flags: Option<u32>,
    pub drm_offset: Option<u32>,
    pub drm_count: Option<u32>,
    pub drm_size: Option<u32>,
    pub drm_flags: Option<u32>,
    /// FDST record for KF8; first/last content record (two u16) for KF7 (192).
    pub fdst_index: Option<u32>,
    /// FDST section count for KF8 (196).
    pub fdst_section_count: Option<u32>,
    pub fcis_index: Option<u32>,
    pub fcis_count: Option<u32>,
    pub flis_index: Option<u32>,
    pub flis_count: Option<u32>,
    pub srcs_index: Option<u32>,
    pub srcs_count: Option<u32>,
    /// Trailing entry flags of text records (242).
    pub extra_flags: Option<u16>,
    pub ncx_index: Option<u32>,
    pub fragment_index: Option<u32>,
    pub skeleton_index: Option<u32>,
    pub datp_index: Option<u32>,
    pub guide_index: Option<u32>,
    /// Book title read from `full_name_offset`.
    pub full_name: Option<String>,
}

/// Reads fields bounded by both the declared header length and the record.
struct FieldReader<'a> {
    data: &'a [u8],
    end: usize,
}

impl FieldReader<'_> {
    fn u32(&self, offset: usize) -> Option<u32> {
        if offset + 4 <= self.end {
            Some(BigEndian::read_u32(&self.data[offset..]))
        } else {
            None
        }
    }

    fn u16(&self, offset: usize) -> Option<u16> {
        if offset + 2 <= self.end {
            Some(BigEndian::read_u16(&self.data[offset..]))
        } else {
            None
        }
    }
}

impl MobiHeader {
    /// Parse the MOBI header from record 0.
    ///
    /// Returns `Ok(None)` when record 0 holds only the PalmDOC header.
    pub fn parse(data: &[u8]) -> Result<Option<Self>, MobiError> {
        if data.len() <= RECORD0_HEADER_SIZE {
            return Ok(None);
        }
        if data.len() < MOBI_VERSION + 4 {
            return Err(MobiError::Format(format!(
                "Record 0 too short for MOBI header: {} bytes",
                data.len()
            )));
        }
        let magic = &data[MOBI_MAGIC..MOBI_MAGIC + 4];
        if magic != b"MOBI" {
            return Err(MobiError::Format(format!(
                "Bad MOBI header magic {:02x?} in record 0",
                magic
            )));
        }

        let header_length = BigEndian::read_u32(&data[MOBI_HEADER_LENGTH..]);
        if (header_length as usize) < MOBI_HEADER_MIN_LENGTH {
            return Err(MobiError::Format(format!(
                "MOBI header length {} below minimum {}",
                header_length, MOBI_HEADER_MIN_LENGTH
            )));
        }
        let available = data.len() - RECORD0_HEADER_SIZE;
        if header_length as usize > available {
            return Err(MobiError::Format(format!(
                "MOBI header length {} exceeds record 0 ({} bytes after PalmDOC header)",
                header_length, available
            )));
        }

        let text_encoding = BigEndian::read_u32(&data[MOBI_TEXT_ENCODING..]);
        let encoding = TextEncoding::from_codepage(text_encoding)?;

        let r = FieldReader {
            data,
            end: RECORD0_HEADER_SIZE + header_length as usize,
        };

        let locale = r.u32(MOBI_LOCALE);
        let mut hdr = MobiHeader {
            magic: "MOBI".to_string(),
            header_length,
            mobi_type: BigEndian::read_u32(&data[MOBI_TYPE..]),
            text_encoding,
            encoding,
            uid: BigEndian::read_u32(&data[MOBI_UID..]),
            version: BigEndian::read_u32(&data[MOBI_VERSION..]),
            orth_index: r.u32(MOBI_ORTH_INDEX),
            infl_index: r.u32(MOBI_INFL_INDEX),
            names_index: r.u32(MOBI_NAMES_INDEX),
            keys_index: r.u32(MOBI_KEYS_INDEX),
            extra0_index: r.u32(MOBI_EXTRA0_INDEX),
            extra1_index: r.u32(MOBI_EXTRA0_INDEX + 4),
            extra2_index: r.u32(MOBI_EXTRA0_INDEX + 8),
            extra3_index: r.u32(MOBI_EXTRA0_INDEX + 12),
            extra4_index: r.u32(MOBI_EXTRA0_INDEX + 16),
            extra5_index: r.u32(MOBI_EXTRA0_INDEX + 20),
            non_text_index: r.u32(MOBI_NON_TEXT_INDEX),
            full_name_offset: r.u32(MOBI_FULL_NAME_OFFSET),
            full_name_length: r.u32(MOBI_FULL_NAME_LENGTH),
            locale,
            locale_str: locale.and_then(|code| locale_string(code).ok()).map(str::to_string),
            dict_input_lang: r.u32(MOBI_DICT_INPUT_LANG),
            dict_output_lang: r.u32(MOBI_DICT_OUTPUT_LANG),
            min_version: r.u32(MOBI_MIN_VERSION),
            image_index: r.u32(MOBI_IMAGE_INDEX),
            huff_rec_index: r.u32(MOBI_HUFF_REC_INDEX),
            huff_rec_count: r.u32(MOBI_HUFF_REC_COUNT),
            datp_rec_index: r.u32(MOBI_DATP_REC_INDEX),
            datp_rec_count: r.u32(MOBI_DATP_REC_COUNT),
            exth_flags: r.u32(MOBI_EXTH_FLAGS),
            drm_offset: r.u32(MOBI_DRM_OFFSET),
            drm_count: r.u32(MOBI_DRM_COUNT),
            drm_size: r.u32(MOBI_DRM_SIZE),
            drm_flags: r.u32(MOBI_DRM_FLAGS),
            fdst_index: r.u32(MOBI_FDST_INDEX),
            fdst_section_count: r.u32(MOBI_FDST_SECTION_COUNT),
            fcis_index: r.u32(MOBI_FCIS_INDEX),
            fcis_count: r.u32(MOBI_FCIS_COUNT),
            flis_index: r.u32(MOBI_FLIS_INDEX),
            flis_count: r.u32(MOBI_FLIS_COUNT),
            srcs_index: r.u32(MOBI_SRCS_INDEX),
            srcs_count: r.u32(MOBI_SRCS_COUNT),
            extra_flags: r.u16(MOBI_EXTRA_FLAGS),
            ncx_index: r.u32(MOBI_NCX_INDEX),
            fragment_index: r.u32(MOBI_FRAGMENT_INDEX),
            skeleton_index: r.u32(MOBI_SKELETON_INDEX),
            datp_index: r.u32(MOBI_DATP_INDEX),
            guide_index: r.u32(MOBI_GUIDE_INDEX),
            full_name: None,
        };
        hdr.full_name = hdr.read_full_name(data);

        debug!(
            "MOBI header: length {}, type {}, version {}, encoding {}",
            hdr.header_length, hdr.mobi_type, hdr.version, hdr.encoding
        );
        Ok(Some(hdr))
    }

    fn read_full_name(&self, data: &[u8]) -> Option<String> {
        let offset = self.full_name_offset? as usize;
        let length = self.full_name_length? as usize;
        match data.get(offset..offset.checked_add(length)?) {
            Some(bytes) => Some(self.encoding.decode(bytes)),
            None => {
                warn!(
                    "Full name ({} bytes at {}) lies outside record 0 ({} bytes)",
                    length,
                    offset,
                    data.len()
                );
                None
            }
        }
    }

    /// Returns true when exth_flags signals an EXTH header.
    pub fn has_exth(&self) -> bool {
        self.exth_flags.is_some_and(|f| f & EXTH_FLAG != 0)
    }

    /// Offset of the EXTH header within record 0.
    pub fn exth_offset(&self) -> usize {
        RECORD0_HEADER_SIZE + self.header_length as usize
    }

    /// Returns true for version 8 (KF8) headers.
    pub fn is_kf8(&self) -> bool {
        self.version >= KF8_VERSION
    }

    /// First and last content record stored in the KF7 layout of offset 192.
    pub fn content_records(&self) -> Option<(u16, u16)> {
        if self.is_kf8() {
            return None;
        }
        self.fdst_index.map(|v| ((v >> 16) as u16, (v & 0xffff) as u16))
    }

    /// Human-readable book type.
    pub fn mobi_type_name(&self) -> &'static str {
        match self.mobi_type {
            2 => "Mobipocket Book",
            3 => "PalmDoc Book",
            4 => "Audio",
            232 => "Mobipocket (kindlegen 1.2)",
            248 => "KF8 (kindlegen 2)",
            257 => "News",
            258 => "News Feed",
            259 => "News Magazine",
            513 => "PICS",
            514 => "WORD",
            515 => "XLS",
            516 => "PPT",
            517 => "TEXT",
            518 => "HTML",
            _ => "Unknown",
        }
    }
}

/// Filter the `0xFFFFFFFF` sentinel out of a record reference.
///
/// ```
/// use mobi::mobi::header::valid_index;
///
/// assert_eq!(valid_index(Some(4)), Some(4));
/// assert_eq!(valid_index(Some(0xFFFF_FFFF)), None);
/// assert_eq!(valid_index(None), None);
/// ```
pub fn valid_index(field: Option<u32>) -> Option<u32> {
    field.filter(|&v| v != MOBI_NOTSET)
}
