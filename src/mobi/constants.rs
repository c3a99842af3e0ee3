/// MOBI/KF8 container and header constants.
///
/// Offsets are byte positions within the structure they describe. Record 0
/// offsets count from the start of record 0, so the MOBI header fields
/// include the 16-byte PalmDOC header in front of them.
// Palm Database header (78 bytes + 8 bytes per directory entry)
pub const PDB_HEADER_SIZE: usize = 78;
pub const PDB_NAME: usize = 0; // 32 bytes - NUL padded database name
pub const PDB_NAME_SIZE: usize = 32;
pub const PDB_ATTRIBUTES: usize = 32; // 2 bytes
pub const PDB_VERSION: usize = 34; // 2 bytes
pub const PDB_CTIME: usize = 36; // 4 bytes - creation time
pub const PDB_MTIME: usize = 40; // 4 bytes - modification time
pub const PDB_BTIME: usize = 44; // 4 bytes - last backup time
pub const PDB_MOD_NUM: usize = 48; // 4 bytes
pub const PDB_APPINFO: usize = 52; // 4 bytes
pub const PDB_SORTINFO: usize = 56; // 4 bytes
pub const PDB_TYPE: usize = 60; // 4 bytes - "BOOK"
pub const PDB_CREATOR: usize = 64; // 4 bytes - "MOBI"
pub const PDB_UID: usize = 68; // 4 bytes - unique id seed
pub const PDB_NEXT_REC: usize = 72; // 4 bytes - next record list id
pub const PDB_REC_COUNT: usize = 76; // 2 bytes - number of records
pub const PDB_RECORD_INFO_SIZE: usize = 8;

// Seconds between 1904-01-01 (Palm epoch) and 1970-01-01.
pub const EPOCH_MAC_DIFF: i64 = 2_082_844_800;

// PalmDOC header (first 16 bytes of record 0)
pub const RECORD0_HEADER_SIZE: usize = 16;
pub const RECORD0_COMPRESSION: usize = 0; // 2 bytes
pub const RECORD0_TEXT_LENGTH: usize = 4; // 4 bytes
pub const RECORD0_TEXT_COUNT: usize = 8; // 2 bytes
pub const RECORD0_TEXT_SIZE: usize = 10; // 2 bytes
pub const RECORD0_ENCRYPTION: usize = 12; // 2 bytes
pub const RECORD0_UNKNOWN: usize = 14; // 2 bytes

pub const RECORD0_TEXT_SIZE_MAX: usize = 4096;

pub const COMPRESSION_NONE: u16 = 1;
pub const COMPRESSION_PALMDOC: u16 = 2;
pub const COMPRESSION_HUFFCDIC: u16 = 17480; // "DH"

pub const ENCRYPTION_NONE: u16 = 0;
pub const ENCRYPTION_OLD: u16 = 1;
pub const ENCRYPTION_MOBIPOCKET: u16 = 2;

// MOBI header (record 0, after the PalmDOC header)
pub const MOBI_MAGIC: usize = 16; // 4 bytes - "MOBI"
pub const MOBI_HEADER_LENGTH: usize = 20;
pub const MOBI_TYPE: usize = 24;
pub const MOBI_TEXT_ENCODING: usize = 28;
pub const MOBI_UID: usize = 32;
pub const MOBI_VERSION: usize = 36;
// Magic through version
pub const MOBI_HEADER_MIN_LENGTH: usize = 24;
pub const MOBI_ORTH_INDEX: usize = 40;
pub const MOBI_INFL_INDEX: usize = 44;
pub const MOBI_NAMES_INDEX: usize = 48;
pub const MOBI_KEYS_INDEX: usize = 52;
pub const MOBI_EXTRA0_INDEX: usize = 56; // 6 x 4 bytes
pub const MOBI_NON_TEXT_INDEX: usize = 80;
pub const MOBI_FULL_NAME_OFFSET: usize = 84;
pub const MOBI_FULL_NAME_LENGTH: usize = 88;
pub const MOBI_LOCALE: usize = 92;
pub const MOBI_DICT_INPUT_LANG: usize = 96;
pub const MOBI_DICT_OUTPUT_LANG: usize = 100;
pub const MOBI_MIN_VERSION: usize = 104;
pub const MOBI_IMAGE_INDEX: usize = 108;
pub const MOBI_HUFF_REC_INDEX: usize = 112;
pub const MOBI_HUFF_REC_COUNT: usize = 116;
pub const MOBI_DATP_REC_INDEX: usize = 120;
pub const MOBI_DATP_REC_COUNT: usize = 124;
pub const MOBI_EXTH_FLAGS: usize = 128;
pub const MOBI_DRM_OFFSET: usize = 168;
pub const MOBI_DRM_COUNT: usize = 172;
pub const MOBI_DRM_SIZE: usize = 176;
pub const MOBI_DRM_FLAGS: usize = 180;
pub const MOBI_FDST_INDEX: usize = 192; // KF8; KF7 stores first/last content (2 x u16)
pub const MOBI_FDST_SECTION_COUNT: usize = 196;
pub const MOBI_FCIS_INDEX: usize = 200;
pub const MOBI_FCIS_COUNT: usize = 204;
pub const MOBI_FLIS_INDEX: usize = 208;
pub const MOBI_FLIS_COUNT: usize = 212;
pub const MOBI_SRCS_INDEX: usize = 224;
pub const MOBI_SRCS_COUNT: usize = 228;
pub const MOBI_EXTRA_FLAGS: usize = 242; // 2 bytes
pub const MOBI_NCX_INDEX: usize = 244;
pub const MOBI_FRAGMENT_INDEX: usize = 248;
pub const MOBI_SKELETON_INDEX: usize = 252;
pub const MOBI_DATP_INDEX: usize = 256;
pub const MOBI_GUIDE_INDEX: usize = 260;

// Bit in exth_flags signalling an EXTH header after the MOBI header
pub const EXTH_FLAG: u32 = 0x40;

// EXTH header
pub const EXTH_HEADER_SIZE: usize = 12;
pub const EXTH_RECORD_HEADER_SIZE: usize = 8;

// "null" record reference
pub const MOBI_NOTSET: u32 = 0xFFFF_FFFF;

// Version that introduced KF8
pub const KF8_VERSION: u32 = 8;

// Text encodings
pub const CODEPAGE_CP1252: u32 = 1252;
pub const CODEPAGE_UTF8: u32 = 65001;

// INDX record header (all u32)
pub const INDX_HEADER_LENGTH: usize = 4;
pub const INDX_TYPE: usize = 12;
pub const INDX_IDXT_OFFSET: usize = 20;
pub const INDX_ENTRIES_COUNT: usize = 24;
pub const INDX_CODE: usize = 28;
pub const INDX_LANG: usize = 32;
pub const INDX_TOTAL: usize = 36;
pub const INDX_ORDT_OFFSET: usize = 40;
pub const INDX_LIGT_OFFSET: usize = 44;
pub const INDX_LIGT_COUNT: usize = 48;
pub const INDX_CNCX_COUNT: usize = 52;
pub const INDX_ORDT_TYPE: usize = 164; // 0xa4
pub const INDX_ORDT_ENTRIES: usize = 168;
pub const INDX_ORDT1_OFFSET: usize = 172;
pub const INDX_ORDT2_OFFSET: usize = 176;
pub const INDX_MIN_HEADER: usize = 56;

pub const TAGX_HEADER_SIZE: usize = 12;
pub const INDX_LABEL_MAX: usize = 255;

// CNCX strings are addressed by record * 0x10000 + offset
pub const CNCX_RECORD_SPAN: u32 = 0x10000;

// FONT resource header
pub const FONT_HEADER_SIZE: usize = 24;
pub const FONT_FLAG_ZLIB: u32 = 0x0001;
pub const FONT_FLAG_XOR: u32 = 0x0002;
pub const FONT_XOR_SPAN: usize = 1040;
// Upper bound used when reserving space for inflated data
pub const ZLIB_MAX_RATIO: usize = 1032;

// HUFF/CDIC
pub const HUFF_HEADER_SIZE: usize = 24;
pub const CDIC_HEADER_SIZE: usize = 16;
pub const HUFF_MAX_DEPTH: usize = 20;

// End-of-file marker record
pub const EOF_MARKER: [u8; 4] = [0xe9, 0x8e, 0x0d, 0x0a];
