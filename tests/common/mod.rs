//! Synthetic MOBI/AZW3 fixtures shared by the integration tests.
//!
//! `lorem_azw3()` reproduces the layout of a small kindlegen KF8 book: 15
//! records holding record 0, one PalmDOC text record, skeleton, fragment and
//! NCX indices, a GIF, and the FDST/FLIS/FCIS/EOF tail.
#![allow(dead_code)]

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};

use mobi::mobi::constants::*;

/// 2018-08-02 11:29:46 UTC as Unix seconds.
pub const LOREM_CTIME: u32 = 1_533_209_386;
pub const LOREM_TEXT_LENGTH: usize = 1840;
pub const LOREM_ASIN: &str = "dcc4c715-c7de-484d-a533-d4fe6e1f6453";
pub const LOREM_RECORD_COUNT: usize = 15;

pub const SKELETON_RECORD: u32 = 2;
pub const FRAGMENT_RECORD: u32 = 4;
pub const NCX_RECORD: u32 = 7;
pub const IMAGE_RECORD: u32 = 10;
pub const FDST_RECORD: u32 = 11;
pub const FLIS_RECORD: u32 = 12;
pub const FCIS_RECORD: u32 = 13;

const SKEL0: &str = "<?xml version=\"1.0\" encoding=\"utf-8\"?><html xmlns=\"http://www.w3.org/1999/xhtml\"><head><title>Lorem Ipsum</title><link href=\"kindle:flow:0001?mime=text/css\" rel=\"stylesheet\" type=\"text/css\"/></head><body aid=\"0\"></body></html>";
const SKEL1: &str = "<?xml version=\"1.0\" encoding=\"utf-8\"?><html xmlns=\"http://www.w3.org/1999/xhtml\"><head><title>Lorem Ipsum</title></head><body aid=\"2\"></body></html>";
const FRAG1: &str = "<div aid=\"3\"><h2>Dolor sit amet</h2><p>Ut enim ad minim veniam, quis nostrud exercitation ullamco laboris nisi ut aliquip ex ea commodo consequat.</p><img src=\"kindle:embed:0001?mime=image/gif\"/></div>";
pub const LOREM_CSS: &str = "p { text-indent: 1.5em; margin: 0 } h1, h2 { text-align: center; font-weight: bold }\n";
const LOREM_WORDS: &str = "Lorem ipsum dolor sit amet, consectetur adipiscing elit, sed do eiusmod tempor incididunt ut labore et dolore magna aliqua. ";

/// Smallest valid GIF (1x1, one colour).
pub const GIF_1X1: &[u8] = b"GIF89a\x01\x00\x01\x00\x80\x00\x00\x00\x00\x00\xff\xff\xff!\xf9\x04\x01\x00\x00\x00\x00,\x00\x00\x00\x00\x01\x00\x01\x00\x00\x02\x02D\x01\x00;";

// ── Generic builders ────────────────────────────────────────────────

/// Assemble a Palm Database from its records.
pub fn build_pdb(name: &str, ident: &[u8; 8], records: &[Vec<u8>]) -> Vec<u8> {
    let count = records.len();
    let mut out = vec![0u8; PDB_HEADER_SIZE];
    let name_bytes = name.as_bytes();
    out[..name_bytes.len().min(31)].copy_from_slice(&name_bytes[..name_bytes.len().min(31)]);
    BigEndian::write_u32(&mut out[PDB_CTIME..], LOREM_CTIME);
    BigEndian::write_u32(&mut out[PDB_MTIME..], LOREM_CTIME);
    out[PDB_TYPE..PDB_TYPE + 8].copy_from_slice(ident);
    BigEndian::write_u32(&mut out[PDB_UID..], (count * 2) as u32 - 1);
    BigEndian::write_u16(&mut out[PDB_REC_COUNT..], count as u16);

    // Directory, then the customary two-byte gap
    let mut offset = PDB_HEADER_SIZE + count * PDB_RECORD_INFO_SIZE + 2;
    for (i, rec) in records.iter().enumerate() {
        out.write_u32::<BigEndian>(offset as u32).unwrap();
        out.write_u32::<BigEndian>((i * 2) as u32).unwrap(); // attributes 0, uid
        offset += rec.len();
    }
    out.extend_from_slice(&[0, 0]);
    for rec in records {
        out.extend_from_slice(rec);
    }
    out
}

/// Forward-encoded varint as used inside index entries and CNCX records.
pub fn varint(value: u32) -> Vec<u8> {
    let mut groups = vec![(value & 0x7f) as u8 | 0x80];
    let mut v = value >> 7;
    while v > 0 {
        groups.push((v & 0x7f) as u8);
        v >>= 7;
    }
    groups.reverse();
    groups
}

/// Greedy PalmDOC LZ77 compressor.
pub fn palmdoc_compress(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    let mut pos = 0;
    while pos < input.len() {
        // Longest back-reference of 3..=10 bytes within 2047 bytes
        let mut best = (0usize, 0usize);
        let window = pos.saturating_sub(2047);
        for start in window..pos {
            let mut len = 0;
            while len < 10 && pos + len < input.len() && input[start + len] == input[pos + len] {
                len += 1;
            }
            if len > best.1 {
                best = (pos - start, len);
            }
        }
        if best.1 >= 3 {
            let pair = 0x8000u16 | ((best.0 as u16) << 3) | (best.1 as u16 - 3);
            out.write_u16::<BigEndian>(pair).unwrap();
            pos += best.1;
            continue;
        }

        let c = input[pos];
        if c == b' ' && pos + 1 < input.len() && (0x40..0x80).contains(&input[pos + 1]) {
            out.push(input[pos + 1] ^ 0x80);
            pos += 2;
        } else if c == 0 || (0x09..0x80).contains(&c) {
            out.push(c);
            pos += 1;
        } else {
            let n = input[pos..]
                .iter()
                .take(8)
                .take_while(|&&b| !(b == 0 || (0x09..0x80).contains(&b)))
                .count();
            out.push(n as u8);
            out.extend_from_slice(&input[pos..pos + n]);
            pos += n;
        }
    }
    out
}

/// Index header with the fields the reader consults.
pub fn indx_header(count: u32, total: u32, cncx: u32) -> Vec<u8> {
    let mut d = vec![0u8; 192];
    d[..4].copy_from_slice(b"INDX");
    BigEndian::write_u32(&mut d[INDX_HEADER_LENGTH..], 192);
    BigEndian::write_u32(&mut d[INDX_ENTRIES_COUNT..], count);
    BigEndian::write_u32(&mut d[INDX_CODE..], 65001);
    BigEndian::write_u32(&mut d[INDX_LANG..], 9);
    BigEndian::write_u32(&mut d[INDX_TOTAL..], total);
    BigEndian::write_u32(&mut d[INDX_CNCX_COUNT..], cncx);
    d
}

/// Main record + one entry record (+ CNCX record) of an index.
///
/// `tagx` rows are (tag, values per entry, mask, end flag); one control
/// byte. `entries` are (label, control byte, tag values in TAGX order).
pub fn build_index(
    tagx: &[[u8; 4]],
    entries: &[(String, u8, Vec<u32>)],
    cncx: Option<Vec<u8>>,
) -> Vec<Vec<u8>> {
    let mut main = indx_header(1, entries.len() as u32, cncx.is_some() as u32);
    main.extend_from_slice(b"TAGX");
    main.write_u32::<BigEndian>(12 + 4 * tagx.len() as u32).unwrap();
    main.write_u32::<BigEndian>(1).unwrap();
    for row in tagx {
        main.extend_from_slice(row);
    }

    let mut body = indx_header(entries.len() as u32, 0, 0);
    let mut positions = Vec::new();
    for (label, control, values) in entries {
        positions.push(body.len() as u16);
        body.push(label.len() as u8);
        body.extend_from_slice(label.as_bytes());
        body.push(*control);
        for v in values {
            body.extend(varint(*v));
        }
    }
    let idxt = body.len() as u32;
    BigEndian::write_u32(&mut body[INDX_IDXT_OFFSET..], idxt);
    body.extend_from_slice(b"IDXT");
    for p in positions {
        body.write_u16::<BigEndian>(p).unwrap();
    }

    let mut out = vec![main, body];
    if let Some(c) = cncx {
        out.push(c);
    }
    out
}

/// Append a CNCX string and return its offset.
pub fn push_cncx(cncx: &mut Vec<u8>, s: &str) -> u32 {
    let off = cncx.len() as u32;
    cncx.extend(varint(s.len() as u32));
    cncx.extend_from_slice(s.as_bytes());
    off
}

/// Record 0 layout knobs.
#[derive(Clone)]
pub struct Record0 {
    pub compression: u16,
    pub text_length: u32,
    pub text_record_count: u16,
    pub encryption: u16,
    pub version: u32,
    pub encoding: u32,
    pub locale: u32,
    pub image_index: u32,
    pub fdst_index: u32,
    pub fdst_count: u32,
    pub flis_index: u32,
    pub fcis_index: u32,
    pub extra_flags: u16,
    pub ncx_index: u32,
    pub fragment_index: u32,
    pub skeleton_index: u32,
    pub orth_index: u32,
    pub huff_rec_index: u32,
    pub huff_rec_count: u32,
    pub exth: Vec<(u32, Vec<u8>)>,
    pub full_name: String,
}

impl Record0 {
    pub fn lorem() -> Self {
        Record0 {
            compression: COMPRESSION_PALMDOC,
            text_length: LOREM_TEXT_LENGTH as u32,
            text_record_count: 1,
            encryption: 0,
            version: 8,
            encoding: 65001,
            locale: 9,
            image_index: IMAGE_RECORD,
            fdst_index: FDST_RECORD,
            fdst_count: 2,
            flis_index: FLIS_RECORD,
            fcis_index: FCIS_RECORD,
            extra_flags: 3,
            ncx_index: NCX_RECORD,
            fragment_index: FRAGMENT_RECORD,
            skeleton_index: SKELETON_RECORD,
            orth_index: MOBI_NOTSET,
            huff_rec_index: 0,
            huff_rec_count: 0,
            exth: vec![
                (100, b"Lorem Author".to_vec()),
                (113, LOREM_ASIN.as_bytes().to_vec()),
                (503, b"Lorem Ipsum".to_vec()),
                (125, 1u32.to_be_bytes().to_vec()),
            ],
            full_name: "Lorem Ipsum".to_string(),
        }
    }

    pub fn build(&self) -> Vec<u8> {
        let header_length = 264usize;
        let mut d = vec![0u8; RECORD0_HEADER_SIZE + header_length];
        BigEndian::write_u16(&mut d[RECORD0_COMPRESSION..], self.compression);
        BigEndian::write_u32(&mut d[RECORD0_TEXT_LENGTH..], self.text_length);
        BigEndian::write_u16(&mut d[RECORD0_TEXT_COUNT..], self.text_record_count);
        BigEndian::write_u16(&mut d[RECORD0_TEXT_SIZE..], 4096);
        BigEndian::write_u16(&mut d[RECORD0_ENCRYPTION..], self.encryption);

        d[MOBI_MAGIC..MOBI_MAGIC + 4].copy_from_slice(b"MOBI");
        let put = |d: &mut Vec<u8>, off: usize, v: u32| BigEndian::write_u32(&mut d[off..], v);
        put(&mut d, MOBI_HEADER_LENGTH, header_length as u32);
        put(&mut d, MOBI_TYPE, 2);
        put(&mut d, MOBI_TEXT_ENCODING, self.encoding);
        put(&mut d, MOBI_UID, 0x2d1c_8e4b);
        put(&mut d, MOBI_VERSION, self.version);
        for off in (MOBI_ORTH_INDEX..MOBI_NON_TEXT_INDEX).step_by(4) {
            put(&mut d, off, MOBI_NOTSET);
        }
        put(&mut d, MOBI_ORTH_INDEX, self.orth_index);
        put(&mut d, MOBI_NON_TEXT_INDEX, self.text_record_count as u32 + 1);
        put(&mut d, MOBI_LOCALE, self.locale);
        put(&mut d, MOBI_MIN_VERSION, self.version);
        put(&mut d, MOBI_IMAGE_INDEX, self.image_index);
        put(&mut d, MOBI_HUFF_REC_INDEX, self.huff_rec_index);
        put(&mut d, MOBI_HUFF_REC_COUNT, self.huff_rec_count);
        put(&mut d, MOBI_EXTH_FLAGS, if self.exth.is_empty() { 0 } else { 0x50 });
        put(&mut d, MOBI_DRM_OFFSET, MOBI_NOTSET);
        put(&mut d, MOBI_FDST_INDEX, self.fdst_index);
        put(&mut d, MOBI_FDST_SECTION_COUNT, self.fdst_count);
        put(&mut d, MOBI_FCIS_INDEX, self.fcis_index);
        put(&mut d, MOBI_FCIS_COUNT, 1);
        put(&mut d, MOBI_FLIS_INDEX, self.flis_index);
        put(&mut d, MOBI_FLIS_COUNT, 1);
        put(&mut d, MOBI_SRCS_INDEX, MOBI_NOTSET);
        BigEndian::write_u16(&mut d[MOBI_EXTRA_FLAGS..], self.extra_flags);
        put(&mut d, MOBI_NCX_INDEX, self.ncx_index);
        put(&mut d, MOBI_FRAGMENT_INDEX, self.fragment_index);
        put(&mut d, MOBI_SKELETON_INDEX, self.skeleton_index);
        put(&mut d, MOBI_DATP_INDEX, MOBI_NOTSET);
        put(&mut d, MOBI_GUIDE_INDEX, MOBI_NOTSET);

        if !self.exth.is_empty() {
            let mut exth = Vec::new();
            for (tag, value) in &self.exth {
                exth.write_u32::<BigEndian>(*tag).unwrap();
                exth.write_u32::<BigEndian>(value.len() as u32 + 8).unwrap();
                exth.extend_from_slice(value);
            }
            let length = exth.len() as u32 + 12;
            d.extend_from_slice(b"EXTH");
            d.write_u32::<BigEndian>(length).unwrap();
            d.write_u32::<BigEndian>(self.exth.len() as u32).unwrap();
            d.extend_from_slice(&exth);
            while d.len() % 4 != 0 {
                d.push(0);
            }
        }

        let name_offset = d.len() as u32;
        put(&mut d, MOBI_FULL_NAME_OFFSET, name_offset);
        put(&mut d, MOBI_FULL_NAME_LENGTH, self.full_name.len() as u32);
        d.extend_from_slice(self.full_name.as_bytes());
        d.extend_from_slice(&[0, 0]);
        while d.len() % 4 != 0 {
            d.push(0);
        }
        d
    }
}

/// Text record payload followed by the trailing entries of `extra_flags`
/// 3: a multibyte byte and a two-byte TBS entry.
pub fn with_trailing_entries(payload: Vec<u8>) -> Vec<u8> {
    let mut rec = payload;
    rec.push(0x00);
    rec.extend_from_slice(&[0x00, 0x82]);
    rec
}

// ── The lorem book ──────────────────────────────────────────────────

/// Flow 0 pieces: (skeleton, fragment) per file.
pub fn lorem_files() -> Vec<(String, String)> {
    let fixed = SKEL0.len() + SKEL1.len() + FRAG1.len() + LOREM_CSS.len();
    let open = "<div aid=\"1\"><h1>Lorem Ipsum</h1><p>";
    let close = "</p></div>";
    let filler_len = LOREM_TEXT_LENGTH - fixed - open.len() - close.len();
    let filler: String = LOREM_WORDS.repeat(filler_len / LOREM_WORDS.len() + 1)[..filler_len].to_string();
    let frag0 = format!("{}{}{}", open, filler, close);
    vec![
        (SKEL0.to_string(), frag0),
        (SKEL1.to_string(), FRAG1.to_string()),
    ]
}

/// The expected reconstructed HTML files.
pub fn lorem_html() -> Vec<String> {
    lorem_files()
        .into_iter()
        .map(|(skel, frag)| {
            let at = skel.find("</body>").unwrap();
            format!("{}{}{}", &skel[..at], frag, &skel[at..])
        })
        .collect()
}

/// Flow 0 as stored: each skeleton followed by its fragment.
pub fn lorem_flow0() -> String {
    lorem_files()
        .into_iter()
        .map(|(skel, frag)| skel + &frag)
        .collect()
}

/// The complete decompressed text (flow 0 then the CSS flow).
pub fn lorem_text() -> Vec<u8> {
    let text = lorem_flow0() + LOREM_CSS;
    assert_eq!(text.len(), LOREM_TEXT_LENGTH);
    text.into_bytes()
}

fn skeleton_index() -> Vec<Vec<u8>> {
    let tagx = [[1, 1, 0x03, 0], [6, 2, 0x0c, 0], [0, 0, 0, 1]];
    let mut entries = Vec::new();
    let mut pos = 0u32;
    for (i, (skel, frag)) in lorem_files().iter().enumerate() {
        entries.push((
            format!("SKEL{:010}", i),
            0x05,
            vec![1, pos, skel.len() as u32],
        ));
        pos += (skel.len() + frag.len()) as u32;
    }
    build_index(&tagx, &entries, None)
}

fn fragment_index() -> Vec<Vec<u8>> {
    let tagx = [
        [2, 1, 0x01, 0],
        [3, 1, 0x02, 0],
        [4, 1, 0x04, 0],
        [6, 2, 0x08, 0],
        [0, 0, 0, 1],
    ];
    let mut cncx = Vec::new();
    let mut entries = Vec::new();
    let mut pos = 0u32;
    for (i, (skel, frag)) in lorem_files().iter().enumerate() {
        let insert = pos + skel.find("</body>").unwrap() as u32;
        let selector = push_cncx(&mut cncx, &format!("P-//*[@aid='{}']", i * 2));
        let start = pos + skel.len() as u32;
        entries.push((
            format!("{:010}", insert),
            0x0f,
            vec![selector, i as u32, i as u32, start, frag.len() as u32],
        ));
        pos += (skel.len() + frag.len()) as u32;
    }
    build_index(&tagx, &entries, Some(cncx))
}

fn ncx_index() -> Vec<Vec<u8>> {
    let tagx = [
        [1, 1, 0x01, 0],
        [2, 1, 0x02, 0],
        [3, 1, 0x04, 0],
        [4, 1, 0x08, 0],
        [6, 2, 0x10, 0],
        [0, 0, 0, 1],
    ];
    let files = lorem_files();
    let second = (files[0].0.len() + files[0].1.len()) as u32;
    let mut cncx = Vec::new();
    let t0 = push_cncx(&mut cncx, "Lorem Ipsum");
    let t1 = push_cncx(&mut cncx, "Dolor sit amet");
    let entries = vec![
        ("0".to_string(), 0x1f, vec![0, second, t0, 0, 0, 0]),
        (
            "1".to_string(),
            0x1f,
            vec![second, LOREM_TEXT_LENGTH as u32 - second, t1, 0, 1, 0],
        ),
    ];
    build_index(&tagx, &entries, Some(cncx))
}

fn fdst_record(flow0_len: u32, total: u32) -> Vec<u8> {
    let mut d = b"FDST".to_vec();
    d.write_u32::<BigEndian>(12).unwrap();
    d.write_u32::<BigEndian>(2).unwrap();
    for v in [0, flow0_len, flow0_len, total] {
        d.write_u32::<BigEndian>(v).unwrap();
    }
    d
}

fn flis_record() -> Vec<u8> {
    let mut d = b"FLIS".to_vec();
    for v in [8u32, 0x0041_0000, 0, 0xffff_ffff, 0x0001_0003, 3, 1, 0xffff_ffff] {
        d.write_u32::<BigEndian>(v).unwrap();
    }
    d
}

fn fcis_record(text_length: u32) -> Vec<u8> {
    let mut d = b"FCIS".to_vec();
    for v in [0x14u32, 0x10, 2, 0, text_length, 0, 0x28, 0, 0x28, 8] {
        d.write_u32::<BigEndian>(v).unwrap();
    }
    d.extend_from_slice(&[0, 1, 0, 1, 0, 0, 0, 0]);
    d
}

/// The 15 records of the lorem book, starting from the given record 0.
pub fn lorem_records(rec0: &Record0) -> Vec<Vec<u8>> {
    let text = lorem_text();
    let flow0_len = lorem_flow0().len() as u32;

    let mut records = vec![rec0.build()];
    records.push(with_trailing_entries(palmdoc_compress(&text)));
    records.extend(skeleton_index()); // 2, 3
    records.extend(fragment_index()); // 4, 5, 6
    records.extend(ncx_index()); // 7, 8, 9
    records.push(GIF_1X1.to_vec()); // 10
    records.push(fdst_record(flow0_len, LOREM_TEXT_LENGTH as u32)); // 11
    records.push(flis_record()); // 12
    records.push(fcis_record(LOREM_TEXT_LENGTH as u32)); // 13
    records.push(EOF_MARKER.to_vec()); // 14
    assert_eq!(records.len(), LOREM_RECORD_COUNT);
    records
}

/// The lorem book as an AZW3 file.
pub fn lorem_azw3() -> Vec<u8> {
    build_pdb("test", b"BOOKMOBI", &lorem_records(&Record0::lorem()))
}

/// A hybrid file: a KF7 part (record 0, one text record), the BOUNDARY
/// record, then the lorem KF8 part.
pub fn hybrid_mobi() -> Vec<u8> {
    hybrid_of(lorem_records(&Record0::lorem()))
}

/// A hybrid file whose KF8 part is `kf8_records`, preceded by a small KF7
/// part and the BOUNDARY record.
pub fn hybrid_of(kf8_records: Vec<Vec<u8>>) -> Vec<u8> {
    let kf7_text = b"<html><body><p>Lorem ipsum, legacy edition.</p></body></html>".to_vec();
    let kf8_start = 3u32;
    let kf7 = Record0 {
        text_length: kf7_text.len() as u32,
        version: 6,
        image_index: MOBI_NOTSET,
        fdst_index: 0x0001_0001,
        fdst_count: 1,
        flis_index: MOBI_NOTSET,
        fcis_index: MOBI_NOTSET,
        ncx_index: MOBI_NOTSET,
        fragment_index: MOBI_NOTSET,
        skeleton_index: MOBI_NOTSET,
        exth: vec![
            (100, b"Lorem Author".to_vec()),
            (121, kf8_start.to_be_bytes().to_vec()),
        ],
        full_name: "Lorem Ipsum (KF7)".to_string(),
        ..Record0::lorem()
    };

    let mut records = vec![kf7.build(), with_trailing_entries(palmdoc_compress(&kf7_text))];
    records.push(b"BOUNDARY".to_vec());
    records.extend(kf8_records);
    build_pdb("test", b"BOOKMOBI", &records)
}

/// The lorem book with one byte of the MOBI magic damaged.
pub fn bad_magic_azw3() -> Vec<u8> {
    let mut records = lorem_records(&Record0::lorem());
    records[0][MOBI_MAGIC + 3] = b'X';
    build_pdb("test", b"BOOKMOBI", &records)
}

/// A plain PalmDOC database: 16-byte record 0 and uncompressed text.
pub fn palmdoc_pdb(text: &[u8]) -> Vec<u8> {
    let mut rec0 = vec![0u8; RECORD0_HEADER_SIZE];
    BigEndian::write_u16(&mut rec0[RECORD0_COMPRESSION..], COMPRESSION_NONE);
    BigEndian::write_u32(&mut rec0[RECORD0_TEXT_LENGTH..], text.len() as u32);
    BigEndian::write_u16(&mut rec0[RECORD0_TEXT_COUNT..], 1);
    BigEndian::write_u16(&mut rec0[RECORD0_TEXT_SIZE..], 4096);
    build_pdb("palmdoc", b"TEXtREAd", &[rec0, text.to_vec()])
}

/// Write `data` to a temporary file.
pub fn write_temp(data: &[u8]) -> tempfile::NamedTempFile {
    use std::io::Write;
    let mut tmp = tempfile::NamedTempFile::new().unwrap();
    tmp.write_all(data).unwrap();
    tmp.flush().unwrap();
    tmp
}

// ── HUFF/CDIC ───────────────────────────────────────────────────────
//
// Phrases 0..=127 are the ASCII bytes, coded as 8-bit terminal codes
// 0x80 + n. Longer phrases are coded in 16 bits as 0x7fff - n, reached
// through non-terminal prefixes 0x00..=0x7f whose search starts at
// length 9. Each CDIC record holds 128 phrases.

const HUFF_WORDS: [&str; 8] = [
    "Lorem ", "ipsum ", "dolor ", "sit ", "amet, ", "consectetur ", "adipiscing ", "elit. ",
];
const CDIC_BITS: u32 = 7;

/// Text of the HUFF/CDIC book; spans two text records.
pub fn huff_text() -> Vec<u8> {
    let sentence = "Lorem ipsum dolor sit amet, consectetur adipiscing elit. ";
    format!("<html><body><p>{}</p></body></html>", sentence.repeat(6)).into_bytes()
}

fn huff_code(phrase: usize) -> (u32, u32) {
    if phrase < 0x80 {
        (0x80 + phrase as u32, 8)
    } else {
        (0x7fff - phrase as u32, 16)
    }
}

/// Pack phrase numbers into a bit stream, zero-padded to a byte.
pub fn huff_pack(phrases: &[usize]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut acc: u64 = 0;
    let mut nbits = 0u32;
    for &p in phrases {
        let (code, len) = huff_code(p);
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

/// The phrase dictionary: bytes, words, then one packed phrase
/// ("Lorem ipsum ") that expands through the first two words.
fn huff_phrases() -> Vec<(Vec<u8>, bool)> {
    let mut phrases: Vec<(Vec<u8>, bool)> = (0u8..0x80).map(|b| (vec![b], true)).collect();
    phrases.extend(HUFF_WORDS.iter().map(|w| (w.as_bytes().to_vec(), true)));
    phrases.push((huff_pack(&[0x80, 0x81]), false));
    phrases
}

/// Compress `text` (ASCII only) with the fixture dictionary.
pub fn huff_compress(text: &[u8]) -> Vec<u8> {
    let packed = 0x80 + HUFF_WORDS.len();
    let mut words: Vec<(Vec<u8>, usize)> = vec![(b"Lorem ipsum ".to_vec(), packed)];
    words.extend(
        HUFF_WORDS
            .iter()
            .enumerate()
            .map(|(i, w)| (w.as_bytes().to_vec(), 0x80 + i)),
    );

    let mut codes = Vec::new();
    let mut pos = 0;
    while pos < text.len() {
        match words.iter().find(|(w, _)| text[pos..].starts_with(w)) {
            Some((w, p)) => {
                codes.push(*p);
                pos += w.len();
            }
            None => {
                assert!(text[pos] < 0x80, "fixture text must be ASCII");
                codes.push(text[pos] as usize);
                pos += 1;
            }
        }
    }
    huff_pack(&codes)
}

/// HUFF record for the fixture code.
pub fn huff_record() -> Vec<u8> {
    let mut d = b"HUFF\x00\x00\x00\x18".to_vec();
    d.write_u32::<BigEndian>(24).unwrap();
    d.write_u32::<BigEndian>(24 + 256 * 4).unwrap();
    d.extend_from_slice(&[0u8; 8]);
    for b in 0u32..256 {
        let entry = if b >= 0x80 {
            // terminal, 8 bits; max code value b + (b - 0x80)
            ((2 * b - 0x80) << 8) | 0x80 | 8
        } else {
            9
        };
        d.write_u32::<BigEndian>(entry).unwrap();
    }
    for len in 1u32..=32 {
        let (min, max) = match len {
            9..=15 => ((1u32 << len) - 1, 0),
            16 => (0, 0x7fff),
            _ => (0, 0),
        };
        d.write_u32::<BigEndian>(min).unwrap();
        d.write_u32::<BigEndian>(max).unwrap();
    }
    d
}

/// CDIC records holding `phrases`, 128 per record.
pub fn cdic_records(phrases: &[(Vec<u8>, bool)]) -> Vec<Vec<u8>> {
    phrases
        .chunks(1 << CDIC_BITS)
        .map(|chunk| {
            let mut d = b"CDIC\x00\x00\x00\x10".to_vec();
            d.write_u32::<BigEndian>(phrases.len() as u32).unwrap();
            d.write_u32::<BigEndian>(CDIC_BITS).unwrap();
            let mut body = Vec::new();
            for (data, literal) in chunk {
                d.write_u16::<BigEndian>((chunk.len() * 2 + body.len()) as u16)
                    .unwrap();
                let flag = if *literal { 0x8000 } else { 0 };
                body.write_u16::<BigEndian>(data.len() as u16 | flag).unwrap();
                body.extend_from_slice(data);
            }
            d.extend_from_slice(&body);
            d
        })
        .collect()
}

/// A book part compressed with HUFF/CDIC: record 0, two text records, the
/// HUFF record, two CDIC records and the EOF marker.
pub fn huff_records(version: u32) -> Vec<Vec<u8>> {
    let text = huff_text();
    let cdics = cdic_records(&huff_phrases());
    let rec0 = Record0 {
        compression: COMPRESSION_HUFFCDIC,
        text_length: text.len() as u32,
        text_record_count: 2,
        version,
        image_index: MOBI_NOTSET,
        fdst_index: MOBI_NOTSET,
        fdst_count: 1,
        flis_index: MOBI_NOTSET,
        fcis_index: MOBI_NOTSET,
        ncx_index: MOBI_NOTSET,
        fragment_index: MOBI_NOTSET,
        skeleton_index: MOBI_NOTSET,
        huff_rec_index: 3,
        huff_rec_count: 1 + cdics.len() as u32,
        full_name: "Lorem Ipsum (HUFF)".to_string(),
        ..Record0::lorem()
    };

    let (first, second) = text.split_at(text.len() / 2);
    let mut records = vec![rec0.build()];
    records.push(with_trailing_entries(huff_compress(first)));
    records.push(with_trailing_entries(huff_compress(second)));
    records.push(huff_record());
    records.extend(cdics);
    records.push(EOF_MARKER.to_vec());
    records
}

/// A KF7 book compressed with HUFF/CDIC.
pub fn huff_mobi() -> Vec<u8> {
    build_pdb("huff", b"BOOKMOBI", &huff_records(6))
}
