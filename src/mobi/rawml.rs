//! RAWML assembly: text extraction and KF8 part reconstruction.
//!
//! The text records of a book part are stripped of trailing entries,
//! decompressed and concatenated into one markup stream (the RAWML text).
//! KF8 parts split that stream into flows through the FDST record; flow 0
//! holds the HTML, which the skeleton and fragment indices rebuild into
//! individual files. Records from `image_index` on carry the resources
//! (images, fonts, media).

use byteorder::{BigEndian, ByteOrder};
use log::{debug, warn};
use serde::Serialize;
use std::fmt;

use crate::mobi::compression::{decode_font, palmdoc_decompress};
use crate::mobi::constants::RECORD0_TEXT_SIZE_MAX;
use crate::mobi::header::{valid_index, Compression, MobiHeader, Record0Header};
use crate::mobi::huffcdic::HuffCdic;
use crate::mobi::index::{FragmentEntry, Index, SkeletonEntry};
use crate::mobi::record::{strip_trailing_entries, Record};
use crate::MobiError;

/// Content type of a RAWML part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Html,
    Css,
    Svg,
    Opf,
    Ncx,
    Jpg,
    Gif,
    Png,
    Bmp,
    Ttf,
    Otf,
    Font,
    Mp3,
    Audio,
    Mpg4,
    Video,
    Pdf,
    Break,
    Unknown,
}

impl FileType {
    /// File extension, also used as the display name.
    pub fn extension(self) -> &'static str {
        match self {
            FileType::Html => "html",
            FileType::Css => "css",
            FileType::Svg => "svg",
            FileType::Opf => "opf",
            FileType::Ncx => "ncx",
            FileType::Jpg => "jpg",
            FileType::Gif => "gif",
            FileType::Png => "png",
            FileType::Bmp => "bmp",
            FileType::Ttf => "ttf",
            FileType::Otf => "otf",
            FileType::Font => "font",
            FileType::Mp3 => "mp3",
            FileType::Audio => "audio",
            FileType::Mpg4 => "mpg4",
            FileType::Video => "video",
            FileType::Pdf => "pdf",
            FileType::Break => "break",
            FileType::Unknown => "bin",
        }
    }

    /// Type a resource record by its leading bytes.
    pub fn from_magic(data: &[u8]) -> Self {
        if data.starts_with(&[0xff, 0xd8, 0xff]) {
            FileType::Jpg
        } else if data.starts_with(b"GIF8") {
            FileType::Gif
        } else if data.starts_with(b"\x89PNG") {
            FileType::Png
        } else if data.starts_with(b"BM") && data.len() >= 6 {
            FileType::Bmp
        } else if data.starts_with(b"FONT") {
            FileType::Font
        } else if data.starts_with(b"AUDI") {
            FileType::Audio
        } else if data.starts_with(b"VIDE") {
            FileType::Video
        } else if data.starts_with(b"%PDF") {
            FileType::Pdf
        } else {
            FileType::Unknown
        }
    }

    /// Type a non-HTML flow by content: SVG images or CSS.
    pub fn sniff_flow(data: &[u8]) -> Self {
        if data.starts_with(b"<svg") {
            return FileType::Svg;
        }
        if data.starts_with(b"<?xml") {
            let head = &data[..data.len().min(1024)];
            if head.windows(4).any(|w| w == b"<svg") {
                return FileType::Svg;
            }
        }
        FileType::Css
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// One typed piece of the RAWML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawmlPart {
    pub uid: usize,
    pub file_type: FileType,
    #[serde(skip)]
    pub data: Vec<u8>,
}

impl RawmlPart {
    pub fn new(uid: usize, file_type: FileType, data: Vec<u8>) -> Self {
        RawmlPart {
            uid,
            file_type,
            data,
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// File name used when extracting, e.g. `part00003.html`.
    pub fn file_name(&self, prefix: &str) -> String {
        format!("{}{:05}.{}", prefix, self.uid, self.file_type.extension())
    }
}

/// The FDST flow table of a KF8 part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fdst {
    pub sections: Vec<(u32, u32)>,
}

impl Fdst {
    pub fn parse(data: &[u8]) -> Result<Self, MobiError> {
        if data.len() < 12 || &data[..4] != b"FDST" {
            return Err(MobiError::Format("Missing FDST record header".to_string()));
        }
        let start = BigEndian::read_u32(&data[4..]) as usize;
        let count = BigEndian::read_u32(&data[8..]) as usize;
        let table = data.get(start..start + count * 8).ok_or_else(|| {
            MobiError::Format(format!(
                "FDST table of {} sections at {} runs past record ({} bytes)",
                count,
                start,
                data.len()
            ))
        })?;
        let sections = table
            .chunks_exact(8)
            .map(|c| (BigEndian::read_u32(c), BigEndian::read_u32(&c[4..])))
            .collect();
        Ok(Fdst { sections })
    }
}

/// Decompressed and reconstructed book content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rawml {
    /// The complete decompressed text.
    #[serde(skip)]
    pub text: Vec<u8>,
    /// Flow table, when the part has an FDST record.
    pub fdst: Option<Fdst>,
    /// Flows; flow 0 is the HTML stream.
    pub flows: Vec<RawmlPart>,
    /// HTML files: one per skeleton for KF8, a single one otherwise.
    pub markup: Vec<RawmlPart>,
    /// Images, fonts and media.
    pub resources: Vec<RawmlPart>,
}

impl Rawml {
    pub fn text(&self) -> &[u8] {
        &self.text
    }

    /// Length of the decompressed text.
    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn markup(&self) -> &[RawmlPart] {
        &self.markup
    }

    pub fn flows(&self) -> &[RawmlPart] {
        &self.flows
    }

    pub fn resources(&self) -> &[RawmlPart] {
        &self.resources
    }

    /// All parts: markup, flows after the first, then resources.
    pub fn parts(&self) -> impl Iterator<Item = &RawmlPart> {
        self.markup
            .iter()
            .chain(self.flows.iter().skip(1))
            .chain(self.resources.iter())
    }
}

/// Everything the assembler needs from one book part.
#[derive(Debug, Clone, Copy)]
pub struct RawmlSource<'a> {
    /// The part's records; index 0 is its record 0.
    pub records: &'a [Record],
    pub record0: &'a Record0Header,
    pub mobi: Option<&'a MobiHeader>,
    pub skeleton: Option<&'a Index>,
    pub fragments: Option<&'a Index>,
    /// Accepted shortfall of the text below `text_length`.
    pub tolerance: usize,
}

impl RawmlSource<'_> {
    /// Decompress, split and type the part's content.
    pub fn assemble(&self) -> Result<Rawml, MobiError> {
        let text = self.extract_text()?;
        let fdst = self.read_fdst()?;

        let mut flows = Vec::new();
        match &fdst {
            Some(table) => {
                for (i, &(start, end)) in table.sections.iter().enumerate() {
                    // The last flow may end past a text that fell short of text_length
                    let (start, end) = (start as usize, (end as usize).min(text.len()));
                    let data = text.get(start..end).ok_or_else(|| {
                        MobiError::Format(format!(
                            "FDST flow {} ({}..{}) outside text of {} bytes",
                            i,
                            start,
                            end,
                            text.len()
                        ))
                    })?;
                    let file_type = if i == 0 {
                        FileType::Html
                    } else {
                        FileType::sniff_flow(data)
                    };
                    flows.push(RawmlPart::new(i, file_type, data.to_vec()));
                }
            }
            None => flows.push(RawmlPart::new(0, FileType::Html, text.clone())),
        }

        let markup = match (self.skeleton, self.fragments) {
            (Some(skel), Some(frag)) => {
                let flow0 = flows.first().map(|f| f.data.as_slice()).unwrap_or(&[]);
                rebuild_files(flow0, &skel.skeletons()?, &frag.fragments()?)?
            }
            _ => {
                let flow0 = flows.first().map(|f| f.data.clone()).unwrap_or_default();
                vec![RawmlPart::new(0, FileType::Html, flow0)]
            }
        };

        let resources = self.collect_resources();
        debug!(
            "RAWML: {} bytes, {} flows, {} markup parts, {} resources",
            text.len(),
            flows.len(),
            markup.len(),
            resources.len()
        );
        Ok(Rawml {
            text,
            fdst,
            flows,
            markup,
            resources,
        })
    }

    fn extract_text(&self) -> Result<Vec<u8>, MobiError> {
        let rec0 = self.record0;
        if rec0.is_encrypted() {
            return Err(MobiError::Format(format!(
                "Text records are encrypted ({})",
                rec0.encryption
            )));
        }
        let count = rec0.text_record_count as usize;
        if count >= self.records.len() {
            return Err(MobiError::Format(format!(
                "Text record count {} exceeds {} records in part",
                count,
                self.records.len()
            )));
        }
        let extra_flags = self.mobi.and_then(|m| m.extra_flags).unwrap_or(0);

        let mut decoder = match rec0.compression {
            Compression::None => TextDecoder::Copy,
            Compression::PalmDoc => TextDecoder::PalmDoc,
            Compression::HuffCdic => TextDecoder::Huff(Box::new(self.load_huffcdic()?)),
        };

        // The declared length comes from the file; cap the reservation
        let mut text =
            Vec::with_capacity((rec0.text_length as usize).min(count * RECORD0_TEXT_SIZE_MAX));
        for rec in &self.records[1..=count] {
            let payload = strip_trailing_entries(&rec.data, extra_flags).map_err(|e| {
                MobiError::Format(format!("Text record {}: {}", rec.index, e))
            })?;
            match &mut decoder {
                TextDecoder::Copy => text.extend_from_slice(payload),
                TextDecoder::PalmDoc => text.extend(palmdoc_decompress(payload).map_err(|e| {
                    MobiError::Decompression(format!("Text record {}: {}", rec.index, e))
                })?),
                TextDecoder::Huff(h) => text.extend(h.decompress(payload)?),
            }
        }

        let expected = rec0.text_length as usize;
        if text.len() > expected {
            debug!("Truncating text from {} to {} bytes", text.len(), expected);
            text.truncate(expected);
        } else if text.len() < expected {
            let gap = expected - text.len();
            if gap > self.tolerance {
                return Err(MobiError::Format(format!(
                    "Decompressed text is {} bytes, header declares {}",
                    text.len(),
                    expected
                )));
            }
            warn!(
                "Decompressed text is {} bytes short of declared length {}",
                gap, expected
            );
        }
        Ok(text)
    }

    fn load_huffcdic(&self) -> Result<HuffCdic, MobiError> {
        let mobi = self.mobi.ok_or_else(|| {
            MobiError::Format("HUFF/CDIC compression without MOBI header".to_string())
        })?;
        let first = valid_index(mobi.huff_rec_index).ok_or_else(|| {
            MobiError::Format("HUFF/CDIC compression without HUFF record index".to_string())
        })? as usize;
        let count = mobi.huff_rec_count.unwrap_or(0) as usize;
        let recs = self.records.get(first..first + count.max(1)).ok_or_else(|| {
            MobiError::Format(format!(
                "HUFF/CDIC records {}..{} outside part ({} records)",
                first,
                first + count,
                self.records.len()
            ))
        })?;
        let cdics: Vec<&[u8]> = recs[1..].iter().map(|r| r.data.as_slice()).collect();
        HuffCdic::new(&recs[0].data, &cdics)
    }

    fn read_fdst(&self) -> Result<Option<Fdst>, MobiError> {
        let Some(mobi) = self.mobi else {
            return Ok(None);
        };
        if !mobi.is_kf8() || mobi.fdst_section_count.unwrap_or(0) <= 1 {
            return Ok(None);
        }
        let Some(idx) = valid_index(mobi.fdst_index) else {
            return Ok(None);
        };
        let rec = self.records.get(idx as usize).ok_or_else(|| {
            MobiError::Format(format!("FDST record {} beyond part records", idx))
        })?;
        Fdst::parse(&rec.data).map(Some)
    }

    fn collect_resources(&self) -> Vec<RawmlPart> {
        let Some(first) = self.mobi.and_then(|m| valid_index(m.image_index)) else {
            return Vec::new();
        };
        let first = first as usize;
        let mut parts = Vec::new();
        for (n, rec) in self.records.iter().enumerate().skip(first) {
            if rec.data.is_empty() || is_container_record(rec) {
                continue;
            }
            let uid = n - first;
            let part = match FileType::from_magic(&rec.data) {
                FileType::Font => match decode_font(&rec.data) {
                    Ok(font) => {
                        let kind = if font.starts_with(b"OTTO") {
                            FileType::Otf
                        } else {
                            FileType::Ttf
                        };
                        RawmlPart::new(uid, kind, font)
                    }
                    Err(e) => {
                        warn!("Record {}: {}", rec.index, e);
                        RawmlPart::new(uid, FileType::Font, rec.data.clone())
                    }
                },
                FileType::Audio => media_part(uid, rec, FileType::Mp3, FileType::Audio),
                FileType::Video => media_part(uid, rec, FileType::Mpg4, FileType::Video),
                other => RawmlPart::new(uid, other, rec.data.clone()),
            };
            parts.push(part);
        }
        parts
    }
}

enum TextDecoder {
    Copy,
    PalmDoc,
    Huff(Box<HuffCdic>),
}

/// AUDI/VIDE records hold the media after a header whose size is at offset 4.
fn media_part(uid: usize, rec: &Record, inner: FileType, fallback: FileType) -> RawmlPart {
    let offset = rec
        .data
        .get(4..8)
        .map(|b| BigEndian::read_u32(b) as usize)
        .filter(|&o| o >= 8 && o <= rec.data.len());
    match offset {
        Some(o) => RawmlPart::new(uid, inner, rec.data[o..].to_vec()),
        None => RawmlPart::new(uid, fallback, rec.data.clone()),
    }
}

const CONTAINER_MAGICS: [&[u8; 4]; 10] = [
    b"FLIS", b"FCIS", b"FDST", b"DATP", b"SRCS", b"CMET", b"BOUN", b"RESC", b"PAGE", b"INDX",
];

fn is_container_record(rec: &Record) -> bool {
    rec.is_eof_marker() || CONTAINER_MAGICS.iter().any(|m| rec.has_magic(*m))
}

/// Rebuild the HTML files of flow 0 from skeleton and fragment entries.
///
/// Each skeleton is followed in the text by its fragments; every fragment
/// is spliced into the skeleton at its insert position.
pub fn rebuild_files(
    flow0: &[u8],
    skeletons: &[SkeletonEntry],
    fragments: &[FragmentEntry],
) -> Result<Vec<RawmlPart>, MobiError> {
    let mut files = Vec::with_capacity(skeletons.len());
    let mut frags = fragments.iter();
    for (uid, skel) in skeletons.iter().enumerate() {
        let start = skel.start as usize;
        let end = start + skel.length as usize;
        let mut file = flow0
            .get(start..end)
            .ok_or_else(|| {
                MobiError::Format(format!(
                    "Skeleton {} ({}..{}) outside flow 0 ({} bytes)",
                    uid,
                    start,
                    end,
                    flow0.len()
                ))
            })?
            .to_vec();
        let mut base = end;
        for _ in 0..skel.fragment_count {
            let frag = frags.next().ok_or_else(|| {
                MobiError::Format(format!("Skeleton {} refers to missing fragments", uid))
            })?;
            let insert = (frag.insert_position as usize)
                .checked_sub(start)
                .filter(|&p| p <= file.len())
                .ok_or_else(|| {
                    MobiError::Format(format!(
                        "Fragment insert position {} outside skeleton {}",
                        frag.insert_position, uid
                    ))
                })?;
            let len = frag.length as usize;
            let chunk = flow0.get(base..base + len).ok_or_else(|| {
                MobiError::Format(format!(
                    "Fragment at {} ({} bytes) outside flow 0",
                    base, len
                ))
            })?;
            let tail = file.split_off(insert);
            file.extend_from_slice(chunk);
            file.extend_from_slice(&tail);
            base += len;
        }
        files.push(RawmlPart::new(uid, FileType::Html, file));
    }
    Ok(files)
}
