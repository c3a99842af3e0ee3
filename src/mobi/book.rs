//! The [`Book`] facade.
//!
//! A `Book` is one fully parsed book part: the shared PDB header and record
//! list, the part's record 0 headers (PalmDOC, MOBI, EXTH), its decoded
//! indices, and a lazily assembled [`Rawml`]. Hybrid files carry a legacy
//! KF7 part and a KF8 part separated by a `BOUNDARY` record; the part not
//! chosen as primary is reachable through [`Book::next`].
//!
//! Everything is read during construction and the source is released
//! afterwards. The only deferred work is the RAWML cell, computed at most
//! once on first access.

use std::fmt;
use std::io::{Cursor, Read, Seek, SeekFrom};
use std::str::FromStr;
use std::sync::Arc;

use log::{debug, info, warn};
use once_cell::sync::OnceCell;
use serde::Serialize;

use crate::mobi::constants::*;
use crate::mobi::exth::{ExthHeader, ExthTag};
use crate::mobi::header::{valid_index, MobiHeader, Record0Header};
use crate::mobi::index::Index;
use crate::mobi::pdb::{parse_directory, record_range, PdbHeader};
use crate::mobi::rawml::{Rawml, RawmlSource};
use crate::mobi::record::Record;
use crate::MobiError;

/// Supertrait combining `Read + Seek` for type-erased readers.
pub(crate) trait ReadSeek: Read + Seek {}
impl<T: Read + Seek> ReadSeek for T {}

/// A memory-mapped file reader implementing `Read` and `Seek`.
#[cfg(feature = "cli")]
struct MmapReader {
    mmap: memmap2::Mmap,
    position: u64,
}

#[cfg(feature = "cli")]
impl MmapReader {
    fn new(mmap: memmap2::Mmap) -> Self {
        Self { mmap, position: 0 }
    }
}

#[cfg(feature = "cli")]
impl Read for MmapReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let len = self.mmap.len() as u64;
        if self.position >= len {
            return Ok(0);
        }
        let start = self.position as usize;
        let n = buf.len().min((len - self.position) as usize);
        buf[..n].copy_from_slice(&self.mmap[start..start + n]);
        self.position += n as u64;
        Ok(n)
    }
}

#[cfg(feature = "cli")]
impl Seek for MmapReader {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        let len = self.mmap.len() as i64;
        let new_pos = match pos {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::End(offset) => len + offset,
            SeekFrom::Current(offset) => self.position as i64 + offset,
        };
        if new_pos < 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "seek to a negative position",
            ));
        }
        self.position = new_pos as u64;
        Ok(self.position)
    }
}

/// Load-time settings.
///
/// ```
/// use mobi::mobi::book::BookOptions;
///
/// let opts = BookOptions::default()
///     .with_kf8(false)
///     .with_eager_rawml(true)
///     .with_text_length_tolerance(0);
/// assert!(!opts.use_kf8);
/// assert!(opts.eager_rawml);
/// assert_eq!(opts.text_length_tolerance, Some(0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookOptions {
    /// For hybrid files, make the KF8 part primary (the KF7 part becomes `next`).
    pub use_kf8: bool,
    /// Assemble the RAWML during load so its errors abort construction.
    pub eager_rawml: bool,
    /// Accepted shortfall of decompressed text; `None` means one text record.
    pub text_length_tolerance: Option<usize>,
}

impl Default for BookOptions {
    fn default() -> Self {
        BookOptions {
            use_kf8: true,
            eager_rawml: false,
            text_length_tolerance: None,
        }
    }
}

impl BookOptions {
    pub fn with_kf8(mut self, use_kf8: bool) -> Self {
        self.use_kf8 = use_kf8;
        self
    }

    pub fn with_eager_rawml(mut self, eager: bool) -> Self {
        self.eager_rawml = eager;
        self
    }

    pub fn with_text_length_tolerance(mut self, bytes: usize) -> Self {
        self.text_length_tolerance = Some(bytes);
        self
    }
}

/// The auxiliary indices a MOBI header can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    Skeleton,
    Fragment,
    Ncx,
    Guide,
    Orth,
    Infl,
}

impl IndexKind {
    pub const ALL: [IndexKind; 6] = [
        IndexKind::Skeleton,
        IndexKind::Fragment,
        IndexKind::Ncx,
        IndexKind::Guide,
        IndexKind::Orth,
        IndexKind::Infl,
    ];

    pub fn name(self) -> &'static str {
        match self {
            IndexKind::Skeleton => "skeleton",
            IndexKind::Fragment => "fragment",
            IndexKind::Ncx => "ncx",
            IndexKind::Guide => "guide",
            IndexKind::Orth => "orth",
            IndexKind::Infl => "infl",
        }
    }

    /// The MOBI header field holding this index's record number.
    pub fn header_field(self, mobi: &MobiHeader) -> Option<u32> {
        match self {
            IndexKind::Skeleton => mobi.skeleton_index,
            IndexKind::Fragment => mobi.fragment_index,
            IndexKind::Ncx => mobi.ncx_index,
            IndexKind::Guide => mobi.guide_index,
            IndexKind::Orth => mobi.orth_index,
            IndexKind::Infl => mobi.infl_index,
        }
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for IndexKind {
    type Err = MobiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "skel" | "skeleton" => Ok(IndexKind::Skeleton),
            "frag" | "fragment" | "fragments" => Ok(IndexKind::Fragment),
            "ncx" | "toc" => Ok(IndexKind::Ncx),
            "guide" => Ok(IndexKind::Guide),
            "orth" => Ok(IndexKind::Orth),
            "infl" => Ok(IndexKind::Infl),
            other => Err(MobiError::Argument(format!(
                "Unknown index '{}' (expected skel, frag, ncx, guide, orth or infl)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Indices {
    skeleton: Option<Index>,
    fragment: Option<Index>,
    ncx: Option<Index>,
    guide: Option<Index>,
    orth: Option<Index>,
    infl: Option<Index>,
}

impl Indices {
    fn get(&self, kind: IndexKind) -> Option<&Index> {
        match kind {
            IndexKind::Skeleton => self.skeleton.as_ref(),
            IndexKind::Fragment => self.fragment.as_ref(),
            IndexKind::Ncx => self.ncx.as_ref(),
            IndexKind::Guide => self.guide.as_ref(),
            IndexKind::Orth => self.orth.as_ref(),
            IndexKind::Infl => self.infl.as_ref(),
        }
    }

    fn slot(&mut self, kind: IndexKind) -> &mut Option<Index> {
        match kind {
            IndexKind::Skeleton => &mut self.skeleton,
            IndexKind::Fragment => &mut self.fragment,
            IndexKind::Ncx => &mut self.ncx,
            IndexKind::Guide => &mut self.guide,
            IndexKind::Orth => &mut self.orth,
            IndexKind::Infl => &mut self.infl,
        }
    }
}

/// Resolved descriptive metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Metadata {
    pub title: String,
    pub full_name: Option<String>,
    pub author: Option<String>,
    pub contributor: Option<String>,
    pub publisher: Option<String>,
    pub description: Option<String>,
    pub isbn: Option<String>,
    pub asin: Option<String>,
    pub subject: Option<String>,
    pub publishdate: Option<String>,
    pub language: Option<String>,
}

/// An open MOBI/AZW3 book part.
#[derive(Debug)]
pub struct Book {
    file_size: u64,
    pdb_header: PdbHeader,
    records: Arc<Vec<Record>>,
    part_start: usize,
    part_end: usize,
    record0_header: Record0Header,
    mobi_header: Option<MobiHeader>,
    exth_header: Option<ExthHeader>,
    indices: Indices,
    hybrid: bool,
    options: BookOptions,
    rawml: OnceCell<Rawml>,
    next: Option<Box<Book>>,
}

impl Book {
    /// Open a MOBI file with default options.
    pub fn open<P: AsRef<std::path::Path>>(path: P) -> Result<Self, MobiError> {
        Self::open_with_options(path, BookOptions::default())
    }

    pub fn open_with_options<P: AsRef<std::path::Path>>(
        path: P,
        options: BookOptions,
    ) -> Result<Self, MobiError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .map_err(|e| MobiError::Io(format!("Cannot open {}: {}", path.display(), e)))?;
        let file_size = file
            .metadata()
            .map_err(|e| MobiError::Io(format!("Cannot stat {}: {}", path.display(), e)))?
            .len();
        Self::init(Box::new(file), file_size, options)
    }

    /// Open a MOBI file through a memory map.
    ///
    /// # Safety
    ///
    /// The mapped file must not be modified by another process while the
    /// book is being loaded.
    #[cfg(feature = "cli")]
    pub fn open_mmap<P: AsRef<std::path::Path>>(path: P) -> Result<Self, MobiError> {
        Self::open_mmap_with_options(path, BookOptions::default())
    }

    #[cfg(feature = "cli")]
    pub fn open_mmap_with_options<P: AsRef<std::path::Path>>(
        path: P,
        options: BookOptions,
    ) -> Result<Self, MobiError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .map_err(|e| MobiError::Io(format!("Cannot open {}: {}", path.display(), e)))?;
        let file_size = file
            .metadata()
            .map_err(|e| MobiError::Io(format!("Cannot stat {}: {}", path.display(), e)))?
            .len();
        let mmap = unsafe {
            memmap2::Mmap::map(&file)
                .map_err(|e| MobiError::Io(format!("Cannot mmap {}: {}", path.display(), e)))?
        };
        Self::init(Box::new(MmapReader::new(mmap)), file_size, options)
    }

    /// Parse a book from an in-memory buffer.
    ///
    /// ```
    /// use mobi::mobi::book::Book;
    ///
    /// let err = Book::from_bytes(b"not a mobi file".to_vec()).unwrap_err();
    /// assert!(err.to_string().starts_with("Format error"));
    /// ```
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, MobiError> {
        Self::from_bytes_with_options(data, BookOptions::default())
    }

    pub fn from_bytes_with_options(data: Vec<u8>, options: BookOptions) -> Result<Self, MobiError> {
        let file_size = data.len() as u64;
        Self::init(Box::new(Cursor::new(data)), file_size, options)
    }

    /// Shared initialization: PDB header, directory, records, then parts.
    fn init(
        mut reader: Box<dyn ReadSeek>,
        file_size: u64,
        options: BookOptions,
    ) -> Result<Self, MobiError> {
        if file_size < PDB_HEADER_SIZE as u64 {
            return Err(MobiError::Format(format!(
                "File too small to be a PDB database: {} bytes",
                file_size
            )));
        }
        let mut head = vec![0u8; PDB_HEADER_SIZE];
        reader
            .read_exact(&mut head)
            .map_err(|e| MobiError::Io(format!("Cannot read PDB header: {}", e)))?;
        let pdb_header = PdbHeader::parse(&head)?;
        if !pdb_header.is_mobipocket() && !pdb_header.is_palmdoc() {
            warn!(
                "Unexpected PDB type/creator {}/{}",
                pdb_header.db_type, pdb_header.creator
            );
        }

        let dir_len = pdb_header.record_count as usize * PDB_RECORD_INFO_SIZE;
        let available = (file_size - PDB_HEADER_SIZE as u64).min(dir_len as u64) as usize;
        let mut dir = vec![0u8; available];
        reader
            .read_exact(&mut dir)
            .map_err(|e| MobiError::Io(format!("Cannot read record directory: {}", e)))?;
        let entries = parse_directory(&dir, &pdb_header, file_size)?;

        let mut records = Vec::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            let (start, end) = record_range(&entries, i, file_size)
                .ok_or_else(|| MobiError::Format(format!("No range for record {}", i)))?;
            let mut data = vec![0u8; (end - start) as usize];
            reader
                .seek(SeekFrom::Start(start))
                .and_then(|_| reader.read_exact(&mut data))
                .map_err(|e| MobiError::Io(format!("Cannot read record {}: {}", i, e)))?;
            records.push(Record::new(i, entry, data));
        }
        debug!(
            "PDB {:?}: {} records, {} bytes",
            pdb_header.name,
            records.len(),
            file_size
        );

        let records = Arc::new(records);
        let boundary = find_kf8_boundary(&records)?;
        let total = records.len();

        let book = match boundary {
            Some(kf8_start) => {
                info!("Hybrid file: KF8 part starts at record {}", kf8_start);
                let kf7 = (0, kf8_start - 1);
                let kf8 = (kf8_start, total);
                let (primary, secondary) = if options.use_kf8 { (kf8, kf7) } else { (kf7, kf8) };
                let next = Self::load_part(&pdb_header, &records, file_size, secondary, true, options, None)?;
                Self::load_part(
                    &pdb_header,
                    &records,
                    file_size,
                    primary,
                    true,
                    options,
                    Some(Box::new(next)),
                )?
            }
            None => Self::load_part(&pdb_header, &records, file_size, (0, total), false, options, None)?,
        };
        Ok(book)
    }

    fn load_part(
        pdb_header: &PdbHeader,
        records: &Arc<Vec<Record>>,
        file_size: u64,
        (part_start, part_end): (usize, usize),
        hybrid: bool,
        options: BookOptions,
        next: Option<Box<Book>>,
    ) -> Result<Self, MobiError> {
        let rec0 = &records[part_start].data;
        let record0_header = Record0Header::parse(rec0)?;
        let mobi_header = MobiHeader::parse(rec0)?;
        let exth_header = match &mobi_header {
            Some(m) if m.has_exth() => Some(ExthHeader::parse(rec0, m.exth_offset(), m.encoding)?),
            _ => None,
        };

        let part_records = &records[part_start..part_end];
        let mut indices = Indices::default();
        if let Some(mobi) = &mobi_header {
            for kind in IndexKind::ALL {
                let Some(start) = valid_index(kind.header_field(mobi)) else {
                    continue;
                };
                match Index::parse(part_records, start as usize, mobi.encoding) {
                    Ok(index) => *indices.slot(kind) = Some(index),
                    Err(e) => warn!("Ignoring {} index at record {}: {}", kind, start, e),
                }
            }
        }

        let book = Book {
            file_size,
            pdb_header: pdb_header.clone(),
            records: Arc::clone(records),
            part_start,
            part_end,
            record0_header,
            mobi_header,
            exth_header,
            indices,
            hybrid,
            options,
            rawml: OnceCell::new(),
            next,
        };
        if options.eager_rawml {
            book.rawml()?;
        }
        Ok(book)
    }

    // ── Structures ──────────────────────────────────────────────────

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn options(&self) -> &BookOptions {
        &self.options
    }

    pub fn pdb_header(&self) -> &PdbHeader {
        &self.pdb_header
    }

    pub fn record0_header(&self) -> &Record0Header {
        &self.record0_header
    }

    pub fn mobi_header(&self) -> Option<&MobiHeader> {
        self.mobi_header.as_ref()
    }

    pub fn exth_header(&self) -> Option<&ExthHeader> {
        self.exth_header.as_ref()
    }

    /// Every record of the file, in directory order.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// The records of this part; index 0 is the part's record 0.
    pub fn part_records(&self) -> &[Record] {
        &self.records[self.part_start..self.part_end]
    }

    /// Absolute record number of this part's record 0.
    pub fn part_offset(&self) -> usize {
        self.part_start
    }

    /// A decoded index, if the header references it and it decoded cleanly.
    pub fn index(&self, kind: IndexKind) -> Option<&Index> {
        self.indices.get(kind)
    }

    /// The other part of a hybrid file.
    pub fn next(&self) -> Option<&Book> {
        self.next.as_deref()
    }

    /// Decompressed and reconstructed content, assembled on first use.
    pub fn rawml(&self) -> Result<&Rawml, MobiError> {
        self.rawml.get_or_try_init(|| {
            let source = RawmlSource {
                records: self.part_records(),
                record0: &self.record0_header,
                mobi: self.mobi_header.as_ref(),
                skeleton: self.indices.skeleton.as_ref(),
                fragments: self.indices.fragment.as_ref(),
                tolerance: self
                    .options
                    .text_length_tolerance
                    .unwrap_or(self.record0_header.text_record_size as usize),
            };
            source.assemble()
        })
    }

    // ── Metadata ────────────────────────────────────────────────────

    fn exth_text(&self, tag: ExthTag) -> Option<String> {
        self.exth_header
            .as_ref()
            .and_then(|e| e.text(tag))
            .map(str::to_string)
    }

    fn exth_joined(&self, tag: ExthTag) -> Option<String> {
        self.exth_header.as_ref().and_then(|e| e.joined(tag, "; "))
    }

    /// The full name stored in record 0.
    pub fn full_name(&self) -> Option<&str> {
        self.mobi_header.as_ref().and_then(|m| m.full_name.as_deref())
    }

    /// Title: EXTH updated title, then full name, then PDB name.
    pub fn title(&self) -> String {
        self.exth_text(ExthTag::TitleUpdated)
            .or_else(|| self.full_name().map(str::to_string))
            .unwrap_or_else(|| self.pdb_header.name.clone())
    }

    /// All authors joined with `"; "`.
    pub fn author(&self) -> Option<String> {
        self.exth_joined(ExthTag::Author)
    }

    pub fn contributor(&self) -> Option<String> {
        self.exth_text(ExthTag::Contributor)
    }

    pub fn publisher(&self) -> Option<String> {
        self.exth_text(ExthTag::Publisher)
    }

    pub fn description(&self) -> Option<String> {
        self.exth_text(ExthTag::Description)
    }

    pub fn isbn(&self) -> Option<String> {
        self.exth_text(ExthTag::Isbn)
    }

    pub fn asin(&self) -> Option<String> {
        self.exth_text(ExthTag::Asin)
    }

    pub fn publishdate(&self) -> Option<String> {
        self.exth_text(ExthTag::PublishDate)
    }

    /// All subjects joined with `"; "`.
    pub fn subject(&self) -> Option<String> {
        self.exth_joined(ExthTag::Subject)
    }

    /// EXTH language, falling back to the MOBI header locale.
    pub fn language(&self) -> Option<String> {
        self.exth_text(ExthTag::Language)
            .or_else(|| self.mobi_header.as_ref().and_then(|m| m.locale_str.clone()))
    }

    pub fn metadata(&self) -> Metadata {
        Metadata {
            title: self.title(),
            full_name: self.full_name().map(str::to_string),
            author: self.author(),
            contributor: self.contributor(),
            publisher: self.publisher(),
            description: self.description(),
            isbn: self.isbn(),
            asin: self.asin(),
            subject: self.subject(),
            publishdate: self.publishdate(),
            language: self.language(),
        }
    }

    // ── Capabilities ────────────────────────────────────────────────

    pub fn has_mobi_header(&self) -> bool {
        self.mobi_header.is_some()
    }

    pub fn has_exth_header(&self) -> bool {
        self.exth_header.is_some()
    }

    pub fn has_fdst(&self) -> bool {
        self.mobi_header.as_ref().is_some_and(|m| {
            m.is_kf8()
                && valid_index(m.fdst_index).is_some()
                && m.fdst_section_count.unwrap_or(0) > 1
        })
    }

    pub fn has_skeleton_index(&self) -> bool {
        self.indices.skeleton.is_some()
    }

    pub fn has_fragments_index(&self) -> bool {
        self.indices.fragment.is_some()
    }

    pub fn has_ncx_index(&self) -> bool {
        self.indices.ncx.is_some()
    }

    pub fn has_guide_index(&self) -> bool {
        self.indices.guide.is_some()
    }

    pub fn has_orth_index(&self) -> bool {
        self.indices.orth.is_some()
    }

    pub fn has_infl_index(&self) -> bool {
        self.indices.infl.is_some()
    }

    pub fn is_mobipocket(&self) -> bool {
        self.pdb_header.is_mobipocket()
    }

    /// True when both KF8 reconstruction indices are present.
    pub fn is_kf8(&self) -> bool {
        self.has_skeleton_index() && self.has_fragments_index()
    }

    pub fn is_hybrid(&self) -> bool {
        self.hybrid
    }

    pub fn is_encrypted(&self) -> bool {
        self.record0_header.is_encrypted()
    }

    pub fn is_dictionary(&self) -> bool {
        self.has_orth_index()
    }

    /// Capability flags as name/value pairs, in a stable order.
    pub fn capabilities(&self) -> Vec<(&'static str, bool)> {
        vec![
            ("has_mobi_header", self.has_mobi_header()),
            ("has_exth_header", self.has_exth_header()),
            ("has_fdst", self.has_fdst()),
            ("has_skeleton_index", self.has_skeleton_index()),
            ("has_fragments_index", self.has_fragments_index()),
            ("has_ncx_index", self.has_ncx_index()),
            ("has_guide_index", self.has_guide_index()),
            ("has_orth_index", self.has_orth_index()),
            ("has_infl_index", self.has_infl_index()),
            ("is_mobipocket", self.is_mobipocket()),
            ("is_kf8", self.is_kf8()),
            ("is_hybrid", self.is_hybrid()),
            ("is_encrypted", self.is_encrypted()),
            ("is_dictionary", self.is_dictionary()),
        ]
    }
}

/// Locate the KF8 part of a hybrid file.
///
/// EXTH tag 121 in the first record 0 names the KF8 record 0; the record
/// before it must be the `BOUNDARY` marker.
fn find_kf8_boundary(records: &[Record]) -> Result<Option<usize>, MobiError> {
    let rec0 = &records[0].data;
    let Some(mobi) = MobiHeader::parse(rec0)? else {
        return Ok(None);
    };
    if !mobi.has_exth() {
        return Ok(None);
    }
    let exth = ExthHeader::parse(rec0, mobi.exth_offset(), mobi.encoding)?;
    let Some(kf8_start) = exth.number(ExthTag::Kf8Boundary) else {
        return Ok(None);
    };
    let kf8_start = kf8_start as usize;
    if kf8_start == MOBI_NOTSET as usize || kf8_start < 2 || kf8_start >= records.len() {
        return Ok(None);
    }
    if !records[kf8_start - 1].has_magic(b"BOUNDARY") {
        warn!(
            "EXTH KF8 boundary {} is not preceded by a BOUNDARY record",
            kf8_start
        );
        return Ok(None);
    }
    Ok(Some(kf8_start))
}
