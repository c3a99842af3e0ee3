use std::collections::BTreeMap;
use std::io::Write;

use colored::Colorize;
use serde::Serialize;

use crate::cli::{open_book, wprintln, write_json};
use crate::mobi::book::Book;
use crate::mobi::header::{MobiHeader, Record0Header};
use crate::mobi::pdb::PdbHeader;
use crate::util::fields::{display_value, to_field_map};
use crate::MobiError;

/// Options for the `mobitool info` subcommand.
pub struct InfoOptions {
    /// Path to the ebook file.
    pub file: String,
    /// Emit output as JSON.
    pub json: bool,
    /// Read through a memory map.
    pub mmap: bool,
    /// Prefer the KF7 part of hybrid files.
    pub kf7: bool,
}

#[derive(Serialize)]
struct InfoJson<'a> {
    file: &'a str,
    file_size: u64,
    pdb_header: &'a PdbHeader,
    record0_header: &'a Record0Header,
    #[serde(skip_serializing_if = "Option::is_none")]
    mobi_header: Option<&'a MobiHeader>,
    exth_record_count: usize,
    part_offset: usize,
    capabilities: BTreeMap<&'static str, bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_part_offset: Option<usize>,
}

/// Display the container and record 0 headers of a book.
///
/// Text output has three blocks: the 78-byte PDB header (name, type and
/// creator, timestamps, record count), the PalmDOC header of record 0
/// (compression, text length and record layout, encryption), and every
/// present MOBI header field. Capability flags close the report. For hybrid
/// files the primary part is shown and the offset of the other part noted.
pub fn execute(opts: &InfoOptions, writer: &mut dyn Write) -> Result<(), MobiError> {
    let book = open_book(&opts.file, opts.mmap, opts.kf7, None)?;

    if opts.json {
        let out = InfoJson {
            file: &opts.file,
            file_size: book.file_size(),
            pdb_header: book.pdb_header(),
            record0_header: book.record0_header(),
            mobi_header: book.mobi_header(),
            exth_record_count: book.exth_header().map(|e| e.records.len()).unwrap_or(0),
            part_offset: book.part_offset(),
            capabilities: book.capabilities().into_iter().collect(),
            next_part_offset: book.next().map(Book::part_offset),
        };
        return write_json(writer, &out);
    }

    let pdb = book.pdb_header();
    wprintln!(writer, "{}", format!("File: {}", opts.file).bold())?;
    wprintln!(writer, "  Size:          {} bytes", book.file_size())?;
    wprintln!(writer)?;

    wprintln!(writer, "{}", "PDB Header".bold())?;
    wprintln!(writer, "  Name:          {}", pdb.name)?;
    wprintln!(writer, "  Type/Creator:  {}/{}", pdb.db_type, pdb.creator)?;
    wprintln!(writer, "  Attributes:    0x{:04x}", pdb.attributes)?;
    wprintln!(writer, "  Version:       {}", pdb.version)?;
    for (label, raw, time) in [
        ("Created:  ", pdb.ctime, pdb.ctime_time),
        ("Modified: ", pdb.mtime, pdb.mtime_time),
        ("Backed up:", pdb.btime, pdb.btime_time),
    ] {
        match time {
            Some(t) => wprintln!(
                writer,
                "  {}     {}",
                label,
                t.format("%Y-%m-%d %H:%M:%S UTC")
            )?,
            None => wprintln!(writer, "  {}     - ({})", label, raw)?,
        }
    }
    wprintln!(writer, "  Records:       {}", pdb.record_count)?;
    wprintln!(writer)?;

    let rec0 = book.record0_header();
    wprintln!(writer, "{}", "Record 0 (PalmDOC header)".bold())?;
    wprintln!(writer, "  Compression:   {}", rec0.compression)?;
    wprintln!(writer, "  Text length:   {}", rec0.text_length)?;
    wprintln!(
        writer,
        "  Text records:  {} x {} bytes",
        rec0.text_record_count, rec0.text_record_size
    )?;
    let encryption = if rec0.is_encrypted() {
        rec0.encryption.to_string().red()
    } else {
        rec0.encryption.to_string().normal()
    };
    wprintln!(writer, "  Encryption:    {}", encryption)?;
    wprintln!(writer)?;

    match book.mobi_header() {
        Some(mobi) => {
            wprintln!(
                writer,
                "{}",
                format!("MOBI Header (v{}, {})", mobi.version, mobi.mobi_type_name()).bold()
            )?;
            for (name, value) in to_field_map(mobi)? {
                if !value.is_null() {
                    wprintln!(writer, "  {:<22} {}", name, display_value(&value))?;
                }
            }
        }
        None => wprintln!(writer, "{}", "No MOBI header (plain PalmDOC)".yellow())?,
    }
    if let Some(exth) = book.exth_header() {
        wprintln!(writer, "  {:<22} {} records", "exth", exth.records.len())?;
    }
    wprintln!(writer)?;

    if book.is_hybrid() {
        let other = book.next().map(Book::part_offset).unwrap_or(0);
        wprintln!(
            writer,
            "{} part at record {}, other part at record {}",
            "Hybrid file:".cyan(),
            book.part_offset(),
            other
        )?;
        wprintln!(writer)?;
    }

    wprintln!(writer, "{}", "Capabilities".bold())?;
    for (name, flag) in book.capabilities() {
        let value = if flag {
            "yes".green()
        } else {
            "no".dimmed()
        };
        wprintln!(writer, "  {:<22} {}", name, value)?;
    }

    Ok(())
}
