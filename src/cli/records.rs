use std::io::Write;

use colored::Colorize;
use serde::Serialize;

use crate::cli::{open_book, wprintln, write_json};
use crate::util::hex::{format_hex32, format_magic};
use crate::MobiError;

/// Options for the `mobitool records` subcommand.
pub struct RecordsOptions {
    pub file: String,
    pub json: bool,
    pub mmap: bool,
    pub kf7: bool,
}

#[derive(Serialize)]
struct RecordJson {
    index: usize,
    offset: u32,
    size: usize,
    attributes: u8,
    uid: u32,
    magic: String,
}

/// List every PDB record with its offset, size and leading magic.
///
/// Records are shown for the whole file regardless of `--kf7`; the first
/// record of the inspected part is highlighted.
pub fn execute(opts: &RecordsOptions, writer: &mut dyn Write) -> Result<(), MobiError> {
    let book = open_book(&opts.file, opts.mmap, opts.kf7, None)?;
    let records = book.records();

    if opts.json {
        let rows: Vec<RecordJson> = records
            .iter()
            .map(|r| RecordJson {
                index: r.index,
                offset: r.offset,
                size: r.size(),
                attributes: r.attributes,
                uid: r.uid,
                magic: format_magic(r.magic().unwrap_or(&[])),
            })
            .collect();
        return write_json(writer, &rows);
    }

    wprintln!(
        writer,
        "{} records in {} ({} bytes)",
        records.len(),
        opts.file,
        book.file_size()
    )?;
    wprintln!(writer)?;
    wprintln!(
        writer,
        "{}",
        format!(
            "{:>6}  {:>10}  {:>8}  {:>4}  {:>10}  Magic",
            "#", "Offset", "Size", "Attr", "UID"
        )
        .bold()
    )?;
    for r in records {
        let magic = format_magic(r.magic().unwrap_or(&[]));
        let line = format!(
            "{:>6}  {:>10}  {:>8}  {:>4}  {}  {}",
            r.index,
            r.offset,
            r.size(),
            r.attributes,
            format_hex32(r.uid),
            magic
        );
        if r.index == book.part_offset() {
            wprintln!(writer, "{}", line.cyan())?;
        } else {
            wprintln!(writer, "{}", line)?;
        }
    }
    Ok(())
}
