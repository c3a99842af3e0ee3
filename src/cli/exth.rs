use std::io::Write;

use colored::Colorize;
use serde::Serialize;

use crate::cli::{open_book, wprintln, write_json};
use crate::mobi::exth::{ExthRecord, ExthValue};
use crate::MobiError;

/// Options for the `mobitool exth` subcommand.
pub struct ExthOptions {
    pub file: String,
    /// Only show records with this numeric tag.
    pub tag: Option<u32>,
    pub json: bool,
    pub mmap: bool,
    pub kf7: bool,
}

#[derive(Serialize)]
struct ExthJson<'a> {
    length: u32,
    count: u32,
    records: Vec<&'a ExthRecord>,
}

/// List EXTH records in file order, repeats included.
pub fn execute(opts: &ExthOptions, writer: &mut dyn Write) -> Result<(), MobiError> {
    let book = open_book(&opts.file, opts.mmap, opts.kf7, None)?;
    let exth = match book.exth_header() {
        Some(e) => e,
        None => {
            if opts.json {
                return write_json(writer, &serde_json::Value::Null);
            }
            wprintln!(writer, "{}", "No EXTH header".yellow())?;
            return Ok(());
        }
    };

    let records: Vec<&ExthRecord> = exth
        .records
        .iter()
        .filter(|r| opts.tag.map_or(true, |t| r.id == t))
        .collect();

    if opts.json {
        return write_json(
            writer,
            &ExthJson {
                length: exth.length,
                count: exth.count,
                records,
            },
        );
    }

    wprintln!(
        writer,
        "EXTH: {} records, {} bytes",
        exth.count, exth.length
    )?;
    wprintln!(writer)?;
    wprintln!(
        writer,
        "{}",
        format!("{:>5}  {:<28} {:>6}  Value", "Tag", "Name", "Size").bold()
    )?;
    for r in records {
        let value = match &r.value {
            ExthValue::Binary(_) => r.value.to_string().dimmed(),
            _ => r.value.to_string().normal(),
        };
        wprintln!(
            writer,
            "{:>5}  {:<28} {:>6}  {}",
            r.id,
            r.tag.to_string(),
            r.size,
            value
        )?;
    }
    Ok(())
}
