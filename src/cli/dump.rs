use std::io::Write;

use crate::cli::{open_book, wprintln};
use crate::util::hex::{format_offset, hex_dump};
use crate::MobiError;

pub struct DumpOptions {
    pub file: String,
    /// Absolute record number (default 0).
    pub record: Option<usize>,
    pub length: Option<usize>,
    pub raw: bool,
    pub mmap: bool,
}

pub fn execute(opts: &DumpOptions, writer: &mut dyn Write) -> Result<(), MobiError> {
    let book = open_book(&opts.file, opts.mmap, false, None)?;
    let records = book.records();
    let index = opts.record.unwrap_or(0);
    let record = records.get(index).ok_or_else(|| {
        MobiError::Argument(format!(
            "Record {} out of range (file has {} records)",
            index,
            records.len()
        ))
    })?;

    let dump_len = opts.length.unwrap_or(record.size()).min(record.size());
    let data = &record.data[..dump_len];

    if opts.raw {
        writer
            .write_all(data)
            .map_err(|e| MobiError::Io(format!("Cannot write to stdout: {}", e)))?;
    } else {
        wprintln!(
            writer,
            "Hex dump of {} record {} at offset {} ({} of {} bytes):",
            opts.file,
            index,
            format_offset(record.offset as u64),
            dump_len,
            record.size()
        )?;
        wprintln!(writer)?;
        wprintln!(writer, "{}", hex_dump(data, record.offset as u64))?;
    }

    Ok(())
}
