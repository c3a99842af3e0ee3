use std::io::Write;

use colored::Colorize;

use crate::cli::{open_book, wprintln, write_json};
use crate::MobiError;

/// Options for the `mobitool meta` subcommand.
pub struct MetaOptions {
    pub file: String,
    pub json: bool,
    pub mmap: bool,
    pub kf7: bool,
}

/// Print the resolved metadata of a book.
///
/// Title falls back from the EXTH updated title to the record 0 full name
/// and then to the PDB database name; repeated authors and subjects are
/// joined with `"; "`. Absent fields are omitted from text output and
/// serialized as `null` in JSON.
pub fn execute(opts: &MetaOptions, writer: &mut dyn Write) -> Result<(), MobiError> {
    let book = open_book(&opts.file, opts.mmap, opts.kf7, None)?;
    let meta = book.metadata();

    if opts.json {
        return write_json(writer, &meta);
    }

    wprintln!(writer, "{:<12} {}", "Title:", meta.title.bold())?;
    let fields = [
        ("Full name:", &meta.full_name),
        ("Author:", &meta.author),
        ("Contributor:", &meta.contributor),
        ("Publisher:", &meta.publisher),
        ("Published:", &meta.publishdate),
        ("Language:", &meta.language),
        ("Subject:", &meta.subject),
        ("ISBN:", &meta.isbn),
        ("ASIN:", &meta.asin),
        ("Description:", &meta.description),
    ];
    for (label, value) in fields {
        if let Some(v) = value {
            wprintln!(writer, "{:<12} {}", label, v)?;
        }
    }
    Ok(())
}
