use std::io::Write;

use colored::Colorize;

use crate::cli::{open_book, wprint, wprintln, write_json};
use crate::mobi::book::IndexKind;
use crate::mobi::index::Index;
use crate::MobiError;

/// Options for the `mobitool index` subcommand.
pub struct IndexOptions {
    pub file: String,
    /// Index name: skel, frag, ncx, guide, orth or infl.
    pub name: String,
    /// Show raw tag values instead of the typed view.
    pub raw: bool,
    pub json: bool,
    pub mmap: bool,
    pub kf7: bool,
}

/// List the entries of one index.
///
/// Skeleton, fragment, NCX and guide indices are shown through their typed
/// views (CNCX strings resolved); dictionary indices and `--raw` show each
/// entry label followed by its tag values.
pub fn execute(opts: &IndexOptions, writer: &mut dyn Write) -> Result<(), MobiError> {
    let kind: IndexKind = opts.name.parse()?;
    let book = open_book(&opts.file, opts.mmap, opts.kf7, None)?;

    let index = match book.index(kind) {
        Some(i) => i,
        None => {
            return Err(MobiError::Argument(format!(
                "{} has no {} index",
                opts.file, kind
            )));
        }
    };

    if opts.json {
        return match (opts.raw, kind) {
            (false, IndexKind::Skeleton) => write_json(writer, &index.skeletons()?),
            (false, IndexKind::Fragment) => write_json(writer, &index.fragments()?),
            (false, IndexKind::Ncx) => write_json(writer, &index.ncx_entries()?),
            (false, IndexKind::Guide) => write_json(writer, &index.guide_entries()?),
            _ => write_json(writer, index),
        };
    }

    wprintln!(
        writer,
        "{}",
        format!(
            "{} index at record {}: {} entries, {} CNCX records",
            kind,
            index.record,
            index.len(),
            index.cncx.record_count()
        )
        .bold()
    )?;
    wprintln!(writer)?;

    match (opts.raw, kind) {
        (false, IndexKind::Skeleton) => {
            wprintln!(writer, "{:<16} {:>6} {:>10} {:>8}", "Label", "Frags", "Start", "Length")?;
            for s in index.skeletons()? {
                wprintln!(
                    writer,
                    "{:<16} {:>6} {:>10} {:>8}",
                    s.label, s.fragment_count, s.start, s.length
                )?;
            }
        }
        (false, IndexKind::Fragment) => {
            wprintln!(
                writer,
                "{:>10} {:>5} {:>5} {:>10} {:>8}  Selector",
                "Insert", "File", "Seq", "Start", "Length"
            )?;
            for f in index.fragments()? {
                wprintln!(
                    writer,
                    "{:>10} {:>5} {:>5} {:>10} {:>8}  {}",
                    f.insert_position, f.file_number, f.sequence_number, f.start, f.length, f.selector
                )?;
            }
        }
        (false, IndexKind::Ncx) => {
            for e in index.ncx_entries()? {
                let text = e.text.as_deref().unwrap_or(&e.label);
                wprint!(writer, "{}{}", ncx_indent(e.level), text)?;
                match e.pos_fid {
                    Some((fid, off)) => wprintln!(writer, "  {}", format!("[{}:{}]", fid, off).dimmed())?,
                    None => wprintln!(
                        writer,
                        "  {}",
                        format!("[pos {}]", e.pos.unwrap_or(0)).dimmed()
                    )?,
                }
            }
        }
        (false, IndexKind::Guide) => {
            for g in index.guide_entries()? {
                wprintln!(
                    writer,
                    "{:<16} {}",
                    g.ref_type,
                    g.title.as_deref().unwrap_or("-")
                )?;
            }
        }
        _ => print_raw(index, writer)?,
    }
    Ok(())
}

/// Deepest NCX level that is still indented.
const MAX_NCX_INDENT: u32 = 32;

fn ncx_indent(level: Option<u32>) -> String {
    "  ".repeat(level.unwrap_or(0).min(MAX_NCX_INDENT) as usize)
}

fn print_raw(index: &Index, writer: &mut dyn Write) -> Result<(), MobiError> {
    for entry in &index.entries {
        wprint!(writer, "{}", entry.label.cyan())?;
        for t in &entry.tags {
            let values: Vec<String> = t.values.iter().map(u32::to_string).collect();
            wprint!(writer, "  {}={}", t.tag, values.join(","))?;
        }
        wprintln!(writer)?;
    }
    Ok(())
}
