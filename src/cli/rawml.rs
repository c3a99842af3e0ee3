use std::io::Write;
use std::path::Path;

use colored::Colorize;
use log::info;
use serde::Serialize;

use crate::cli::{open_book, wprintln, write_json};
use crate::mobi::rawml::{Fdst, RawmlPart};
use crate::MobiError;

/// Options for the `mobitool rawml` subcommand.
pub struct RawmlOptions {
    pub file: String,
    /// Extract every part into this directory.
    pub dir: Option<String>,
    /// Accepted text length shortfall in bytes.
    pub tolerance: Option<usize>,
    pub json: bool,
    pub mmap: bool,
    pub kf7: bool,
}

#[derive(Serialize)]
struct PartJson {
    group: String,
    uid: usize,
    file_type: String,
    size: usize,
    file_name: String,
}

#[derive(Serialize)]
struct RawmlJson<'a> {
    text_length: usize,
    fdst: Option<&'a Fdst>,
    parts: Vec<PartJson>,
}

/// Show or extract the typed parts of the RAWML.
///
/// Markup files are named `partNNNNN.html`, secondary flows `flowNNNNN.css`
/// or `.svg`, and resources `resourceNNNNN.<ext>`. Part bytes are written
/// exactly as assembled; nothing is rewritten or converted.
pub fn execute(opts: &RawmlOptions, writer: &mut dyn Write) -> Result<(), MobiError> {
    let book = open_book(&opts.file, opts.mmap, opts.kf7, opts.tolerance)?;
    let rawml = book.rawml()?;

    let groups: [(&str, &str, &[RawmlPart]); 3] = [
        ("markup", "part", rawml.markup()),
        ("flow", "flow", rawml.flows().get(1..).unwrap_or(&[])),
        ("resource", "resource", rawml.resources()),
    ];

    if let Some(dir) = &opts.dir {
        let dir = Path::new(dir);
        std::fs::create_dir_all(dir)
            .map_err(|e| MobiError::Io(format!("Cannot create {}: {}", dir.display(), e)))?;
        let mut written = 0usize;
        for (_, prefix, parts) in &groups {
            for part in parts.iter() {
                let path = dir.join(part.file_name(prefix));
                std::fs::write(&path, &part.data)
                    .map_err(|e| MobiError::Io(format!("Cannot write {}: {}", path.display(), e)))?;
                written += 1;
            }
        }
        info!("Extracted {} parts into {}", written, dir.display());
        wprintln!(
            writer,
            "Wrote {} parts to {}",
            written.to_string().green(),
            dir.display()
        )?;
        return Ok(());
    }

    if opts.json {
        let parts = groups
            .iter()
            .flat_map(|(group, prefix, parts)| {
                parts.iter().map(move |p| PartJson {
                    group: group.to_string(),
                    uid: p.uid,
                    file_type: p.file_type.to_string(),
                    size: p.size(),
                    file_name: p.file_name(prefix),
                })
            })
            .collect();
        return write_json(
            writer,
            &RawmlJson {
                text_length: rawml.len(),
                fdst: rawml.fdst.as_ref(),
                parts,
            },
        );
    }

    wprintln!(
        writer,
        "{}",
        format!(
            "RAWML: {} bytes, {} flows, {} markup parts, {} resources",
            rawml.len(),
            rawml.flows().len(),
            rawml.markup().len(),
            rawml.resources().len()
        )
        .bold()
    )?;
    if let Some(fdst) = &rawml.fdst {
        for (i, (start, end)) in fdst.sections.iter().enumerate() {
            wprintln!(writer, "  flow {:>3}: {}..{}", i, start, end)?;
        }
    }
    wprintln!(writer)?;
    wprintln!(
        writer,
        "{}",
        format!("{:<9} {:>6}  {:<6} {:>9}  File", "Group", "UID", "Type", "Size").bold()
    )?;
    for (group, prefix, parts) in &groups {
        for part in parts.iter() {
            wprintln!(
                writer,
                "{:<9} {:>6}  {:<6} {:>9}  {}",
                group,
                part.uid,
                part.file_type.to_string(),
                part.size(),
                part.file_name(prefix)
            )?;
        }
    }
    Ok(())
}
