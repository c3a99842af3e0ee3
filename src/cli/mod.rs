//! CLI subcommand implementations for the `mobitool` binary.
//!
//! The `mobitool` binary prints what the library decodes from a Kindle
//! ebook. CLI argument parsing uses clap derive macros, with the top-level
//! [`app::Cli`] struct and [`app::Commands`] enum defined in [`app`] and
//! shared between `main.rs` and `build.rs` (for man page generation) via
//! `include!()`.
//!
//! Each subcommand module follows the same pattern: an `Options` struct holding
//! the parsed arguments and a `pub fn execute(opts, writer) -> Result<(), MobiError>`
//! entry point. The `writer: &mut dyn Write` parameter allows output to be
//! captured in tests or redirected to a file via the global `--output` flag.
//!
//! # Subcommands
//!
//! | Command | Module | Purpose |
//! |---------|--------|---------|
//! | `mobitool info` | [`info`] | PDB, record 0 and MOBI headers plus capability flags |
//! | `mobitool meta` | [`meta`] | Resolved metadata: title, authors, ASIN, language |
//! | `mobitool exth` | [`exth`] | EXTH records in file order |
//! | `mobitool records` | [`records`] | Record directory with offsets, sizes and magics |
//! | `mobitool index` | [`index`] | Entries of the skeleton, fragment, NCX, guide or dictionary indices |
//! | `mobitool dump` | [`dump`] | Hex dump of one record |
//! | `mobitool rawml` | [`rawml`] | RAWML part table, or extraction of the parts to a directory |
//!
//! # Common patterns
//!
//! - **`--json`** - Most subcommands emit structured JSON via
//!   `#[derive(Serialize)]` structs and `serde_json`.
//! - **`--kf7`** (global) - For hybrid files, inspect the legacy part.
//! - **`--mmap`** (global) - Read the file through a memory map.
//! - **`--color`** (global) - Control colored terminal output (`auto`, `always`,
//!   `never`).
//! - **`--output` / `-o`** (global) - Redirect output to a file instead of stdout.
//!
//! The `wprintln!` and `wprint!` macros wrap `writeln!`/`write!` to convert
//! `io::Error` into `MobiError`.

pub mod app;
pub mod dump;
pub mod exth;
pub mod index;
pub mod info;
pub mod meta;
pub mod rawml;
pub mod records;

/// Write a line to the given writer, converting io::Error to MobiError.
macro_rules! wprintln {
    ($w:expr) => {
        writeln!($w).map_err(|e| $crate::MobiError::Io(e.to_string()))
    };
    ($w:expr, $($arg:tt)*) => {
        writeln!($w, $($arg)*).map_err(|e| $crate::MobiError::Io(e.to_string()))
    };
}

/// Write (without newline) to the given writer, converting io::Error to MobiError.
macro_rules! wprint {
    ($w:expr, $($arg:tt)*) => {
        write!($w, $($arg)*).map_err(|e| $crate::MobiError::Io(e.to_string()))
    };
}

pub(crate) use wprint;
pub(crate) use wprintln;

use serde::Serialize;

use crate::mobi::book::{Book, BookOptions};
use crate::MobiError;

/// Open a book, selecting mmap or buffered I/O based on the flag.
///
/// `kf7` makes the legacy part primary for hybrid files.
pub(crate) fn open_book(
    path: &str,
    use_mmap: bool,
    kf7: bool,
    tolerance: Option<usize>,
) -> Result<Book, MobiError> {
    let mut options = BookOptions::default().with_kf8(!kf7);
    if let Some(bytes) = tolerance {
        options = options.with_text_length_tolerance(bytes);
    }
    if use_mmap {
        Book::open_mmap_with_options(path, options)
    } else {
        Book::open_with_options(path, options)
    }
}

/// Serialize `value` as pretty JSON and write it out.
pub(crate) fn write_json<T: Serialize + ?Sized>(
    writer: &mut dyn std::io::Write,
    value: &T,
) -> Result<(), MobiError> {
    use std::io::Write;
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| MobiError::Format(format!("JSON serialization error: {}", e)))?;
    wprintln!(writer, "{}", json)
}
