//! Kindle MOBI/AZW3 ebook reader.
//!
//! The `mobi-utils` crate (library name `mobi`) provides Rust types and
//! functions for reading Kindle ebook files: the Palm Database container,
//! the record 0 headers (PalmDOC, MOBI, EXTH), the KF8 auxiliary indices,
//! and the decompressed markup stream (RAWML) with its typed parts.
//!
//! # CLI Reference
//!
//! The `mobitool` binary (feature `cli`, on by default) prints what the
//! library decodes.
//!
//! | Command | Purpose |
//! |---------|---------|
//! | [`mobitool info`](cli::app::Commands::Info) | PDB, record 0 and MOBI headers, capability flags |
//! | [`mobitool meta`](cli::app::Commands::Meta) | Resolved metadata (title, author, ASIN, ...) |
//! | [`mobitool exth`](cli::app::Commands::Exth) | EXTH records in file order |
//! | [`mobitool records`](cli::app::Commands::Records) | Record directory with sizes and magics |
//! | [`mobitool index`](cli::app::Commands::Index) | Entries of a KF8 or dictionary index |
//! | [`mobitool dump`](cli::app::Commands::Dump) | Hex dump of a single record |
//! | [`mobitool rawml`](cli::app::Commands::Rawml) | RAWML part table, or extract parts to a directory |
//!
//! All subcommands accept `--color <auto|always|never>`, `--output <file>`
//! and `-v` (repeat for more log output).
//!
//! # Library API
//!
//! ```no_run
//! use mobi::mobi::book::Book;
//!
//! let book = Book::open("lorem.azw3").unwrap();
//! println!("Title: {}", book.title());
//! println!("KF8: {}", book.is_kf8());
//!
//! // Text decompression is deferred until the RAWML is requested
//! let rawml = book.rawml().unwrap();
//! for part in rawml.markup() {
//!     println!("part{:05}.{} ({} bytes)", part.uid, part.file_type, part.size());
//! }
//! ```
//!
//! ## Key entry points
//!
//! | Type / Function | Purpose |
//! |-----------------|---------|
//! | [`Book`](mobi::book::Book) | Open files, metadata accessors, capability flags |
//! | [`PdbHeader`](mobi::pdb::PdbHeader) | The 78-byte Palm Database header |
//! | [`MobiHeader`](mobi::header::MobiHeader) | Record 0 MOBI header |
//! | [`ExthHeader`](mobi::exth::ExthHeader) | Extended metadata records |
//! | [`Index`](mobi::index::Index) | TAGX-driven INDX decoding |
//! | [`Rawml`](mobi::rawml::Rawml) | Reconstructed markup and resources |
//!
//! ## Module overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`mobi::pdb`] | Palm Database header and record directory |
//! | [`mobi::record`] | Raw records and trailing entry stripping |
//! | [`mobi::header`] | PalmDOC and MOBI header parsing |
//! | [`mobi::locale`] | Locale code to language tag mapping |
//! | [`mobi::exth`] | EXTH tag table and record parsing |
//! | [`mobi::index`] | INDX/TAGX/CNCX index engine |
//! | [`mobi::compression`] | PalmDOC LZ77 and FONT inflation |
//! | [`mobi::huffcdic`] | HUFF/CDIC dictionary decompression |
//! | [`mobi::rawml`] | Text assembly and KF8 part reconstruction |
//! | [`mobi::book`] | The `Book` facade |
//! | [`mobi::constants`] | Container and header constants |

#[cfg(feature = "cli")]
pub mod cli;
pub mod mobi;
pub mod util;

use thiserror::Error;

/// Errors returned by `mobi` operations.
#[derive(Error, Debug)]
pub enum MobiError {
    /// An I/O error occurred (file open, read, seek, or write failure).
    #[error("I/O error: {0}")]
    Io(String),

    /// A structural violation: bad magic, truncated header, directory or length mismatch.
    #[error("Format error: {0}")]
    Format(String),

    /// A text encoding or locale code the reader does not know.
    #[error("Unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    /// A corrupt PalmDOC, HUFF/CDIC or FONT stream.
    #[error("Decompression error: {0}")]
    Decompression(String),

    /// An invalid argument was supplied (out-of-range record number, unknown index name, etc.).
    #[error("Invalid argument: {0}")]
    Argument(String),
}
