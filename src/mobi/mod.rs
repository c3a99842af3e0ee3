//! MOBI/KF8 binary format parsing.
//!
//! This module contains types and functions for reading the on-disk
//! structures of Kindle ebooks: the Palm Database container, the record 0
//! headers, EXTH metadata, INDX indices, and the compressed text records
//! that make up the RAWML markup stream.
//!
//! Start with [`book::Book`] to open a file, then use its accessors or the
//! lower-level parsers directly.

pub mod book;
pub mod compression;
pub mod constants;
pub mod exth;
pub mod header;
pub mod huffcdic;
pub mod index;
pub mod locale;
pub mod pdb;
pub mod rawml;
pub mod record;
