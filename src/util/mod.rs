//! Shared utilities (hex dump formatting, header-to-field mapping).

pub mod fields;
pub mod hex;
