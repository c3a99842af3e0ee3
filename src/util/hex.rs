//! Hex dump formatting utilities.
//!
//! Helpers for formatting file offsets, record magics, and producing
//! traditional hex dump output with offset columns and ASCII sidebars.

use std::fmt::Write;

/// Format a byte offset as "decimal (0xhex)".
pub fn format_offset(offset: u64) -> String {
    format!("{} (0x{:x})", offset, offset)
}

/// Format a u32 value as hex with 0x prefix.
pub fn format_hex32(value: u32) -> String {
    format!("0x{:08x}", value)
}

/// Lowercase hex digits with no separators, e.g. `e98e0d0a`.
pub fn format_bytes(data: &[u8]) -> String {
    data.iter().fold(String::with_capacity(data.len() * 2), |mut out, b| {
        let _ = write!(out, "{:02x}", b);
        out
    })
}

/// Render a 4-byte record magic for display.
///
/// Printable ASCII magics come back as text (`"INDX"`, `"FLIS"`); anything
/// else as hex so binary records stay readable in a table.
pub fn format_magic(magic: &[u8]) -> String {
    if !magic.is_empty() && magic.iter().all(|&b| is_printable(b)) {
        String::from_utf8_lossy(magic).into_owned()
    } else {
        format_bytes(magic)
    }
}

fn is_printable(b: u8) -> bool {
    b.is_ascii_graphic() || b == b' '
}

const DUMP_WIDTH: usize = 16;

/// Hex dump of a record, 16 bytes per row.
///
/// Rows start with the absolute file offset (`base_offset` is where `data`
/// begins), the bytes are split in two groups of eight, and the ASCII
/// column is framed by `|`:
///
/// ```text
/// 00000190  4d 4f 42 49 00 00 01 08  00 00 00 02 00 00 fd e9  |MOBI............|
/// ```
pub fn hex_dump(data: &[u8], base_offset: u64) -> String {
    let mut out = String::new();
    for (row, chunk) in data.chunks(DUMP_WIDTH).enumerate() {
        if row > 0 {
            out.push('\n');
        }
        let _ = write!(out, "{:08x} ", base_offset + (row * DUMP_WIDTH) as u64);
        for col in 0..DUMP_WIDTH {
            if col % 8 == 0 {
                out.push(' ');
            }
            match chunk.get(col) {
                Some(b) => {
                    let _ = write!(out, "{:02x} ", b);
                }
                None => out.push_str("   "),
            }
        }
        let ascii: String = chunk
            .iter()
            .map(|&b| if is_printable(b) { b as char } else { '.' })
            .collect();
        let _ = write!(out, " |{:<width$}|", ascii, width = DUMP_WIDTH);
    }
    out
}
