//! `xxd`-style hexdump used to diff binary content line by line.

use std::fmt::Write as _;

/// Bytes rendered per hexdump line.
pub const BYTES_PER_LINE: usize = 16;

/// Render `bytes` as hexdump lines: offset, hex pairs grouped by two bytes,
/// then the printable ASCII column.
pub fn hexdump(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 4 + 16);
    for (index, chunk) in bytes.chunks(BYTES_PER_LINE).enumerate() {
        let _ = write!(out, "{:08x}:", index * BYTES_PER_LINE);
        for pair in 0..BYTES_PER_LINE / 2 {
            out.push(' ');
            for offset in [pair * 2, pair * 2 + 1] {
                match chunk.get(offset) {
                    Some(b) => {
                        let _ = write!(out, "{b:02x}");
                    }
                    None => out.push_str("  "),
                }
            }
        }
        out.push_str("  ");
        out.extend(chunk.iter().map(|&b| {
            if b.is_ascii_graphic() || b == b' ' {
                b as char
            } else {
                '.'
            }
        }));
        out.push('\n');
    }
    out
}
