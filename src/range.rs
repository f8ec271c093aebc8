//! Conversions between byte offsets and LSP positions.
//!
//! Positions use character columns, counted on a [`Rope`] of the document.

use std::ops::Range;

use ropey::Rope;
use tower_lsp::lsp_types::{self, Position};

/// Convert a byte range of the document into an LSP range.
pub fn lsp_range(rope: &Rope, range: Range<usize>) -> lsp_types::Range {
    lsp_types::Range {
        start: lsp_position(rope, range.start),
        end: lsp_position(rope, range.end),
    }
}

pub fn lsp_position(rope: &Rope, byte: usize) -> Position {
    let char_idx = rope.byte_to_char(byte.min(rope.len_bytes()));
    let line = rope.char_to_line(char_idx);
    let character = char_idx - rope.line_to_char(line);
    Position {
        line: line as u32,
        character: character as u32,
    }
}

/// Byte offset of an LSP position; columns past the end of a line clamp to it.
pub fn byte_offset(rope: &Rope, position: Position) -> Option<usize> {
    let line = position.line as usize;
    if line >= rope.len_lines() {
        return None;
    }
    let line_start = rope.line_to_char(line);
    let line_slice = rope.line(line);
    let mut line_len = line_slice.len_chars();
    // Keep the cursor before the line break.
    while line_len > 0 && matches!(line_slice.char(line_len - 1), '\n' | '\r') {
        line_len -= 1;
    }
    let char_idx = line_start + (position.character as usize).min(line_len);
    Some(rope.char_to_byte(char_idx))
}
