use tree_sitter::{InputEdit, Point};

/// Convert a byte offset to a tree-sitter Point (row, column in bytes)
pub fn byte_to_point(text: &str, byte_offset: usize) -> Point {
    let mut row = 0usize;
    let mut column = 0usize;

    for &byte in text.as_bytes().iter().take(byte_offset) {
        if byte == b'\n' {
            row += 1;
            column = 0;
        } else {
            column += 1;
        }
    }

    Point { row, column }
}

/// Derive a single InputEdit from the common prefix and suffix of two texts.
///
/// Returns None if the texts are identical. Edit bounds are snapped to
/// char boundaries so the edit never splits a multi-byte character.
pub fn compute_incremental_edit(old_src: &str, new_src: &str) -> Option<InputEdit> {
    if old_src == new_src {
        return None;
    }

    let old_bytes = old_src.as_bytes();
    let new_bytes = new_src.as_bytes();

    let mut start = 0;
    let max_start = old_bytes.len().min(new_bytes.len());
    while start < max_start && old_bytes[start] == new_bytes[start] {
        start += 1;
    }
    while start > 0 && !old_src.is_char_boundary(start) {
        start -= 1;
    }

    // Common suffix, not overlapping the prefix
    let mut old_end = old_bytes.len();
    let mut new_end = new_bytes.len();
    while old_end > start && new_end > start && old_bytes[old_end - 1] == new_bytes[new_end - 1] {
        old_end -= 1;
        new_end -= 1;
    }
    while old_end < old_bytes.len() && !old_src.is_char_boundary(old_end) {
        old_end += 1;
        new_end += 1;
    }

    Some(InputEdit {
        start_byte: start,
        old_end_byte: old_end,
        new_end_byte: new_end,
        start_position: byte_to_point(old_src, start),
        old_end_position: byte_to_point(old_src, old_end),
        new_end_position: byte_to_point(new_src, new_end),
    })
}
