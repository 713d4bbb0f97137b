/// Conversion table between byte offsets and char offsets of one text.
///
/// Tree-sitter reports byte offsets while regions are measured in chars.
/// ASCII text needs no table.
#[derive(Debug, Clone)]
pub struct CharOffsets {
    /// Byte index of every char start; `None` when the text is ASCII
    char_starts: Option<Vec<usize>>,
    byte_len: usize,
}

impl CharOffsets {
    pub fn new(text: &str) -> Self {
        let char_starts = if text.is_ascii() {
            None
        } else {
            Some(text.char_indices().map(|(byte, _)| byte).collect())
        };
        Self {
            char_starts,
            byte_len: text.len(),
        }
    }

    /// Number of chars in the text
    pub fn char_len(&self) -> usize {
        match &self.char_starts {
            Some(starts) => starts.len(),
            None => self.byte_len,
        }
    }

    /// Char offset of a byte offset.
    ///
    /// Offsets inside a multi-byte char round up to the next char; offsets
    /// past the end clamp to the char length.
    pub fn byte_to_char(&self, byte: usize) -> usize {
        match &self.char_starts {
            Some(starts) => starts.partition_point(|&start| start < byte),
            None => byte.min(self.byte_len),
        }
    }

    /// Byte offset of a char offset, clamped to the text length
    pub fn char_to_byte(&self, char_offset: usize) -> usize {
        match &self.char_starts {
            Some(starts) => starts.get(char_offset).copied().unwrap_or(self.byte_len),
            None => char_offset.min(self.byte_len),
        }
    }
}

/// Length of a text in chars
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}
