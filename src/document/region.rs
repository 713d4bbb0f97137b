use serde::{Deserialize, Serialize};

/// A highlighted span of the document, measured in char offsets.
///
/// `start == end` is a zero-width marker and is kept like any other region.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    pub start: usize,
    pub end: usize,
    /// Highlight capture name, e.g. `keyword` or `string.escape`
    pub kind: String,
}

impl Region {
    pub fn new(start: usize, end: usize, kind: impl Into<String>) -> Self {
        Self {
            start,
            end,
            kind: kind.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// True for zero-width markers
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Half-open containment check
    pub fn contains(&self, offset: usize) -> bool {
        offset >= self.start && offset < self.end
    }

    /// Check `start <= end <= doc_len`
    pub fn is_valid_for(&self, doc_len: usize) -> bool {
        self.start <= self.end && self.end <= doc_len
    }

    /// The highlight category: the kind up to its first `.`
    pub fn category(&self) -> &str {
        self.kind.split('.').next().unwrap_or(&self.kind)
    }
}
