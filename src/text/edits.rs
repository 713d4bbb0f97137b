//! Edit descriptors and the optimistic region remapper.
//!
//! Remapping shifts previously computed regions so they keep pointing at
//! roughly the same text right after a keystroke, without reparsing. The
//! result is allowed to be semantically stale; an authoritative parse
//! replaces it shortly after.

use super::offsets::CharOffsets;
use crate::document::{Layer, Region};

/// One contiguous text mutation, in char offsets.
///
/// `removed` is what occupied `[at, at + removed_len)` before the edit;
/// `inserted` is what occupies that position afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub at: usize,
    pub removed: String,
    pub inserted: String,
}

impl Edit {
    pub fn new(at: usize, removed: impl Into<String>, inserted: impl Into<String>) -> Self {
        Self {
            at,
            removed: removed.into(),
            inserted: inserted.into(),
        }
    }

    /// Pure insertion at `at`
    pub fn insert(at: usize, inserted: impl Into<String>) -> Self {
        Self::new(at, String::new(), inserted)
    }

    /// Pure deletion of `removed` starting at `at`
    pub fn delete(at: usize, removed: impl Into<String>) -> Self {
        Self::new(at, removed, String::new())
    }

    /// Replacement of `removed` by `inserted` at `at`
    pub fn replace(at: usize, removed: impl Into<String>, inserted: impl Into<String>) -> Self {
        Self::new(at, removed, inserted)
    }

    pub fn removed_len(&self) -> usize {
        self.removed.chars().count()
    }

    pub fn inserted_len(&self) -> usize {
        self.inserted.chars().count()
    }

    /// Length change caused by this edit (positive for growth)
    pub fn delta(&self) -> i64 {
        self.inserted_len() as i64 - self.removed_len() as i64
    }

    /// True when the edit neither removes nor inserts anything
    pub fn is_noop(&self) -> bool {
        self.removed.is_empty() && self.inserted.is_empty()
    }

    /// Apply this edit to a text buffer.
    ///
    /// `at` and the removed span are clamped to the buffer, so a malformed
    /// edit never panics.
    pub fn apply_to(&self, text: &mut String) {
        let offsets = CharOffsets::new(text);
        let start = offsets.char_to_byte(self.at);
        let end = offsets.char_to_byte(self.at.saturating_add(self.removed_len()));
        text.replace_range(start..end, &self.inserted);
    }
}

/// Char offset as a signed coordinate; offsets past `i64::MAX` saturate
fn signed(offset: usize) -> i64 {
    i64::try_from(offset).unwrap_or(i64::MAX)
}

/// Shift a single region through an ordered batch of edits.
///
/// Each edit is interpreted against the document as it was after the
/// previous edits in the batch. Per edit:
/// - an edit starting after the region's end leaves it alone;
/// - equal-length replacements leave bounds unchanged;
/// - otherwise `end` moves by the delta and is clamped to the edit point,
///   and `start` moves likewise only when the edit starts at or before it.
///
/// The end clamp is applied before the start check; together they collapse
/// a region swallowed by a deletion to `{at, at}`.
pub fn remap_region(region: &Region, edits: &[Edit]) -> Region {
    let mut start = signed(region.start);
    let mut end = signed(region.end);

    for edit in edits {
        let at = signed(edit.at);
        if at > end {
            continue;
        }
        let delta = edit.delta();
        if delta == 0 {
            continue;
        }

        end = end.saturating_add(delta).max(at);
        if at > start {
            continue;
        }
        start = start.saturating_add(delta).max(at);
    }

    Region {
        start: start as usize,
        end: end as usize,
        kind: region.kind.clone(),
    }
}

/// Remap every region of a layer, producing a new layer with the same name
pub fn remap_layer(layer: &Layer, edits: &[Edit]) -> Layer {
    Layer {
        name: layer.name.clone(),
        regions: layer
            .regions
            .iter()
            .map(|region| remap_region(region, edits))
            .collect(),
    }
}

/// Remap a full layer set, preserving layer order
pub fn remap_layers(layers: &[Layer], edits: &[Edit]) -> Vec<Layer> {
    layers.iter().map(|layer| remap_layer(layer, edits)).collect()
}
