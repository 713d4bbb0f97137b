use serde::{Deserialize, Serialize};

use super::region::Region;

/// A named, independently replaceable collection of regions.
///
/// The name is the layer's identity across reparses: a new parse result
/// replaces a layer's regions wholesale, regions from two generations are
/// never merged.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Layer {
    pub name: String,
    pub regions: Vec<Region>,
}

impl Layer {
    /// Create an empty layer
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            regions: Vec::new(),
        }
    }

    /// Create a layer with the given regions
    pub fn with_regions(name: impl Into<String>, regions: Vec<Region>) -> Self {
        Self {
            name: name.into(),
            regions,
        }
    }

    pub fn push(&mut self, region: Region) {
        self.regions.push(region);
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Regions covering a char offset
    pub fn regions_at(&self, offset: usize) -> impl Iterator<Item = &Region> {
        self.regions
            .iter()
            .filter(move |region| region.contains(offset))
    }

    /// Pull every region into `[0, doc_len]`, dropping any that are still invalid.
    ///
    /// Remapping with a malformed edit batch (an offset past the end of the
    /// document) can leave bounds outside the text; those are clamped rather
    /// than published.
    pub fn clamp_to(&self, doc_len: usize) -> Layer {
        let mut regions = Vec::with_capacity(self.regions.len());
        for region in &self.regions {
            let clamped = Region {
                start: region.start.min(doc_len),
                end: region.end.min(doc_len),
                kind: region.kind.clone(),
            };
            if clamped.is_valid_for(doc_len) {
                regions.push(clamped);
            } else {
                log::warn!(
                    target: "highlight_sync::remap",
                    "Dropping invalid region {}..{} ({}) in layer '{}'",
                    region.start,
                    region.end,
                    region.kind,
                    self.name
                );
            }
        }
        Layer {
            name: self.name.clone(),
            regions,
        }
    }
}
