pub mod edits;
pub mod offsets;

pub use edits::{Edit, remap_layer, remap_layers, remap_region};
pub use offsets::{CharOffsets, char_len};
