pub mod highlight_parser;
pub mod incremental;

pub use highlight_parser::TreeSitterLayerParser;
pub use incremental::{byte_to_point, compute_incremental_edit};
