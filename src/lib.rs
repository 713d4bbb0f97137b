pub mod config;
pub mod document;
pub mod error;
pub mod highlight;
pub mod language;
pub mod text;
pub mod treesitter;

pub use config::HighlightSettings;
pub use document::{Layer, Region};
pub use error::{HighlightError, HighlightResult};
pub use highlight::{HighlightCoordinator, HighlightHost, ParseFailure, ParsePhase};
pub use language::{Grammar, LayerParser, ParseCancellation};
pub use text::Edit;
pub use treesitter::TreeSitterLayerParser;
