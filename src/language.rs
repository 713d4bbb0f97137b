pub mod grammar;
pub mod parser;

// Re-export key types
pub use grammar::Grammar;
pub use parser::{LayerParser, ParseCancellation};
