use crate::document::Layer;
use crate::error::HighlightError;

/// The editor side of the highlighting contract.
///
/// Callbacks may run under the coordinator's lock, so implementations must
/// not call back into the coordinator from them.
pub trait HighlightHost: Send + Sync {
    /// Full document text. When the host reports edits, this already
    /// reflects them.
    fn current_text(&self) -> String;

    /// Highlight layers the host currently displays
    fn current_layers(&self) -> Vec<Layer>;

    /// Store a new layer set for rendering
    fn replace_layers(&self, layers: Vec<Layer>);

    /// Diagnostic hookpoint for failed parses.
    ///
    /// Highlighting stays as it was; the host decides whether to surface
    /// anything to the user.
    fn report_failure(&self, failure: &ParseFailure) {
        log::warn!(
            target: "highlight_sync::coordinator",
            "Parse failed for generation {} ({} in a row): {}",
            failure.generation,
            failure.consecutive_failures,
            failure.error
        );
    }
}

/// A parse failure forwarded to the host
#[derive(Debug)]
pub struct ParseFailure {
    /// Generation whose parse failed
    pub generation: u64,
    /// Failures since the last successful parse, this one included
    pub consecutive_failures: u32,
    pub error: HighlightError,
}
