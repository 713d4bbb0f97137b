use tokio_util::sync::CancellationToken;

use crate::document::Layer;
use crate::error::{HighlightError, HighlightResult};

/// Cooperative cancellation signal handed to a running parse.
///
/// Parsers poll it at bounded intervals; the coordinator cancels it when a
/// newer edit supersedes the parse.
#[derive(Debug, Clone, Default)]
pub struct ParseCancellation {
    token: CancellationToken,
}

impl ParseCancellation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Returns `Err(HighlightError::Cancelled)` once cancellation was requested
    pub fn check(&self) -> HighlightResult<()> {
        if self.token.is_cancelled() {
            Err(HighlightError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Resolves when cancellation is requested
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }
}

/// Capability that derives the authoritative layer set from full document text.
///
/// Grammars are separate implementations of this one trait, chosen by the
/// host. The coordinator waits for a superseded parse to return before
/// starting the next one, so implementations may assume serialized
/// invocation per document.
pub trait LayerParser: Send + Sync {
    /// Identifies the parser, e.g. `go-syntax-highlight`
    fn name(&self) -> &str;

    /// Parse `text` into layers, checking `cancel` during long work.
    ///
    /// Returning `Err(HighlightError::Cancelled)` is not a failure; the
    /// coordinator drops it silently.
    fn parse(&self, text: &str, cancel: &ParseCancellation) -> HighlightResult<Vec<Layer>>;
}
