use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{HighlightError, HighlightResult};

/// Default delay between an edit and the reparse it schedules.
///
/// Old highlights stay visible (remapped) during the wait, so this can be short.
pub const DEFAULT_DEBOUNCE_MS: u64 = 30;

/// Default number of query captures processed between cancellation checks.
pub const DEFAULT_CANCEL_CHECK_INTERVAL: usize = 256;

/// Tunables for the highlight coordinator and the tree-sitter adapter.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct HighlightSettings {
    /// Milliseconds a scheduled parse waits before running
    pub debounce_ms: u64,
    /// Captures processed between cancellation checks
    pub cancel_check_interval: usize,
    /// Consecutive failures before a failure is forwarded to the host
    pub failure_report_threshold: u32,
    /// Treat trees containing syntax errors as parse failures
    pub reject_error_trees: bool,
    /// Highlight category -> layer name overrides
    pub layer_names: HashMap<String, String>,
}

impl Default for HighlightSettings {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            cancel_check_interval: DEFAULT_CANCEL_CHECK_INTERVAL,
            failure_report_threshold: 1,
            reject_error_trees: false,
            layer_names: HashMap::new(),
        }
    }
}

impl HighlightSettings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Layer name for a highlight category
    pub fn layer_name<'a>(&'a self, category: &'a str) -> &'a str {
        self.layer_names
            .get(category)
            .map(String::as_str)
            .unwrap_or(category)
    }

    /// Parse settings from TOML and validate them
    pub fn from_toml_str(source: &str) -> HighlightResult<Self> {
        let settings: HighlightSettings = toml::from_str(source)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a TOML file
    pub fn load(path: &Path) -> HighlightResult<Self> {
        let source = std::fs::read_to_string(path)?;
        let settings = Self::from_toml_str(&source)?;
        log::debug!(
            target: "highlight_sync::config",
            "Loaded settings from {}",
            path.display()
        );
        Ok(settings)
    }

    pub fn validate(&self) -> HighlightResult<()> {
        if self.cancel_check_interval == 0 {
            return Err(HighlightError::config(
                "cancel_check_interval must be greater than 0",
            ));
        }
        Ok(())
    }
}
