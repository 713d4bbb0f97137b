//! User configuration loading for highlight-sync.
//!
//! User config location: $XDG_CONFIG_HOME/highlight-sync/highlight-sync.toml
//! Fallback: the platform config directory reported by `dirs`.

use std::path::PathBuf;

use super::settings::HighlightSettings;
use crate::error::HighlightResult;

const CONFIG_DIR_NAME: &str = "highlight-sync";
const CONFIG_FILE_NAME: &str = "highlight-sync.toml";

/// Returns the path to the user configuration file.
///
/// The path is determined by:
/// 1. If $XDG_CONFIG_HOME is set: $XDG_CONFIG_HOME/highlight-sync/highlight-sync.toml
/// 2. Otherwise: `dirs::config_dir()`/highlight-sync/highlight-sync.toml
///
/// Returns None if neither location can be determined.
pub fn user_config_path() -> Option<PathBuf> {
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME")
        && !xdg_config.is_empty()
    {
        return Some(
            PathBuf::from(xdg_config)
                .join(CONFIG_DIR_NAME)
                .join(CONFIG_FILE_NAME),
        );
    }

    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Load the user configuration, falling back to defaults when there is none.
///
/// A file that exists but fails to parse is an error, not a silent default.
pub fn load_user_settings() -> HighlightResult<HighlightSettings> {
    match user_config_path() {
        Some(path) if path.exists() => HighlightSettings::load(&path),
        _ => Ok(HighlightSettings::default()),
    }
}
