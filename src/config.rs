pub mod settings;
pub mod user;

pub use settings::{DEFAULT_CANCEL_CHECK_INTERVAL, DEFAULT_DEBOUNCE_MS, HighlightSettings};
pub use user::{load_user_settings, user_config_path};

use std::collections::HashMap;

/// Merge two HighlightSettings, preferring values from `primary` over `fallback`.
///
/// Scalars come from `primary`; `layer_names` are merged key by key with
/// `primary` winning.
pub fn merge_settings(
    fallback: Option<HighlightSettings>,
    primary: Option<HighlightSettings>,
) -> Option<HighlightSettings> {
    match (fallback, primary) {
        (None, None) => None,
        (Some(settings), None) => Some(settings),
        (None, Some(settings)) => Some(settings),
        (Some(fallback), Some(primary)) => Some(HighlightSettings {
            layer_names: merge_layer_names(fallback.layer_names, primary.layer_names),
            ..primary
        }),
    }
}

fn merge_layer_names(
    mut fallback: HashMap<String, String>,
    primary: HashMap<String, String>,
) -> HashMap<String, String> {
    for (key, value) in primary {
        fallback.insert(key, value);
    }
    fallback
}
