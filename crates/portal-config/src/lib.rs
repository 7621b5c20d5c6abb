//! Popup portal settings.
//!
//! Provides the settings schema shared by the coordinator and the popup,
//! origin derivation, and TOML loading with validation. Every field has a
//! default, so partial files work out of the box.

pub mod origin;
pub mod schema;
pub mod toml_loader;
pub mod validation;

pub use origin::{origin_of, same_origin};
pub use schema::{Environment, PopupSettings};
pub use toml_loader::{load_from_path, load_from_str};

use portal_common::ConfigError;
use std::path::Path;

/// Load settings from `path` when given, otherwise from the platform default.
pub fn load_settings(path: Option<&Path>) -> Result<PopupSettings, ConfigError> {
    match path {
        Some(path) => toml_loader::load_from_path(path),
        None => toml_loader::load_default(),
    }
}

/// Serialize settings to a pretty-printed JSON string.
pub fn settings_to_json(settings: &PopupSettings) -> String {
    serde_json::to_string_pretty(settings)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize settings: {e}\"}}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_to_json_uses_wire_names() {
        let json = settings_to_json(&PopupSettings::default());
        assert!(json.contains("\"popupSrc\""));
        assert!(json.contains("\"supportedBrowser\""));
        assert!(json.contains("\"channelName\""));
    }

    #[test]
    fn load_settings_prefers_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("popup.toml");
        std::fs::write(&path, "supportedBrowser = false\n").unwrap();

        let settings = load_settings(Some(&path)).unwrap();
        assert!(!settings.supported_browser);
    }
}
