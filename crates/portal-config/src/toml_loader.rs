//! TOML settings loading.

use crate::schema::PopupSettings;
use crate::validation;
use portal_common::ConfigError;
use std::path::{Path, PathBuf};
use tracing::info;

/// Parse and validate settings from a TOML string.
///
/// Missing fields take their defaults.
pub fn load_from_str(content: &str) -> Result<PopupSettings, ConfigError> {
    let settings: PopupSettings = toml::from_str(content)
        .map_err(|e| ConfigError::ParseError(format!("failed to parse TOML: {e}")))?;
    validation::validate(&settings)?;
    Ok(settings)
}

/// Load settings from a specific TOML file path.
pub fn load_from_path(path: &Path) -> Result<PopupSettings, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path).map_err(|e| {
        ConfigError::ParseError(format!("failed to read {}: {e}", path.display()))
    })?;

    let settings = load_from_str(&content)?;
    info!(path = %path.display(), env = ?settings.env, "loaded popup settings");
    Ok(settings)
}

/// Load settings from the platform default path, or defaults if no file exists.
///
/// On macOS: `~/Library/Application Support/portal/popup.toml`
/// On Linux: `~/.config/portal/popup.toml`
pub fn load_default() -> Result<PopupSettings, ConfigError> {
    let path = default_config_path()?;

    if !path.exists() {
        info!("no popup settings at {}, using defaults", path.display());
        return Ok(PopupSettings::default());
    }

    load_from_path(&path)
}

/// Get the platform-specific default settings file path.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let config_dir = dirs::config_dir().ok_or_else(|| {
        ConfigError::ParseError("could not determine config directory".into())
    })?;
    Ok(config_dir.join("portal").join("popup.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Environment;

    #[test]
    fn empty_toml_yields_defaults() {
        let settings = load_from_str("").unwrap();
        assert_eq!(settings, PopupSettings::default());
    }

    #[test]
    fn accepts_snake_and_camel_keys() {
        let settings = load_from_str(
            r#"
popup_src = "https://popup.example.com/popup.html"
supportedBrowser = false
env = "electron"
"#,
        )
        .unwrap();
        assert_eq!(settings.popup_src, "https://popup.example.com/popup.html");
        assert!(!settings.supported_browser);
        assert_eq!(settings.env, Environment::Electron);
    }

    #[test]
    fn unknown_keys_are_passed_through() {
        let settings = load_from_str(
            r#"
debug = true
lazyLoad = false
"#,
        )
        .unwrap();
        assert_eq!(settings.extra["debug"], serde_json::Value::Bool(true));
        assert_eq!(settings.extra["lazyLoad"], serde_json::Value::Bool(false));
    }

    #[test]
    fn invalid_toml_is_a_parse_error() {
        let err = load_from_str("popupSrc = ").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn invalid_settings_fail_validation() {
        let err = load_from_str(r#"popupSrc = "about:blank""#).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");
        let err = load_from_path(&path).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(p) if p == path));
    }

    #[test]
    fn loads_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("popup.toml");
        std::fs::write(
            &path,
            r#"
popupSrc = "http://localhost:8088/popup.html"
env = "webextension"
"#,
        )
        .unwrap();

        let settings = load_from_path(&path).unwrap();
        assert_eq!(settings.env, Environment::WebExtension);
        assert_eq!(settings.origin().as_deref(), Some("http://localhost:8088"));
    }

    #[test]
    fn default_path_ends_with_portal_popup_toml() {
        if let Ok(path) = default_config_path() {
            assert!(path.ends_with("portal/popup.toml"));
        }
    }
}
