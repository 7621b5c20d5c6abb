//! Settings validation.
//!
//! Collects every problem before failing so a broken file is reported once.

use crate::schema::PopupSettings;
use portal_common::ConfigError;

/// Run all validations on the settings, collecting all errors.
pub fn validate(settings: &PopupSettings) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    if settings.popup_src.trim().is_empty() {
        errors.push("popupSrc must not be empty".into());
    } else if settings.origin().is_none() {
        errors.push(format!(
            "popupSrc '{}' has no usable origin",
            settings.popup_src
        ));
    }

    if settings.popup_src.contains('#') {
        errors.push("popupSrc must not carry a fragment".into());
    }

    if settings.channel_name.trim().is_empty() {
        errors.push("channelName must not be empty".into());
    }

    if settings.permissions_page.trim().is_empty() {
        errors.push("permissionsPage must not be empty".into());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_are_valid() {
        assert!(validate(&PopupSettings::default()).is_ok());
    }

    #[test]
    fn rejects_opaque_popup_src() {
        let settings = PopupSettings::with_src("about:blank");
        let err = validate(&settings).unwrap_err();
        assert!(err.to_string().contains("no usable origin"));
    }

    #[test]
    fn rejects_fragment_in_popup_src() {
        let settings = PopupSettings::with_src("https://a.example/popup.html#loading");
        let err = validate(&settings).unwrap_err();
        assert!(err.to_string().contains("fragment"));
    }

    #[test]
    fn collects_all_errors() {
        let settings = PopupSettings {
            popup_src: String::new(),
            channel_name: " ".into(),
            permissions_page: String::new(),
            ..Default::default()
        };
        let msg = validate(&settings).unwrap_err().to_string();
        assert!(msg.contains("popupSrc must not be empty"));
        assert!(msg.contains("channelName"));
        assert!(msg.contains("permissionsPage"));
    }
}
