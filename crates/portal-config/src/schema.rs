//! Settings schema for the popup portal.
//!
//! Field names are camelCase on the wire because the whole struct is
//! forwarded to the popup inside the `popup-init` payload. TOML files may
//! use either the camelCase or the snake_case spelling.

use serde::{Deserialize, Serialize};

use crate::origin::origin_of;

/// Default location of the popup content.
pub const DEFAULT_POPUP_SRC: &str = "https://connect.trezor.io/8/popup.html";

/// Name the popup process uses when it opens an extension channel.
pub const DEFAULT_CHANNEL_NAME: &str = "trezor-connect";

/// Auxiliary page opened when the popup asks for device permissions.
pub const DEFAULT_PERMISSIONS_PAGE: &str = "trezor-usb-permissions.html";

// =============================================================================
// TYPES
// =============================================================================

/// Execution environment of the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Plain browser page or tab.
    #[default]
    Web,
    /// Desktop shell embedding a browser engine.
    Electron,
    /// Browser extension; the popup lives in a tab and talks over a named channel.
    #[serde(rename = "webextension")]
    WebExtension,
}

/// Settings read by the coordinator and forwarded verbatim to the popup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PopupSettings {
    /// URL of the popup content.
    #[serde(alias = "popup_src")]
    pub popup_src: String,
    pub env: Environment,
    /// Whether the current browser can run the popup at all.
    #[serde(alias = "supported_browser")]
    pub supported_browser: bool,
    /// Expected name of inbound extension channels.
    #[serde(alias = "channel_name")]
    pub channel_name: String,
    #[serde(alias = "permissions_page")]
    pub permissions_page: String,
    /// Opaque settings passed through to the popup untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

// =============================================================================
// DEFAULTS
// =============================================================================

impl Default for PopupSettings {
    fn default() -> Self {
        Self {
            popup_src: DEFAULT_POPUP_SRC.into(),
            env: Environment::Web,
            supported_browser: true,
            channel_name: DEFAULT_CHANNEL_NAME.into(),
            permissions_page: DEFAULT_PERMISSIONS_PAGE.into(),
            extra: serde_json::Map::new(),
        }
    }
}

impl PopupSettings {
    /// Settings pointing at a specific popup URL, everything else default.
    pub fn with_src(src: impl Into<String>) -> Self {
        Self {
            popup_src: src.into(),
            ..Default::default()
        }
    }

    /// Origin (`scheme://host[:port]`) of `popup_src`, if it has one.
    pub fn origin(&self) -> Option<String> {
        origin_of(&self.popup_src)
    }

    pub fn is_extension(&self) -> bool {
        self.env == Environment::WebExtension
    }
}

// =============================================================================
// TESTS
// =============================================================================
