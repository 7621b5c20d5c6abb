//! Control messages exchanged with the popup and the content layer.
//!
//! Inbound traffic arrives as loosely typed JSON (`{ "type": ..., "payload": ... }`)
//! from either window messaging or the extension channel. Only the
//! handshake-control types are interpreted here; everything else is ignored.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use portal_config::PopupSettings;

/// Content layer finished loading (always sent over window messaging).
pub const IFRAME_LOADED: &str = "iframe-loaded";
/// Popup process started; its open timeout can be cancelled.
pub const POPUP_BOOTSTRAP: &str = "popup-bootstrap";
/// Popup finished loading and waits for `popup-init`.
pub const POPUP_LOADED: &str = "popup-loaded";
/// Outbound initialization carrying the current settings.
pub const POPUP_INIT: &str = "popup-init";
pub const POPUP_ERROR: &str = "popup-error";
/// Popup asks for the device permissions page (extension only).
pub const POPUP_PERMISSIONS_REQUEST: &str = "open-usb-permissions";
/// Popup asks the host to close it and report the close.
pub const POPUP_CLOSE_WINDOW: &str = "window.close";
pub const POPUP_CANCEL_REQUEST: &str = "ui-cancel-popup-request";
pub const UI_CLOSE_WINDOW: &str = "ui-close_window";
/// Outbound message that is allowed to precede the popup itself.
pub const UI_REQUEST_WINDOW: &str = "ui-request_window";

/// A recognized inbound control message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    ContentLoaded,
    Bootstrap,
    Loaded,
    Error { reason: Option<String> },
    PermissionsRequest,
    CloseWindow,
    CancelRequest,
    CloseUiWindow,
}

impl ControlMessage {
    /// Interpret raw message data. Non-objects, objects without a string
    /// `type`, and unknown types all yield `None`.
    pub fn parse(data: &Value) -> Option<Self> {
        let obj = data.as_object()?;
        let kind = obj.get("type")?.as_str()?;

        let message = match kind {
            IFRAME_LOADED => Self::ContentLoaded,
            POPUP_BOOTSTRAP => Self::Bootstrap,
            POPUP_LOADED => Self::Loaded,
            POPUP_ERROR => Self::Error {
                reason: obj
                    .get("payload")
                    .and_then(|payload| payload.get("error"))
                    .and_then(Value::as_str)
                    .filter(|reason| !reason.is_empty())
                    .map(str::to_owned),
            },
            POPUP_PERMISSIONS_REQUEST => Self::PermissionsRequest,
            POPUP_CLOSE_WINDOW => Self::CloseWindow,
            POPUP_CANCEL_REQUEST => Self::CancelRequest,
            UI_CLOSE_WINDOW => Self::CloseUiWindow,
            _ => return None,
        };
        Some(message)
    }

    pub fn wire_type(&self) -> &'static str {
        match self {
            Self::ContentLoaded => IFRAME_LOADED,
            Self::Bootstrap => POPUP_BOOTSTRAP,
            Self::Loaded => POPUP_LOADED,
            Self::Error { .. } => POPUP_ERROR,
            Self::PermissionsRequest => POPUP_PERMISSIONS_REQUEST,
            Self::CloseWindow => POPUP_CLOSE_WINDOW,
            Self::CancelRequest => POPUP_CANCEL_REQUEST,
            Self::CloseUiWindow => UI_CLOSE_WINDOW,
        }
    }
}

/// A business message relayed to the popup. The payload is opaque.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub payload: Value,
}

impl CoreMessage {
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }

    /// A message with no payload.
    pub fn bare(kind: impl Into<String>) -> Self {
        Self::new(kind, Value::Null)
    }

    /// Whether this message may be sent before the popup has a handle.
    pub fn requests_window(&self) -> bool {
        self.kind == UI_REQUEST_WINDOW
    }

    pub fn to_value(&self) -> Value {
        match serde_json::to_value(self) {
            Ok(value) => value,
            Err(_) => json!({ "type": self.kind }),
        }
    }
}

/// Build the `popup-init` message carrying the current settings.
pub fn init_message(settings: &PopupSettings) -> Value {
    json!({
        "type": POPUP_INIT,
        "payload": {
            "settings": settings,
        },
    })
}

/// Format the host-facing text for a popup-reported failure.
pub fn popup_error_text(reason: &str) -> String {
    format!("Popup error: {reason}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_control_type() {
        let cases = [
            (IFRAME_LOADED, ControlMessage::ContentLoaded),
            (POPUP_BOOTSTRAP, ControlMessage::Bootstrap),
            (POPUP_LOADED, ControlMessage::Loaded),
            (POPUP_PERMISSIONS_REQUEST, ControlMessage::PermissionsRequest),
            (POPUP_CLOSE_WINDOW, ControlMessage::CloseWindow),
            (POPUP_CANCEL_REQUEST, ControlMessage::CancelRequest),
            (UI_CLOSE_WINDOW, ControlMessage::CloseUiWindow),
        ];
        for (kind, expected) in cases {
            let parsed = ControlMessage::parse(&json!({ "type": kind }));
            assert_eq!(parsed.as_ref(), Some(&expected), "type {kind}");
            assert_eq!(expected.wire_type(), kind);
        }
    }

    #[test]
    fn error_reason_extraction() {
        let with_reason = json!({ "type": POPUP_ERROR, "payload": { "error": "device busy" } });
        assert_eq!(
            ControlMessage::parse(&with_reason),
            Some(ControlMessage::Error {
                reason: Some("device busy".into())
            })
        );

        let non_string = json!({ "type": POPUP_ERROR, "payload": { "error": 42 } });
        assert_eq!(
            ControlMessage::parse(&non_string),
            Some(ControlMessage::Error { reason: None })
        );

        let no_payload = json!({ "type": POPUP_ERROR });
        assert_eq!(
            ControlMessage::parse(&no_payload),
            Some(ControlMessage::Error { reason: None })
        );

        let empty = json!({ "type": POPUP_ERROR, "payload": { "error": "" } });
        assert_eq!(
            ControlMessage::parse(&empty),
            Some(ControlMessage::Error { reason: None })
        );
    }

    #[test]
    fn ignores_non_objects_and_unknown_types() {
        assert_eq!(ControlMessage::parse(&json!("popup-loaded")), None);
        assert_eq!(ControlMessage::parse(&json!(null)), None);
        assert_eq!(ControlMessage::parse(&json!([POPUP_LOADED])), None);
        assert_eq!(ControlMessage::parse(&json!({ "type": 5 })), None);
        assert_eq!(ControlMessage::parse(&json!({ "kind": POPUP_LOADED })), None);
        assert_eq!(ControlMessage::parse(&json!({ "type": "ui-button" })), None);
    }

    #[test]
    fn init_message_wraps_settings() {
        let settings = PopupSettings::with_src("https://popup.example.com/popup.html");
        let msg = init_message(&settings);
        assert_eq!(msg["type"], POPUP_INIT);
        assert_eq!(
            msg["payload"]["settings"]["popupSrc"],
            "https://popup.example.com/popup.html"
        );
    }

    #[test]
    fn core_message_serialization() {
        let msg = CoreMessage::new("ui-request_pin", json!({ "device": "T" }));
        let value = msg.to_value();
        assert_eq!(value["type"], "ui-request_pin");
        assert_eq!(value["payload"]["device"], "T");

        let bare = CoreMessage::bare(UI_REQUEST_WINDOW).to_value();
        assert!(bare.get("payload").is_none());
        assert!(CoreMessage::bare(UI_REQUEST_WINDOW).requests_window());
    }

    #[test]
    fn popup_error_text_prefix() {
        assert_eq!(popup_error_text("boom"), "Popup error: boom");
    }
}
