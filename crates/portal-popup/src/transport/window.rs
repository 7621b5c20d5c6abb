//! Window-messaging transport for plain browser and desktop hosts.

use serde_json::Value;
use tracing::{debug, warn};

use portal_common::PlatformError;

use crate::platform::{PopupWindow, WindowPlatform};

use super::{Liveness, PopupTransport, TransportKind};

/// Window name used by desktop hosts; their shell presents it modally.
const MODAL_TARGET: &str = "modal";
const BLANK_TARGET: &str = "_blank";

/// How the popup window gets its URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenStyle {
    /// Open directly at the URL in the named modal window.
    Modal,
    /// Open a blank window, then assign its location. Some mobile browsers
    /// drop the opener back-reference when the URL is passed to `open`.
    BlankThenNavigate,
}

pub struct WindowTransport {
    platform: Box<dyn WindowPlatform>,
    style: OpenStyle,
    window: Option<Box<dyn PopupWindow>>,
}

impl WindowTransport {
    pub fn new(platform: Box<dyn WindowPlatform>, style: OpenStyle) -> Self {
        Self {
            platform,
            style,
            window: None,
        }
    }

    pub fn style(&self) -> OpenStyle {
        self.style
    }

    fn close_window(&mut self) {
        if let Some(mut window) = self.window.take() {
            if let Err(e) = window.close() {
                warn!(error = %e, "failed to close popup window");
            }
        }
    }
}

impl PopupTransport for WindowTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Window
    }

    fn open(&mut self, url: &str) -> Result<(), PlatformError> {
        self.close_window();

        let opened = match self.style {
            OpenStyle::Modal => self.platform.open(url, MODAL_TARGET)?,
            OpenStyle::BlankThenNavigate => self.platform.open("", BLANK_TARGET)?,
        };

        let Some(window) = opened else {
            return Err(PlatformError::WindowBlocked(url.to_string()));
        };
        let window = self.window.insert(window);

        if self.style == OpenStyle::BlankThenNavigate {
            window.navigate(url)?;
        }

        debug!(url, style = ?self.style, "popup window opened");
        Ok(())
    }

    fn has_handle(&self) -> bool {
        self.window.is_some()
    }

    fn focus(&mut self) -> Result<(), PlatformError> {
        match &mut self.window {
            Some(window) => window.focus(),
            None => Ok(()),
        }
    }

    fn liveness(&mut self) -> Liveness {
        match &self.window {
            None => Liveness::NoHandle,
            Some(window) if window.is_closed() => Liveness::Closed,
            Some(_) => Liveness::Alive,
        }
    }

    fn post_message(&mut self, message: &Value, origin: &str) -> Result<(), PlatformError> {
        match &mut self.window {
            Some(window) => window.post_message(message, origin),
            None => {
                debug!("no popup window, message dropped");
                Ok(())
            }
        }
    }

    fn teardown(&mut self) {
        self.close_window();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimBrowser;
    use crate::transport::ChannelVerdict;
    use serde_json::json;

    fn transport(browser: &SimBrowser, style: OpenStyle) -> WindowTransport {
        WindowTransport::new(Box::new(browser.windows()), style)
    }

    #[test]
    fn modal_style_opens_named_window_at_url() {
        let browser = SimBrowser::new();
        let mut t = transport(&browser, OpenStyle::Modal);
        t.open("https://popup.example/p.html").unwrap();

        let window = browser.window(0).unwrap();
        assert_eq!(window.target, "modal");
        assert_eq!(window.url, "https://popup.example/p.html");
        assert!(t.has_handle());
    }

    #[test]
    fn blank_style_navigates_after_opening() {
        let browser = SimBrowser::new();
        let mut t = transport(&browser, OpenStyle::BlankThenNavigate);
        t.open("https://popup.example/p.html").unwrap();

        let calls = browser.calls();
        assert_eq!(calls[0], "window.open \"\" _blank");
        assert_eq!(calls[1], "window[0].navigate https://popup.example/p.html");
        assert_eq!(browser.window(0).unwrap().url, "https://popup.example/p.html");
    }

    #[test]
    fn blocked_open_leaves_no_handle() {
        let browser = SimBrowser::new();
        browser.block_popups(true);
        let mut t = transport(&browser, OpenStyle::BlankThenNavigate);
        let err = t.open("https://popup.example/p.html").unwrap_err();
        assert!(matches!(err, PlatformError::WindowBlocked(_)));
        assert!(!t.has_handle());
        assert_eq!(t.liveness(), Liveness::NoHandle);
    }

    #[test]
    fn liveness_follows_closed_flag() {
        let browser = SimBrowser::new();
        let mut t = transport(&browser, OpenStyle::Modal);
        assert_eq!(t.liveness(), Liveness::NoHandle);
        t.open("https://popup.example/p.html").unwrap();
        assert_eq!(t.liveness(), Liveness::Alive);
        browser.user_closes_window(0);
        assert_eq!(t.liveness(), Liveness::Closed);
    }

    #[test]
    fn post_message_is_scoped_to_origin() {
        let browser = SimBrowser::new();
        let mut t = transport(&browser, OpenStyle::Modal);
        t.post_message(&json!({"type": "dropped"}), "https://popup.example")
            .unwrap();
        t.open("https://popup.example/p.html").unwrap();
        t.post_message(&json!({"type": "ui-request_pin"}), "https://popup.example")
            .unwrap();

        let posted = browser.window(0).unwrap().posted;
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0].1, "https://popup.example");
    }

    #[test]
    fn teardown_closes_and_forgets_window() {
        let browser = SimBrowser::new();
        let mut t = transport(&browser, OpenStyle::Modal);
        t.open("https://popup.example/p.html").unwrap();
        t.teardown();
        assert!(!t.has_handle());
        assert!(browser.window(0).unwrap().closed);
        t.teardown();
    }

    #[test]
    fn reopening_replaces_previous_window() {
        let browser = SimBrowser::new();
        let mut t = transport(&browser, OpenStyle::Modal);
        t.open("https://popup.example/a.html").unwrap();
        t.open("https://popup.example/b.html").unwrap();
        assert!(browser.window(0).unwrap().closed);
        assert!(!browser.window(1).unwrap().closed);
    }

    #[test]
    fn channels_are_not_accepted() {
        let browser = SimBrowser::new();
        let mut t = transport(&browser, OpenStyle::Modal);
        let (port, index) = browser.connect("trezor-connect", None);
        assert_eq!(
            t.accept_channel(port, "trezor-connect"),
            ChannelVerdict::NotListening
        );
        assert!(!browser.channel(index).unwrap().disconnected);
        assert!(t.open_permissions_page("perm.html").is_err());
    }
}
