//! Transport strategies.
//!
//! A transport owns the popup handle and knows how to create, check,
//! address and destroy it. The coordinator talks only to [`PopupTransport`];
//! which variant it gets is decided once, from the settings environment.

use serde_json::Value;

use portal_common::{PlatformError, PortalError};
use portal_config::Environment;

use crate::platform::{ChannelPort, ExtensionPlatform, WindowPlatform};

mod extension;
mod window;

pub use extension::ExtensionTransport;
pub use window::{OpenStyle, WindowTransport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Window,
    Extension,
}

/// Result of a liveness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// Nothing has been opened (or it was already torn down).
    NoHandle,
    Alive,
    /// The handle exists but the user or platform closed it.
    Closed,
}

/// What a transport did with an inbound channel connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelVerdict {
    /// This transport does not accept channels; the port was left alone.
    NotListening,
    /// The channel name belongs to some other protocol; the port was left alone.
    Foreign,
    /// Right protocol, wrong sender. The port was disconnected.
    Rejected,
    /// The port is now the active channel.
    Bound,
}

pub trait PopupTransport {
    fn kind(&self) -> TransportKind;

    /// Create the popup handle showing `url`, replacing any previous one.
    fn open(&mut self, url: &str) -> Result<(), PlatformError>;

    fn has_handle(&self) -> bool;

    /// Bring the existing handle to the foreground.
    fn focus(&mut self) -> Result<(), PlatformError>;

    fn liveness(&mut self) -> Liveness;

    /// Deliver `message` to the popup. Messages with nowhere to go are dropped.
    fn post_message(&mut self, message: &Value, origin: &str) -> Result<(), PlatformError>;

    /// Offer an inbound channel connection to the transport.
    fn accept_channel(&mut self, port: Box<dyn ChannelPort>, expected_name: &str) -> ChannelVerdict {
        let _ = (port, expected_name);
        ChannelVerdict::NotListening
    }

    fn has_channel(&self) -> bool {
        false
    }

    /// Open the auxiliary permissions page next to the active tab.
    fn open_permissions_page(&mut self, page: &str) -> Result<(), PlatformError> {
        Err(PlatformError::Api(format!(
            "cannot open {page}: {:?} transport has no tabs",
            self.kind()
        )))
    }

    /// Release everything: channel, focus stash, handle. Never fails.
    fn teardown(&mut self);
}

/// Platform capabilities handed to the coordinator at construction.
pub enum Platform {
    Window(Box<dyn WindowPlatform>),
    Extension(Box<dyn ExtensionPlatform>),
}

impl Platform {
    fn describe(&self) -> &'static str {
        match self {
            Self::Window(_) => "window platform",
            Self::Extension(_) => "extension platform",
        }
    }
}

/// Pick the transport for `env`. Extension hosting needs tab primitives;
/// every other environment needs window primitives.
pub fn for_environment(
    env: Environment,
    platform: Platform,
) -> Result<Box<dyn PopupTransport>, PortalError> {
    match (env, platform) {
        (Environment::WebExtension, Platform::Extension(tabs)) => {
            Ok(Box::new(ExtensionTransport::new(tabs)))
        }
        (Environment::Electron, Platform::Window(windows)) => {
            Ok(Box::new(WindowTransport::new(windows, OpenStyle::Modal)))
        }
        (Environment::Web, Platform::Window(windows)) => {
            Ok(Box::new(WindowTransport::new(windows, OpenStyle::BlankThenNavigate)))
        }
        (env, platform) => Err(PortalError::TransportMismatch(format!(
            "{env:?} environment cannot run on a {}",
            platform.describe()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimBrowser;

    #[test]
    fn selects_transport_by_environment() {
        let browser = SimBrowser::new();

        let t = for_environment(Environment::Web, Platform::Window(Box::new(browser.windows())))
            .unwrap();
        assert_eq!(t.kind(), TransportKind::Window);

        let t = for_environment(
            Environment::Electron,
            Platform::Window(Box::new(browser.windows())),
        )
        .unwrap();
        assert_eq!(t.kind(), TransportKind::Window);

        let t = for_environment(
            Environment::WebExtension,
            Platform::Extension(Box::new(browser.tabs())),
        )
        .unwrap();
        assert_eq!(t.kind(), TransportKind::Extension);
    }

    #[test]
    fn rejects_mismatched_platform() {
        let browser = SimBrowser::new();
        let err = for_environment(
            Environment::WebExtension,
            Platform::Window(Box::new(browser.windows())),
        )
        .err()
        .unwrap();
        assert!(matches!(err, PortalError::TransportMismatch(_)));

        let err = for_environment(Environment::Web, Platform::Extension(Box::new(browser.tabs())))
            .err()
            .unwrap();
        assert!(err.to_string().contains("extension platform"));
    }
}
