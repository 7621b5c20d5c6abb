//! Opaque platform primitives the transports are built on.
//!
//! Hosts implement these against their real window/tab/channel APIs;
//! `crate::sim` provides an in-memory browser for tests and the CLI.

use serde_json::Value;

use portal_common::{PlatformError, TabId, WindowId};

// =============================================================================
// WINDOW MESSAGING
// =============================================================================

/// A window-like handle returned by [`WindowPlatform::open`].
pub trait PopupWindow {
    /// Assign the window's location.
    fn navigate(&mut self, url: &str) -> Result<(), PlatformError>;
    fn focus(&mut self) -> Result<(), PlatformError>;
    fn close(&mut self) -> Result<(), PlatformError>;
    /// The platform's closed flag.
    fn is_closed(&self) -> bool;
    /// postMessage-style delivery scoped to `target_origin`.
    fn post_message(&mut self, message: &Value, target_origin: &str) -> Result<(), PlatformError>;
}

pub trait WindowPlatform {
    /// Open a window named `target`. `Ok(None)` means the platform refused
    /// (e.g. a popup blocker) without raising an error.
    fn open(
        &mut self,
        url: &str,
        target: &str,
    ) -> Result<Option<Box<dyn PopupWindow>>, PlatformError>;
}

// =============================================================================
// EXTENSION TABS
// =============================================================================

/// Window type as reported by the extension windows API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowType {
    Normal,
    Popup,
    Panel,
    App,
    DevTools,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserWindow {
    pub id: WindowId,
    pub kind: WindowType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tab {
    pub id: TabId,
    pub window_id: WindowId,
    /// Position within its window's tab strip.
    pub index: u32,
    pub active: bool,
    pub url: String,
}

/// Which window an active-tab query targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowQuery {
    Current,
    Window(WindowId),
}

pub trait ExtensionPlatform {
    /// The currently focused window.
    fn current_window(&mut self) -> Result<BrowserWindow, PlatformError>;
    /// Create a new top-level window showing `url`.
    fn create_window(&mut self, url: &str) -> Result<BrowserWindow, PlatformError>;
    fn active_tab(&mut self, window: WindowQuery) -> Result<Option<Tab>, PlatformError>;
    /// Create a tab in the current window, at `index` when given.
    fn create_tab(&mut self, url: &str, index: Option<u32>) -> Result<Tab, PlatformError>;
    /// `Ok(None)` when the tab no longer exists.
    fn get_tab(&mut self, id: TabId) -> Result<Option<Tab>, PlatformError>;
    fn activate_tab(&mut self, id: TabId) -> Result<(), PlatformError>;
    fn remove_tab(&mut self, id: TabId) -> Result<(), PlatformError>;
}

/// One end of a named extension channel, as delivered by a connect event.
pub trait ChannelPort {
    fn name(&self) -> &str;
    /// Tab of the connecting process, when it has one.
    fn sender_tab(&self) -> Option<TabId>;
    fn post_message(&mut self, message: &Value) -> Result<(), PlatformError>;
    fn disconnect(&mut self);
}
