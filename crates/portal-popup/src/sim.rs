//! Headless in-memory browser.
//!
//! Implements every platform primitive over one shared state so tests and
//! the CLI can drive the coordinator and then inspect what happened:
//! which windows and tabs exist, what was posted where, which channels
//! were dropped. All handles created from one [`SimBrowser`] share state.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::Value;
use tracing::trace;

use portal_common::{PlatformError, TabId, WindowId};

use crate::platform::{
    BrowserWindow, ChannelPort, ExtensionPlatform, PopupWindow, Tab, WindowPlatform,
    WindowQuery, WindowType,
};

/// URL of the tab the simulated browser starts with.
pub const HOST_PAGE_URL: &str = "https://host.example/app";

// =============================================================================
// STATE
// =============================================================================

/// A window opened through [`WindowPlatform::open`].
#[derive(Debug, Clone, PartialEq)]
pub struct SimWindowState {
    pub url: String,
    pub target: String,
    pub closed: bool,
    pub focus_count: u32,
    /// `(message, target_origin)` pairs in delivery order.
    pub posted: Vec<(Value, String)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimChannelState {
    pub name: String,
    pub sender_tab: Option<TabId>,
    pub posted: Vec<Value>,
    pub disconnected: bool,
}

#[derive(Debug)]
struct SimState {
    popups_blocked: bool,
    fail_tab_queries: bool,
    windows: Vec<SimWindowState>,
    browser_windows: Vec<BrowserWindow>,
    current_window: WindowId,
    tabs: Vec<Tab>,
    channels: Vec<SimChannelState>,
    next_tab: i64,
    next_window: i64,
    calls: Vec<String>,
}

impl SimState {
    fn new() -> Self {
        let window = BrowserWindow {
            id: WindowId(1),
            kind: WindowType::Normal,
        };
        let tab = Tab {
            id: TabId(1),
            window_id: window.id,
            index: 0,
            active: true,
            url: HOST_PAGE_URL.into(),
        };
        Self {
            popups_blocked: false,
            fail_tab_queries: false,
            windows: Vec::new(),
            browser_windows: vec![window],
            current_window: WindowId(1),
            tabs: vec![tab],
            channels: Vec::new(),
            next_tab: 2,
            next_window: 2,
            calls: Vec::new(),
        }
    }

    fn record(&mut self, call: String) {
        trace!(call = %call, "sim call");
        self.calls.push(call);
    }

    fn insert_tab(&mut self, window_id: WindowId, url: &str, index: Option<u32>) -> Tab {
        let in_window = self.tabs.iter().filter(|t| t.window_id == window_id).count() as u32;
        let index = index.unwrap_or(in_window).min(in_window);

        for tab in self.tabs.iter_mut().filter(|t| t.window_id == window_id) {
            if tab.index >= index {
                tab.index += 1;
            }
            tab.active = false;
        }

        let tab = Tab {
            id: TabId(self.next_tab),
            window_id,
            index,
            active: true,
            url: url.to_string(),
        };
        self.next_tab += 1;
        self.tabs.push(tab.clone());
        tab
    }

    fn drop_tab(&mut self, id: TabId) -> Option<Tab> {
        let pos = self.tabs.iter().position(|t| t.id == id)?;
        let removed = self.tabs.remove(pos);
        for tab in self
            .tabs
            .iter_mut()
            .filter(|t| t.window_id == removed.window_id && t.index > removed.index)
        {
            tab.index -= 1;
        }
        Some(removed)
    }
}

// =============================================================================
// BROWSER
// =============================================================================

#[derive(Debug, Clone)]
pub struct SimBrowser {
    state: Rc<RefCell<SimState>>,
}

impl SimBrowser {
    /// One normal window holding a single active host tab.
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(SimState::new())),
        }
    }

    pub fn windows(&self) -> SimWindowPlatform {
        SimWindowPlatform {
            state: Rc::clone(&self.state),
        }
    }

    pub fn tabs(&self) -> SimTabPlatform {
        SimTabPlatform {
            state: Rc::clone(&self.state),
        }
    }

    /// Make `open` refuse like a popup blocker.
    pub fn block_popups(&self, blocked: bool) {
        self.state.borrow_mut().popups_blocked = blocked;
    }

    /// Make tab lookups fail with an API error.
    pub fn fail_tab_queries(&self, fail: bool) {
        self.state.borrow_mut().fail_tab_queries = fail;
    }

    /// Change the type of the focused window (e.g. to an extension popup).
    pub fn set_current_window_type(&self, kind: WindowType) {
        let mut state = self.state.borrow_mut();
        let current = state.current_window;
        if let Some(window) = state.browser_windows.iter_mut().find(|w| w.id == current) {
            window.kind = kind;
        }
    }

    pub fn opened_windows(&self) -> usize {
        self.state.borrow().windows.len()
    }

    pub fn window(&self, index: usize) -> Option<SimWindowState> {
        self.state.borrow().windows.get(index).cloned()
    }

    /// Close a window the way a user would, behind the coordinator's back.
    pub fn user_closes_window(&self, index: usize) {
        if let Some(window) = self.state.borrow_mut().windows.get_mut(index) {
            window.closed = true;
        }
    }

    pub fn browser_windows(&self) -> Vec<BrowserWindow> {
        self.state.borrow().browser_windows.clone()
    }

    pub fn tab(&self, id: TabId) -> Option<Tab> {
        self.state.borrow().tabs.iter().find(|t| t.id == id).cloned()
    }

    pub fn tab_count(&self) -> usize {
        self.state.borrow().tabs.len()
    }

    /// Tabs whose URL starts with `prefix`.
    pub fn tabs_with_url(&self, prefix: &str) -> Vec<Tab> {
        self.state
            .borrow()
            .tabs
            .iter()
            .filter(|t| t.url.starts_with(prefix))
            .cloned()
            .collect()
    }

    pub fn active_tab(&self) -> Option<Tab> {
        let state = self.state.borrow();
        state
            .tabs
            .iter()
            .find(|t| t.window_id == state.current_window && t.active)
            .cloned()
    }

    /// Close a tab the way a user would.
    pub fn user_closes_tab(&self, id: TabId) {
        self.state.borrow_mut().drop_tab(id);
    }

    /// Open an extension channel from `sender_tab`. Returns the port to hand
    /// to the coordinator and the index for [`SimBrowser::channel`].
    pub fn connect(&self, name: &str, sender_tab: Option<TabId>) -> (Box<dyn ChannelPort>, usize) {
        let mut state = self.state.borrow_mut();
        state.channels.push(SimChannelState {
            name: name.to_string(),
            sender_tab,
            posted: Vec::new(),
            disconnected: false,
        });
        let index = state.channels.len() - 1;
        state.record(format!("channel.connect {name}"));
        let port = SimPort {
            state: Rc::clone(&self.state),
            index,
            name: name.to_string(),
            sender_tab,
        };
        (Box::new(port), index)
    }

    pub fn channel(&self, index: usize) -> Option<SimChannelState> {
        self.state.borrow().channels.get(index).cloned()
    }

    /// Every platform call made so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.state.borrow().calls.clone()
    }
}

impl Default for SimBrowser {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// WINDOW PLATFORM
// =============================================================================

pub struct SimWindowPlatform {
    state: Rc<RefCell<SimState>>,
}

impl WindowPlatform for SimWindowPlatform {
    fn open(
        &mut self,
        url: &str,
        target: &str,
    ) -> Result<Option<Box<dyn PopupWindow>>, PlatformError> {
        let mut state = self.state.borrow_mut();
        state.record(format!("window.open {url:?} {target}"));
        if state.popups_blocked {
            return Ok(None);
        }
        state.windows.push(SimWindowState {
            url: url.to_string(),
            target: target.to_string(),
            closed: false,
            focus_count: 0,
            posted: Vec::new(),
        });
        let index = state.windows.len() - 1;
        Ok(Some(Box::new(SimWindow {
            state: Rc::clone(&self.state),
            index,
        })))
    }
}

struct SimWindow {
    state: Rc<RefCell<SimState>>,
    index: usize,
}

impl SimWindow {
    fn with<R>(&self, f: impl FnOnce(&mut SimWindowState) -> R) -> R {
        let mut state = self.state.borrow_mut();
        f(&mut state.windows[self.index])
    }
}

impl PopupWindow for SimWindow {
    fn navigate(&mut self, url: &str) -> Result<(), PlatformError> {
        self.state
            .borrow_mut()
            .record(format!("window[{}].navigate {url}", self.index));
        self.with(|w| w.url = url.to_string());
        Ok(())
    }

    fn focus(&mut self) -> Result<(), PlatformError> {
        self.state
            .borrow_mut()
            .record(format!("window[{}].focus", self.index));
        self.with(|w| w.focus_count += 1);
        Ok(())
    }

    fn close(&mut self) -> Result<(), PlatformError> {
        self.state
            .borrow_mut()
            .record(format!("window[{}].close", self.index));
        self.with(|w| w.closed = true);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.with(|w| w.closed)
    }

    fn post_message(&mut self, message: &Value, target_origin: &str) -> Result<(), PlatformError> {
        let kind = message["type"].as_str().unwrap_or("?").to_string();
        self.state
            .borrow_mut()
            .record(format!("window[{}].postMessage {kind}", self.index));
        self.with(|w| {
            if w.closed {
                return Err(PlatformError::WindowNotFound(format!("window {}", self.index)));
            }
            w.posted.push((message.clone(), target_origin.to_string()));
            Ok(())
        })
    }
}

// =============================================================================
// TAB PLATFORM
// =============================================================================

pub struct SimTabPlatform {
    state: Rc<RefCell<SimState>>,
}

impl ExtensionPlatform for SimTabPlatform {
    fn current_window(&mut self) -> Result<BrowserWindow, PlatformError> {
        let state = self.state.borrow();
        state
            .browser_windows
            .iter()
            .find(|w| w.id == state.current_window)
            .cloned()
            .ok_or_else(|| PlatformError::WindowNotFound("no focused window".into()))
    }

    fn create_window(&mut self, url: &str) -> Result<BrowserWindow, PlatformError> {
        let mut state = self.state.borrow_mut();
        state.record(format!("windows.create {url}"));
        let window = BrowserWindow {
            id: WindowId(state.next_window),
            kind: WindowType::Normal,
        };
        state.next_window += 1;
        state.browser_windows.push(window.clone());
        state.current_window = window.id;
        state.insert_tab(window.id, url, None);
        Ok(window)
    }

    fn active_tab(&mut self, window: WindowQuery) -> Result<Option<Tab>, PlatformError> {
        let state = self.state.borrow();
        if state.fail_tab_queries {
            return Err(PlatformError::Api("tabs.query failed".into()));
        }
        let window_id = match window {
            WindowQuery::Current => state.current_window,
            WindowQuery::Window(id) => id,
        };
        Ok(state
            .tabs
            .iter()
            .find(|t| t.window_id == window_id && t.active)
            .cloned())
    }

    fn create_tab(&mut self, url: &str, index: Option<u32>) -> Result<Tab, PlatformError> {
        let mut state = self.state.borrow_mut();
        state.record(format!("tabs.create {url} {index:?}"));
        let window_id = state.current_window;
        Ok(state.insert_tab(window_id, url, index))
    }

    fn get_tab(&mut self, id: TabId) -> Result<Option<Tab>, PlatformError> {
        let state = self.state.borrow();
        if state.fail_tab_queries {
            return Err(PlatformError::Api("tabs.get failed".into()));
        }
        Ok(state.tabs.iter().find(|t| t.id == id).cloned())
    }

    fn activate_tab(&mut self, id: TabId) -> Result<(), PlatformError> {
        let mut state = self.state.borrow_mut();
        state.record(format!("tabs.update {id} active"));
        let window_id = state
            .tabs
            .iter()
            .find(|t| t.id == id)
            .map(|t| t.window_id)
            .ok_or_else(|| PlatformError::TabNotFound(id.to_string()))?;
        for tab in state.tabs.iter_mut().filter(|t| t.window_id == window_id) {
            tab.active = tab.id == id;
        }
        Ok(())
    }

    fn remove_tab(&mut self, id: TabId) -> Result<(), PlatformError> {
        let mut state = self.state.borrow_mut();
        state.record(format!("tabs.remove {id}"));
        state
            .drop_tab(id)
            .map(|_| ())
            .ok_or_else(|| PlatformError::TabNotFound(id.to_string()))
    }
}

// =============================================================================
// CHANNEL PORT
// =============================================================================

struct SimPort {
    state: Rc<RefCell<SimState>>,
    index: usize,
    name: String,
    sender_tab: Option<TabId>,
}

impl ChannelPort for SimPort {
    fn name(&self) -> &str {
        &self.name
    }

    fn sender_tab(&self) -> Option<TabId> {
        self.sender_tab
    }

    fn post_message(&mut self, message: &Value) -> Result<(), PlatformError> {
        let mut state = self.state.borrow_mut();
        let kind = message["type"].as_str().unwrap_or("?").to_string();
        state.record(format!("channel[{}].postMessage {kind}", self.index));
        let channel = &mut state.channels[self.index];
        if channel.disconnected {
            return Err(PlatformError::Channel("port disconnected".into()));
        }
        channel.posted.push(message.clone());
        Ok(())
    }

    fn disconnect(&mut self) {
        let mut state = self.state.borrow_mut();
        state.record(format!("channel[{}].disconnect", self.index));
        state.channels[self.index].disconnected = true;
    }
}
