//! Extension-channel transport: the popup lives in a browser tab and talks
//! back over a named channel bound to that tab.

use serde_json::Value;
use tracing::{debug, info, warn};

use portal_common::{PlatformError, TabId};

use crate::platform::{ChannelPort, ExtensionPlatform, WindowQuery, WindowType};

use super::{ChannelVerdict, Liveness, PopupTransport, TransportKind};

pub struct ExtensionTransport {
    platform: Box<dyn ExtensionPlatform>,
    /// Tab showing the popup.
    tab: Option<TabId>,
    /// Tab that was active before the popup opened; refocused on teardown.
    previous_tab: Option<TabId>,
    channel: Option<Box<dyn ChannelPort>>,
}

impl ExtensionTransport {
    pub fn new(platform: Box<dyn ExtensionPlatform>) -> Self {
        Self {
            platform,
            tab: None,
            previous_tab: None,
            channel: None,
        }
    }

    pub fn tab(&self) -> Option<TabId> {
        self.tab
    }

    pub fn previous_tab(&self) -> Option<TabId> {
        self.previous_tab
    }

    fn disconnect_channel(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            channel.disconnect();
            debug!("extension channel disconnected");
        }
    }

    /// The request came from extension chrome (not an ordinary window):
    /// put the popup in a fresh top-level window.
    fn open_in_new_window(&mut self, url: &str) -> Result<(), PlatformError> {
        let window = self.platform.create_window(url)?;
        let tab = self
            .platform
            .active_tab(WindowQuery::Window(window.id))?
            .ok_or_else(|| PlatformError::TabNotFound(format!("no active tab in window {}", window.id)))?;
        info!(tab_id = %tab.id, window_id = %window.id, "popup opened in new window");
        self.tab = Some(tab.id);
        Ok(())
    }

    /// Open the popup right next to the active tab, remembering that tab.
    fn open_adjacent_tab(&mut self, url: &str) -> Result<(), PlatformError> {
        let active = self
            .platform
            .active_tab(WindowQuery::Current)?
            .ok_or_else(|| PlatformError::TabNotFound("no active tab in current window".into()))?;
        self.previous_tab = Some(active.id);

        let tab = self.platform.create_tab(url, Some(active.index + 1))?;
        info!(tab_id = %tab.id, previous_tab = %active.id, "popup opened in adjacent tab");
        self.tab = Some(tab.id);
        Ok(())
    }
}

impl PopupTransport for ExtensionTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Extension
    }

    fn open(&mut self, url: &str) -> Result<(), PlatformError> {
        self.teardown();

        let current = self.platform.current_window()?;
        if current.kind == WindowType::Normal {
            self.open_adjacent_tab(url)
        } else {
            self.open_in_new_window(url)
        }
    }

    fn has_handle(&self) -> bool {
        self.tab.is_some()
    }

    fn focus(&mut self) -> Result<(), PlatformError> {
        match self.tab {
            Some(tab) => self.platform.activate_tab(tab),
            None => Ok(()),
        }
    }

    fn liveness(&mut self) -> Liveness {
        let Some(tab) = self.tab else {
            return Liveness::NoHandle;
        };
        match self.platform.get_tab(tab) {
            Ok(Some(_)) => Liveness::Alive,
            Ok(None) => Liveness::Closed,
            Err(e) => {
                warn!(tab_id = %tab, error = %e, "liveness query failed, assuming alive");
                Liveness::Alive
            }
        }
    }

    fn post_message(&mut self, message: &Value, _origin: &str) -> Result<(), PlatformError> {
        match &mut self.channel {
            Some(channel) => channel.post_message(message),
            None => {
                debug!("no extension channel bound, message dropped");
                Ok(())
            }
        }
    }

    fn accept_channel(&mut self, mut port: Box<dyn ChannelPort>, expected_name: &str) -> ChannelVerdict {
        if port.name() != expected_name {
            debug!(name = port.name(), "ignoring channel for another protocol");
            return ChannelVerdict::Foreign;
        }

        let sender = port.sender_tab();
        if self.tab.is_none() || sender != self.tab {
            debug!(sender = ?sender, tab = ?self.tab, "channel sender is not the popup tab");
            port.disconnect();
            return ChannelVerdict::Rejected;
        }

        self.disconnect_channel();
        self.channel = Some(port);
        info!(tab_id = ?sender, "extension channel bound");
        ChannelVerdict::Bound
    }

    fn has_channel(&self) -> bool {
        self.channel.is_some()
    }

    fn open_permissions_page(&mut self, page: &str) -> Result<(), PlatformError> {
        let active = self
            .platform
            .active_tab(WindowQuery::Current)?
            .ok_or_else(|| PlatformError::TabNotFound("no active tab in current window".into()))?;
        let tab = self.platform.create_tab(page, Some(active.index + 1))?;
        debug!(tab_id = %tab.id, page, "permissions page opened");
        Ok(())
    }

    fn teardown(&mut self) {
        self.disconnect_channel();

        if let Some(previous) = self.previous_tab.take() {
            if let Err(e) = self.platform.activate_tab(previous) {
                warn!(tab_id = %previous, error = %e, "failed to refocus previous tab");
            }
        }

        if let Some(tab) = self.tab.take() {
            if let Err(e) = self.platform.remove_tab(tab) {
                warn!(tab_id = %tab, error = %e, "failed to remove popup tab");
            }
        }
    }
}
