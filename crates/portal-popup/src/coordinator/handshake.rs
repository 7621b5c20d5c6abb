//! Inbound control messages and the two-phase handshake.

use serde_json::Value;
use tracing::{debug, info, trace, warn};

use portal_common::PopupEvent;
use portal_config::same_origin;

use crate::message::{init_message, popup_error_text, ControlMessage};
use crate::platform::ChannelPort;
use crate::timer::TimerKind;
use crate::transport::ChannelVerdict;

use super::{MessageSource, PopupCoordinator};

impl PopupCoordinator {
    /// A window-messaging event. Anything from another origin, or without
    /// an object payload, is dropped.
    pub fn handle_window_message(&mut self, origin: &str, data: &Value) {
        if !same_origin(origin, &self.origin) {
            trace!(origin, "dropping message from foreign origin");
            return;
        }
        let Some(message) = ControlMessage::parse(data) else {
            trace!("dropping non-control window message");
            return;
        };
        self.dispatch(MessageSource::Window, message);
    }

    /// A channel connect event (extension hosting).
    pub fn handle_channel_connect(&mut self, port: Box<dyn ChannelPort>) -> ChannelVerdict {
        let verdict = self
            .transport
            .accept_channel(port, &self.settings.channel_name);
        if verdict == ChannelVerdict::Bound {
            self.disarm(TimerKind::Open);
        }
        debug!(?verdict, "channel connect handled");
        verdict
    }

    /// A message arriving on the bound extension channel.
    pub fn handle_channel_message(&mut self, data: &Value) {
        if !self.transport.has_channel() {
            debug!("channel message with no bound channel ignored");
            return;
        }
        let Some(message) = ControlMessage::parse(data) else {
            trace!("dropping non-control channel message");
            return;
        };
        self.dispatch(MessageSource::Channel, message);
    }

    fn dispatch(&mut self, source: MessageSource, message: ControlMessage) {
        if !accepts(source, &message) {
            debug!(?source, kind = message.wire_type(), "control message not routed on this source");
            return;
        }
        debug!(?source, kind = message.wire_type(), "control message");

        match message {
            ControlMessage::ContentLoaded => {
                for waiter in self.gate.resolve() {
                    self.send_init(waiter);
                }
            }
            ControlMessage::Bootstrap => self.disarm(TimerKind::Open),
            ControlMessage::Loaded => match self.gate.wait(source) {
                Some(source) => self.send_init(source),
                None => debug!(pending = self.gate.pending(), "popup loaded before content layer"),
            },
            ControlMessage::Error { reason } => {
                let error = reason.as_deref().map(popup_error_text);
                info!(error = ?error, "popup reported an error");
                self.emit(PopupEvent::Closed { error });
                self.close();
            }
            ControlMessage::PermissionsRequest => {
                if let Err(e) = self
                    .transport
                    .open_permissions_page(&self.settings.permissions_page)
                {
                    warn!(error = %e, "failed to open permissions page");
                }
            }
            ControlMessage::CancelRequest | ControlMessage::CloseUiWindow => self.close(),
            ControlMessage::CloseWindow => {
                self.emit(PopupEvent::closed());
                self.close();
            }
        }
    }

    fn send_init(&mut self, source: MessageSource) {
        let message = init_message(&self.settings);
        match self.transport.post_message(&message, &self.origin) {
            Ok(()) => info!(?source, "popup initialized"),
            Err(e) => warn!(error = %e, "failed to send popup init"),
        }
    }
}

/// Which source may carry which control message. The content layer and the
/// host UI only speak window messaging; the popup's own tab-level requests
/// only arrive over the extension channel.
fn accepts(source: MessageSource, message: &ControlMessage) -> bool {
    match message {
        ControlMessage::Loaded | ControlMessage::Error { .. } => true,
        ControlMessage::ContentLoaded
        | ControlMessage::Bootstrap
        | ControlMessage::CancelRequest
        | ControlMessage::CloseUiWindow => source == MessageSource::Window,
        ControlMessage::PermissionsRequest | ControlMessage::CloseWindow => {
            source == MessageSource::Channel
        }
    }
}
