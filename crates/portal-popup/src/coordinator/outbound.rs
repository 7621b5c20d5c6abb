use tracing::{debug, warn};

use crate::message::CoreMessage;

use super::PopupCoordinator;

impl PopupCoordinator {
    /// Relay a business message to the popup.
    ///
    /// Held back while the request is still debouncing. A message with no
    /// popup to receive it, sent before the popup confirmed it is up, means
    /// the open silently failed: close and offer a retry.
    pub fn post_message(&mut self, message: &CoreMessage) {
        if self.timers.request.is_some() {
            debug!(kind = %message.kind, "request still debouncing, message dropped");
            return;
        }

        let has_handle = self.transport.has_handle();
        if !has_handle && !message.requests_window() && self.timers.open.is_some() {
            warn!(kind = %message.kind, "popup missing while opening, offering retry");
            self.fail_and_offer_retry();
            return;
        }

        if has_handle {
            if let Err(e) = self.transport.post_message(&message.to_value(), &self.origin) {
                warn!(kind = %message.kind, error = %e, "failed to post message to popup");
            }
        }
    }
}
