//! Request gating, opening, timers and teardown.

use tracing::{debug, info, warn};

use portal_common::{PopupEvent, TimerId};

use crate::retry::{RetryChoice, RetryOffer};
use crate::timer::{
    TimerKind, TimerMode, IMMEDIATE_DEBOUNCE, LIVENESS_POLL_INTERVAL, OPEN_TIMEOUT,
    REQUEST_DEBOUNCE,
};
use crate::transport::{Liveness, TransportKind};

use super::PopupCoordinator;

/// URL fragment telling the popup it runs in an unsupported environment.
const UNSUPPORTED_FRAGMENT: &str = "#unsupported";
/// URL fragment asking the popup to show its loading state first.
const LOADING_FRAGMENT: &str = "#loading";

impl PopupCoordinator {
    /// Ask for the popup. While a request is already in flight this only
    /// brings the existing popup to the foreground.
    pub fn request(&mut self, lazy_load: bool) {
        if self.locked {
            debug!("popup request while locked, focusing existing handle");
            if self.transport.has_handle() {
                if let Err(e) = self.transport.focus() {
                    warn!(error = %e, "failed to focus popup");
                }
            }
            return;
        }

        self.locked = true;
        // A new request supersedes any retry prompt still on screen.
        self.pending_offer = None;

        if !self.settings.supported_browser {
            info!("unsupported environment, opening popup immediately");
            self.open(false);
            return;
        }

        let delay = if lazy_load || self.transport.kind() == TransportKind::Extension {
            IMMEDIATE_DEBOUNCE
        } else {
            REQUEST_DEBOUNCE
        };
        self.pending_lazy = lazy_load;
        self.arm(TimerKind::Request, delay, TimerMode::Once);
        debug!(lazy_load, delay_ms = delay.as_millis() as u64, "popup request debounced");
    }

    /// Open the popup now and start the liveness poll and open timeout.
    pub fn open(&mut self, lazy_load: bool) {
        let url = self.content_url(lazy_load);
        info!(url = %url, "opening popup");

        if let Err(e) = self.transport.open(&url) {
            // No handle: the open timeout will offer a retry.
            warn!(url = %url, error = %e, "popup open failed");
        }

        if !self.settings.supported_browser {
            return;
        }

        self.arm(TimerKind::Poll, LIVENESS_POLL_INTERVAL, TimerMode::Repeat);
        self.arm(TimerKind::Open, OPEN_TIMEOUT, TimerMode::Once);
    }

    fn content_url(&self, lazy_load: bool) -> String {
        let src = &self.settings.popup_src;
        if !self.settings.supported_browser {
            format!("{src}{UNSUPPORTED_FRAGMENT}")
        } else if lazy_load {
            format!("{src}{LOADING_FRAGMENT}")
        } else {
            src.clone()
        }
    }

    /// Release the request gate without touching the popup.
    pub fn unlock(&mut self) {
        self.locked = false;
    }

    /// Tear everything down. Safe to call in any state, any number of times.
    pub fn close(&mut self) {
        self.locked = false;
        self.disarm(TimerKind::Request);
        self.disarm(TimerKind::Open);
        self.disarm(TimerKind::Poll);

        let dropped = self.gate.clear_waiters();
        if dropped > 0 {
            debug!(dropped, "dropped waiters on handshake gate");
        }

        self.transport.teardown();
        debug!("popup closed");
    }

    pub fn cancel(&mut self) {
        self.close();
    }

    /// Host page is unloading.
    pub fn on_before_unload(&mut self) {
        self.close();
    }

    // =========================================================================
    // TIMERS
    // =========================================================================

    /// Report expiry of a timer handed out by the scheduler. Ids the
    /// coordinator no longer holds are stale and ignored.
    pub fn on_timer(&mut self, id: TimerId) {
        let Some(kind) = self.timers.kind_of(id) else {
            debug!(timer = %id, "stale timer ignored");
            return;
        };

        match kind {
            TimerKind::Request => {
                self.timers.request = None;
                let lazy = std::mem::take(&mut self.pending_lazy);
                self.open(lazy);
            }
            TimerKind::Open => {
                self.timers.open = None;
                info!("popup did not bootstrap in time");
                self.fail_and_offer_retry();
            }
            TimerKind::Poll => self.poll_liveness(),
        }
    }

    fn poll_liveness(&mut self) {
        if self.transport.liveness() == Liveness::Closed {
            info!("popup closed by user");
            self.close();
            self.emit(PopupEvent::closed());
        }
    }

    // =========================================================================
    // RETRY
    // =========================================================================

    /// Close and hand a fresh retry offer to the prompt.
    pub(super) fn fail_and_offer_retry(&mut self) {
        self.close();

        self.retry_seq += 1;
        let offer = RetryOffer {
            seq: self.retry_seq,
        };
        self.pending_offer = Some(offer);
        debug!(offer = offer.seq, "offering retry");
        self.prompt.offer_retry(offer);
    }

    /// The offer the host can still answer, if any.
    pub fn pending_retry(&self) -> Option<RetryOffer> {
        self.pending_offer
    }

    /// Answer a retry offer. Superseded or already answered offers are ignored.
    pub fn answer_retry(&mut self, offer: RetryOffer, choice: RetryChoice) {
        if self.pending_offer != Some(offer) {
            debug!(offer = offer.seq, "ignoring answer to stale retry offer");
            return;
        }
        self.pending_offer = None;

        match choice {
            RetryChoice::Reopen => {
                info!("retrying popup open");
                self.locked = true;
                self.open(false);
            }
            RetryChoice::GiveUp => {
                info!("popup retry declined");
                self.emit(PopupEvent::closed());
            }
        }
    }
}
