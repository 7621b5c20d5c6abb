//! Popup coordinator.
//!
//! `PopupCoordinator` is the single state machine behind the popup façade:
//! request gating, open/close timers and liveness polling, the two-phase
//! handshake, and teardown. It is driven entirely from outside (host
//! calls, inbound messages, timer expiry) and never blocks. Every entry
//! point checks current state before acting, so independently scheduled
//! inputs may arrive in any order.

use tracing::debug;

use portal_common::{ConfigError, ListenerId, PopupEvent, PortalError, TimerId};
use portal_config::PopupSettings;

use crate::gate::HandshakeGate;
use crate::retry::{RetryOffer, RetryPrompt};
use crate::timer::{Scheduler, TimerKind, TimerMode};
use crate::transport::{self, Platform, PopupTransport, TransportKind};

mod handshake;
mod lifecycle;
mod outbound;


/// Where an inbound control message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSource {
    /// Origin-checked window messaging.
    Window,
    /// The bound extension channel.
    Channel,
}

type Listener = Box<dyn FnMut(&PopupEvent)>;

/// The three independent timer slots. At most one live id per slot.
#[derive(Debug, Default)]
struct TimerSlots {
    request: Option<TimerId>,
    open: Option<TimerId>,
    poll: Option<TimerId>,
}

impl TimerSlots {
    fn slot(&mut self, kind: TimerKind) -> &mut Option<TimerId> {
        match kind {
            TimerKind::Request => &mut self.request,
            TimerKind::Open => &mut self.open,
            TimerKind::Poll => &mut self.poll,
        }
    }

    fn kind_of(&self, id: TimerId) -> Option<TimerKind> {
        if self.request == Some(id) {
            Some(TimerKind::Request)
        } else if self.open == Some(id) {
            Some(TimerKind::Open)
        } else if self.poll == Some(id) {
            Some(TimerKind::Poll)
        } else {
            None
        }
    }
}

pub struct PopupCoordinator {
    settings: PopupSettings,
    /// Serialized origin of `settings.popup_src`.
    origin: String,
    transport: Box<dyn PopupTransport>,
    scheduler: Box<dyn Scheduler>,
    prompt: Box<dyn RetryPrompt>,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener: u64,
    /// Content-layer readiness. Lives as long as the coordinator.
    gate: HandshakeGate<MessageSource>,
    locked: bool,
    timers: TimerSlots,
    /// `lazy_load` of the request waiting on the debounce timer.
    pending_lazy: bool,
    retry_seq: u64,
    pending_offer: Option<RetryOffer>,
}

impl PopupCoordinator {
    /// Build a coordinator for `settings`, selecting the transport from the
    /// settings environment. Fails if `popup_src` has no origin or the
    /// platform does not fit the environment.
    pub fn new(
        settings: PopupSettings,
        platform: Platform,
        scheduler: impl Scheduler + 'static,
        prompt: impl RetryPrompt + 'static,
    ) -> Result<Self, PortalError> {
        let origin = settings.origin().ok_or_else(|| {
            ConfigError::ValidationError(format!(
                "popupSrc '{}' has no usable origin",
                settings.popup_src
            ))
        })?;
        let transport = transport::for_environment(settings.env, platform)?;

        debug!(origin = %origin, env = ?settings.env, "popup coordinator created");

        Ok(Self {
            settings,
            origin,
            transport,
            scheduler: Box::new(scheduler),
            prompt: Box::new(prompt),
            listeners: Vec::new(),
            next_listener: 1,
            gate: HandshakeGate::new(),
            locked: false,
            timers: TimerSlots::default(),
            pending_lazy: false,
            retry_seq: 0,
            pending_offer: None,
        })
    }

    pub fn settings(&self) -> &PopupSettings {
        &self.settings
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn transport_kind(&self) -> TransportKind {
        self.transport.kind()
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn has_handle(&self) -> bool {
        self.transport.has_handle()
    }

    pub fn has_channel(&self) -> bool {
        self.transport.has_channel()
    }

    /// Whether the content layer has reported ready.
    pub fn is_content_ready(&self) -> bool {
        self.gate.is_resolved()
    }

    /// Whether the coordinator holds a live timer of `kind`.
    pub fn is_timer_armed(&self, kind: TimerKind) -> bool {
        match kind {
            TimerKind::Request => self.timers.request.is_some(),
            TimerKind::Open => self.timers.open.is_some(),
            TimerKind::Poll => self.timers.poll.is_some(),
        }
    }

    // -- events ---------------------------------------------------------

    /// Register a listener for coordinator events. Listeners run inline
    /// and must not call back into the coordinator.
    pub fn on_event(&mut self, listener: impl FnMut(&PopupEvent) + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    fn emit(&mut self, event: PopupEvent) {
        debug!(?event, listeners = self.listeners.len(), "emitting popup event");
        for (_, listener) in self.listeners.iter_mut() {
            listener(&event);
        }
    }

    // -- timers ---------------------------------------------------------

    fn arm(&mut self, kind: TimerKind, delay: std::time::Duration, mode: TimerMode) {
        self.disarm(kind);
        let id = self.scheduler.schedule(kind, delay, mode);
        *self.timers.slot(kind) = Some(id);
    }

    fn disarm(&mut self, kind: TimerKind) {
        if let Some(id) = self.timers.slot(kind).take() {
            self.scheduler.cancel(id);
        }
    }
}
