//! Tokio driver for the coordinator.
//!
//! [`PopupService`] owns a [`PopupCoordinator`] and runs it on one task,
//! feeding it host commands and timer expiries through a `select!` loop.
//! Timers come from [`TokioScheduler`]: each one is a spawned task that
//! sleeps and then reports its id back over a channel. Coordinator events
//! are republished on an [`EventBus`].
//!
//! Platform handles are not `Send`, so the service future must be awaited
//! on the thread that built it (a current-thread runtime or a `LocalSet`).

use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

use portal_common::{EventBus, PopupEvent, PortalError, TimerId};
use portal_config::PopupSettings;

use crate::coordinator::PopupCoordinator;
use crate::message::CoreMessage;
use crate::platform::ChannelPort;
use crate::retry::{RetryChoice, RetryOffer, RetryPrompt};
use crate::timer::{Scheduler, TimerKind, TimerMode};
use crate::transport::Platform;

// =============================================================================
// TOKIO SCHEDULER
// =============================================================================

pub struct TokioScheduler {
    fires: mpsc::UnboundedSender<TimerId>,
    tasks: HashMap<TimerId, JoinHandle<()>>,
    next_id: u64,
}

impl TokioScheduler {
    /// Create a scheduler and the receiver its timers report to.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TimerId>) {
        let (fires, rx) = mpsc::unbounded_channel();
        let scheduler = Self {
            fires,
            tasks: HashMap::new(),
            next_id: 0,
        };
        (scheduler, rx)
    }

    /// Number of timers not yet finished or cancelled.
    pub fn live_timers(&self) -> usize {
        self.tasks.values().filter(|t| !t.is_finished()).count()
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&mut self, kind: TimerKind, delay: Duration, mode: TimerMode) -> TimerId {
        self.tasks.retain(|_, task| !task.is_finished());

        self.next_id += 1;
        let id = TimerId(self.next_id);
        let fires = self.fires.clone();
        let period = delay.max(Duration::from_millis(1));

        let task = tokio::spawn(async move {
            let mut wait = delay;
            loop {
                tokio::time::sleep(wait).await;
                if fires.send(id).is_err() || mode == TimerMode::Once {
                    break;
                }
                wait = period;
            }
        });
        trace!(timer = %id, ?kind, delay_ms = delay.as_millis() as u64, "timer armed");
        self.tasks.insert(id, task);
        id
    }

    fn cancel(&mut self, id: TimerId) {
        if let Some(task) = self.tasks.remove(&id) {
            task.abort();
            trace!(timer = %id, "timer cancelled");
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        for (_, task) in self.tasks.drain() {
            task.abort();
        }
    }
}

// =============================================================================
// SERVICE
// =============================================================================

/// Host-side inputs to the service.
pub enum PopupCommand {
    Request { lazy_load: bool },
    Unlock,
    Close,
    Unload,
    PostMessage(CoreMessage),
    WindowMessage { origin: String, data: Value },
    ChannelConnect(Box<dyn ChannelPort>),
    ChannelMessage(Value),
    AnswerRetry { offer: RetryOffer, choice: RetryChoice },
    Shutdown,
}

impl PopupCommand {
    fn name(&self) -> &'static str {
        match self {
            Self::Request { .. } => "request",
            Self::Unlock => "unlock",
            Self::Close => "close",
            Self::Unload => "unload",
            Self::PostMessage(_) => "post_message",
            Self::WindowMessage { .. } => "window_message",
            Self::ChannelConnect(_) => "channel_connect",
            Self::ChannelMessage(_) => "channel_message",
            Self::AnswerRetry { .. } => "answer_retry",
            Self::Shutdown => "shutdown",
        }
    }
}

pub struct PopupService {
    coordinator: PopupCoordinator,
    commands: mpsc::UnboundedReceiver<PopupCommand>,
    timers: mpsc::UnboundedReceiver<TimerId>,
}

/// Cloneable sender side of a [`PopupService`].
#[derive(Clone)]
pub struct PopupServiceHandle {
    commands: mpsc::UnboundedSender<PopupCommand>,
    bus: EventBus,
}

impl PopupService {
    pub fn new(
        settings: PopupSettings,
        platform: Platform,
        prompt: impl RetryPrompt + 'static,
        bus: EventBus,
    ) -> Result<(Self, PopupServiceHandle), PortalError> {
        let (scheduler, timers) = TokioScheduler::new();
        let mut coordinator = PopupCoordinator::new(settings, platform, scheduler, prompt)?;

        let events = bus.clone();
        coordinator.on_event(move |event: &PopupEvent| {
            events.publish(event.clone());
        });

        let (commands_tx, commands) = mpsc::unbounded_channel();
        let service = Self {
            coordinator,
            commands,
            timers,
        };
        let handle = PopupServiceHandle {
            commands: commands_tx,
            bus,
        };
        Ok((service, handle))
    }

    pub fn coordinator(&self) -> &PopupCoordinator {
        &self.coordinator
    }

    /// Run until `Shutdown` or until every handle is dropped. The popup is
    /// closed on the way out.
    pub async fn run(mut self) {
        info!("popup service started");
        loop {
            tokio::select! {
                Some(id) = self.timers.recv() => self.coordinator.on_timer(id),
                command = self.commands.recv() => match command {
                    Some(command) => {
                        if !self.apply(command) {
                            break;
                        }
                    }
                    None => break,
                },
            }
        }
        self.coordinator.close();
        info!("popup service stopped");
    }

    /// Returns false when the loop should stop.
    fn apply(&mut self, command: PopupCommand) -> bool {
        debug!(command = command.name(), "popup command");
        match command {
            PopupCommand::Request { lazy_load } => self.coordinator.request(lazy_load),
            PopupCommand::Unlock => self.coordinator.unlock(),
            PopupCommand::Close => self.coordinator.close(),
            PopupCommand::Unload => self.coordinator.on_before_unload(),
            PopupCommand::PostMessage(message) => self.coordinator.post_message(&message),
            PopupCommand::WindowMessage { origin, data } => {
                self.coordinator.handle_window_message(&origin, &data)
            }
            PopupCommand::ChannelConnect(port) => {
                self.coordinator.handle_channel_connect(port);
            }
            PopupCommand::ChannelMessage(data) => self.coordinator.handle_channel_message(&data),
            PopupCommand::AnswerRetry { offer, choice } => {
                self.coordinator.answer_retry(offer, choice)
            }
            PopupCommand::Shutdown => return false,
        }
        true
    }
}

impl PopupServiceHandle {
    fn send(&self, command: PopupCommand) -> bool {
        let name = command.name();
        if self.commands.send(command).is_err() {
            debug!(command = name, "popup service gone, command dropped");
            return false;
        }
        true
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PopupEvent> {
        self.bus.subscribe()
    }

    pub fn request(&self, lazy_load: bool) -> bool {
        self.send(PopupCommand::Request { lazy_load })
    }

    pub fn unlock(&self) -> bool {
        self.send(PopupCommand::Unlock)
    }

    pub fn close(&self) -> bool {
        self.send(PopupCommand::Close)
    }

    pub fn unload(&self) -> bool {
        self.send(PopupCommand::Unload)
    }

    pub fn post_message(&self, message: CoreMessage) -> bool {
        self.send(PopupCommand::PostMessage(message))
    }

    pub fn window_message(&self, origin: impl Into<String>, data: Value) -> bool {
        self.send(PopupCommand::WindowMessage {
            origin: origin.into(),
            data,
        })
    }

    pub fn channel_connect(&self, port: Box<dyn ChannelPort>) -> bool {
        self.send(PopupCommand::ChannelConnect(port))
    }

    pub fn channel_message(&self, data: Value) -> bool {
        self.send(PopupCommand::ChannelMessage(data))
    }

    pub fn answer_retry(&self, offer: RetryOffer, choice: RetryChoice) -> bool {
        self.send(PopupCommand::AnswerRetry { offer, choice })
    }

    pub fn shutdown(&self) -> bool {
        self.send(PopupCommand::Shutdown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{IFRAME_LOADED, POPUP_BOOTSTRAP, POPUP_INIT, POPUP_LOADED};
    use crate::retry::ChannelPrompt;
    use crate::sim::SimBrowser;
    use crate::timer::{LIVENESS_POLL_INTERVAL, OPEN_TIMEOUT, REQUEST_DEBOUNCE};
    use portal_config::Environment;
    use serde_json::json;

    const SRC: &str = "https://popup.example/popup.html";
    const ORIGIN: &str = "https://popup.example";

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn web_service(
        browser: &SimBrowser,
    ) -> (PopupService, PopupServiceHandle, mpsc::UnboundedReceiver<RetryOffer>) {
        let mut settings = PopupSettings::with_src(SRC);
        settings.env = Environment::Web;
        let (prompt, offers) = ChannelPrompt::new();
        let (service, handle) = PopupService::new(
            settings,
            Platform::Window(Box::new(browser.windows())),
            prompt,
            EventBus::new(16),
        )
        .unwrap();
        (service, handle, offers)
    }

    #[tokio::test(start_paused = true)]
    async fn scheduler_fires_once_and_repeats() {
        let (mut scheduler, mut rx) = TokioScheduler::new();
        let once = scheduler.schedule(TimerKind::Open, ms(100), TimerMode::Once);
        let repeat = scheduler.schedule(TimerKind::Poll, ms(40), TimerMode::Repeat);

        let mut fired = Vec::new();
        for _ in 0..3 {
            fired.push(rx.recv().await.unwrap());
        }
        // 40, 80, 100
        assert_eq!(fired, vec![repeat, repeat, once]);

        scheduler.cancel(repeat);
        tokio::time::sleep(ms(500)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(scheduler.live_timers(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn handshake_runs_on_real_timers() {
        let browser = SimBrowser::new();
        let (service, handle, _offers) = web_service(&browser);

        let host = async {
            handle.request(false);
            tokio::time::sleep(REQUEST_DEBOUNCE + ms(1)).await;
            assert_eq!(browser.opened_windows(), 1);

            handle.window_message(ORIGIN, json!({ "type": POPUP_BOOTSTRAP }));
            handle.window_message(ORIGIN, json!({ "type": POPUP_LOADED }));
            handle.window_message(ORIGIN, json!({ "type": IFRAME_LOADED }));
            tokio::time::sleep(OPEN_TIMEOUT * 2).await;
            handle.shutdown();
        };
        tokio::join!(service.run(), host);

        let window = browser.window(0).unwrap();
        let inits = window
            .posted
            .iter()
            .filter(|(msg, _)| msg["type"] == POPUP_INIT)
            .count();
        assert_eq!(inits, 1);
        // Shutdown closes the popup.
        assert!(window.closed);
    }

    #[tokio::test(start_paused = true)]
    async fn open_timeout_offers_retry_and_give_up_publishes_closed() {
        let browser = SimBrowser::new();
        let (service, handle, mut offers) = web_service(&browser);
        let mut events = handle.subscribe();

        let host = async {
            handle.request(false);
            let offer = offers.recv().await.unwrap();
            assert!(browser.window(0).unwrap().closed);

            handle.answer_retry(offer, RetryChoice::GiveUp);
            let event = events.recv().await.unwrap();
            assert_eq!(event, PopupEvent::closed());
            handle.shutdown();
        };
        tokio::join!(service.run(), host);
    }

    #[tokio::test(start_paused = true)]
    async fn user_close_is_published() {
        let browser = SimBrowser::new();
        let (service, handle, _offers) = web_service(&browser);
        let mut events = handle.subscribe();

        let host = async {
            handle.request(true);
            tokio::time::sleep(ms(10)).await;
            handle.window_message(ORIGIN, json!({ "type": POPUP_BOOTSTRAP }));
            browser.user_closes_window(0);

            tokio::time::sleep(LIVENESS_POLL_INTERVAL + ms(10)).await;
            assert_eq!(events.recv().await.unwrap(), PopupEvent::closed());
            drop(handle);
        };
        tokio::join!(service.run(), host);
    }
}
