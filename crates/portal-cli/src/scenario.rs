//! Scripted host/popup conversations run on real tokio timers.

use std::time::Duration;

use serde_json::json;
use tracing::{info, warn};

use portal_common::{EventBus, PopupEvent, Result};
use portal_config::{Environment, PopupSettings};
use portal_popup::message::{
    IFRAME_LOADED, POPUP_BOOTSTRAP, POPUP_INIT, POPUP_LOADED, POPUP_PERMISSIONS_REQUEST,
};
use portal_popup::sim::SimBrowser;
use portal_popup::timer::{LIVENESS_POLL_INTERVAL, OPEN_TIMEOUT, REQUEST_DEBOUNCE};
use portal_popup::{ChannelPrompt, CoreMessage, Platform, PopupService, RetryChoice};

use crate::cli::Scenario;

/// Slack added to every wait so timers have fired before we look.
const SLACK: Duration = Duration::from_millis(50);

/// What happened during a run.
#[derive(Debug, Default)]
pub struct Report {
    pub events: Vec<PopupEvent>,
    pub retry_offers: usize,
    pub inits: usize,
    pub calls: Vec<String>,
}

/// Adjust settings so they fit the scenario's transport.
pub fn fit_settings(scenario: Scenario, mut settings: PopupSettings) -> PopupSettings {
    match scenario {
        Scenario::Extension => settings.env = Environment::WebExtension,
        _ if settings.is_extension() => {
            warn!("window scenario with extension settings, using web environment");
            settings.env = Environment::Web;
        }
        _ => {}
    }
    settings
}

pub async fn run(
    scenario: Scenario,
    settings: PopupSettings,
    lazy: bool,
) -> Result<Report> {
    let browser = SimBrowser::new();
    let platform = if settings.is_extension() {
        Platform::Extension(Box::new(browser.tabs()))
    } else {
        Platform::Window(Box::new(browser.windows()))
    };
    let src = settings.popup_src.clone();
    let channel_name = settings.channel_name.clone();

    let bus = EventBus::new(32);
    let mut events = bus.subscribe();
    let (prompt, mut offers) = ChannelPrompt::new();
    let (service, handle) = PopupService::new(settings, platform, prompt, bus)?;
    let origin = service.coordinator().origin().to_string();

    info!(?scenario, origin = %origin, "running scenario");

    let host = async {
        let mut retry_offers = 0;
        let window_message = |kind: &str| handle.window_message(origin.as_str(), json!({ "type": kind }));

        handle.request(lazy);
        tokio::time::sleep(REQUEST_DEBOUNCE + SLACK).await;

        match scenario {
            Scenario::Handshake => {
                window_message(POPUP_BOOTSTRAP);
                window_message(POPUP_LOADED);
                window_message(IFRAME_LOADED);
                handle.post_message(CoreMessage::new(
                    "ui-request_confirmation",
                    json!({ "view": "export-address" }),
                ));
                tokio::time::sleep(SLACK).await;
                handle.close();
            }
            Scenario::Timeout => {
                match tokio::time::timeout(OPEN_TIMEOUT * 2, offers.recv()).await {
                    Ok(Some(offer)) => {
                        retry_offers += 1;
                        info!(offer = offer.seq(), "declining retry");
                        handle.answer_retry(offer, RetryChoice::GiveUp);
                    }
                    Ok(None) | Err(_) => warn!("no retry offer arrived"),
                }
                tokio::time::sleep(SLACK).await;
            }
            Scenario::UserClose => {
                window_message(POPUP_BOOTSTRAP);
                browser.user_closes_window(0);
                tokio::time::sleep(LIVENESS_POLL_INTERVAL + SLACK).await;
            }
            Scenario::Extension => {
                let popup_tab = browser.tabs_with_url(&src).first().map(|tab| tab.id);
                let (port, _) = browser.connect(&channel_name, popup_tab);
                handle.channel_connect(port);
                handle.channel_message(json!({ "type": POPUP_LOADED }));
                window_message(IFRAME_LOADED);
                handle.channel_message(json!({ "type": POPUP_PERMISSIONS_REQUEST }));
                tokio::time::sleep(SLACK).await;
                handle.close();
            }
        }

        while let Ok(offer) = offers.try_recv() {
            retry_offers += 1;
            warn!(offer = offer.seq(), "unanswered retry offer");
        }
        handle.shutdown();
        retry_offers
    };

    let ((), retry_offers) = tokio::join!(service.run(), host);

    let mut report = Report {
        retry_offers,
        calls: browser.calls(),
        ..Report::default()
    };
    while let Ok(event) = events.try_recv() {
        report.events.push(event);
    }
    report.inits = report
        .calls
        .iter()
        .filter(|call| call.ends_with(&format!("postMessage {POPUP_INIT}")))
        .count();
    Ok(report)
}
