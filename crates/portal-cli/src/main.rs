mod cli;
mod scenario;

use std::path::Path;

use tracing_subscriber::EnvFilter;

use portal_config::PopupSettings;

fn load_settings(args: &cli::Args) -> portal_common::Result<PopupSettings> {
    let mut settings = portal_config::load_settings(args.config.as_deref().map(Path::new))?;
    if let Some(env) = args.env {
        settings.env = env.into();
    }
    Ok(scenario::fit_settings(args.scenario, settings))
}

/// Run the chosen scenario on a current-thread runtime. Platform handles are
/// single-threaded, so everything stays on this thread.
fn run(args: &cli::Args, settings: PopupSettings) -> portal_common::Result<scenario::Report> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(scenario::run(args.scenario, settings, args.lazy))
}

fn main() {
    let args = cli::parse();

    // Initialize logging
    let log_directive = args.log_level.as_deref().unwrap_or("portal=info");
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(
                log_directive
                    .parse()
                    .unwrap_or_else(|_| "portal=info".parse().unwrap()),
            ),
        )
        .init();

    tracing::info!("Portal v{} starting", env!("CARGO_PKG_VERSION"));

    let settings = match load_settings(&args) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!("Failed to load settings: {e}");
            std::process::exit(1);
        }
    };
    tracing::debug!(settings = %portal_config::settings_to_json(&settings), "settings loaded");

    match run(&args, settings) {
        Ok(report) => {
            for call in &report.calls {
                tracing::info!(target: "portal::transcript", "{call}");
            }
            tracing::info!(
                events = ?report.events,
                inits = report.inits,
                retry_offers = report.retry_offers,
                "scenario finished"
            );
        }
        Err(e) => {
            tracing::error!("Scenario failed: {e}");
            std::process::exit(1);
        }
    }
}
