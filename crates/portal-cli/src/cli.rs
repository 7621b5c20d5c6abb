use clap::{Parser, ValueEnum};

use portal_config::Environment;

/// Portal: drive the popup coordinator against a simulated browser.
#[derive(Parser, Debug)]
#[command(name = "portal", version, about)]
pub struct Args {
    /// Scripted scenario to run.
    #[arg(short, long, value_enum, default_value_t = Scenario::Handshake)]
    pub scenario: Scenario,

    /// Host environment override (ignored by the extension scenario).
    #[arg(long, value_enum)]
    pub env: Option<EnvArg>,

    /// Open the lazy-load variant of the popup.
    #[arg(long)]
    pub lazy: bool,

    /// Config file path override.
    #[arg(long)]
    pub config: Option<String>,

    /// Log level override (debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    /// Popup bootstraps and completes the handshake.
    Handshake,
    /// Popup never bootstraps; the retry offer is declined.
    Timeout,
    /// User closes the popup window after it came up.
    UserClose,
    /// Popup hosted in an extension tab, talking over a channel.
    Extension,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvArg {
    Web,
    Electron,
}

impl From<EnvArg> for Environment {
    fn from(env: EnvArg) -> Self {
        match env {
            EnvArg::Web => Environment::Web,
            EnvArg::Electron => Environment::Electron,
        }
    }
}

pub fn parse() -> Args {
    Args::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_handshake() {
        let args = Args::parse_from(["portal"]);
        assert_eq!(args.scenario, Scenario::Handshake);
        assert!(args.env.is_none());
        assert!(!args.lazy);
    }

    #[test]
    fn parses_scenario_and_env() {
        let args = Args::parse_from(["portal", "--scenario", "user-close", "--env", "electron"]);
        assert_eq!(args.scenario, Scenario::UserClose);
        assert_eq!(args.env.map(Environment::from), Some(Environment::Electron));
    }
}
