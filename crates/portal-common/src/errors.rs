use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("config parse error: {0}")]
    ParseError(String),

    #[error("config validation error: {0}")]
    ValidationError(String),
}

/// Failures reported by the opaque window/tab/channel primitives.
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("window blocked: {0}")]
    WindowBlocked(String),

    #[error("window not found: {0}")]
    WindowNotFound(String),

    #[error("tab not found: {0}")]
    TabNotFound(String),

    #[error("channel error: {0}")]
    Channel(String),

    #[error("platform api error: {0}")]
    Api(String),
}

#[derive(Debug, thiserror::Error)]
pub enum PortalError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("transport mismatch: {0}")]
    TransportMismatch(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = ConfigError::FileNotFound(PathBuf::from("/tmp/missing.toml"));
        assert_eq!(err.to_string(), "config file not found: /tmp/missing.toml");

        let err = ConfigError::ParseError("unexpected token".into());
        assert_eq!(err.to_string(), "config parse error: unexpected token");

        let err = ConfigError::ValidationError("popupSrc has no origin".into());
        assert_eq!(
            err.to_string(),
            "config validation error: popupSrc has no origin"
        );
    }

    #[test]
    fn platform_error_display() {
        let err = PlatformError::WindowBlocked("popup blocker".into());
        assert_eq!(err.to_string(), "window blocked: popup blocker");

        let err = PlatformError::TabNotFound("42".into());
        assert_eq!(err.to_string(), "tab not found: 42");

        let err = PlatformError::Channel("port closed".into());
        assert_eq!(err.to_string(), "channel error: port closed");
    }

    #[test]
    fn portal_error_from_config() {
        let config_err = ConfigError::ParseError("bad toml".into());
        let err: PortalError = config_err.into();
        assert!(matches!(err, PortalError::Config(_)));
        assert!(err.to_string().contains("bad toml"));
    }

    #[test]
    fn portal_error_from_platform() {
        let platform_err = PlatformError::Api("tabs.query failed".into());
        let err: PortalError = platform_err.into();
        assert!(matches!(err, PortalError::Platform(_)));
        assert!(err.to_string().contains("tabs.query failed"));
    }

    #[test]
    fn portal_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err: PortalError = io_err.into();
        assert!(matches!(err, PortalError::Io(_)));
        assert!(err.to_string().contains("file missing"));
    }

    #[test]
    fn transport_mismatch_display() {
        let err = PortalError::TransportMismatch("webextension needs tabs".into());
        assert_eq!(err.to_string(), "transport mismatch: webextension needs tabs");
    }
}
