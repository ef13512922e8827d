//! Shared configuration for the WireProxy supervision daemon.
//!
//! Both the daemon and the interactive client need to agree on the TCP
//! endpoint, the logging options, and the on-disk layout of configuration
//! files, session logs, and the supervised binary. This crate holds those
//! shared types so the two halves cannot drift apart.

mod endpoint;
mod layout;
mod logging;

pub use endpoint::Endpoint;
pub use layout::{DataLayout, LayoutError};
pub use logging::{LogFormat, LogFormatParseError};

/// Default TCP port the daemon listens on.
pub const DEFAULT_PORT: u16 = 23888;

/// Default host for both listening and client connections.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Runtime configuration shared by the daemon and client entry points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    endpoint: Endpoint,
    log_filter: String,
    log_format: LogFormat,
}

impl Config {
    /// Builds a configuration for the given endpoint with default logging.
    #[must_use]
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            log_filter: default_log_filter(),
            log_format: LogFormat::default(),
        }
    }

    /// The TCP endpoint the daemon binds to and clients connect to.
    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Tracing filter expression applied to the daemon's telemetry.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Output format for daemon telemetry.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Replaces the logging filter expression.
    #[must_use]
    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    /// Replaces the logging output format.
    #[must_use]
    pub fn with_log_format(mut self, format: LogFormat) -> Self {
        self.log_format = format;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(Endpoint::default())
    }
}

fn default_log_filter() -> String {
    std::env::var("WPD_LOG").unwrap_or_else(|_| "info".to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_loopback_endpoint() {
        let config = Config::default();
        assert_eq!(config.endpoint().host(), DEFAULT_HOST);
        assert_eq!(config.endpoint().port(), DEFAULT_PORT);
    }

    #[test]
    fn builder_overrides_apply() {
        let config = Config::default()
            .with_log_filter("debug")
            .with_log_format(LogFormat::Json);
        assert_eq!(config.log_filter(), "debug");
        assert_eq!(config.log_format(), LogFormat::Json);
    }
}
