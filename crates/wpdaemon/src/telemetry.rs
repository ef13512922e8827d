//! Structured telemetry initialisation for the daemon.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use tracing::{Subscriber, subscriber::SetGlobalDefaultError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

use wpd_config::{Config, LogFormat};

static TELEMETRY_GUARD: OnceCell<()> = OnceCell::new();

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The configured log filter expression failed to parse.
    #[error("invalid log filter: {0}")]
    Filter(String),
    /// Installing the tracing subscriber failed.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
}

/// Configures the global tracing subscriber on first invocation.
///
/// Repeated calls are idempotent: only the first installs the global
/// subscriber, later calls detect the existing registration and return
/// without touching global state.
///
/// # Errors
///
/// Returns [`TelemetryError`] when the filter expression is invalid or a
/// subscriber is already installed outside this guard.
pub fn initialise(config: &Config) -> Result<(), TelemetryError> {
    TELEMETRY_GUARD
        .get_or_try_init(|| install_subscriber(config))
        .map(|_guard| ())
}

fn install_subscriber(config: &Config) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_new(config.log_filter())
        .map_err(|error| TelemetryError::Filter(error.to_string()))?;

    let builder = |filter: EnvFilter| {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .with_level(true)
            .with_writer(io::stderr)
            // Colour only on interactive terminals; log files stay clean.
            .with_ansi(io::stderr().is_terminal())
            .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
    };

    let subscriber: Box<dyn Subscriber + Send + Sync> = match config.log_format() {
        LogFormat::Json => {
            let json = builder(filter).json().flatten_event(true).finish();
            Box::new(json)
        }
        LogFormat::Compact => Box::new(builder(filter).compact().finish()),
    };

    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_initialisation_is_idempotent() {
        let config = Config::default();
        let first = initialise(&config);
        let second = initialise(&config);
        assert!(first.is_ok());
        assert!(second.is_ok());
    }

    #[test]
    fn invalid_filter_is_rejected_before_installation() {
        let error = EnvFilter::try_new("not==valid==filter");
        assert!(error.is_err());
    }
}
