//! Daemon runtime: bind, serve, and tear down on signal.

use std::io;
use std::sync::Arc;

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::Signals;
use thiserror::Error;
use tracing::info;

use wpd_config::{Config, DataLayout, LayoutError};

use crate::audit::AuditLog;
use crate::binary::ProxyBinary;
use crate::dispatch::CommandDispatcher;
use crate::telemetry::{self, TelemetryError};
use crate::transport::{DispatchConnectionHandler, ListenerError, SocketListener};

const LAUNCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::launch");

/// Errors that abort daemon startup.
///
/// Nothing past successful startup terminates the daemon: runtime faults
/// become error responses or telemetry, and only a shutdown signal ends the
/// serve loop.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Telemetry could not be initialised.
    #[error("telemetry initialisation failed: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[from]
        source: TelemetryError,
    },
    /// The data layout could not be resolved or created.
    #[error("data layout preparation failed: {source}")]
    Layout {
        /// Underlying layout error.
        #[from]
        source: LayoutError,
    },
    /// The listening socket could not be bound.
    #[error("listener startup failed: {source}")]
    Listener {
        /// Underlying listener error.
        #[from]
        source: ListenerError,
    },
    /// Installing the shutdown signal handler failed.
    #[error("failed to install signal handlers: {source}")]
    Signals {
        /// Underlying IO error.
        source: io::Error,
    },
}

/// Abstraction over shutdown notification, injectable for tests.
pub trait ShutdownSignal {
    /// Blocks until the daemon should shut down.
    fn wait(&self) -> Result<(), LaunchError>;
}

/// Shutdown listener that waits for termination signals.
#[derive(Debug, Default)]
pub struct SystemShutdownSignal;

impl ShutdownSignal for SystemShutdownSignal {
    fn wait(&self) -> Result<(), LaunchError> {
        let mut signals = Signals::new([SIGTERM, SIGINT, SIGQUIT, SIGHUP])
            .map_err(|source| LaunchError::Signals { source })?;
        if let Some(signal) = signals.forever().next() {
            info!(target: LAUNCH_TARGET, signal, "shutdown signal received");
        }
        Ok(())
    }
}

/// Runs the daemon until a shutdown signal arrives.
///
/// # Errors
///
/// Returns [`LaunchError`] for startup failures only; the caller maps these
/// to a nonzero exit code.
pub fn run_daemon(config: &Config) -> Result<(), LaunchError> {
    let layout = DataLayout::discover()?;
    run_daemon_with(config, &layout, &SystemShutdownSignal)
}

/// Runs the daemon with injected layout and shutdown collaborators.
pub(crate) fn run_daemon_with(
    config: &Config,
    layout: &DataLayout,
    shutdown: &dyn ShutdownSignal,
) -> Result<(), LaunchError> {
    telemetry::initialise(config)?;
    layout.prepare()?;

    let binary = ProxyBinary::new(layout);
    info!(
        target: LAUNCH_TARGET,
        endpoint = %config.endpoint(),
        binary = %binary.path().display(),
        proxy_version = %binary.version(),
        "starting daemon"
    );

    let dispatcher = Arc::new(CommandDispatcher::new(layout, binary));
    let listener = SocketListener::bind(config.endpoint())?;
    let handler = Arc::new(DispatchConnectionHandler::new(Arc::clone(&dispatcher)));
    let listener_handle = listener.start(handler)?;

    let audit = AuditLog::new(layout);
    audit.info(&format!("Daemon listening on {}", config.endpoint()));

    shutdown.wait()?;

    audit.info("Daemon shutting down");
    listener_handle.shutdown();
    listener_handle.join()?;
    dispatcher.shutdown();
    info!(target: LAUNCH_TARGET, "shutdown sequence completed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ImmediateShutdown;

    impl ShutdownSignal for ImmediateShutdown {
        fn wait(&self) -> Result<(), LaunchError> {
            Ok(())
        }
    }

    #[test]
    fn daemon_starts_and_stops_on_shutdown_signal() {
        let dir = tempfile::tempdir().expect("temp dir");
        let layout = DataLayout::rooted_at(dir.path());
        // Ephemeral port keeps parallel test runs from colliding.
        let config = Config::new(wpd_config::Endpoint::loopback(0));
        run_daemon_with(&config, &layout, &ImmediateShutdown).expect("daemon run");
    }
}
