//! Spawns the daemon as a detached background process.
//!
//! Used by the interactive `daemonize` command: the current executable is
//! re-launched with `--daemon` in a fresh session with its stdio pointed at
//! the null device, so the daemon survives the terminal that started it.

use std::os::unix::process::CommandExt;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::info;

use crate::client::DaemonClient;

const DETACH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::detach");

/// Interval between readiness probes after spawning.
const READY_POLL: Duration = Duration::from_millis(100);

/// How long to wait for the spawned daemon to answer.
const READY_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors surfaced while detaching a daemon.
#[derive(Debug, Error)]
pub enum DetachError {
    /// The current executable path could not be determined.
    #[error("failed to locate current executable: {source}")]
    CurrentExe {
        /// Underlying IO error.
        source: std::io::Error,
    },
    /// Spawning the daemon process failed.
    #[error("failed to spawn daemon process: {source}")]
    Spawn {
        /// Underlying IO error.
        source: std::io::Error,
    },
    /// The daemon did not answer within the readiness timeout.
    #[error("timeout waiting for daemon to start")]
    StartupTimeout,
}

/// Spawns a detached daemon on the client's endpoint and waits until it
/// answers.
///
/// # Errors
///
/// Returns [`DetachError`] when the spawn fails or the daemon never
/// becomes reachable.
pub fn spawn_daemon(client: &DaemonClient) -> Result<(), DetachError> {
    let exe = std::env::current_exe().map_err(|source| DetachError::CurrentExe { source })?;
    let port = client.endpoint().port();

    let mut command = Command::new(exe);
    command
        .arg("--daemon")
        .arg("--port")
        .arg(port.to_string())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    // SAFETY: setsid is async-signal-safe and called before exec in the
    // forked child, detaching it into its own session so it outlives the
    // controlling terminal.
    unsafe {
        command.pre_exec(|| {
            nix::unistd::setsid()
                .map(|_| ())
                .map_err(std::io::Error::from)
        });
    }
    let child = command
        .spawn()
        .map_err(|source| DetachError::Spawn { source })?;
    info!(
        target: DETACH_TARGET,
        pid = child.id(),
        port,
        "daemon process spawned"
    );

    wait_until_ready(client)
}

fn wait_until_ready(client: &DaemonClient) -> Result<(), DetachError> {
    let deadline = Instant::now() + READY_TIMEOUT;
    while Instant::now() < deadline {
        if client.is_daemon_running() {
            return Ok(());
        }
        thread::sleep(READY_POLL);
    }
    Err(DetachError::StartupTimeout)
}
