//! The supervised process handle.

use std::fs::File;
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use nix::sys::signal::{Signal, killpg};
use nix::unistd::Pid;
use tracing::{debug, info, warn};

use super::SUPERVISOR_TARGET;
use super::errors::SpawnError;
use super::watcher::WatcherHandle;

/// Interval between liveness polls while waiting for graceful exit.
const TERMINATION_POLL: Duration = Duration::from_millis(100);

/// Number of polls before escalating to SIGKILL (5 seconds total).
const TERMINATION_ATTEMPTS: u32 = 50;

/// How a termination request concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The process exited within the graceful window after SIGTERM.
    Graceful,
    /// The process ignored SIGTERM and was killed.
    Forced,
    /// No live process was attached to the handle.
    NotRunning,
}

impl Termination {
    /// Rendering recorded in session-log footers and responses.
    pub fn describe(self) -> &'static str {
        match self {
            Self::Graceful => "Graceful termination",
            Self::Forced => "Force killed",
            Self::NotRunning => "Not running",
        }
    }
}

/// Owns one supervised subprocess from spawn to reaping.
///
/// The child runs in its own process group so one signal reaches the whole
/// tree. Construction is spawning: a handle that exists always refers to a
/// process that was launched, and the dispatcher's single slot guarantees
/// at most one handle exists at a time.
#[derive(Debug)]
pub struct ProxyProcess {
    config_name: String,
    child: Child,
    group: Pid,
    terminated: bool,
    network_drop: Arc<AtomicBool>,
    watcher: Option<WatcherHandle>,
}

impl ProxyProcess {
    /// Spawns the proxy with the given configuration.
    ///
    /// Standard output and error are redirected into `sink`, whose current
    /// length marks where the watcher begins tailing so it never re-reads
    /// header content. Spawning succeeding does not mean the process stayed
    /// up: callers poll [`Self::is_alive`] after a settle delay to catch
    /// immediate exits from bad configurations.
    ///
    /// # Errors
    ///
    /// Returns [`SpawnError`] when the binary is missing, the sink handle
    /// cannot be duplicated, or the OS rejects the spawn.
    pub fn spawn(
        binary: &Path,
        config_path: &Path,
        config_name: &str,
        sink: File,
        sink_path: &Path,
    ) -> Result<Self, SpawnError> {
        if !binary.is_file() {
            return Err(SpawnError::MissingBinary {
                path: binary.to_path_buf(),
            });
        }

        let watch_offset = sink
            .metadata()
            .map(|metadata| metadata.len())
            .unwrap_or_default();
        let stderr_sink = sink
            .try_clone()
            .map_err(|source| SpawnError::Redirect { source })?;

        let child = Command::new(binary)
            .arg("-c")
            .arg(config_path)
            .stdin(Stdio::null())
            .stdout(Stdio::from(sink))
            .stderr(Stdio::from(stderr_sink))
            .process_group(0)
            .spawn()
            .map_err(|source| SpawnError::Spawn {
                path: binary.to_path_buf(),
                source,
            })?;

        let group = Pid::from_raw(pid_raw(&child));
        info!(
            target: SUPERVISOR_TARGET,
            pid = child.id(),
            config = config_name,
            log = %sink_path.display(),
            "proxy process spawned"
        );

        let watcher = WatcherHandle::spawn(sink_path.to_path_buf(), watch_offset, group);
        let network_drop = watcher.network_drop_flag();

        Ok(Self {
            config_name: config_name.to_owned(),
            child,
            group,
            terminated: false,
            network_drop,
            watcher: Some(watcher),
        })
    }

    /// OS process identifier of the supervised child.
    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Configuration name the process was launched with.
    pub fn config_name(&self) -> &str {
        &self.config_name
    }

    /// Non-blocking liveness check; reaps the child if it already exited.
    ///
    /// Idempotent: once the child has been reaped the exit status is cached
    /// and subsequent calls keep returning `false`.
    pub fn is_alive(&mut self) -> bool {
        if self.terminated {
            return false;
        }
        match self.child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                debug!(
                    target: SUPERVISOR_TARGET,
                    pid = self.child.id(),
                    %status,
                    "proxy process has exited"
                );
                false
            }
            Err(error) => {
                warn!(
                    target: SUPERVISOR_TARGET,
                    pid = self.child.id(),
                    %error,
                    "liveness check failed"
                );
                false
            }
        }
    }

    /// Whether the watcher flagged a network drop before the process died.
    pub fn network_drop_detected(&self) -> bool {
        self.network_drop.load(Ordering::SeqCst)
    }

    /// Escalating shutdown of the process group.
    ///
    /// Sends SIGTERM to the group, polls for exit for up to five seconds,
    /// then falls back to SIGKILL and blocks until the child is reaped.
    /// Safe to call on an already-terminated handle, which reports
    /// [`Termination::NotRunning`] without delivering any signal.
    pub fn terminate(&mut self) -> Termination {
        if self.terminated {
            return Termination::NotRunning;
        }
        self.terminated = true;

        let outcome = self.deliver_termination();
        self.stop_watcher();
        info!(
            target: SUPERVISOR_TARGET,
            pid = self.child.id(),
            outcome = outcome.describe(),
            "proxy process terminated"
        );
        outcome
    }

    fn deliver_termination(&mut self) -> Termination {
        if let Err(error) = killpg(self.group, Signal::SIGTERM) {
            // ESRCH means the group is already gone; reap and report.
            debug!(
                target: SUPERVISOR_TARGET,
                pid = self.child.id(),
                %error,
                "SIGTERM delivery failed"
            );
        }

        for _ in 0..TERMINATION_ATTEMPTS {
            thread::sleep(TERMINATION_POLL);
            if matches!(self.child.try_wait(), Ok(Some(_))) {
                return Termination::Graceful;
            }
        }

        if let Err(error) = killpg(self.group, Signal::SIGKILL) {
            debug!(
                target: SUPERVISOR_TARGET,
                pid = self.child.id(),
                %error,
                "SIGKILL delivery failed"
            );
        }
        let _ = self.child.wait();
        Termination::Forced
    }

    fn stop_watcher(&mut self) {
        if let Some(watcher) = self.watcher.take() {
            watcher.stop();
        }
    }
}

impl Drop for ProxyProcess {
    fn drop(&mut self) {
        if !self.terminated {
            self.terminate();
        } else {
            self.stop_watcher();
        }
    }
}

fn pid_raw(child: &Child) -> i32 {
    // pid_t is i32 on every supported platform; an overflowing id cannot
    // name a live group, so the fallback only ever produces ESRCH.
    i32::try_from(child.id()).unwrap_or(i32::MAX)
}
