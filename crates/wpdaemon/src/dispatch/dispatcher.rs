//! The dispatcher implementation.

use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use wpd_config::DataLayout;
use wpd_protocol::{
    ConfigListing, Identity, Request, Response, SessionStarted, SessionStopped, StateSnapshot,
};

use crate::audit::AuditLog;
use crate::binary::ProxyBinary;
use crate::configs::ConfigStore;
use crate::logs::SessionLogs;
use crate::state::{Lifecycle, StateMachine};
use crate::supervisor::ProxyProcess;

use super::DISPATCH_TARGET;

/// Pause between spawning and the first liveness check, long enough for a
/// bad configuration or missing capability to surface as an early exit.
const SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Everything the dispatcher may mutate, guarded by one lock.
///
/// The supervised process slot and its collaborators live together so no
/// command can observe a half-updated combination of state and handle.
struct Slot {
    process: Option<ProxyProcess>,
    configs: ConfigStore,
    binary: ProxyBinary,
    logs: SessionLogs,
    audit: AuditLog,
}

/// Maps protocol commands to state-machine-guarded actions.
///
/// `execute` is the only entry point; it serializes all callers through the
/// slot mutex, so at most one command runs at a time across every
/// connection. Lifecycle reads stay lock-free for other observers.
pub struct CommandDispatcher {
    state: StateMachine,
    slot: Mutex<Slot>,
}

impl CommandDispatcher {
    /// Builds a dispatcher over the given data layout and proxy binary.
    pub fn new(layout: &DataLayout, binary: ProxyBinary) -> Self {
        Self {
            state: StateMachine::new(),
            slot: Mutex::new(Slot {
                process: None,
                configs: ConfigStore::new(layout),
                binary,
                logs: SessionLogs::new(layout),
                audit: AuditLog::new(layout),
            }),
        }
    }

    /// Executes one raw command line and produces its response.
    ///
    /// The line is expected to carry the `name:args` separator; transport
    /// rejects lines without it, but a direct caller receives the same
    /// fixed parse-error response. Every path returns a well-formed
    /// response; no collaborator error propagates out of this method.
    pub fn execute(&self, raw_line: &str) -> Response {
        let mut slot = self
            .slot
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        slot.audit.command(raw_line.trim_end());

        let request = match Request::parse(raw_line) {
            Ok(request) => request,
            Err(error) => {
                warn!(target: DISPATCH_TARGET, %error, "unparseable command line");
                return Response::parse_error();
            }
        };

        debug!(
            target: DISPATCH_TARGET,
            command = request.name(),
            args = request.args().len(),
            "dispatching command"
        );

        // Reconcile observed reality before every command: a process that
        // died since the last command must not leak a stale RUNNING state
        // into any guard below.
        self.check_and_reap(&mut slot);

        let response = match request.name() {
            "spin_up" => match request.first_arg() {
                Some(config) => self.handle_spin_up(&mut slot, config),
                None => Response::failure(
                    "spin_up",
                    "Not enough args: spin_up requires config name",
                ),
            },
            "spin_down" => self.handle_spin_down(&mut slot),
            "state" => self.handle_state(&mut slot),
            "available_confs" => Self::handle_available_confs(&slot),
            "whoami" => Self::handle_whoami(),
            unknown => Response::failure(unknown, format!("Unknown command: {unknown}")),
        };

        if let Some(error) = &response.error {
            slot.audit
                .error(&format!("{} failed: {error}", response.command));
        } else {
            slot.audit.success(&format!("{} completed", response.command));
        }
        response
    }

    /// Current lifecycle state; lock-free, callable from any thread.
    pub fn lifecycle(&self) -> Lifecycle {
        self.state.current()
    }

    /// Terminates any supervised process during daemon shutdown.
    ///
    /// Best effort: the daemon is exiting, so failures only get logged.
    pub fn shutdown(&self) {
        let mut slot = self
            .slot
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(mut process) = slot.process.take() {
            let outcome = process.terminate();
            slot.logs.finalize(outcome.describe());
            slot.audit
                .action(&format!("Daemon shutdown: {}", outcome.describe()));
            let _ = self.state.attempt_transition(Lifecycle::Stopping);
            let _ = self.state.attempt_transition(Lifecycle::Idle);
        }
    }

    fn handle_spin_up(&self, slot: &mut Slot, config: &str) -> Response {
        const CMD: &str = "spin_up";

        if self.state.current() != Lifecycle::Idle {
            let mut message = "WireProxy is already running".to_owned();
            if let Some(process) = &slot.process {
                message.push_str(&format!(" with config: {}", process.config_name()));
            }
            return Response::failure(CMD, message);
        }

        let normalized = ConfigStore::normalize(config);
        if !slot.configs.exists(&normalized) {
            return Response::failure(CMD, format!("Configuration not found: {normalized}"));
        }

        if !self.transition(slot, Lifecycle::Starting) {
            return Response::failure(CMD, "Failed to transition to STARTING state");
        }

        let version = slot.binary.version();
        let config_path = slot.configs.resolve(&normalized);
        let log_path = match slot.logs.create(&normalized, &version, &config_path) {
            Ok(path) => path,
            Err(error) => {
                self.revert_to_idle(slot, None);
                return Response::failure(CMD, error.to_string());
            }
        };

        let sink = match slot.logs.redirect_handle() {
            Ok(sink) => sink,
            Err(error) => {
                self.revert_to_idle(slot, Some("Error during startup"));
                return Response::failure(CMD, error.to_string());
            }
        };

        let process = match ProxyProcess::spawn(
            slot.binary.path(),
            &config_path,
            &normalized,
            sink,
            &log_path,
        ) {
            Ok(process) => process,
            Err(error) => {
                warn!(target: DISPATCH_TARGET, %error, "spawn failed");
                self.revert_to_idle(slot, Some("Spawn failed"));
                return Response::failure(CMD, "Failed to spawn WireProxy process");
            }
        };
        slot.process = Some(process);

        // Immediate-exit failures (bad config, missing capability) only
        // surface after the child has had a moment to run.
        thread::sleep(SETTLE_DELAY);

        let alive = slot
            .process
            .as_mut()
            .is_some_and(ProxyProcess::is_alive);
        if !alive {
            self.revert_to_idle(slot, Some("Process died during startup"));
            return Response::failure(
                CMD,
                format!(
                    "WireProxy failed to start. Check log: {}",
                    log_path.display()
                ),
            );
        }

        if !self.transition(slot, Lifecycle::Running) {
            self.revert_to_idle(slot, Some("Error during startup"));
            return Response::failure(CMD, "Failed to transition to RUNNING state");
        }

        let pid = slot.process.as_ref().map(ProxyProcess::pid).unwrap_or_default();
        slot.audit
            .action(&format!("Started WireProxy with {normalized} (pid {pid})"));
        Response::success(
            CMD,
            SessionStarted::new(&normalized, pid, log_path.display().to_string()),
        )
    }

    fn handle_spin_down(&self, slot: &mut Slot) -> Response {
        const CMD: &str = "spin_down";

        if self.state.current() != Lifecycle::Running || slot.process.is_none() {
            return Response::failure(CMD, "WireProxy is not running");
        }

        if !self.transition(slot, Lifecycle::Stopping) {
            return Response::failure(CMD, "Failed to transition to STOPPING state");
        }

        let Some(mut process) = slot.process.take() else {
            // Guarded above; keep the state machine honest regardless.
            self.transition(slot, Lifecycle::Idle);
            return Response::failure(CMD, "WireProxy is not running");
        };
        let previous_config = process.config_name().to_owned();
        let log_path = slot
            .logs
            .current_path()
            .map(|path| path.display().to_string())
            .unwrap_or_default();

        let outcome = process.terminate();
        drop(process);
        slot.logs.finalize(outcome.describe());
        self.transition(slot, Lifecycle::Idle);
        slot.audit.action(&format!(
            "Stopped WireProxy ({previous_config}): {}",
            outcome.describe()
        ));

        Response::success(CMD, SessionStopped::new(previous_config, log_path))
    }

    fn handle_state(&self, slot: &mut Slot) -> Response {
        const CMD: &str = "state";

        if self.state.current() == Lifecycle::Running {
            if let Some(process) = &slot.process {
                let log_path = slot
                    .logs
                    .current_path()
                    .map(|path| path.display().to_string())
                    .unwrap_or_default();
                return Response::success(
                    CMD,
                    StateSnapshot::running(process.config_name(), process.pid(), log_path),
                );
            }
        }
        let last_log = slot
            .logs
            .current_path()
            .map(|path| path.display().to_string());
        Response::success(CMD, StateSnapshot::idle(last_log))
    }

    fn handle_available_confs(slot: &Slot) -> Response {
        const CMD: &str = "available_confs";
        match slot.configs.list() {
            Ok(configs) => Response::success(CMD, ConfigListing::new(configs)),
            Err(error) => Response::failure(CMD, error.to_string()),
        }
    }

    fn handle_whoami() -> Response {
        Response::success("whoami", Identity::new(env!("CARGO_PKG_VERSION")))
    }

    /// Detects a process that died outside any command and reconciles.
    ///
    /// The watcher only causes death; observing it and cleaning up happens
    /// here, exactly once, because the session log finalizes on the first
    /// observation and the slot empties with it.
    fn check_and_reap(&self, slot: &mut Slot) {
        if self.state.current() != Lifecycle::Running {
            return;
        }
        let Some(process) = slot.process.as_mut() else {
            return;
        };
        if process.is_alive() {
            return;
        }

        let reason = if process.network_drop_detected() {
            "Network drop detected - auto-terminated"
        } else {
            "Process died unexpectedly"
        };
        warn!(target: DISPATCH_TARGET, reason, "supervised process is gone");
        slot.audit.action(reason);
        slot.process = None;
        slot.logs.finalize(reason);
        self.transition(slot, Lifecycle::Idle);
    }

    /// Commits a transition and audits it; returns whether it was legal.
    fn transition(&self, slot: &mut Slot, target: Lifecycle) -> bool {
        let from = self.state.current();
        let committed = self.state.attempt_transition(target);
        if committed {
            slot.audit.state_transition(from.as_str(), target.as_str());
        }
        committed
    }

    /// Releases any partial session and returns the lifecycle to idle.
    ///
    /// `finalize_reason` closes the session log when a log was opened for
    /// the failed attempt; `None` skips the footer for failures that
    /// happened before log creation.
    fn revert_to_idle(&self, slot: &mut Slot, finalize_reason: Option<&str>) {
        slot.process = None;
        if let Some(reason) = finalize_reason
            && slot.logs.is_open()
        {
            slot.logs.finalize(reason);
        }
        if self.state.current() != Lifecycle::Idle && !self.transition(slot, Lifecycle::Idle) {
            warn!(
                target: DISPATCH_TARGET,
                state = %self.state.current(),
                "could not revert lifecycle to idle"
            );
        }
    }
}
