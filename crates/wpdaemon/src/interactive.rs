//! Interactive command-line client for a running daemon.
//!
//! A small REPL over [`DaemonClient`]: every command maps to one protocol
//! exchange, plus local helpers for the audit tail and for detaching a new
//! daemon. Input and output are injected so behaviour tests can drive the
//! loop without a terminal.

use std::io::{self, BufRead, Write};

use wpd_config::DataLayout;

use crate::audit::AuditLog;
use crate::client::DaemonClient;
use crate::detach;

/// Default number of audit lines shown by `logs`.
const DEFAULT_LOG_LINES: usize = 50;

/// REPL over the daemon protocol.
pub struct InteractiveCli<R, W> {
    client: DaemonClient,
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> InteractiveCli<R, W> {
    /// Builds a REPL reading commands from `input` and printing to `output`.
    pub fn new(client: DaemonClient, input: R, output: W) -> Self {
        Self {
            client,
            input,
            output,
        }
    }

    /// Runs the REPL until `quit`, `exit`, or end of input.
    ///
    /// # Errors
    ///
    /// Returns an IO error only when writing to the output fails; daemon
    /// errors are printed and the loop continues.
    pub fn run(&mut self) -> io::Result<()> {
        self.print_welcome()?;

        let mut line = String::new();
        loop {
            write!(self.output, "wpd> ")?;
            self.output.flush()?;

            line.clear();
            if self.input.read_line(&mut line)? == 0 {
                writeln!(self.output)?;
                break;
            }
            if !self.execute(line.trim())? {
                break;
            }
        }
        writeln!(self.output, "Goodbye!")?;
        Ok(())
    }

    /// Executes one REPL command; returns `false` when the loop should end.
    fn execute(&mut self, input: &str) -> io::Result<bool> {
        if input.is_empty() {
            return Ok(true);
        }
        let (command, args) = match input.split_once(' ') {
            Some((command, args)) => (command, args.trim()),
            None => (input, ""),
        };

        match command {
            "quit" | "exit" => return Ok(false),
            "status" => self.cmd_status()?,
            "configs" => self.cmd_configs()?,
            "start" => {
                if args.is_empty() {
                    writeln!(self.output, "Usage: start <config_name>")?;
                } else {
                    self.cmd_start(args)?;
                }
            }
            "stop" => self.cmd_stop()?,
            "logs" => self.cmd_logs(args)?,
            "daemonize" => self.cmd_daemonize()?,
            "help" => self.cmd_help()?,
            unknown => {
                writeln!(self.output, "Unknown command: {unknown}")?;
                writeln!(self.output, "Type 'help' for available commands.")?;
            }
        }
        Ok(true)
    }

    fn print_welcome(&mut self) -> io::Result<()> {
        writeln!(self.output, "========================================")?;
        writeln!(self.output, "  WireProxy Daemon (wpdaemon) CLI")?;
        writeln!(self.output, "========================================")?;
        writeln!(self.output)?;

        if self.client.is_daemon_running() {
            writeln!(
                self.output,
                "Connected to daemon on {}",
                self.client.endpoint()
            )?;
            self.cmd_status()?;
        } else {
            writeln!(self.output, "WARNING: Daemon is not running!")?;
            writeln!(self.output, "Use 'daemonize' command to start the daemon.")?;
        }

        writeln!(self.output)?;
        writeln!(self.output, "Type 'help' for available commands.")?;
        writeln!(self.output)
    }

    fn cmd_status(&mut self) -> io::Result<()> {
        let response = match self.client.send("state:") {
            Ok(response) => response,
            Err(error) => return writeln!(self.output, "Error: {error}"),
        };
        if let Some(error) = response.error {
            return writeln!(self.output, "Daemon error: {error}");
        }
        let Some(result) = response.result else {
            return writeln!(self.output, "Daemon returned no state");
        };
        if result.get("running").and_then(serde_json::Value::as_bool) == Some(true) {
            writeln!(
                self.output,
                "Status: Running with config: {} (pid {})",
                field(&result, "config"),
                field(&result, "pid"),
            )?;
            writeln!(self.output, "Log file: {}", field(&result, "log_file"))
        } else {
            writeln!(self.output, "Status: Idle (no process running)")
        }
    }

    fn cmd_configs(&mut self) -> io::Result<()> {
        let response = match self.client.send("available_confs:") {
            Ok(response) => response,
            Err(error) => return writeln!(self.output, "Error: {error}"),
        };
        let Some(result) = response.result else {
            return writeln!(self.output, "Daemon returned no listing");
        };
        let configs = result
            .get("configs")
            .and_then(serde_json::Value::as_array)
            .cloned()
            .unwrap_or_default();
        writeln!(self.output, "Available configurations ({}):", configs.len())?;
        for config in configs {
            writeln!(self.output, "  {}", config.as_str().unwrap_or_default())?;
        }
        Ok(())
    }

    fn cmd_start(&mut self, config: &str) -> io::Result<()> {
        writeln!(self.output, "Starting WireProxy with {config}...")?;
        match self.client.send(&format!("spin_up:{config}")) {
            Ok(response) => match response.error {
                Some(error) => writeln!(self.output, "Failed: {error}"),
                None => {
                    let result = response.result.unwrap_or_default();
                    writeln!(
                        self.output,
                        "Started {} (pid {})",
                        field(&result, "config"),
                        field(&result, "pid"),
                    )?;
                    writeln!(self.output, "Log file: {}", field(&result, "log_file"))
                }
            },
            Err(error) => writeln!(self.output, "Error: {error}"),
        }
    }

    fn cmd_stop(&mut self) -> io::Result<()> {
        match self.client.send("spin_down:") {
            Ok(response) => match response.error {
                Some(error) => writeln!(self.output, "Failed: {error}"),
                None => {
                    let result = response.result.unwrap_or_default();
                    writeln!(
                        self.output,
                        "Stopped WireProxy (was running {})",
                        field(&result, "previous_config"),
                    )
                }
            },
            Err(error) => writeln!(self.output, "Error: {error}"),
        }
    }

    fn cmd_logs(&mut self, args: &str) -> io::Result<()> {
        let lines = if args.is_empty() {
            DEFAULT_LOG_LINES
        } else {
            match args.parse() {
                Ok(lines) => lines,
                Err(_) => {
                    return writeln!(self.output, "Usage: logs [n]");
                }
            }
        };
        let tail = match DataLayout::discover() {
            Ok(layout) => AuditLog::new(&layout).last_lines(lines),
            Err(error) => return writeln!(self.output, "Error: {error}"),
        };
        if tail.is_empty() {
            writeln!(self.output, "No audit log entries.")
        } else {
            write!(self.output, "{tail}")
        }
    }

    fn cmd_daemonize(&mut self) -> io::Result<()> {
        if self.client.is_daemon_running() {
            return writeln!(self.output, "Daemon is already running.");
        }
        writeln!(self.output, "Starting daemon in the background...")?;
        match detach::spawn_daemon(&self.client) {
            Ok(()) => writeln!(
                self.output,
                "Daemon started on {}",
                self.client.endpoint()
            ),
            Err(error) => writeln!(self.output, "Failed to start daemon: {error}"),
        }
    }

    fn cmd_help(&mut self) -> io::Result<()> {
        writeln!(
            self.output,
            "Commands:\n\
             \x20 status               Show daemon status\n\
             \x20 configs              List available WireGuard configurations\n\
             \x20 start <config>       Start WireProxy with the given config\n\
             \x20 stop                 Stop the running WireProxy\n\
             \x20 logs [n]             Show last n audit log lines (default: {DEFAULT_LOG_LINES})\n\
             \x20 daemonize            Start the daemon and detach\n\
             \x20 help                 Show this help\n\
             \x20 quit, exit           Leave interactive mode"
        )
    }
}

fn field(value: &serde_json::Value, key: &str) -> String {
    match value.get(key) {
        Some(serde_json::Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
        None => "?".to_owned(),
    }
}
