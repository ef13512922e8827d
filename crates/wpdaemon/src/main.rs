//! Binary entry point: daemon, interactive, or auto mode.

use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use clap::Parser;

use wpd_config::{Config, Endpoint};
use wpdaemon::{Cli, DaemonClient, InteractiveCli, RunMode, run_daemon};

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = Config::new(Endpoint::loopback(cli.port));

    match cli.mode() {
        RunMode::Daemon => match run_daemon(&config) {
            Ok(()) => ExitCode::SUCCESS,
            Err(error) => {
                eprintln!("wpdaemon: {error}");
                ExitCode::FAILURE
            }
        },
        RunMode::Interactive | RunMode::Auto => {
            let client = DaemonClient::new(config.endpoint().clone());
            let stdin = io::stdin().lock();
            let stdout = io::stdout().lock();
            run_interactive(client, stdin, stdout)
        }
    }
}

fn run_interactive(
    client: DaemonClient,
    input: impl BufRead,
    output: impl Write,
) -> ExitCode {
    match InteractiveCli::new(client, input, output).run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("wpdaemon: {error}");
            ExitCode::FAILURE
        }
    }
}
