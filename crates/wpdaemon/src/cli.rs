//! Command-line argument parsing and run-mode selection.

use clap::Parser;

use wpd_config::DEFAULT_PORT;

/// How the binary should run after parsing its flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Bind the TCP port and serve forever.
    Daemon,
    /// Connect as a client and offer the interactive prompt.
    Interactive,
    /// Probe for a running daemon, then drop into the interactive prompt.
    Auto,
}

/// WireProxy supervision daemon and client.
#[derive(Debug, Parser)]
#[command(
    name = "wpdaemon",
    version,
    about = "Supervises a WireProxy process over a loopback TCP protocol",
    after_help = "With no mode flag the binary probes for a running daemon \
                  and falls back to the interactive client."
)]
pub struct Cli {
    /// Run as background daemon (binds the TCP port).
    #[arg(short = 'd', long, conflicts_with = "interactive")]
    pub daemon: bool,

    /// Start the interactive CLI client.
    #[arg(short = 'i', long)]
    pub interactive: bool,

    /// TCP port to bind or connect to.
    #[arg(short = 'p', long, default_value_t = DEFAULT_PORT)]
    pub port: u16,
}

impl Cli {
    /// Selected run mode.
    pub fn mode(&self) -> RunMode {
        if self.daemon {
            RunMode::Daemon
        } else if self.interactive {
            RunMode::Interactive
        } else {
            RunMode::Auto
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;
    use rstest::rstest;

    use super::*;

    #[test]
    fn cli_declaration_is_consistent() {
        Cli::command().debug_assert();
    }

    #[rstest]
    #[case(&["wpdaemon"], RunMode::Auto, DEFAULT_PORT)]
    #[case(&["wpdaemon", "--daemon"], RunMode::Daemon, DEFAULT_PORT)]
    #[case(&["wpdaemon", "-d", "-p", "12345"], RunMode::Daemon, 12345)]
    #[case(&["wpdaemon", "--interactive"], RunMode::Interactive, DEFAULT_PORT)]
    fn parses_modes_and_port(
        #[case] argv: &[&str],
        #[case] mode: RunMode,
        #[case] port: u16,
    ) {
        let cli = Cli::parse_from(argv.iter().copied());
        assert_eq!(cli.mode(), mode);
        assert_eq!(cli.port, port);
    }

    #[test]
    fn daemon_and_interactive_conflict() {
        let result = Cli::try_parse_from(["wpdaemon", "--daemon", "--interactive"]);
        assert!(result.is_err());
    }
}
