//! Control daemon supervising a single WireProxy process.
//!
//! The daemon owns at most one supervised subprocess at a time and exposes
//! its lifecycle over a line-oriented TCP protocol on loopback. Commands
//! from any number of concurrent clients funnel into one dispatcher, which
//! guards every action with a four-state lifecycle machine and is the only
//! component allowed to create or destroy the process handle. A background
//! watcher tails the process output for transient network failures and
//! terminates the process when they persist; the dispatcher reconciles the
//! resulting death on its next command.
//!
//! The same binary doubles as the client: `--interactive` (or bare
//! invocation) connects to a running daemon and offers a small prompt for
//! starting, stopping, and inspecting the supervised process.

mod audit;
mod binary;
mod cli;
mod client;
mod configs;
mod detach;
mod dispatch;
mod interactive;
mod launch;
mod logs;
mod state;
mod supervisor;
mod telemetry;
mod transport;

pub use binary::ProxyBinary;
pub use cli::{Cli, RunMode};
pub use client::{ClientError, DaemonClient};
pub use dispatch::CommandDispatcher;
pub use interactive::InteractiveCli;
pub use launch::{LaunchError, run_daemon};
pub use state::{Lifecycle, StateMachine};
pub use telemetry::TelemetryError;
pub use transport::{
    ConnectionHandler, DispatchConnectionHandler, ListenerError, ListenerHandle, SocketListener,
};
