//! Ownership of the single supervised OS subprocess.
//!
//! [`ProxyProcess`] owns one child end to end: it spawns the process in its
//! own process group with output redirected into the session log, answers
//! non-blocking liveness checks, and performs timed graceful-then-forced
//! termination. A background [`watcher`] tails the captured output for
//! transient network failure patterns and can request termination, but all
//! externally visible bookkeeping stays with the dispatcher.

mod errors;
mod process;
mod watcher;

pub use errors::SpawnError;
pub use process::{ProxyProcess, Termination};

pub(crate) const SUPERVISOR_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::supervisor");
