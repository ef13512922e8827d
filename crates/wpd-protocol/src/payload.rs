//! Typed result payloads for each daemon command.

use serde::{Deserialize, Serialize};

/// Result of a successful `spin_up`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct SessionStarted {
    /// Always `"running"`.
    pub status: String,
    /// Normalized configuration name the process was launched with.
    pub config: String,
    /// OS process identifier of the supervised process.
    pub pid: u32,
    /// Path of the session log capturing the process output.
    pub log_file: String,
}

impl SessionStarted {
    /// Builds the payload for a freshly started session.
    #[must_use]
    pub fn new(config: impl Into<String>, pid: u32, log_file: impl Into<String>) -> Self {
        Self {
            status: "running".to_owned(),
            config: config.into(),
            pid,
            log_file: log_file.into(),
        }
    }
}

/// Result of a successful `spin_down`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct SessionStopped {
    /// Always `"stopped"`.
    pub status: String,
    /// Configuration the stopped process had been launched with.
    pub previous_config: String,
    /// Path of the finalized session log.
    pub log_file: String,
}

impl SessionStopped {
    /// Builds the payload for a stopped session.
    #[must_use]
    pub fn new(previous_config: impl Into<String>, log_file: impl Into<String>) -> Self {
        Self {
            status: "stopped".to_owned(),
            previous_config: previous_config.into(),
            log_file: log_file.into(),
        }
    }
}

/// Result of a `state` query: a definitive snapshot of the daemon.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct StateSnapshot {
    /// Whether a supervised process is currently running.
    pub running: bool,
    /// Configuration of the running process, when running.
    pub config: Option<String>,
    /// Process identifier of the running process, when running.
    pub pid: Option<u32>,
    /// Current session log path; survives process death for diagnosis.
    pub log_file: Option<String>,
}

impl StateSnapshot {
    /// Snapshot for a running supervised process.
    #[must_use]
    pub fn running(config: impl Into<String>, pid: u32, log_file: impl Into<String>) -> Self {
        Self {
            running: true,
            config: Some(config.into()),
            pid: Some(pid),
            log_file: Some(log_file.into()),
        }
    }

    /// Snapshot for the idle daemon, optionally naming the last session log.
    #[must_use]
    pub fn idle(log_file: Option<String>) -> Self {
        Self {
            running: false,
            config: None,
            pid: None,
            log_file,
        }
    }
}

/// Result of `available_confs`: the sorted configuration listing.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ConfigListing {
    /// Number of available configurations.
    pub count: usize,
    /// Lexicographically sorted configuration filenames.
    pub configs: Vec<String>,
}

impl ConfigListing {
    /// Builds a listing from an already-sorted set of names.
    #[must_use]
    pub fn new(configs: Vec<String>) -> Self {
        Self {
            count: configs.len(),
            configs,
        }
    }
}

/// Result of `whoami`: static daemon identification.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Identity {
    /// Daemon version string.
    pub version: String,
    /// Implementation language marker.
    pub implementation: String,
}

impl Identity {
    /// Builds the identity payload for this daemon build.
    #[must_use]
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            implementation: "Rust".to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_counts_entries() {
        let listing = ConfigListing::new(vec!["eu.conf".to_owned(), "us.conf".to_owned()]);
        assert_eq!(listing.count, 2);
    }

    #[test]
    fn empty_listing_counts_zero() {
        let listing = ConfigListing::new(Vec::new());
        assert_eq!(listing.count, 0);
        assert!(listing.configs.is_empty());
    }

    #[test]
    fn running_snapshot_populates_all_fields() {
        let snapshot = StateSnapshot::running("demo.conf", 4242, "/logs/1_demo.log");
        assert!(snapshot.running);
        assert_eq!(snapshot.pid, Some(4242));
        assert_eq!(snapshot.config.as_deref(), Some("demo.conf"));
    }
}
