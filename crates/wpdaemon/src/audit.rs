//! Append-only audit log of commands and their outcomes.
//!
//! The audit log is fire-and-forget: dispatch never consults it for
//! decisions and write failures are reported through telemetry rather than
//! propagated. The interactive `logs` command reads the tail back for
//! operators.

use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

use time::OffsetDateTime;
use time::format_description::FormatItem;
use time::macros::format_description;
use tracing::warn;

use wpd_config::DataLayout;

const AUDIT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::audit");

const AUDIT_FILE_NAME: &str = "audit.log";

const TIMESTAMP_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

/// Category tag prefixed to every audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditCategory {
    /// A command was received from a client.
    Command,
    /// A lifecycle state transition was committed.
    State,
    /// An action was taken on the supervised process.
    Action,
    /// An operation failed.
    Error,
    /// An operation completed successfully.
    Success,
    /// General information.
    Info,
}

impl AuditCategory {
    fn tag(self) -> &'static str {
        match self {
            Self::Command => "[CMD]",
            Self::State => "[STATE]",
            Self::Action => "[ACTION]",
            Self::Error => "[ERROR]",
            Self::Success => "[SUCCESS]",
            Self::Info => "[INFO]",
        }
    }
}

/// Append-only audit trail stored beside the session logs.
#[derive(Debug)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    /// Builds an audit log in the layout's log directory.
    pub fn new(layout: &DataLayout) -> Self {
        Self {
            path: layout.logs_dir().join(AUDIT_FILE_NAME),
        }
    }

    /// Records a received command.
    pub fn command(&self, command: &str) {
        self.write(AuditCategory::Command, &format!("Command received: {command}"));
    }

    /// Records a committed state transition.
    pub fn state_transition(&self, from: &str, to: &str) {
        self.write(AuditCategory::State, &format!("{from} -> {to}"));
    }

    /// Records an action taken on the supervised process.
    pub fn action(&self, action: &str) {
        self.write(AuditCategory::Action, action);
    }

    /// Records a failed operation.
    pub fn error(&self, message: &str) {
        self.write(AuditCategory::Error, message);
    }

    /// Records a successful operation.
    pub fn success(&self, message: &str) {
        self.write(AuditCategory::Success, message);
    }

    /// Records general information.
    pub fn info(&self, message: &str) {
        self.write(AuditCategory::Info, message);
    }

    /// Last `n` lines of the audit trail, oldest first.
    ///
    /// Missing or unreadable files yield an empty string; the audit trail
    /// is advisory and its absence is not an error.
    pub fn last_lines(&self, n: usize) -> String {
        let Ok(file) = std::fs::File::open(&self.path) else {
            return String::new();
        };
        let mut tail: std::collections::VecDeque<String> =
            std::collections::VecDeque::with_capacity(n);
        for line in BufReader::new(file).lines().map_while(Result::ok) {
            tail.push_back(line);
            if tail.len() > n {
                tail.pop_front();
            }
        }
        let mut result = String::new();
        for line in tail {
            result.push_str(&line);
            result.push('\n');
        }
        result
    }

    fn write(&self, category: AuditCategory, message: &str) {
        let now = OffsetDateTime::now_utc();
        let timestamp = now
            .format(TIMESTAMP_FORMAT)
            .unwrap_or_else(|_| now.unix_timestamp().to_string());
        let entry = format!("[{timestamp}] {} {message}\n", category.tag());
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| file.write_all(entry.as_bytes()));
        if let Err(error) = result {
            warn!(
                target: AUDIT_TARGET,
                path = %self.path.display(),
                %error,
                "failed to append audit entry"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};

    use super::*;

    #[fixture]
    fn audit() -> (tempfile::TempDir, AuditLog) {
        let dir = tempfile::tempdir().expect("temp dir");
        let layout = DataLayout::rooted_at(dir.path());
        layout.prepare().expect("prepare layout");
        (dir, AuditLog::new(&layout))
    }

    #[rstest]
    fn entries_carry_category_tags(audit: (tempfile::TempDir, AuditLog)) {
        let (_dir, audit) = audit;
        audit.command("state:");
        audit.state_transition("IDLE", "STARTING");
        audit.error("spawn failed");
        let tail = audit.last_lines(10);
        assert!(tail.contains("[CMD] Command received: state:"));
        assert!(tail.contains("[STATE] IDLE -> STARTING"));
        assert!(tail.contains("[ERROR] spawn failed"));
    }

    #[rstest]
    fn last_lines_keeps_only_the_tail(audit: (tempfile::TempDir, AuditLog)) {
        let (_dir, audit) = audit;
        for index in 0..10 {
            audit.info(&format!("entry {index}"));
        }
        let tail = audit.last_lines(3);
        assert_eq!(tail.lines().count(), 3);
        assert!(tail.contains("entry 7"));
        assert!(tail.contains("entry 9"));
        assert!(!tail.contains("entry 6"));
    }

    #[rstest]
    fn missing_file_yields_empty_tail(audit: (tempfile::TempDir, AuditLog)) {
        let (_dir, audit) = audit;
        assert_eq!(audit.last_lines(5), "");
    }
}
