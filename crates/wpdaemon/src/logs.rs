//! Session log files with header/footer framing.
//!
//! Every supervised session gets its own log file named
//! `<unix-timestamp>_<config-stem>.log`. The file opens with a structured
//! header before the process spawns, captures the process's combined
//! stdout/stderr while it runs, and closes with a teardown footer recording
//! how the session ended. The open handle is shared with the spawned
//! process for redirection, and the watcher reads the same file back for
//! tailing.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::FormatItem;
use time::macros::format_description;
use tracing::info;

use wpd_config::DataLayout;

const LOGS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::logs");

const RULE: &str =
    "================================================================================";

const TIMESTAMP_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

/// Errors surfaced while creating or writing session logs.
#[derive(Debug, Error)]
pub enum SessionLogError {
    /// The log file could not be created.
    #[error("failed to create log file '{path}': {source}")]
    Create {
        /// Log file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Writing header or footer content failed.
    #[error("failed to write log file '{path}': {source}")]
    Write {
        /// Log file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// A redirection handle was requested while no log is open.
    #[error("no session log is currently open")]
    NotOpen,
}

/// Manages the lifecycle of per-session log files.
///
/// At most one log is open at a time, matching the single supervised
/// process slot. `finalize` is idempotent: the footer is written exactly
/// once per session, and the last session's path remains queryable after
/// the file closes.
#[derive(Debug)]
pub struct SessionLogs {
    logs_dir: PathBuf,
    current: Option<File>,
    current_path: Option<PathBuf>,
}

impl SessionLogs {
    /// Builds a manager writing into the layout's log directory.
    pub fn new(layout: &DataLayout) -> Self {
        Self {
            logs_dir: layout.logs_dir(),
            current: None,
            current_path: None,
        }
    }

    /// Creates a new session log and writes its header.
    ///
    /// Any previously open log is closed without a footer; callers finalize
    /// before starting a new session, so this is a safety net rather than a
    /// supported flow.
    ///
    /// # Errors
    ///
    /// Returns [`SessionLogError::Create`] or [`SessionLogError::Write`]
    /// when the filesystem refuses the new file.
    pub fn create(
        &mut self,
        config_name: &str,
        proxy_version: &str,
        config_path: &Path,
    ) -> Result<PathBuf, SessionLogError> {
        self.current = None;

        let now = OffsetDateTime::now_utc();
        let stem = config_name.strip_suffix(".conf").unwrap_or(config_name);
        let path = self
            .logs_dir
            .join(format!("{}_{stem}.log", now.unix_timestamp()));

        let mut file = File::create(&path).map_err(|source| SessionLogError::Create {
            path: path.clone(),
            source,
        })?;

        let header = format!(
            "{RULE}\nWireProxy Server Log\n{RULE}\n\
             Start Time: {start}\nUnix Timestamp: {unix}\n\
             Configuration: {config_name}\nWireProxy Version: {proxy_version}\n\
             Configuration File: {config_file}\n\nProcess Output:\n{RULE}\n",
            start = format_timestamp(now),
            unix = now.unix_timestamp(),
            config_file = config_path.display(),
        );
        write_all(&mut file, &path, header.as_bytes())?;

        info!(
            target: LOGS_TARGET,
            log = %path.display(),
            config = config_name,
            "session log created"
        );
        self.current = Some(file);
        self.current_path = Some(path.clone());
        Ok(path)
    }

    /// Duplicate of the open log handle, for child output redirection.
    ///
    /// # Errors
    ///
    /// Returns [`SessionLogError::NotOpen`] when no session is active.
    pub fn redirect_handle(&self) -> Result<File, SessionLogError> {
        let file = self.current.as_ref().ok_or(SessionLogError::NotOpen)?;
        file.try_clone().map_err(|source| SessionLogError::Write {
            path: self.current_path.clone().unwrap_or_default(),
            source,
        })
    }

    /// Writes the teardown footer and closes the log.
    ///
    /// A second call for the same session is a no-op, guaranteeing the
    /// footer appears exactly once however many paths observe the session's
    /// end.
    pub fn finalize(&mut self, shutdown_method: &str) {
        let Some(mut file) = self.current.take() else {
            return;
        };
        let now = OffsetDateTime::now_utc();
        let footer = format!(
            "\n{RULE}\nWireProxy Server Teardown\n{RULE}\n\
             Stop Time: {stop}\nUnix Timestamp: {unix}\n\
             Status: Initiating shutdown\nShutdown Method: {shutdown_method}\n\
             Final Status: Process terminated\n{RULE}\nEnd of log\n{RULE}\n",
            stop = format_timestamp(now),
            unix = now.unix_timestamp(),
        );
        let path = self.current_path.clone().unwrap_or_default();
        if let Err(error) = file.write_all(footer.as_bytes()) {
            info!(
                target: LOGS_TARGET,
                log = %path.display(),
                %error,
                "failed to write teardown footer"
            );
        }
        info!(
            target: LOGS_TARGET,
            log = %path.display(),
            method = shutdown_method,
            "session log finalized"
        );
    }

    /// Path of the current (or most recent) session log.
    pub fn current_path(&self) -> Option<&Path> {
        self.current_path.as_deref()
    }

    /// Whether a session log is open for writing.
    pub fn is_open(&self) -> bool {
        self.current.is_some()
    }
}

fn format_timestamp(moment: OffsetDateTime) -> String {
    moment
        .format(TIMESTAMP_FORMAT)
        .unwrap_or_else(|_| moment.unix_timestamp().to_string())
}

fn write_all(file: &mut File, path: &Path, bytes: &[u8]) -> Result<(), SessionLogError> {
    file.write_all(bytes).map_err(|source| SessionLogError::Write {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};

    use super::*;

    #[fixture]
    fn logs() -> (tempfile::TempDir, SessionLogs) {
        let dir = tempfile::tempdir().expect("temp dir");
        let layout = DataLayout::rooted_at(dir.path());
        layout.prepare().expect("prepare layout");
        (dir, SessionLogs::new(&layout))
    }

    #[rstest]
    fn create_writes_header_with_metadata(logs: (tempfile::TempDir, SessionLogs)) {
        let (_dir, mut logs) = logs;
        let path = logs
            .create("demo.conf", "v1.0.9", Path::new("/confs/demo.conf"))
            .expect("create log");
        let content = std::fs::read_to_string(&path).expect("read log");
        assert!(content.contains("WireProxy Server Log"));
        assert!(content.contains("Configuration: demo.conf"));
        assert!(content.contains("WireProxy Version: v1.0.9"));
        assert!(content.contains("Process Output:"));
        assert!(logs.is_open());
    }

    #[rstest]
    fn filename_strips_config_extension(logs: (tempfile::TempDir, SessionLogs)) {
        let (_dir, mut logs) = logs;
        let path = logs
            .create("us-east.conf", "v1", Path::new("/confs/us-east.conf"))
            .expect("create log");
        let name = path.file_name().and_then(|name| name.to_str()).expect("name");
        assert!(name.ends_with("_us-east.log"), "unexpected name {name}");
    }

    #[rstest]
    fn finalize_writes_footer_once(logs: (tempfile::TempDir, SessionLogs)) {
        let (_dir, mut logs) = logs;
        let path = logs
            .create("demo.conf", "v1", Path::new("/confs/demo.conf"))
            .expect("create log");
        logs.finalize("Graceful termination");
        logs.finalize("Force killed");
        let content = std::fs::read_to_string(&path).expect("read log");
        assert_eq!(content.matches("WireProxy Server Teardown").count(), 1);
        assert!(content.contains("Shutdown Method: Graceful termination"));
        assert!(!content.contains("Force killed"));
        assert!(!logs.is_open());
    }

    #[rstest]
    fn path_survives_finalize(logs: (tempfile::TempDir, SessionLogs)) {
        let (_dir, mut logs) = logs;
        let path = logs
            .create("demo.conf", "v1", Path::new("/confs/demo.conf"))
            .expect("create log");
        logs.finalize("Graceful termination");
        assert_eq!(logs.current_path(), Some(path.as_path()));
    }

    #[rstest]
    fn redirect_handle_requires_open_log(logs: (tempfile::TempDir, SessionLogs)) {
        let (_dir, logs) = logs;
        assert!(matches!(
            logs.redirect_handle(),
            Err(SessionLogError::NotOpen)
        ));
    }

    #[rstest]
    fn redirected_writes_land_in_the_log(logs: (tempfile::TempDir, SessionLogs)) {
        let (_dir, mut logs) = logs;
        let path = logs
            .create("demo.conf", "v1", Path::new("/confs/demo.conf"))
            .expect("create log");
        let mut handle = logs.redirect_handle().expect("handle");
        handle.write_all(b"proxy output line\n").expect("write");
        let content = std::fs::read_to_string(&path).expect("read log");
        assert!(content.contains("proxy output line"));
    }
}
