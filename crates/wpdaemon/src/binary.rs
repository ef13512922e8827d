//! Locator for the supervised `wireproxy` executable.
//!
//! Installation of the binary is handled out of band; the daemon only
//! reports what is on disk. The version probe is informational and never
//! gates a control decision.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use wpd_config::DataLayout;

const BINARY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::binary");

/// Handle on the supervised executable's install location.
#[derive(Debug, Clone)]
pub struct ProxyBinary {
    path: PathBuf,
}

impl ProxyBinary {
    /// Builds a locator for the layout's install location.
    pub fn new(layout: &DataLayout) -> Self {
        Self {
            path: layout.binary_path(),
        }
    }

    /// Locator for an explicit executable path.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the executable to supervise.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the executable is present on disk.
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Human-readable version string, captured from `wireproxy -v`.
    ///
    /// Failures collapse into a placeholder string: the version only ever
    /// decorates session-log headers.
    pub fn version(&self) -> String {
        if !self.exists() {
            return "Unknown (binary not found)".to_owned();
        }
        let output = match Command::new(&self.path).arg("-v").output() {
            Ok(output) => output,
            Err(error) => {
                debug!(
                    target: BINARY_TARGET,
                    binary = %self.path.display(),
                    %error,
                    "version probe failed to run"
                );
                return "Unknown (failed to run)".to_owned();
            }
        };
        let version = String::from_utf8_lossy(&output.stdout).trim().to_owned();
        if version.is_empty() {
            "Unknown (no version output)".to_owned()
        } else {
            version
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_binary_reports_placeholder_version() {
        let dir = tempfile::tempdir().expect("temp dir");
        let binary = ProxyBinary::new(&DataLayout::rooted_at(dir.path()));
        assert!(!binary.exists());
        assert_eq!(binary.version(), "Unknown (binary not found)");
    }

    #[cfg(unix)]
    #[test]
    fn version_probe_captures_trimmed_stdout() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("wireproxy");
        std::fs::write(&path, "#!/bin/sh\necho 'wireproxy v1.0.9'\n").expect("write stub");
        let mut permissions = std::fs::metadata(&path).expect("metadata").permissions();
        permissions.set_mode(0o755);
        std::fs::set_permissions(&path, permissions).expect("chmod");

        let binary = ProxyBinary::at(&path);
        assert!(binary.exists());
        assert_eq!(binary.version(), "wireproxy v1.0.9");
    }
}
