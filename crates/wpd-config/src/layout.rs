//! On-disk layout for configurations, session logs, and the proxy binary.
//!
//! Everything the daemon persists lives under a single base directory,
//! `~/.argus` by default. The daemon and client both derive paths from this
//! layout so lifecycle commands agree on where artefacts are written.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Directory name under the user's home that roots all daemon data.
const BASE_DIR_NAME: &str = ".argus";

/// Subdirectory holding WireGuard configuration files.
const CONFIGS_DIR_NAME: &str = "wireproxy_confs";

/// Subdirectory holding per-session and audit logs.
const LOGS_DIR_NAME: &str = "wp-server-logs";

/// Subdirectory holding the supervised binary.
const INSTALL_DIR_NAME: &str = "wireproxy";

/// Errors surfaced while resolving or preparing the data layout.
#[derive(Debug, Error)]
pub enum LayoutError {
    /// The user's home directory could not be determined.
    #[error("could not determine a home directory for the data layout")]
    MissingHome,
    /// A layout directory could not be created.
    #[error("failed to create directory '{path}': {source}")]
    CreateDirectory {
        /// Directory that could not be created.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Canonical paths for daemon data, rooted at a single base directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLayout {
    base_dir: PathBuf,
}

impl DataLayout {
    /// Derives the layout from the user's home directory.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::MissingHome`] when no home directory can be
    /// resolved for the current user.
    pub fn discover() -> Result<Self, LayoutError> {
        let home = dirs::home_dir().ok_or(LayoutError::MissingHome)?;
        Ok(Self::rooted_at(home.join(BASE_DIR_NAME)))
    }

    /// Builds a layout rooted at an explicit base directory.
    ///
    /// Used by tests and by deployments that relocate the data directory.
    #[must_use]
    pub fn rooted_at(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Creates every layout directory that does not yet exist.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::CreateDirectory`] naming the first directory
    /// that could not be created.
    pub fn prepare(&self) -> Result<(), LayoutError> {
        for dir in [self.configs_dir(), self.logs_dir(), self.install_dir()] {
            std::fs::create_dir_all(&dir).map_err(|source| LayoutError::CreateDirectory {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// Base directory rooting all daemon data.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Directory holding WireGuard configuration files.
    #[must_use]
    pub fn configs_dir(&self) -> PathBuf {
        self.base_dir.join(CONFIGS_DIR_NAME)
    }

    /// Directory holding session and audit logs.
    #[must_use]
    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join(LOGS_DIR_NAME)
    }

    /// Directory holding the supervised binary.
    #[must_use]
    pub fn install_dir(&self) -> PathBuf {
        self.base_dir.join(INSTALL_DIR_NAME)
    }

    /// Full path to the supervised binary.
    #[must_use]
    pub fn binary_path(&self) -> PathBuf {
        self.install_dir().join("wireproxy")
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn derives_subdirectories_from_base() {
        let layout = DataLayout::rooted_at("/data/argus");
        assert_eq!(
            layout.configs_dir(),
            PathBuf::from("/data/argus/wireproxy_confs")
        );
        assert_eq!(layout.logs_dir(), PathBuf::from("/data/argus/wp-server-logs"));
        assert_eq!(
            layout.binary_path(),
            PathBuf::from("/data/argus/wireproxy/wireproxy")
        );
    }

    #[rstest]
    fn prepare_creates_missing_directories() {
        let dir = tempfile::tempdir().expect("temp dir");
        let layout = DataLayout::rooted_at(dir.path().join(".argus"));
        layout.prepare().expect("prepare layout");
        assert!(layout.configs_dir().is_dir());
        assert!(layout.logs_dir().is_dir());
        assert!(layout.install_dir().is_dir());
    }
}
