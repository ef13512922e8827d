//! Store of WireGuard configuration files available for supervision.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use wpd_config::DataLayout;

/// Extension every stored configuration carries.
const CONFIG_EXTENSION: &str = ".conf";

/// Errors surfaced while scanning the configuration directory.
#[derive(Debug, Error)]
pub enum ConfigStoreError {
    /// Reading the configuration directory failed.
    #[error("failed to read configuration directory '{path}': {source}")]
    ReadDirectory {
        /// Directory that failed to enumerate.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Read-only view over the configuration directory.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    configs_dir: PathBuf,
}

impl ConfigStore {
    /// Builds a store over the layout's configuration directory.
    pub fn new(layout: &DataLayout) -> Self {
        Self {
            configs_dir: layout.configs_dir(),
        }
    }

    /// Appends the `.conf` extension when the name lacks it.
    pub fn normalize(name: &str) -> String {
        if name.ends_with(CONFIG_EXTENSION) {
            name.to_owned()
        } else {
            format!("{name}{CONFIG_EXTENSION}")
        }
    }

    /// Whether a configuration with this (possibly unnormalized) name exists.
    pub fn exists(&self, name: &str) -> bool {
        self.resolve(name).is_file()
    }

    /// Full path of the named configuration.
    ///
    /// Does not check existence; callers validate with [`Self::exists`]
    /// first.
    pub fn resolve(&self, name: &str) -> PathBuf {
        self.configs_dir.join(Self::normalize(name))
    }

    /// Lexicographically sorted list of available configuration filenames.
    ///
    /// A missing directory yields an empty list rather than an error, so a
    /// fresh installation can answer `available_confs` before any
    /// configuration has been added.
    pub fn list(&self) -> Result<Vec<String>, ConfigStoreError> {
        if !self.configs_dir.is_dir() {
            return Ok(Vec::new());
        }
        let entries = std::fs::read_dir(&self.configs_dir).map_err(|source| {
            ConfigStoreError::ReadDirectory {
                path: self.configs_dir.clone(),
                source,
            }
        })?;
        let mut names: Vec<String> = entries
            .filter_map(Result::ok)
            .filter(|entry| entry.path().is_file())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| name.ends_with(CONFIG_EXTENSION))
            .collect();
        names.sort();
        Ok(names)
    }

    /// Directory the store scans.
    pub fn configs_dir(&self) -> &Path {
        &self.configs_dir
    }
}
