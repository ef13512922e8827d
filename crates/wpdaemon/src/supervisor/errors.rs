//! Error types for process spawning.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced while launching the supervised process.
#[derive(Debug, Error)]
pub enum SpawnError {
    /// The executable is not present at the expected path.
    #[error("proxy binary not found at '{path}'")]
    MissingBinary {
        /// Expected binary location.
        path: PathBuf,
    },
    /// Duplicating the output sink handle for redirection failed.
    #[error("failed to duplicate log handle for redirection: {source}")]
    Redirect {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The OS-level spawn call failed.
    #[error("failed to spawn '{path}': {source}")]
    Spawn {
        /// Executable that failed to launch.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}
