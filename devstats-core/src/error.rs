//! Error types for devstats-core.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading the projects manifest.
///
/// Configuration resolution has no error type: malformed environment values
/// fall back to defaults.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The manifest file could not be read.
    #[error("failed to read manifest at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The manifest bytes are not a valid projects document.
    #[error("failed to parse manifest: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Same as [`ManifestError::Yaml`], with the file it came from.
    #[error("failed to parse manifest at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}
