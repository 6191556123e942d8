//! Error types for cache operations.

use std::path::PathBuf;

/// Errors that can occur during cache writes and maintenance.
///
/// Reads never produce these: lookup is fail-safe and reports corruption
/// as a miss. Write errors are logged by the orchestrator and never fail
/// the user's build.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// An I/O error occurred while reading or writing cache files.
    #[error("cache I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A serialization or deserialization error occurred.
    #[error("serialization error: {reason}")]
    Serialization {
        /// Description of the serialization failure.
        reason: String,
    },
}

impl From<opal_util::UtilError> for CacheError {
    fn from(err: opal_util::UtilError) -> Self {
        match err {
            opal_util::UtilError::Io { path, source, .. } => Self::Io {
                path: PathBuf::from(path),
                source,
            },
            other => Self::Serialization {
                reason: other.to_string(),
            },
        }
    }
}
