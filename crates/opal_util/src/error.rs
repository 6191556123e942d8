//! Error types for filesystem utilities.

/// Errors from filesystem utility operations.
///
/// Predicate queries (`file_exists`, `dir_exists`) never produce these;
/// they treat underlying errors as "does not exist".
#[derive(Debug, thiserror::Error)]
pub enum UtilError {
    /// A filesystem operation failed.
    #[error("{op} failed for {path}: {source}")]
    Io {
        /// The operation that failed (e.g. `"write"`, `"rename"`).
        op: &'static str,
        /// The path the operation was applied to.
        path: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// An executable could not be located on the search path.
    #[error("could not find executable '{name}' on the search path")]
    ExecutableNotFound {
        /// The executable name that was searched for.
        name: String,
    },
}

impl UtilError {
    /// Convenience constructor for [`UtilError::Io`].
    pub fn io(op: &'static str, path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            op,
            path: path.into(),
            source,
        }
    }
}
