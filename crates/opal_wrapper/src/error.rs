//! Error types for program wrappers.
//!
//! None of these fail the user's build: the orchestrator reacts to every
//! wrapper error by running the real tool transparently and forwarding
//! its result unchanged.

/// Errors raised by wrapper operations.
#[derive(Debug, thiserror::Error)]
pub enum WrapperError {
    /// The command line could not be normalized (response-file cycle,
    /// malformed flags).
    #[error("cannot parse command line: {reason}")]
    Unparseable {
        /// Description of the parse failure.
        reason: String,
    },

    /// A legal invocation that this wrapper chooses not to cache.
    #[error("invocation is not cacheable: {reason}")]
    NonCacheable {
        /// Why the invocation was declined.
        reason: String,
    },

    /// A filesystem operation failed.
    #[error("{op} failed for {path}: {source}")]
    Io {
        /// The operation that failed.
        op: &'static str,
        /// The path involved.
        path: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The real tool exited non-zero while run on the wrapper's behalf
    /// (e.g. during preprocessing).
    #[error("tool failed with exit code {exit_code}")]
    ToolFailed {
        /// The tool's exit code.
        exit_code: i32,
        /// The tail of the tool's stderr, for the diagnostic log.
        stderr_tail: String,
    },

    /// The tool could not be spawned at all.
    #[error(transparent)]
    Sys(#[from] opal_sys::SysError),
}

impl From<opal_args::ArgsError> for WrapperError {
    fn from(err: opal_args::ArgsError) -> Self {
        Self::Unparseable {
            reason: err.to_string(),
        }
    }
}
