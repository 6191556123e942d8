//! Error types for argument handling.

/// Errors that can occur while normalizing a command line.
///
/// Any of these makes the invocation non-cacheable; the shim degrades to
/// transparent execution.
#[derive(Debug, thiserror::Error)]
pub enum ArgsError {
    /// A response file includes itself, directly or transitively.
    #[error("response file cycle involving {path}")]
    ResponseCycle {
        /// The response file that closed the cycle.
        path: String,
    },

    /// A response file could not be read.
    #[error("failed to read response file {path}: {source}")]
    Io {
        /// The response file path.
        path: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A quoted token was never closed.
    #[error("unterminated quote in response file {path}")]
    UnterminatedQuote {
        /// The response file path.
        path: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_cycle_display() {
        let err = ArgsError::ResponseCycle {
            path: "resp.txt".to_string(),
        };
        assert_eq!(err.to_string(), "response file cycle involving resp.txt");
    }

    #[test]
    fn io_display() {
        let err = ArgsError::Io {
            path: "missing.rsp".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        assert!(err.to_string().contains("missing.rsp"));
    }
}
