//! Error types for configuration loading and validation.

/// Errors that can occur when loading or validating Opal settings.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An I/O error occurred while reading the configuration file.
    #[error("failed to read configuration: {0}")]
    IoError(#[from] std::io::Error),

    /// The TOML content could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    /// A configuration value is not acceptable.
    #[error("invalid value '{value}' for {name}: {reason}")]
    InvalidValue {
        /// The setting name (env var or TOML key).
        name: String,
        /// The offending value.
        value: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// The cache directory could not be determined.
    #[error("cannot determine a cache directory: set OPAL_DIR")]
    NoCacheDir,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_value_display() {
        let err = ConfigError::InvalidValue {
            name: "OPAL_MAX_SIZE".to_string(),
            value: "5X".to_string(),
            reason: "unknown size suffix".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("OPAL_MAX_SIZE"));
        assert!(msg.contains("5X"));
        assert!(msg.contains("unknown size suffix"));
    }

    #[test]
    fn parse_error_display() {
        let err = ConfigError::ParseError("expected '=' at line 2".to_string());
        assert!(err.to_string().starts_with("failed to parse configuration"));
    }

    #[test]
    fn no_cache_dir_display() {
        assert!(ConfigError::NoCacheDir.to_string().contains("OPAL_DIR"));
    }
}
