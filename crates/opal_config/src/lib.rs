//! Configuration for the Opal compiler cache.
//!
//! Settings are resolved from three layers, highest precedence first:
//! `OPAL_*` environment variables, an optional `opal.toml` file in the
//! cache directory, and built-in defaults.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_settings, load_settings_from, parse_size};
pub use types::Settings;
