//! Settings types.

use serde::Deserialize;

/// Default cache size budget: 5 GiB.
pub const DEFAULT_MAX_SIZE: u64 = 5 * 1024 * 1024 * 1024;

/// Fully resolved settings for one shim invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Root directory of the local cache store.
    pub cache_dir: String,

    /// Byte budget for the store; least-recently-used entries are evicted
    /// past this size.
    pub max_size: u64,

    /// When true the shim always runs the tool transparently and never
    /// touches the cache.
    pub disabled: bool,

    /// Use direct-mode lookup (declared inputs only, no preprocessing).
    pub direct_mode: bool,

    /// Permit hard-linking cache hits into place instead of copying.
    pub hard_links: bool,

    /// Path of the diagnostic log file, if any.
    pub log_file: Option<String>,

    /// Log level filter for the diagnostic log (e.g. `"info"`, `"debug"`).
    pub debug_level: String,
}

/// The subset of settings accepted from `<cache_dir>/opal.toml`.
///
/// Every field is optional; environment variables take precedence over
/// file values.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    /// Cache size budget, as a number of bytes or a string with a
    /// `K`/`M`/`G`/`T` suffix.
    pub max_size: Option<String>,

    /// Direct-mode lookup toggle.
    pub direct_mode: Option<bool>,

    /// Hard-link toggle.
    pub hard_links: Option<bool>,

    /// Diagnostic log file path.
    pub log_file: Option<String>,

    /// Log level filter.
    pub debug_level: Option<String>,
}
