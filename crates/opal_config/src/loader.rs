//! Settings resolution from environment, file, and defaults.

use std::collections::HashMap;

use crate::error::ConfigError;
use crate::types::{FileConfig, Settings, DEFAULT_MAX_SIZE};

/// Name of the optional configuration file inside the cache directory.
const CONFIG_FILE: &str = "opal.toml";

/// Resolves settings from the process environment.
///
/// Environment variables override `<cache_dir>/opal.toml`, which
/// overrides the built-in defaults.
pub fn load_settings() -> Result<Settings, ConfigError> {
    let env: HashMap<String, String> = std::env::vars().collect();
    load_settings_from(&env)
}

/// Resolves settings from an explicit environment map.
///
/// Split out from [`load_settings`] so tests can supply an environment
/// without mutating process globals.
pub fn load_settings_from(env: &HashMap<String, String>) -> Result<Settings, ConfigError> {
    let cache_dir = match env.get("OPAL_DIR") {
        Some(dir) if !dir.is_empty() => opal_util::canonicalize_path(dir),
        _ => default_cache_dir(env)?,
    };

    let file = load_file_config(&cache_dir)?;

    let max_size = match env.get("OPAL_MAX_SIZE") {
        Some(v) => parse_size_setting("OPAL_MAX_SIZE", v)?,
        None => match &file.max_size {
            Some(v) => parse_size_setting("max_size", v)?,
            None => DEFAULT_MAX_SIZE,
        },
    };

    let direct_mode = match env.get("OPAL_DIRECT_MODE") {
        Some(v) => env_flag(v),
        None => file.direct_mode.unwrap_or(false),
    };
    let hard_links = match env.get("OPAL_HARD_LINKS") {
        Some(v) => env_flag(v),
        None => file.hard_links.unwrap_or(false),
    };
    let log_file = env
        .get("OPAL_LOG_FILE")
        .filter(|v| !v.is_empty())
        .cloned()
        .or(file.log_file);
    let debug_level = env
        .get("OPAL_DEBUG")
        .filter(|v| !v.is_empty())
        .cloned()
        .or(file.debug_level)
        .unwrap_or_else(|| "info".to_string());

    Ok(Settings {
        cache_dir,
        max_size,
        disabled: env.get("OPAL_DISABLE").map(|v| env_flag(v)).unwrap_or(false),
        direct_mode,
        hard_links,
        log_file,
        debug_level,
    })
}

/// Parses a byte size with an optional `K`/`M`/`G`/`T` suffix
/// (case-insensitive, powers of 1024).
pub fn parse_size(value: &str) -> Option<u64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    let (digits, multiplier) = match value.chars().last() {
        Some(c) if c.is_ascii_digit() => (value, 1u64),
        Some('k') | Some('K') => (&value[..value.len() - 1], 1u64 << 10),
        Some('m') | Some('M') => (&value[..value.len() - 1], 1u64 << 20),
        Some('g') | Some('G') => (&value[..value.len() - 1], 1u64 << 30),
        Some('t') | Some('T') => (&value[..value.len() - 1], 1u64 << 40),
        _ => return None,
    };
    let number: u64 = digits.trim().parse().ok()?;
    number.checked_mul(multiplier)
}

fn parse_size_setting(name: &str, value: &str) -> Result<u64, ConfigError> {
    parse_size(value).ok_or_else(|| ConfigError::InvalidValue {
        name: name.to_string(),
        value: value.to_string(),
        reason: "expected a byte count with an optional K/M/G/T suffix".to_string(),
    })
}

/// Boolean environment convention: set and non-empty means true, except
/// for the explicit negatives `"0"` and `"false"`.
fn env_flag(value: &str) -> bool {
    !value.is_empty() && value != "0" && !value.eq_ignore_ascii_case("false")
}

fn default_cache_dir(env: &HashMap<String, String>) -> Result<String, ConfigError> {
    let home_var = if cfg!(windows) { "USERPROFILE" } else { "HOME" };
    let home = env
        .get(home_var)
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::NoCacheDir)?;
    Ok(opal_util::append_path(
        &opal_util::canonicalize_path(home),
        ".opal",
    ))
}

fn load_file_config(cache_dir: &str) -> Result<FileConfig, ConfigError> {
    let path = opal_util::append_path(cache_dir, CONFIG_FILE);
    if !opal_util::file_exists(&path) {
        return Ok(FileConfig::default());
    }
    let content = std::fs::read_to_string(&path)?;
    parse_file_config(&content)
}

/// Parses the configuration file contents.
///
/// Exposed for testing without filesystem dependencies.
pub fn parse_file_config(content: &str) -> Result<FileConfig, ConfigError> {
    toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
}
