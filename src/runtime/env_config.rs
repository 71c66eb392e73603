//! Environment variable and config file support for [`EventLoopConfig`].
//!
//! # Configuration Precedence
//!
//! Settings are resolved in this order (highest priority first):
//!
//! 1. **Programmatic**: values set via builder methods (`max_steps(10)`)
//! 2. **Environment variables**: values from `TRIFUTURE_*` env vars
//! 3. **Config file**: values loaded from a TOML file (requires `config-file` feature)
//! 4. **Defaults**: built-in defaults from [`EventLoopConfig::default()`]
//!
//! # Supported Environment Variables
//!
//! | Variable | Type | Maps to |
//! |----------|------|---------|
//! | `TRIFUTURE_MAX_IDLE_WAIT_MS` | `u64` | `max_idle_wait` |
//! | `TRIFUTURE_MAX_STEPS` | `u64` or `none` | `max_steps` |

use super::config::EventLoopConfig;
use crate::error::ConfigError;
use std::time::Duration;

/// Environment variable name for the longest idle wait, in milliseconds.
pub const ENV_MAX_IDLE_WAIT_MS: &str = "TRIFUTURE_MAX_IDLE_WAIT_MS";
/// Environment variable name for the step limit.
pub const ENV_MAX_STEPS: &str = "TRIFUTURE_MAX_STEPS";

/// Apply environment variable overrides to an [`EventLoopConfig`].
///
/// Only variables that are set in the environment are applied.
///
/// # Errors
///
/// Returns an error if a variable is set but contains an unparseable value.
pub fn apply_env_overrides(config: &mut EventLoopConfig) -> Result<(), ConfigError> {
    if let Some(val) = read_env(ENV_MAX_IDLE_WAIT_MS) {
        config.max_idle_wait = Duration::from_millis(parse_u64(ENV_MAX_IDLE_WAIT_MS, &val)?);
    }
    if let Some(val) = read_env(ENV_MAX_STEPS) {
        config.max_steps = parse_limit(ENV_MAX_STEPS, &val)?;
    }
    Ok(())
}

/// Read an environment variable, returning `None` if unset.
fn read_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn parse_u64(var: &'static str, val: &str) -> Result<u64, ConfigError> {
    val.trim().parse::<u64>().map_err(|_| ConfigError::InvalidEnv {
        var,
        expected: "unsigned integer",
        value: val.to_string(),
    })
}

fn parse_limit(var: &'static str, val: &str) -> Result<Option<u64>, ConfigError> {
    match val.trim().to_lowercase().as_str() {
        "none" | "unlimited" | "off" => Ok(None),
        _ => val
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv {
                var,
                expected: "unsigned integer or none",
                value: val.to_string(),
            }),
    }
}

// =========================================================================
// TOML config file support (feature-gated)
// =========================================================================

/// TOML-deserializable event loop configuration.
///
/// ```toml
/// [event_loop]
/// max_idle_wait_ms = 100
/// max_steps = 100000
/// ```
#[cfg(feature = "config-file")]
#[derive(serde::Deserialize, Default, Debug)]
pub struct EventLoopTomlConfig {
    /// Event loop settings.
    #[serde(default)]
    pub event_loop: EventLoopToml,
}

/// Event loop section of the TOML config.
#[cfg(feature = "config-file")]
#[derive(serde::Deserialize, Default, Debug)]
pub struct EventLoopToml {
    /// Longest single idle wait, in milliseconds.
    pub max_idle_wait_ms: Option<u64>,
    /// Maximum number of steps.
    pub max_steps: Option<u64>,
}

/// Apply a parsed TOML config to an [`EventLoopConfig`].
///
/// Only fields that are `Some` in the TOML struct override the config.
#[cfg(feature = "config-file")]
pub fn apply_toml_config(config: &mut EventLoopConfig, toml: &EventLoopTomlConfig) {
    if let Some(v) = toml.event_loop.max_idle_wait_ms {
        config.max_idle_wait = Duration::from_millis(v);
    }
    if let Some(v) = toml.event_loop.max_steps {
        config.max_steps = Some(v);
    }
}

/// Parse a TOML string into an [`EventLoopTomlConfig`].
///
/// # Errors
///
/// Returns [`ConfigError::File`] if the text is not valid TOML for this layout.
#[cfg(feature = "config-file")]
pub fn parse_toml_str(toml_str: &str) -> Result<EventLoopTomlConfig, ConfigError> {
    toml::from_str(toml_str)
        .map_err(|e| ConfigError::File(format!("failed to parse TOML config: {e}")))
}

/// Read and parse a TOML file into an [`EventLoopTomlConfig`].
///
/// # Errors
///
/// Returns [`ConfigError::File`] if the file cannot be read or parsed.
#[cfg(feature = "config-file")]
pub fn parse_toml_file(path: &std::path::Path) -> Result<EventLoopTomlConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        ConfigError::File(format!(
            "failed to read config file {}: {e}",
            path.display()
        ))
    })?;
    parse_toml_str(&content)
}

// =========================================================================
// Tests
// =========================================================================
