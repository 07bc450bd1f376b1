//! Environment variable and config file support for [`RuntimeBuilder`](super::builder::RuntimeBuilder).
//!
//! # Configuration Precedence
//!
//! Settings are resolved in this order (highest priority first):
//!
//! 1. **Programmatic**: values set via builder methods (`max_steps(10_000)`)
//! 2. **Environment variables**: values from `OXCO_*` env vars
//! 3. **Config file**: values loaded from a TOML file (requires `config-file` feature)
//! 4. **Defaults**: built-in defaults from [`RuntimeConfig::default()`]
//!
//! # Supported Environment Variables
//!
//! | Variable | Type | Maps to |
//! |----------|------|---------|
//! | `OXCO_CLOCK` | `virtual` / `realtime` | `clock` |
//! | `OXCO_MAX_STEPS` | `u64` (0 = unbounded) | `max_steps` |
//! | `OXCO_NAME` | `String` | `name` |

use crate::error::ConfigError;
use crate::runtime::config::{ClockMode, RuntimeConfig};

/// Environment variable name for the clock mode.
pub const ENV_CLOCK: &str = "OXCO_CLOCK";
/// Environment variable name for the executor step limit.
pub const ENV_MAX_STEPS: &str = "OXCO_MAX_STEPS";
/// Environment variable name for the run label.
pub const ENV_NAME: &str = "OXCO_NAME";

/// Apply environment variable overrides to a [`RuntimeConfig`].
///
/// Only variables that are set in the environment are applied.
/// Returns an error if a variable is set but contains an unparseable value.
pub fn apply_env_overrides(config: &mut RuntimeConfig) -> Result<(), ConfigError> {
    if let Some(val) = read_env(ENV_CLOCK) {
        config.clock = parse_clock(ENV_CLOCK, &val)?;
    }
    if let Some(val) = read_env(ENV_MAX_STEPS) {
        let steps = parse_u64(ENV_MAX_STEPS, &val)?;
        config.max_steps = (steps > 0).then_some(steps);
    }
    if let Some(val) = read_env(ENV_NAME) {
        config.name = val;
    }
    Ok(())
}

/// Read an environment variable, returning `None` if unset.
fn read_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn parse_u64(var: &'static str, val: &str) -> Result<u64, ConfigError> {
    val.trim()
        .parse::<u64>()
        .map_err(|e| ConfigError::InvalidEnv {
            var,
            detail: format!("expected unsigned integer, got {val:?} ({e})"),
        })
}

fn parse_clock(var: &'static str, val: &str) -> Result<ClockMode, ConfigError> {
    val.parse::<ClockMode>()
        .map_err(|detail| ConfigError::InvalidEnv { var, detail })
}

// =========================================================================
// TOML config file support (feature-gated)
// =========================================================================

/// TOML-deserializable runtime configuration.
///
/// ```toml
/// [executor]
/// clock = "virtual"
/// max_steps = 100000
/// name = "frame-loop"
/// ```
#[cfg(feature = "config-file")]
#[derive(serde::Deserialize, Default, Debug)]
pub struct RuntimeTomlConfig {
    /// Executor settings.
    #[serde(default)]
    pub executor: ExecutorToml,
}

/// Executor table of the TOML config.
#[cfg(feature = "config-file")]
#[derive(serde::Deserialize, Default, Debug)]
pub struct ExecutorToml {
    /// Clock mode (`"virtual"` or `"realtime"`).
    pub clock: Option<String>,
    /// Step limit (0 = unbounded).
    pub max_steps: Option<u64>,
    /// Run label.
    pub name: Option<String>,
}

/// Apply a parsed TOML config to a [`RuntimeConfig`].
///
/// Only fields that are `Some` in the TOML struct override the config.
#[cfg(feature = "config-file")]
pub fn apply_toml_config(
    config: &mut RuntimeConfig,
    toml: &RuntimeTomlConfig,
) -> Result<(), ConfigError> {
    if let Some(ref v) = toml.executor.clock {
        config.clock = v.parse::<ClockMode>().map_err(ConfigError::Parse)?;
    }
    if let Some(v) = toml.executor.max_steps {
        config.max_steps = (v > 0).then_some(v);
    }
    if let Some(ref v) = toml.executor.name {
        config.name.clone_from(v);
    }
    Ok(())
}

/// Parse a TOML string into a [`RuntimeTomlConfig`].
#[cfg(feature = "config-file")]
pub fn parse_toml_str(toml_str: &str) -> Result<RuntimeTomlConfig, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))
}

/// Read and parse a TOML file into a [`RuntimeTomlConfig`].
#[cfg(feature = "config-file")]
pub fn parse_toml_file(path: &std::path::Path) -> Result<RuntimeTomlConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_toml_str(&content)
}

// =========================================================================
// Tests
// =========================================================================
