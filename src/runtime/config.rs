//! Runtime configuration types.
//!
//! These types hold the concrete values that drive one executor run. In most
//! cases you should use [`RuntimeBuilder`](super::builder::RuntimeBuilder) to
//! construct a runtime rather than creating a [`RuntimeConfig`] directly.
//!
//! # Defaults
//!
//! | Field | Default |
//! |-------|---------|
//! | `clock` | [`ClockMode::Virtual`] |
//! | `max_steps` | `None` (unbounded) |
//! | `name` | `"oxco"` |

use core::fmt;
use std::str::FromStr;

/// How the executor clock advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClockMode {
    /// Time only moves when the executor is idle and a timer is pending; the
    /// clock then jumps straight to the earliest deadline. Runs are fully
    /// deterministic.
    #[default]
    Virtual,
    /// Time tracks the monotonic wall clock; an idle executor sleeps until the
    /// earliest deadline.
    Realtime,
}

impl fmt::Display for ClockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Virtual => f.write_str("virtual"),
            Self::Realtime => f.write_str("realtime"),
        }
    }
}

impl FromStr for ClockMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "virtual" | "lab" => Ok(Self::Virtual),
            "realtime" | "real" | "wall" => Ok(Self::Realtime),
            other => Err(format!("expected virtual or realtime, got {other:?}")),
        }
    }
}

/// Runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Clock driving timers.
    pub clock: ClockMode,
    /// Maximum number of handles the executor resumes before giving up
    /// (`None` = unbounded).
    pub max_steps: Option<u64>,
    /// Label attached to the run span.
    pub name: String,
}

impl RuntimeConfig {
    /// Normalize configuration values to safe defaults.
    pub fn normalize(&mut self) {
        if self.name.trim().is_empty() {
            self.name = Self::DEFAULT_NAME.to_string();
        }
        if self.max_steps == Some(0) {
            self.max_steps = None;
        }
    }

    /// Default run label.
    pub const DEFAULT_NAME: &'static str = "oxco";
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            clock: ClockMode::Virtual,
            max_steps: None,
            name: Self::DEFAULT_NAME.to_string(),
        }
    }
}
