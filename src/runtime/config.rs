//! Event loop configuration.
//!
//! # Defaults
//!
//! | Field | Default |
//! |-------|---------|
//! | `max_idle_wait` | 250 ms |
//! | `max_steps` | `None` (unlimited) |

use crate::error::{ConfigError, InvalidArgument};
use std::time::Duration;

/// Configuration for the wall-clock [`EventLoop`](super::EventLoop).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventLoopConfig {
    /// Longest single wait on the remote channel before re-checking timers.
    pub max_idle_wait: Duration,
    /// Maximum number of steps (fired timers plus delivered messages)
    /// before the loop stops.
    pub max_steps: Option<u64>,
}

impl EventLoopConfig {
    /// Creates the default configuration.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_idle_wait: Duration::from_millis(250),
            max_steps: None,
        }
    }

    /// Loads the default configuration with `TRIFUTURE_*` environment
    /// overrides applied.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable is set to an unparseable value
    /// or the resulting configuration is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::new();
        super::env_config::apply_env_overrides(&mut config)?;
        config.validate()?;
        Ok(config)
    }

    /// Sets the longest single idle wait.
    #[must_use]
    pub const fn max_idle_wait(mut self, wait: Duration) -> Self {
        self.max_idle_wait = wait;
        self
    }

    /// Sets the maximum number of steps.
    #[must_use]
    pub const fn max_steps(mut self, steps: u64) -> Self {
        self.max_steps = Some(steps);
        self
    }

    /// Disables the step limit.
    #[must_use]
    pub const fn no_step_limit(mut self) -> Self {
        self.max_steps = None;
        self
    }

    /// Checks the configuration for values the loop cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidArgument`] for a zero idle wait or a zero step limit.
    pub fn validate(&self) -> Result<(), InvalidArgument> {
        if self.max_idle_wait.is_zero() {
            return Err(InvalidArgument::new(
                "EventLoopConfig",
                0,
                "be a non-zero idle wait",
                self.max_idle_wait,
            ));
        }
        if self.max_steps == Some(0) {
            return Err(InvalidArgument::new(
                "EventLoopConfig",
                1,
                "be a positive step limit",
                0u64,
            ));
        }
        Ok(())
    }
}

impl Default for EventLoopConfig {
    fn default() -> Self {
        Self::new()
    }
}
