//! Configuration for the lab runtime.
//!
//! The lab configuration controls deterministic execution:
//! - The virtual instant the clock starts at
//! - The maximum number of timer firings before forced termination

use crate::types::Time;

/// Configuration for the lab runtime.
#[derive(Debug, Clone)]
pub struct LabConfig {
    /// Virtual time at which the clock starts.
    pub start: Time,
    /// Maximum number of timer firings before forced termination.
    pub max_steps: Option<u64>,
}

impl LabConfig {
    /// Creates a lab configuration starting at time zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            start: Time::ZERO,
            max_steps: Some(1_000_000),
        }
    }

    /// Sets the virtual start time.
    #[must_use]
    pub const fn start_at(mut self, start: Time) -> Self {
        self.start = start;
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
}

impl Default for LabConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = LabConfig::default();
        assert_eq!(config.start, Time::ZERO);
        assert_eq!(config.max_steps, Some(1_000_000));
    }

    #[test]
    fn builder_overrides() {
        let config = LabConfig::new()
            .start_at(Time::from_secs(3))
            .max_steps(10);
        assert_eq!(config.start, Time::from_secs(3));
        assert_eq!(config.max_steps, Some(10));
        assert_eq!(config.no_step_limit().max_steps, None);
    }
}
