//! Deterministic lab runtime for testing.
//!
//! The lab runtime provides:
//!
//! - Virtual time (no wall-clock dependencies)
//! - Deterministic timer order (deadline, then scheduling order)
//! - A step limit so runaway timer chains terminate

pub mod config;
pub mod runtime;

pub use config::LabConfig;
pub use runtime::LabRuntime;
