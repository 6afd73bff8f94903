//! Strand Core - Clock and configuration types for the strand runtime
//!
//! This crate provides the pieces shared by the runtime and its hosts:
//! - Frame clock ([`Time`]) updated from the wall clock or by explicit deltas
//! - Per-system fixed-timestep accumulators ([`FixedTimestep`])
//! - Run configuration ([`AppConfig`])

pub mod config;
pub mod time;

pub use config::{AppConfig, ConfigError};
pub use time::{FixedTimestep, Time, TimeError};
