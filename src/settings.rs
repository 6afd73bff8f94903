//! Demo settings with persistence
//!
//! Settings are read from the path given on the command line, or from
//! `~/.config/strand/boids.toml`

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strand_core::AppConfig;
use tracing::Level;

/// All demo settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BoidsSettings {
    /// Maximum log level (`error`, `warn`, `info`, `debug` or `trace`)
    pub log_level: String,
    pub app: AppConfig,
    pub boids: BoidParams,
}

impl Default for BoidsSettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            app: AppConfig {
                max_run_time_ms: Some(10_000),
                ..AppConfig::default()
            },
            boids: BoidParams::default(),
        }
    }
}

impl BoidsSettings {
    /// Get the default settings file path
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("strand").join("boids.toml"))
    }

    /// Read settings from `path`. Missing keys take their defaults.
    pub fn read(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Parsed log level, falling back to `INFO`
    pub fn level(&self) -> Level {
        self.log_level.parse().unwrap_or(Level::INFO)
    }
}

/// Flocking parameters, also inserted into the app as a resource
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BoidParams {
    pub num_boids: usize,
    pub min_speed: f32,
    pub max_speed: f32,
    /// Boids closer than this steer apart
    pub separation_radius: f32,
    /// Boids closer than this (but outside the separation radius) align and
    /// gather
    pub visible_radius: f32,
    pub separation_coefficient: f32,
    pub alignment_coefficient: f32,
    pub cohesion_coefficient: f32,
    /// Velocity change per step for boids outside the box
    pub box_bound_coefficient: f32,
    /// Side length of the box the flock is kept in, centred on the origin
    pub box_size: f32,
    /// Simulation step in milliseconds
    pub time_step_ms: u64,
    pub seed: u64,
}

impl Default for BoidParams {
    fn default() -> Self {
        Self {
            num_boids: 100,
            min_speed: 15.0,
            max_speed: 60.0,
            separation_radius: 6.0,
            visible_radius: 6.0,
            separation_coefficient: 0.1,
            alignment_coefficient: 0.005,
            cohesion_coefficient: 0.0005,
            box_bound_coefficient: 1.0,
            box_size: 250.0,
            time_step_ms: 16,
            seed: 55,
        }
    }
}
