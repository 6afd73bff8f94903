//! Strand - headless boids demo
//!
//! Runs a flocking simulation on the strand ECS and logs the state of the
//! flock once per simulated second.
//!
//! Usage: `strand [settings.toml]`

mod boids;
mod settings;

use std::path::PathBuf;

use anyhow::{Context, Result};
use strand_ecs::App;
use tracing::{info, warn};
use tracing_subscriber::FmtSubscriber;

use crate::boids::BoidsPlugin;
use crate::settings::BoidsSettings;

fn main() -> Result<()> {
    let path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .or_else(BoidsSettings::default_path);
    let loaded = match &path {
        Some(path) if path.exists() => Some(BoidsSettings::read(path)),
        _ => None,
    };
    let settings = match &loaded {
        Some(Ok(settings)) => settings.clone(),
        _ => BoidsSettings::default(),
    };

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(settings.level())
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set subscriber")?;

    match (&path, &loaded) {
        (Some(path), Some(Ok(_))) => info!("Loaded settings from {:?}", path),
        (Some(path), Some(Err(e))) => {
            warn!("Failed to load settings from {:?}: {}, using defaults", path, e)
        }
        _ => info!("No settings file found, using defaults"),
    }

    info!(
        num_boids = settings.boids.num_boids,
        num_entities = settings.app.num_entities,
        "Starting strand boids demo..."
    );

    let mut app = App::with_config(settings.app.clone());
    app.add_plugin(BoidsPlugin {
        params: settings.boids.clone(),
    });
    app.run_configured().context("Simulation failed")?;

    info!("Shutdown complete");
    Ok(())
}
