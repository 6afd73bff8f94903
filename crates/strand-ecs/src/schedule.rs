use std::time::Duration;

use strand_core::FixedTimestep;
use tracing::{debug, info, trace};

use crate::error::EcsResult;
use crate::system::System;
use crate::world::World;

/// A fixed-timestep system and its own accumulator.
struct FixedSystem {
    system: Box<dyn System>,
    timestep: FixedTimestep,
}

/// Startup, per-frame and fixed-timestep systems, in insertion order within
/// each group.
///
/// Systems are added to a pending list and only bound against the world
/// when the schedule next prepares, so resources and pools added in between
/// are visible to their signatures.
#[derive(Default)]
pub struct Schedule {
    pending_startup: Vec<Box<dyn System>>,
    pending: Vec<(Box<dyn System>, Option<Duration>)>,
    startup: Vec<Box<dyn System>>,
    startup_ran: usize,
    systems: Vec<Box<dyn System>>,
    fixed: Vec<FixedSystem>,
}

impl Schedule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_startup_system(&mut self, system: Box<dyn System>) {
        self.pending_startup.push(system);
    }

    /// Add a system run every frame, or on a fixed timestep if one is given.
    pub fn add_system(&mut self, system: Box<dyn System>, time_step: Option<Duration>) {
        self.pending.push((system, time_step));
    }

    /// Bind pending startup systems and run every startup system that has
    /// not run yet, then bind pending frame and fixed systems.
    ///
    /// Each pending group is bound as a whole: if any system in it fails to
    /// bind, the group stays pending and nothing from it is registered.
    pub fn prepare(&mut self, world: &World) -> EcsResult<()> {
        let mut startup = std::mem::take(&mut self.pending_startup);
        if let Err(e) = startup.iter_mut().try_for_each(|system| system.initialize(world)) {
            self.pending_startup = startup;
            return Err(e);
        }
        for system in startup {
            debug!(system = system.name(), "Registered startup system");
            self.startup.push(system);
        }

        if self.startup_ran < self.startup.len() {
            info!(count = self.startup.len() - self.startup_ran, "Running startup systems");
        }
        for system in &mut self.startup[self.startup_ran..] {
            run_system(system.as_mut(), world)?;
            self.startup_ran += 1;
        }

        let mut pending = std::mem::take(&mut self.pending);
        let bound: EcsResult<Vec<Option<FixedTimestep>>> = pending
            .iter_mut()
            .map(|(system, time_step)| -> EcsResult<Option<FixedTimestep>> {
                system.initialize(world)?;
                Ok((*time_step).map(FixedTimestep::new).transpose()?)
            })
            .collect();
        let timesteps = match bound {
            Ok(timesteps) => timesteps,
            Err(e) => {
                self.pending = pending;
                return Err(e);
            }
        };
        for ((system, time_step), timestep) in pending.into_iter().zip(timesteps) {
            match timestep {
                Some(timestep) => {
                    debug!(
                        system = system.name(),
                        step = ?time_step,
                        "Registered fixed-timestep system"
                    );
                    self.fixed.push(FixedSystem { system, timestep });
                }
                None => {
                    debug!(system = system.name(), "Registered system");
                    self.systems.push(system);
                }
            }
        }
        Ok(())
    }

    /// Run every per-frame system once, then every fixed-timestep system as
    /// many times as `delta` (plus its carried-over remainder) allows.
    pub fn run_frame(&mut self, world: &World, delta: Duration) -> EcsResult<()> {
        for system in &mut self.systems {
            run_system(system.as_mut(), world)?;
        }
        for fixed in &mut self.fixed {
            fixed.timestep.accumulate(delta);
            while fixed.timestep.consume() {
                run_system(fixed.system.as_mut(), world)?;
            }
        }
        Ok(())
    }

    /// Number of bound systems across all groups.
    pub fn len(&self) -> usize {
        self.startup.len() + self.systems.len() + self.fixed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Run one system invocation and flush the commands it issued.
fn run_system(system: &mut dyn System, world: &World) -> EcsResult<()> {
    trace!(system = system.name(), "Running system");
    system.run(world)?;
    world.flush_commands();
    Ok(())
}
