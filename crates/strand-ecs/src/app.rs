//! The app: a world plus a schedule, driven from the wall clock or by
//! explicit time steps.

use std::thread;
use std::time::{Duration, Instant};

use strand_core::{AppConfig, Time};
use tracing::info;

use crate::component::{Component, ComponentPool};
use crate::error::EcsResult;
use crate::registry::ComponentRegistry;
use crate::schedule::Schedule;
use crate::system::IntoSystem;
use crate::world::World;

/// A reusable bundle of pools, resources and systems.
pub trait Plugin {
    fn build(&self, app: &mut App);
}

/// Owns a [`World`] and the systems that run against it.
///
/// Every update runs, in order: startup systems that have not run yet, every
/// per-frame system once, then every fixed-timestep system as many times as
/// its accumulated time allows. Commands issued by a system are applied as
/// soon as it returns, so the next system sees its spawns and despawns.
pub struct App {
    world: World,
    schedule: Schedule,
    config: AppConfig,
}

impl App {
    pub fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    pub fn with_config(config: AppConfig) -> Self {
        Self {
            world: World::new(ComponentRegistry::new(), config.num_entities),
            schedule: Schedule::new(),
            config,
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn add_plugin(&mut self, plugin: impl Plugin) -> &mut Self {
        plugin.build(self);
        self
    }

    pub fn add_pool<C: Component>(&mut self, pool: ComponentPool<C>) -> &mut Self {
        self.world.add_pool(pool);
        self
    }

    pub fn add_resource<R: 'static + Send + Sync>(&mut self, resource: R) -> &mut Self {
        self.world.add_resource(resource);
        self
    }

    /// Add a system that runs once, before the first frame it is present for.
    pub fn add_startup_system<M>(&mut self, system: impl IntoSystem<M>) -> &mut Self {
        self.schedule
            .add_startup_system(Box::new(system.into_system()));
        self
    }

    /// Add a system that runs every frame, or every `time_step` of elapsed
    /// time if one is given.
    ///
    /// The system's signature is checked before the next update runs any
    /// frame systems.
    pub fn add_system<M>(
        &mut self,
        system: impl IntoSystem<M>,
        time_step: impl Into<Option<Duration>>,
    ) -> &mut Self {
        self.schedule
            .add_system(Box::new(system.into_system()), time_step.into());
        self
    }

    fn prepare(&mut self) -> EcsResult<()> {
        if !self.world.has_resource::<Time>() {
            self.world.add_resource(Time::new());
        }
        self.schedule.prepare(&self.world)
    }

    /// Run a single frame, advancing [`Time`] by the wall-clock time since
    /// the previous frame.
    pub fn update(&mut self) -> EcsResult<()> {
        self.prepare()?;
        let delta = {
            let mut time = self.world.resource::<Time>()?;
            time.update();
            time.delta()
        };
        self.schedule.run_frame(&self.world, delta)
    }

    /// Run a single frame, advancing [`Time`] by exactly `delta`.
    pub fn update_with_delta(&mut self, delta: Duration) -> EcsResult<()> {
        self.prepare()?;
        self.world.resource::<Time>()?.update_with_delta(delta);
        self.schedule.run_frame(&self.world, delta)
    }

    /// Run frames continuously, sleeping out whatever is left of
    /// `frame_time` after each one, until [`Time::elapsed`] reaches
    /// `max_run_time`. Without a limit, runs until a system fails.
    pub fn run(&mut self, frame_time: Duration, max_run_time: Option<Duration>) -> EcsResult<()> {
        info!(?frame_time, ?max_run_time, "Starting run loop");
        loop {
            let start = Instant::now();
            self.update()?;
            let elapsed = self.world.resource::<Time>()?.elapsed();
            if max_run_time.is_some_and(|max| elapsed >= max) {
                info!(?elapsed, "Run loop finished");
                return Ok(());
            }
            thread::sleep(frame_time.saturating_sub(start.elapsed()));
        }
    }

    /// [`App::run`] with the frame time and limit from the app's config.
    pub fn run_configured(&mut self) -> EcsResult<()> {
        self.run(self.config.frame_time(), self.config.max_run_time())
    }

    /// Run `num_steps` frames back to back, each advancing time by exactly
    /// `time_step`, without sleeping.
    pub fn run_steps(&mut self, num_steps: usize, time_step: Duration) -> EcsResult<()> {
        info!(num_steps, ?time_step, "Running simulated steps");
        for _ in 0..num_steps {
            self.update_with_delta(time_step)?;
        }
        Ok(())
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::EntityId;
    use crate::commands::Commands;
    use crate::error::{EcsError, EcsResult};
    use crate::field::Field;
    use crate::query::Query;
    use crate::resource::Res;
    use crate::slots::Key;

    crate::component! {
        struct Position {
            x: Field<f32>,
        }
    }

    #[derive(Default)]
    struct Ticks {
        frame: u32,
        fixed: u32,
    }

    fn counting_app() -> App {
        let mut app = App::new();
        app.add_resource(Ticks::default())
            .add_system(|mut ticks: Res<Ticks>| ticks.frame += 1, None)
            .add_system(
                |mut ticks: Res<Ticks>| ticks.fixed += 1,
                Duration::from_millis(2),
            );
        app
    }

    #[test]
    fn fixed_and_frame_systems_tick_deterministically() {
        let mut app = counting_app();
        app.update_with_delta(Duration::ZERO).unwrap();
        app.run_steps(2, Duration::from_millis(1)).unwrap();

        let ticks = app.world().resource::<Ticks>().unwrap();
        assert_eq!(ticks.frame, 3);
        assert_eq!(ticks.fixed, 1);
    }

    #[test]
    fn real_time_run_respects_max_run_time() {
        let mut app = counting_app();
        app.run(Duration::from_millis(1), Some(Duration::from_millis(2)))
            .unwrap();

        let ticks = app.world().resource::<Ticks>().unwrap();
        assert!((2..=3).contains(&ticks.frame), "ran {} frames", ticks.frame);
        assert_eq!(ticks.fixed, 1);
    }

    #[test]
    fn time_resource_tracks_steps() {
        let mut app = App::new();
        app.run_steps(4, Duration::from_millis(5)).unwrap();
        let time = app.world().resource::<Time>().unwrap();
        assert_eq!(time.elapsed(), Duration::from_millis(20));
        assert_eq!(time.frame_count(), 4);
    }

    #[test]
    fn despawned_ids_are_reused_across_systems() {
        let mut app = App::with_config(AppConfig {
            num_entities: 5,
            ..AppConfig::default()
        });
        app.add_pool(Position::create_pool(5))
            .add_startup_system(|commands: Commands| -> EcsResult<()> {
                let position = commands.spawn::<Position>(5)?;
                position.x.fill(&[0.0, 1.0, 2.0, 3.0, 4.0])
            })
            .add_system(
                |commands: Commands, query: Query<(EntityId, Position)>| -> EcsResult<()> {
                    let (entity, position) = query.result();
                    let doomed = entity.index(&Key::Mask(position.x.mask(|&x| x < 3.0)))?;
                    commands.despawn(&doomed);
                    Ok(())
                },
                None,
            );
        app.update_with_delta(Duration::ZERO).unwrap();
        let mut ids = app.world().view::<EntityId>().unwrap().ids();
        ids.sort_unstable();
        assert_eq!(ids, vec![3, 4]);

        let commands = Commands::new(app.world().clone());
        commands.spawn::<Position>(3).unwrap();
        app.world().flush_commands();
        let mut ids = app.world().view::<EntityId>().unwrap().ids();
        ids.sort_unstable();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn startup_spawns_are_visible_to_the_first_frame() {
        let mut app = App::new();
        app.add_resource(0usize)
            .add_pool(Position::create_pool(4))
            .add_startup_system(|commands: Commands| {
                commands.spawn::<Position>(4).unwrap();
            })
            .add_system(
                |query: Query<Position>, mut seen: Res<usize>| *seen = query.len(),
                None,
            );
        app.update_with_delta(Duration::ZERO).unwrap();
        assert_eq!(*app.world().resource::<usize>().unwrap(), 4);
    }

    #[test]
    fn bad_signature_stops_the_app_before_any_frame() {
        let mut app = counting_app();
        app.add_system(|_: Res<String>| {}, None);
        assert!(matches!(
            app.update_with_delta(Duration::ZERO),
            Err(EcsError::SystemSignature { .. })
        ));
        assert_eq!(app.world().resource::<Ticks>().unwrap().frame, 0);
    }

    struct CounterPlugin;

    impl Plugin for CounterPlugin {
        fn build(&self, app: &mut App) {
            app.add_resource(10u64)
                .add_system(|mut count: Res<u64>| *count += 1, None);
        }
    }

    #[test]
    fn plugins_add_systems_and_resources() {
        let mut app = App::new();
        app.add_plugin(CounterPlugin);
        app.run_steps(2, Duration::from_millis(16)).unwrap();
        assert_eq!(*app.world().resource::<u64>().unwrap(), 12);
    }
}
