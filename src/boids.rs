//! Headless flocking simulation
//!
//! Every step, each boid steers away from boids that are too close, matches
//! the velocity of visible neighbours, moves towards their centre, and turns
//! back when it leaves the box. All interactions are computed over the
//! ordered pairs of boids at once.

use std::time::Duration;

use glam::Vec2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use strand_ecs::{
    component, App, Commands, Component, EcsResult, Field, Key, Plugin, Query, Res, Time,
    Transform2,
};
use tracing::info;

use crate::settings::BoidParams;

component! {
    pub struct Velocity {
        pub value: Field<Vec2>,
    }
}

component! {
    pub struct Separation {
        pub displacement_sum: Field<Vec2>,
    }
}

component! {
    pub struct Alignment {
        pub velocity_sum: Field<Vec2>,
        pub num_neighbors: Field<f32>,
    }
}

component! {
    pub struct Cohesion {
        pub translation_sum: Field<Vec2>,
        pub num_neighbors: Field<f32>,
    }
}

/// Seeded generator used for the initial flock
pub struct FlockRng(pub StdRng);

type Boid = (Transform2, Velocity, Separation, Alignment, Cohesion);

/// Adds the flock's pools, resources and systems
pub struct BoidsPlugin {
    pub params: BoidParams,
}

impl Plugin for BoidsPlugin {
    fn build(&self, app: &mut App) {
        let num = self.params.num_boids;
        let step = Duration::from_millis(self.params.time_step_ms);
        app.add_resource(self.params.clone())
            .add_resource(FlockRng(StdRng::seed_from_u64(self.params.seed)))
            .add_pool(Transform2::create_pool(num))
            .add_pool(Velocity::create_pool(num))
            .add_pool(Separation::create_pool(num))
            .add_pool(Alignment::create_pool(num))
            .add_pool(Cohesion::create_pool(num))
            .add_startup_system(spawn_boids)
            .add_system(calculate_separation, step)
            .add_system(calculate_alignment, step)
            .add_system(calculate_cohesion, step)
            .add_system(update_boid_velocity, step)
            .add_system(move_boids, step)
            .add_system(report_flock, Duration::from_secs(1));
    }
}

fn random_vec2(rng: &mut StdRng, scale: f32) -> Vec2 {
    (Vec2::new(rng.gen(), rng.gen()) - 0.5) * scale
}

/// Values at the positions where `mask` is set
fn select<T: Copy>(values: &[T], mask: &[bool]) -> Vec<T> {
    values
        .iter()
        .zip(mask)
        .filter_map(|(&value, &keep)| keep.then_some(value))
        .collect()
}

fn spawn_boids(
    params: Res<BoidParams>,
    mut rng: Res<FlockRng>,
    commands: Commands,
) -> EcsResult<()> {
    let (transform, velocity, ..) = commands.spawn::<Boid>(params.num_boids)?;
    let translations: Vec<Vec2> = (0..params.num_boids)
        .map(|_| random_vec2(&mut rng.0, params.box_size))
        .collect();
    let velocities: Vec<Vec2> = (0..params.num_boids)
        .map(|_| random_vec2(&mut rng.0, params.max_speed))
        .collect();
    transform.translation.fill(&translations)?;
    velocity.value.fill(&velocities)?;
    info!(num_boids = params.num_boids, "Spawned flock");
    Ok(())
}

fn calculate_separation(
    params: Res<BoidParams>,
    query: Query<(Transform2, Separation)>,
) -> EcsResult<()> {
    let (_, separation) = query.result();
    separation.displacement_sum.fill(Vec2::ZERO)?;

    let ((transform1, separation), (transform2, _)) = query.product_2();
    let displacement = transform1
        .translation
        .zip_map(&transform2.translation, |a, b| a - b)?;
    let too_close: Vec<bool> = displacement
        .iter()
        .map(|d| d.length() < params.separation_radius)
        .collect();

    let separation = separation.index(&Key::Mask(too_close.clone()))?;
    separation
        .displacement_sum
        .add_assign(&select(&displacement, &too_close))
}

/// Pairs further apart than the separation radius but still visible
fn neighbours(
    params: &BoidParams,
    transform1: &Transform2,
    transform2: &Transform2,
) -> EcsResult<Key> {
    let distance = transform1
        .translation
        .zip_map(&transform2.translation, |a, b| a.distance(b))?;
    Ok(Key::Mask(
        distance
            .into_iter()
            .map(|d| d > params.separation_radius && d < params.visible_radius)
            .collect(),
    ))
}

fn calculate_alignment(
    params: Res<BoidParams>,
    query: Query<(Transform2, Velocity, Alignment)>,
) -> EcsResult<()> {
    let (_, _, alignment) = query.result();
    alignment.velocity_sum.fill(Vec2::ZERO)?;
    alignment.num_neighbors.fill(0.0_f32)?;

    let ((transform1, _, alignment), (transform2, velocity2, _)) = query.product_2();
    let visible = neighbours(&params, &transform1, &transform2)?;
    let alignment = alignment.index(&visible)?;
    let velocity2 = velocity2.index(&visible)?;
    alignment.velocity_sum.add_assign(&velocity2.value)?;
    alignment.num_neighbors.add_assign(1.0_f32)
}

fn calculate_cohesion(
    params: Res<BoidParams>,
    query: Query<(Transform2, Cohesion)>,
) -> EcsResult<()> {
    let (_, cohesion) = query.result();
    cohesion.translation_sum.fill(Vec2::ZERO)?;
    cohesion.num_neighbors.fill(0.0_f32)?;

    let ((transform1, cohesion), (transform2, _)) = query.product_2();
    let visible = neighbours(&params, &transform1, &transform2)?;
    let cohesion = cohesion.index(&visible)?;
    let transform2 = transform2.index(&visible)?;
    cohesion.translation_sum.add_assign(&transform2.translation)?;
    cohesion.num_neighbors.add_assign(1.0_f32)
}

/// `(sum / count - current) * coefficient` for every row
fn steer(sums: Vec<Vec2>, counts: Vec<f32>, current: Vec<Vec2>, coefficient: f32) -> Vec<Vec2> {
    sums.into_iter()
        .zip(counts)
        .zip(current)
        .map(|((sum, count), current)| (sum / count - current) * coefficient)
        .collect()
}

fn update_boid_velocity(
    params: Res<BoidParams>,
    query: Query<(Transform2, Separation, Alignment, Cohesion, Velocity)>,
) -> EcsResult<()> {
    let (transform, separation, alignment, cohesion, velocity) = query.result();

    let aligning = Key::Mask(alignment.num_neighbors.mask(|&n| n > 0.0));
    let alignment = alignment.index(&aligning)?;
    let aligned = velocity.index(&aligning)?;
    aligned.value.add_assign(&steer(
        alignment.velocity_sum.to_vec(),
        alignment.num_neighbors.to_vec(),
        aligned.value.to_vec(),
        params.alignment_coefficient,
    ))?;

    let gathering = Key::Mask(cohesion.num_neighbors.mask(|&n| n > 0.0));
    let cohesion = cohesion.index(&gathering)?;
    velocity.index(&gathering)?.value.add_assign(&steer(
        cohesion.translation_sum.to_vec(),
        cohesion.num_neighbors.to_vec(),
        transform.index(&gathering)?.translation.to_vec(),
        params.cohesion_coefficient,
    ))?;

    let half = params.box_size / 2.0;
    let push = params.box_bound_coefficient;
    let bounds = [
        (transform.translation.mask(|t| t.x < -half), Vec2::new(push, 0.0)),
        (transform.translation.mask(|t| t.x > half), Vec2::new(-push, 0.0)),
        (transform.translation.mask(|t| t.y < -half), Vec2::new(0.0, push)),
        (transform.translation.mask(|t| t.y > half), Vec2::new(0.0, -push)),
    ];
    for (outside, correction) in bounds {
        velocity.index(&Key::Mask(outside))?.value.add_assign(correction)?;
    }

    separation.displacement_sum.scale(params.separation_coefficient);
    velocity.value.add_assign(&separation.displacement_sum)?;
    velocity
        .value
        .clamp_length(params.min_speed, params.max_speed);
    Ok(())
}

fn move_boids(params: Res<BoidParams>, query: Query<(Transform2, Velocity)>) -> EcsResult<()> {
    let (transform, velocity) = query.result();
    let dt = Duration::from_millis(params.time_step_ms).as_secs_f32();
    let velocities = velocity.value.to_vec();
    let steps: Vec<Vec2> = velocities.iter().map(|&v| v * dt).collect();
    let headings: Vec<f32> = velocities.iter().map(|v| (-v.x).atan2(v.y)).collect();
    transform.translation.add_assign(&steps)?;
    transform.rotation.fill(&headings)
}

fn report_flock(time: Res<Time>, query: Query<(Transform2, Velocity)>) {
    if query.is_empty() {
        return;
    }
    let (transform, velocity) = query.result();
    let n = query.len() as f32;
    let centre = transform
        .translation
        .to_vec()
        .into_iter()
        .fold(Vec2::ZERO, |sum, t| sum + t)
        / n;
    let mean_speed = velocity.value.lengths().into_iter().sum::<f32>() / n;
    info!(
        elapsed = ?time.elapsed(),
        boids = query.len(),
        centre = ?centre,
        mean_speed,
        "Flock status"
    );
}
