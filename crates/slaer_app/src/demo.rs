//! Bouncing particle scene.
//!
//! One `particle` template carries a position, a private bounds box, and an
//! inline frame counter. Each particle object adds its own velocity and
//! lifetime. `velocity` and `lifetime` are behaviours; when a lifetime runs
//! out the particle drops both and comes to rest.

use anyhow::Result;
use glam::Vec2;
use serde_json::json;
use tracing::{debug, info, warn};

use slaer_component::{ComponentValue, Components, Instance};
use slaer_runtime::{Behaviour, Runtime};

pub const PARTICLE: &str = "particle";
pub const POSITION: &str = "position";
pub const VELOCITY: &str = "velocity";
pub const LIFETIME: &str = "lifetime";
pub const BOUNDS: &str = "_bounds";
pub const FRAMES: &str = "_frames";
pub const COUNT_FRAMES: &str = "count_frames";

const GOLDEN_ANGLE: f32 = 2.399_963;

/// Scene parameters.
#[derive(Debug, Clone)]
pub struct SceneConfig {
    /// Number of particles to spawn.
    pub particles: usize,
    /// Initial speed in units per second.
    pub speed: f32,
    /// Lifetime of the first particle in seconds; later ones live longer.
    pub lifetime: f64,
    /// Size of the box particles bounce in.
    pub bounds: Vec2,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            particles: 16,
            speed: 120.0,
            lifetime: 1.5,
            bounds: Vec2::new(800.0, 600.0),
        }
    }
}

/// Moves `position` by the velocity held in `state`, reflecting off the
/// object's `_bounds` box.
#[derive(Debug, Default)]
pub struct Integrate;

impl Behaviour for Integrate {
    fn update(&self, object: &mut Instance, dt: f64, state: &mut ComponentValue) {
        let mut velocity: Vec2 = match state.to_typed() {
            Ok(velocity) => velocity,
            Err(err) => {
                warn!(object = %object.name, %err, "velocity is not a vector");
                return;
            }
        };
        let Some(Ok(mut position)) = object.get(POSITION).map(ComponentValue::to_typed::<Vec2>)
        else {
            return;
        };
        let bounds = object
            .get(BOUNDS)
            .and_then(|b| b.to_typed::<Vec2>().ok());

        position += velocity * dt as f32;
        if let Some(bounds) = bounds {
            reflect(&mut position, &mut velocity, bounds);
        }

        match (
            ComponentValue::from_serialize(&position),
            ComponentValue::from_serialize(&velocity),
        ) {
            (Ok(position), Ok(velocity)) => {
                object.set(POSITION, position);
                *state = velocity;
            }
            (Err(err), _) | (_, Err(err)) => {
                warn!(object = %object.name, %err, "failed to store particle state");
            }
        }
    }
}

/// Fold `position` back into `[0, bounds]`, flipping the velocity on each
/// axis that hit a wall.
fn reflect(position: &mut Vec2, velocity: &mut Vec2, bounds: Vec2) {
    for axis in 0..2 {
        if position[axis] < 0.0 {
            position[axis] = -position[axis];
            velocity[axis] = -velocity[axis];
        } else if position[axis] > bounds[axis] {
            position[axis] = 2.0 * bounds[axis] - position[axis];
            velocity[axis] = -velocity[axis];
        }
    }
}

/// Counts down `state`; at zero the object loses its velocity and lifetime.
fn expire(object: &mut Instance, dt: f64, state: &mut ComponentValue) {
    let remaining = state.as_data().and_then(|v| v.as_f64()).unwrap_or(0.0) - dt;
    if remaining <= 0.0 {
        object.remove(VELOCITY);
        object.remove(LIFETIME);
        debug!(object = %object.name, "particle expired");
    } else {
        *state = remaining.into();
    }
}

fn count_frames(components: &mut Components, _dt: f64) {
    let frames = components
        .get(FRAMES)
        .and_then(ComponentValue::as_data)
        .and_then(|v| v.as_u64())
        .unwrap_or(0);
    components.insert(FRAMES.to_string(), json!(frames + 1).into());
}

/// Register behaviours, the particle template, and the particles.
///
/// # Errors
///
/// Fails if any store rejects an instance.
pub fn setup(runtime: &Runtime, config: &SceneConfig) -> Result<()> {
    runtime.behaviour_with(VELOCITY, Integrate);
    runtime.behaviour(LIFETIME, expire);

    let mut components = Components::new();
    components.insert(
        POSITION.to_string(),
        ComponentValue::from_serialize(&(config.bounds * 0.5))?,
    );
    components.insert(BOUNDS.to_string(), ComponentValue::from_serialize(&config.bounds)?);
    components.insert(FRAMES.to_string(), json!(0).into());
    components.insert(COUNT_FRAMES.to_string(), ComponentValue::inline(count_frames));
    let template = runtime.entity(Some(PARTICLE), Some(components))?;

    // Overrides only fill keys the template lacks, so per-particle values
    // must not be on the template.
    for i in 0..config.particles {
        let direction = Vec2::from_angle(i as f32 * GOLDEN_ANGLE);
        let lifetime = config.lifetime * (1.0 + i as f64 / config.particles.max(1) as f64);
        let mut overrides = Components::new();
        overrides.insert(
            VELOCITY.to_string(),
            ComponentValue::from_serialize(&(direction * config.speed))?,
        );
        overrides.insert(LIFETIME.to_string(), lifetime.into());
        runtime.create(&template, Some(&format!("{PARTICLE}-{i}")), Some(overrides))?;
    }

    info!(particles = config.particles, "scene ready");
    Ok(())
}

/// Moving and resting particle counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SceneSummary {
    pub moving: usize,
    pub resting: usize,
}

/// Count particles that still have a velocity.
#[must_use]
pub fn summarize(runtime: &Runtime) -> SceneSummary {
    let mut summary = SceneSummary::default();
    for object in runtime.objects().values() {
        if object.lock().has(VELOCITY) {
            summary.moving += 1;
        } else {
            summary.resting += 1;
        }
    }
    summary
}
