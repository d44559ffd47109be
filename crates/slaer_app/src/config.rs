//! Demo configuration from the environment.

use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use glam::Vec2;
use serde_json::Value;

use slaer_runtime::Settings;

use crate::demo::SceneConfig;

/// Frames per second requested from the frame host.
pub const FRAME_RATE_ENV: &str = "SLAER_FRAME_RATE";
/// Seconds to run before stopping.
pub const RUN_SECONDS_ENV: &str = "SLAER_RUN_SECONDS";
/// Number of particles.
pub const PARTICLES_ENV: &str = "SLAER_PARTICLES";
/// Runtime settings as a JSON object, e.g. `{"autorun": false}`.
pub const SETTINGS_ENV: &str = "SLAER_SETTINGS";
/// Surface resolution, e.g. `2` or `0.5`.
pub const RESOLUTION_ENV: &str = "SLAER_RESOLUTION";

/// Everything the demo binary needs to start.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub frame_rate: f64,
    pub run_for: Duration,
    pub viewport: [u32; 2],
    pub resolution: Option<Value>,
    pub settings: Settings,
    pub scene: SceneConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            frame_rate: 60.0,
            run_for: Duration::from_secs(3),
            viewport: [800, 600],
            resolution: None,
            settings: Settings::default(),
            scene: SceneConfig::default(),
        }
    }
}

impl AppConfig {
    /// Read the configuration from `SLAER_*` environment variables, falling
    /// back to [`AppConfig::default`] for anything unset.
    ///
    /// # Errors
    ///
    /// Fails if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(rate) = parse(&lookup, FRAME_RATE_ENV)? {
            anyhow::ensure!(rate > 0.0, "{FRAME_RATE_ENV} must be positive");
            config.frame_rate = rate;
        }
        if let Some(seconds) = parse::<f64>(&lookup, RUN_SECONDS_ENV)? {
            config.run_for = Duration::try_from_secs_f64(seconds)
                .with_context(|| format!("invalid {RUN_SECONDS_ENV}"))?;
        }
        if let Some(particles) = parse(&lookup, PARTICLES_ENV)? {
            config.scene.particles = particles;
        }
        if let Some(source) = lookup(SETTINGS_ENV) {
            config.settings = Settings::from_json_str(&source)
                .with_context(|| format!("invalid {SETTINGS_ENV}"))?;
        }
        config.resolution = lookup(RESOLUTION_ENV).map(Value::String);
        config.scene.bounds = Vec2::new(config.viewport[0] as f32, config.viewport[1] as f32);
        Ok(config)
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(name)
        .map(|raw| {
            raw.trim()
                .parse()
                .with_context(|| format!("invalid {name}: {raw:?}"))
        })
        .transpose()
}
