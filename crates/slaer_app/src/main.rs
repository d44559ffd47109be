//! # slaer_app: Demo host
//!
//! Embeds a slaer [`Runtime`] in a tokio process and runs a bouncing particle
//! scene for a fixed time.
//!
//! ## Startup Sequence
//!
//! 1. Read `SLAER_*` environment variables (see [`config`]).
//! 2. Build the runtime on a tokio-paced frame host.
//! 3. Create the main surface and the particle scene.
//! 4. Report load completion. With `autorun` set the frame loop starts;
//!    otherwise the scene is stepped manually at the configured rate.

mod config;
mod demo;
mod host;

use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use slaer_runtime::{FixedViewport, Runtime, SurfaceOptions};

use config::AppConfig;
use host::TokioFrameHost;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("slaer_app=info".parse()?)
                .add_directive("slaer_runtime=info".parse()?),
        )
        .init();

    info!("slaer demo starting");

    let config = AppConfig::from_env()?;
    let host = Arc::new(TokioFrameHost::new(config.frame_rate));
    let runtime = Runtime::builder()
        .with_settings(config.settings.clone())
        .with_frame_host(host.clone())
        .with_viewport(Arc::new(FixedViewport::new(config.viewport)))
        .build()?;

    let surface = runtime.surface(SurfaceOptions {
        name: Some("main".to_string()),
        resolution: config.resolution.clone(),
        background: Some("#000000".to_string()),
    })?;
    let [width, height] = surface.lock().size();
    info!(width, height, interval = ?host.interval(), "main surface ready");

    demo::setup(&runtime, &config.scene)?;

    if runtime.loaded() {
        tokio::time::sleep(config.run_for).await;
        runtime.stop();
    } else {
        let dt = 1.0 / config.frame_rate;
        let frames = (config.run_for.as_secs_f64() * config.frame_rate).ceil() as u64;
        info!(frames, dt, "autorun disabled, stepping manually");
        for _ in 0..frames {
            runtime.scheduler().tick(dt);
        }
    }

    let summary = demo::summarize(&runtime);
    info!(
        frames = runtime.scheduler().frames(),
        moving = summary.moving,
        resting = summary.resting,
        pending = host.pending_count(),
        "slaer demo shut down"
    );
    Ok(())
}
