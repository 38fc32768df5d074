//! Obscura demo: wire the simulated cameras up and watch them stream.

use std::time::Duration;

use color_eyre::Result;
use tracing::{info, warn};

use obscura::source::life::LifeSource;
use obscura::source::orbits::OrbitsSource;
use obscura::source::{FrameSource, SourceSpec};
use obscura::{Camera, CameraRegistry, Config};

fn open_life(spec: &SourceSpec) -> Box<dyn FrameSource> {
    Box::new(LifeSource::new(spec))
}

fn open_orbits(spec: &SourceSpec) -> Box<dyn FrameSource> {
    Box::new(OrbitsSource::new(spec))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error handling and logging
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter("obscura=debug")
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .init();

    info!("Obscura launching...");

    let config = Config::default();

    // Build the registry once and pass it around; cameras stay asleep until
    // someone pokes them.
    let mut registry = CameraRegistry::new();
    for camera in &config.cameras {
        let factory: fn(&SourceSpec) -> Box<dyn FrameSource> = match camera.name.as_str() {
            "orbits" => open_orbits,
            _ => open_life,
        };
        registry.insert(Camera::new(
            camera.name.clone(),
            camera.spec(),
            factory,
            config.tuning,
        ));
    }
    info!(cameras = registry.len(), "registry ready");

    // A fast viewer on the life feed: sees every frame.
    let life = registry.get("life")?;
    life.poke().await?;
    let mut viewer = life.subscribe();
    for _ in 0..10 {
        let frame = viewer.next_frame().await?;
        info!(?frame, "life frame");
    }
    drop(viewer);

    // A slow viewer on the orbits feed: coalesces to the newest frame.
    let orbits = registry.get("orbits")?;
    orbits.poke().await?;
    let mut viewer = orbits.subscribe();
    for _ in 0..3 {
        tokio::time::sleep(Duration::from_millis(200)).await;
        let frame = viewer.next_frame().await?;
        info!(?frame, "orbits frame (latest)");
    }
    drop(viewer);

    if let Err(err) = registry.get("attic") {
        warn!(error = %err, "lookup of an unregistered camera");
    }

    for name in registry.names() {
        let camera = registry.get(name)?;
        info!(name, stats = ?camera.stats(), status = ?camera.status(), "camera");
    }

    info!("done; producers will stop on their own once idle");
    Ok(())
}
