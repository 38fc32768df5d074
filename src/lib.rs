//! obscura: lazy frame broadcaster for simulated cameras.
//!
//! Each [`Camera`] pairs an infinite, self-paced [`source::FrameSource`]
//! with a producer thread that exists only while someone is watching.
//! Consumers subscribe, poke the camera awake, and pull frames; delivery is
//! last-value-wins, so a slow consumer skips to the newest frame instead of
//! backing up the producer. A camera with no consumer activity for the idle
//! window shuts its producer down and rebuilds the source on next demand.

pub mod source;
pub mod stream;

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use source::{Frame, FrameMetadata, FrameSource, SourceError, SourceFactory, SourceSpec};
pub use stream::{
    Camera, CameraRegistry, CameraStats, CameraStatus, ConsumerHandle, StreamError,
};

/// Process configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub cameras: Vec<CameraConfig>,
    pub tuning: CameraTuning,
}

/// One named camera and what to ask of its source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl CameraConfig {
    pub fn spec(&self) -> SourceSpec {
        SourceSpec::new(self.width, self.height, self.fps)
    }
}

/// Producer lifecycle tuning, shared by all cameras
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CameraTuning {
    /// Stop a producer after this long with no consumer activity
    pub idle_timeout_ms: u64,
    /// Reclaim a signaled-but-silent consumer after this long
    pub stale_after_ms: u64,
}

impl CameraTuning {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_millis(self.stale_after_ms)
    }
}

impl Default for CameraTuning {
    fn default() -> Self {
        Self {
            idle_timeout_ms: 3_000,
            stale_after_ms: 5_000,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cameras: vec![
                CameraConfig {
                    name: "life".into(),
                    width: 720,
                    height: 360,
                    fps: 10,
                },
                CameraConfig {
                    name: "orbits".into(),
                    width: 720,
                    height: 360,
                    fps: 30,
                },
            ],
            tuning: CameraTuning::default(),
        }
    }
}
