//! Frame sources: the things a camera points at.
//!
//! A [`FrameSource`] is an infinite, self-paced sequence of frames. It blocks
//! inside [`FrameSource::next_frame`] to hold its own rate; the camera that
//! drives it exercises no pacing control. Sources are not restartable in
//! place - a camera builds a fresh instance through a [`SourceFactory`] for
//! every running period, so simulation state never survives a stop.

pub mod frame;
pub mod life;
pub mod orbits;

pub use frame::{Frame, FrameMetadata};

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;

/// What a camera asks of its source: target dimensions and desired rate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SourceSpec {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl SourceSpec {
    pub fn new(width: u32, height: u32, fps: u32) -> Self {
        Self { width, height, fps }
    }

    /// Nominal time between frames.
    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.fps.max(1) as f64)
    }
}

impl Default for SourceSpec {
    fn default() -> Self {
        Self {
            width: 720,
            height: 360,
            fps: 30,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("source failure: {0}")]
    Failure(String),
    #[error("source produced no frame")]
    Exhausted,
}

/// An infinite, internally paced frame generator.
///
/// An `Err` return is terminal for this instance; the owning camera stops
/// its running period and will build a new instance on the next demand.
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> Result<Frame, SourceError>;
}

/// Builds a fresh [`FrameSource`] for each running period.
pub trait SourceFactory: Send + Sync {
    fn open(&self, spec: &SourceSpec) -> Box<dyn FrameSource>;
}

impl<F> SourceFactory for F
where
    F: Fn(&SourceSpec) -> Box<dyn FrameSource> + Send + Sync,
{
    fn open(&self, spec: &SourceSpec) -> Box<dyn FrameSource> {
        self(spec)
    }
}

/// Sleep-based frame pacer.
///
/// Keeps a fixed cadence against an absolute schedule rather than sleeping a
/// fixed amount per frame, so render time does not accumulate as drift. Falls
/// back to rescheduling from `now` when production can't keep up.
pub struct Pacer {
    interval: Duration,
    deadline: Option<Instant>,
}

impl Pacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            deadline: None,
        }
    }

    pub fn for_spec(spec: &SourceSpec) -> Self {
        Self::new(spec.interval())
    }

    /// Block until the next frame is due.
    pub fn pace(&mut self) {
        let now = Instant::now();
        let due = match self.deadline {
            Some(due) if due > now => {
                std::thread::sleep(due - now);
                due
            }
            Some(_) | None => now, // behind schedule or first frame
        };
        self.deadline = Some(due + self.interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_interval() {
        let spec = SourceSpec::new(720, 360, 20);
        assert_eq!(spec.interval(), Duration::from_millis(50));
    }

    #[test]
    fn zero_fps_does_not_divide_by_zero() {
        let spec = SourceSpec::new(720, 360, 0);
        assert_eq!(spec.interval(), Duration::from_secs(1));
    }

    #[test]
    fn pacer_holds_cadence() {
        let mut pacer = Pacer::new(Duration::from_millis(10));
        let start = Instant::now();
        for _ in 0..5 {
            pacer.pace();
        }
        // First call is immediate, the remaining four wait one interval each.
        assert!(start.elapsed() >= Duration::from_millis(40));
    }
}
