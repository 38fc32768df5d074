//! The broadcaster core: cameras, consumers, and the signal between them.

pub mod camera;
pub mod registry;
pub mod signal;

pub use camera::{Camera, CameraStats, CameraStatus, ConsumerHandle};
pub use registry::CameraRegistry;
pub use signal::{BroadcastSignal, ConsumerId, WaitOutcome};

use thiserror::Error;

use crate::source::SourceError;

#[derive(Error, Debug)]
pub enum StreamError {
    /// No camera registered under this name.
    #[error("unknown camera: {0}")]
    UnknownCamera(String),

    /// The camera stopped (idle shutdown) while the caller was waiting on it.
    #[error("camera stopped")]
    Stopped,

    /// The running period ended with a source failure; a later poke builds a
    /// fresh source, so transient faults clear on the next demand.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// The producer thread could not be spawned.
    #[error("failed to spawn producer thread: {0}")]
    Spawn(#[from] std::io::Error),
}
