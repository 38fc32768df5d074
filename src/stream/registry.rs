use std::collections::HashMap;
use std::sync::Arc;

use crate::stream::{Camera, StreamError};

/// Name-to-camera map, built once at startup and handed to whatever layer
/// resolves stream names. Lookups of unregistered names fail immediately.
#[derive(Default)]
pub struct CameraRegistry {
    cameras: HashMap<String, Arc<Camera>>,
}

impl CameraRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a camera under its own name, returning the shared handle.
    pub fn insert(&mut self, camera: Camera) -> Arc<Camera> {
        let camera = Arc::new(camera);
        self.cameras
            .insert(camera.name().to_owned(), Arc::clone(&camera));
        camera
    }

    pub fn get(&self, name: &str) -> Result<Arc<Camera>, StreamError> {
        self.cameras
            .get(name)
            .cloned()
            .ok_or_else(|| StreamError::UnknownCamera(name.to_owned()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.cameras.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.cameras.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cameras.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{Frame, FrameSource, SourceError, SourceSpec};
    use crate::{CameraTuning, StreamError};
    use bytes::Bytes;

    struct NullSource;

    impl FrameSource for NullSource {
        fn next_frame(&mut self) -> Result<Frame, SourceError> {
            Ok(Frame::new(Bytes::new(), 0, 0, 0))
        }
    }

    fn null_camera(name: &str) -> Camera {
        Camera::new(
            name.to_string(),
            SourceSpec::default(),
            |_: &SourceSpec| Box::new(NullSource) as Box<dyn FrameSource>,
            CameraTuning::default(),
        )
    }

    #[test]
    fn lookup_by_name() {
        let mut registry = CameraRegistry::new();
        registry.insert(null_camera("front"));
        registry.insert(null_camera("back"));

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("front").unwrap().name(), "front");
    }

    #[test]
    fn unknown_name_is_an_error() {
        let registry = CameraRegistry::new();
        let err = registry.get("garage").err().expect("lookup should fail");
        match err {
            StreamError::UnknownCamera(name) => assert_eq!(name, "garage"),
            other => panic!("expected UnknownCamera, got {other:?}"),
        }
    }
}
