use bytes::Bytes;
use std::sync::Arc;
use std::time::Instant;

/// One produced frame with zero-copy semantics
#[derive(Clone)]
pub struct Frame {
    /// Immutable payload - can be shared across threads without copying.
    /// The broadcaster never interprets these bytes.
    pub data: Bytes,

    /// Frame metadata
    pub meta: Arc<FrameMetadata>,

    /// Production timestamp for latency tracking
    pub timestamp: Instant,
}

/// Frame metadata
#[derive(Debug, Clone)]
pub struct FrameMetadata {
    /// Strictly increasing from 0 within one source instance
    pub sequence: u64,
    pub width: u32,
    pub height: u32,
}

impl Frame {
    /// Wrap a finished payload. `sequence` restarts at 0 whenever the
    /// producing source is recreated.
    pub fn new(data: Bytes, sequence: u64, width: u32, height: u32) -> Self {
        Self {
            data,
            meta: Arc::new(FrameMetadata {
                sequence,
                width,
                height,
            }),
            timestamp: Instant::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("sequence", &self.meta.sequence)
            .field("bytes", &self.data.len())
            .field("width", &self.meta.width)
            .field("height", &self.meta.height)
            .finish()
    }
}
