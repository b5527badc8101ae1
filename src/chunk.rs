//! Processed audio block with metadata.

use std::sync::Arc;
use std::time::Duration;

use crate::SourceId;

/// A block of processed audio leaving a pipeline.
///
/// Samples are interleaved f32 PCM in [-1, 1] (post-limiter), wrapped in an
/// `Arc` so multiple consumers can share one block without copying.
#[derive(Debug, Clone)]
pub struct ProcessedChunk {
    /// Interleaved f32 PCM samples.
    pub samples: Arc<Vec<f32>>,

    /// Offset from pipeline activation.
    pub timestamp: Duration,

    /// Sample rate in Hz.
    pub sample_rate: u32,

    /// Number of audio channels (1 = mono, 2 = stereo).
    pub channels: u16,

    /// Source that produced this block.
    pub source_id: SourceId,
}

impl ProcessedChunk {
    /// Creates a new block.
    pub fn new(
        samples: Vec<f32>,
        timestamp: Duration,
        sample_rate: u32,
        channels: u16,
        source_id: SourceId,
    ) -> Self {
        Self {
            samples: Arc::new(samples),
            timestamp,
            sample_rate,
            channels,
            source_id,
        }
    }

    /// Returns the duration of this block.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 || self.channels == 0 {
            return Duration::ZERO;
        }
        let frames = self.samples.len() / self.channels as usize;
        Duration::from_secs_f64(frames as f64 / f64::from(self.sample_rate))
    }

    /// Returns the number of frames (one sample per channel).
    pub fn frame_count(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }

    /// Peak absolute amplitude in this block.
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |p, s| p.max(s.abs()))
    }

    /// Returns `true` if the block contains no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
