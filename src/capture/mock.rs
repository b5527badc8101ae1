//! Mock capture host for testing without hardware.

use std::collections::{HashMap, HashSet};
use std::f32::consts::PI;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use ringbuf::traits::{Producer, Split};
use ringbuf::HeapRb;

use crate::capture::{CaptureHost, CaptureStream, MediaStream, StreamToken};
use crate::{SourceId, TabEqError};

/// Seconds of synthetic audio preloaded into each opened stream.
const FEED_SECS: usize = 2;

/// Test tone frequency in Hz.
const TONE_HZ: f32 = 440.0;

/// Test tone amplitude.
const TONE_AMPLITUDE: f32 = 0.5;

#[derive(Debug, Default)]
struct MockHostState {
    denied: HashSet<SourceId>,
    acquires: HashMap<SourceId, usize>,
    stopped: HashMap<SourceId, Arc<AtomicBool>>,
    open_delay: Option<std::time::Duration>,
}

/// A [`CaptureHost`] that serves synthetic streams.
///
/// Opened streams come preloaded with a 440Hz test tone, so pipelines have
/// real samples to process in CI. Per-source denial switches simulate host
/// permission failures, and acquire counters let tests assert how many
/// streams were actually opened.
///
/// # Example
///
/// ```
/// use tab_eq::capture::MockCaptureHost;
/// use tab_eq::SourceId;
///
/// let host = MockCaptureHost::new(48000, 1);
/// host.deny(SourceId::for_tab(7));
/// assert_eq!(host.acquire_count(&SourceId::for_tab(7)), 0);
/// ```
#[derive(Debug)]
pub struct MockCaptureHost {
    sample_rate: u32,
    channels: u16,
    state: Mutex<MockHostState>,
}

impl MockCaptureHost {
    /// Creates a mock host serving streams in the given format.
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels: channels.max(1),
            state: Mutex::new(MockHostState::default()),
        }
    }

    /// Makes future capture requests for a source fail.
    pub fn deny(&self, source_id: SourceId) {
        self.state.lock().denied.insert(source_id);
    }

    /// Clears a previous denial.
    pub fn allow(&self, source_id: &SourceId) {
        self.state.lock().denied.remove(source_id);
    }

    /// Makes every subsequent stream open take this long, simulating a
    /// slow host permission flow.
    pub fn delay_open(&self, delay: std::time::Duration) {
        self.state.lock().open_delay = Some(delay);
    }

    /// Number of streams opened for a source so far.
    pub fn acquire_count(&self, source_id: &SourceId) -> usize {
        self.state
            .lock()
            .acquires
            .get(source_id)
            .copied()
            .unwrap_or(0)
    }

    /// Returns `true` if the most recently opened stream for a source has
    /// been stopped.
    pub fn stream_stopped(&self, source_id: &SourceId) -> bool {
        self.state
            .lock()
            .stopped
            .get(source_id)
            .map(|flag| flag.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    fn tone_samples(&self) -> Vec<f32> {
        let frames = self.sample_rate as usize * FEED_SECS;
        let mut samples = Vec::with_capacity(frames * self.channels as usize);
        for i in 0..frames {
            let value = (2.0 * PI * TONE_HZ * i as f32 / self.sample_rate as f32).sin()
                * TONE_AMPLITUDE;
            for _ in 0..self.channels {
                samples.push(value);
            }
        }
        samples
    }
}

impl Default for MockCaptureHost {
    fn default() -> Self {
        Self::new(48000, 1)
    }
}

#[async_trait]
impl CaptureHost for MockCaptureHost {
    async fn request_capture(&self, source_id: &SourceId) -> Result<StreamToken, TabEqError> {
        if self.state.lock().denied.contains(source_id) {
            return Err(TabEqError::capture_unavailable(
                source_id.clone(),
                "capture denied by host",
            ));
        }
        Ok(StreamToken::new(
            source_id.clone(),
            format!("mock:{source_id}"),
        ))
    }

    async fn open_stream(&self, token: StreamToken) -> Result<MediaStream, TabEqError> {
        let delay = self.state.lock().open_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let source_id = token.source_id().clone();
        let samples = self.tone_samples();

        let (mut producer, consumer) = HeapRb::<f32>::new(samples.len().max(1)).split();
        for sample in samples {
            let _ = producer.try_push(sample);
        }

        let stopped = Arc::new(AtomicBool::new(false));
        {
            let mut state = self.state.lock();
            *state.acquires.entry(source_id.clone()).or_insert(0) += 1;
            state.stopped.insert(source_id, stopped.clone());
        }

        Ok(MediaStream::new(
            CaptureStream::idle(stopped),
            consumer,
            self.sample_rate,
            self.channels,
        ))
    }
}
