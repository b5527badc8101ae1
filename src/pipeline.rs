//! Per-source signal pipeline.
//!
//! A pipeline owns everything between one captured stream and the output
//! sink: the filter bank, the spectrum tap, the master gain and the
//! limiter, plus the background task that drives them. The task polls the
//! capture ring buffer, processes one block at a time, and keeps going
//! until teardown — audio flow is continuous, not a one-shot computation.
//!
//! Control calls are fire-and-forget parameter writes: they update shared
//! state and take effect when the task picks them up at the next block.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use ringbuf::traits::Consumer;
use ringbuf::HeapCons;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::capture::CaptureHandle;
use crate::dsp::{FilterBank, Limiter, SpectrumTap};
use crate::sink::OutputSink;
use crate::{BandLayout, EngineConfig, ProcessedChunk, SourceId, TabEqError};

/// State shared between the pipeline handle and its background task.
struct PipelineShared {
    running: AtomicBool,
    stop: Notify,
    /// Master gain multiplier, stored as f32 bits.
    master_volume_bits: AtomicU32,
    /// The filter bank; control writes land here, the task reads per block.
    bank: Mutex<FilterBank>,
    /// Latest spectrum snapshot, refreshed by the task every block.
    spectrum: Mutex<Vec<u8>>,
}

/// One source's processing chain, from captured audio to output.
///
/// Built by the registry during activation; torn down on deactivation,
/// eviction, or source loss. All methods are safe to call from any thread.
pub struct SignalPipeline {
    source_id: SourceId,
    layout: BandLayout,
    shared: Arc<PipelineShared>,
    capture: CaptureHandle,
    task: Mutex<Option<JoinHandle<()>>>,
    torn_down: AtomicBool,
}

impl SignalPipeline {
    /// Wires a captured stream through the stage chain and starts audio
    /// flowing.
    ///
    /// On any construction failure the capture handle is released before
    /// the error propagates, so no stream is ever left open without an
    /// owning pipeline.
    pub(crate) fn activate(
        capture: CaptureHandle,
        layout: BandLayout,
        config: &EngineConfig,
        sink: Arc<dyn OutputSink>,
    ) -> Result<Arc<Self>, TabEqError> {
        let source_id = capture.source_id().clone();
        let sample_rate = capture.sample_rate();
        let channels = capture.channels();

        let bank = match FilterBank::build(&layout, sample_rate, channels, config.gain_range_db) {
            Ok(bank) => bank,
            Err(err) => {
                capture.release();
                return Err(err);
            }
        };

        let Some(consumer) = capture.take_consumer() else {
            capture.release();
            return Err(TabEqError::Backend(
                "capture stream already consumed".to_string(),
            ));
        };

        let shared = Arc::new(PipelineShared {
            running: AtomicBool::new(true),
            stop: Notify::new(),
            master_volume_bits: AtomicU32::new(1.0f32.to_bits()),
            bank: Mutex::new(bank),
            spectrum: Mutex::new(vec![0; config.spectrum.bin_count()]),
        });

        let frames_per_block =
            (f64::from(sample_rate) * config.chunk_duration.as_secs_f64()) as usize;
        let task = PipelineTask {
            consumer,
            tap: SpectrumTap::new(config.spectrum, channels),
            limiter: Limiter::new(config.limiter, sample_rate, channels),
            shared: shared.clone(),
            sink,
            source_id: source_id.clone(),
            sample_rate,
            channels,
            block_samples: frames_per_block.max(1) * usize::from(channels.max(1)),
            poll_interval: config.chunk_duration / 2,
        };
        let handle = tokio::spawn(task.run());

        tracing::info!(
            source = %source_id,
            bands = layout.len(),
            sample_rate,
            channels,
            "pipeline activated"
        );

        Ok(Arc::new(Self {
            source_id,
            layout,
            shared,
            capture,
            task: Mutex::new(Some(handle)),
            torn_down: AtomicBool::new(false),
        }))
    }

    /// Source this pipeline processes.
    pub fn source_id(&self) -> &SourceId {
        &self.source_id
    }

    /// The band layout the pipeline was built with.
    pub fn layout(&self) -> &BandLayout {
        &self.layout
    }

    /// Returns `true` until teardown.
    pub fn is_active(&self) -> bool {
        !self.torn_down.load(Ordering::SeqCst)
    }

    /// Sets one band's gain in dB.
    ///
    /// Out-of-range indices are ignored; the write takes effect at the
    /// next processed block.
    pub fn set_band_gain(&self, band_index: usize, value_db: f32) {
        if !self.is_active() {
            tracing::debug!(source = %self.source_id, "gain write on torn-down pipeline ignored");
            return;
        }
        self.shared.bank.lock().set_gain(band_index, value_db);
    }

    /// Current per-band gains, in chain order.
    pub fn band_gains(&self) -> Vec<f32> {
        self.shared.bank.lock().gains()
    }

    /// Sets the master gain multiplier.
    ///
    /// No clamping is applied here; callers keep to sane ranges (the UI
    /// offers 0.0–2.0). The limiter downstream catches overshoot.
    pub fn set_master_volume(&self, scalar: f32) {
        if !self.is_active() {
            tracing::debug!(source = %self.source_id, "volume write on torn-down pipeline ignored");
            return;
        }
        self.shared
            .master_volume_bits
            .store(scalar.to_bits(), Ordering::Relaxed);
    }

    /// Current master gain multiplier.
    pub fn master_volume(&self) -> f32 {
        f32::from_bits(self.shared.master_volume_bits.load(Ordering::Relaxed))
    }

    /// Reads the current spectrum snapshot.
    ///
    /// This is a polling read of continuously updated state; callers pick
    /// their own cadence (typically once per animation frame).
    ///
    /// # Errors
    ///
    /// Returns [`TabEqError::NotActive`] once the pipeline is torn down.
    pub fn snapshot_spectrum(&self) -> Result<Vec<u8>, TabEqError> {
        if !self.is_active() {
            return Err(TabEqError::not_active(self.source_id.clone()));
        }
        Ok(self.shared.spectrum.lock().clone())
    }

    /// Tears the pipeline down: stops the stage chain, releases the
    /// spectrum tap, then releases the capture handle — in that order.
    ///
    /// Idempotent; every exit path (explicit deactivation, eviction,
    /// source loss) funnels through here.
    pub async fn teardown(&self) {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            return;
        }

        self.shared.running.store(false, Ordering::SeqCst);
        self.shared.stop.notify_waiters();

        let task = self.task.lock().take();
        if let Some(task) = task {
            if task.await.is_err() {
                tracing::error!(source = %self.source_id, "pipeline task panicked");
            }
        }

        self.shared.spectrum.lock().clear();
        self.capture.release();

        tracing::info!(source = %self.source_id, "pipeline torn down");
    }
}

impl Drop for SignalPipeline {
    fn drop(&mut self) {
        if !self.torn_down.load(Ordering::SeqCst) {
            // Dropped without teardown(): signal the task and let the
            // capture handle's own drop stop the stream.
            self.shared.running.store(false, Ordering::SeqCst);
            self.shared.stop.notify_waiters();
        }
    }
}

impl std::fmt::Debug for SignalPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalPipeline")
            .field("source_id", &self.source_id)
            .field("bands", &self.layout.len())
            .field("active", &self.is_active())
            .finish()
    }
}

/// The background task driving one pipeline's stage chain.
struct PipelineTask {
    consumer: HeapCons<f32>,
    tap: SpectrumTap,
    limiter: Limiter,
    shared: Arc<PipelineShared>,
    sink: Arc<dyn OutputSink>,
    source_id: SourceId,
    sample_rate: u32,
    channels: u16,
    block_samples: usize,
    poll_interval: Duration,
}

impl PipelineTask {
    async fn run(mut self) {
        let started = Instant::now();
        let mut interval = tokio::time::interval(self.poll_interval);

        while self.shared.running.load(Ordering::SeqCst) {
            tokio::select! {
                _ = interval.tick() => {}
                _ = self.shared.stop.notified() => break,
            }

            // Drain whatever the capture thread produced since last tick.
            loop {
                let Some(block) = self.read_block() else { break };
                let full = block.len() == self.block_samples;
                self.process_block(block, started).await;
                if !full {
                    break;
                }
            }
        }

        tracing::debug!(source = %self.source_id, "pipeline task exiting");
    }

    /// Reads up to one block of samples from the capture ring.
    fn read_block(&mut self) -> Option<Vec<f32>> {
        let mut block = Vec::with_capacity(self.block_samples);
        while block.len() < self.block_samples {
            match self.consumer.try_pop() {
                Some(sample) => block.push(sample),
                None => break,
            }
        }
        if block.is_empty() {
            None
        } else {
            Some(block)
        }
    }

    /// Runs one block through the stage chain and hands it to the sink.
    async fn process_block(&mut self, mut block: Vec<f32>, started: Instant) {
        self.shared.bank.lock().process_block(&mut block);

        self.tap.push_block(&block);
        *self.shared.spectrum.lock() = self.tap.snapshot();

        let volume = f32::from_bits(self.shared.master_volume_bits.load(Ordering::Relaxed));
        if (volume - 1.0).abs() > f32::EPSILON {
            for sample in block.iter_mut() {
                *sample *= volume;
            }
        }

        self.limiter.process_block(&mut block);

        let chunk = ProcessedChunk::new(
            block,
            started.elapsed(),
            self.sample_rate,
            self.channels,
            self.source_id.clone(),
        );
        if let Err(err) = self.sink.write(&chunk).await {
            tracing::warn!(
                source = %self.source_id,
                sink = self.sink.name(),
                %err,
                "output sink write failed"
            );
        }
    }
}
