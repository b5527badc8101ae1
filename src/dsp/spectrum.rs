//! Spectrum tap.
//!
//! A read-only analysis point in the chain: the pipeline task feeds it every
//! processed block, and callers poll byte-magnitude snapshots at whatever
//! cadence suits them (typically once per animation frame). The mapping —
//! windowed FFT magnitudes, exponential smoothing across frames, dB range
//! scaled into 0..=255 — matches the browser analyser the consuming UI was
//! written against.

use std::f32::consts::PI;
use std::sync::Arc;

use realfft::num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};

use crate::SpectrumConfig;

/// Sliding-window FFT analyzer producing byte-magnitude snapshots.
pub struct SpectrumTap {
    config: SpectrumConfig,
    channels: usize,
    fft: Arc<dyn RealToComplex<f32>>,
    window: Vec<f32>,
    /// Most recent `fft_size` mono samples, oldest first.
    history: Vec<f32>,
    /// Smoothed linear magnitudes, one per bin.
    smoothed: Vec<f32>,
    scratch_in: Vec<f32>,
    scratch_out: Vec<Complex<f32>>,
}

impl SpectrumTap {
    /// Creates a tap for the given channel count.
    pub fn new(config: SpectrumConfig, channels: u16) -> Self {
        let fft_size = config.fft_size;
        let fft = RealFftPlanner::<f32>::new().plan_fft_forward(fft_size);

        // Hann window.
        let window = (0..fft_size)
            .map(|i| {
                let x = PI * i as f32 / fft_size as f32;
                x.sin() * x.sin()
            })
            .collect();

        Self {
            channels: usize::from(channels.max(1)),
            fft,
            window,
            history: vec![0.0; fft_size],
            smoothed: vec![0.0; config.bin_count()],
            scratch_in: vec![0.0; fft_size],
            scratch_out: vec![Complex::default(); fft_size / 2 + 1],
            config,
        }
    }

    /// Feeds an interleaved block into the sliding analysis window.
    pub fn push_block(&mut self, samples: &[f32]) {
        for frame in samples.chunks(self.channels) {
            let mono = frame.iter().sum::<f32>() / frame.len() as f32;
            self.history.rotate_left(1);
            if let Some(last) = self.history.last_mut() {
                *last = mono;
            }
        }
    }

    /// Computes the current byte-magnitude snapshot.
    ///
    /// Always returns exactly [`SpectrumConfig::bin_count`] values; a tap
    /// that has only seen silence reports all zeros.
    pub fn snapshot(&mut self) -> Vec<u8> {
        for (dst, (sample, w)) in self
            .scratch_in
            .iter_mut()
            .zip(self.history.iter().zip(&self.window))
        {
            *dst = sample * w;
        }

        if let Err(err) = self.fft.process(&mut self.scratch_in, &mut self.scratch_out) {
            tracing::warn!(%err, "spectrum FFT failed; reusing previous frame");
        } else {
            let norm = 1.0 / self.config.fft_size as f32;
            let smoothing = self.config.smoothing;
            for (bin, out) in self.smoothed.iter_mut().zip(&self.scratch_out) {
                let magnitude = out.norm() * norm;
                *bin = smoothing * *bin + (1.0 - smoothing) * magnitude;
            }
        }

        let (min_db, max_db) = (self.config.min_db, self.config.max_db);
        let scale = 255.0 / (max_db - min_db);
        self.smoothed
            .iter()
            .map(|&magnitude| {
                let db = if magnitude > 0.0 {
                    20.0 * magnitude.log10()
                } else {
                    min_db
                };
                ((db - min_db) * scale).clamp(0.0, 255.0) as u8
            })
            .collect()
    }

    /// Number of bins per snapshot.
    pub fn bin_count(&self) -> usize {
        self.config.bin_count()
    }
}

impl std::fmt::Debug for SpectrumTap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectrumTap")
            .field("fft_size", &self.config.fft_size)
            .field("bins", &self.config.bin_count())
            .field("channels", &self.channels)
            .finish()
    }
}
