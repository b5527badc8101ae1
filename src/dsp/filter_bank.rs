//! Cascaded peaking-filter bank.
//!
//! One biquad peaking stage per band, chained in layout (frequency) order.
//! Coefficients follow the Audio EQ Cookbook peaking formulas; recomputation
//! is deferred to the next processed block, so gain writes from the control
//! surface are cheap and take effect at block boundaries.

use std::f64::consts::PI;

use crate::{BandLayout, TabEqError};

/// Fixed quality factor for every peaking stage.
const BAND_Q: f64 = 1.0;

/// Biquad coefficients, normalized by a0.
#[derive(Debug, Clone, Copy, Default)]
struct BiquadCoeffs {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl BiquadCoeffs {
    /// Peaking EQ coefficients (Audio EQ Cookbook).
    fn peaking(sample_rate: f64, frequency: f64, gain_db: f64) -> Self {
        // Keep the center frequency below Nyquist; a 16kHz band on a
        // 22.05kHz capture would otherwise fold over.
        let freq = frequency.clamp(10.0, sample_rate / 2.0 - 1.0);

        let w0 = 2.0 * PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * BAND_Q);
        let a = 10.0_f64.powf(gain_db / 40.0);

        let b0 = 1.0 + alpha * a;
        let b1 = -2.0 * cos_w0;
        let b2 = 1.0 - alpha * a;
        let a0 = 1.0 + alpha / a;
        let a1 = -2.0 * cos_w0;
        let a2 = 1.0 - alpha / a;

        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }
}

/// Per-channel biquad delay line (Direct Form I).
#[derive(Debug, Clone, Copy, Default)]
struct BiquadState {
    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,
}

impl BiquadState {
    fn process(&mut self, input: f64, c: &BiquadCoeffs) -> f64 {
        let output =
            c.b0 * input + c.b1 * self.x1 + c.b2 * self.x2 - c.a1 * self.y1 - c.a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;

        output
    }
}

/// One peaking stage of the bank.
#[derive(Debug, Clone)]
struct BandStage {
    frequency: f32,
    gain_db: f32,
    coeffs: BiquadCoeffs,
    states: Vec<BiquadState>,
    dirty: bool,
}

/// An ordered chain of peaking filters, one per band layout entry.
///
/// The bank is a parameter holder plus block DSP; it owns no threads. The
/// stage count always equals the layout length and stages run input→output
/// in layout order.
#[derive(Debug)]
pub struct FilterBank {
    stages: Vec<BandStage>,
    sample_rate: f64,
    channels: usize,
    gain_range_db: (f32, f32),
}

impl FilterBank {
    /// Builds one peaking stage per layout frequency, each at 0 dB gain
    /// and Q 1.0.
    ///
    /// # Errors
    ///
    /// Returns [`TabEqError::InvalidLayout`] if the layout is empty.
    pub fn build(
        layout: &BandLayout,
        sample_rate: u32,
        channels: u16,
        gain_range_db: (f32, f32),
    ) -> Result<Self, TabEqError> {
        if layout.is_empty() {
            return Err(TabEqError::InvalidLayout);
        }

        let channels = usize::from(channels.max(1));
        let stages = layout
            .frequencies()
            .iter()
            .map(|&frequency| BandStage {
                frequency,
                gain_db: 0.0,
                coeffs: BiquadCoeffs::peaking(f64::from(sample_rate), f64::from(frequency), 0.0),
                states: vec![BiquadState::default(); channels],
                dirty: false,
            })
            .collect();

        Ok(Self {
            stages,
            sample_rate: f64::from(sample_rate),
            channels,
            gain_range_db,
        })
    }

    /// Sets the gain of one band in dB, clamped to the configured range.
    ///
    /// An out-of-range `band_index` is ignored rather than rejected: the UI
    /// and the engine can briefly disagree on band count around a tier
    /// change, and those writes must not fail. The new value is picked up
    /// at the next processed block.
    pub fn set_gain(&mut self, band_index: usize, value_db: f32) {
        let Some(stage) = self.stages.get_mut(band_index) else {
            tracing::debug!(
                band_index,
                bands = self.stages.len(),
                "ignoring gain write for out-of-range band"
            );
            return;
        };

        let (lo, hi) = self.gain_range_db;
        let clamped = value_db.clamp(lo, hi);
        if (clamped - stage.gain_db).abs() > f32::EPSILON {
            stage.gain_db = clamped;
            stage.dirty = true;
        }
    }

    /// Number of stages (== band layout length).
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns `true` if the bank has no stages (never, post-build).
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Stage center frequencies in chain order.
    pub fn frequencies(&self) -> Vec<f32> {
        self.stages.iter().map(|s| s.frequency).collect()
    }

    /// Current stage gains in chain order.
    pub fn gains(&self) -> Vec<f32> {
        self.stages.iter().map(|s| s.gain_db).collect()
    }

    /// Runs an interleaved block through every stage, in order, in place.
    pub fn process_block(&mut self, samples: &mut [f32]) {
        for stage in &mut self.stages {
            if stage.dirty {
                stage.coeffs = BiquadCoeffs::peaking(
                    self.sample_rate,
                    f64::from(stage.frequency),
                    f64::from(stage.gain_db),
                );
                stage.dirty = false;
            }

            // A 0 dB stage is numerically close to unity; skipping it saves
            // most of the work in the common all-flat case.
            if stage.gain_db.abs() < 0.01 {
                continue;
            }

            for frame in samples.chunks_mut(self.channels) {
                for (channel, sample) in frame.iter_mut().enumerate() {
                    *sample =
                        stage.states[channel].process(f64::from(*sample), &stage.coeffs) as f32;
                }
            }
        }
    }
}
