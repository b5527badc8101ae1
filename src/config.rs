//! Configuration types for the EQ engine.

use std::time::Duration;

/// Fixed limiter parameters, set at pipeline construction.
///
/// The limiter exists purely to prevent clipping after band boosts; it is
/// not exposed for per-user tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LimiterParams {
    /// Level above which compression starts.
    pub threshold_db: f32,
    /// Width of the soft-knee transition around the threshold.
    pub knee_db: f32,
    /// Compression ratio above the knee (20:1 is limiter territory).
    pub ratio: f32,
    /// Envelope attack time.
    pub attack: Duration,
    /// Envelope release time.
    pub release: Duration,
}

impl Default for LimiterParams {
    fn default() -> Self {
        Self {
            threshold_db: -10.0,
            knee_db: 10.0,
            ratio: 20.0,
            attack: Duration::from_millis(5),
            release: Duration::from_millis(100),
        }
    }
}

/// Spectrum tap configuration.
///
/// Defaults mirror the browser analyser the UI was built against: a
/// 256-sample window yielding 128 byte-magnitude bins, with exponential
/// smoothing across frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectrumConfig {
    /// Analysis window size in samples; must be a power of two.
    pub fft_size: usize,
    /// Smoothing constant in [0, 1); higher values favor previous frames.
    pub smoothing: f32,
    /// Magnitude mapped to byte value 0.
    pub min_db: f32,
    /// Magnitude mapped to byte value 255.
    pub max_db: f32,
}

impl SpectrumConfig {
    /// Number of frequency bins a snapshot contains.
    #[must_use]
    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }
}

impl Default for SpectrumConfig {
    fn default() -> Self {
        Self {
            fft_size: 256,
            smoothing: 0.8,
            min_db: -100.0,
            max_db: -30.0,
        }
    }
}

/// Engine-wide configuration.
///
/// Use [`EngineConfig::default()`] for sensible defaults, or customize as
/// needed.
///
/// # Example
///
/// ```
/// use tab_eq::EngineConfig;
/// use std::time::Duration;
///
/// let config = EngineConfig {
///     chunk_duration: Duration::from_millis(10),
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Duration of each processing block.
    ///
    /// Smaller values reduce parameter-change latency but increase
    /// overhead. Default: 20ms.
    pub chunk_duration: Duration,

    /// Band gain clamp range in dB, applied to `set_gain` writes.
    ///
    /// Default: -12 to +12.
    pub gain_range_db: (f32, f32),

    /// Bounded wait for capture acquisition.
    ///
    /// Host permission flows can hang; acquisition that exceeds this
    /// surfaces as a capture-unavailable error. Default: 10s.
    pub acquire_timeout: Duration,

    /// Spectrum tap settings.
    pub spectrum: SpectrumConfig,

    /// Limiter settings.
    pub limiter: LimiterParams,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunk_duration: Duration::from_millis(20),
            gain_range_db: (-12.0, 12.0),
            acquire_timeout: Duration::from_secs(10),
            spectrum: SpectrumConfig::default(),
            limiter: LimiterParams::default(),
        }
    }
}
