//! Stable external control surface.
//!
//! The [`ControlSurface`] is what the transport layer talks to: it routes
//! calls to the active pipeline for a source without exposing how the
//! graph is wired. Parameter writes and spectrum reads on inactive sources
//! are deliberately forgiving — the UI keeps its own "enabled" flag and
//! can race pipeline teardown, so a write to a gone pipeline is a no-op
//! and a spectrum poll returns empty instead of failing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::registry::PipelineRegistry;
use crate::settings::{Preset, SourceSettings};
use crate::{BandLayout, SourceId, TabEqError, Tier};

/// License/tier status lookup, read at activation time only.
///
/// Tier changes are not pushed into already-active pipelines; the next
/// activation sees the new answer.
pub trait LicenseProvider: Send + Sync {
    /// Returns `true` if the given source is entitled to premium features.
    fn is_premium(&self, source_id: &SourceId) -> bool;
}

/// A [`LicenseProvider`] with one global, mutable answer.
///
/// Covers the common deployment where license state is per-user, not
/// per-source, and arrives from an external sync.
#[derive(Debug, Default)]
pub struct StaticLicense {
    premium: AtomicBool,
}

impl StaticLicense {
    /// Free-tier license.
    pub fn free() -> Self {
        Self::default()
    }

    /// Premium license.
    pub fn premium() -> Self {
        let license = Self::default();
        license.premium.store(true, Ordering::SeqCst);
        license
    }

    /// Updates the license status.
    pub fn set_premium(&self, premium: bool) {
        self.premium.store(premium, Ordering::SeqCst);
    }
}

impl LicenseProvider for StaticLicense {
    fn is_premium(&self, _source_id: &SourceId) -> bool {
        self.premium.load(Ordering::SeqCst)
    }
}

/// The engine's external API.
///
/// Build one with [`TabEq::builder()`](crate::TabEq::builder).
///
/// # Example
///
/// ```ignore
/// let surface = TabEq::builder()
///     .capture_host(host)
///     .build()?;
///
/// let tab = SourceId::for_tab(42);
/// surface.activate_source(&tab).await?;
/// surface.set_gain(&tab, 0, 4.0);
/// let spectrum = surface.get_spectrum(&tab);
/// surface.deactivate_source(&tab).await;
/// ```
pub struct ControlSurface {
    registry: Arc<PipelineRegistry>,
    license: Arc<dyn LicenseProvider>,
}

impl ControlSurface {
    pub(crate) fn new(registry: Arc<PipelineRegistry>, license: Arc<dyn LicenseProvider>) -> Self {
        Self { registry, license }
    }

    /// Activates processing for a source at its current license tier.
    ///
    /// # Errors
    ///
    /// Propagates activation failures ([`TabEqError::CaptureUnavailable`],
    /// [`TabEqError::ActivationCancelled`]) to the caller; no retry.
    pub async fn activate_source(&self, source_id: &SourceId) -> Result<(), TabEqError> {
        let tier = Tier::from(self.license.is_premium(source_id));
        self.registry.activate_source(source_id, tier).await?;
        Ok(())
    }

    /// Deactivates processing for a source; no-op if inactive.
    pub async fn deactivate_source(&self, source_id: &SourceId) {
        self.registry.deactivate_source(source_id).await;
    }

    /// Inbound host event: the source disappeared (tab closed).
    pub async fn notify_source_lost(&self, source_id: &SourceId) {
        self.registry.notify_source_lost(source_id).await;
    }

    /// Sets one band's gain for a source. No-op when the source has no
    /// active pipeline or the index is out of range.
    pub fn set_gain(&self, source_id: &SourceId, band_index: usize, value_db: f32) {
        if let Some(pipeline) = self.registry.get(source_id) {
            pipeline.set_band_gain(band_index, value_db);
        }
    }

    /// Sets the master volume multiplier for a source. No-op when the
    /// source has no active pipeline.
    pub fn set_volume(&self, source_id: &SourceId, scalar: f32) {
        if let Some(pipeline) = self.registry.get(source_id) {
            pipeline.set_master_volume(scalar);
        }
    }

    /// Polls the spectrum snapshot for a source.
    ///
    /// Returns an empty Vec when the source has no active pipeline —
    /// render loops poll blindly and must not have to handle errors.
    pub fn get_spectrum(&self, source_id: &SourceId) -> Vec<u8> {
        self.registry
            .get(source_id)
            .and_then(|pipeline| pipeline.snapshot_spectrum().ok())
            .unwrap_or_default()
    }

    /// The band layout a tier gets.
    pub fn band_layout(&self, tier: Tier) -> BandLayout {
        BandLayout::for_tier(tier)
    }

    /// Returns `true` if a source currently has an active pipeline.
    pub fn is_active(&self, source_id: &SourceId) -> bool {
        self.registry.get(source_id).is_some()
    }

    /// Active sources in activation order.
    pub fn active_sources(&self) -> Vec<SourceId> {
        self.registry.active_sources()
    }

    /// Replays a settings record onto a source's active pipeline: every
    /// band gain, then the master volume. No-op when inactive.
    pub fn apply_settings(&self, source_id: &SourceId, settings: &SourceSettings) {
        let Some(pipeline) = self.registry.get(source_id) else {
            return;
        };
        for (index, &gain) in settings.band_gains.iter().enumerate() {
            pipeline.set_band_gain(index, gain);
        }
        pipeline.set_master_volume(settings.master_volume);
    }

    /// Applies a named preset's curve to a source's active pipeline,
    /// resolved against that pipeline's own layout. No-op when inactive.
    pub fn apply_preset(&self, source_id: &SourceId, preset: Preset) {
        let Some(pipeline) = self.registry.get(source_id) else {
            return;
        };
        for (index, gain) in preset.gains_for(pipeline.layout()).into_iter().enumerate() {
            pipeline.set_band_gain(index, gain);
        }
    }

    /// The underlying registry, for callers that need lifecycle details
    /// beyond this façade.
    pub fn registry(&self) -> Arc<PipelineRegistry> {
        self.registry.clone()
    }
}

impl std::fmt::Debug for ControlSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlSurface")
            .field("registry", &self.registry)
            .finish()
    }
}
