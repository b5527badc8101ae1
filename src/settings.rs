//! Per-source settings records and the preset catalog.
//!
//! Settings are typed records, not open-ended key/value bags: the fields a
//! source can carry are exactly the ones below. Persistence itself belongs
//! to an external collaborator; these types only define the shape that
//! crosses the transport boundary, hence the serde derives.

use serde::{Deserialize, Serialize};

use crate::layout::FREE_BAND_FREQUENCIES;
use crate::BandLayout;

/// A named gain curve.
///
/// Curves are authored against the 6-band free layout and resolved onto
/// whatever layout a pipeline actually runs via nearest-frequency mapping,
/// so the same preset is usable on both tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Preset {
    /// All bands at 0 dB.
    Flat,
    /// Boosted mids.
    Vocal,
    /// Boosted high-mids.
    Guitar,
    /// Gentle bass boost.
    BassLight,
    /// User-defined curve; gains live in [`SourceSettings::band_gains`].
    Custom,
    /// Balanced studio curve (premium).
    Studio,
    /// Heavy bass (premium).
    BassPro,
    /// Footsteps and explosions (premium).
    Gaming,
    /// V-shape immersion (premium).
    Cinema,
    /// Punchy dance curve (premium).
    Edm,
    /// Voice focus (premium).
    Podcast,
}

impl Preset {
    /// Every preset, free tier first.
    pub const ALL: [Preset; 11] = [
        Preset::Flat,
        Preset::Vocal,
        Preset::Guitar,
        Preset::BassLight,
        Preset::Custom,
        Preset::Studio,
        Preset::BassPro,
        Preset::Gaming,
        Preset::Cinema,
        Preset::Edm,
        Preset::Podcast,
    ];

    /// Returns `true` if the preset is gated behind the premium tier.
    #[must_use]
    pub fn requires_premium(&self) -> bool {
        !matches!(
            self,
            Preset::Flat | Preset::Vocal | Preset::Guitar | Preset::BassLight | Preset::Custom
        )
    }

    /// The reference curve in dB, one value per free-layout band.
    #[must_use]
    pub fn reference_gains(&self) -> [f32; 6] {
        match self {
            Preset::Flat | Preset::Custom => [0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            Preset::Vocal => [-2.0, 2.0, 4.0, 3.0, 1.0, 0.0],
            Preset::Guitar => [-1.0, 1.0, 3.0, 4.0, 2.0, 0.0],
            Preset::BassLight => [4.0, 2.0, 0.0, 0.0, 0.0, 0.0],
            Preset::Studio => [1.0, 2.0, -1.0, 2.0, 4.0, 2.0],
            Preset::BassPro => [8.0, 5.0, 1.0, 0.0, 0.0, 0.0],
            Preset::Gaming => [4.0, 2.0, -2.0, 3.0, 5.0, 4.0],
            Preset::Cinema => [5.0, 3.0, 0.0, 1.0, 3.0, 5.0],
            Preset::Edm => [6.0, 4.0, -1.0, 2.0, 4.0, 3.0],
            Preset::Podcast => [-2.0, 3.0, 5.0, 2.0, -1.0, -2.0],
        }
    }

    /// Resolves the curve onto a layout: each band takes the gain of the
    /// nearest reference frequency (compared on a log scale, since bands
    /// are octave-ish spaced).
    #[must_use]
    pub fn gains_for(&self, layout: &BandLayout) -> Vec<f32> {
        let reference = self.reference_gains();
        layout
            .frequencies()
            .iter()
            .map(|&frequency| {
                let nearest = FREE_BAND_FREQUENCIES
                    .iter()
                    .enumerate()
                    .min_by(|(_, a), (_, b)| {
                        let da = (frequency.ln() - a.ln()).abs();
                        let db = (frequency.ln() - b.ln()).abs();
                        da.total_cmp(&db)
                    })
                    .map(|(index, _)| index)
                    .unwrap_or(0);
                reference[nearest]
            })
            .collect()
    }
}

/// The settings a source carries across activations.
///
/// Typed fields only; an unknown setting is a schema change, not a new
/// map key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSettings {
    /// Per-band gains in dB, in layout order.
    pub band_gains: Vec<f32>,
    /// Master gain multiplier (1.0 = unity).
    pub master_volume: f32,
    /// Active preset, if the gains came from one.
    pub preset: Option<Preset>,
}

impl SourceSettings {
    /// Flat settings for a layout.
    #[must_use]
    pub fn flat(layout: &BandLayout) -> Self {
        Self {
            band_gains: vec![0.0; layout.len()],
            master_volume: 1.0,
            preset: Some(Preset::Flat),
        }
    }

    /// Settings carrying a preset's curve resolved onto a layout.
    #[must_use]
    pub fn from_preset(preset: Preset, layout: &BandLayout) -> Self {
        Self {
            band_gains: preset.gains_for(layout),
            master_volume: 1.0,
            preset: Some(preset),
        }
    }
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self::flat(&BandLayout::for_tier(crate::Tier::Free))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Tier;

    #[test]
    fn test_free_presets_are_not_gated() {
        for preset in [
            Preset::Flat,
            Preset::Vocal,
            Preset::Guitar,
            Preset::BassLight,
            Preset::Custom,
        ] {
            assert!(!preset.requires_premium(), "{preset:?} should be free");
        }
        assert!(Preset::Studio.requires_premium());
        assert!(Preset::BassPro.requires_premium());
    }

    #[test]
    fn test_gains_for_free_layout_is_reference_curve() {
        let layout = BandLayout::for_tier(Tier::Free);
        assert_eq!(
            Preset::Vocal.gains_for(&layout),
            Preset::Vocal.reference_gains().to_vec()
        );
    }

    #[test]
    fn test_gains_for_premium_layout_has_fifteen_values() {
        let layout = BandLayout::for_tier(Tier::Premium);
        let gains = Preset::BassPro.gains_for(&layout);

        assert_eq!(gains.len(), 15);
        // 20Hz and 40Hz resolve to the 60Hz reference band.
        assert_eq!(gains[0], 8.0);
        assert_eq!(gains[1], 8.0);
        // 16kHz resolves to the 10kHz reference band.
        assert_eq!(gains[14], 0.0);
    }

    #[test]
    fn test_preset_serde_round_trip() {
        let json = serde_json::to_string(&Preset::BassLight).unwrap();
        assert_eq!(json, "\"bass-light\"");

        let back: Preset = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Preset::BassLight);
    }

    #[test]
    fn test_settings_serde_round_trip() {
        let settings = SourceSettings::from_preset(Preset::Cinema, &BandLayout::for_tier(Tier::Free));
        let json = serde_json::to_string(&settings).unwrap();
        let back: SourceSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(back, settings);
    }

    #[test]
    fn test_default_settings_are_flat_free() {
        let settings = SourceSettings::default();
        assert_eq!(settings.band_gains.len(), 6);
        assert!(settings.band_gains.iter().all(|&g| g == 0.0));
        assert_eq!(settings.master_volume, 1.0);
    }
}
