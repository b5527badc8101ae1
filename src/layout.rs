//! Service tiers and band layouts.

/// Service level, determining band count and pipeline concurrency limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tier {
    /// Single shared pipeline, 6 bands.
    #[default]
    Free,
    /// Independent pipeline per source, 15 bands.
    Premium,
}

impl Tier {
    /// Returns how many pipelines may be active at once, or `None` for
    /// unbounded.
    #[must_use]
    pub fn capacity(&self) -> Option<usize> {
        match self {
            Self::Free => Some(1),
            Self::Premium => None,
        }
    }

    /// Returns `true` for the premium tier.
    #[must_use]
    pub fn is_premium(&self) -> bool {
        matches!(self, Self::Premium)
    }
}

impl From<bool> for Tier {
    fn from(is_premium: bool) -> Self {
        if is_premium {
            Self::Premium
        } else {
            Self::Free
        }
    }
}

/// Center frequencies for the free tier's 6-band equalizer.
pub const FREE_BAND_FREQUENCIES: [f32; 6] = [60.0, 170.0, 350.0, 1000.0, 3500.0, 10000.0];

/// Center frequencies for the premium tier's 15-band equalizer.
pub const PREMIUM_BAND_FREQUENCIES: [f32; 15] = [
    20.0, 40.0, 60.0, 100.0, 170.0, 250.0, 350.0, 500.0, 1000.0, 2000.0, 3500.0, 5000.0, 7000.0,
    10000.0, 16000.0,
];

/// An ordered sequence of peaking-filter center frequencies.
///
/// A layout is fixed once a pipeline is built from it; switching a source
/// to a different layout means rebuilding that source's pipeline.
///
/// # Example
///
/// ```
/// use tab_eq::{BandLayout, Tier};
///
/// assert_eq!(BandLayout::for_tier(Tier::Free).len(), 6);
/// assert_eq!(BandLayout::for_tier(Tier::Premium).len(), 15);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct BandLayout {
    frequencies: Vec<f32>,
}

impl BandLayout {
    /// Returns the standard layout for a tier.
    #[must_use]
    pub fn for_tier(tier: Tier) -> Self {
        match tier {
            Tier::Free => Self {
                frequencies: FREE_BAND_FREQUENCIES.to_vec(),
            },
            Tier::Premium => Self {
                frequencies: PREMIUM_BAND_FREQUENCIES.to_vec(),
            },
        }
    }

    /// Creates a layout from arbitrary center frequencies, in order.
    ///
    /// Emptiness is not checked here; [`FilterBank::build`] rejects empty
    /// layouts with [`TabEqError::InvalidLayout`].
    ///
    /// [`FilterBank::build`]: crate::dsp::FilterBank::build
    /// [`TabEqError::InvalidLayout`]: crate::TabEqError::InvalidLayout
    pub fn custom(frequencies: impl Into<Vec<f32>>) -> Self {
        Self {
            frequencies: frequencies.into(),
        }
    }

    /// Number of bands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    /// Returns `true` if the layout has no bands.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }

    /// Center frequencies in chain order.
    #[must_use]
    pub fn frequencies(&self) -> &[f32] {
        &self.frequencies
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_capacity() {
        assert_eq!(Tier::Free.capacity(), Some(1));
        assert_eq!(Tier::Premium.capacity(), None);
    }

    #[test]
    fn test_tier_from_bool() {
        assert_eq!(Tier::from(false), Tier::Free);
        assert_eq!(Tier::from(true), Tier::Premium);
        assert!(Tier::Premium.is_premium());
    }

    #[test]
    fn test_free_layout() {
        let layout = BandLayout::for_tier(Tier::Free);
        assert_eq!(layout.len(), 6);
        assert_eq!(layout.frequencies()[0], 60.0);
        assert_eq!(layout.frequencies()[5], 10000.0);
    }

    #[test]
    fn test_premium_layout() {
        let layout = BandLayout::for_tier(Tier::Premium);
        assert_eq!(layout.len(), 15);
        assert_eq!(layout.frequencies()[0], 20.0);
        assert_eq!(layout.frequencies()[14], 16000.0);
    }

    #[test]
    fn test_layout_order_is_ascending() {
        for tier in [Tier::Free, Tier::Premium] {
            let layout = BandLayout::for_tier(tier);
            let mut sorted = layout.frequencies().to_vec();
            sorted.sort_by(f32::total_cmp);
            assert_eq!(sorted, layout.frequencies());
        }
    }

    #[test]
    fn test_custom_layout() {
        let layout = BandLayout::custom(vec![100.0, 1000.0]);
        assert_eq!(layout.len(), 2);
        assert!(!layout.is_empty());
        assert!(BandLayout::custom(Vec::new()).is_empty());
    }
}
