//! Font identity, description and loading module

mod descriptor;
mod face;
mod identity;
mod loader;
mod metadata;

pub use descriptor::{FontDescriptor, SAMPLING_BITMAP_RANGE, SAMPLING_SDF_RANGE};
pub use face::{CoverageMask, FontHandle, GlyphExtents, GlyphSource};
pub use identity::{FontIdentity, family_hash, resolve};
pub use loader::{FontLoader, FontOpener, OpenedFont};
pub use metadata::{FontMetadata, check_font_extension, width_class_to_percent};

/// Font weight (100-900)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(from = "u16", into = "u16")]
pub struct FontWeight(u16);

impl FontWeight {
    pub const THIN: FontWeight = FontWeight(100);
    pub const EXTRA_LIGHT: FontWeight = FontWeight(200);
    pub const LIGHT: FontWeight = FontWeight(300);
    pub const NORMAL: FontWeight = FontWeight(400);
    pub const MEDIUM: FontWeight = FontWeight(500);
    pub const SEMI_BOLD: FontWeight = FontWeight(600);
    pub const BOLD: FontWeight = FontWeight(700);
    pub const EXTRA_BOLD: FontWeight = FontWeight(800);
    pub const BLACK: FontWeight = FontWeight(900);

    /// Numeric weight, always one of the nine hundred-steps
    pub fn value(self) -> u16 {
        self.0
    }
}

impl Default for FontWeight {
    fn default() -> Self {
        FontWeight::NORMAL
    }
}

impl From<u16> for FontWeight {
    /// Snaps to the nearest hundred-step, so `usWeightClass` values like 350 still map
    fn from(value: u16) -> Self {
        let snapped = ((value.clamp(100, 900) + 50) / 100) * 100;
        FontWeight(snapped.min(900))
    }
}

impl From<FontWeight> for u16 {
    fn from(weight: FontWeight) -> Self {
        weight.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weight_snapping() {
        assert_eq!(FontWeight::from(400), FontWeight::NORMAL);
        assert_eq!(FontWeight::from(350), FontWeight::NORMAL);
        assert_eq!(FontWeight::from(349), FontWeight::LIGHT);
        assert_eq!(FontWeight::from(0), FontWeight::THIN);
        assert_eq!(FontWeight::from(1000), FontWeight::BLACK);
        assert_eq!(FontWeight::from(880), FontWeight::BLACK);
    }
}
