//! Persisted font descriptors
//!
//! A descriptor is what a content pipeline stores for every font a renderable
//! may ask for. It is resolved to a [`FontIdentity`] for deduplication and
//! handed to a [`super::FontOpener`] to actually open the font.

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{FontIdentity, FontMetadata, FontWeight};
use crate::{GlyphError, Result};

/// Allowed sampling point sizes for SDF atlases
pub const SAMPLING_SDF_RANGE: RangeInclusive<u32> = 64..=96;

/// Allowed sampling point sizes for color bitmap atlases
pub const SAMPLING_BITMAP_RANGE: RangeInclusive<u32> = 16..=256;

/// Serialized description of one font variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontDescriptor {
    /// Path of the font file, relative to the content root
    pub content_path: PathBuf,
    pub family: String,
    pub subfamily: String,
    pub weight: FontWeight,
    /// Width in percent of normal
    pub width: f32,
    pub is_italic: bool,
    /// Slant angle in degrees, informational only
    pub slant: f32,
    /// Look the font up among installed fonts instead of the content root
    pub use_system_font: bool,
    /// Point size glyphs are sampled at for SDF atlases
    pub sampling_point_size_sdf: u32,
    /// Point size glyphs are sampled at for color bitmap atlases
    pub sampling_point_size_bitmap: u32,
}

impl Default for FontDescriptor {
    fn default() -> Self {
        Self {
            content_path: PathBuf::new(),
            family: String::new(),
            subfamily: "Regular".to_string(),
            weight: FontWeight::NORMAL,
            width: 100.0,
            is_italic: false,
            slant: 0.0,
            use_system_font: false,
            sampling_point_size_sdf: 64,
            sampling_point_size_bitmap: 64,
        }
    }
}

impl FontDescriptor {
    /// Descriptor for a font file bundled under the content root
    pub fn bundled(content_path: impl Into<PathBuf>, family: &str) -> Self {
        Self {
            content_path: content_path.into(),
            family: family.to_string(),
            ..Default::default()
        }
    }

    /// Descriptor for an installed system font
    pub fn system(family: &str, subfamily: &str) -> Self {
        Self {
            family: family.to_string(),
            subfamily: subfamily.to_string(),
            use_system_font: true,
            ..Default::default()
        }
    }

    /// Describe a font file, reading its names and style axes.
    ///
    /// `content_path` is stored relative to `content_root`.
    pub fn from_font_file(content_root: &Path, content_path: impl Into<PathBuf>) -> Result<Self> {
        let content_path = content_path.into();
        let full_path = content_root.join(&content_path);
        super::check_font_extension(&full_path)?;
        if !full_path.is_file() {
            return Err(GlyphError::FontFileNotFound(full_path));
        }

        let data = std::fs::read(&full_path)?;
        let metadata = FontMetadata::read(&data, 0)?;
        Ok(Self::from_metadata(content_path, &metadata))
    }

    /// Descriptor filled from parsed font metadata
    pub fn from_metadata(content_path: PathBuf, metadata: &FontMetadata) -> Self {
        Self {
            content_path,
            family: metadata.family.clone(),
            subfamily: metadata.subfamily.clone(),
            weight: metadata.weight,
            width: metadata.width,
            is_italic: metadata.is_italic,
            slant: metadata.slant,
            ..Default::default()
        }
    }

    pub fn with_weight(mut self, weight: FontWeight) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_italic(mut self, is_italic: bool) -> Self {
        self.is_italic = is_italic;
        self
    }

    pub fn with_sampling(mut self, sdf: u32, bitmap: u32) -> Self {
        self.sampling_point_size_sdf = sdf;
        self.sampling_point_size_bitmap = bitmap;
        self
    }

    /// Identity this descriptor deduplicates under
    pub fn identity(&self) -> FontIdentity {
        FontIdentity::new(&self.family, self.weight, self.width, self.is_italic)
    }

    /// SDF sampling size clamped to [`SAMPLING_SDF_RANGE`]
    pub fn sdf_sampling(&self) -> u32 {
        self.sampling_point_size_sdf
            .clamp(*SAMPLING_SDF_RANGE.start(), *SAMPLING_SDF_RANGE.end())
    }

    /// Bitmap sampling size clamped to [`SAMPLING_BITMAP_RANGE`]
    pub fn bitmap_sampling(&self) -> u32 {
        self.sampling_point_size_bitmap
            .clamp(*SAMPLING_BITMAP_RANGE.start(), *SAMPLING_BITMAP_RANGE.end())
    }

    /// Load a descriptor set persisted as JSON
    pub fn load_set(path: &Path) -> Result<Vec<FontDescriptor>> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| GlyphError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Persist a descriptor set as JSON
    pub fn save_set(path: &Path, descriptors: &[FontDescriptor]) -> Result<()> {
        let text = serde_json::to_string_pretty(descriptors)
            .map_err(|e| GlyphError::Config(e.to_string()))?;
        std::fs::write(path, text)?;
        Ok(())
    }
}
