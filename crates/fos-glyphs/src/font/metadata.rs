//! OpenType metadata extraction
//!
//! Reads the family/subfamily names and style axes a descriptor needs from
//! the `name`, `OS/2` and `post` tables.

use std::path::Path;

use ttf_parser::{Face, Language, Width, name_id};

use super::FontWeight;
use crate::{GlyphError, Result};

/// Font file extensions the loader accepts
const FONT_EXTENSIONS: [&str; 3] = ["otf", "ttf", "ttc"];

/// Names and style axes of one face
#[derive(Debug, Clone, PartialEq)]
pub struct FontMetadata {
    /// Typographic family if present, legacy family otherwise
    pub family: String,
    /// Typographic subfamily if present, legacy subfamily otherwise
    pub subfamily: String,
    /// Legacy (nameID 1) family
    pub legacy_family: String,
    /// Legacy (nameID 2) subfamily
    pub legacy_subfamily: String,
    pub weight: FontWeight,
    /// Width in percent of normal
    pub width: f32,
    pub is_italic: bool,
    /// Slant in degrees, counter-clockwise from vertical
    pub slant: f32,
    /// Face carries CBDT, sbix or COLR color glyphs
    pub has_color_glyphs: bool,
}

impl FontMetadata {
    /// Read metadata of face `index` in `data`
    pub fn read(data: &[u8], index: u32) -> Result<Self> {
        let face = Face::parse(data, index).map_err(|e| GlyphError::FontParsing(e.to_string()))?;
        Ok(Self::from_face(&face))
    }

    /// Read metadata of every face in a file, one entry for plain fonts
    pub fn read_all(data: &[u8]) -> Result<Vec<Self>> {
        let count = ttf_parser::fonts_in_collection(data).unwrap_or(1);
        (0..count).map(|index| Self::read(data, index)).collect()
    }

    pub fn from_face(face: &Face<'_>) -> Self {
        let legacy_family = find_name(face, name_id::FAMILY).unwrap_or_default();
        let legacy_subfamily =
            find_name(face, name_id::SUBFAMILY).unwrap_or_else(|| "Regular".to_string());
        let family = find_name(face, name_id::TYPOGRAPHIC_FAMILY).unwrap_or_else(|| legacy_family.clone());
        let subfamily =
            find_name(face, name_id::TYPOGRAPHIC_SUBFAMILY).unwrap_or_else(|| legacy_subfamily.clone());

        let tables = face.tables();
        let slant = tables.post.map(|post| post.italic_angle).unwrap_or(0.0);
        let has_color_glyphs = tables.cbdt.is_some() || tables.sbix.is_some() || tables.colr.is_some();

        Self {
            family,
            subfamily,
            legacy_family,
            legacy_subfamily,
            weight: FontWeight::from(face.weight().to_number()),
            width: width_class_to_percent(face.width()),
            is_italic: face.is_italic(),
            slant,
            has_color_glyphs,
        }
    }

    /// True when this face answers to the family/subfamily pair, typographic or legacy
    pub fn matches(&self, family: &str, subfamily: &str) -> bool {
        let family_ok = self.family.eq_ignore_ascii_case(family) || self.legacy_family.eq_ignore_ascii_case(family);
        let subfamily_ok = subfamily.is_empty()
            || self.subfamily.eq_ignore_ascii_case(subfamily)
            || self.legacy_subfamily.eq_ignore_ascii_case(subfamily);
        family_ok && subfamily_ok
    }
}

/// Map an OS/2 width class to percent of normal
pub fn width_class_to_percent(width: Width) -> f32 {
    match width {
        Width::UltraCondensed => 50.0,
        Width::ExtraCondensed => 62.5,
        Width::Condensed => 75.0,
        Width::SemiCondensed => 87.5,
        Width::Normal => 100.0,
        Width::SemiExpanded => 112.5,
        Width::Expanded => 125.0,
        Width::ExtraExpanded => 150.0,
        Width::UltraExpanded => 200.0,
    }
}

/// Reject paths that are not `.otf`, `.ttf` or `.ttc`
pub fn check_font_extension(path: &Path) -> Result<()> {
    let supported = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| FONT_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)));

    if supported {
        Ok(())
    } else {
        Err(GlyphError::UnsupportedFontFileExtension(path.to_path_buf()))
    }
}

/// First decodable name with this ID, preferring US English records
fn find_name(face: &Face<'_>, id: u16) -> Option<String> {
    let mut fallback = None;
    for name in face.names() {
        if name.name_id != id {
            continue;
        }
        let Some(text) = name.to_string() else { continue };
        if name.language() == Language::English_UnitedStates {
            return Some(text);
        }
        fallback.get_or_insert(text);
    }
    fallback
}
