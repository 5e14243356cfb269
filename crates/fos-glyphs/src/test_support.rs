//! Deterministic glyph sources for unit tests

use std::collections::HashMap;
use std::sync::Arc;

use crate::atlas::TextureKind;
use crate::font::{CoverageMask, FontDescriptor, FontOpener, GlyphExtents, GlyphSource, OpenedFont};
use crate::{GlyphError, Result};

/// Glyph IDs at or above this are unknown to [`BoxGlyphs`]
pub const UNKNOWN_GLYPH: u32 = 10_000;

/// Glyph ID with no ink
pub const SPACE_GLYPH: u32 = 3;

/// Every glyph is a solid box whose size depends on its ID only
#[derive(Debug, Clone, Copy, Default)]
pub struct BoxGlyphs {
    pub color: bool,
}

impl BoxGlyphs {
    pub fn size_of(glyph_id: u32) -> (u32, u32) {
        (4 + glyph_id % 7, 6 + glyph_id % 5)
    }
}

impl GlyphSource for BoxGlyphs {
    fn glyph_extents(&self, glyph_id: u32, _size: f32) -> Option<GlyphExtents> {
        if glyph_id >= UNKNOWN_GLYPH {
            return None;
        }
        if glyph_id == SPACE_GLYPH {
            return Some(GlyphExtents::default());
        }
        let (width, height) = Self::size_of(glyph_id);
        Some(GlyphExtents { x_bearing: 1, y_bearing: height as i32, width, height })
    }

    fn coverage_mask(&self, glyph_id: u32, size: f32) -> Option<CoverageMask> {
        let extents = self.glyph_extents(glyph_id, size)?;
        if extents.is_empty() {
            return None;
        }
        let mut mask = CoverageMask::new(extents.width, extents.height);
        mask.data.fill(255);
        Some(mask)
    }

    fn has_color_glyphs(&self) -> bool {
        self.color
    }
}

/// Opener serving [`BoxGlyphs`] for known families and failing for the rest
#[derive(Debug, Default)]
pub struct StubOpener {
    pub families: HashMap<String, bool>,
    pub opened: Vec<String>,
}

impl StubOpener {
    pub fn with_family(mut self, family: &str, color: bool) -> Self {
        self.families.insert(family.to_string(), color);
        self
    }
}

impl FontOpener for StubOpener {
    fn open(&mut self, descriptor: &FontDescriptor) -> Result<OpenedFont> {
        self.opened.push(descriptor.family.clone());
        match self.families.get(&descriptor.family) {
            Some(&color) => {
                let kind = if color { TextureKind::Bitmap } else { TextureKind::Sdf };
                Ok(OpenedFont::with_kind(Arc::new(BoxGlyphs { color }), kind))
            }
            None => Err(GlyphError::FontFileNotFound(descriptor.content_path.clone())),
        }
    }
}
