//! Opened font handle and the glyph source boundary

use std::sync::Arc;

use tiny_skia::{FilterQuality, Pixmap, PixmapPaint, PremultipliedColorU8, Transform};
use ttf_parser::{Face, GlyphId, RasterImageFormat};

use super::FontMetadata;
use crate::render::{paint_color_layers, rasterize_outline};
use crate::shaping::{ShapedRun, TextShaper};
use crate::{GlyphError, Result};

/// Ink box of a glyph in pixels at a given sampling size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GlyphExtents {
    /// Left edge relative to the pen position
    pub x_bearing: i32,
    /// Top edge relative to the baseline (positive is up)
    pub y_bearing: i32,
    pub width: u32,
    pub height: u32,
}

impl GlyphExtents {
    /// Glyph has no ink (space, control glyph)
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Single channel coverage of a glyph's ink box
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageMask {
    pub width: u32,
    pub height: u32,
    /// Row-major alpha, one byte per pixel
    pub data: Vec<u8>,
}

impl CoverageMask {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height, data: vec![0; (width * height) as usize] }
    }

    /// Coverage at a pixel, zero outside the mask
    pub fn get(&self, x: u32, y: u32) -> u8 {
        if x >= self.width || y >= self.height {
            return 0;
        }
        self.data.get(y as usize * self.width as usize + x as usize).copied().unwrap_or(0)
    }

    /// Data holds exactly one byte per pixel
    pub fn is_well_formed(&self) -> bool {
        self.data.len() == self.width as usize * self.height as usize
    }

    /// White RGBA layer whose alpha is this coverage
    pub fn to_pixmap(&self) -> Option<Pixmap> {
        let mut pixmap = Pixmap::new(self.width, self.height)?;
        for (pixel, &alpha) in pixmap.pixels_mut().iter_mut().zip(&self.data) {
            *pixel = PremultipliedColorU8::from_rgba(alpha, alpha, alpha, alpha)?;
        }
        Some(pixmap)
    }
}

/// What the atlas updater needs from a shaping library.
///
/// Implementations must be usable from worker threads: extents and
/// rasterization of different font resources run concurrently.
pub trait GlyphSource: Send + Sync {
    /// Ink extents of `glyph_id` at `size` pixels per em, `None` for unknown glyphs
    fn glyph_extents(&self, glyph_id: u32, size: f32) -> Option<GlyphExtents>;

    /// Coverage of the glyph outline, sized to its extents
    fn coverage_mask(&self, glyph_id: u32, size: f32) -> Option<CoverageMask>;

    /// Color layers bottom to top, each sized to the glyph extents.
    ///
    /// Outline-only glyphs produce a single white layer.
    fn color_layers(&self, glyph_id: u32, size: f32) -> Vec<Pixmap> {
        self.coverage_mask(glyph_id, size)
            .and_then(|mask| mask.to_pixmap())
            .into_iter()
            .collect()
    }

    /// Whether the font carries color glyphs and needs an RGBA atlas
    fn has_color_glyphs(&self) -> bool {
        false
    }
}

/// An opened font: its bytes, face index and parsed metadata
#[derive(Debug, Clone)]
pub struct FontHandle {
    data: Arc<Vec<u8>>,
    index: u32,
    metadata: FontMetadata,
}

impl FontHandle {
    /// Open face `index` of the given font bytes
    pub fn from_bytes(data: Vec<u8>, index: u32) -> Result<Self> {
        let metadata = FontMetadata::read(&data, index)?;
        Ok(Self { data: Arc::new(data), index, metadata })
    }

    pub fn metadata(&self) -> &FontMetadata {
        &self.metadata
    }

    pub fn face_index(&self) -> u32 {
        self.index
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Shape a text run with this font
    pub fn shape(&self, shaper: &TextShaper, text: &str, font_size: f32) -> Result<ShapedRun> {
        shaper.shape_with_data(&self.data, self.index, text, font_size)
    }

    fn face(&self) -> Option<Face<'_>> {
        Face::parse(&self.data, self.index).ok()
    }

    fn scale(face: &Face<'_>, size: f32) -> f32 {
        size / face.units_per_em() as f32
    }

    /// Decode the embedded bitmap of a color glyph, scaled to its extents
    fn raster_layer(&self, face: &Face<'_>, glyph_id: u32, size: f32) -> Option<Pixmap> {
        let image = face.glyph_raster_image(GlyphId(glyph_id as u16), size.round() as u16)?;
        if image.format != RasterImageFormat::PNG {
            return None;
        }
        let source = Pixmap::decode_png(image.data).ok()?;
        let extents = self.glyph_extents(glyph_id, size)?;
        let mut layer = Pixmap::new(extents.width, extents.height)?;

        let sx = extents.width as f32 / source.width() as f32;
        let sy = extents.height as f32 / source.height() as f32;
        let paint = PixmapPaint { quality: FilterQuality::Bilinear, ..Default::default() };
        layer.draw_pixmap(0, 0, source.as_ref(), &paint, Transform::from_scale(sx, sy), None);
        Some(layer)
    }
}

impl GlyphSource for FontHandle {
    fn glyph_extents(&self, glyph_id: u32, size: f32) -> Option<GlyphExtents> {
        let face = self.face()?;
        let glyph = GlyphId(u16::try_from(glyph_id).ok()?);
        if glyph_id >= face.number_of_glyphs() as u32 {
            return None;
        }
        let scale = Self::scale(&face, size);

        if let Some(bbox) = face.glyph_bounding_box(glyph) {
            let left = (bbox.x_min as f32 * scale).floor() as i32;
            let right = (bbox.x_max as f32 * scale).ceil() as i32;
            let top = (bbox.y_max as f32 * scale).ceil() as i32;
            let bottom = (bbox.y_min as f32 * scale).floor() as i32;
            return Some(GlyphExtents {
                x_bearing: left,
                y_bearing: top,
                width: (right - left).max(0) as u32,
                height: (top - bottom).max(0) as u32,
            });
        }

        if let Some(image) = face.glyph_raster_image(glyph, size.round() as u16) {
            let image_scale = size / image.pixels_per_em.max(1) as f32;
            let width = (image.width as f32 * image_scale).ceil() as u32;
            let height = (image.height as f32 * image_scale).ceil() as u32;
            return Some(GlyphExtents {
                x_bearing: (image.x as f32 * image_scale).floor() as i32,
                y_bearing: ((image.y as f32 + image.height as f32) * image_scale).ceil() as i32,
                width,
                height,
            });
        }

        // Valid glyph without ink
        Some(GlyphExtents::default())
    }

    fn coverage_mask(&self, glyph_id: u32, size: f32) -> Option<CoverageMask> {
        let face = self.face()?;
        let extents = self.glyph_extents(glyph_id, size)?;
        if extents.is_empty() {
            return None;
        }
        rasterize_outline(&face, GlyphId(glyph_id as u16), Self::scale(&face, size), &extents)
    }

    fn color_layers(&self, glyph_id: u32, size: f32) -> Vec<Pixmap> {
        let Some(face) = self.face() else { return Vec::new() };
        if let Some(layer) = self.raster_layer(&face, glyph_id, size) {
            return vec![layer];
        }
        if let Some(extents) = self.glyph_extents(glyph_id, size) {
            let glyph = GlyphId(glyph_id as u16);
            if let Some(layers) = paint_color_layers(&face, glyph, Self::scale(&face, size), &extents) {
                return layers;
            }
        }
        self.coverage_mask(glyph_id, size)
            .and_then(|mask| mask.to_pixmap())
            .into_iter()
            .collect()
    }

    fn has_color_glyphs(&self) -> bool {
        self.metadata.has_color_glyphs
    }
}

impl TryFrom<&[u8]> for FontHandle {
    type Error = GlyphError;

    fn try_from(data: &[u8]) -> Result<Self> {
        FontHandle::from_bytes(data.to_vec(), 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_extents() {
        assert!(GlyphExtents::default().is_empty());
        assert!(GlyphExtents { width: 3, height: 0, ..Default::default() }.is_empty());
        assert!(!GlyphExtents { width: 3, height: 4, ..Default::default() }.is_empty());
    }

    #[test]
    fn test_mask_to_pixmap() {
        let mut mask = CoverageMask::new(2, 1);
        mask.data[1] = 128;
        let pixmap = mask.to_pixmap().unwrap();
        assert_eq!(pixmap.pixels()[0].alpha(), 0);
        assert_eq!(pixmap.pixels()[1].alpha(), 128);
        assert_eq!(pixmap.pixels()[1].red(), 128);
    }

    #[test]
    fn test_invalid_bytes_rejected() {
        assert!(FontHandle::from_bytes(vec![0; 16], 0).is_err());
    }
}
