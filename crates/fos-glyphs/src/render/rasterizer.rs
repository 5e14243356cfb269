//! Glyph outline rasterization

use tiny_skia::{FillRule, Paint, Pixmap, Transform};
use ttf_parser::{Face, GlyphId, OutlineBuilder};

use crate::font::{CoverageMask, GlyphExtents};

/// Fill a glyph outline into a coverage mask sized to `extents`.
///
/// `scale` converts font units to pixels. Returns `None` when the glyph has
/// no outline or the extents are empty.
pub fn rasterize_outline(
    face: &Face<'_>,
    glyph: GlyphId,
    scale: f32,
    extents: &GlyphExtents,
) -> Option<CoverageMask> {
    if extents.is_empty() {
        return None;
    }

    let mut builder = PathBuilder::new(scale, extents.x_bearing as f32, extents.y_bearing as f32);
    face.outline_glyph(glyph, &mut builder)?;
    let path = builder.finish()?;

    let mut pixmap = Pixmap::new(extents.width, extents.height)?;

    let mut paint = Paint::default();
    paint.set_color(tiny_skia::Color::WHITE);
    paint.anti_alias = true;

    pixmap.fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);

    Some(CoverageMask {
        width: extents.width,
        height: extents.height,
        data: pixmap.pixels().iter().map(|p| p.alpha()).collect(),
    })
}

/// Glyph outline in font units with y pointing down
pub(crate) fn outline_path(face: &Face<'_>, glyph: GlyphId) -> Option<tiny_skia::Path> {
    let mut builder = PathBuilder::new(1.0, 0.0, 0.0);
    face.outline_glyph(glyph, &mut builder)?;
    builder.finish()
}

/// Converts ttf-parser outlines to tiny-skia paths in ink-box pixel space
struct PathBuilder {
    builder: tiny_skia::PathBuilder,
    scale: f32,
    /// Left edge of the ink box in pixels
    origin_x: f32,
    /// Top edge of the ink box in pixels, y up
    origin_y: f32,
}

impl PathBuilder {
    fn new(scale: f32, origin_x: f32, origin_y: f32) -> Self {
        Self {
            builder: tiny_skia::PathBuilder::new(),
            scale,
            origin_x,
            origin_y,
        }
    }

    fn tx(&self, x: f32) -> f32 {
        x * self.scale - self.origin_x
    }

    fn ty(&self, y: f32) -> f32 {
        self.origin_y - y * self.scale // flip Y
    }

    fn finish(self) -> Option<tiny_skia::Path> {
        self.builder.finish()
    }
}

impl OutlineBuilder for PathBuilder {
    fn move_to(&mut self, x: f32, y: f32) {
        self.builder.move_to(self.tx(x), self.ty(y));
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.builder.line_to(self.tx(x), self.ty(y));
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        self.builder.quad_to(self.tx(x1), self.ty(y1), self.tx(x), self.ty(y));
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        self.builder.cubic_to(
            self.tx(x1), self.ty(y1),
            self.tx(x2), self.ty(y2),
            self.tx(x), self.ty(y),
        );
    }

    fn close(&mut self) {
        self.builder.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_builder_flips_y() {
        let builder = PathBuilder::new(0.5, 10.0, 40.0);
        assert_eq!(builder.tx(20.0), 0.0);
        assert_eq!(builder.ty(80.0), 0.0);
        assert_eq!(builder.ty(0.0), 40.0);
    }
}
