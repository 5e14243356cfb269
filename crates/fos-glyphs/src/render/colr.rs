//! COLR paint graphs to RGBA layers
//!
//! Each paint fills the last outlined glyph within the current clip. Paints
//! issued outside any composite group become layers of their own,
//! bottom to top, so the atlas blends them source-over. A group collects its
//! paints and is blended with its composite mode when it is popped; a
//! top-level group with a mode other than source-over flattens the layers
//! below it first.

use tiny_skia::{
    BlendMode, Color, FillRule, GradientStop, LinearGradient, Mask, Paint, Path, Pixmap, PixmapPaint,
    Point, RadialGradient, Rect, Shader, SpreadMode, Transform,
};
use ttf_parser::colr::{self, CompositeMode, GradientExtend};
use ttf_parser::{Face, GlyphId, RgbaColor};

use super::rasterizer::outline_path;
use crate::font::GlyphExtents;

/// Palette used for every color glyph
const PALETTE: u16 = 0;

/// Paint a COLR glyph into layers sized to `extents`.
///
/// Returns `None` when the glyph has no COLR definition or paints nothing.
pub fn paint_color_layers(
    face: &Face<'_>,
    glyph: GlyphId,
    scale: f32,
    extents: &GlyphExtents,
) -> Option<Vec<Pixmap>> {
    if extents.is_empty() || !face.is_color_glyph(glyph) {
        return None;
    }
    let mut painter = LayerPainter::new(face, scale, extents)?;
    face.paint_color_glyph(glyph, PALETTE, RgbaColor::new(255, 255, 255, 255), &mut painter)?;
    let layers = painter.finish();
    (!layers.is_empty()).then_some(layers)
}

struct LayerPainter<'f, 'a> {
    face: &'f Face<'a>,
    width: u32,
    height: u32,
    /// Font units (y up) to layer pixels, COLR transforms applied
    transforms: Vec<Transform>,
    /// Last outlined glyph, already in layer pixels
    outline: Option<Path>,
    clips: Vec<Mask>,
    groups: Vec<(Pixmap, CompositeMode)>,
    layers: Vec<Pixmap>,
}

impl<'f, 'a> LayerPainter<'f, 'a> {
    fn new(face: &'f Face<'a>, scale: f32, extents: &GlyphExtents) -> Option<Self> {
        Pixmap::new(extents.width, extents.height)?;
        let device = Transform::from_row(
            scale,
            0.0,
            0.0,
            -scale,
            -extents.x_bearing as f32,
            extents.y_bearing as f32,
        );
        Some(Self {
            face,
            width: extents.width,
            height: extents.height,
            transforms: vec![device],
            outline: None,
            clips: Vec::new(),
            groups: Vec::new(),
            layers: Vec::new(),
        })
    }

    fn transform(&self) -> Transform {
        self.transforms.last().copied().unwrap_or_default()
    }

    fn blank(&self) -> Option<Pixmap> {
        Pixmap::new(self.width, self.height)
    }

    fn push_clip_path(&mut self, path: Option<Path>) {
        let mask = match (path, self.clips.last()) {
            (Some(path), Some(current)) => {
                let mut mask = current.clone();
                mask.intersect_path(&path, FillRule::Winding, true, Transform::identity());
                Some(mask)
            }
            (Some(path), None) => Mask::new(self.width, self.height).map(|mut mask| {
                mask.fill_path(&path, FillRule::Winding, true, Transform::identity());
                mask
            }),
            // nothing to clip to: everything is clipped away
            (None, _) => Mask::new(self.width, self.height),
        };
        if let Some(mask) = mask {
            self.clips.push(mask);
        }
    }

    fn shader(&self, paint: colr::Paint<'a>) -> Option<Shader<'static>> {
        let transform = self.transform();
        match paint {
            colr::Paint::Solid(color) => Some(Shader::SolidColor(to_color(color))),
            colr::Paint::LinearGradient(gradient) => {
                let stops = gradient_stops(gradient.stops(PALETTE, &[]));
                LinearGradient::new(
                    Point::from_xy(gradient.x0, gradient.y0),
                    Point::from_xy(gradient.x1, gradient.y1),
                    stops,
                    spread_mode(gradient.extend),
                    transform,
                )
            }
            colr::Paint::RadialGradient(gradient) => {
                let stops = gradient_stops(gradient.stops(PALETTE, &[]));
                RadialGradient::new(
                    Point::from_xy(gradient.x0, gradient.y0),
                    Point::from_xy(gradient.x1, gradient.y1),
                    gradient.r1,
                    stops,
                    spread_mode(gradient.extend),
                    transform,
                )
            }
            // no sweep shader in tiny-skia, the first stop stands in
            colr::Paint::SweepGradient(gradient) => gradient
                .stops(PALETTE, &[])
                .next()
                .map(|stop| Shader::SolidColor(to_color(stop.color))),
        }
    }

    /// Layers bottom to top; groups left open are closed first
    fn finish(mut self) -> Vec<Pixmap> {
        while !self.groups.is_empty() {
            self.pop_group();
        }
        self.layers
    }

    fn pop_group(&mut self) {
        let Some((group, mode)) = self.groups.pop() else { return };
        let paint = PixmapPaint { blend_mode: blend_mode(mode), ..Default::default() };

        if let Some((parent, _)) = self.groups.last_mut() {
            parent.draw_pixmap(0, 0, group.as_ref(), &paint, Transform::identity(), None);
            return;
        }
        if mode == CompositeMode::SourceOver {
            self.layers.push(group);
            return;
        }
        let Some(mut flat) = self.blank() else { return };
        for layer in self.layers.drain(..) {
            flat.draw_pixmap(0, 0, layer.as_ref(), &PixmapPaint::default(), Transform::identity(), None);
        }
        flat.draw_pixmap(0, 0, group.as_ref(), &paint, Transform::identity(), None);
        self.layers.push(flat);
    }
}

impl<'a> colr::Painter<'a> for LayerPainter<'_, 'a> {
    fn outline_glyph(&mut self, glyph_id: GlyphId) {
        // outline paths come y-flipped, the COLR transforms expect y up
        let to_pixels = self.transform().pre_concat(Transform::from_scale(1.0, -1.0));
        self.outline = outline_path(self.face, glyph_id).and_then(|path| path.transform(to_pixels));
    }

    fn paint(&mut self, paint: colr::Paint<'a>) {
        let Some(shader) = self.shader(paint) else { return };
        let paint = Paint { shader, anti_alias: true, ..Default::default() };
        let fresh = if self.groups.is_empty() { self.blank() } else { None };

        let target = match fresh {
            Some(layer) => {
                self.layers.push(layer);
                self.layers.last_mut()
            }
            None => self.groups.last_mut().map(|(group, _)| group),
        };
        let Some(target) = target else { return };
        let clip = self.clips.last();

        // the last outline is filled, within the clip
        match &self.outline {
            Some(path) => target.fill_path(path, &paint, FillRule::Winding, Transform::identity(), clip),
            None => {
                if let Some(area) = Rect::from_xywh(0.0, 0.0, self.width as f32, self.height as f32) {
                    target.fill_rect(area, &paint, Transform::identity(), clip);
                }
            }
        }
    }

    fn push_clip(&mut self) {
        let path = self.outline.clone();
        self.push_clip_path(path);
    }

    fn push_clip_box(&mut self, clipbox: colr::ClipBox) {
        let path = Rect::from_ltrb(clipbox.x_min, clipbox.y_min, clipbox.x_max, clipbox.y_max)
            .map(tiny_skia::PathBuilder::from_rect)
            .and_then(|path| path.transform(self.transform()));
        self.push_clip_path(path);
    }

    fn pop_clip(&mut self) {
        self.clips.pop();
    }

    fn push_layer(&mut self, mode: CompositeMode) {
        if let Some(group) = self.blank() {
            self.groups.push((group, mode));
        }
    }

    fn pop_layer(&mut self) {
        self.pop_group();
    }

    fn push_transform(&mut self, t: ttf_parser::Transform) {
        let next = self.transform().pre_concat(Transform::from_row(t.a, t.b, t.c, t.d, t.e, t.f));
        self.transforms.push(next);
    }

    fn pop_transform(&mut self) {
        if self.transforms.len() > 1 {
            self.transforms.pop();
        }
    }
}

fn to_color(color: RgbaColor) -> Color {
    Color::from_rgba8(color.red, color.green, color.blue, color.alpha)
}

fn gradient_stops(stops: impl Iterator<Item = colr::ColorStop>) -> Vec<GradientStop> {
    stops.map(|stop| GradientStop::new(stop.stop_offset, to_color(stop.color))).collect()
}

fn spread_mode(extend: GradientExtend) -> SpreadMode {
    match extend {
        GradientExtend::Pad => SpreadMode::Pad,
        GradientExtend::Repeat => SpreadMode::Repeat,
        GradientExtend::Reflect => SpreadMode::Reflect,
    }
}

fn blend_mode(mode: CompositeMode) -> BlendMode {
    match mode {
        CompositeMode::Clear => BlendMode::Clear,
        CompositeMode::Source => BlendMode::Source,
        CompositeMode::Destination => BlendMode::Destination,
        CompositeMode::SourceOver => BlendMode::SourceOver,
        CompositeMode::DestinationOver => BlendMode::DestinationOver,
        CompositeMode::SourceIn => BlendMode::SourceIn,
        CompositeMode::DestinationIn => BlendMode::DestinationIn,
        CompositeMode::SourceOut => BlendMode::SourceOut,
        CompositeMode::DestinationOut => BlendMode::DestinationOut,
        CompositeMode::SourceAtop => BlendMode::SourceAtop,
        CompositeMode::DestinationAtop => BlendMode::DestinationAtop,
        CompositeMode::Xor => BlendMode::Xor,
        CompositeMode::Plus => BlendMode::Plus,
        CompositeMode::Screen => BlendMode::Screen,
        CompositeMode::Overlay => BlendMode::Overlay,
        CompositeMode::Darken => BlendMode::Darken,
        CompositeMode::Lighten => BlendMode::Lighten,
        CompositeMode::ColorDodge => BlendMode::ColorDodge,
        CompositeMode::ColorBurn => BlendMode::ColorBurn,
        CompositeMode::HardLight => BlendMode::HardLight,
        CompositeMode::SoftLight => BlendMode::SoftLight,
        CompositeMode::Difference => BlendMode::Difference,
        CompositeMode::Exclusion => BlendMode::Exclusion,
        CompositeMode::Multiply => BlendMode::Multiply,
        CompositeMode::Hue => BlendMode::Hue,
        CompositeMode::Saturation => BlendMode::Saturation,
        CompositeMode::Color => BlendMode::Color,
        CompositeMode::Luminosity => BlendMode::Luminosity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blend_modes_map_by_name() {
        assert_eq!(blend_mode(CompositeMode::SourceOver), BlendMode::SourceOver);
        assert_eq!(blend_mode(CompositeMode::DestinationOver), BlendMode::DestinationOver);
        assert_eq!(blend_mode(CompositeMode::Xor), BlendMode::Xor);
    }

    #[test]
    fn test_spread_modes() {
        assert_eq!(spread_mode(GradientExtend::Repeat), SpreadMode::Repeat);
        assert_eq!(spread_mode(GradientExtend::Reflect), SpreadMode::Reflect);
    }
}
