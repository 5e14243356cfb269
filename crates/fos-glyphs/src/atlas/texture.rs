//! Atlas texture storage
//!
//! CPU side copy of one font resource's atlas. Writes accumulate a dirty
//! region which the GPU boundary uploads in one go per pass.

use std::path::Path;

use tiny_skia::{BlendMode, Pixmap, PixmapPaint, PremultipliedColorU8, Transform};

use super::AtlasRect;
use crate::{GlyphError, Result};

/// Texture format of an atlas, fixed for the lifetime of a font resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureKind {
    /// Single channel signed distance field
    Sdf,
    /// Premultiplied RGBA for color glyphs
    Bitmap,
}

#[derive(Debug, Clone)]
enum Storage {
    Sdf(Vec<u8>),
    Bitmap(Pixmap),
}

/// One atlas texture
#[derive(Debug, Clone)]
pub struct AtlasTexture {
    width: u32,
    height: u32,
    storage: Storage,
    dirty: Option<AtlasRect>,
}

impl AtlasTexture {
    /// Allocate a cleared texture
    pub fn new(kind: TextureKind, width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(GlyphError::Config(format!("atlas size {width}x{height}")));
        }
        let storage = match kind {
            TextureKind::Sdf => Storage::Sdf(vec![0; width as usize * height as usize]),
            TextureKind::Bitmap => Storage::Bitmap(
                Pixmap::new(width, height)
                    .ok_or_else(|| GlyphError::Config(format!("atlas size {width}x{height}")))?,
            ),
        };
        Ok(Self { width, height, storage, dirty: None })
    }

    pub fn kind(&self) -> TextureKind {
        match self.storage {
            Storage::Sdf(_) => TextureKind::Sdf,
            Storage::Bitmap(_) => TextureKind::Bitmap,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Copy a distance field block into an SDF atlas at `rect`
    pub fn write_sdf(&mut self, rect: AtlasRect, data: &[u8]) {
        let Storage::Sdf(pixels) = &mut self.storage else {
            tracing::warn!("SDF write into a bitmap atlas ignored");
            return;
        };
        let stride = rect.width as usize;
        let rect = clip(rect, self.width, self.height);
        let row_len = rect.width as usize;
        for row in 0..rect.height as usize {
            let src = row * stride;
            let Some(src_row) = data.get(src..src + row_len) else { break };
            let dst = (rect.y as usize + row) * self.width as usize + rect.x as usize;
            pixels[dst..dst + row_len].copy_from_slice(src_row);
        }
        self.mark_dirty(rect);
    }

    /// Alpha-blend a color layer over whatever the bitmap atlas holds at `(x, y)`
    pub fn composite(&mut self, x: u32, y: u32, layer: &Pixmap) {
        let Storage::Bitmap(pixmap) = &mut self.storage else {
            tracing::warn!("color layer composited into an SDF atlas ignored");
            return;
        };
        let paint = PixmapPaint { blend_mode: BlendMode::SourceOver, ..Default::default() };
        pixmap.draw_pixmap(x as i32, y as i32, layer.as_ref(), &paint, Transform::identity(), None);
        let rect = clip(AtlasRect::new(x, y, layer.width(), layer.height()), self.width, self.height);
        self.mark_dirty(rect);
    }

    /// Wipe every texel, marking the whole texture dirty
    pub fn clear(&mut self) {
        match &mut self.storage {
            Storage::Sdf(pixels) => pixels.fill(0),
            Storage::Bitmap(pixmap) => pixmap.fill(tiny_skia::Color::TRANSPARENT),
        }
        self.dirty = Some(AtlasRect::new(0, 0, self.width, self.height));
    }

    /// Region written since the last [`AtlasTexture::take_dirty`]
    pub fn dirty_region(&self) -> Option<AtlasRect> {
        self.dirty
    }

    /// Hand the dirty region to an upload and mark the texture clean
    pub fn take_dirty(&mut self) -> Option<AtlasRect> {
        self.dirty.take()
    }

    /// Coverage or alpha of a texel
    pub fn alpha_at(&self, x: u32, y: u32) -> u8 {
        match &self.storage {
            Storage::Sdf(pixels) => self.sdf_index(x, y).and_then(|i| pixels.get(i)).copied().unwrap_or(0),
            Storage::Bitmap(pixmap) => pixmap.pixel(x, y).map(|p| p.alpha()).unwrap_or(0),
        }
    }

    /// Premultiplied RGBA of a texel, SDF values are returned as gray
    pub fn rgba_at(&self, x: u32, y: u32) -> [u8; 4] {
        match &self.storage {
            Storage::Sdf(pixels) => match self.sdf_index(x, y).and_then(|i| pixels.get(i)) {
                Some(&v) => [v, v, v, 255],
                None => [0; 4],
            },
            Storage::Bitmap(pixmap) => pixmap
                .pixel(x, y)
                .map(|p| [p.red(), p.green(), p.blue(), p.alpha()])
                .unwrap_or([0; 4]),
        }
    }

    /// Raw texels: one byte per pixel for SDF, premultiplied RGBA for bitmaps
    pub fn data(&self) -> &[u8] {
        match &self.storage {
            Storage::Sdf(pixels) => pixels,
            Storage::Bitmap(pixmap) => pixmap.data(),
        }
    }

    /// Write the atlas as a PNG for inspection
    pub fn save_png(&self, path: &Path) -> Result<()> {
        let encoded = match &self.storage {
            Storage::Bitmap(pixmap) => pixmap.encode_png(),
            Storage::Sdf(pixels) => {
                let mut gray = Pixmap::new(self.width, self.height)
                    .ok_or_else(|| GlyphError::Config("empty atlas".into()))?;
                for (dst, &v) in gray.pixels_mut().iter_mut().zip(pixels) {
                    if let Some(color) = PremultipliedColorU8::from_rgba(v, v, v, 255) {
                        *dst = color;
                    }
                }
                gray.encode_png()
            }
        }
        .map_err(|e| GlyphError::Io(std::io::Error::other(e.to_string())))?;

        std::fs::write(path, encoded)?;
        Ok(())
    }

    fn sdf_index(&self, x: u32, y: u32) -> Option<usize> {
        (x < self.width && y < self.height).then(|| y as usize * self.width as usize + x as usize)
    }

    fn mark_dirty(&mut self, rect: AtlasRect) {
        if rect.is_empty() {
            return;
        }
        self.dirty = Some(match self.dirty {
            Some(dirty) => dirty.union(&rect),
            None => rect,
        });
    }
}

fn clip(rect: AtlasRect, width: u32, height: u32) -> AtlasRect {
    let x = rect.x.min(width);
    let y = rect.y.min(height);
    AtlasRect::new(x, y, rect.width.min(width - x), rect.height.min(height - y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sdf_write_and_dirty() {
        let mut texture = AtlasTexture::new(TextureKind::Sdf, 16, 16).unwrap();
        assert_eq!(texture.dirty_region(), None);

        texture.write_sdf(AtlasRect::new(2, 3, 2, 2), &[1, 2, 3, 4]);
        texture.write_sdf(AtlasRect::new(10, 10, 1, 1), &[9]);

        assert_eq!(texture.alpha_at(2, 3), 1);
        assert_eq!(texture.alpha_at(3, 4), 4);
        assert_eq!(texture.alpha_at(10, 10), 9);
        assert_eq!(texture.take_dirty(), Some(AtlasRect::new(2, 3, 9, 8)));
        assert_eq!(texture.take_dirty(), None);
    }

    #[test]
    fn test_sdf_write_is_clipped() {
        let mut texture = AtlasTexture::new(TextureKind::Sdf, 4, 4).unwrap();
        texture.write_sdf(AtlasRect::new(3, 3, 2, 2), &[7, 7, 7, 7]);
        assert_eq!(texture.alpha_at(3, 3), 7);
        assert_eq!(texture.dirty_region(), Some(AtlasRect::new(3, 3, 1, 1)));
    }

    #[test]
    fn test_composite_blends_layers() {
        let mut texture = AtlasTexture::new(TextureKind::Bitmap, 8, 8).unwrap();

        let mut red = Pixmap::new(2, 2).unwrap();
        red.fill(tiny_skia::Color::from_rgba8(255, 0, 0, 255));
        let mut half_blue = Pixmap::new(2, 2).unwrap();
        half_blue.fill(tiny_skia::Color::from_rgba8(0, 0, 255, 128));

        texture.composite(1, 1, &red);
        texture.composite(1, 1, &half_blue);

        let [r, g, b, a] = texture.rgba_at(1, 1);
        assert_eq!(a, 255);
        assert_eq!(g, 0);
        assert!(r > 100 && r < 140, "red {r}");
        assert!(b > 100 && b < 140, "blue {b}");
        assert_eq!(texture.rgba_at(0, 0), [0, 0, 0, 0]);
    }

    #[test]
    fn test_wrong_kind_write_is_ignored() {
        let mut texture = AtlasTexture::new(TextureKind::Bitmap, 4, 4).unwrap();
        texture.write_sdf(AtlasRect::new(0, 0, 1, 1), &[255]);
        assert_eq!(texture.alpha_at(0, 0), 0);
        assert_eq!(texture.dirty_region(), None);
    }

    #[test]
    fn test_clear_marks_everything_dirty() {
        let mut texture = AtlasTexture::new(TextureKind::Sdf, 4, 4).unwrap();
        texture.write_sdf(AtlasRect::new(0, 0, 1, 1), &[255]);
        texture.take_dirty();
        texture.clear();
        assert_eq!(texture.alpha_at(0, 0), 0);
        assert_eq!(texture.dirty_region(), Some(AtlasRect::new(0, 0, 4, 4)));
    }

    #[test]
    fn test_reads_outside_the_texture_are_empty() {
        let mut sdf = AtlasTexture::new(TextureKind::Sdf, 4, 4).unwrap();
        sdf.write_sdf(AtlasRect::new(0, 1, 1, 1), &[200]);
        assert_eq!(sdf.alpha_at(4, 0), 0, "x past the row must not wrap to the next one");
        assert_eq!(sdf.alpha_at(0, 4), 0);
        assert_eq!(sdf.rgba_at(u32::MAX, u32::MAX), [0; 4]);
        assert_eq!(sdf.rgba_at(0, 1), [200, 200, 200, 255]);

        let bitmap = AtlasTexture::new(TextureKind::Bitmap, 4, 4).unwrap();
        assert_eq!(bitmap.alpha_at(9, 9), 0);
        assert_eq!(bitmap.rgba_at(9, 9), [0; 4]);
    }

    #[test]
    fn test_zero_size_rejected() {
        assert!(AtlasTexture::new(TextureKind::Sdf, 0, 8).is_err());
    }
}
