//! Shaped text run

/// A shaped glyph with position deltas in font units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShapedGlyph {
    /// Glyph ID in the font
    pub glyph_id: u32,
    /// Cluster index (byte offset of the source character)
    pub cluster: u32,
    pub x_advance: i32,
    pub y_advance: i32,
    pub x_offset: i32,
    pub y_offset: i32,
}

/// A run of shaped glyphs
#[derive(Debug, Clone)]
pub struct ShapedRun {
    pub glyphs: Vec<ShapedGlyph>,
    /// Font size used for shaping
    pub font_size: f32,
    pub units_per_em: u16,
}

impl ShapedRun {
    pub fn new(glyphs: Vec<ShapedGlyph>, font_size: f32, units_per_em: u16) -> Self {
        Self { glyphs, font_size, units_per_em }
    }

    /// Scale factor to convert font units to pixels
    pub fn scale(&self) -> f32 {
        self.font_size / self.units_per_em.max(1) as f32
    }

    /// Total advance in pixels
    pub fn width(&self) -> f32 {
        self.glyphs.iter().map(|g| g.x_advance as f32 * self.scale()).sum()
    }

    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }

    /// Glyph IDs in run order, duplicates included
    pub fn glyph_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.glyphs.iter().map(|g| g.glyph_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn glyph(id: u32, advance: i32) -> ShapedGlyph {
        ShapedGlyph { glyph_id: id, cluster: 0, x_advance: advance, y_advance: 0, x_offset: 0, y_offset: 0 }
    }

    #[test]
    fn test_run_width() {
        let run = ShapedRun::new(vec![glyph(1, 500), glyph(2, 500)], 20.0, 1000);
        assert_eq!(run.width(), 20.0);
        assert_eq!(run.glyph_ids().collect::<Vec<_>>(), vec![1, 2]);
    }
}
