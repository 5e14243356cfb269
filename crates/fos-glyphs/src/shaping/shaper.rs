//! Text shaper using rustybuzz

use rustybuzz::{Face, UnicodeBuffer, shape};

use super::{ShapedGlyph, ShapedRun};
use crate::{GlyphError, Result};

/// Text direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    LeftToRight,
    RightToLeft,
    TopToBottom,
    BottomToTop,
}

impl From<Direction> for rustybuzz::Direction {
    fn from(d: Direction) -> Self {
        match d {
            Direction::LeftToRight => rustybuzz::Direction::LeftToRight,
            Direction::RightToLeft => rustybuzz::Direction::RightToLeft,
            Direction::TopToBottom => rustybuzz::Direction::TopToBottom,
            Direction::BottomToTop => rustybuzz::Direction::BottomToTop,
        }
    }
}

/// Text shaper using HarfBuzz (via rustybuzz)
#[derive(Debug, Clone, Default)]
pub struct TextShaper {
    direction: Option<Direction>,
}

impl TextShaper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Force a direction instead of guessing it from the text
    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    /// Shape a UTF-8 run with raw font data
    pub fn shape_with_data(
        &self,
        font_data: &[u8],
        face_index: u32,
        text: &str,
        font_size: f32,
    ) -> Result<ShapedRun> {
        let face = Face::from_slice(font_data, face_index)
            .ok_or_else(|| GlyphError::FontParsing("rustybuzz rejected the face".into()))?;

        let mut buffer = UnicodeBuffer::new();
        buffer.push_str(text);
        buffer.guess_segment_properties();
        if let Some(direction) = self.direction {
            buffer.set_direction(direction.into());
        }

        let output = shape(&face, &[], buffer);

        let glyphs = output
            .glyph_infos()
            .iter()
            .zip(output.glyph_positions())
            .map(|(info, pos)| ShapedGlyph {
                glyph_id: info.glyph_id,
                cluster: info.cluster,
                x_advance: pos.x_advance,
                y_advance: pos.y_advance,
                x_offset: pos.x_offset,
                y_offset: pos.y_offset,
            })
            .collect();

        Ok(ShapedRun::new(glyphs, font_size, face.units_per_em() as u16))
    }
}
