//! Text shaping boundary
//!
//! Shaping only feeds glyph IDs to the atlas; layout is somebody else's job.

mod run;
mod shaper;

pub use run::{ShapedGlyph, ShapedRun};
pub use shaper::{Direction, TextShaper};
