//! Glyph rendering module

mod colr;
mod rasterizer;
mod sdf;

pub use colr::paint_color_layers;
pub use rasterizer::rasterize_outline;
pub use sdf::coverage_to_sdf;
