//! fOS Glyphs - Glyph Atlas and Font Resource Engine
//!
//! This crate keeps the glyphs that text renderers need resident in bounded
//! per-font texture atlases:
//! - Font identities and rich-text style fallback
//! - Font loading from a content root or the installed system fonts (fontdb)
//! - Text shaping boundary (rustybuzz - HarfBuzz port)
//! - Free-rectangle atlas allocation
//! - SDF and color bitmap glyph rasterization (tiny-skia)
//! - Font resource lifecycle driven by renderable liveness
//! - Renderer material binding validation
//!
//! Work is organized in cooperative passes, see [`FontPipeline::run_pass`].

use std::path::PathBuf;

pub mod atlas;
pub mod config;
pub mod font;
pub mod materials;
pub mod pipeline;
pub mod registry;
pub mod render;
pub mod renderable;
pub mod resource;
pub mod shaping;
pub mod updater;

#[cfg(test)]
mod test_support;

pub use atlas::{AtlasAllocator, AtlasRect, AtlasTexture, TextureKind};
pub use config::PipelineConfig;
pub use font::{
    CoverageMask, FontDescriptor, FontHandle, FontIdentity, FontLoader, FontMetadata, FontOpener,
    FontWeight, GlyphExtents, GlyphSource, OpenedFont, resolve,
};
pub use materials::{HeadlessMaterials, MaterialId, MaterialRegistry};
pub use pipeline::{FontPipeline, PassStats};
pub use registry::{FontKey, FontResourceRegistry, LoadOutcome};
pub use renderable::{PlacedGlyph, Renderable, RenderableId, RenderableSet, RendererLinkValidator};
pub use resource::{FontResource, GlyphRecord, ResourceState};
pub use shaping::{ShapedGlyph, ShapedRun, TextShaper};
pub use updater::{AtlasUpdate, GlyphRasterUpdater, UpdateSummary};

/// Glyph engine error types
#[derive(Debug, thiserror::Error)]
pub enum GlyphError {
    #[error("Font file not found: {0}")]
    FontFileNotFound(PathBuf),

    #[error("System font unresolved: {family} {subfamily}")]
    SystemFontUnresolved { family: String, subfamily: String },

    #[error("Atlas has no room for a {width}x{height} glyph")]
    AtlasAllocationFailed { width: u32, height: u32 },

    #[error("Unsupported font file extension: {0}")]
    UnsupportedFontFileExtension(PathBuf),

    #[error("Failed to parse font: {0}")]
    FontParsing(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl GlyphError {
    /// Transient errors are retried on a later pass instead of dropping work
    pub fn is_transient(&self) -> bool {
        matches!(self, GlyphError::AtlasAllocationFailed { .. })
    }
}

pub type Result<T> = std::result::Result<T, GlyphError>;
