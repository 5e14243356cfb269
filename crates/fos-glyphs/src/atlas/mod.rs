//! Atlas packing and texture storage

mod allocator;
mod texture;

pub use allocator::{AtlasAllocator, AtlasRect};
pub use texture::{AtlasTexture, TextureKind};

/// Edge length of every font atlas
pub const ATLAS_SIZE: u32 = 2048;

/// Padding around glyphs in color bitmap atlases
pub const BITMAP_PADDING: u32 = 8;

/// Padding around glyphs in SDF atlases: a sixth of the sampling size
pub fn sdf_padding(sampling_point_size: u32) -> u32 {
    sampling_point_size / 6
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sdf_padding_range() {
        assert_eq!(sdf_padding(64), 10);
        assert_eq!(sdf_padding(90), 15);
        assert_eq!(sdf_padding(96), 16);
    }
}
