//! GPU material boundary
//!
//! Registering, uploading and destroying atlas materials belongs to the host
//! renderer and happens on the main thread. [`HeadlessMaterials`] keeps the
//! bookkeeping in memory for tools and tests.

use std::collections::HashMap;

use crate::atlas::{AtlasRect, AtlasTexture, TextureKind};

/// Handle of a registered atlas material
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialId(pub u32);

/// Host side texture/material registry
pub trait MaterialRegistry {
    /// Create a material for `texture`, uploading its full contents
    fn register(&mut self, texture: &AtlasTexture) -> MaterialId;

    /// Upload `region` of `texture` to an existing material
    fn upload(&mut self, material: MaterialId, texture: &AtlasTexture, region: AtlasRect);

    /// Destroy a material and its texture
    fn unregister(&mut self, material: MaterialId);
}

/// What a headless material saw
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterialEntry {
    pub kind: TextureKind,
    pub width: u32,
    pub height: u32,
    /// Uploads after registration
    pub uploads: u32,
    pub last_region: Option<AtlasRect>,
}

/// In-memory material registry
#[derive(Debug, Default)]
pub struct HeadlessMaterials {
    next_id: u32,
    live: HashMap<MaterialId, MaterialEntry>,
    total_uploads: u64,
    uploaded_texels: u64,
    destroyed: u32,
}

impl HeadlessMaterials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, material: MaterialId) -> Option<&MaterialEntry> {
        self.live.get(&material)
    }

    pub fn is_live(&self, material: MaterialId) -> bool {
        self.live.contains_key(&material)
    }

    /// Materials currently registered
    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Uploads across all materials, registrations excluded
    pub fn total_uploads(&self) -> u64 {
        self.total_uploads
    }

    /// Texels moved by registrations and uploads
    pub fn uploaded_texels(&self) -> u64 {
        self.uploaded_texels
    }

    pub fn destroyed(&self) -> u32 {
        self.destroyed
    }
}

impl MaterialRegistry for HeadlessMaterials {
    fn register(&mut self, texture: &AtlasTexture) -> MaterialId {
        self.next_id += 1;
        let id = MaterialId(self.next_id);
        self.uploaded_texels += texture.width() as u64 * texture.height() as u64;
        self.live.insert(id, MaterialEntry {
            kind: texture.kind(),
            width: texture.width(),
            height: texture.height(),
            uploads: 0,
            last_region: None,
        });
        id
    }

    fn upload(&mut self, material: MaterialId, _texture: &AtlasTexture, region: AtlasRect) {
        let Some(entry) = self.live.get_mut(&material) else {
            tracing::warn!("Upload to unknown material {:?}", material);
            return;
        };
        entry.uploads += 1;
        entry.last_region = Some(region);
        self.total_uploads += 1;
        self.uploaded_texels += region.area();
    }

    fn unregister(&mut self, material: MaterialId) {
        if self.live.remove(&material).is_some() {
            self.destroyed += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headless_lifecycle() {
        let texture = AtlasTexture::new(TextureKind::Sdf, 32, 32).unwrap();
        let mut materials = HeadlessMaterials::new();

        let id = materials.register(&texture);
        assert!(materials.is_live(id));
        assert_eq!(materials.uploaded_texels(), 32 * 32);

        materials.upload(id, &texture, AtlasRect::new(0, 0, 4, 4));
        assert_eq!(materials.get(id).unwrap().uploads, 1);
        assert_eq!(materials.total_uploads(), 1);

        materials.unregister(id);
        assert!(materials.is_empty());
        assert_eq!(materials.destroyed(), 1);

        // uploads to a dead material are dropped
        materials.upload(id, &texture, AtlasRect::new(0, 0, 4, 4));
        assert_eq!(materials.total_uploads(), 1);
    }
}
