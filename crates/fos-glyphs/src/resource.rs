//! Font resources
//!
//! A font resource owns an opened font, its atlas texture and the glyph
//! bookkeeping for that atlas. `used_glyphs` and `used_rects` are parallel:
//! index `i` of one always describes the same glyph as index `i` of the other.
//! A glyph ID is either missing, used, or unknown to the resource, never two
//! of those at once.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::atlas::{AtlasAllocator, AtlasRect, AtlasTexture, TextureKind, sdf_padding};
use crate::config::PipelineConfig;
use crate::font::{FontDescriptor, FontIdentity, GlyphExtents, GlyphSource, OpenedFont};
use crate::materials::MaterialId;
use crate::Result;

/// Lifecycle of a font resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceState {
    /// A renderable asked for an identity nobody had loaded
    Requested,
    /// Font is being opened and its atlas allocated
    Loading,
    /// Serving glyph requests
    Active,
    /// No renderable references the identity anymore
    PendingDestroy,
    /// Handles and material released
    Destroyed,
}

/// A glyph resident in an atlas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlyphRecord {
    pub glyph_id: u32,
    /// Ink box at the sampling size
    pub extents: GlyphExtents,
    /// Cell in the atlas, ink box plus padding on every side; empty for glyphs without ink
    pub atlas_rect: AtlasRect,
}

/// One loaded font and its atlas
pub struct FontResource {
    identity: FontIdentity,
    descriptor: FontDescriptor,
    pub(crate) state: ResourceState,
    pub(crate) source: Option<Arc<dyn GlyphSource>>,
    pub(crate) texture: Option<AtlasTexture>,
    pub(crate) allocator: AtlasAllocator,
    sampling_point_size: u32,
    pub(crate) missing_glyphs: Vec<u32>,
    missing_set: HashSet<u32>,
    used_glyphs: Vec<u32>,
    used_rects: Vec<AtlasRect>,
    used_extents: Vec<GlyphExtents>,
    glyph_index: HashMap<u32, usize>,
    pub(crate) material: Option<MaterialId>,
    pub(crate) material_dirty: bool,
    generation: u32,
}

impl FontResource {
    /// Resource for a descriptor nobody has loaded yet
    pub fn new(descriptor: FontDescriptor) -> Self {
        Self {
            identity: descriptor.identity(),
            descriptor,
            state: ResourceState::Requested,
            source: None,
            texture: None,
            allocator: AtlasAllocator::new(0, 0, 0),
            sampling_point_size: 0,
            missing_glyphs: Vec::new(),
            missing_set: HashSet::new(),
            used_glyphs: Vec::new(),
            used_rects: Vec::new(),
            used_extents: Vec::new(),
            glyph_index: HashMap::new(),
            material: None,
            material_dirty: false,
            generation: 0,
        }
    }

    /// Open resource around an already opened font
    pub fn open(descriptor: FontDescriptor, font: OpenedFont, config: &PipelineConfig) -> Result<Self> {
        let mut resource = Self::new(descriptor);
        resource.begin_loading();
        resource.activate(font, config)?;
        Ok(resource)
    }

    pub(crate) fn begin_loading(&mut self) {
        debug_assert_eq!(self.state, ResourceState::Requested);
        self.state = ResourceState::Loading;
    }

    /// Take ownership of the opened font, allocate the atlas and start serving
    pub(crate) fn activate(&mut self, font: OpenedFont, config: &PipelineConfig) -> Result<()> {
        let (sampling, padding) = match font.kind {
            TextureKind::Sdf => {
                let sampling = self.descriptor.sdf_sampling();
                (sampling, sdf_padding(sampling))
            }
            TextureKind::Bitmap => (self.descriptor.bitmap_sampling(), config.bitmap_padding),
        };

        let texture = AtlasTexture::new(font.kind, config.atlas_size, config.atlas_size)?;
        self.allocator = AtlasAllocator::new(config.atlas_size, config.atlas_size, padding);
        self.texture = Some(texture);
        self.source = Some(font.source);
        self.sampling_point_size = sampling;
        self.state = ResourceState::Active;
        self.material_dirty = true;
        self.generation += 1;
        Ok(())
    }

    /// Drop native handles and the texture; returns the material to destroy
    pub(crate) fn release(&mut self) -> Option<MaterialId> {
        self.state = ResourceState::PendingDestroy;
        self.source = None;
        self.texture = None;
        self.missing_glyphs.clear();
        self.missing_set.clear();
        let material = self.material.take();
        self.state = ResourceState::Destroyed;
        material
    }

    pub fn identity(&self) -> FontIdentity {
        self.identity
    }

    pub fn descriptor(&self) -> &FontDescriptor {
        &self.descriptor
    }

    pub fn state(&self) -> ResourceState {
        self.state
    }

    /// Atlas texture kind, `None` before the font is loaded
    pub fn kind(&self) -> Option<TextureKind> {
        self.texture.as_ref().map(AtlasTexture::kind)
    }

    pub fn texture(&self) -> Option<&AtlasTexture> {
        self.texture.as_ref()
    }

    pub fn material(&self) -> Option<MaterialId> {
        self.material
    }

    /// Active with its material registered and current
    pub fn is_ready(&self) -> bool {
        self.state == ResourceState::Active && self.material.is_some() && !self.material_dirty
    }

    /// Bumped whenever the atlas is (re)created; renderers rebind on change
    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn sampling_point_size(&self) -> u32 {
        self.sampling_point_size
    }

    pub fn padding(&self) -> u32 {
        self.allocator.padding()
    }

    pub fn missing_glyphs(&self) -> &[u32] {
        &self.missing_glyphs
    }

    pub fn used_glyphs(&self) -> &[u32] {
        &self.used_glyphs
    }

    pub fn used_rects(&self) -> &[AtlasRect] {
        &self.used_rects
    }

    pub fn free_rects(&self) -> &[AtlasRect] {
        self.allocator.free_rects()
    }

    /// Queue glyphs for rasterization, skipping ones already queued or resident.
    ///
    /// Returns how many were newly queued.
    pub fn request_glyphs(&mut self, glyph_ids: impl IntoIterator<Item = u32>) -> usize {
        if matches!(self.state, ResourceState::PendingDestroy | ResourceState::Destroyed) {
            return 0;
        }
        let mut queued = 0;
        for glyph_id in glyph_ids {
            if self.glyph_index.contains_key(&glyph_id) || !self.missing_set.insert(glyph_id) {
                continue;
            }
            self.missing_glyphs.push(glyph_id);
            queued += 1;
        }
        queued
    }

    pub fn contains_glyph(&self, glyph_id: u32) -> bool {
        self.glyph_index.contains_key(&glyph_id)
    }

    /// Resident record of a glyph
    pub fn glyph(&self, glyph_id: u32) -> Option<GlyphRecord> {
        self.glyph_index.get(&glyph_id).and_then(|&index| self.record(index))
    }

    /// Record at a position of the used arrays
    pub fn record(&self, index: usize) -> Option<GlyphRecord> {
        Some(GlyphRecord {
            glyph_id: *self.used_glyphs.get(index)?,
            extents: *self.used_extents.get(index)?,
            atlas_rect: *self.used_rects.get(index)?,
        })
    }

    /// Replace the missing list, keeping the lookup set in step
    pub(crate) fn set_missing(&mut self, glyph_ids: Vec<u32>) {
        self.missing_set = glyph_ids.iter().copied().collect();
        self.missing_glyphs = glyph_ids;
    }

    /// Append a placed glyph to the used arrays
    pub(crate) fn commit(&mut self, glyph_id: u32, extents: GlyphExtents, rect: AtlasRect) -> GlyphRecord {
        debug_assert!(!self.glyph_index.contains_key(&glyph_id));
        self.glyph_index.insert(glyph_id, self.used_glyphs.len());
        self.used_glyphs.push(glyph_id);
        self.used_rects.push(rect);
        self.used_extents.push(extents);
        GlyphRecord { glyph_id, extents, atlas_rect: rect }
    }

    /// Throw away every placement and queue the resident glyphs again.
    ///
    /// All glyph records of this resource are invalidated together.
    pub fn reset_atlas(&mut self) {
        if self.state != ResourceState::Active {
            return;
        }
        let (width, height) = (self.allocator.width(), self.allocator.height());
        self.allocator.initialize(width, height);
        if let Some(texture) = self.texture.as_mut() {
            texture.clear();
        }

        let mut requeue = std::mem::take(&mut self.used_glyphs);
        requeue.extend(self.missing_glyphs.drain(..));
        self.used_rects.clear();
        self.used_extents.clear();
        self.glyph_index.clear();
        self.set_missing(requeue);

        self.material_dirty = true;
        self.generation += 1;
        tracing::debug!("Reset atlas with {} glyphs requeued", self.missing_glyphs.len());
    }
}

impl std::fmt::Debug for FontResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontResource")
            .field("family", &self.descriptor.family)
            .field("state", &self.state)
            .field("kind", &self.kind())
            .field("missing", &self.missing_glyphs.len())
            .field("used", &self.used_glyphs.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::BoxGlyphs;

    fn small_config() -> PipelineConfig {
        PipelineConfig { atlas_size: 128, ..Default::default() }
    }

    fn active(kind: TextureKind) -> FontResource {
        let font = OpenedFont::with_kind(Arc::new(BoxGlyphs::default()), kind);
        FontResource::open(FontDescriptor::bundled("a.ttf", "A"), font, &small_config()).unwrap()
    }

    #[test]
    fn test_new_is_requested() {
        let resource = FontResource::new(FontDescriptor::bundled("a.ttf", "A"));
        assert_eq!(resource.state(), ResourceState::Requested);
        assert_eq!(resource.kind(), None);
        assert!(!resource.is_ready());
    }

    #[test]
    fn test_activation_sets_padding() {
        let sdf = active(TextureKind::Sdf);
        assert_eq!(sdf.state(), ResourceState::Active);
        assert_eq!(sdf.sampling_point_size(), 64);
        assert_eq!(sdf.padding(), 10);
        assert_eq!(sdf.free_rects(), &[AtlasRect::new(10, 10, 108, 108)]);

        let bitmap = active(TextureKind::Bitmap);
        assert_eq!(bitmap.padding(), 8);
        assert_eq!(bitmap.kind(), Some(TextureKind::Bitmap));
    }

    #[test]
    fn test_request_deduplicates() {
        let mut resource = active(TextureKind::Sdf);
        assert_eq!(resource.request_glyphs([5, 6, 5, 7]), 3);
        assert_eq!(resource.request_glyphs([6, 8]), 1);
        assert_eq!(resource.missing_glyphs(), &[5, 6, 7, 8]);

        resource.set_missing(vec![6, 7, 8]);
        resource.commit(5, GlyphExtents::default(), AtlasRect::default());
        assert_eq!(resource.request_glyphs([5]), 0);
    }

    #[test]
    fn test_commit_keeps_arrays_parallel() {
        let mut resource = active(TextureKind::Sdf);
        let extents = GlyphExtents { x_bearing: 0, y_bearing: 4, width: 4, height: 4 };
        resource.commit(9, extents, AtlasRect::new(10, 10, 24, 24));
        resource.commit(2, extents, AtlasRect::new(34, 10, 24, 24));

        assert_eq!(resource.used_glyphs(), &[9, 2]);
        assert_eq!(resource.used_rects()[1], AtlasRect::new(34, 10, 24, 24));
        assert_eq!(resource.glyph(2).unwrap().atlas_rect, resource.used_rects()[1]);
        assert_eq!(resource.record(0).unwrap().glyph_id, 9);
        assert!(resource.record(2).is_none());
    }

    #[test]
    fn test_reset_requeues_everything() {
        let mut resource = active(TextureKind::Sdf);
        resource.commit(1, GlyphExtents::default(), AtlasRect::default());
        resource.commit(2, GlyphExtents::default(), AtlasRect::default());
        resource.request_glyphs([3]);
        let generation = resource.generation();

        resource.reset_atlas();

        assert!(resource.used_glyphs().is_empty());
        assert!(resource.used_rects().is_empty());
        assert_eq!(resource.missing_glyphs(), &[1, 2, 3]);
        assert_eq!(resource.generation(), generation + 1);
        assert!(resource.glyph(1).is_none());
    }

    #[test]
    fn test_release_returns_material() {
        let mut resource = active(TextureKind::Sdf);
        resource.material = Some(MaterialId(4));
        resource.request_glyphs([1]);

        assert_eq!(resource.release(), Some(MaterialId(4)));
        assert_eq!(resource.state(), ResourceState::Destroyed);
        assert!(resource.texture().is_none());
        assert_eq!(resource.request_glyphs([2]), 0);
    }
}
