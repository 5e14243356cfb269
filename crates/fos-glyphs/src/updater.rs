//! Glyph raster updater
//!
//! Drains the missing glyph list of active font resources: measures each
//! glyph, places its cell with the resource's allocator, rasterizes it into the
//! atlas and commits the record. Different resources may be processed on
//! worker threads; one resource is only ever touched by a single thread, so its
//! allocator has a single writer. Uploading to the GPU boundary stays on the
//! calling thread and happens once per resource per pass.

use std::panic::{self, AssertUnwindSafe};

use crate::atlas::{AtlasRect, AtlasTexture, TextureKind};
use crate::font::{GlyphExtents, GlyphSource};
use crate::materials::MaterialRegistry;
use crate::registry::{FontKey, FontResourceRegistry};
use crate::render::coverage_to_sdf;
use crate::resource::{FontResource, GlyphRecord, ResourceState};

/// Result of one update of one font resource
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AtlasUpdate {
    /// Texture region written since the last upload
    pub region: Option<AtlasRect>,
    /// Records committed by this update, in request order
    pub new_records: Vec<GlyphRecord>,
    /// Glyphs left queued because the atlas had no room
    pub deferred: usize,
}

impl AtlasUpdate {
    pub fn is_empty(&self) -> bool {
        self.new_records.is_empty() && self.deferred == 0
    }
}

/// Totals of [`GlyphRasterUpdater::update_all`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateSummary {
    pub resources: usize,
    pub placed: usize,
    pub deferred: usize,
    pub uploads: usize,
}

/// Rasterizes queued glyphs into font atlases
#[derive(Debug, Clone, Copy)]
pub struct GlyphRasterUpdater {
    parallel: bool,
}

impl Default for GlyphRasterUpdater {
    fn default() -> Self {
        Self::new(true)
    }
}

impl GlyphRasterUpdater {
    pub fn new(parallel: bool) -> Self {
        Self { parallel }
    }

    /// Place and rasterize every missing glyph of `resource` that fits.
    ///
    /// A resource that is not active or has nothing queued is left untouched.
    /// A glyph source that panics on one glyph costs only that glyph: it is
    /// committed without ink and its siblings are still placed.
    pub fn update(&self, resource: &mut FontResource) -> AtlasUpdate {
        if resource.state() != ResourceState::Active || resource.missing_glyphs.is_empty() {
            return AtlasUpdate::default();
        }
        let Some(source) = resource.source.clone() else {
            return AtlasUpdate::default();
        };

        let size = resource.sampling_point_size() as f32;
        let padding = resource.padding();
        // the queue stays on the resource until the end, so an unwinding
        // update leaves it to be retried; glyphs committed meanwhile are skipped
        let queued: Vec<u32> = resource
            .missing_glyphs
            .iter()
            .copied()
            .filter(|&glyph_id| !resource.contains_glyph(glyph_id))
            .collect();

        let mut deferred = Vec::new();
        let mut new_records = Vec::with_capacity(queued.len());
        for glyph_id in queued {
            let extents = isolated(glyph_id, "measuring", || source.glyph_extents(glyph_id, size))
                .flatten()
                .unwrap_or_default();
            if extents.is_empty() {
                new_records.push(resource.commit(glyph_id, extents, AtlasRect::default()));
                continue;
            }

            let cell = match resource
                .allocator
                .allocate(extents.width + 2 * padding, extents.height + 2 * padding)
            {
                Ok(cell) => cell,
                Err(e) => {
                    if !e.is_transient() {
                        tracing::warn!("Glyph {} not placed: {}", glyph_id, e);
                    }
                    deferred.push(glyph_id);
                    continue;
                }
            };

            let drawn = match resource.texture.as_mut() {
                Some(texture) => isolated(glyph_id, "rasterizing", || {
                    rasterize_glyph(texture, source.as_ref(), glyph_id, size, &extents, cell, padding)
                })
                .is_some(),
                None => true,
            };
            if drawn {
                new_records.push(resource.commit(glyph_id, extents, cell));
            } else {
                resource.allocator.release(cell);
                new_records.push(resource.commit(glyph_id, GlyphExtents::default(), AtlasRect::default()));
            }
        }

        if !deferred.is_empty() {
            tracing::debug!(
                "Atlas for {} full, {} glyphs deferred",
                resource.descriptor().family,
                deferred.len()
            );
        }
        let update = AtlasUpdate {
            region: resource.texture.as_ref().and_then(AtlasTexture::dirty_region),
            new_records,
            deferred: deferred.len(),
        };
        resource.set_missing(deferred);
        update
    }

    /// [`update`](Self::update), with a panic contained to the resource
    fn update_contained(&self, key: FontKey, resource: &mut FontResource) -> Option<(FontKey, AtlasUpdate)> {
        match panic::catch_unwind(AssertUnwindSafe(|| self.update(resource))) {
            Ok(update) => Some((key, update)),
            Err(_) => {
                tracing::warn!("Glyph update of {} panicked", resource.descriptor().family);
                None
            }
        }
    }

    /// Upload the resource's dirty region to its material, once.
    ///
    /// Resources without a material keep their dirty region for registration.
    pub fn apply(resource: &mut FontResource, materials: &mut impl MaterialRegistry) -> bool {
        let Some(material) = resource.material else { return false };
        let Some(texture) = resource.texture.as_mut() else { return false };
        let Some(region) = texture.take_dirty() else { return false };
        materials.upload(material, texture, region);
        true
    }

    /// Update every active resource with queued glyphs, then upload the results
    pub fn update_all(
        &self,
        registry: &mut FontResourceRegistry,
        materials: &mut impl MaterialRegistry,
    ) -> UpdateSummary {
        let work: Vec<(FontKey, &mut FontResource)> = registry
            .iter_mut()
            .filter(|(_, resource)| {
                resource.state() == ResourceState::Active && !resource.missing_glyphs.is_empty()
            })
            .collect();

        let updates: Vec<(FontKey, AtlasUpdate)> = if self.parallel && work.len() > 1 {
            std::thread::scope(|scope| {
                let handles: Vec<_> = work
                    .into_iter()
                    .map(|(key, resource)| scope.spawn(move || self.update_contained(key, resource)))
                    .collect();
                handles
                    .into_iter()
                    .filter_map(|handle| match handle.join() {
                        Ok(result) => result,
                        Err(_) => {
                            tracing::warn!("Glyph raster worker panicked");
                            None
                        }
                    })
                    .collect()
            })
        } else {
            work.into_iter()
                .filter_map(|(key, resource)| self.update_contained(key, resource))
                .collect()
        };

        let mut summary = UpdateSummary::default();
        for (key, update) in &updates {
            summary.resources += 1;
            summary.placed += update.new_records.len();
            summary.deferred += update.deferred;
            let Some(resource) = registry.get_mut(*key) else { continue };
            if Self::apply(resource, materials) {
                summary.uploads += 1;
            }
        }

        if summary.placed > 0 || summary.uploads > 0 {
            registry.touch();
        }
        tracing::debug!(
            "Glyph update: {} resources, {} placed, {} deferred, {} uploads",
            summary.resources,
            summary.placed,
            summary.deferred,
            summary.uploads
        );
        summary
    }
}

/// Run one glyph source call, turning a panic into `None`
fn isolated<T>(glyph_id: u32, what: &str, f: impl FnOnce() -> T) -> Option<T> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Glyph source panicked {} glyph {}", what, glyph_id);
            None
        }
    }
}

/// Draw one glyph into its cell; the ink box sits `padding` pixels in
fn rasterize_glyph(
    texture: &mut AtlasTexture,
    source: &dyn GlyphSource,
    glyph_id: u32,
    size: f32,
    extents: &GlyphExtents,
    cell: AtlasRect,
    padding: u32,
) {
    match texture.kind() {
        TextureKind::Sdf => {
            let Some(mask) = source.coverage_mask(glyph_id, size) else {
                tracing::debug!("Glyph {} has no outline", glyph_id);
                return;
            };
            if mask.width != extents.width || mask.height != extents.height || !mask.is_well_formed() {
                tracing::warn!(
                    "Glyph {} mask {}x{} ({} bytes) does not match its {}x{} extents",
                    glyph_id,
                    mask.width,
                    mask.height,
                    mask.data.len(),
                    extents.width,
                    extents.height
                );
                return;
            }
            let field = coverage_to_sdf(&mask, padding);
            texture.write_sdf(cell, &field);
        }
        TextureKind::Bitmap => {
            for layer in source.color_layers(glyph_id, size) {
                texture.composite(cell.x + padding, cell.y + padding, &layer);
            }
        }
    }
}
