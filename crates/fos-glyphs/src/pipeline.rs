//! Cooperative font pipeline
//!
//! One call to [`FontPipeline::run_pass`] is one frame of work:
//!
//! 1. Renderables whose font set changed request their fonts
//! 2. Fonts no live renderable references are destroyed
//! 3. Requested fonts are opened and their atlases allocated
//! 4. Glyphs renderables draw are queued on their font resources
//! 5. Queued glyphs are rasterized and each touched atlas uploaded once
//! 6. Materials of newly active resources are registered
//! 7. Renderables are re-validated against the registry
//!
//! File I/O, uploads and registration run on the calling thread.

use crate::Result;
use crate::config::PipelineConfig;
use crate::font::{FontLoader, FontOpener};
use crate::materials::{HeadlessMaterials, MaterialId, MaterialRegistry};
use crate::registry::FontResourceRegistry;
use crate::renderable::{RenderableId, RenderableSet, RendererLinkValidator};
use crate::resource::{GlyphRecord, ResourceState};
use crate::updater::GlyphRasterUpdater;

/// What one pass did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    pub loads_issued: usize,
    pub loads_failed: usize,
    pub glyphs_queued: usize,
    pub glyphs_placed: usize,
    pub glyphs_deferred: usize,
    pub uploads: usize,
    pub materials_registered: usize,
    pub resources_destroyed: usize,
    pub renderables_checked: usize,
    pub renderables_enabled: usize,
}

impl PassStats {
    /// Nothing was loaded, placed, uploaded or destroyed
    pub fn is_idle(&self) -> bool {
        self.loads_issued == 0
            && self.glyphs_queued == 0
            && self.glyphs_placed == 0
            && self.uploads == 0
            && self.materials_registered == 0
            && self.resources_destroyed == 0
    }
}

/// Font resources, renderables and the host boundaries they are driven through
pub struct FontPipeline<O: FontOpener = FontLoader, M: MaterialRegistry = HeadlessMaterials> {
    config: PipelineConfig,
    opener: O,
    materials: M,
    registry: FontResourceRegistry,
    renderables: RenderableSet,
    updater: GlyphRasterUpdater,
    passes: u64,
}

impl FontPipeline {
    /// Pipeline loading fonts from the configured content root into headless materials
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let mut loader = FontLoader::new(&config.content_root);
        if !config.load_system_fonts {
            loader = loader.without_system_fonts();
        }
        Self::with_parts(config, loader, HeadlessMaterials::new())
    }
}

impl<O: FontOpener, M: MaterialRegistry> FontPipeline<O, M> {
    /// Pipeline over a custom font opener and material registry
    pub fn with_parts(config: PipelineConfig, opener: O, materials: M) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            updater: GlyphRasterUpdater::new(config.parallel),
            config,
            opener,
            materials,
            registry: FontResourceRegistry::new(),
            renderables: RenderableSet::new(),
            passes: 0,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn registry(&self) -> &FontResourceRegistry {
        &self.registry
    }

    /// Mutable registry access, e.g. to reset an atlas; call `touch` after changes
    pub fn registry_mut(&mut self) -> &mut FontResourceRegistry {
        &mut self.registry
    }

    pub fn renderables(&self) -> &RenderableSet {
        &self.renderables
    }

    pub fn renderables_mut(&mut self) -> &mut RenderableSet {
        &mut self.renderables
    }

    pub fn materials(&self) -> &M {
        &self.materials
    }

    pub fn opener(&self) -> &O {
        &self.opener
    }

    pub fn opener_mut(&mut self) -> &mut O {
        &mut self.opener
    }

    /// Passes run so far
    pub fn passes(&self) -> u64 {
        self.passes
    }

    /// Run one cooperative pass
    pub fn run_pass(&mut self) -> PassStats {
        let mut stats = PassStats::default();

        for renderable in self.renderables.iter_mut().filter(|r| r.fonts_changed) {
            let keys = renderable.fonts().iter().map(|font| Some(self.registry.request(font))).collect();
            renderable.font_keys = keys;
            renderable.fonts_changed = false;
        }

        let live = self.renderables.live_identities();
        stats.resources_destroyed = self.registry.collect_unreferenced(&live, &mut self.materials);

        let outcome = self.registry.load_requested(&mut self.opener, &self.config);
        stats.loads_issued = outcome.loaded + outcome.failed;
        stats.loads_failed = outcome.failed;

        stats.glyphs_queued = self.queue_glyphs();

        let summary = self.updater.update_all(&mut self.registry, &mut self.materials);
        stats.glyphs_placed = summary.placed;
        stats.glyphs_deferred = summary.deferred;
        stats.uploads = summary.uploads;

        stats.materials_registered = self.registry.register_materials(&mut self.materials);

        let (checked, enabled) = RendererLinkValidator::validate_all(&mut self.renderables, &self.registry);
        stats.renderables_checked = checked;
        stats.renderables_enabled = enabled;

        self.passes += 1;
        tracing::debug!("Font pass {}: {:?}", self.passes, stats);
        stats
    }

    /// Run passes until one does nothing, at most `max_passes`
    pub fn run_until_idle(&mut self, max_passes: usize) -> usize {
        for pass in 1..=max_passes {
            if self.run_pass().is_idle() {
                return pass;
            }
        }
        max_passes
    }

    /// Material and atlas record of the `index`th glyph of a visible renderable
    pub fn glyph(&self, id: RenderableId, index: usize) -> Option<(MaterialId, GlyphRecord)> {
        let renderable = self.renderables.get(id)?;
        if !renderable.is_visible() {
            return None;
        }
        let placed = renderable.glyphs().get(index)?;
        let key = (*renderable.font_keys().get(placed.font)?)?;
        let resource = self.registry.get(key)?;
        Some((resource.material()?, resource.glyph(placed.glyph_id)?))
    }

    /// Queue non-resident glyphs on their fonts' resources.
    ///
    /// A renderable stays pending while any of its fonts is not active, so its
    /// glyphs are queued once a later pass loads that font.
    fn queue_glyphs(&mut self) -> usize {
        let mut queued = 0;
        for renderable in self.renderables.iter_mut().filter(|r| r.glyphs_pending) {
            let mut complete = true;
            for placed in renderable.glyphs() {
                let Some(identity) = renderable.identities().get(placed.font) else { continue };
                let Some(key) = self.registry.key_of(identity) else {
                    complete = false;
                    continue;
                };
                match self.registry.get_mut(key) {
                    Some(resource) if resource.state() == ResourceState::Active => {
                        queued += resource.request_glyphs([placed.glyph_id]);
                    }
                    _ => complete = false,
                }
            }
            renderable.glyphs_pending = !complete;
        }
        queued
    }
}
