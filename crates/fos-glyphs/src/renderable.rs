//! Renderable text objects and their material links
//!
//! A renderable references an ordered font set (primary first, then the
//! additional fonts rich text may switch to) and the glyphs it draws, each
//! tagged with the index of the font it comes from. It stays hidden until
//! every font it references is active with a registered material.

use std::collections::HashSet;

use crate::font::{FontDescriptor, FontIdentity, resolve};
use crate::materials::MaterialId;
use crate::registry::{FontKey, FontResourceRegistry};
use crate::shaping::ShapedRun;

// ============================================================================
// Renderables
// ============================================================================

/// Generational handle of a renderable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderableId {
    index: u32,
    generation: u32,
}

/// A glyph drawn by a renderable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacedGlyph {
    /// Index into the renderable's font set
    pub font: usize,
    pub glyph_id: u32,
}

/// One text object as the glyph engine sees it
#[derive(Debug, Clone, Default)]
pub struct Renderable {
    fonts: Vec<FontDescriptor>,
    identities: Vec<FontIdentity>,
    pub(crate) font_keys: Vec<Option<FontKey>>,
    glyphs: Vec<PlacedGlyph>,
    pub(crate) glyphs_pending: bool,
    materials: Vec<MaterialId>,
    visible: bool,
    pub(crate) fonts_changed: bool,
    validated_revision: Option<u64>,
}

impl Renderable {
    fn new(fonts: Vec<FontDescriptor>) -> Self {
        let mut renderable = Self::default();
        renderable.replace_fonts(fonts);
        renderable
    }

    fn replace_fonts(&mut self, fonts: Vec<FontDescriptor>) {
        self.identities = fonts.iter().map(FontDescriptor::identity).collect();
        self.font_keys = vec![None; fonts.len()];
        self.fonts = fonts;
        self.materials.clear();
        self.visible = false;
        self.fonts_changed = true;
        self.glyphs_pending = !self.glyphs.is_empty();
        self.validated_revision = None;
    }

    pub fn fonts(&self) -> &[FontDescriptor] {
        &self.fonts
    }

    pub fn identities(&self) -> &[FontIdentity] {
        &self.identities
    }

    /// Resource keys the fonts resolved to at the last request or validation
    pub fn font_keys(&self) -> &[Option<FontKey>] {
        &self.font_keys
    }

    pub fn glyphs(&self) -> &[PlacedGlyph] {
        &self.glyphs
    }

    /// Materials bound per font, empty while hidden
    pub fn materials(&self) -> &[MaterialId] {
        &self.materials
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Font set index for a rich-text style, falling back to a font of the same family
    pub fn select_font(&self, style: &FontIdentity) -> Option<usize> {
        resolve(style, &self.identities)
    }
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    renderable: Option<Renderable>,
}

/// Flat generational list of renderables
#[derive(Debug, Default)]
pub struct RenderableSet {
    slots: Vec<Slot>,
    free: Vec<u32>,
    len: usize,
}

impl RenderableSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a renderable drawing with `fonts`, primary font first
    pub fn spawn(&mut self, fonts: Vec<FontDescriptor>) -> RenderableId {
        let renderable = Renderable::new(fonts);
        self.len += 1;
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.renderable = Some(renderable);
                RenderableId { index, generation: slot.generation }
            }
            None => {
                self.slots.push(Slot { generation: 0, renderable: Some(renderable) });
                RenderableId { index: self.slots.len() as u32 - 1, generation: 0 }
            }
        }
    }

    /// Remove a renderable; its fonts are collected on the next pass if nobody else uses them
    pub fn despawn(&mut self, id: RenderableId) -> bool {
        let Some(slot) = self.slots.get_mut(id.index as usize) else { return false };
        if slot.generation != id.generation || slot.renderable.take().is_none() {
            return false;
        }
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.len -= 1;
        true
    }

    /// Replace the font set, hiding the renderable until the new fonts are ready
    pub fn set_fonts(&mut self, id: RenderableId, fonts: Vec<FontDescriptor>) -> bool {
        let Some(renderable) = self.get_mut(id) else { return false };
        renderable.replace_fonts(fonts);
        true
    }

    /// Replace the glyphs a renderable draws
    pub fn set_glyphs(&mut self, id: RenderableId, glyphs: impl IntoIterator<Item = PlacedGlyph>) -> bool {
        let Some(renderable) = self.get_mut(id) else { return false };
        renderable.glyphs = glyphs.into_iter().collect();
        renderable.glyphs_pending = true;
        true
    }

    /// Replace the glyphs with a shaped run drawn entirely in one font
    pub fn set_run(&mut self, id: RenderableId, font: usize, run: &ShapedRun) -> bool {
        self.set_glyphs(id, run.glyph_ids().map(|glyph_id| PlacedGlyph { font, glyph_id }))
    }

    /// See [`Renderable::select_font`]
    pub fn select_font(&self, id: RenderableId, style: &FontIdentity) -> Option<usize> {
        self.get(id)?.select_font(style)
    }

    pub fn get(&self, id: RenderableId) -> Option<&Renderable> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.renderable.as_ref()
    }

    pub(crate) fn get_mut(&mut self, id: RenderableId) -> Option<&mut Renderable> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.renderable.as_mut()
    }

    pub fn is_visible(&self, id: RenderableId) -> bool {
        self.get(id).is_some_and(Renderable::is_visible)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (RenderableId, &Renderable)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            let renderable = slot.renderable.as_ref()?;
            Some((RenderableId { index: index as u32, generation: slot.generation }, renderable))
        })
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Renderable> {
        self.slots.iter_mut().filter_map(|slot| slot.renderable.as_mut())
    }

    /// Every font identity some live renderable references
    pub fn live_identities(&self) -> HashSet<FontIdentity> {
        self.iter()
            .flat_map(|(_, renderable)| renderable.identities.iter().copied())
            .collect()
    }
}

// ============================================================================
// Link validation
// ============================================================================

/// Enables or hides renderables according to the state of their font resources
pub struct RendererLinkValidator;

impl RendererLinkValidator {
    /// Rebind a renderable to the current resources; returns whether it may draw.
    ///
    /// Every font of the set must be active with a current material, otherwise
    /// the renderable is hidden and holds no materials.
    pub fn validate(renderable: &mut Renderable, registry: &FontResourceRegistry) -> bool {
        let mut keys = Vec::with_capacity(renderable.identities.len());
        let mut materials = Vec::with_capacity(renderable.identities.len());
        let mut ready = !renderable.identities.is_empty();

        for identity in &renderable.identities {
            let key = registry.key_of(identity);
            let material = key
                .and_then(|key| registry.get(key))
                .filter(|resource| resource.is_ready())
                .and_then(|resource| resource.material());
            match material {
                Some(material) => materials.push(material),
                None => ready = false,
            }
            keys.push(key);
        }

        // rebound to a different resource: its glyphs must be queued there
        if keys != renderable.font_keys && !renderable.glyphs.is_empty() {
            renderable.glyphs_pending = true;
        }
        renderable.font_keys = keys;
        renderable.materials = if ready { materials } else { Vec::new() };
        renderable.visible = ready;
        renderable.validated_revision = Some(registry.revision());
        ready
    }

    /// Validate renderables not yet checked against the registry's current revision.
    ///
    /// Returns how many were checked and how many of those are visible.
    pub fn validate_all(renderables: &mut RenderableSet, registry: &FontResourceRegistry) -> (usize, usize) {
        let revision = registry.revision();
        let mut checked = 0;
        let mut enabled = 0;
        for renderable in renderables.iter_mut() {
            if renderable.validated_revision == Some(revision) {
                continue;
            }
            checked += 1;
            if Self::validate(renderable, registry) {
                enabled += 1;
            }
        }
        (checked, enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::font::FontWeight;
    use crate::materials::HeadlessMaterials;
    use crate::test_support::StubOpener;

    fn inter() -> FontDescriptor {
        FontDescriptor::bundled("Inter.ttf", "Inter")
    }

    #[test]
    fn test_spawn_and_despawn() {
        let mut set = RenderableSet::new();
        let a = set.spawn(vec![inter()]);
        let b = set.spawn(vec![inter()]);
        assert_eq!(set.len(), 2);
        assert!(!set.is_visible(a));

        assert!(set.despawn(a));
        assert!(!set.despawn(a));
        assert!(set.get(a).is_none());

        let c = set.spawn(vec![]);
        assert_ne!(a, c);
        assert!(set.get(b).is_some());
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_live_identities() {
        let mut set = RenderableSet::new();
        set.spawn(vec![inter(), inter().with_weight(FontWeight::BOLD)]);
        let only = set.spawn(vec![FontDescriptor::bundled("Mono.ttf", "Mono")]);
        assert_eq!(set.live_identities().len(), 3);

        set.despawn(only);
        assert!(!set.live_identities().contains(&FontIdentity::regular("Mono")));
    }

    #[test]
    fn test_select_font_prefers_exact_then_family() {
        let mut set = RenderableSet::new();
        let id = set.spawn(vec![inter(), inter().with_italic(true), FontDescriptor::bundled("Emoji.ttf", "Emoji")]);

        let italic = FontIdentity::regular("Inter").with_italic(true);
        assert_eq!(set.select_font(id, &italic), Some(1));
        let bold = FontIdentity::regular("Inter").with_weight(FontWeight::BOLD);
        assert_eq!(set.select_font(id, &bold), Some(0));
        assert_eq!(set.select_font(id, &FontIdentity::regular("Serif")), None);
    }

    #[test]
    fn test_validate_waits_for_material() {
        let config = PipelineConfig { atlas_size: 64, ..Default::default() };
        let mut registry = FontResourceRegistry::new();
        let mut opener = StubOpener::default().with_family("Inter", false);
        let mut materials = HeadlessMaterials::new();
        let mut set = RenderableSet::new();
        let id = set.spawn(vec![inter()]);

        registry.request(&inter());
        registry.load_requested(&mut opener, &config);
        let renderable = set.get_mut(id).unwrap();
        assert!(!RendererLinkValidator::validate(renderable, &registry));
        assert!(renderable.materials().is_empty());

        registry.register_materials(&mut materials);
        assert_eq!(RendererLinkValidator::validate_all(&mut set, &registry), (1, 1));
        assert!(set.is_visible(id));
        assert_eq!(set.get(id).unwrap().materials().len(), 1);

        // nothing changed, nothing to check
        assert_eq!(RendererLinkValidator::validate_all(&mut set, &registry), (0, 0));
    }

    #[test]
    fn test_set_fonts_hides_until_revalidated() {
        let mut set = RenderableSet::new();
        let id = set.spawn(vec![inter()]);
        set.get_mut(id).unwrap().visible = true;

        set.set_fonts(id, vec![FontDescriptor::bundled("Mono.ttf", "Mono")]);
        let renderable = set.get(id).unwrap();
        assert!(!renderable.is_visible());
        assert!(renderable.fonts_changed);
        assert_eq!(renderable.identities(), &[FontIdentity::regular("Mono")]);
    }
}
