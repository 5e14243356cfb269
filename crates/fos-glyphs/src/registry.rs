//! Font resource registry
//!
//! Generational arena of [`FontResource`]s keyed by [`FontIdentity`]. The
//! registry is the only place a resource changes lifecycle state or is
//! destroyed. Resources are created on request, opened in bulk once per pass,
//! and collected when a liveness scan finds nobody referencing them.

use std::collections::{HashMap, HashSet};

use crate::config::PipelineConfig;
use crate::font::{FontDescriptor, FontIdentity, FontOpener, resolve};
use crate::materials::MaterialRegistry;
use crate::resource::{FontResource, ResourceState};

// ============================================================================
// Keys
// ============================================================================

/// Generational handle of a font resource; stale after the resource is destroyed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FontKey {
    index: u32,
    generation: u32,
}

impl FontKey {
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    resource: Option<FontResource>,
}

/// Outcome of opening requested resources
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOutcome {
    pub loaded: usize,
    pub failed: usize,
}

// ============================================================================
// Registry
// ============================================================================

/// All font resources of a pipeline
#[derive(Debug, Default)]
pub struct FontResourceRegistry {
    slots: Vec<Slot>,
    free: Vec<u32>,
    by_identity: HashMap<FontIdentity, FontKey>,
    revision: u64,
}

impl FontResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Key of the resource for the descriptor's identity, creating a `Requested` one if needed.
    ///
    /// The first descriptor seen for an identity wins; later descriptors with the
    /// same identity map onto the existing resource even if they name another file.
    pub fn request(&mut self, descriptor: &FontDescriptor) -> FontKey {
        let identity = descriptor.identity();
        if let Some(&key) = self.by_identity.get(&identity) {
            return key;
        }

        let resource = FontResource::new(descriptor.clone());
        let key = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.resource = Some(resource);
                FontKey { index, generation: slot.generation }
            }
            None => {
                self.slots.push(Slot { generation: 0, resource: Some(resource) });
                FontKey { index: self.slots.len() as u32 - 1, generation: 0 }
            }
        };
        self.by_identity.insert(identity, key);
        tracing::debug!("Requested font {} ({:?})", descriptor.family, key);
        key
    }

    /// Key registered for exactly this identity, in any state
    pub fn key_of(&self, identity: &FontIdentity) -> Option<FontKey> {
        self.by_identity.get(identity).copied()
    }

    /// Resource for an identity with style fallback.
    ///
    /// Exact identities win in any state; otherwise the first active resource of
    /// the same family is returned.
    pub fn resolve(&self, identity: &FontIdentity) -> Option<FontKey> {
        if let Some(key) = self.key_of(identity) {
            return Some(key);
        }
        let (keys, identities): (Vec<FontKey>, Vec<FontIdentity>) = self
            .iter()
            .filter(|(_, resource)| resource.state() == ResourceState::Active)
            .map(|(key, resource)| (key, resource.identity()))
            .unzip();
        resolve(identity, &identities).map(|index| keys[index])
    }

    pub fn get(&self, key: FontKey) -> Option<&FontResource> {
        let slot = self.slots.get(key.index as usize)?;
        if slot.generation != key.generation {
            return None;
        }
        slot.resource.as_ref()
    }

    pub fn get_mut(&mut self, key: FontKey) -> Option<&mut FontResource> {
        let slot = self.slots.get_mut(key.index as usize)?;
        if slot.generation != key.generation {
            return None;
        }
        slot.resource.as_mut()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FontKey, &FontResource)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            let resource = slot.resource.as_ref()?;
            Some((FontKey { index: index as u32, generation: slot.generation }, resource))
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (FontKey, &mut FontResource)> {
        self.slots.iter_mut().enumerate().filter_map(|(index, slot)| {
            let generation = slot.generation;
            let resource = slot.resource.as_mut()?;
            Some((FontKey { index: index as u32, generation }, resource))
        })
    }

    /// Resources currently held, whatever their state
    pub fn len(&self) -> usize {
        self.by_identity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_identity.is_empty()
    }

    /// Bumped on every change renderers have to re-validate against
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Record a change made through [`FontResourceRegistry::get_mut`]
    pub fn touch(&mut self) {
        self.revision += 1;
    }

    /// Open every `Requested` resource.
    ///
    /// A resource whose font cannot be opened is dropped with a warning; its
    /// renderables stay hidden. Each identity is opened at most once since the
    /// registry holds one resource per identity.
    pub fn load_requested(&mut self, opener: &mut impl FontOpener, config: &PipelineConfig) -> LoadOutcome {
        let pending: Vec<FontKey> = self
            .iter()
            .filter(|(_, resource)| resource.state() == ResourceState::Requested)
            .map(|(key, _)| key)
            .collect();

        let mut outcome = LoadOutcome::default();
        for key in pending {
            let Some(resource) = self.get_mut(key) else { continue };
            resource.begin_loading();

            let result = opener
                .open(resource.descriptor())
                .and_then(|font| resource.activate(font, config));
            match result {
                Ok(()) => {
                    tracing::info!(
                        "Loaded font {} ({:?} atlas, padding {})",
                        resource.descriptor().family,
                        resource.kind(),
                        resource.padding()
                    );
                    outcome.loaded += 1;
                }
                Err(e) => {
                    tracing::warn!("Dropping font load for {}: {}", resource.descriptor().family, e);
                    self.remove(key);
                    outcome.failed += 1;
                }
            }
        }

        if outcome.loaded > 0 {
            self.touch();
        }
        outcome
    }

    /// Destroy every resource whose identity is not in `live`, returning how many went
    pub fn collect_unreferenced(
        &mut self,
        live: &HashSet<FontIdentity>,
        materials: &mut impl MaterialRegistry,
    ) -> usize {
        let dead: Vec<FontKey> = self
            .iter()
            .filter(|(_, resource)| !live.contains(&resource.identity()))
            .map(|(key, _)| key)
            .collect();
        for &key in &dead {
            self.destroy(key, materials);
        }
        dead.len()
    }

    /// Release a resource's font and material and free its slot
    pub fn destroy(&mut self, key: FontKey, materials: &mut impl MaterialRegistry) -> bool {
        let Some(mut resource) = self.remove(key) else { return false };
        if let Some(material) = resource.release() {
            materials.unregister(material);
        }
        tracing::debug!("Destroyed font {} ({:?})", resource.descriptor().family, key);
        self.touch();
        true
    }

    /// Register materials of freshly activated resources and refresh reset ones.
    ///
    /// Registration uploads the whole texture, so any pending dirty region is consumed.
    pub fn register_materials(&mut self, materials: &mut impl MaterialRegistry) -> usize {
        let mut registered = 0;
        for (_, resource) in self.iter_mut() {
            if resource.state() != ResourceState::Active || !resource.material_dirty {
                continue;
            }
            let Some(texture) = resource.texture.as_mut() else { continue };
            match resource.material {
                None => {
                    resource.material = Some(materials.register(texture));
                    texture.take_dirty();
                }
                Some(material) => {
                    if let Some(region) = texture.take_dirty() {
                        materials.upload(material, texture, region);
                    }
                }
            }
            resource.material_dirty = false;
            registered += 1;
        }
        if registered > 0 {
            self.touch();
        }
        registered
    }

    fn remove(&mut self, key: FontKey) -> Option<FontResource> {
        let slot = self.slots.get_mut(key.index as usize)?;
        if slot.generation != key.generation {
            return None;
        }
        let resource = slot.resource.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(key.index);
        self.by_identity.remove(&resource.identity());
        Some(resource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::FontWeight;
    use crate::materials::HeadlessMaterials;
    use crate::test_support::StubOpener;

    fn config() -> PipelineConfig {
        PipelineConfig { atlas_size: 256, ..Default::default() }
    }

    fn descriptor(family: &str) -> FontDescriptor {
        FontDescriptor::bundled(format!("{family}.ttf"), family)
    }

    #[test]
    fn test_request_deduplicates_identity() {
        let mut registry = FontResourceRegistry::new();
        let a = registry.request(&descriptor("Inter"));
        let b = registry.request(&FontDescriptor::bundled("other/Inter.otf", "Inter"));
        assert_eq!(a, b);
        assert_eq!(registry.len(), 1);

        let bold = registry.request(&descriptor("Inter").with_weight(FontWeight::BOLD));
        assert_ne!(a, bold);
        assert_eq!(registry.get(a).unwrap().state(), ResourceState::Requested);
    }

    #[test]
    fn test_load_opens_each_identity_once() {
        let mut registry = FontResourceRegistry::new();
        let mut opener = StubOpener::default().with_family("Inter", false);
        registry.request(&descriptor("Inter"));
        registry.request(&descriptor("Inter"));

        let outcome = registry.load_requested(&mut opener, &config());
        assert_eq!(outcome, LoadOutcome { loaded: 1, failed: 0 });
        assert_eq!(opener.opened, vec!["Inter".to_string()]);

        // nothing left to open
        let outcome = registry.load_requested(&mut opener, &config());
        assert_eq!(outcome, LoadOutcome::default());
    }

    #[test]
    fn test_failed_load_is_dropped() {
        let mut registry = FontResourceRegistry::new();
        let mut opener = StubOpener::default();
        let key = registry.request(&descriptor("Missing"));

        let outcome = registry.load_requested(&mut opener, &config());
        assert_eq!(outcome.failed, 1);
        assert!(registry.get(key).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_resolve_falls_back_to_active_family() {
        let mut registry = FontResourceRegistry::new();
        let mut opener = StubOpener::default().with_family("Inter", false);
        let regular = registry.request(&descriptor("Inter"));
        registry.load_requested(&mut opener, &config());

        let bold = FontIdentity::regular("Inter").with_weight(FontWeight::BOLD);
        assert_eq!(registry.resolve(&bold), Some(regular));
        assert_eq!(registry.resolve(&FontIdentity::regular("Roboto")), None);
    }

    #[test]
    fn test_collect_releases_material_and_invalidates_key() {
        let mut registry = FontResourceRegistry::new();
        let mut opener = StubOpener::default().with_family("Inter", false);
        let mut materials = HeadlessMaterials::new();
        let key = registry.request(&descriptor("Inter"));
        registry.load_requested(&mut opener, &config());
        assert_eq!(registry.register_materials(&mut materials), 1);
        assert_eq!(materials.len(), 1);

        let live = HashSet::from([FontIdentity::regular("Inter")]);
        assert_eq!(registry.collect_unreferenced(&live, &mut materials), 0);

        assert_eq!(registry.collect_unreferenced(&HashSet::new(), &mut materials), 1);
        assert!(registry.get(key).is_none());
        assert!(materials.is_empty());

        // the slot is reused under a new generation
        let again = registry.request(&descriptor("Inter"));
        assert_eq!(again.index(), key.index());
        assert_ne!(again, key);
    }

    #[test]
    fn test_register_materials_only_once() {
        let mut registry = FontResourceRegistry::new();
        let mut opener = StubOpener::default().with_family("Noto Color Emoji", true);
        let mut materials = HeadlessMaterials::new();
        let key = registry.request(&descriptor("Noto Color Emoji"));
        registry.load_requested(&mut opener, &config());

        let revision = registry.revision();
        assert_eq!(registry.register_materials(&mut materials), 1);
        assert_eq!(registry.register_materials(&mut materials), 0);
        assert_eq!(registry.revision(), revision + 1);
        assert!(registry.get(key).unwrap().is_ready());
    }
}
