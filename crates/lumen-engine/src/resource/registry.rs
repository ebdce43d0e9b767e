use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

use crate::config::AssetRoot;
use crate::device::DeviceListener;
use crate::error::{EngineError, Result};
use crate::gpu::{ReleaseQueue, RenderBackend};
use crate::paint::Color;

use super::{
    RegistryResource, Resource, ResourceEntry, Shared, ShaderProgram, ShaderStage, Texture,
    DEFAULT_PROGRAM_WGSL,
};

/// Key of the 1x1 white placeholder texture.
pub const EMPTY_TEXTURE_KEY: &str = "__TEXTURE_NULL__";
/// Key of the built-in 2D program.
pub const DEFAULT_SHADER_KEY: &str = "__SHADER_DEFAULT__";

/// Substitutes for unset textures and shaders.
#[derive(Debug, Clone)]
pub struct DefaultResources {
    pub texture: Shared<Texture>,
    pub program: Shared<ShaderProgram>,
}

struct Entry {
    key: String,
    resource: ResourceEntry,
}

/// Name-keyed resource store.
///
/// Entries keep insertion order, which is also the order device-lifecycle hooks run
/// in. Replacing a key keeps its position. The registry holds one reference to each
/// resource; callers may hold more, and a resource stays valid for them after it is
/// removed or replaced here.
pub struct ResourceRegistry {
    root: AssetRoot,
    releases: ReleaseQueue,
    entries: Vec<Entry>,
    index: HashMap<String, usize>,
    empty_texture: Option<Shared<Texture>>,
    default_program: Option<Shared<ShaderProgram>>,
}

impl ResourceRegistry {
    pub fn new(root: AssetRoot, releases: ReleaseQueue) -> Self {
        Self {
            root,
            releases,
            entries: Vec::new(),
            index: HashMap::new(),
            empty_texture: None,
            default_program: None,
        }
    }

    pub fn new_shared(root: AssetRoot, releases: ReleaseQueue) -> Shared<Self> {
        Rc::new(RefCell::new(Self::new(root, releases)))
    }

    pub fn asset_root(&self) -> &AssetRoot {
        &self.root
    }

    /// Release queue for resources built outside the registry.
    pub fn release_queue(&self) -> ReleaseQueue {
        self.releases.clone()
    }

    /// Creates the placeholder texture and the default program under the reserved keys.
    pub fn initialize(&mut self, backend: &mut dyn RenderBackend) -> Result<DefaultResources> {
        let mut texture = Texture::new(self.releases.clone());
        texture.create_render_target(backend, EMPTY_TEXTURE_KEY, 1, 1)?;
        texture.fill(backend, Color::WHITE)?;

        let mut program = ShaderProgram::new(self.releases.clone());
        program.load_from_source(
            backend,
            "resource/shader/default_2d.wgsl",
            DEFAULT_PROGRAM_WGSL,
            ShaderStage::Unspecified,
        )?;
        program.set_active_technique("render");

        self.add(EMPTY_TEXTURE_KEY, Rc::new(RefCell::new(texture)))?;
        self.add(DEFAULT_SHADER_KEY, Rc::new(RefCell::new(program)))?;
        log::info!("resource registry initialized");

        self.defaults()
            .ok_or_else(|| EngineError::invalid("default resources missing after initialize"))
    }

    /// Placeholder texture and default program, once both reserved keys were filled.
    pub fn defaults(&self) -> Option<DefaultResources> {
        Some(DefaultResources {
            texture: self.empty_texture.clone()?,
            program: self.default_program.clone()?,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.key.as_str())
    }

    /// Returns the resource under `key`, loading it from `path` on first use.
    ///
    /// The path is resolved against the asset root. A key already holding a different
    /// resource type is an [`EngineError::InvalidArgument`]; a failed load leaves the
    /// key unregistered.
    pub fn load_or_get<T: RegistryResource>(
        &mut self,
        backend: &mut dyn RenderBackend,
        path: impl AsRef<Path>,
        key: &str,
    ) -> Result<Shared<T>> {
        if is_reserved(key) {
            return Err(EngineError::invalid(format!("`{key}` is a reserved resource key")));
        }
        if let Some(existing) = self.get_as::<T>(key)? {
            return Ok(existing);
        }

        let resolved = self.root.resolve(path);
        let mut resource = T::create(self.releases.clone());
        resource.load(backend, &resolved)?;

        let shared = Rc::new(RefCell::new(resource));
        self.insert(key, T::into_entry(shared.clone()));
        log::debug!("registered `{key}` from {}", resolved.display());
        Ok(shared)
    }

    /// Inserts or replaces `key`.
    ///
    /// A replaced resource is not unloaded: the registry only drops its reference, and
    /// the backend handles go away once the last holder does. Reserved keys accept
    /// their own kind and replace the matching default.
    pub fn add<T: RegistryResource>(&mut self, key: &str, resource: Shared<T>) -> Result<()> {
        let entry = T::into_entry(resource);

        match (key, &entry) {
            (EMPTY_TEXTURE_KEY, ResourceEntry::Texture(texture)) => {
                self.empty_texture = Some(texture.clone());
            }
            (DEFAULT_SHADER_KEY, ResourceEntry::Program(program)) => {
                self.default_program = Some(program.clone());
            }
            (EMPTY_TEXTURE_KEY | DEFAULT_SHADER_KEY, _) => {
                return Err(EngineError::invalid(format!(
                    "reserved key `{key}` cannot hold a {:?}",
                    entry.kind()
                )));
            }
            _ => {}
        }
        self.insert(key, entry);
        Ok(())
    }

    fn insert(&mut self, key: &str, resource: ResourceEntry) {
        match self.index.get(key) {
            Some(&i) => {
                log::debug!("replacing resource `{key}`");
                self.entries[i].resource = resource;
            }
            None => {
                self.index.insert(key.to_string(), self.entries.len());
                self.entries.push(Entry {
                    key: key.to_string(),
                    resource,
                });
            }
        }
    }

    /// Drops the registry's reference. Defaults stay in effect for new objects.
    pub fn remove(&mut self, key: &str) -> Option<ResourceEntry> {
        let i = self.index.remove(key)?;
        let entry = self.entries.remove(i);
        for e in &self.entries[i..] {
            if let Some(slot) = self.index.get_mut(&e.key) {
                *slot -= 1;
            }
        }
        Some(entry.resource)
    }

    pub fn get(&self, key: &str) -> Option<ResourceEntry> {
        self.index.get(key).map(|&i| self.entries[i].resource.clone())
    }

    /// Typed lookup. `Ok(None)` if absent; a different resource type is an error.
    pub fn get_as<T: RegistryResource>(&self, key: &str) -> Result<Option<Shared<T>>> {
        let Some(entry) = self.get(key) else { return Ok(None) };
        T::from_entry(&entry).map(Some).ok_or_else(|| {
            EngineError::invalid(format!(
                "resource `{key}` is a {:?}, not a {}",
                entry.kind(),
                T::TYPE_NAME
            ))
        })
    }

    /// Unloads the resource under `key` and removes it. Returns `false` if absent.
    pub fn unload(&mut self, backend: &mut dyn RenderBackend, key: &str) -> bool {
        match self.remove(key) {
            Some(entry) => {
                entry.as_resource().borrow_mut().unload(backend);
                log::debug!("unloaded `{key}`");
                true
            }
            None => false,
        }
    }

    /// Unloads every resource and clears the registry (shutdown).
    pub fn release(&mut self, backend: &mut dyn RenderBackend) {
        for entry in self.entries.drain(..) {
            entry.resource.as_resource().borrow_mut().unload(backend);
        }
        self.index.clear();
        if let Some(texture) = self.empty_texture.take() {
            texture.borrow_mut().unload(backend);
        }
        if let Some(program) = self.default_program.take() {
            program.borrow_mut().unload(backend);
        }
        log::debug!("resource registry released");
    }

    /// Distinct resources in lifecycle order, plus defaults that were removed from the
    /// key map. A resource registered under several keys appears once.
    fn lifecycle_targets(&self) -> Vec<ResourceEntry> {
        let extras = [
            self.empty_texture.clone().map(ResourceEntry::Texture),
            self.default_program.clone().map(ResourceEntry::Program),
        ];
        let candidates = self
            .entries
            .iter()
            .map(|e| e.resource.clone())
            .chain(extras.into_iter().flatten());

        let mut targets: Vec<ResourceEntry> = Vec::new();
        for entry in candidates {
            if !targets.iter().any(|t| t.ptr_eq(&entry)) {
                targets.push(entry);
            }
        }
        targets
    }

    fn dispatch(
        &self,
        backend: &mut dyn RenderBackend,
        hook: fn(&mut dyn Resource, &mut dyn RenderBackend) -> Result<()>,
    ) -> Result<()> {
        for entry in self.lifecycle_targets() {
            let resource = entry.as_resource();
            let mut resource = resource.try_borrow_mut().map_err(|_| {
                EngineError::DeviceFatal(format!("resource {:?} is borrowed during device reset", entry.kind()))
            })?;
            hook(&mut *resource, backend)?;
        }
        Ok(())
    }
}

impl DeviceListener for ResourceRegistry {
    fn on_device_lost(&mut self, backend: &mut dyn RenderBackend) -> Result<()> {
        self.dispatch(backend, |r, b| r.on_device_lost(b))
    }

    fn on_device_restored(&mut self, backend: &mut dyn RenderBackend) -> Result<()> {
        self.dispatch(backend, |r, b| r.on_device_restored(b))
    }
}

fn is_reserved(key: &str) -> bool {
    key == EMPTY_TEXTURE_KEY || key == DEFAULT_SHADER_KEY
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::HeadlessBackend;

    fn registry() -> (ResourceRegistry, HeadlessBackend) {
        let mut backend = HeadlessBackend::new();
        let mut registry = ResourceRegistry::new(AssetRoot::new("."), ReleaseQueue::new());
        registry.initialize(&mut backend).unwrap();
        (registry, backend)
    }

    fn render_target(backend: &mut HeadlessBackend, releases: ReleaseQueue, name: &str) -> Shared<Texture> {
        let mut texture = Texture::new(releases);
        texture.create_render_target(backend, name, 4, 4).unwrap();
        Rc::new(RefCell::new(texture))
    }

    // ── initialize ────────────────────────────────────────────────────────

    #[test]
    fn initialize_registers_reserved_defaults() {
        let (registry, backend) = registry();
        let defaults = registry.defaults().unwrap();

        assert_eq!(registry.keys().collect::<Vec<_>>(), vec![EMPTY_TEXTURE_KEY, DEFAULT_SHADER_KEY]);
        let id = defaults.texture.borrow().id().unwrap();
        assert_eq!(backend.texture_level(id, 0).unwrap(), &[255, 255, 255, 255]);
        assert!(defaults.program.borrow().is_loaded());
    }

    // ── add / get / remove ────────────────────────────────────────────────

    #[test]
    fn add_replaces_in_place_without_unloading() {
        let (mut registry, mut backend) = registry();
        let releases = registry.release_queue();
        let first = render_target(&mut backend, releases.clone(), "a");
        let second = render_target(&mut backend, releases, "b");

        registry.add("rt", first.clone()).unwrap();
        registry.add("other", second.clone()).unwrap();
        registry.add("rt", second.clone()).unwrap();

        assert!(first.borrow().is_loaded());
        let keys: Vec<_> = registry.keys().collect();
        assert_eq!(&keys[2..], &["rt", "other"]);
        let got = registry.get_as::<Texture>("rt").unwrap().unwrap();
        assert!(Rc::ptr_eq(&got, &second));
    }

    #[test]
    fn typed_lookup_rejects_kind_mismatch() {
        let (registry, _backend) = registry();
        assert!(matches!(
            registry.get_as::<Texture>(DEFAULT_SHADER_KEY),
            Err(EngineError::InvalidArgument(_))
        ));
        assert!(registry.get_as::<Texture>("absent").unwrap().is_none());
    }

    #[test]
    fn removed_resource_stays_valid_for_holders() {
        let (mut registry, mut backend) = registry();
        let rt = render_target(&mut backend, registry.release_queue(), "rt");
        registry.add("a", rt.clone()).unwrap();
        registry.add("b", rt.clone()).unwrap();

        assert!(registry.remove("a").is_some());
        assert!(registry.remove("a").is_none());
        assert!(registry.contains("b"));
        assert!(rt.borrow().is_loaded());
        assert!(registry.get("b").is_some());
    }

    #[test]
    fn unload_tears_down_and_removes() {
        let (mut registry, mut backend) = registry();
        let rt = render_target(&mut backend, registry.release_queue(), "rt");
        registry.add("rt", rt.clone()).unwrap();

        assert!(registry.unload(&mut backend, "rt"));
        assert!(!rt.borrow().is_loaded());
        assert!(!registry.unload(&mut backend, "rt"));
    }

    // ── reserved keys ─────────────────────────────────────────────────────

    #[test]
    fn reserved_keys_only_accept_their_kind() {
        let (mut registry, mut backend) = registry();
        let rt = render_target(&mut backend, registry.release_queue(), "rt");
        assert!(matches!(
            registry.add(DEFAULT_SHADER_KEY, rt.clone()),
            Err(EngineError::InvalidArgument(_))
        ));

        registry.add(EMPTY_TEXTURE_KEY, rt.clone()).unwrap();
        assert!(Rc::ptr_eq(&registry.defaults().unwrap().texture, &rt));
    }

    #[test]
    fn load_or_get_rejects_reserved_keys() {
        let (mut registry, mut backend) = registry();
        assert!(matches!(
            registry.load_or_get::<Texture>(&mut backend, "x.png", EMPTY_TEXTURE_KEY),
            Err(EngineError::InvalidArgument(_))
        ));
    }

    // ── lifecycle ─────────────────────────────────────────────────────────

    #[test]
    fn release_unloads_everything() {
        let (mut registry, mut backend) = registry();
        let rt = render_target(&mut backend, registry.release_queue(), "rt");
        registry.add("rt", rt).unwrap();

        registry.release(&mut backend);
        assert!(registry.is_empty());
        assert!(registry.defaults().is_none());
        assert_eq!(backend.live_textures(), 0);
        assert_eq!(backend.live_programs(), 0);
    }

    #[test]
    fn removed_defaults_still_follow_the_device() {
        let (mut registry, mut backend) = registry();
        registry.remove(EMPTY_TEXTURE_KEY);

        backend.lose_device();
        registry.on_device_lost(&mut backend).unwrap();
        assert_eq!(backend.live_textures(), 0);
        backend.reset().unwrap();
        registry.on_device_restored(&mut backend).unwrap();

        assert!(registry.defaults().unwrap().texture.borrow().is_loaded());
    }

    #[test]
    fn shared_resource_follows_the_device_once() {
        let (mut registry, mut backend) = registry();
        let rt = render_target(&mut backend, registry.release_queue(), "rt");
        registry.add("a", rt.clone()).unwrap();
        registry.add("b", rt.clone()).unwrap();
        let live = backend.live_textures();

        backend.lose_device();
        registry.on_device_lost(&mut backend).unwrap();
        backend.reset().unwrap();
        registry.on_device_restored(&mut backend).unwrap();

        assert_eq!(backend.live_textures(), live);
        assert!(rt.borrow().is_loaded());
    }
}
