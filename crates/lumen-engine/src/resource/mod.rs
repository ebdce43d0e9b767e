//! GPU-backed resources and the name-keyed registry that owns them.

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use crate::error::Result;
use crate::gpu::{ReleaseQueue, RenderBackend};

mod program;
mod reflect;
mod registry;
mod texture;

pub use program::{ShaderProgram, ShaderStage, TechniqueHandle};
pub use reflect::reflect_program;
pub use registry::{DefaultResources, ResourceRegistry, DEFAULT_SHADER_KEY, EMPTY_TEXTURE_KEY};
pub use texture::Texture;

/// Source of the built-in program used when an object has no shader assigned.
pub const DEFAULT_PROGRAM_WGSL: &str = include_str!("shaders/default_2d.wgsl");

/// Shared, mutable resource reference.
pub type Shared<T> = Rc<RefCell<T>>;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ResourceKind {
    Texture,
    RenderTarget,
    ShaderProgram,
}

/// A resource owning backend handles.
pub trait Resource {
    fn kind(&self) -> ResourceKind;

    /// Display name (source path, or render-target name).
    fn name(&self) -> String;

    /// Loads from `path` (already resolved against the asset root).
    fn load(&mut self, backend: &mut dyn RenderBackend, path: &Path) -> Result<()>;

    /// Releases backend handles. The resource may be loaded again afterwards.
    fn unload(&mut self, backend: &mut dyn RenderBackend);

    fn on_device_lost(&mut self, backend: &mut dyn RenderBackend) -> Result<()>;

    fn on_device_restored(&mut self, backend: &mut dyn RenderBackend) -> Result<()>;
}

/// Registry slot: one variant per concrete resource type.
#[derive(Debug, Clone)]
pub enum ResourceEntry {
    Texture(Shared<Texture>),
    Program(Shared<ShaderProgram>),
}

impl ResourceEntry {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Texture(t) => t.borrow().kind(),
            Self::Program(_) => ResourceKind::ShaderProgram,
        }
    }

    pub fn as_resource(&self) -> Rc<RefCell<dyn Resource>> {
        match self {
            Self::Texture(t) => t.clone() as Rc<RefCell<dyn Resource>>,
            Self::Program(p) => p.clone() as Rc<RefCell<dyn Resource>>,
        }
    }

    /// Same underlying object.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Texture(a), Self::Texture(b)) => Rc::ptr_eq(a, b),
            (Self::Program(a), Self::Program(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Resource types the registry can construct and hand out with a checked conversion.
pub trait RegistryResource: Resource + Sized + 'static {
    /// Short name used in kind-mismatch errors.
    const TYPE_NAME: &'static str;

    fn create(releases: ReleaseQueue) -> Self;

    fn into_entry(shared: Shared<Self>) -> ResourceEntry;

    fn from_entry(entry: &ResourceEntry) -> Option<Shared<Self>>;
}

impl RegistryResource for Texture {
    const TYPE_NAME: &'static str = "texture";

    fn create(releases: ReleaseQueue) -> Self {
        Texture::new(releases)
    }

    fn into_entry(shared: Shared<Self>) -> ResourceEntry {
        ResourceEntry::Texture(shared)
    }

    fn from_entry(entry: &ResourceEntry) -> Option<Shared<Self>> {
        match entry {
            ResourceEntry::Texture(t) => Some(t.clone()),
            _ => None,
        }
    }
}

impl RegistryResource for ShaderProgram {
    const TYPE_NAME: &'static str = "shader program";

    fn create(releases: ReleaseQueue) -> Self {
        ShaderProgram::new(releases)
    }

    fn into_entry(shared: Shared<Self>) -> ResourceEntry {
        ResourceEntry::Program(shared)
    }

    fn from_entry(entry: &ResourceEntry) -> Option<Shared<Self>> {
        match entry {
            ResourceEntry::Program(p) => Some(p.clone()),
            _ => None,
        }
    }
}
