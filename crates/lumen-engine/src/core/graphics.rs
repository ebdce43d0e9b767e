use std::path::Path;

use crate::buffer::{GpuBufferPool, SharedBufferPool};
use crate::config::GraphicsConfig;
use crate::device::{Device, DeviceInit};
use crate::error::Result;
use crate::gpu::{FrameStatus, RenderBackend};
use crate::object::{Sprite2D, StaticRenderObject2D};
use crate::resource::{
    DefaultResources, Resource, ResourceRegistry, ShaderProgram, Shared, Texture,
};

/// Process-level graphics context: the device, the resource registry and the
/// geometry buffer pool, wired together as device listeners.
///
/// Passed explicitly to whatever needs it; nothing here is global.
pub struct Graphics {
    device: Device,
    registry: Shared<ResourceRegistry>,
    buffers: SharedBufferPool,
    /// Defaults created at startup; used if the registry lost its own.
    initial_defaults: DefaultResources,
    config: GraphicsConfig,
}

impl Graphics {
    /// Creates the device on `backend` and initializes the registry defaults.
    pub fn new(backend: Box<dyn RenderBackend>, config: GraphicsConfig) -> Result<Self> {
        let mut device = Device::new(
            backend,
            DeviceInit {
                screen_width: config.screen_width,
                screen_height: config.screen_height,
            },
        );

        let registry = ResourceRegistry::new_shared(config.asset_root.clone(), device.release_queue());
        let defaults = registry.borrow_mut().initialize(device.backend_mut())?;
        let buffers = GpuBufferPool::new_shared();

        device.register_listener(&registry);
        device.register_listener(&buffers);

        Ok(Self {
            device,
            registry,
            buffers,
            initial_defaults: defaults,
            config,
        })
    }

    #[inline]
    pub fn device(&self) -> &Device {
        &self.device
    }

    #[inline]
    pub fn device_mut(&mut self) -> &mut Device {
        &mut self.device
    }

    #[inline]
    pub fn registry(&self) -> &Shared<ResourceRegistry> {
        &self.registry
    }

    #[inline]
    pub fn buffer_pool(&self) -> &SharedBufferPool {
        &self.buffers
    }

    /// Current substitutes for unset textures and shaders, including replacements
    /// added under the reserved keys.
    pub fn defaults(&self) -> DefaultResources {
        self.registry
            .borrow()
            .defaults()
            .unwrap_or_else(|| self.initial_defaults.clone())
    }

    #[inline]
    pub fn config(&self) -> &GraphicsConfig {
        &self.config
    }

    /// Loads an image under `key`, or returns the texture already registered there.
    pub fn load_texture(&mut self, path: impl AsRef<Path>, key: &str) -> Result<Shared<Texture>> {
        self.registry
            .borrow_mut()
            .load_or_get::<Texture>(self.device.backend_mut(), path.as_ref(), key)
    }

    /// Loads a WGSL program under `key`, or returns the one already registered there.
    pub fn load_program(
        &mut self,
        path: impl AsRef<Path>,
        key: &str,
    ) -> Result<Shared<ShaderProgram>> {
        self.registry
            .borrow_mut()
            .load_or_get::<ShaderProgram>(self.device.backend_mut(), path.as_ref(), key)
    }

    pub fn new_sprite(&self) -> Sprite2D {
        Sprite2D::new(&self.defaults(), self.buffers.clone())
    }

    pub fn new_object_2d(&self) -> StaticRenderObject2D {
        StaticRenderObject2D::new(&self.defaults(), self.buffers.clone())
    }

    /// Clears with the configured color. See [`Device::begin_frame`].
    pub fn begin_frame(&mut self) -> Result<FrameStatus> {
        self.buffers
            .borrow_mut()
            .collect_retired(self.device.backend_mut());
        self.device.begin_frame(self.config.clear_color)
    }

    pub fn end_frame(&mut self, present: bool) -> Result<()> {
        self.device.end_frame(present)
    }
}

impl Drop for Graphics {
    fn drop(&mut self) {
        let backend = self.device.backend_mut();
        self.registry.borrow_mut().release(backend);
        self.initial_defaults.texture.borrow_mut().unload(backend);
        self.initial_defaults.program.borrow_mut().unload(backend);
        self.buffers.borrow_mut().collect_retired(backend);
        self.device.collect_released();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AssetRoot;
    use crate::gpu::HeadlessBackend;
    use crate::object::Renderable;

    fn graphics() -> (Graphics, crate::gpu::SharedHeadless) {
        let backend = HeadlessBackend::shared();
        let config = GraphicsConfig {
            asset_root: AssetRoot::new("."),
            ..GraphicsConfig::default()
        };
        let gfx = Graphics::new(Box::new(backend.clone()), config).unwrap();
        (gfx, backend)
    }

    #[test]
    fn registry_and_pool_follow_the_device() {
        let (mut gfx, backend) = graphics();
        assert_eq!(gfx.device().listener_count(), 2);

        let mut sprite = gfx.new_sprite();
        sprite.render(gfx.device_mut()).unwrap();

        backend.borrow_mut().lose_device();
        assert!(gfx.device_mut().test_cooperation().unwrap());
        sprite.render(gfx.device_mut()).unwrap();
        assert_eq!(backend.borrow().draws().len(), 2);
    }

    #[test]
    fn new_objects_pick_up_replaced_defaults() {
        let (mut gfx, _backend) = graphics();
        let mut texture = Texture::new(gfx.device().release_queue());
        texture
            .create_render_target(gfx.device_mut().backend_mut(), "white", 2, 2)
            .unwrap();
        let texture = std::rc::Rc::new(std::cell::RefCell::new(texture));
        gfx.registry()
            .borrow_mut()
            .add(crate::resource::EMPTY_TEXTURE_KEY, texture.clone())
            .unwrap();

        let sprite = gfx.new_sprite();
        assert!(std::rc::Rc::ptr_eq(sprite.object().texture(), &texture));
    }

    #[test]
    fn drop_releases_every_backend_object() {
        let (gfx, backend) = graphics();
        let sprite = gfx.new_sprite();
        drop(sprite);
        drop(gfx);
        let backend = backend.borrow();
        assert_eq!(backend.live_textures(), 0);
        assert_eq!(backend.live_programs(), 0);
        assert_eq!(backend.live_buffers(), 0);
    }
}
