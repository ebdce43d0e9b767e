use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::RgbaImage;

use crate::error::{BackendError, EngineError, Result};
use crate::gpu::{ReleaseQueue, ReleasedHandle, RenderBackend, TextureDesc, TextureId, TextureUsage};
use crate::paint::Color;

use super::{Resource, ResourceKind};

/// Sampled image or render target.
///
/// Render targets survive device loss: their pixels are read back to a staging copy
/// before the handle is released and written again after the target is recreated.
/// File textures are reloaded from their source path on restore.
pub struct Texture {
    id: Option<TextureId>,
    kind: ResourceKind,
    /// Source path for file textures, name for render targets.
    path: PathBuf,
    width: u32,
    height: u32,
    mip_levels: u32,
    mipmaps: bool,
    staging: Option<Vec<u8>>,
    /// Device was lost while this texture was loaded; recreate it on restore.
    restore_pending: bool,
    releases: ReleaseQueue,
}

impl std::fmt::Debug for Texture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Texture")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("path", &self.path)
            .field("size", &(self.width, self.height))
            .finish()
    }
}

impl Texture {
    pub fn new(releases: ReleaseQueue) -> Self {
        Self {
            id: None,
            kind: ResourceKind::Texture,
            path: PathBuf::new(),
            width: 0,
            height: 0,
            mip_levels: 0,
            mipmaps: false,
            staging: None,
            restore_pending: false,
            releases,
        }
    }

    #[inline]
    pub fn id(&self) -> Option<TextureId> {
        self.id
    }

    #[inline]
    pub fn is_loaded(&self) -> bool {
        self.id.is_some()
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn mip_levels(&self) -> u32 {
        self.mip_levels
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub fn is_render_target(&self) -> bool {
        self.kind == ResourceKind::RenderTarget
    }

    /// Decodes an image file into a sampled texture, optionally with a full mip chain.
    pub fn load_from_file(
        &mut self,
        backend: &mut dyn RenderBackend,
        path: impl AsRef<Path>,
        mipmaps: bool,
    ) -> Result<()> {
        let path = path.as_ref();
        self.release_handle(backend);

        let image = image::open(path)
            .map_err(|err| EngineError::load(path, err))?
            .to_rgba8();
        let levels = mip_chain(image, mipmaps);
        let (width, height) = levels[0].dimensions();

        let desc = TextureDesc {
            width,
            height,
            mip_levels: levels.len() as u32,
            usage: TextureUsage::Sampled,
        };
        let id = backend
            .create_texture(&desc)
            .map_err(|err| EngineError::load(path, err))?;
        for (level, pixels) in levels.iter().enumerate() {
            if let Err(err) = backend.write_texture(id, level as u32, pixels.as_raw()) {
                let _ = backend.destroy_texture(id);
                return Err(EngineError::load(path, err));
            }
        }

        self.id = Some(id);
        self.kind = ResourceKind::Texture;
        self.path = path.to_path_buf();
        self.width = width;
        self.height = height;
        self.mip_levels = desc.mip_levels;
        self.mipmaps = mipmaps;
        self.staging = None;
        self.restore_pending = false;
        log::debug!("loaded texture {} ({width}x{height}, {} levels)", path.display(), desc.mip_levels);
        Ok(())
    }

    /// Allocates a `width x height` render target.
    ///
    /// A size the backend rejects is retried once as a square of `max(width, height)`.
    pub fn create_render_target(
        &mut self,
        backend: &mut dyn RenderBackend,
        name: &str,
        width: u32,
        height: u32,
    ) -> Result<()> {
        self.release_handle(backend);

        let mut desc = TextureDesc {
            width,
            height,
            mip_levels: 1,
            usage: TextureUsage::RenderTarget,
        };
        let id = match backend.create_texture(&desc) {
            Ok(id) => id,
            Err(first) => {
                let edge = width.max(height);
                log::debug!("render target `{name}` {width}x{height} rejected ({first}); retrying at {edge}x{edge}");
                desc.width = edge;
                desc.height = edge;
                backend
                    .create_texture(&desc)
                    .map_err(|err| EngineError::load(name, err))?
            }
        };

        self.id = Some(id);
        self.kind = ResourceKind::RenderTarget;
        self.path = PathBuf::from(name);
        self.width = desc.width;
        self.height = desc.height;
        self.mip_levels = 1;
        self.mipmaps = false;
        self.restore_pending = false;
        Ok(())
    }

    /// Uploads tightly packed RGBA8 pixels to level 0.
    pub fn write_pixels(&mut self, backend: &mut dyn RenderBackend, rgba: &[u8]) -> Result<()> {
        let id = self
            .id
            .ok_or_else(|| EngineError::invalid(format!("texture `{}` is not loaded", self.path.display())))?;
        backend.write_texture(id, 0, rgba).map_err(|err| match err {
            BackendError::InvalidCall(msg) => EngineError::invalid(msg),
            other => EngineError::allocation(format!("upload to `{}`", self.path.display()), other),
        })
    }

    /// Fills level 0 with one color.
    pub fn fill(&mut self, backend: &mut dyn RenderBackend, color: Color) -> Result<()> {
        let texel = color.to_rgba8();
        let pixels: Vec<u8> = texel
            .iter()
            .copied()
            .cycle()
            .take(self.width as usize * self.height as usize * 4)
            .collect();
        self.write_pixels(backend, &pixels)
    }

    /// Reads level 0 back as RGBA8.
    pub fn read_pixels(&self, backend: &mut dyn RenderBackend) -> Result<Vec<u8>> {
        let id = self
            .id
            .ok_or_else(|| EngineError::invalid(format!("texture `{}` is not loaded", self.path.display())))?;
        backend
            .read_texture(id)
            .map_err(|err| EngineError::allocation(format!("readback of `{}`", self.path.display()), err))
    }

    fn release_handle(&mut self, backend: &mut dyn RenderBackend) {
        if let Some(id) = self.id.take() {
            if let Err(err) = backend.destroy_texture(id) {
                log::debug!("destroying texture `{}`: {err}", self.path.display());
            }
        }
    }

    fn stage_render_target(&mut self, backend: &mut dyn RenderBackend, id: TextureId) -> Result<()> {
        match backend.read_texture(id) {
            Ok(pixels) => {
                self.staging = Some(pixels);
                Ok(())
            }
            Err(BackendError::DeviceLost) => {
                log::warn!(
                    "render target `{}` could not be read back before reset; it will be restored cleared",
                    self.path.display()
                );
                self.staging = None;
                Ok(())
            }
            Err(err) => Err(EngineError::DeviceFatal(format!(
                "staging render target `{}`: {err}",
                self.path.display()
            ))),
        }
    }

    fn restore_render_target(&mut self, backend: &mut dyn RenderBackend) -> Result<()> {
        let desc = TextureDesc {
            width: self.width,
            height: self.height,
            mip_levels: 1,
            usage: TextureUsage::RenderTarget,
        };
        let id = backend.create_texture(&desc).map_err(|err| {
            EngineError::DeviceFatal(format!("recreating render target `{}`: {err}", self.path.display()))
        })?;
        self.id = Some(id);

        if let Some(pixels) = self.staging.take() {
            backend.write_texture(id, 0, &pixels).map_err(|err| {
                EngineError::DeviceFatal(format!("restoring render target `{}`: {err}", self.path.display()))
            })?;
        }
        Ok(())
    }
}

/// Level 0 plus, with `mipmaps`, box-filtered levels down to 1x1.
fn mip_chain(base: RgbaImage, mipmaps: bool) -> Vec<RgbaImage> {
    let mut levels = vec![base];
    if !mipmaps {
        return levels;
    }
    loop {
        let (w, h) = levels[levels.len() - 1].dimensions();
        if w == 1 && h == 1 {
            break;
        }
        let (nw, nh) = ((w / 2).max(1), (h / 2).max(1));
        let next = image::imageops::resize(&levels[levels.len() - 1], nw, nh, FilterType::Triangle);
        levels.push(next);
    }
    levels
}

impl Resource for Texture {
    fn kind(&self) -> ResourceKind {
        self.kind
    }

    fn name(&self) -> String {
        self.path.display().to_string()
    }

    fn load(&mut self, backend: &mut dyn RenderBackend, path: &Path) -> Result<()> {
        self.load_from_file(backend, path, false)
    }

    fn unload(&mut self, backend: &mut dyn RenderBackend) {
        self.release_handle(backend);
        self.staging = None;
        self.restore_pending = false;
    }

    fn on_device_lost(&mut self, backend: &mut dyn RenderBackend) -> Result<()> {
        let Some(id) = self.id else { return Ok(()) };

        if self.kind == ResourceKind::RenderTarget {
            self.stage_render_target(backend, id)?;
        }
        self.restore_pending = true;
        self.release_handle(backend);
        Ok(())
    }

    fn on_device_restored(&mut self, backend: &mut dyn RenderBackend) -> Result<()> {
        if !std::mem::take(&mut self.restore_pending) {
            return Ok(());
        }
        match self.kind {
            ResourceKind::RenderTarget => self.restore_render_target(backend),
            _ => {
                let path = self.path.clone();
                if let Err(err) = self.load_from_file(backend, &path, self.mipmaps) {
                    log::warn!("texture not restored after device reset: {err}");
                }
                Ok(())
            }
        }
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        if let Some(id) = self.id.take() {
            self.releases.push(ReleasedHandle::Texture(id));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::HeadlessBackend;

    fn write_png(dir: &tempfile::TempDir, name: &str, w: u32, h: u32) -> PathBuf {
        let path = dir.path().join(name);
        let image = RgbaImage::from_fn(w, h, |x, y| image::Rgba([x as u8, y as u8, 7, 255]));
        image.save(&path).unwrap();
        path
    }

    // ── file textures ─────────────────────────────────────────────────────

    #[test]
    fn loads_png_pixels() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(&dir, "a.png", 2, 2);
        let mut backend = HeadlessBackend::new();
        let mut texture = Texture::new(ReleaseQueue::new());

        texture.load_from_file(&mut backend, &path, false).unwrap();
        assert_eq!((texture.width(), texture.height(), texture.mip_levels()), (2, 2, 1));
        let level = backend.texture_level(texture.id().unwrap(), 0).unwrap();
        assert_eq!(&level[4..8], &[1, 0, 7, 255]);
    }

    #[test]
    fn mipmaps_go_down_to_one_texel() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(&dir, "m.png", 8, 2);
        let mut backend = HeadlessBackend::new();
        let mut texture = Texture::new(ReleaseQueue::new());

        texture.load_from_file(&mut backend, &path, true).unwrap();
        assert_eq!(texture.mip_levels(), 4);
        assert_eq!(backend.texture_level(texture.id().unwrap(), 3).unwrap().len(), 4);
    }

    #[test]
    fn missing_file_is_a_load_error() {
        let mut backend = HeadlessBackend::new();
        let mut texture = Texture::new(ReleaseQueue::new());
        let err = texture
            .load_from_file(&mut backend, "/nonexistent/x.png", false)
            .unwrap_err();
        assert!(matches!(err, EngineError::ResourceLoad { .. }));
    }

    // ── render targets ────────────────────────────────────────────────────

    #[test]
    fn rejected_size_retries_square() {
        let mut backend = HeadlessBackend::new();
        backend.set_square_render_targets_only(true);
        let mut texture = Texture::new(ReleaseQueue::new());

        texture
            .create_render_target(&mut backend, "rt", 64, 16)
            .unwrap();
        assert_eq!((texture.width(), texture.height()), (64, 64));
    }

    #[test]
    fn failed_retry_is_a_load_error() {
        let mut backend = HeadlessBackend::new();
        backend.set_max_texture_dimension(32);
        let mut texture = Texture::new(ReleaseQueue::new());

        let err = texture
            .create_render_target(&mut backend, "big", 64, 16)
            .unwrap_err();
        assert!(matches!(err, EngineError::ResourceLoad { .. }));
        assert!(!texture.is_loaded());
    }

    #[test]
    fn render_target_contents_survive_reset() {
        let mut backend = HeadlessBackend::new();
        let mut texture = Texture::new(ReleaseQueue::new());
        texture.create_render_target(&mut backend, "rt", 2, 1).unwrap();
        texture
            .write_pixels(&mut backend, &[1, 2, 3, 4, 5, 6, 7, 8])
            .unwrap();

        backend.lose_device();
        texture.on_device_lost(&mut backend).unwrap();
        assert!(!texture.is_loaded());
        backend.reset().unwrap();
        texture.on_device_restored(&mut backend).unwrap();

        assert_eq!(texture.read_pixels(&mut backend).unwrap(), vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn repeated_restore_keeps_one_handle_and_its_pixels() {
        let mut backend = HeadlessBackend::new();
        let mut texture = Texture::new(ReleaseQueue::new());
        texture.create_render_target(&mut backend, "rt", 2, 1).unwrap();
        texture
            .write_pixels(&mut backend, &[1, 2, 3, 4, 5, 6, 7, 8])
            .unwrap();

        backend.lose_device();
        texture.on_device_lost(&mut backend).unwrap();
        texture.on_device_lost(&mut backend).unwrap();
        backend.reset().unwrap();
        texture.on_device_restored(&mut backend).unwrap();
        texture.on_device_restored(&mut backend).unwrap();

        assert_eq!(backend.live_textures(), 1);
        assert_eq!(texture.read_pixels(&mut backend).unwrap(), vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn unloaded_target_stays_unloaded_after_reset() {
        let mut backend = HeadlessBackend::new();
        let mut texture = Texture::new(ReleaseQueue::new());
        texture.create_render_target(&mut backend, "rt", 1, 1).unwrap();
        texture.unload(&mut backend);

        backend.lose_device();
        texture.on_device_lost(&mut backend).unwrap();
        backend.reset().unwrap();
        texture.on_device_restored(&mut backend).unwrap();

        assert!(!texture.is_loaded());
        assert_eq!(backend.live_textures(), 0);
    }

    #[test]
    fn unreadable_target_is_restored_cleared() {
        let mut backend = HeadlessBackend::new();
        let mut texture = Texture::new(ReleaseQueue::new());
        texture.create_render_target(&mut backend, "rt", 1, 1).unwrap();
        texture.fill(&mut backend, Color::WHITE).unwrap();

        backend.set_status(crate::gpu::DeviceStatus::Lost);
        texture.on_device_lost(&mut backend).unwrap();
        backend.lose_device();
        backend.reset().unwrap();
        texture.on_device_restored(&mut backend).unwrap();

        assert_eq!(texture.read_pixels(&mut backend).unwrap(), vec![0, 0, 0, 0]);
    }

    #[test]
    fn file_texture_reloads_after_reset() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(&dir, "r.png", 1, 1);
        let mut backend = HeadlessBackend::new();
        let mut texture = Texture::new(ReleaseQueue::new());
        texture.load_from_file(&mut backend, &path, false).unwrap();

        backend.lose_device();
        texture.on_device_lost(&mut backend).unwrap();
        backend.reset().unwrap();
        texture.on_device_restored(&mut backend).unwrap();
        assert!(texture.is_loaded());
    }

    #[test]
    fn dropped_texture_queues_its_handle() {
        let mut backend = HeadlessBackend::new();
        let releases = ReleaseQueue::new();
        let mut texture = Texture::new(releases.clone());
        texture.create_render_target(&mut backend, "rt", 1, 1).unwrap();
        drop(texture);

        assert_eq!(releases.drain(&mut backend), 1);
        assert_eq!(backend.live_textures(), 0);
    }
}
