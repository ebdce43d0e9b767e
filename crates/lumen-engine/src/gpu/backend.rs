use crate::coords::Viewport;
use crate::error::BackendResult;
use crate::paint::Color;

use super::draw::DrawCall;
use super::program::ProgramSource;
use super::state::{BlendMode, TextureFilter};

slotmap::new_key_type! {
    /// Backend vertex/index buffer.
    pub struct BufferId;
    /// Backend texture (sampled image or render target).
    pub struct TextureId;
    /// Backend shader program.
    pub struct ProgramId;
}

/// Result of the per-frame cooperation test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceStatus {
    /// Device is usable.
    Operational,
    /// Device is lost and cannot be reset yet.
    Lost,
    /// Device is lost and can be reset now.
    NotReset,
    /// Unexpected failure; no recovery path exists.
    Failed(String),
}

/// What a buffer stores.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BufferKind {
    Vertex,
    Index16,
    Index32,
}

/// Update-frequency hint.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum BufferUsage {
    #[default]
    Static,
    Dynamic,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct BufferDesc {
    pub size_bytes: u64,
    pub kind: BufferKind,
    pub usage: BufferUsage,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum TextureUsage {
    /// Sampled only; contents come from uploads.
    Sampled,
    /// Sampled and drawable. Contents do not survive a device reset.
    RenderTarget,
}

/// Texture creation parameters. The pixel format is always 8-bit RGBA.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub mip_levels: u32,
    pub usage: TextureUsage,
}

/// Frame acquisition outcome.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FrameStatus {
    Ready,
    /// No drawable this frame (surface reconfigured, timeout, device lost).
    Skipped,
}

/// Graphics API seam.
///
/// Everything above this trait is backend-agnostic. Handles returned by a backend
/// become invalid after [`RenderBackend::reset`]; owners are expected to drop them
/// in their device-lost hook and allocate new ones in their restore hook.
pub trait RenderBackend {
    /// Human-readable backend name for logs.
    fn name(&self) -> &str;

    // ── lifecycle ─────────────────────────────────────────────────────────

    /// Per-frame cooperation test.
    fn status(&mut self) -> DeviceStatus;

    /// Rebuilds the device after loss. Invalidates every handle issued so far.
    ///
    /// `Err(BackendError::DeviceLost)` means "not yet, try again next frame".
    fn reset(&mut self) -> BackendResult<()>;

    /// Releases surfaces that cannot survive a reset (back buffer, depth buffer).
    fn release_surfaces(&mut self);

    /// Re-acquires the surfaces dropped by [`RenderBackend::release_surfaces`].
    fn acquire_surfaces(&mut self) -> BackendResult<()>;

    // ── frame ─────────────────────────────────────────────────────────────

    fn begin_frame(&mut self, clear: Color) -> BackendResult<FrameStatus>;

    fn end_frame(&mut self, present: bool) -> BackendResult<()>;

    /// Window resize. Backends without a surface ignore it.
    fn resize_surface(&mut self, width: u32, height: u32) {
        let _ = (width, height);
    }

    // ── buffers ───────────────────────────────────────────────────────────

    fn create_buffer(&mut self, desc: &BufferDesc) -> BackendResult<BufferId>;

    /// Writes `data` at `offset` bytes. `discard` hints that prior contents may be dropped.
    fn write_buffer(
        &mut self,
        id: BufferId,
        offset: u64,
        data: &[u8],
        discard: bool,
    ) -> BackendResult<()>;

    fn destroy_buffer(&mut self, id: BufferId) -> BackendResult<()>;

    // ── textures ──────────────────────────────────────────────────────────

    /// Largest edge accepted by [`RenderBackend::create_texture`].
    fn max_texture_dimension(&self) -> u32;

    fn create_texture(&mut self, desc: &TextureDesc) -> BackendResult<TextureId>;

    /// Uploads tightly packed RGBA8 pixels for one mip level.
    fn write_texture(&mut self, id: TextureId, level: u32, rgba: &[u8]) -> BackendResult<()>;

    /// Reads level 0 back as tightly packed RGBA8 pixels.
    fn read_texture(&mut self, id: TextureId) -> BackendResult<Vec<u8>>;

    fn destroy_texture(&mut self, id: TextureId) -> BackendResult<()>;

    // ── programs ──────────────────────────────────────────────────────────

    fn create_program(&mut self, source: &ProgramSource) -> BackendResult<ProgramId>;

    fn destroy_program(&mut self, id: ProgramId) -> BackendResult<()>;

    // ── state + draw ──────────────────────────────────────────────────────

    fn set_blend_mode(&mut self, mode: BlendMode);

    fn set_texture_filter(&mut self, filter: TextureFilter);

    fn set_viewport(&mut self, viewport: &Viewport);

    /// Redirects draws into a render-target texture, or back to the surface with `None`.
    fn set_render_target(&mut self, target: Option<TextureId>) -> BackendResult<()>;

    fn draw(&mut self, call: &DrawCall<'_>) -> BackendResult<()>;
}
