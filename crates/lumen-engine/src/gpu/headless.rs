//! Deterministic in-memory backend.
//!
//! Buffers and textures are plain byte vectors, draws are recorded instead of
//! rasterized. Device loss, reset failures and allocation failures can be injected,
//! which is what the lifecycle tests are built on.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use slotmap::SlotMap;

use crate::coords::Viewport;
use crate::error::{BackendError, BackendResult};
use crate::paint::Color;

use super::backend::{
    BufferDesc, BufferId, DeviceStatus, FrameStatus, ProgramId, RenderBackend, TextureDesc,
    TextureId, TextureUsage,
};
use super::draw::{DrawCall, PrimitiveTopology};
use super::program::ProgramSource;
use super::state::{BlendMode, TextureFilter};

const DEFAULT_MAX_TEXTURE_DIMENSION: u32 = 8192;

struct HeadlessBuffer {
    desc: BufferDesc,
    bytes: Vec<u8>,
}

struct HeadlessTexture {
    desc: TextureDesc,
    levels: Vec<Vec<u8>>,
}

/// A recorded draw with the state it was issued under.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    pub program: ProgramId,
    pub technique: usize,
    pub pass: usize,
    pub topology: PrimitiveTopology,
    pub primitive_count: u32,
    pub vertex_buffer: BufferId,
    pub vertex_count: u32,
    pub indexed: bool,
    pub texture: Option<TextureId>,
    pub blend: BlendMode,
    pub filter: TextureFilter,
    pub render_target: Option<TextureId>,
    pub uniforms: Vec<(u32, Vec<u8>)>,
}

impl DrawRecord {
    pub fn uniform(&self, binding: u32) -> Option<&[u8]> {
        self.uniforms
            .iter()
            .find(|(b, _)| *b == binding)
            .map(|(_, bytes)| bytes.as_slice())
    }
}

/// In-memory [`RenderBackend`].
pub struct HeadlessBackend {
    buffers: SlotMap<BufferId, HeadlessBuffer>,
    textures: SlotMap<TextureId, HeadlessTexture>,
    programs: SlotMap<ProgramId, ProgramSource>,

    status: DeviceStatus,
    surfaces_acquired: bool,
    in_frame: bool,

    blend: BlendMode,
    blend_changes: Vec<BlendMode>,
    filter: TextureFilter,
    viewport: Viewport,
    render_target: Option<TextureId>,
    draws: Vec<DrawRecord>,

    max_texture_dimension: u32,
    square_render_targets_only: bool,
    fail_allocations: bool,
    strict_reset: bool,
    reset_failures: VecDeque<BackendError>,

    resets: u32,
    frames: u32,
    presents: u32,
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self {
            buffers: SlotMap::with_key(),
            textures: SlotMap::with_key(),
            programs: SlotMap::with_key(),
            status: DeviceStatus::Operational,
            surfaces_acquired: true,
            in_frame: false,
            blend: BlendMode::Alpha,
            blend_changes: Vec::new(),
            filter: TextureFilter::default(),
            viewport: Viewport::default(),
            render_target: None,
            draws: Vec::new(),
            max_texture_dimension: DEFAULT_MAX_TEXTURE_DIMENSION,
            square_render_targets_only: false,
            fail_allocations: false,
            strict_reset: true,
            reset_failures: VecDeque::new(),
            resets: 0,
            frames: 0,
            presents: 0,
        }
    }

    // ── fault injection ───────────────────────────────────────────────────

    /// Loses the device in a resettable state.
    pub fn lose_device(&mut self) {
        self.status = DeviceStatus::NotReset;
    }

    pub fn set_status(&mut self, status: DeviceStatus) {
        self.status = status;
    }

    /// Queues an error for the next [`RenderBackend::reset`] call. Queued errors are
    /// consumed one per call.
    pub fn fail_next_reset(&mut self, err: BackendError) {
        self.reset_failures.push_back(err);
    }

    pub fn set_fail_allocations(&mut self, fail: bool) {
        self.fail_allocations = fail;
    }

    pub fn set_max_texture_dimension(&mut self, dim: u32) {
        self.max_texture_dimension = dim;
    }

    /// Rejects non-square render targets (older hardware restriction).
    pub fn set_square_render_targets_only(&mut self, square: bool) {
        self.square_render_targets_only = square;
    }

    /// With strict reset (the default), [`RenderBackend::reset`] fails with
    /// [`BackendError::InvalidCall`] while any backend object is still alive.
    pub fn set_strict_reset(&mut self, strict: bool) {
        self.strict_reset = strict;
    }

    // ── inspection ────────────────────────────────────────────────────────

    pub fn buffer_contents(&self, id: BufferId) -> Option<&[u8]> {
        self.buffers.get(id).map(|b| b.bytes.as_slice())
    }

    pub fn buffer_desc(&self, id: BufferId) -> Option<BufferDesc> {
        self.buffers.get(id).map(|b| b.desc)
    }

    pub fn texture_level(&self, id: TextureId, level: u32) -> Option<&[u8]> {
        self.textures
            .get(id)
            .and_then(|t| t.levels.get(level as usize))
            .map(Vec::as_slice)
    }

    pub fn texture_desc(&self, id: TextureId) -> Option<TextureDesc> {
        self.textures.get(id).map(|t| t.desc)
    }

    pub fn program_source(&self, id: ProgramId) -> Option<&ProgramSource> {
        self.programs.get(id)
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    pub fn draws(&self) -> &[DrawRecord] {
        &self.draws
    }

    pub fn take_draws(&mut self) -> Vec<DrawRecord> {
        std::mem::take(&mut self.draws)
    }

    /// Every blend mode applied, in order.
    pub fn blend_changes(&self) -> &[BlendMode] {
        &self.blend_changes
    }

    pub fn texture_filter(&self) -> TextureFilter {
        self.filter
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn render_target(&self) -> Option<TextureId> {
        self.render_target
    }

    pub fn surfaces_acquired(&self) -> bool {
        self.surfaces_acquired
    }

    pub fn resets(&self) -> u32 {
        self.resets
    }

    pub fn frames(&self) -> u32 {
        self.frames
    }

    pub fn presents(&self) -> u32 {
        self.presents
    }

    // ── helpers ───────────────────────────────────────────────────────────

    fn ensure_operational(&self) -> BackendResult<()> {
        match &self.status {
            DeviceStatus::Operational => Ok(()),
            DeviceStatus::Lost | DeviceStatus::NotReset => Err(BackendError::DeviceLost),
            DeviceStatus::Failed(msg) => Err(BackendError::Other(msg.clone())),
        }
    }

    fn ensure_allocation_allowed(&self) -> BackendResult<()> {
        self.ensure_operational()?;
        if self.fail_allocations {
            return Err(BackendError::OutOfMemory);
        }
        Ok(())
    }

    fn live_objects(&self) -> usize {
        self.buffers.len() + self.textures.len() + self.programs.len()
    }
}

fn level_extent(desc: &TextureDesc, level: u32) -> (u32, u32) {
    ((desc.width >> level).max(1), (desc.height >> level).max(1))
}

impl RenderBackend for HeadlessBackend {
    fn name(&self) -> &str {
        "headless"
    }

    fn status(&mut self) -> DeviceStatus {
        self.status.clone()
    }

    fn reset(&mut self) -> BackendResult<()> {
        match &self.status {
            DeviceStatus::Lost => return Err(BackendError::DeviceLost),
            DeviceStatus::Failed(msg) => return Err(BackendError::Other(msg.clone())),
            DeviceStatus::Operational | DeviceStatus::NotReset => {}
        }

        if let Some(err) = self.reset_failures.pop_front() {
            return Err(err);
        }

        if self.strict_reset && self.live_objects() > 0 {
            return Err(BackendError::InvalidCall(format!(
                "{} backend objects still alive at reset",
                self.live_objects()
            )));
        }

        // Stale keys from before the reset never resolve again.
        self.buffers.clear();
        self.textures.clear();
        self.programs.clear();
        self.render_target = None;
        self.status = DeviceStatus::Operational;
        self.resets += 1;
        Ok(())
    }

    fn release_surfaces(&mut self) {
        self.surfaces_acquired = false;
        self.in_frame = false;
    }

    fn acquire_surfaces(&mut self) -> BackendResult<()> {
        self.ensure_operational()?;
        self.surfaces_acquired = true;
        Ok(())
    }

    fn begin_frame(&mut self, _clear: Color) -> BackendResult<FrameStatus> {
        if self.ensure_operational().is_err() || !self.surfaces_acquired {
            return Ok(FrameStatus::Skipped);
        }
        self.in_frame = true;
        self.frames += 1;
        Ok(FrameStatus::Ready)
    }

    fn end_frame(&mut self, present: bool) -> BackendResult<()> {
        let was_in_frame = std::mem::take(&mut self.in_frame);
        if present && was_in_frame {
            self.ensure_operational()?;
            self.presents += 1;
        }
        Ok(())
    }

    fn create_buffer(&mut self, desc: &BufferDesc) -> BackendResult<BufferId> {
        self.ensure_allocation_allowed()?;
        if desc.size_bytes == 0 {
            return Err(BackendError::Unsupported("zero-sized buffer".into()));
        }
        let len = usize::try_from(desc.size_bytes).map_err(|_| BackendError::OutOfMemory)?;
        Ok(self.buffers.insert(HeadlessBuffer {
            desc: *desc,
            bytes: vec![0; len],
        }))
    }

    fn write_buffer(
        &mut self,
        id: BufferId,
        offset: u64,
        data: &[u8],
        _discard: bool,
    ) -> BackendResult<()> {
        self.ensure_operational()?;
        let buffer = self.buffers.get_mut(id).ok_or(BackendError::InvalidHandle)?;
        let start = offset as usize;
        let end = start
            .checked_add(data.len())
            .filter(|end| *end <= buffer.bytes.len())
            .ok_or_else(|| {
                BackendError::InvalidCall(format!(
                    "write of {} bytes at {offset} overruns {} byte buffer",
                    data.len(),
                    buffer.bytes.len()
                ))
            })?;
        buffer.bytes[start..end].copy_from_slice(data);
        Ok(())
    }

    fn destroy_buffer(&mut self, id: BufferId) -> BackendResult<()> {
        self.buffers
            .remove(id)
            .map(|_| ())
            .ok_or(BackendError::InvalidHandle)
    }

    fn max_texture_dimension(&self) -> u32 {
        self.max_texture_dimension
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> BackendResult<TextureId> {
        self.ensure_allocation_allowed()?;
        if desc.width == 0 || desc.height == 0 || desc.mip_levels == 0 {
            return Err(BackendError::Unsupported(format!(
                "degenerate texture {}x{} with {} levels",
                desc.width, desc.height, desc.mip_levels
            )));
        }
        if desc.width > self.max_texture_dimension || desc.height > self.max_texture_dimension {
            return Err(BackendError::Unsupported(format!(
                "texture {}x{} exceeds {} texels per edge",
                desc.width, desc.height, self.max_texture_dimension
            )));
        }
        if self.square_render_targets_only
            && desc.usage == TextureUsage::RenderTarget
            && desc.width != desc.height
        {
            return Err(BackendError::Unsupported(format!(
                "non-square render target {}x{}",
                desc.width, desc.height
            )));
        }

        let levels = (0..desc.mip_levels)
            .map(|level| {
                let (w, h) = level_extent(desc, level);
                vec![0; w as usize * h as usize * 4]
            })
            .collect();
        Ok(self.textures.insert(HeadlessTexture {
            desc: *desc,
            levels,
        }))
    }

    fn write_texture(&mut self, id: TextureId, level: u32, rgba: &[u8]) -> BackendResult<()> {
        self.ensure_operational()?;
        let texture = self.textures.get_mut(id).ok_or(BackendError::InvalidHandle)?;
        let (w, h) = level_extent(&texture.desc, level);
        let dst = texture
            .levels
            .get_mut(level as usize)
            .ok_or_else(|| BackendError::InvalidCall(format!("texture has no mip level {level}")))?;
        if rgba.len() != dst.len() {
            return Err(BackendError::InvalidCall(format!(
                "level {level} is {w}x{h} RGBA8 ({} bytes), got {} bytes",
                dst.len(),
                rgba.len()
            )));
        }
        dst.copy_from_slice(rgba);
        Ok(())
    }

    fn read_texture(&mut self, id: TextureId) -> BackendResult<Vec<u8>> {
        // Contents stay readable until the reset actually happens.
        match &self.status {
            DeviceStatus::Operational | DeviceStatus::NotReset => {}
            DeviceStatus::Lost => return Err(BackendError::DeviceLost),
            DeviceStatus::Failed(msg) => return Err(BackendError::Other(msg.clone())),
        }
        let texture = self.textures.get(id).ok_or(BackendError::InvalidHandle)?;
        texture
            .levels
            .first()
            .cloned()
            .ok_or(BackendError::InvalidHandle)
    }

    fn destroy_texture(&mut self, id: TextureId) -> BackendResult<()> {
        if self.render_target == Some(id) {
            self.render_target = None;
        }
        self.textures
            .remove(id)
            .map(|_| ())
            .ok_or(BackendError::InvalidHandle)
    }

    fn create_program(&mut self, source: &ProgramSource) -> BackendResult<ProgramId> {
        self.ensure_allocation_allowed()?;
        if source.layout.techniques.is_empty() {
            return Err(BackendError::InvalidCall(format!(
                "program `{}` declares no techniques",
                source.label
            )));
        }
        Ok(self.programs.insert(source.clone()))
    }

    fn destroy_program(&mut self, id: ProgramId) -> BackendResult<()> {
        self.programs
            .remove(id)
            .map(|_| ())
            .ok_or(BackendError::InvalidHandle)
    }

    fn set_blend_mode(&mut self, mode: BlendMode) {
        self.blend = mode;
        self.blend_changes.push(mode);
    }

    fn set_texture_filter(&mut self, filter: TextureFilter) {
        self.filter = filter;
    }

    fn set_viewport(&mut self, viewport: &Viewport) {
        self.viewport = *viewport;
    }

    fn set_render_target(&mut self, target: Option<TextureId>) -> BackendResult<()> {
        if let Some(id) = target {
            let texture = self.textures.get(id).ok_or(BackendError::InvalidHandle)?;
            if texture.desc.usage != TextureUsage::RenderTarget {
                return Err(BackendError::InvalidCall(
                    "texture is not a render target".into(),
                ));
            }
        }
        self.render_target = target;
        Ok(())
    }

    fn draw(&mut self, call: &DrawCall<'_>) -> BackendResult<()> {
        self.ensure_operational()?;

        let program = self
            .programs
            .get(call.program)
            .ok_or(BackendError::InvalidHandle)?;
        let technique = program
            .layout
            .techniques
            .get(call.technique)
            .ok_or_else(|| BackendError::InvalidCall(format!("no technique {}", call.technique)))?;
        if call.pass >= technique.passes.len() {
            return Err(BackendError::InvalidCall(format!(
                "technique `{}` has no pass {}",
                technique.name, call.pass
            )));
        }

        let vertex_buffer = self
            .buffers
            .get(call.vertex_buffer)
            .ok_or(BackendError::InvalidHandle)?;
        let needed = u64::from(call.vertex_count) * u64::from(call.vertex_stride);
        if needed > vertex_buffer.desc.size_bytes {
            return Err(BackendError::InvalidCall(format!(
                "{} vertices of {} bytes overrun a {} byte buffer",
                call.vertex_count, call.vertex_stride, vertex_buffer.desc.size_bytes
            )));
        }

        if let Some((index_buffer, format)) = call.index_buffer {
            let buffer = self
                .buffers
                .get(index_buffer)
                .ok_or(BackendError::InvalidHandle)?;
            let indices = call.topology.element_count(call.primitive_count as usize) as u64;
            if indices * format.size_bytes() > buffer.desc.size_bytes {
                return Err(BackendError::InvalidCall(format!(
                    "{indices} indices overrun a {} byte index buffer",
                    buffer.desc.size_bytes
                )));
            }
        }

        if let Some(texture) = call.texture {
            if !self.textures.contains_key(texture) {
                return Err(BackendError::InvalidHandle);
            }
        }

        self.draws.push(DrawRecord {
            program: call.program,
            technique: call.technique,
            pass: call.pass,
            topology: call.topology,
            primitive_count: call.primitive_count,
            vertex_buffer: call.vertex_buffer,
            vertex_count: call.vertex_count,
            indexed: call.index_buffer.is_some(),
            texture: call.texture,
            blend: self.blend,
            filter: self.filter,
            render_target: self.render_target,
            uniforms: call
                .uniforms
                .iter()
                .map(|u| (u.binding, u.bytes.to_vec()))
                .collect(),
        });
        Ok(())
    }
}

/// A headless backend that stays inspectable after being boxed into a
/// [`Device`](crate::device::Device).
pub type SharedHeadless = Rc<RefCell<HeadlessBackend>>;

impl HeadlessBackend {
    pub fn shared() -> SharedHeadless {
        Rc::new(RefCell::new(Self::new()))
    }
}

macro_rules! forward {
    ($($name:ident(&mut self $(, $arg:ident: $ty:ty)*) -> $ret:ty;)*) => {
        $(fn $name(&mut self $(, $arg: $ty)*) -> $ret { self.borrow_mut().$name($($arg),*) })*
    };
}

impl RenderBackend for SharedHeadless {
    fn name(&self) -> &str {
        "headless"
    }

    fn max_texture_dimension(&self) -> u32 {
        self.borrow().max_texture_dimension()
    }

    forward! {
        status(&mut self) -> DeviceStatus;
        reset(&mut self) -> BackendResult<()>;
        release_surfaces(&mut self) -> ();
        acquire_surfaces(&mut self) -> BackendResult<()>;
        begin_frame(&mut self, clear: Color) -> BackendResult<FrameStatus>;
        end_frame(&mut self, present: bool) -> BackendResult<()>;
        resize_surface(&mut self, width: u32, height: u32) -> ();
        create_buffer(&mut self, desc: &BufferDesc) -> BackendResult<BufferId>;
        write_buffer(&mut self, id: BufferId, offset: u64, data: &[u8], discard: bool) -> BackendResult<()>;
        destroy_buffer(&mut self, id: BufferId) -> BackendResult<()>;
        create_texture(&mut self, desc: &TextureDesc) -> BackendResult<TextureId>;
        write_texture(&mut self, id: TextureId, level: u32, rgba: &[u8]) -> BackendResult<()>;
        read_texture(&mut self, id: TextureId) -> BackendResult<Vec<u8>>;
        destroy_texture(&mut self, id: TextureId) -> BackendResult<()>;
        create_program(&mut self, source: &ProgramSource) -> BackendResult<ProgramId>;
        destroy_program(&mut self, id: ProgramId) -> BackendResult<()>;
        set_blend_mode(&mut self, mode: BlendMode) -> ();
        set_texture_filter(&mut self, filter: TextureFilter) -> ();
        set_viewport(&mut self, viewport: &Viewport) -> ();
        set_render_target(&mut self, target: Option<TextureId>) -> BackendResult<()>;
        draw(&mut self, call: &DrawCall<'_>) -> BackendResult<()>;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::{BufferKind, BufferUsage};

    fn vertex_desc(size_bytes: u64) -> BufferDesc {
        BufferDesc {
            size_bytes,
            kind: BufferKind::Vertex,
            usage: BufferUsage::Static,
        }
    }

    fn rt_desc(width: u32, height: u32) -> TextureDesc {
        TextureDesc {
            width,
            height,
            mip_levels: 1,
            usage: TextureUsage::RenderTarget,
        }
    }

    // ── buffers ───────────────────────────────────────────────────────────

    #[test]
    fn buffer_writes_are_bounds_checked() {
        let mut backend = HeadlessBackend::new();
        let id = backend.create_buffer(&vertex_desc(8)).unwrap();
        backend.write_buffer(id, 4, &[1, 2, 3, 4], false).unwrap();
        assert_eq!(backend.buffer_contents(id).unwrap(), &[0, 0, 0, 0, 1, 2, 3, 4]);
        assert!(matches!(
            backend.write_buffer(id, 6, &[1, 2, 3], false),
            Err(BackendError::InvalidCall(_))
        ));
    }

    #[test]
    fn allocation_failure_is_out_of_memory() {
        let mut backend = HeadlessBackend::new();
        backend.set_fail_allocations(true);
        assert_eq!(
            backend.create_buffer(&vertex_desc(16)),
            Err(BackendError::OutOfMemory)
        );
    }

    // ── textures ──────────────────────────────────────────────────────────

    #[test]
    fn square_only_rejects_rectangular_targets() {
        let mut backend = HeadlessBackend::new();
        backend.set_square_render_targets_only(true);
        assert!(matches!(
            backend.create_texture(&rt_desc(64, 32)),
            Err(BackendError::Unsupported(_))
        ));
        assert!(backend.create_texture(&rt_desc(64, 64)).is_ok());
    }

    #[test]
    fn texture_levels_shrink_by_half() {
        let mut backend = HeadlessBackend::new();
        let id = backend
            .create_texture(&TextureDesc {
                width: 4,
                height: 2,
                mip_levels: 3,
                usage: TextureUsage::Sampled,
            })
            .unwrap();
        assert_eq!(backend.texture_level(id, 0).unwrap().len(), 4 * 2 * 4);
        assert_eq!(backend.texture_level(id, 1).unwrap().len(), 2 * 4);
        assert_eq!(backend.texture_level(id, 2).unwrap().len(), 4);
        assert!(backend.write_texture(id, 1, &[0; 3]).is_err());
    }

    // ── lifecycle ─────────────────────────────────────────────────────────

    #[test]
    fn lost_device_rejects_work_but_keeps_contents_readable() {
        let mut backend = HeadlessBackend::new();
        let id = backend.create_texture(&rt_desc(1, 1)).unwrap();
        backend.write_texture(id, 0, &[9, 8, 7, 6]).unwrap();

        backend.lose_device();
        assert_eq!(backend.status(), DeviceStatus::NotReset);
        assert_eq!(
            backend.create_buffer(&vertex_desc(4)),
            Err(BackendError::DeviceLost)
        );
        assert_eq!(backend.read_texture(id).unwrap(), vec![9, 8, 7, 6]);
    }

    #[test]
    fn strict_reset_requires_everything_released() {
        let mut backend = HeadlessBackend::new();
        let id = backend.create_buffer(&vertex_desc(4)).unwrap();
        backend.lose_device();
        assert!(matches!(backend.reset(), Err(BackendError::InvalidCall(_))));

        backend.destroy_buffer(id).unwrap();
        backend.reset().unwrap();
        assert_eq!(backend.status(), DeviceStatus::Operational);
        assert_eq!(backend.resets(), 1);
    }

    #[test]
    fn handles_from_before_reset_are_stale() {
        let mut backend = HeadlessBackend::new();
        backend.set_strict_reset(false);
        let old = backend.create_buffer(&vertex_desc(4)).unwrap();
        backend.lose_device();
        backend.reset().unwrap();
        let _new = backend.create_buffer(&vertex_desc(4)).unwrap();
        assert_eq!(backend.destroy_buffer(old), Err(BackendError::InvalidHandle));
    }

    #[test]
    fn queued_reset_failures_are_consumed_in_order() {
        let mut backend = HeadlessBackend::new();
        backend.lose_device();
        backend.fail_next_reset(BackendError::DeviceLost);
        assert_eq!(backend.reset(), Err(BackendError::DeviceLost));
        assert_eq!(backend.reset(), Ok(()));
    }
}
