//! wgpu implementation of [`RenderBackend`].
//!
//! One window surface, one device. Draws are recorded into the frame encoder as
//! individual render passes; uniforms and bind groups are built per draw. Device
//! loss is reported by the wgpu device-lost callback and recovered by requesting a
//! new device from the same adapter.

mod context;
mod init;
mod pipeline;
mod surface;

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use slotmap::SlotMap;
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::coords::Viewport;
use crate::error::{BackendError, BackendResult};
use crate::paint::Color;

use super::backend::{
    BufferDesc, BufferId, BufferKind, DeviceStatus, FrameStatus, ProgramId, RenderBackend,
    TextureDesc, TextureId, TextureUsage,
};
use super::draw::{DrawCall, IndexFormat, PrimitiveTopology};
use super::program::{ProgramLayout, ProgramSource};
use super::state::{BlendMode, TextureFilter};

use context::GpuContext;
use pipeline::{PipelineCache, PipelineKey};

pub use init::GpuInit;

/// Format of every texture the engine creates.
const TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

struct WgpuBuffer {
    buffer: wgpu::Buffer,
    desc: BufferDesc,
    /// CPU copy so unaligned partial writes can be widened to 4-byte boundaries.
    shadow: Vec<u8>,
}

struct WgpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    desc: TextureDesc,
}

/// Acquired surface texture plus the encoder the frame's passes are recorded into.
/// Holding it blocks the next acquire.
struct ActiveFrame {
    surface_texture: wgpu::SurfaceTexture,
    view: wgpu::TextureView,
    encoder: wgpu::CommandEncoder,
}

struct WgpuProgram {
    label: String,
    module: wgpu::ShaderModule,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    layout: ProgramLayout,
}

/// Rendering backend on a wgpu device presenting to a winit window.
pub struct WgpuBackend {
    ctx: GpuContext,

    buffers: SlotMap<BufferId, WgpuBuffer>,
    textures: SlotMap<TextureId, WgpuTexture>,
    programs: SlotMap<ProgramId, WgpuProgram>,

    pipelines: PipelineCache,
    samplers: HashMap<TextureFilter, wgpu::Sampler>,
    /// Bound when a draw has no texture.
    fallback_view: wgpu::TextureView,

    frame: Option<ActiveFrame>,
    surfaces_released: bool,

    blend: BlendMode,
    filter: TextureFilter,
    viewport: Viewport,
    render_target: Option<TextureId>,
}

impl WgpuBackend {
    /// Creates the device and configures a surface for `window`.
    pub fn new(window: Arc<Window>, init: GpuInit) -> Result<Self> {
        let ctx = pollster::block_on(GpuContext::new(window, init))?;
        let fallback_view = create_fallback_view(&ctx);
        let size = ctx.size();

        Ok(Self {
            ctx,
            buffers: SlotMap::with_key(),
            textures: SlotMap::with_key(),
            programs: SlotMap::with_key(),
            pipelines: PipelineCache::default(),
            samplers: HashMap::new(),
            fallback_view,
            frame: None,
            surfaces_released: false,
            blend: BlendMode::Alpha,
            filter: TextureFilter::linear(),
            viewport: Viewport::new(0.0, 0.0, size.width as f32, size.height as f32),
            render_target: None,
        })
    }

    #[inline]
    pub fn window(&self) -> &Window {
        self.ctx.window()
    }

    #[inline]
    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.ctx.surface_format()
    }

    fn ensure_operational(&self) -> BackendResult<()> {
        if self.ctx.is_lost() {
            return Err(BackendError::DeviceLost);
        }
        Ok(())
    }

    fn sampler(&mut self, filter: TextureFilter) -> wgpu::Sampler {
        let device = self.ctx.device();
        self.samplers
            .entry(filter)
            .or_insert_with(|| device.create_sampler(&pipeline::sampler_descriptor(filter)))
            .clone()
    }

    /// Color view and format draws currently land in, plus its size.
    fn target(&self) -> BackendResult<(wgpu::TextureView, wgpu::TextureFormat, (u32, u32))> {
        match self.render_target {
            Some(id) => {
                let texture = self.textures.get(id).ok_or(BackendError::InvalidHandle)?;
                Ok((
                    texture.view.clone(),
                    TEXTURE_FORMAT,
                    (texture.desc.width, texture.desc.height),
                ))
            }
            None => {
                let frame = self.frame.as_ref().ok_or_else(|| {
                    BackendError::InvalidCall("draw to the surface outside a frame".into())
                })?;
                let size = self.ctx.size();
                Ok((
                    frame.view.clone(),
                    self.ctx.surface_format(),
                    (size.width, size.height),
                ))
            }
        }
    }

    fn bind_group(
        &mut self,
        program: ProgramId,
        call: &DrawCall<'_>,
    ) -> BackendResult<wgpu::BindGroup> {
        let sampler = self.sampler(self.filter);
        let program = self.programs.get(program).ok_or(BackendError::InvalidHandle)?;
        let device = self.ctx.device();

        let uniforms: Vec<(u32, wgpu::Buffer)> = program
            .layout
            .uniforms
            .iter()
            .map(|slot| {
                let bytes = call
                    .uniforms
                    .iter()
                    .find(|u| u.binding == slot.binding)
                    .map_or(&[][..], |u| u.bytes);
                let len = (slot.size as usize).max(bytes.len()).max(16).next_multiple_of(16);
                let mut contents = vec![0u8; len];
                contents[..bytes.len()].copy_from_slice(bytes);
                let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(&slot.name),
                    contents: &contents,
                    usage: wgpu::BufferUsages::UNIFORM,
                });
                (slot.binding, buffer)
            })
            .collect();

        let view = match call.texture {
            Some(id) => &self.textures.get(id).ok_or(BackendError::InvalidHandle)?.view,
            None => &self.fallback_view,
        };

        let mut entries: Vec<wgpu::BindGroupEntry<'_>> = uniforms
            .iter()
            .map(|(binding, buffer)| wgpu::BindGroupEntry {
                binding: *binding,
                resource: buffer.as_entire_binding(),
            })
            .collect();
        if let Some(binding) = program.layout.texture_binding {
            entries.push(wgpu::BindGroupEntry {
                binding,
                resource: wgpu::BindingResource::TextureView(view),
            });
        }
        if let Some(binding) = program.layout.sampler_binding {
            entries.push(wgpu::BindGroupEntry {
                binding,
                resource: wgpu::BindingResource::Sampler(&sampler),
            });
        }

        Ok(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&program.label),
            layout: &program.bind_group_layout,
            entries: &entries,
        }))
    }

    /// Forgets every object of the previous device.
    fn clear_objects(&mut self) {
        self.frame = None;
        self.buffers.clear();
        self.textures.clear();
        self.programs.clear();
        self.pipelines.clear();
        self.samplers.clear();
        self.render_target = None;
    }
}

fn create_fallback_view(ctx: &GpuContext) -> wgpu::TextureView {
    let extent = wgpu::Extent3d {
        width: 1,
        height: 1,
        depth_or_array_layers: 1,
    };
    let texture = ctx.device().create_texture(&wgpu::TextureDescriptor {
        label: Some("lumen fallback texture"),
        size: extent,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: TEXTURE_FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    ctx.queue().write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &[0xff; 4],
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4),
            rows_per_image: Some(1),
        },
        extent,
    );
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

fn level_extent(desc: &TextureDesc, level: u32) -> (u32, u32) {
    (
        desc.width.checked_shr(level).unwrap_or(0).max(1),
        desc.height.checked_shr(level).unwrap_or(0).max(1),
    )
}

/// Viewport clipped to the target; `None` when nothing of it remains.
fn clip_viewport(viewport: &Viewport, (width, height): (u32, u32)) -> Option<[f32; 6]> {
    let x = viewport.x.clamp(0.0, width as f32);
    let y = viewport.y.clamp(0.0, height as f32);
    let w = viewport.width.min(width as f32 - x);
    let h = viewport.height.min(height as f32 - y);
    if !(w > 0.0 && h > 0.0) {
        return None;
    }
    let near = viewport.near.clamp(0.0, 1.0);
    let far = viewport.far.clamp(near, 1.0);
    Some([x, y, w, h, near, far])
}

impl RenderBackend for WgpuBackend {
    fn name(&self) -> &str {
        "wgpu"
    }

    // ── lifecycle ─────────────────────────────────────────────────────────

    fn status(&mut self) -> DeviceStatus {
        if self.ctx.is_lost() {
            // The adapter hands out a new device right away.
            DeviceStatus::NotReset
        } else {
            DeviceStatus::Operational
        }
    }

    fn reset(&mut self) -> BackendResult<()> {
        self.clear_objects();
        self.ctx.recreate_device()?;
        self.fallback_view = create_fallback_view(&self.ctx);
        log::info!("wgpu device recreated");
        Ok(())
    }

    fn release_surfaces(&mut self) {
        self.frame = None;
        self.surfaces_released = true;
    }

    fn acquire_surfaces(&mut self) -> BackendResult<()> {
        self.ensure_operational()?;
        self.ctx.configure_surface();
        self.surfaces_released = false;
        Ok(())
    }

    // ── frame ─────────────────────────────────────────────────────────────

    fn begin_frame(&mut self, clear: Color) -> BackendResult<FrameStatus> {
        let size = self.ctx.size();
        if self.surfaces_released || self.ctx.is_lost() || size.width == 0 || size.height == 0 {
            return Ok(FrameStatus::Skipped);
        }

        let surface_texture = match self.ctx.surface().get_current_texture() {
            Ok(texture) => texture,
            Err(err) => {
                log::debug!("surface acquisition failed: {err}");
                return self.ctx.recover_surface(&err).into_frame_status();
            }
        };
        let view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .ctx
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("lumen frame encoder"),
            });

        {
            let _rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("lumen clear"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: clear.r as f64,
                            g: clear.g as f64,
                            b: clear.b as f64,
                            a: clear.a as f64,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
        }

        self.frame = Some(ActiveFrame {
            surface_texture,
            view,
            encoder,
        });
        Ok(FrameStatus::Ready)
    }

    fn end_frame(&mut self, present: bool) -> BackendResult<()> {
        let Some(frame) = self.frame.take() else {
            return Ok(());
        };
        self.ctx
            .queue()
            .submit(std::iter::once(frame.encoder.finish()));
        drop(frame.view);

        if present {
            self.ctx.window().pre_present_notify();
            frame.surface_texture.present();
        }
        self.ensure_operational()
    }

    fn resize_surface(&mut self, width: u32, height: u32) {
        self.frame = None;
        self.ctx.resize(PhysicalSize::new(width, height));
    }

    // ── buffers ───────────────────────────────────────────────────────────

    fn create_buffer(&mut self, desc: &BufferDesc) -> BackendResult<BufferId> {
        self.ensure_operational()?;
        if desc.size_bytes == 0 {
            return Err(BackendError::Unsupported("zero-sized buffer".into()));
        }
        let size = desc.size_bytes.next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT);
        let usage = match desc.kind {
            BufferKind::Vertex => wgpu::BufferUsages::VERTEX,
            BufferKind::Index16 | BufferKind::Index32 => wgpu::BufferUsages::INDEX,
        } | wgpu::BufferUsages::COPY_DST;

        let buffer = self.ctx.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some("lumen geometry"),
            size,
            usage,
            mapped_at_creation: false,
        });
        let shadow_len = usize::try_from(size).map_err(|_| BackendError::OutOfMemory)?;
        Ok(self.buffers.insert(WgpuBuffer {
            buffer,
            desc: *desc,
            shadow: vec![0; shadow_len],
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
            .filter(|end| *end as u64 <= buffer.desc.size_bytes)
            .ok_or_else(|| {
                BackendError::InvalidCall(format!(
                    "write of {} bytes at {offset} overruns {} byte buffer",
                    data.len(),
                    buffer.desc.size_bytes
                ))
            })?;
        buffer.shadow[start..end].copy_from_slice(data);

        let align = wgpu::COPY_BUFFER_ALIGNMENT as usize;
        let aligned_start = start - start % align;
        let aligned_end = end.next_multiple_of(align).min(buffer.shadow.len());
        self.ctx.queue().write_buffer(
            &buffer.buffer,
            aligned_start as u64,
            &buffer.shadow[aligned_start..aligned_end],
        );
        Ok(())
    }

    fn destroy_buffer(&mut self, id: BufferId) -> BackendResult<()> {
        self.buffers
            .remove(id)
            .map(|_| ())
            .ok_or(BackendError::InvalidHandle)
    }

    // ── textures ──────────────────────────────────────────────────────────

    fn max_texture_dimension(&self) -> u32 {
        self.ctx.device().limits().max_texture_dimension_2d
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> BackendResult<TextureId> {
        self.ensure_operational()?;
        let max = self.max_texture_dimension();
        if desc.width == 0 || desc.height == 0 || desc.mip_levels == 0 {
            return Err(BackendError::Unsupported(format!(
                "degenerate texture {}x{} with {} levels",
                desc.width, desc.height, desc.mip_levels
            )));
        }
        if desc.width > max || desc.height > max {
            return Err(BackendError::Unsupported(format!(
                "texture {}x{} exceeds {max} texels per edge",
                desc.width, desc.height
            )));
        }

        let mut usage = wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_DST
            | wgpu::TextureUsages::COPY_SRC;
        if desc.usage == TextureUsage::RenderTarget {
            usage |= wgpu::TextureUsages::RENDER_ATTACHMENT;
        }

        let texture = self.ctx.device().create_texture(&wgpu::TextureDescriptor {
            label: Some("lumen texture"),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: desc.mip_levels,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TEXTURE_FORMAT,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Ok(self.textures.insert(WgpuTexture {
            texture,
            view,
            desc: *desc,
        }))
    }

    fn write_texture(&mut self, id: TextureId, level: u32, rgba: &[u8]) -> BackendResult<()> {
        self.ensure_operational()?;
        let texture = self.textures.get(id).ok_or(BackendError::InvalidHandle)?;
        if level >= texture.desc.mip_levels {
            return Err(BackendError::InvalidCall(format!("texture has no mip level {level}")));
        }
        let (w, h) = level_extent(&texture.desc, level);
        let expected = w as usize * h as usize * 4;
        if rgba.len() != expected {
            return Err(BackendError::InvalidCall(format!(
                "level {level} is {w}x{h} RGBA8 ({expected} bytes), got {} bytes",
                rgba.len()
            )));
        }

        self.ctx.queue().write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture.texture,
                mip_level: level,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(w * 4),
                rows_per_image: Some(h),
            },
            wgpu::Extent3d {
                width: w,
                height: h,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    fn read_texture(&mut self, id: TextureId) -> BackendResult<Vec<u8>> {
        self.ensure_operational()?;
        let texture = self.textures.get(id).ok_or(BackendError::InvalidHandle)?;
        let TextureDesc { width, height, .. } = texture.desc;

        let unpadded = width * 4;
        let padded = unpadded.next_multiple_of(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);
        let device = self.ctx.device();
        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("lumen readback"),
            size: u64::from(padded) * u64::from(height),
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("lumen readback encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &texture.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.ctx
            .queue()
            .submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|err| BackendError::Other(format!("poll failed: {err}")))?;

        match rx.recv() {
            Ok(Ok(())) => {}
            // The callback is dropped unanswered when the device goes away.
            Ok(Err(_)) | Err(_) => {
                self.ensure_operational()?;
                return Err(BackendError::DeviceLost);
            }
        }

        let mapped = slice.get_mapped_range();
        let mut pixels = Vec::with_capacity(unpadded as usize * height as usize);
        for row in mapped.chunks(padded as usize).take(height as usize) {
            pixels.extend_from_slice(&row[..unpadded as usize]);
        }
        drop(mapped);
        staging.unmap();
        Ok(pixels)
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

    // ── programs ──────────────────────────────────────────────────────────

    fn create_program(&mut self, source: &ProgramSource) -> BackendResult<ProgramId> {
        self.ensure_operational()?;
        if source.layout.techniques.is_empty() {
            return Err(BackendError::InvalidCall(format!(
                "program `{}` declares no techniques",
                source.label
            )));
        }

        // Catch invalid modules here; wgpu would only report them as uncaptured errors.
        let module = naga::front::wgsl::parse_str(&source.wgsl)
            .map_err(|err| BackendError::InvalidCall(err.emit_to_string(&source.wgsl)))?;
        naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::default(),
        )
        .validate(&module)
        .map_err(|err| BackendError::InvalidCall(format!("{}: {err}", source.label)))?;

        let device = self.ctx.device();
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&source.label),
            source: wgpu::ShaderSource::Wgsl(source.wgsl.as_str().into()),
        });
        let bind_group_layout = pipeline::bind_group_layout(device, &source.label, &source.layout);
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&source.label),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        Ok(self.programs.insert(WgpuProgram {
            label: source.label.clone(),
            module,
            bind_group_layout,
            pipeline_layout,
            layout: source.layout.clone(),
        }))
    }

    fn destroy_program(&mut self, id: ProgramId) -> BackendResult<()> {
        self.programs.remove(id).ok_or(BackendError::InvalidHandle)?;
        self.pipelines.evict_program(id);
        Ok(())
    }

    // ── state + draw ──────────────────────────────────────────────────────

    fn set_blend_mode(&mut self, mode: BlendMode) {
        self.blend = mode;
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
        if call.primitive_count == 0 {
            return Ok(());
        }
        if u64::from(call.vertex_stride) != pipeline::VERTEX_STRIDE {
            return Err(BackendError::Unsupported(format!(
                "vertex stride {} (expected {})",
                call.vertex_stride,
                pipeline::VERTEX_STRIDE
            )));
        }
        let fan = call.topology == PrimitiveTopology::TriangleFan;
        if fan && call.index_buffer.is_some() {
            return Err(BackendError::Unsupported("indexed triangle fans".into()));
        }

        let (target_view, format, target_size) = self.target()?;
        let Some([vx, vy, vw, vh, near, far]) = clip_viewport(&self.viewport, target_size) else {
            return Ok(());
        };

        let bind_group = self.bind_group(call.program, call)?;

        let program = self
            .programs
            .get(call.program)
            .ok_or(BackendError::InvalidHandle)?;
        let pass = program
            .layout
            .techniques
            .get(call.technique)
            .and_then(|technique| technique.passes.get(call.pass))
            .ok_or_else(|| {
                BackendError::InvalidCall(format!(
                    "program `{}` has no technique {} pass {}",
                    program.label, call.technique, call.pass
                ))
            })?;
        let key = PipelineKey {
            program: call.program,
            technique: call.technique,
            pass: call.pass,
            topology: pipeline::map_topology(call.topology),
            blend: self.blend,
            format,
        };
        let render_pipeline = self.pipelines.get_or_create(
            self.ctx.device(),
            key,
            &program.module,
            &program.pipeline_layout,
            pass,
        );

        let vertex_buffer = self
            .buffers
            .get(call.vertex_buffer)
            .ok_or(BackendError::InvalidHandle)?
            .buffer
            .clone();
        let elements = call.topology.element_count(call.primitive_count as usize) as u32;

        let indices = match call.index_buffer {
            Some((id, format)) => {
                let buffer = self.buffers.get(id).ok_or(BackendError::InvalidHandle)?;
                let format = match format {
                    IndexFormat::U16 => wgpu::IndexFormat::Uint16,
                };
                Some((buffer.buffer.clone(), format, elements))
            }
            None if fan => {
                let list = pipeline::fan_indices(elements);
                let buffer = self
                    .ctx
                    .device()
                    .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some("lumen fan indices"),
                        contents: bytemuck::cast_slice(&list),
                        usage: wgpu::BufferUsages::INDEX,
                    });
                Some((buffer, wgpu::IndexFormat::Uint32, list.len() as u32))
            }
            None => None,
        };

        let mut standalone = None;
        let encoder = match self.frame.as_mut() {
            Some(frame) => &mut frame.encoder,
            None => standalone.insert(self.ctx.device().create_command_encoder(
                &wgpu::CommandEncoderDescriptor {
                    label: Some("lumen offscreen encoder"),
                },
            )),
        };

        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("lumen draw"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            rpass.set_viewport(vx, vy, vw, vh, near, far);
            rpass.set_pipeline(&render_pipeline);
            rpass.set_bind_group(0, &bind_group, &[]);
            rpass.set_vertex_buffer(0, vertex_buffer.slice(..));
            match &indices {
                Some((buffer, format, count)) => {
                    rpass.set_index_buffer(buffer.slice(..), *format);
                    rpass.draw_indexed(0..*count, 0, 0..1);
                }
                None => rpass.draw(0..elements, 0..1),
            }
        }

        if let Some(encoder) = standalone {
            self.ctx
                .queue()
                .submit(std::iter::once(encoder.finish()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewport_is_clipped_to_the_target() {
        let vp = Viewport::new(-10.0, 20.0, 700.0, 100.0);
        let [x, y, w, h, near, far] = clip_viewport(&vp, (640, 480)).unwrap();
        assert_eq!((x, y, w, h), (0.0, 20.0, 640.0, 100.0));
        assert_eq!((near, far), (0.0, 1.0));
    }

    #[test]
    fn viewport_outside_the_target_draws_nothing() {
        let vp = Viewport::new(700.0, 0.0, 100.0, 100.0);
        assert!(clip_viewport(&vp, (640, 480)).is_none());
    }

    #[test]
    fn mip_extents_never_reach_zero() {
        let desc = TextureDesc {
            width: 8,
            height: 2,
            mip_levels: 4,
            usage: TextureUsage::Sampled,
        };
        assert_eq!(level_extent(&desc, 2), (2, 1));
        assert_eq!(level_extent(&desc, 3), (1, 1));
    }
}
