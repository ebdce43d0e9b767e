use std::collections::HashMap;

use crate::gpu::{BlendMode, FilterMode, Pass, PrimitiveTopology, ProgramId, ProgramLayout, TextureFilter};
use crate::object::Vertex;

/// Vertex layout shared by every program: position, color, texcoord.
const VERTEX_ATTRS: [wgpu::VertexAttribute; 3] =
    wgpu::vertex_attr_array![0 => Float32x3, 1 => Unorm8x4, 2 => Float32x2];

pub(crate) const VERTEX_STRIDE: u64 = Vertex::STRIDE as u64;

fn vertex_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: VERTEX_STRIDE,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &VERTEX_ATTRS,
    }
}

/// Color blend per mode. Alpha always accumulates coverage.
pub(crate) fn blend_state(mode: BlendMode) -> wgpu::BlendState {
    use wgpu::{BlendComponent, BlendFactor as F, BlendOperation as Op};

    let component = |src_factor, dst_factor, operation| BlendComponent {
        src_factor,
        dst_factor,
        operation,
    };

    let color = match mode {
        BlendMode::Alpha => component(F::SrcAlpha, F::OneMinusSrcAlpha, Op::Add),
        BlendMode::Add => component(F::SrcAlpha, F::One, Op::Add),
        BlendMode::Subtract => component(F::SrcAlpha, F::One, Op::ReverseSubtract),
        BlendMode::RevSubtract => component(F::SrcAlpha, F::One, Op::Subtract),
        BlendMode::Invert => component(F::OneMinusDst, F::OneMinusSrc, Op::Add),
    };

    wgpu::BlendState {
        color,
        alpha: BlendComponent {
            src_factor: F::One,
            dst_factor: F::OneMinusSrcAlpha,
            operation: Op::Add,
        },
    }
}

/// Fans are drawn as triangle lists through a generated index list.
pub(crate) fn map_topology(topology: PrimitiveTopology) -> wgpu::PrimitiveTopology {
    match topology {
        PrimitiveTopology::Points => wgpu::PrimitiveTopology::PointList,
        PrimitiveTopology::Lines => wgpu::PrimitiveTopology::LineList,
        PrimitiveTopology::LineStrip => wgpu::PrimitiveTopology::LineStrip,
        PrimitiveTopology::Triangles | PrimitiveTopology::TriangleFan => {
            wgpu::PrimitiveTopology::TriangleList
        }
        PrimitiveTopology::TriangleStrip => wgpu::PrimitiveTopology::TriangleStrip,
    }
}

/// Triangle-list indices equivalent to a fan over `vertices` vertices.
pub(crate) fn fan_indices(vertices: u32) -> Vec<u32> {
    (1..vertices.saturating_sub(1))
        .flat_map(|i| [0, i, i + 1])
        .collect()
}

pub(crate) fn sampler_descriptor(filter: TextureFilter) -> wgpu::SamplerDescriptor<'static> {
    let map = |mode| match mode {
        FilterMode::Nearest => wgpu::FilterMode::Nearest,
        FilterMode::Linear => wgpu::FilterMode::Linear,
    };
    wgpu::SamplerDescriptor {
        label: Some("lumen sampler"),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: map(filter.mag),
        min_filter: map(filter.min),
        mipmap_filter: match filter.mip {
            FilterMode::Nearest => wgpu::MipmapFilterMode::Nearest,
            FilterMode::Linear => wgpu::MipmapFilterMode::Linear,
        },
        ..Default::default()
    }
}

/// Group 0 layout derived from reflection: uniforms, then the texture and sampler.
pub(crate) fn bind_group_layout(
    device: &wgpu::Device,
    label: &str,
    layout: &ProgramLayout,
) -> wgpu::BindGroupLayout {
    let mut entries: Vec<wgpu::BindGroupLayoutEntry> = layout
        .uniforms
        .iter()
        .map(|slot| wgpu::BindGroupLayoutEntry {
            binding: slot.binding,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        })
        .collect();

    if let Some(binding) = layout.texture_binding {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        });
    }
    if let Some(binding) = layout.sampler_binding {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        });
    }

    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &entries,
    })
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub(crate) struct PipelineKey {
    pub program: ProgramId,
    pub technique: usize,
    pub pass: usize,
    pub topology: wgpu::PrimitiveTopology,
    pub blend: BlendMode,
    pub format: wgpu::TextureFormat,
}

/// Render pipelines built on first use.
#[derive(Default)]
pub(crate) struct PipelineCache {
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
}

impl PipelineCache {
    pub fn get_or_create(
        &mut self,
        device: &wgpu::Device,
        key: PipelineKey,
        module: &wgpu::ShaderModule,
        layout: &wgpu::PipelineLayout,
        pass: &Pass,
    ) -> wgpu::RenderPipeline {
        self.pipelines
            .entry(key)
            .or_insert_with(|| {
                log::debug!(
                    "building pipeline {} / {} ({:?}, {:?}, {:?})",
                    pass.vertex_entry,
                    pass.fragment_entry,
                    key.topology,
                    key.blend,
                    key.format
                );
                device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                    label: Some("lumen pipeline"),
                    layout: Some(layout),
                    vertex: wgpu::VertexState {
                        module,
                        entry_point: Some(&pass.vertex_entry),
                        compilation_options: Default::default(),
                        buffers: &[vertex_layout()],
                    },
                    fragment: Some(wgpu::FragmentState {
                        module,
                        entry_point: Some(&pass.fragment_entry),
                        compilation_options: Default::default(),
                        targets: &[Some(wgpu::ColorTargetState {
                            format: key.format,
                            blend: Some(blend_state(key.blend)),
                            write_mask: wgpu::ColorWrites::ALL,
                        })],
                    }),
                    primitive: wgpu::PrimitiveState {
                        topology: key.topology,
                        strip_index_format: None,
                        front_face: wgpu::FrontFace::Ccw,
                        cull_mode: None,
                        polygon_mode: wgpu::PolygonMode::Fill,
                        unclipped_depth: false,
                        conservative: false,
                    },
                    depth_stencil: None,
                    multisample: wgpu::MultisampleState::default(),
                    multiview_mask: None,
                    cache: None,
                })
            })
            .clone()
    }

    /// Drops every pipeline built from `program`.
    pub fn evict_program(&mut self, program: ProgramId) {
        self.pipelines.retain(|key, _| key.program != program);
    }

    pub fn clear(&mut self) {
        self.pipelines.clear();
    }
}
