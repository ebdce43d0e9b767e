use glam::Vec2;

use crate::buffer::SharedBufferPool;
use crate::device::Device;
use crate::error::{DrawError, EngineError, Result};
use crate::gpu::{
    BufferUsage, DrawCall, IndexFormat, RenderBackend, Semantic, TextureFilter, UniformWrite,
};
use crate::resource::{DefaultResources, Resource};

use super::geometry_buffers::GeometryBuffers;
use super::render_object::{ObjectState, RenderObject};
use super::vertex::Vertex;

/// Something the scene can draw once per frame.
pub trait Renderable {
    fn render(&mut self, device: &mut Device) -> std::result::Result<(), DrawError>;
}

/// A [`RenderObject`] whose geometry lives in GPU buffers.
#[derive(Debug)]
pub struct StaticRenderObject {
    object: RenderObject,
    buffers: GeometryBuffers,
    scroll: Vec2,
}

impl StaticRenderObject {
    /// Initial vertex capacity.
    pub const VERTEX_CAPACITY: usize = 64;

    pub fn new(defaults: &DefaultResources, pool: SharedBufferPool) -> Self {
        Self::with_capacity(defaults, pool, Self::VERTEX_CAPACITY)
    }

    pub fn with_capacity(
        defaults: &DefaultResources,
        pool: SharedBufferPool,
        vertex_capacity: usize,
    ) -> Self {
        Self {
            object: RenderObject::new(defaults),
            buffers: GeometryBuffers::new(pool, vertex_capacity, BufferUsage::Static),
            scroll: Vec2::ZERO,
        }
    }

    #[inline]
    pub fn object(&self) -> &RenderObject {
        &self.object
    }

    #[inline]
    pub fn object_mut(&mut self) -> &mut RenderObject {
        &mut self.object
    }

    #[inline]
    pub fn buffers(&self) -> &GeometryBuffers {
        &self.buffers
    }

    /// Texture-coordinate offset added in the vertex stage.
    #[inline]
    pub fn scroll(&self) -> Vec2 {
        self.scroll
    }

    #[inline]
    pub fn set_scroll(&mut self, scroll: Vec2) {
        self.scroll = scroll;
    }

    #[inline]
    pub fn set_scroll_x(&mut self, x: f32) {
        self.scroll.x = x;
    }

    #[inline]
    pub fn set_scroll_y(&mut self, y: f32) {
        self.scroll.y = y;
    }

    /// Allocates the vertex buffer. Called lazily by the first upload or draw.
    pub fn initialize(&mut self, backend: &mut dyn RenderBackend) -> Result<()> {
        match self.object.state() {
            ObjectState::Ready => Ok(()),
            ObjectState::Destroyed => Err(EngineError::invalid("render object was destroyed")),
            ObjectState::Uninitialized => {
                self.buffers.allocate(backend)?;
                self.object.mark_ready();
                Ok(())
            }
        }
    }

    /// Grows the vertex buffer as needed and uploads the whole vertex list.
    pub fn update_vertex_buffer(&mut self, backend: &mut dyn RenderBackend) -> Result<()> {
        self.initialize(backend)?;
        self.buffers.upload_vertices(backend, self.object.vertices())?;
        self.object.clear_vertices_dirty();
        Ok(())
    }

    /// Grows the index buffer as needed and uploads the whole index list.
    pub fn update_index_buffer(&mut self, backend: &mut dyn RenderBackend) -> Result<()> {
        self.initialize(backend)?;
        self.buffers.upload_indices(backend, self.object.indices())?;
        self.object.clear_indices_dirty();
        Ok(())
    }

    /// Uploads edited geometry, and everything after a device reset.
    pub fn sync(&mut self, backend: &mut dyn RenderBackend) -> Result<()> {
        let lost = self.buffers.contents_lost();
        if lost || self.object.vertices_dirty() {
            self.update_vertex_buffer(backend)?;
        }
        if lost || self.object.indices_dirty() {
            self.update_index_buffer(backend)?;
        }
        Ok(())
    }

    /// Returns the buffers to the pool and makes further draws fail.
    pub fn destroy(&mut self) {
        self.buffers.release();
        self.object.destroy();
    }
}

/// [`StaticRenderObject`] drawn in screen space with the device view-projection.
#[derive(Debug)]
pub struct StaticRenderObject2D {
    geometry: StaticRenderObject,
}

impl StaticRenderObject2D {
    pub fn new(defaults: &DefaultResources, pool: SharedBufferPool) -> Self {
        Self {
            geometry: StaticRenderObject::new(defaults, pool),
        }
    }

    pub fn from_geometry(geometry: StaticRenderObject) -> Self {
        Self { geometry }
    }

    #[inline]
    pub fn geometry(&self) -> &StaticRenderObject {
        &self.geometry
    }

    #[inline]
    pub fn geometry_mut(&mut self) -> &mut StaticRenderObject {
        &mut self.geometry
    }

    #[inline]
    pub fn object(&self) -> &RenderObject {
        self.geometry.object()
    }

    #[inline]
    pub fn object_mut(&mut self) -> &mut RenderObject {
        self.geometry.object_mut()
    }
}

impl Renderable for StaticRenderObject2D {
    fn render(&mut self, device: &mut Device) -> std::result::Result<(), DrawError> {
        render_2d(device, &mut self.geometry)
    }
}

/// Draws `geometry` with its bound program's active technique, one draw per pass.
/// There is no fixed technique name: select one with `ShaderProgram::set_active_technique`.
///
/// Uploads dirty geometry first. Semantic parameters the program does not declare are
/// skipped. An empty primitive list draws nothing.
pub fn render_2d(
    device: &mut Device,
    geometry: &mut StaticRenderObject,
) -> std::result::Result<(), DrawError> {
    if geometry.object.state() == ObjectState::Destroyed {
        return Err(DrawError::Destroyed);
    }
    if !device.is_active() {
        return Err(DrawError::DeviceLost);
    }
    geometry.initialize(device.backend_mut())?;
    geometry.sync(device.backend_mut())?;

    let object = &geometry.object;
    let program = object.shader().borrow();
    let (Some(program_id), Some(layout)) = (program.id(), program.layout()) else {
        return Err(DrawError::MissingShader);
    };
    let technique_handle = program
        .active_technique()
        .ok_or_else(|| DrawError::MissingTechnique(program.name()))?;
    let technique = program
        .technique(technique_handle)
        .ok_or_else(|| DrawError::MissingTechnique(program.name()))?;

    let primitive_count = object.primitive_count();
    if primitive_count == 0 {
        return Ok(());
    }

    let Some(vertex_buffer) = geometry.buffers.vertex_buffer() else {
        return Err(DrawError::DeviceLost);
    };
    let index_buffer = if object.is_indexed() {
        let id = geometry.buffers.index_buffer().ok_or(DrawError::DeviceLost)?;
        Some((id, IndexFormat::U16))
    } else {
        None
    };

    device.set_texture_filter(TextureFilter::linear());
    device.set_blend_mode(object.blend_mode());

    let world = object.world_matrix().to_cols_array();
    let view_projection = device.view_projection().to_cols_array();
    let color = object.color().to_array();
    let scroll = geometry.scroll.to_array();

    let uniforms: Vec<UniformWrite<'_>> = layout
        .uniforms
        .iter()
        .filter_map(|slot| {
            let bytes: &[u8] = match slot.semantic? {
                Semantic::World => bytemuck::cast_slice(&world),
                Semantic::ViewProjection => bytemuck::cast_slice(&view_projection),
                Semantic::ObjectColor => bytemuck::cast_slice(&color),
                Semantic::UvScroll => bytemuck::cast_slice(&scroll),
            };
            Some(UniformWrite {
                binding: slot.binding,
                bytes,
            })
        })
        .collect();

    let texture = object.texture().borrow().id();

    for pass in 0..technique.passes.len() {
        device.draw(&DrawCall {
            program: program_id,
            technique: technique_handle.index(),
            pass,
            topology: object.topology(),
            primitive_count: primitive_count as u32,
            vertex_buffer,
            vertex_stride: Vertex::STRIDE as u32,
            vertex_count: object.vertices().len() as u32,
            index_buffer,
            texture,
            uniforms: &uniforms,
        })?;
    }
    Ok(())
}
