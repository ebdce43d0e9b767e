use glam::Mat4;

use crate::error::{EngineError, Result};
use crate::gpu::{BlendMode, PrimitiveTopology};
use crate::paint::Color;
use crate::resource::{DefaultResources, ShaderProgram, Shared, Texture};

use super::transform::Transform;
use super::vertex::{Vertex, MAX_BUFFER_ELEMENTS};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ObjectState {
    /// Constructed; backend buffers not allocated yet.
    Uninitialized,
    Ready,
    /// Terminal. Draws fail with [`DrawError::Destroyed`](crate::error::DrawError::Destroyed).
    Destroyed,
}

/// Geometry and material of one drawable.
///
/// Texture and shader are never unset: assigning `None` substitutes the registry
/// defaults captured at construction. Vertex and index lists hold at most
/// [`MAX_BUFFER_ELEMENTS`] entries; longer input is truncated.
#[derive(Debug)]
pub struct RenderObject {
    transform: Transform,
    color: Color,
    topology: PrimitiveTopology,
    blend: BlendMode,

    defaults: DefaultResources,
    texture: Shared<Texture>,
    shader: Shared<ShaderProgram>,

    vertices: Vec<Vertex>,
    indices: Vec<u16>,
    vertices_dirty: bool,
    indices_dirty: bool,

    state: ObjectState,
}

impl RenderObject {
    pub fn new(defaults: &DefaultResources) -> Self {
        Self {
            transform: Transform::default(),
            color: Color::WHITE,
            topology: PrimitiveTopology::Triangles,
            blend: BlendMode::Alpha,
            texture: defaults.texture.clone(),
            shader: defaults.program.clone(),
            defaults: defaults.clone(),
            vertices: Vec::new(),
            indices: Vec::new(),
            vertices_dirty: false,
            indices_dirty: false,
            state: ObjectState::Uninitialized,
        }
    }

    #[inline]
    pub fn state(&self) -> ObjectState {
        self.state
    }

    pub(crate) fn mark_ready(&mut self) {
        if self.state == ObjectState::Uninitialized {
            self.state = ObjectState::Ready;
        }
    }

    /// Drops the geometry and makes every further draw fail.
    pub fn destroy(&mut self) {
        self.state = ObjectState::Destroyed;
        self.vertices = Vec::new();
        self.indices = Vec::new();
    }

    // ── transform ─────────────────────────────────────────────────────────

    #[inline]
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    #[inline]
    pub fn transform_mut(&mut self) -> &mut Transform {
        &mut self.transform
    }

    pub fn world_matrix(&self) -> Mat4 {
        self.transform.world_matrix()
    }

    // ── material ──────────────────────────────────────────────────────────

    #[inline]
    pub fn color(&self) -> Color {
        self.color
    }

    #[inline]
    pub fn set_color(&mut self, color: Color) {
        self.color = color;
    }

    /// Object tint from packed `0xRRGGBB`; alpha is kept.
    pub fn set_color_packed(&mut self, rgb: u32) {
        self.color.set_rgb_packed(rgb);
    }

    /// Object tint from channels clamped to `0..=255`; alpha is kept.
    pub fn set_color_rgb(&mut self, r: i32, g: i32, b: i32) {
        self.color.set_rgb(r, g, b);
    }

    pub fn set_alpha(&mut self, alpha: i32) {
        self.color.set_alpha(alpha);
    }

    #[inline]
    pub fn topology(&self) -> PrimitiveTopology {
        self.topology
    }

    #[inline]
    pub fn set_topology(&mut self, topology: PrimitiveTopology) {
        self.topology = topology;
    }

    #[inline]
    pub fn blend_mode(&self) -> BlendMode {
        self.blend
    }

    #[inline]
    pub fn set_blend_mode(&mut self, mode: BlendMode) {
        self.blend = mode;
    }

    #[inline]
    pub fn texture(&self) -> &Shared<Texture> {
        &self.texture
    }

    /// `None` restores the empty placeholder texture.
    pub fn set_texture(&mut self, texture: Option<Shared<Texture>>) {
        self.texture = texture.unwrap_or_else(|| self.defaults.texture.clone());
    }

    #[inline]
    pub fn shader(&self) -> &Shared<ShaderProgram> {
        &self.shader
    }

    /// `None` restores the default program.
    pub fn set_shader(&mut self, shader: Option<Shared<ShaderProgram>>) {
        self.shader = shader.unwrap_or_else(|| self.defaults.program.clone());
    }

    // ── geometry ──────────────────────────────────────────────────────────

    #[inline]
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// Mutable view of the vertex list; marks it for re-upload.
    pub fn vertices_mut(&mut self) -> &mut [Vertex] {
        self.vertices_dirty = true;
        &mut self.vertices
    }

    pub fn set_vertices(&mut self, vertices: &[Vertex]) {
        let len = vertices.len().min(MAX_BUFFER_ELEMENTS);
        self.vertices.clear();
        self.vertices.extend_from_slice(&vertices[..len]);
        self.vertices_dirty = true;
    }

    /// Resizes the vertex list, filling with default vertices.
    pub fn set_vertex_count(&mut self, count: usize) {
        self.vertices
            .resize(count.min(MAX_BUFFER_ELEMENTS), Vertex::default());
        self.vertices_dirty = true;
    }

    pub fn vertex(&self, index: usize) -> Result<&Vertex> {
        self.vertices.get(index).ok_or_else(|| out_of_range(index, self.vertices.len()))
    }

    pub fn vertex_mut(&mut self, index: usize) -> Result<&mut Vertex> {
        let len = self.vertices.len();
        let vertex = self
            .vertices
            .get_mut(index)
            .ok_or_else(|| out_of_range(index, len))?;
        self.vertices_dirty = true;
        Ok(vertex)
    }

    pub fn set_vertex(&mut self, index: usize, vertex: Vertex) -> Result<()> {
        *self.vertex_mut(index)? = vertex;
        Ok(())
    }

    /// Vertex rgb from packed `0xRRGGBB`.
    pub fn set_vertex_color_packed(&mut self, index: usize, rgb: u32) -> Result<()> {
        self.vertex_mut(index)?.set_rgb_packed(rgb);
        Ok(())
    }

    pub fn set_vertex_color(&mut self, index: usize, r: u8, g: u8, b: u8) -> Result<()> {
        self.vertex_mut(index)?.set_rgb(r, g, b);
        Ok(())
    }

    pub fn set_vertex_alpha(&mut self, index: usize, alpha: u8) -> Result<()> {
        self.vertex_mut(index)?.set_alpha(alpha);
        Ok(())
    }

    #[inline]
    pub fn indices(&self) -> &[u16] {
        &self.indices
    }

    pub fn set_indices(&mut self, indices: &[u16]) {
        let len = indices.len().min(MAX_BUFFER_ELEMENTS);
        self.indices.clear();
        self.indices.extend_from_slice(&indices[..len]);
        self.indices_dirty = true;
    }

    #[inline]
    pub fn is_indexed(&self) -> bool {
        !self.indices.is_empty()
    }

    /// Primitives drawn with the current topology, counted over indices when present.
    pub fn primitive_count(&self) -> usize {
        let count = if self.is_indexed() {
            self.indices.len()
        } else {
            self.vertices.len()
        };
        self.topology.primitive_count(count)
    }

    pub(crate) fn vertices_dirty(&self) -> bool {
        self.vertices_dirty
    }

    pub(crate) fn indices_dirty(&self) -> bool {
        self.indices_dirty
    }

    pub(crate) fn clear_vertices_dirty(&mut self) {
        self.vertices_dirty = false;
    }

    pub(crate) fn clear_indices_dirty(&mut self) {
        self.indices_dirty = false;
    }
}

fn out_of_range(index: usize, len: usize) -> EngineError {
    EngineError::invalid(format!("vertex index {index} out of range ({len} vertices)"))
}
