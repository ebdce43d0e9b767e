use crate::buffer::SharedBufferPool;
use crate::coords::Rect;
use crate::device::Device;
use crate::error::{DrawError, EngineError, Result};
use crate::gpu::PrimitiveTopology;
use crate::resource::DefaultResources;

use super::quad;
use super::render_object::RenderObject;
use super::static_object::{Renderable, StaticRenderObject, StaticRenderObject2D};
use super::vertex::Vertex;

/// Textured screen-space quad.
///
/// Four vertices drawn as a triangle strip in the order top-left, top-right,
/// bottom-left, bottom-right. Replacing the vertex list with one of another length
/// makes the rect setters fail with [`EngineError::InvalidArgument`].
#[derive(Debug)]
pub struct Sprite2D {
    inner: StaticRenderObject2D,
}

impl Sprite2D {
    pub const VERTEX_CAPACITY: usize = 4;

    pub fn new(defaults: &DefaultResources, pool: SharedBufferPool) -> Self {
        let mut geometry = StaticRenderObject::with_capacity(defaults, pool, Self::VERTEX_CAPACITY);
        let object = geometry.object_mut();
        object.set_topology(PrimitiveTopology::TriangleStrip);
        object.set_vertex_count(4);
        Self {
            inner: StaticRenderObject2D::from_geometry(geometry),
        }
    }

    #[inline]
    pub fn object(&self) -> &RenderObject {
        self.inner.object()
    }

    #[inline]
    pub fn object_mut(&mut self) -> &mut RenderObject {
        self.inner.object_mut()
    }

    #[inline]
    pub fn geometry(&self) -> &StaticRenderObject {
        self.inner.geometry()
    }

    #[inline]
    pub fn geometry_mut(&mut self) -> &mut StaticRenderObject {
        self.inner.geometry_mut()
    }

    /// Source region in normalized texture coordinates.
    pub fn set_source_rect_normalized(&mut self, uv: Rect<f32>) -> Result<()> {
        quad::set_texcoords(self.quad_mut()?, uv);
        Ok(())
    }

    /// Source region in texels of the bound texture.
    pub fn set_source_rect(&mut self, texels: Rect<i32>) -> Result<()> {
        let (width, height) = self.texture_size()?;
        quad::set_texcoords_px(self.quad_mut()?, texels, width, height);
        Ok(())
    }

    /// Destination in pixels, shifted by [`quad::PIXEL_BIAS`] on x and y.
    pub fn set_dest_rect(&mut self, dest: Rect<f32>) -> Result<()> {
        quad::set_positions(self.quad_mut()?, dest);
        Ok(())
    }

    /// Destination centered on the origin, sized to the source region in texels.
    pub fn set_dest_center(&mut self) -> Result<()> {
        let (width, height) = self.texture_size()?;
        let span = quad::uv_span(self.quad()?);
        self.set_dest_rect(Rect::centered(span.x * width / 2.0, span.y * height / 2.0))
    }

    fn texture_size(&self) -> Result<(f32, f32)> {
        let texture = self.object().texture().borrow();
        if texture.width() == 0 || texture.height() == 0 {
            return Err(EngineError::invalid("sprite texture has no pixels"));
        }
        Ok((texture.width() as f32, texture.height() as f32))
    }

    fn quad(&self) -> Result<&[Vertex; 4]> {
        let vertices = self.object().vertices();
        vertices.try_into().map_err(|_| not_a_quad(vertices.len()))
    }

    fn quad_mut(&mut self) -> Result<&mut [Vertex; 4]> {
        let vertices = self.object_mut().vertices_mut();
        let len = vertices.len();
        vertices.try_into().map_err(|_| not_a_quad(len))
    }
}

fn not_a_quad(len: usize) -> EngineError {
    EngineError::invalid(format!("sprite holds {len} vertices, expected 4"))
}

impl Renderable for Sprite2D {
    fn render(&mut self, device: &mut Device) -> std::result::Result<(), DrawError> {
        self.inner.render(device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::buffer::GpuBufferPool;
    use crate::config::AssetRoot;
    use crate::gpu::{HeadlessBackend, ReleaseQueue};
    use crate::resource::{ResourceRegistry, Texture};

    fn sprite_with_texture(width: u32, height: u32) -> (Sprite2D, HeadlessBackend) {
        let mut backend = HeadlessBackend::new();
        let mut registry = ResourceRegistry::new(AssetRoot::new("."), ReleaseQueue::new());
        let defaults = registry.initialize(&mut backend).unwrap();
        let mut texture = Texture::new(ReleaseQueue::new());
        texture
            .create_render_target(&mut backend, "sheet", width, height)
            .unwrap();

        let mut sprite = Sprite2D::new(&defaults, GpuBufferPool::new_shared());
        sprite
            .object_mut()
            .set_texture(Some(Rc::new(RefCell::new(texture))));
        (sprite, backend)
    }

    #[test]
    fn new_sprite_is_a_four_vertex_strip() {
        let (sprite, _backend) = sprite_with_texture(8, 8);
        assert_eq!(sprite.object().vertices().len(), 4);
        assert_eq!(sprite.object().topology(), PrimitiveTopology::TriangleStrip);
        assert_eq!(sprite.object().primitive_count(), 2);
    }

    #[test]
    fn source_rect_in_texels() {
        let (mut sprite, _backend) = sprite_with_texture(256, 128);
        sprite.set_source_rect(Rect::new(64, 32, 128, 64)).unwrap();
        let uv: Vec<[f32; 2]> = sprite.object().vertices().iter().map(|v| v.texcoord).collect();
        assert_eq!(uv, vec![[0.25, 0.25], [0.5, 0.25], [0.25, 0.5], [0.5, 0.5]]);
    }

    #[test]
    fn dest_center_uses_the_source_span() {
        let (mut sprite, _backend) = sprite_with_texture(256, 128);
        sprite
            .set_source_rect_normalized(Rect::new(0.0, 0.0, 0.5, 0.25))
            .unwrap();
        sprite.set_dest_center().unwrap();

        let tl = sprite.object().vertex(0).unwrap().position;
        let br = sprite.object().vertex(3).unwrap().position;
        assert_eq!(tl, [-64.5, -16.5, 0.0]);
        assert_eq!(br, [63.5, 15.5, 0.0]);
    }

    #[test]
    fn rect_setters_need_four_vertices() {
        let (mut sprite, _backend) = sprite_with_texture(8, 8);
        sprite.object_mut().set_vertex_count(3);
        assert!(matches!(
            sprite.set_dest_rect(Rect::new(0.0, 0.0, 1.0, 1.0)),
            Err(EngineError::InvalidArgument(_))
        ));
    }

    #[test]
    fn unloaded_texture_has_no_size() {
        let (mut sprite, _backend) = sprite_with_texture(8, 8);
        sprite
            .object_mut()
            .set_texture(Some(Rc::new(RefCell::new(Texture::new(ReleaseQueue::new())))));
        assert!(sprite.set_source_rect(Rect::new(0, 0, 1, 1)).is_err());
    }
}
