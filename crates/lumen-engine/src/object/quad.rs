//! Four-vertex quads in triangle-strip order: top-left, top-right, bottom-left,
//! bottom-right.

use glam::Vec2;

use crate::coords::Rect;

use super::vertex::Vertex;

/// Offset applied to quad positions so texel centers land on pixel centers.
pub const PIXEL_BIAS: f32 = -0.5;

/// Corners of `rect` in quad order.
#[inline]
fn corners(rect: Rect<f32>) -> [[f32; 2]; 4] {
    [
        [rect.left, rect.top],
        [rect.right, rect.top],
        [rect.left, rect.bottom],
        [rect.right, rect.bottom],
    ]
}

/// Writes normalized texture coordinates.
pub fn set_texcoords(quad: &mut [Vertex; 4], uv: Rect<f32>) {
    for (vertex, [u, v]) in quad.iter_mut().zip(corners(uv)) {
        vertex.texcoord = [u, v];
    }
}

/// Writes texture coordinates from a texel rect of a `width` x `height` texture.
pub fn set_texcoords_px(quad: &mut [Vertex; 4], texels: Rect<i32>, width: f32, height: f32) {
    let r = Rect::<f32>::from(texels);
    set_texcoords(
        quad,
        Rect::new(r.left / width, r.top / height, r.right / width, r.bottom / height),
    );
}

/// Writes positions at z = 0, then biases x and y by [`PIXEL_BIAS`].
pub fn set_positions(quad: &mut [Vertex; 4], dest: Rect<f32>) {
    for (vertex, [x, y]) in quad.iter_mut().zip(corners(dest)) {
        vertex.position = [x, y, 0.0];
        vertex.bias(PIXEL_BIAS);
    }
}

/// Texture-coordinate extent from the top-left to the bottom-right corner.
pub fn uv_span(quad: &[Vertex; 4]) -> Vec2 {
    let [tl_u, tl_v] = quad[0].texcoord;
    let [br_u, br_v] = quad[3].texcoord;
    Vec2::new(br_u - tl_u, br_v - tl_v)
}
