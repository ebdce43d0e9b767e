use bytemuck::{Pod, Zeroable};

use crate::paint::Color;

/// Upper bound on vertices or indices held by one object.
pub const MAX_BUFFER_ELEMENTS: usize = 0x10000;

/// Pre-transformed, colored, textured vertex.
///
/// Layout (24 bytes): position `f32x3` at location 0, color `unorm8x4` (RGBA) at
/// location 1, texcoord `f32x2` at location 2.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub color: [u8; 4],
    pub texcoord: [f32; 2],
}

impl Default for Vertex {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            color: [255; 4],
            texcoord: [0.0; 2],
        }
    }
}

impl Vertex {
    /// Byte stride of one vertex.
    pub const STRIDE: usize = std::mem::size_of::<Self>();

    #[inline]
    pub fn new(position: [f32; 3], texcoord: [f32; 2]) -> Self {
        Self {
            position,
            texcoord,
            ..Self::default()
        }
    }

    #[inline]
    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color.to_rgba8();
        self
    }

    /// Shifts x and y by `amount`.
    #[inline]
    pub fn bias(&mut self, amount: f32) {
        self.position[0] += amount;
        self.position[1] += amount;
    }

    /// Replaces rgb from packed `0xRRGGBB`, keeping alpha.
    #[inline]
    pub fn set_rgb_packed(&mut self, rgb: u32) {
        let [_, r, g, b] = rgb.to_be_bytes();
        self.set_rgb(r, g, b);
    }

    #[inline]
    pub fn set_rgb(&mut self, r: u8, g: u8, b: u8) {
        self.color[..3].copy_from_slice(&[r, g, b]);
    }

    #[inline]
    pub fn set_alpha(&mut self, a: u8) {
        self.color[3] = a;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_24_bytes() {
        assert_eq!(Vertex::STRIDE, 24);
        assert_eq!(std::mem::offset_of!(Vertex, color), 12);
        assert_eq!(std::mem::offset_of!(Vertex, texcoord), 16);
    }

    #[test]
    fn default_is_opaque_white_at_origin() {
        let v = Vertex::default();
        assert_eq!(v.color, [255; 4]);
        assert_eq!(v.position, [0.0; 3]);
    }

    #[test]
    fn color_setters_keep_the_other_channels() {
        let mut v = Vertex::default();
        v.set_alpha(10);
        v.set_rgb_packed(0xAA_10_20_30);
        assert_eq!(v.color, [0x10, 0x20, 0x30, 10]);
    }

    #[test]
    fn bias_moves_x_and_y_only() {
        let mut v = Vertex::new([1.0, 2.0, 3.0], [0.0, 0.0]);
        v.bias(-0.5);
        assert_eq!(v.position, [0.5, 1.5, 3.0]);
    }
}
