/// Straight-alpha RGBA color, channels in `[0, 1]`.
///
/// Default is opaque white, the neutral tint for textured geometry.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

impl Color {
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0, 1.0);
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0, 1.0);
    pub const TRANSPARENT: Self = Self::new(0.0, 0.0, 0.0, 0.0);

    #[inline]
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// From 8-bit channels.
    #[inline]
    pub fn from_rgba8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self::new(
            f32::from(r) / 255.0,
            f32::from(g) / 255.0,
            f32::from(b) / 255.0,
            f32::from(a) / 255.0,
        )
    }

    /// From packed `0xAARRGGBB`.
    #[inline]
    pub fn from_argb(argb: u32) -> Self {
        let [a, r, g, b] = argb.to_be_bytes();
        Self::from_rgba8(r, g, b, a)
    }

    /// Integer channels clamped to `0..=255`.
    #[inline]
    pub fn from_clamped(r: i32, g: i32, b: i32, a: i32) -> Self {
        Self::new(
            clamp_channel(r),
            clamp_channel(g),
            clamp_channel(b),
            clamp_channel(a),
        )
    }

    /// Replaces rgb from packed `0xRRGGBB`, keeping alpha. The high byte is ignored.
    #[inline]
    pub fn set_rgb_packed(&mut self, rgb: u32) {
        let [_, r, g, b] = rgb.to_be_bytes();
        self.set_rgb(i32::from(r), i32::from(g), i32::from(b));
    }

    /// Replaces rgb from integer channels clamped to `0..=255`, keeping alpha.
    #[inline]
    pub fn set_rgb(&mut self, r: i32, g: i32, b: i32) {
        self.r = clamp_channel(r);
        self.g = clamp_channel(g);
        self.b = clamp_channel(b);
    }

    /// Replaces alpha from an integer clamped to `0..=255`.
    #[inline]
    pub fn set_alpha(&mut self, a: i32) {
        self.a = clamp_channel(a);
    }

    /// Rounds to 8-bit RGBA.
    #[inline]
    pub fn to_rgba8(self) -> [u8; 4] {
        [
            to_byte(self.r),
            to_byte(self.g),
            to_byte(self.b),
            to_byte(self.a),
        ]
    }

    #[inline]
    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    #[inline]
    pub fn is_finite(self) -> bool {
        self.r.is_finite() && self.g.is_finite() && self.b.is_finite() && self.a.is_finite()
    }
}

#[inline]
fn clamp_channel(v: i32) -> f32 {
    v.clamp(0, 255) as f32 / 255.0
}

#[inline]
fn to_byte(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}
