use glam::Mat4;

/// Screen-space viewport in pixels plus its depth range.
///
/// Origin is top-left, +Y down. [`Viewport::view_projection`] maps this space to
/// clip space, so 2D geometry can be authored directly in pixels.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, 1.0)
    }
}

impl Viewport {
    /// Viewport with the default `[0, 1]` depth range.
    #[inline]
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            near: 0.0,
            far: 1.0,
        }
    }

    #[inline]
    pub const fn with_depth(mut self, near: f32, far: f32) -> Self {
        self.near = near;
        self.far = far;
        self
    }

    #[inline]
    pub fn is_valid(self) -> bool {
        self.width > 0.0
            && self.height > 0.0
            && self.width.is_finite()
            && self.height.is_finite()
            && self.far != self.near
    }

    /// Orthographic pixel-space projection (left-handed, depth mapped to `[0, 1]`).
    pub fn view_projection(self) -> Mat4 {
        Mat4::orthographic_lh(
            self.x,
            self.x + self.width,
            self.y + self.height,
            self.y,
            self.near,
            self.far,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn corners_map_to_clip_space() {
        let vp = Viewport::new(0.0, 0.0, 640.0, 480.0);
        let m = vp.view_projection();

        let tl = m.project_point3(Vec3::new(0.0, 0.0, 0.0));
        assert!((tl.x + 1.0).abs() < 1e-6);
        assert!((tl.y - 1.0).abs() < 1e-6);

        let br = m.project_point3(Vec3::new(640.0, 480.0, 1.0));
        assert!((br.x - 1.0).abs() < 1e-6);
        assert!((br.y + 1.0).abs() < 1e-6);
        assert!((br.z - 1.0).abs() < 1e-6);
    }

    #[test]
    fn offset_viewport_maps_its_own_origin() {
        let vp = Viewport::new(100.0, 50.0, 200.0, 100.0);
        let p = vp.view_projection().project_point3(Vec3::new(100.0, 50.0, 0.0));
        assert!((p.x + 1.0).abs() < 1e-6);
        assert!((p.y - 1.0).abs() < 1e-6);
    }

    #[test]
    fn validity() {
        assert!(Viewport::new(0.0, 0.0, 1.0, 1.0).is_valid());
        assert!(!Viewport::new(0.0, 0.0, 0.0, 1.0).is_valid());
        assert!(!Viewport::new(0.0, 0.0, 1.0, 1.0).with_depth(1.0, 1.0).is_valid());
    }
}
