use glam::{Mat3, Mat4, Vec3};

/// Angle with its cached cosine and sine.
#[derive(Debug, Copy, Clone, PartialEq)]
struct AxisAngle {
    radians: f32,
    cos: f32,
    sin: f32,
}

impl AxisAngle {
    const ZERO: Self = Self {
        radians: 0.0,
        cos: 1.0,
        sin: 0.0,
    };
}

/// Position, per-axis rotation and scale of a render object.
///
/// Rotation is kept as one (cos, sin) pair per axis. Setting an angle recomputes the
/// pair only when the value differs from the stored one (exact comparison).
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    position: Vec3,
    angles: [AxisAngle; 3],
    scale: Vec3,
    trig_evaluations: u32,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            angles: [AxisAngle::ZERO; 3],
            scale: Vec3::ONE,
            trig_evaluations: 0,
        }
    }
}

impl Transform {
    #[inline]
    pub fn position(&self) -> Vec3 {
        self.position
    }

    #[inline]
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    #[inline]
    pub fn set_x(&mut self, x: f32) {
        self.position.x = x;
    }

    #[inline]
    pub fn set_y(&mut self, y: f32) {
        self.position.y = y;
    }

    #[inline]
    pub fn set_z(&mut self, z: f32) {
        self.position.z = z;
    }

    /// Angles in radians, per axis.
    pub fn angles(&self) -> Vec3 {
        Vec3::new(
            self.angles[0].radians,
            self.angles[1].radians,
            self.angles[2].radians,
        )
    }

    pub fn set_angles(&mut self, angles: Vec3) {
        self.set_angle_x(angles.x);
        self.set_angle_y(angles.y);
        self.set_angle_z(angles.z);
    }

    #[inline]
    pub fn set_angle_x(&mut self, radians: f32) {
        self.set_axis(0, radians);
    }

    #[inline]
    pub fn set_angle_y(&mut self, radians: f32) {
        self.set_axis(1, radians);
    }

    #[inline]
    pub fn set_angle_z(&mut self, radians: f32) {
        self.set_axis(2, radians);
    }

    #[allow(clippy::float_cmp)]
    fn set_axis(&mut self, axis: usize, radians: f32) {
        let angle = &mut self.angles[axis];
        if angle.radians == radians {
            return;
        }
        let (sin, cos) = radians.sin_cos();
        *angle = AxisAngle { radians, cos, sin };
        self.trig_evaluations += 1;
    }

    /// How many times a (cos, sin) pair was recomputed.
    #[inline]
    pub fn trig_evaluations(&self) -> u32 {
        self.trig_evaluations
    }

    #[inline]
    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    #[inline]
    pub fn set_scale(&mut self, scale: Vec3) {
        self.scale = scale;
    }

    #[inline]
    pub fn set_scale_x(&mut self, x: f32) {
        self.scale.x = x;
    }

    #[inline]
    pub fn set_scale_y(&mut self, y: f32) {
        self.scale.y = y;
    }

    #[inline]
    pub fn set_scale_z(&mut self, z: f32) {
        self.scale.z = z;
    }

    /// Rotation built from the cached pairs (column-vector convention).
    pub fn rotation(&self) -> Mat3 {
        let [x, y, z] = self.angles;
        let (cx, sx) = (x.cos, x.sin);
        let (cy, sy) = (y.cos, y.sin);
        let (cz, sz) = (z.cos, z.sin);

        // Each inner array is one row of the row-vector matrix, i.e. one column here.
        Mat3::from_cols_array_2d(&[
            [cy * cz - sx * sy * sz, -cx * sz, sy * cz + sx * cy * sz],
            [cy * sz + sx * sy * cz, cx * cz, sy * sz - sx * cy * cz],
            [-cx * sy, sx, cx * cy],
        ])
    }

    /// Scale, then rotation, then translation.
    pub fn world_matrix(&self) -> Mat4 {
        Mat4::from_translation(self.position)
            * Mat4::from_mat3(self.rotation())
            * Mat4::from_scale(self.scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).abs().max_element() < 1e-5
    }

    // ── angle cache ───────────────────────────────────────────────────────

    #[test]
    fn repeated_angle_recomputes_once() {
        let mut t = Transform::default();
        t.set_angle_z(0.75);
        t.set_angle_z(0.75);
        assert_eq!(t.trig_evaluations(), 1);
        t.set_angle_z(0.5);
        assert_eq!(t.trig_evaluations(), 2);
    }

    #[test]
    fn setting_the_initial_zero_is_free() {
        let mut t = Transform::default();
        t.set_angles(Vec3::ZERO);
        assert_eq!(t.trig_evaluations(), 0);
    }

    #[test]
    fn comparison_is_exact() {
        let mut t = Transform::default();
        t.set_angle_x(1.0);
        t.set_angle_x(1.0 + f32::EPSILON);
        assert_eq!(t.trig_evaluations(), 2);
    }

    // ── world matrix ──────────────────────────────────────────────────────

    #[test]
    fn identity_by_default() {
        assert_eq!(Transform::default().world_matrix(), Mat4::IDENTITY);
    }

    #[test]
    fn quarter_turn_about_z() {
        let mut t = Transform::default();
        t.set_angle_z(FRAC_PI_2);
        let p = t.world_matrix().transform_point3(Vec3::X);
        assert!(approx(p, Vec3::new(0.0, -1.0, 0.0)), "{p}");
    }

    #[test]
    fn scale_applies_before_translation() {
        let mut t = Transform::default();
        t.set_scale(Vec3::new(2.0, 3.0, 1.0));
        t.set_position(Vec3::new(10.0, 20.0, 0.0));
        let p = t.world_matrix().transform_point3(Vec3::new(1.0, 1.0, 0.0));
        assert!(approx(p, Vec3::new(12.0, 23.0, 0.0)), "{p}");
    }

    #[test]
    fn rotation_is_orthonormal() {
        let mut t = Transform::default();
        t.set_angles(Vec3::new(0.3, -1.1, 2.0));
        let r = t.rotation();
        assert!((r.determinant() - 1.0).abs() < 1e-5);
        let rt = r.transpose() * r;
        assert!(approx(rt.x_axis, Vec3::X) && approx(rt.y_axis, Vec3::Y) && approx(rt.z_axis, Vec3::Z));
    }
}
