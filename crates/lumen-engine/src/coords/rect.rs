/// Axis-aligned rectangle stored as edges (top-left origin, +Y down).
///
/// Float rects address normalized texture space or pixels; integer rects address
/// texels. Edges are not reordered: `left > right` mirrors whatever is built from it.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct Rect<T> {
    pub left: T,
    pub top: T,
    pub right: T,
    pub bottom: T,
}

impl<T> Rect<T> {
    #[inline]
    pub const fn new(left: T, top: T, right: T, bottom: T) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }
}

impl<T> Rect<T>
where
    T: Copy + std::ops::Sub<Output = T>,
{
    #[inline]
    pub fn width(&self) -> T {
        self.right - self.left
    }

    #[inline]
    pub fn height(&self) -> T {
        self.bottom - self.top
    }
}

impl Rect<f32> {
    /// Rect spanning `[-half_w, half_w] x [-half_h, half_h]`.
    #[inline]
    pub fn centered(half_w: f32, half_h: f32) -> Self {
        Self::new(-half_w, -half_h, half_w, half_h)
    }

    #[inline]
    pub fn from_origin_size(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self::new(x, y, x + w, y + h)
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.left.is_finite()
            && self.top.is_finite()
            && self.right.is_finite()
            && self.bottom.is_finite()
    }
}

impl From<Rect<i32>> for Rect<f32> {
    fn from(r: Rect<i32>) -> Self {
        Self::new(r.left as f32, r.top as f32, r.right as f32, r.bottom as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extents_follow_edges() {
        let r = Rect::new(10, 20, 50, 25);
        assert_eq!(r.width(), 40);
        assert_eq!(r.height(), 5);
    }

    #[test]
    fn mirrored_edges_give_negative_extent() {
        let r = Rect::new(1.0f32, 0.0, 0.0, 1.0);
        assert_eq!(r.width(), -1.0);
    }

    #[test]
    fn centered_is_symmetric() {
        assert_eq!(Rect::centered(8.0, 4.0), Rect::new(-8.0, -4.0, 8.0, 4.0));
    }

    #[test]
    fn origin_size_constructor() {
        assert_eq!(
            Rect::from_origin_size(5.0, 6.0, 10.0, 20.0),
            Rect::new(5.0, 6.0, 15.0, 26.0)
        );
    }

    #[test]
    fn integer_rect_converts_to_float() {
        let r: Rect<f32> = Rect::new(1, 2, 3, 4).into();
        assert_eq!(r, Rect::new(1.0, 2.0, 3.0, 4.0));
        assert!(r.is_finite());
    }
}
