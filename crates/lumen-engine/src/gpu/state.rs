/// Framebuffer blend mode applied to subsequent draws.
///
/// Alpha channel always blends as `src * 1 + dst * (1 - src_alpha)`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum BlendMode {
    /// `src * src_alpha + dst * (1 - src_alpha)`
    #[default]
    Alpha,
    /// `src * src_alpha + dst`
    Add,
    /// `dst - src * src_alpha`
    Subtract,
    /// `src * src_alpha - dst`
    RevSubtract,
    /// `src * (1 - dst) + dst * (1 - src)`
    Invert,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum FilterMode {
    Nearest,
    #[default]
    Linear,
}

/// Sampler filtering for the bound texture.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct TextureFilter {
    pub min: FilterMode,
    pub mag: FilterMode,
    pub mip: FilterMode,
}

impl TextureFilter {
    #[inline]
    pub const fn new(min: FilterMode, mag: FilterMode, mip: FilterMode) -> Self {
        Self { min, mag, mip }
    }

    /// Linear min/mag with nearest mip selection, the 2D default.
    #[inline]
    pub const fn linear() -> Self {
        Self::new(FilterMode::Linear, FilterMode::Linear, FilterMode::Nearest)
    }
}
