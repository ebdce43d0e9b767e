use super::backend::{BufferId, ProgramId, TextureId};

/// How vertices are assembled into primitives.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum PrimitiveTopology {
    Points,
    Lines,
    LineStrip,
    #[default]
    Triangles,
    TriangleStrip,
    TriangleFan,
}

impl PrimitiveTopology {
    /// Number of drawable primitives for `count` vertices (or indices).
    ///
    /// Integer floor division; strips and fans clamp at zero.
    pub const fn primitive_count(self, count: usize) -> usize {
        match self {
            Self::Points => count,
            Self::Lines => count / 2,
            Self::LineStrip => count.saturating_sub(1),
            Self::Triangles => count / 3,
            Self::TriangleStrip | Self::TriangleFan => count.saturating_sub(2),
        }
    }

    /// Elements consumed by `primitives` primitives. Inverse of [`Self::primitive_count`]
    /// for non-empty draws.
    pub const fn element_count(self, primitives: usize) -> usize {
        if primitives == 0 {
            return 0;
        }
        match self {
            Self::Points => primitives,
            Self::Lines => primitives * 2,
            Self::LineStrip => primitives + 1,
            Self::Triangles => primitives * 3,
            Self::TriangleStrip | Self::TriangleFan => primitives + 2,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum IndexFormat {
    U16,
}

impl IndexFormat {
    #[inline]
    pub const fn size_bytes(self) -> u64 {
        match self {
            Self::U16 => 2,
        }
    }
}

/// Bytes for one uniform binding of the active program.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformWrite<'a> {
    pub binding: u32,
    pub bytes: &'a [u8],
}

/// One draw against the current blend/filter/viewport/target state.
#[derive(Debug, Clone)]
pub struct DrawCall<'a> {
    pub program: ProgramId,
    pub technique: usize,
    pub pass: usize,

    pub topology: PrimitiveTopology,
    pub primitive_count: u32,

    pub vertex_buffer: BufferId,
    pub vertex_stride: u32,
    /// Vertices referenced by the draw (the full list when indexed).
    pub vertex_count: u32,
    pub index_buffer: Option<(BufferId, IndexFormat)>,

    /// `None` samples the backend's opaque white fallback.
    pub texture: Option<TextureId>,
    pub uniforms: &'a [UniformWrite<'a>],
}
