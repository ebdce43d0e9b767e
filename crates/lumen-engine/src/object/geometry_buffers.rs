use crate::buffer::{BufferHandle, GpuBufferPool, LockMode, SharedBufferPool};
use crate::error::Result;
use crate::gpu::{BufferId, BufferKind, BufferUsage, RenderBackend};

use super::vertex::Vertex;

/// Vertex and index buffers of one object, allocated from the shared pool.
///
/// The vertex buffer is allocated on [`GeometryBuffers::allocate`]; the index buffer
/// only once indices are first uploaded. Both grow by doubling. After a device
/// reset the pool recreates them empty and [`GeometryBuffers::contents_lost`]
/// reports it until the next upload.
pub struct GeometryBuffers {
    pool: SharedBufferPool,
    usage: BufferUsage,
    initial_vertex_capacity: usize,
    vertex: Option<BufferHandle>,
    index: Option<BufferHandle>,
}

impl std::fmt::Debug for GeometryBuffers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeometryBuffers")
            .field("usage", &self.usage)
            .field("vertex", &self.vertex)
            .field("index", &self.index)
            .finish()
    }
}

impl GeometryBuffers {
    /// Initial index capacity.
    pub const INDEX_CAPACITY: usize = 64;

    pub fn new(pool: SharedBufferPool, initial_vertex_capacity: usize, usage: BufferUsage) -> Self {
        Self {
            pool,
            usage,
            initial_vertex_capacity: initial_vertex_capacity.max(1),
            vertex: None,
            index: None,
        }
    }

    #[inline]
    pub fn is_allocated(&self) -> bool {
        self.vertex.is_some()
    }

    /// Allocates the vertex buffer at its initial capacity. No-op if already allocated.
    pub fn allocate(&mut self, backend: &mut dyn RenderBackend) -> Result<()> {
        if self.vertex.is_none() {
            self.vertex = Some(GpuBufferPool::allocate(
                &self.pool,
                backend,
                BufferKind::Vertex,
                self.usage,
                self.initial_vertex_capacity,
                Vertex::STRIDE,
            )?);
        }
        Ok(())
    }

    /// Grows the vertex buffer to fit `vertices` and uploads all of them.
    pub fn upload_vertices(
        &mut self,
        backend: &mut dyn RenderBackend,
        vertices: &[Vertex],
    ) -> Result<()> {
        self.allocate(backend)?;
        let Some(buffer) = &self.vertex else { return Ok(()) };
        upload(buffer, backend, vertices)
    }

    /// Grows the index buffer to fit `indices` and uploads all of them.
    pub fn upload_indices(&mut self, backend: &mut dyn RenderBackend, indices: &[u16]) -> Result<()> {
        if indices.is_empty() && self.index.is_none() {
            return Ok(());
        }
        if self.index.is_none() {
            self.index = Some(GpuBufferPool::allocate(
                &self.pool,
                backend,
                BufferKind::Index16,
                self.usage,
                Self::INDEX_CAPACITY,
                std::mem::size_of::<u16>(),
            )?);
        }
        let Some(buffer) = &self.index else { return Ok(()) };
        upload(buffer, backend, indices)
    }

    pub fn vertex_buffer(&self) -> Option<BufferId> {
        self.vertex.as_ref().and_then(BufferHandle::id)
    }

    pub fn index_buffer(&self) -> Option<BufferId> {
        self.index.as_ref().and_then(BufferHandle::id)
    }

    pub fn vertex_capacity(&self) -> usize {
        self.vertex.as_ref().map_or(0, BufferHandle::capacity)
    }

    pub fn index_capacity(&self) -> usize {
        self.index.as_ref().map_or(0, BufferHandle::capacity)
    }

    /// A buffer was recreated by a device reset and holds no data.
    pub fn contents_lost(&self) -> bool {
        self.vertex.as_ref().is_some_and(BufferHandle::contents_lost)
            || self.index.as_ref().is_some_and(BufferHandle::contents_lost)
    }

    /// Returns both buffers to the pool.
    pub fn release(&mut self) {
        self.vertex = None;
        self.index = None;
    }
}

fn upload<T: bytemuck::Pod>(
    buffer: &BufferHandle,
    backend: &mut dyn RenderBackend,
    data: &[T],
) -> Result<()> {
    if data.is_empty() {
        return Ok(());
    }
    buffer.reserve(backend, data.len(), std::mem::size_of::<T>())?;
    buffer.update(backend, 0, data, LockMode::Discard)?;
    Ok(())
}
