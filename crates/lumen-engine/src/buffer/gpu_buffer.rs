use bytemuck::Pod;

use crate::error::{EngineError, Result};
use crate::gpu::{BufferDesc, BufferId, BufferKind, BufferUsage, RenderBackend};

use super::growth::grown_capacity;

/// Write hint forwarded to the backend.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum LockMode {
    /// Previous contents may be thrown away.
    #[default]
    Discard,
    /// Caller promises not to touch regions the GPU may still read.
    NoOverwrite,
    None,
}

/// Fixed-capacity vertex or index buffer.
///
/// Capacity and offsets are in elements; the byte size is `capacity * stride`.
/// The backend handle is owned but not destroyed on drop: call
/// [`GpuBuffer::release`], or let a [`GpuBufferPool`](super::GpuBufferPool) own it.
#[derive(Debug)]
pub struct GpuBuffer {
    id: Option<BufferId>,
    kind: BufferKind,
    usage: BufferUsage,
    capacity: usize,
    stride: usize,
    contents_lost: bool,
}

impl GpuBuffer {
    pub fn new(kind: BufferKind, usage: BufferUsage) -> Self {
        Self {
            id: None,
            kind,
            usage,
            capacity: 0,
            stride: 0,
            contents_lost: false,
        }
    }

    #[inline]
    pub fn id(&self) -> Option<BufferId> {
        self.id
    }

    #[inline]
    pub fn is_created(&self) -> bool {
        self.id.is_some()
    }

    #[inline]
    pub fn kind(&self) -> BufferKind {
        self.kind
    }

    #[inline]
    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    /// Capacity in elements.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    #[inline]
    pub fn size_bytes(&self) -> usize {
        self.capacity * self.stride
    }

    /// Set when the buffer was recreated after a device reset and must be re-uploaded.
    #[inline]
    pub fn contents_lost(&self) -> bool {
        self.contents_lost
    }

    /// (Re)allocates `capacity * stride` bytes. Any prior allocation is released first.
    pub fn create(
        &mut self,
        backend: &mut dyn RenderBackend,
        capacity: usize,
        stride: usize,
        usage: BufferUsage,
    ) -> Result<()> {
        self.release(backend);

        if capacity == 0 || stride == 0 {
            return Err(EngineError::invalid(format!(
                "buffer of {capacity} elements x {stride} bytes"
            )));
        }
        let size_bytes = capacity
            .checked_mul(stride)
            .ok_or_else(|| EngineError::invalid(format!("buffer size overflows: {capacity} x {stride}")))?;

        let desc = BufferDesc {
            size_bytes: size_bytes as u64,
            kind: self.kind,
            usage,
        };
        let id = backend
            .create_buffer(&desc)
            .map_err(|err| EngineError::allocation(format!("{:?} buffer of {size_bytes} bytes", self.kind), err))?;

        self.id = Some(id);
        self.capacity = capacity;
        self.stride = stride;
        self.usage = usage;
        self.contents_lost = false;
        Ok(())
    }

    /// Grows by doubling until `required` elements fit. Returns `true` if reallocated.
    ///
    /// A reallocation drops the previous contents; the caller re-uploads.
    pub fn reserve(
        &mut self,
        backend: &mut dyn RenderBackend,
        required: usize,
        stride: usize,
    ) -> Result<bool> {
        if self.is_created() && required <= self.capacity && stride == self.stride {
            return Ok(false);
        }
        let capacity = grown_capacity(self.capacity, required);
        self.create(backend, capacity, stride, self.usage)?;
        Ok(true)
    }

    /// Copies `min(count, capacity - offset)` elements of `stride` bytes from `data`
    /// to element `offset`. Returns the number of elements written.
    ///
    /// `offset >= capacity` fails without writing. `count == 0` or `stride == 0` is a
    /// successful no-op.
    pub fn update_bytes(
        &mut self,
        backend: &mut dyn RenderBackend,
        offset: usize,
        data: &[u8],
        count: usize,
        stride: usize,
        lock: LockMode,
    ) -> Result<usize> {
        let Some(id) = self.id else {
            return Err(EngineError::invalid("update of an unallocated buffer"));
        };
        if offset >= self.capacity {
            return Err(EngineError::invalid(format!(
                "buffer offset {offset} out of range (capacity {})",
                self.capacity
            )));
        }
        if count == 0 || stride == 0 {
            return Ok(0);
        }
        if stride != self.stride {
            return Err(EngineError::invalid(format!(
                "element stride {stride} does not match buffer stride {}",
                self.stride
            )));
        }

        let written = count.min(self.capacity - offset);
        let bytes = written * stride;
        let src = data.get(..bytes).ok_or_else(|| {
            EngineError::invalid(format!(
                "source holds {} bytes, {bytes} needed for {written} elements",
                data.len()
            ))
        })?;

        backend
            .write_buffer(id, (offset * stride) as u64, src, lock == LockMode::Discard)
            .map_err(|err| EngineError::allocation(format!("write to {:?} buffer", self.kind), err))?;

        self.contents_lost = false;
        Ok(written)
    }

    /// Typed [`GpuBuffer::update_bytes`]: the element stride is `size_of::<T>()`.
    pub fn update<T: Pod>(
        &mut self,
        backend: &mut dyn RenderBackend,
        offset: usize,
        data: &[T],
        lock: LockMode,
    ) -> Result<usize> {
        self.update_bytes(
            backend,
            offset,
            bytemuck::cast_slice(data),
            data.len(),
            std::mem::size_of::<T>(),
            lock,
        )
    }

    /// Destroys the backend buffer. Capacity and stride are kept for [`GpuBuffer::recreate`].
    pub fn release(&mut self, backend: &mut dyn RenderBackend) {
        if let Some(id) = self.id.take() {
            if let Err(err) = backend.destroy_buffer(id) {
                log::debug!("destroying {:?} buffer: {err}", self.kind);
            }
        }
    }

    /// Allocates again with the last capacity and stride. Contents are not preserved.
    pub fn recreate(&mut self, backend: &mut dyn RenderBackend) -> Result<()> {
        if self.capacity == 0 {
            return Ok(());
        }
        self.create(backend, self.capacity, self.stride, self.usage)?;
        self.contents_lost = true;
        Ok(())
    }
}
