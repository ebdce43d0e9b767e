use std::cell::RefCell;
use std::rc::Rc;

use bytemuck::Pod;
use slotmap::SlotMap;

use crate::device::DeviceListener;
use crate::error::Result;
use crate::gpu::{BufferId, BufferKind, BufferUsage, RenderBackend};

use super::gpu_buffer::{GpuBuffer, LockMode};

slotmap::new_key_type! {
    /// Pool slot of a [`GpuBuffer`].
    pub struct BufferKey;
}

pub type SharedBufferPool = Rc<RefCell<GpuBufferPool>>;

/// Owner of every geometry buffer, registered as a device listener.
///
/// On device loss all buffers are released; on restore they are allocated again with
/// the same capacity and stride and flagged [`GpuBuffer::contents_lost`], which makes
/// their owners re-upload at the next draw. Users hold [`BufferHandle`]s; dropping the
/// last handle retires the slot, and the buffer is destroyed at the next collection.
pub struct GpuBufferPool {
    buffers: SlotMap<BufferKey, GpuBuffer>,
    retired: Rc<RefCell<Vec<BufferKey>>>,
}

impl GpuBufferPool {
    pub fn new() -> Self {
        Self {
            buffers: SlotMap::with_key(),
            retired: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn new_shared() -> SharedBufferPool {
        Rc::new(RefCell::new(Self::new()))
    }

    /// Allocates a buffer of `capacity` elements and returns the owning handle.
    pub fn allocate(
        pool: &SharedBufferPool,
        backend: &mut dyn RenderBackend,
        kind: BufferKind,
        usage: BufferUsage,
        capacity: usize,
        stride: usize,
    ) -> Result<BufferHandle> {
        let mut this = pool.borrow_mut();
        this.collect_retired(backend);

        let mut buffer = GpuBuffer::new(kind, usage);
        buffer.create(backend, capacity, stride, usage)?;
        let key = this.buffers.insert(buffer);

        Ok(BufferHandle {
            key,
            pool: pool.clone(),
            retired: this.retired.clone(),
        })
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    pub fn get(&self, key: BufferKey) -> Option<&GpuBuffer> {
        self.buffers.get(key)
    }

    /// Destroys buffers whose handles were dropped. Returns how many.
    pub fn collect_retired(&mut self, backend: &mut dyn RenderBackend) -> usize {
        let retired = std::mem::take(&mut *self.retired.borrow_mut());
        for key in &retired {
            if let Some(mut buffer) = self.buffers.remove(*key) {
                buffer.release(backend);
            }
        }
        retired.len()
    }
}

impl Default for GpuBufferPool {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceListener for GpuBufferPool {
    fn on_device_lost(&mut self, backend: &mut dyn RenderBackend) -> Result<()> {
        self.collect_retired(backend);
        for buffer in self.buffers.values_mut() {
            buffer.release(backend);
        }
        log::debug!("released {} pooled buffers", self.buffers.len());
        Ok(())
    }

    fn on_device_restored(&mut self, backend: &mut dyn RenderBackend) -> Result<()> {
        for buffer in self.buffers.values_mut() {
            buffer.recreate(backend)?;
        }
        log::debug!("recreated {} pooled buffers", self.buffers.len());
        Ok(())
    }
}

/// Owning reference to a pooled buffer.
pub struct BufferHandle {
    key: BufferKey,
    pool: SharedBufferPool,
    retired: Rc<RefCell<Vec<BufferKey>>>,
}

impl std::fmt::Debug for BufferHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferHandle").field("key", &self.key).finish()
    }
}

impl BufferHandle {
    #[inline]
    pub fn key(&self) -> BufferKey {
        self.key
    }

    fn with<R>(&self, f: impl FnOnce(&mut GpuBuffer) -> R) -> Option<R> {
        let mut pool = self.pool.borrow_mut();
        pool.buffers.get_mut(self.key).map(f)
    }

    /// Backend handle, `None` while the device is lost.
    pub fn id(&self) -> Option<BufferId> {
        self.with(|b| b.id()).flatten()
    }

    pub fn capacity(&self) -> usize {
        self.with(|b| b.capacity()).unwrap_or(0)
    }

    pub fn contents_lost(&self) -> bool {
        self.with(|b| b.contents_lost()).unwrap_or(true)
    }

    /// See [`GpuBuffer::reserve`].
    pub fn reserve(
        &self,
        backend: &mut dyn RenderBackend,
        required: usize,
        stride: usize,
    ) -> Result<bool> {
        self.with(|b| b.reserve(backend, required, stride))
            .unwrap_or(Ok(false))
    }

    /// See [`GpuBuffer::update`].
    pub fn update<T: Pod>(
        &self,
        backend: &mut dyn RenderBackend,
        offset: usize,
        data: &[T],
        lock: LockMode,
    ) -> Result<usize> {
        self.with(|b| b.update(backend, offset, data, lock))
            .unwrap_or(Ok(0))
    }
}

impl Drop for BufferHandle {
    fn drop(&mut self) {
        self.retired.borrow_mut().push(self.key);
    }
}
