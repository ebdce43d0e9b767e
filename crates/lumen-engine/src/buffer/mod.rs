//! GPU vertex/index buffers.
//!
//! - [`GpuBuffer`]: fixed-capacity buffer with bounded partial updates
//! - [`grown_capacity`]: doubling growth policy used by buffer owners
//! - [`GpuBufferPool`]: device-lifecycle owner handing out [`BufferHandle`]s

mod gpu_buffer;
mod growth;
mod pool;

pub use gpu_buffer::{GpuBuffer, LockMode};
pub use growth::grown_capacity;
pub use pool::{BufferHandle, BufferKey, GpuBufferPool, SharedBufferPool};
