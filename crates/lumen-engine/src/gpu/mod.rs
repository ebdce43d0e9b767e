//! Rendering backend abstraction.
//!
//! [`RenderBackend`] is the seam between the engine core and a graphics API.
//! Two implementations ship with the crate:
//! - [`HeadlessBackend`]: in-memory, deterministic, with fault injection (tests, tools)
//! - [`WgpuBackend`]: wgpu device + winit surface
//!
//! Handles are typed slot-map keys; a handle issued before a device reset never
//! resolves afterwards.

mod backend;
mod draw;
mod headless;
mod program;
mod release;
mod state;
mod wgpu_backend;

pub use backend::{
    BufferDesc, BufferId, BufferKind, BufferUsage, DeviceStatus, FrameStatus, ProgramId,
    RenderBackend, TextureDesc, TextureId, TextureUsage,
};
pub use draw::{DrawCall, IndexFormat, PrimitiveTopology, UniformWrite};
pub use headless::{DrawRecord, HeadlessBackend, SharedHeadless};
pub use program::{Pass, ProgramLayout, ProgramSource, Semantic, Technique, UniformSlot};
pub use release::{ReleaseQueue, ReleasedHandle};
pub use state::{BlendMode, FilterMode, TextureFilter};
pub use wgpu_backend::{GpuInit, WgpuBackend};
