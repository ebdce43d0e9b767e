//! Lumen engine crate.
//!
//! A small 2D engine core: GPU buffers that grow by doubling, a keyed resource
//! registry, device-loss broadcasting, and composable render objects up to sprites.
//! Everything above [`gpu::RenderBackend`] is backend-agnostic; the crate ships a
//! wgpu backend for windows and an in-memory backend for tests and tools.

pub mod error;
pub mod logging;
pub mod config;

pub mod coords;
pub mod paint;

pub mod gpu;
pub mod device;
pub mod buffer;
pub mod resource;
pub mod object;
pub mod scene;

pub mod time;
pub mod core;
pub mod window;

pub use error::{EngineError, Result};
