//! Desktop runtime: one `winit` window driving the wgpu backend, with a fixed-step
//! loop on redraw.

mod runtime;

pub use runtime::{Runtime, RuntimeConfig};
