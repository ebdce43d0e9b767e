//! Core engine-facing contracts.
//!
//! This module defines the interface between the runtime (platform loop) and
//! application code: the [`App`] contract, the process-level [`Graphics`] context
//! and the per-frame [`RenderCtx`].

mod app;
mod ctx;
mod frame;
mod graphics;

pub use app::{App, AppControl};
pub use ctx::RenderCtx;
pub use frame::run_step;
pub use graphics::Graphics;
