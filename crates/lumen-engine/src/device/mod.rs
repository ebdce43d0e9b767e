//! Device ownership and lifecycle.
//!
//! [`Device`] owns the backend and runs the per-frame cooperation test. Components
//! owning GPU state implement [`DeviceListener`] and register with the device; on a
//! resettable loss they are told to release, the backend is reset, and they are told
//! to recreate, each exactly once and in registration order.

mod lifecycle;
mod render_device;

pub use lifecycle::{DeviceListener, ListenerId, ListenerTable};
pub use render_device::{Device, DeviceInit, LifecycleState};
