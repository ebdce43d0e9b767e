//! Coordinate types shared by the device and render objects.
//!
//! Canonical 2D space:
//! - Pixels
//! - Origin top-left
//! - +X right, +Y down
//!
//! The device's view-projection matrix maps this space to clip space.

mod rect;
mod viewport;

pub use rect::Rect;
pub use viewport::Viewport;
