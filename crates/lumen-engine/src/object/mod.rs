//! Drawable objects.
//!
//! Objects are composed rather than layered:
//! - [`RenderObject`]: transform, material and CPU-side geometry
//! - [`GeometryBuffers`]: pooled GPU buffers the geometry is uploaded to
//! - [`StaticRenderObject`]: the two combined, with upload and growth
//! - [`render_2d`]: the screen-space draw used by [`StaticRenderObject2D`] and [`Sprite2D`]
//! - [`quad`]: corner helpers for four-vertex quads

mod geometry_buffers;
pub mod quad;
mod render_object;
mod sprite;
mod static_object;
mod transform;
mod vertex;

pub use geometry_buffers::GeometryBuffers;
pub use render_object::{ObjectState, RenderObject};
pub use sprite::Sprite2D;
pub use static_object::{render_2d, Renderable, StaticRenderObject, StaticRenderObject2D};
pub use transform::Transform;
pub use vertex::{Vertex, MAX_BUFFER_ELEMENTS};
