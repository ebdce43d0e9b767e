//! Color model shared by the device clear, render objects and vertices.

mod color;

pub use color::Color;
