use winit::event::WindowEvent;

use crate::time::StepTime;

use super::ctx::RenderCtx;
use super::graphics::Graphics;

/// Control directive returned by app callbacks.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AppControl {
    Continue,
    Exit,
}

/// Application contract implemented by games and tools.
///
/// Every fixed step runs `update` and then, when the device can draw, `render`.
pub trait App {
    /// Called once, after the graphics context exists and before the first step.
    fn start(&mut self, gfx: &mut Graphics) -> anyhow::Result<()> {
        let _ = gfx;
        Ok(())
    }

    /// Sees every window event before the runtime handles it.
    fn on_window_event(&mut self, event: &WindowEvent) -> AppControl {
        let _ = event;
        AppControl::Continue
    }

    /// Advances the simulation by one fixed step.
    fn update(&mut self, gfx: &mut Graphics, time: StepTime) -> anyhow::Result<AppControl>;

    /// Draws the current state. Skipped for frames the device cannot draw.
    fn render(&mut self, ctx: &mut RenderCtx<'_>);
}
