use anyhow::Context;

use crate::gpu::FrameStatus;
use crate::time::StepTime;

use super::app::{App, AppControl};
use super::ctx::RenderCtx;
use super::graphics::Graphics;

/// Runs one fixed step: begin frame, update, render, end frame.
///
/// Update runs even while the device is lost so the simulation keeps its pace;
/// only drawing is skipped. Device errors are fatal and returned.
pub fn run_step(
    app: &mut dyn App,
    gfx: &mut Graphics,
    time: StepTime,
    fps: f32,
) -> anyhow::Result<AppControl> {
    let status = gfx.begin_frame().context("failed to begin frame")?;

    let control = app.update(gfx, time)?;

    if status == FrameStatus::Ready {
        let mut ctx = RenderCtx::new(gfx.device_mut(), time, fps);
        app.render(&mut ctx);
        if ctx.failed_draws() > 0 {
            log::trace!("{} draws failed in step {}", ctx.failed_draws(), time.step_index);
        }
    }

    gfx.end_frame(status == FrameStatus::Ready)
        .context("failed to end frame")?;
    Ok(control)
}
