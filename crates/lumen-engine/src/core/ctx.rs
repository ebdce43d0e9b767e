use crate::device::Device;
use crate::object::Renderable;
use crate::scene::Scene;
use crate::time::StepTime;

/// Per-frame context passed to [`App::render`](super::App::render).
///
/// Draw failures are soft: they are logged and counted, never propagated.
pub struct RenderCtx<'a> {
    device: &'a mut Device,
    time: StepTime,
    fps: f32,
    failed_draws: usize,
}

impl<'a> RenderCtx<'a> {
    pub fn new(device: &'a mut Device, time: StepTime, fps: f32) -> Self {
        Self {
            device,
            time,
            fps,
            failed_draws: 0,
        }
    }

    #[inline]
    pub fn device(&mut self) -> &mut Device {
        self.device
    }

    #[inline]
    pub fn time(&self) -> StepTime {
        self.time
    }

    /// Latest sampled frame rate.
    #[inline]
    pub fn fps(&self) -> f32 {
        self.fps
    }

    /// Draws one object. Returns `false` if the draw failed.
    pub fn draw(&mut self, object: &mut dyn Renderable) -> bool {
        match object.render(self.device) {
            Ok(()) => true,
            Err(err) => {
                log::debug!("draw failed: {err}");
                self.failed_draws += 1;
                false
            }
        }
    }

    /// Renders every live task of `scene`.
    pub fn draw_scene(&mut self, scene: &mut Scene) {
        self.failed_draws += scene.render(self.device);
    }

    /// Draws that failed so far this frame.
    #[inline]
    pub fn failed_draws(&self) -> usize {
        self.failed_draws
    }
}
