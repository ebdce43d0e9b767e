/// Settings for [`WgpuBackend`](super::WgpuBackend), fixed for the lifetime of the
/// window. A device recreated after a loss is requested with the same values.
#[derive(Debug, Clone)]
pub struct GpuInit {
    /// Pace presentation to the display (FIFO) instead of presenting immediately.
    pub vsync: bool,
    pub prefer_srgb: bool,
    pub power_preference: wgpu::PowerPreference,

    /// Ignored when the surface does not support it.
    pub alpha_mode: Option<wgpu::CompositeAlphaMode>,

    pub features: wgpu::Features,
    pub limits: wgpu::Limits,

    /// Frames queued ahead of presentation. A hint only.
    pub frame_latency: u32,
}

impl GpuInit {
    pub(crate) fn present_mode(&self) -> wgpu::PresentMode {
        if self.vsync {
            wgpu::PresentMode::Fifo
        } else {
            wgpu::PresentMode::AutoNoVsync
        }
    }

    pub(crate) fn device_descriptor(&self) -> wgpu::DeviceDescriptor<'static> {
        wgpu::DeviceDescriptor {
            label: Some("lumen device"),
            required_features: self.features,
            required_limits: self.limits.clone(),
            experimental_features: wgpu::ExperimentalFeatures::disabled(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::Off,
        }
    }
}

impl Default for GpuInit {
    fn default() -> Self {
        Self {
            vsync: true,
            prefer_srgb: true,
            power_preference: wgpu::PowerPreference::HighPerformance,
            alpha_mode: None,
            features: wgpu::Features::empty(),
            limits: wgpu::Limits::default(),
            frame_latency: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vsync_selects_fifo() {
        let mut init = GpuInit::default();
        assert_eq!(init.present_mode(), wgpu::PresentMode::Fifo);
        init.vsync = false;
        assert_eq!(init.present_mode(), wgpu::PresentMode::AutoNoVsync);
    }
}
