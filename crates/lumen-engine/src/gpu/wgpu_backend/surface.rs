use winit::dpi::PhysicalSize;

use crate::error::BackendError;
use crate::gpu::FrameStatus;

use super::GpuInit;

/// What to do about a failed surface acquire.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SurfaceErrorAction {
    /// Surface went stale; reconfigure and retry next frame.
    Reconfigure,
    /// Transient; drop this frame.
    Skip,
    Fatal,
}

impl SurfaceErrorAction {
    pub fn classify(err: &wgpu::SurfaceError) -> Self {
        match err {
            wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => Self::Reconfigure,
            wgpu::SurfaceError::Timeout | wgpu::SurfaceError::Other => Self::Skip,
            wgpu::SurfaceError::OutOfMemory => Self::Fatal,
        }
    }

    /// What [`RenderBackend::begin_frame`](crate::gpu::RenderBackend::begin_frame) reports.
    pub(crate) fn into_frame_status(self) -> Result<FrameStatus, BackendError> {
        match self {
            Self::Reconfigure | Self::Skip => Ok(FrameStatus::Skipped),
            Self::Fatal => Err(BackendError::OutOfMemory),
        }
    }
}

/// The window surface with its configuration and current drawable size.
///
/// A zero-sized window (minimized) keeps the last configuration and skips
/// `configure` until it has pixels again.
pub(crate) struct WindowSurface {
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    size: PhysicalSize<u32>,
}

impl WindowSurface {
    /// Picks format and alpha mode from what the adapter supports. `None` if the
    /// surface reports no formats at all.
    pub fn new(
        surface: wgpu::Surface<'static>,
        adapter: &wgpu::Adapter,
        init: &GpuInit,
        size: PhysicalSize<u32>,
    ) -> Option<Self> {
        let caps = surface.get_capabilities(adapter);
        let format = pick_format(&caps.formats, init.prefer_srgb)?;
        let alpha_mode = init
            .alpha_mode
            .filter(|mode| caps.alpha_modes.contains(mode))
            .or_else(|| caps.alpha_modes.first().copied())
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: init.present_mode(),
            alpha_mode,
            view_formats: Vec::new(),
            desired_maximum_frame_latency: init.frame_latency,
        };
        Some(Self {
            surface,
            config,
            size,
        })
    }

    #[inline]
    pub fn get(&self) -> &wgpu::Surface<'static> {
        &self.surface
    }

    #[inline]
    pub fn format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    #[inline]
    pub fn size(&self) -> PhysicalSize<u32> {
        self.size
    }

    #[inline]
    fn has_pixels(&self) -> bool {
        self.size.width > 0 && self.size.height > 0
    }

    pub fn configure(&self, device: &wgpu::Device) {
        if self.has_pixels() {
            self.surface.configure(device, &self.config);
        }
    }

    pub fn resize(&mut self, device: &wgpu::Device, size: PhysicalSize<u32>) {
        self.size = size;
        if self.has_pixels() {
            self.config.width = size.width;
            self.config.height = size.height;
            self.configure(device);
        }
    }

    /// Classifies an acquire failure and reconfigures a stale surface.
    pub fn recover(&self, device: &wgpu::Device, err: &wgpu::SurfaceError) -> SurfaceErrorAction {
        let action = SurfaceErrorAction::classify(err);
        if action == SurfaceErrorAction::Reconfigure {
            self.configure(device);
        }
        action
    }
}

fn pick_format(formats: &[wgpu::TextureFormat], prefer_srgb: bool) -> Option<wgpu::TextureFormat> {
    const SRGB: [wgpu::TextureFormat; 2] = [
        wgpu::TextureFormat::Bgra8UnormSrgb,
        wgpu::TextureFormat::Rgba8UnormSrgb,
    ];
    prefer_srgb
        .then(|| SRGB.into_iter().find(|f| formats.contains(f)))
        .flatten()
        .or_else(|| formats.first().copied())
}
