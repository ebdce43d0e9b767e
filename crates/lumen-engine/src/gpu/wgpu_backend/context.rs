use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::error::{BackendError, BackendResult};

use super::GpuInit;
use super::surface::{SurfaceErrorAction, WindowSurface};

/// Owns the wgpu core objects and the surface configuration.
///
/// The adapter is kept so a lost device can be re-requested without touching the
/// surface or the window.
pub(crate) struct GpuContext {
    window: Arc<Window>,

    /// Kept alive for the surface.
    _instance: wgpu::Instance,
    surface: WindowSurface,
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    init: GpuInit,

    /// Set by the device-lost callback of the current device.
    lost: Arc<AtomicBool>,
}

impl GpuContext {
    /// Binds a surface to `window` and requests an adapter and device for it.
    pub async fn new(window: Arc<Window>, init: GpuInit) -> Result<Self> {
        let size = window.inner_size();
        anyhow::ensure!(size.width > 0 && size.height > 0, "window has zero size");

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .context("failed to create wgpu surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: init.power_preference,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("failed to find a suitable GPU adapter")?;

        let lost = Arc::new(AtomicBool::new(false));
        let (device, queue) = request_device(&adapter, &init, &lost)
            .await
            .context("failed to create wgpu device/queue")?;

        let surface = WindowSurface::new(surface, &adapter, &init, size)
            .context("surface supports no formats")?;
        surface.configure(&device);
        let info = adapter.get_info();
        log::info!(
            "wgpu device ready: {} ({:?}), surface {:?}",
            info.name,
            info.backend,
            surface.format()
        );

        Ok(Self {
            window,
            _instance: instance,
            surface,
            adapter,
            device,
            queue,
            init,
            lost,
        })
    }

    #[inline]
    pub fn window(&self) -> &Window {
        &self.window
    }

    #[inline]
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    #[inline]
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    #[inline]
    pub fn surface(&self) -> &wgpu::Surface<'static> {
        self.surface.get()
    }

    #[inline]
    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.surface.format()
    }

    /// Current drawable size in physical pixels.
    #[inline]
    pub fn size(&self) -> PhysicalSize<u32> {
        self.surface.size()
    }

    #[inline]
    pub fn is_lost(&self) -> bool {
        self.lost.load(Ordering::Acquire)
    }

    pub fn resize(&mut self, size: PhysicalSize<u32>) {
        self.surface.resize(&self.device, size);
    }

    /// Reconfigures with the current size, e.g. on a new device.
    pub fn configure_surface(&self) {
        self.surface.configure(&self.device);
    }

    pub fn recover_surface(&self, err: &wgpu::SurfaceError) -> SurfaceErrorAction {
        self.surface.recover(&self.device, err)
    }

    /// Replaces the device with a fresh one from the same adapter.
    pub fn recreate_device(&mut self) -> BackendResult<()> {
        let lost = Arc::new(AtomicBool::new(false));
        let (device, queue) = pollster::block_on(request_device(&self.adapter, &self.init, &lost))
            .map_err(|err| BackendError::Other(format!("device request failed: {err}")))?;

        self.device = device;
        self.queue = queue;
        self.lost = lost;
        self.surface.configure(&self.device);
        Ok(())
    }
}

async fn request_device(
    adapter: &wgpu::Adapter,
    init: &GpuInit,
    lost: &Arc<AtomicBool>,
) -> std::result::Result<(wgpu::Device, wgpu::Queue), wgpu::RequestDeviceError> {
    let (device, queue) = adapter.request_device(&init.device_descriptor()).await?;

    let flag = lost.clone();
    device.set_device_lost_callback(move |reason, message| {
        if matches!(reason, wgpu::DeviceLostReason::Destroyed) {
            return;
        }
        log::warn!("wgpu device lost ({reason:?}): {message}");
        flag.store(true, Ordering::Release);
    });

    Ok((device, queue))
}
