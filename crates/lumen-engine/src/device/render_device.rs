use std::cell::RefCell;
use std::rc::Rc;

use glam::Mat4;

use crate::coords::Viewport;
use crate::error::{BackendError, DrawError, EngineError, Result};
use crate::gpu::{
    BlendMode, DeviceStatus, DrawCall, FrameStatus, RenderBackend, ReleaseQueue, TextureFilter,
    TextureId,
};
use crate::paint::Color;

use super::lifecycle::{DeviceListener, ListenerId, ListenerTable};

/// Device-owner parameters.
#[derive(Debug, Clone)]
pub struct DeviceInit {
    /// Logical screen size; the default viewport covers it.
    pub screen_width: u32,
    pub screen_height: u32,
}

impl Default for DeviceInit {
    fn default() -> Self {
        Self {
            screen_width: 640,
            screen_height: 480,
        }
    }
}

/// Lifecycle state tracked by the device owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleState {
    Active,
    /// Device lost; listeners have been told (or will be once the device is resettable).
    Lost,
    /// Unrecoverable; the process is expected to terminate.
    Fatal(String),
}

/// Owns the backend, the listener table and the cached pipeline state.
///
/// Device loss is handled here, per frame, and never surfaces as an error: the
/// cooperation test runs after every present and before every frame while lost.
/// Only an unexpected backend failure during that handling is returned, as
/// [`EngineError::DeviceFatal`].
pub struct Device {
    backend: Box<dyn RenderBackend>,
    listeners: ListenerTable,
    releases: ReleaseQueue,

    state: LifecycleState,
    /// Set once listeners were told about the current loss.
    lost_notified: bool,
    /// Bumped on every successful restore.
    generation: u64,

    screen_width: u32,
    screen_height: u32,
    blend: Option<BlendMode>,
    filter: TextureFilter,
    viewport: Viewport,
    view_projection: Mat4,
    render_target: Option<TextureId>,
    in_frame: bool,
}

impl Device {
    pub fn new(backend: Box<dyn RenderBackend>, init: DeviceInit) -> Self {
        log::info!(
            "device created on {} backend ({}x{})",
            backend.name(),
            init.screen_width,
            init.screen_height
        );

        let mut device = Self {
            backend,
            listeners: ListenerTable::new(),
            releases: ReleaseQueue::new(),
            state: LifecycleState::Active,
            lost_notified: false,
            generation: 0,
            screen_width: init.screen_width.max(1),
            screen_height: init.screen_height.max(1),
            blend: None,
            filter: TextureFilter::linear(),
            viewport: Viewport::default(),
            view_projection: Mat4::IDENTITY,
            render_target: None,
            in_frame: false,
        };
        device.reset_device_state();
        device
    }

    // ── accessors ─────────────────────────────────────────────────────────

    pub fn backend(&self) -> &dyn RenderBackend {
        self.backend.as_ref()
    }

    pub fn backend_mut(&mut self) -> &mut dyn RenderBackend {
        self.backend.as_mut()
    }

    /// Sender half of the deferred-release queue; hand clones to resources.
    pub fn release_queue(&self) -> ReleaseQueue {
        self.releases.clone()
    }

    pub fn state(&self) -> &LifecycleState {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == LifecycleState::Active
    }

    /// Number of completed restores.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn screen_size(&self) -> (u32, u32) {
        (self.screen_width, self.screen_height)
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn view_projection(&self) -> Mat4 {
        self.view_projection
    }

    pub fn blend_mode(&self) -> Option<BlendMode> {
        self.blend
    }

    pub fn texture_filter(&self) -> TextureFilter {
        self.filter
    }

    // ── listeners ─────────────────────────────────────────────────────────

    pub fn register_listener<L>(&mut self, listener: &Rc<RefCell<L>>) -> ListenerId
    where
        L: DeviceListener + 'static,
    {
        self.listeners.register(listener)
    }

    pub fn unregister_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.unregister(id)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    // ── frame ─────────────────────────────────────────────────────────────

    /// Starts a frame. Returns [`FrameStatus::Skipped`] while the device is lost.
    pub fn begin_frame(&mut self, clear: Color) -> Result<FrameStatus> {
        self.collect_released();

        if !self.is_active() && !self.test_cooperation()? {
            return Ok(FrameStatus::Skipped);
        }

        match self.backend.begin_frame(clear) {
            Ok(FrameStatus::Ready) => {
                self.in_frame = true;
                Ok(FrameStatus::Ready)
            }
            Ok(FrameStatus::Skipped) => {
                // The backend may have noticed a loss before we did.
                self.test_cooperation()?;
                Ok(FrameStatus::Skipped)
            }
            Err(BackendError::DeviceLost) => {
                self.mark_lost();
                Ok(FrameStatus::Skipped)
            }
            Err(err) => Err(self.fatal(format!("begin frame failed: {err}"))),
        }
    }

    /// Ends the frame. With `present`, presents and runs the cooperation test.
    pub fn end_frame(&mut self, present: bool) -> Result<()> {
        if std::mem::take(&mut self.in_frame) {
            match self.backend.end_frame(present) {
                Ok(()) => {}
                Err(BackendError::DeviceLost) => self.mark_lost(),
                Err(err) => return Err(self.fatal(format!("present failed: {err}"))),
            }
        }

        if present {
            self.test_cooperation()?;
        }
        Ok(())
    }

    /// Per-frame device check.
    ///
    /// Returns `true` when the device was restored by this call. While the device
    /// is lost but not resettable this is a no-op that returns `false`.
    pub fn test_cooperation(&mut self) -> Result<bool> {
        if let LifecycleState::Fatal(msg) = &self.state {
            return Err(EngineError::DeviceFatal(msg.clone()));
        }

        match self.backend.status() {
            DeviceStatus::Operational => {
                if self.state != LifecycleState::Lost {
                    return Ok(false);
                }
                if self.lost_notified {
                    // Listeners already dropped their handles; finish the restore.
                    return self.restore();
                }
                // Loss reported by a call but the device recovered on its own.
                self.state = LifecycleState::Active;
                Ok(false)
            }
            DeviceStatus::Lost => {
                self.mark_lost();
                Ok(false)
            }
            DeviceStatus::NotReset => self.restore(),
            DeviceStatus::Failed(msg) => Err(self.fatal(msg)),
        }
    }

    fn restore(&mut self) -> Result<bool> {
        self.mark_lost();

        if !self.lost_notified {
            log::warn!("device lost; releasing device resources");
            self.collect_released();
            self.backend.release_surfaces();
            self.in_frame = false;
            self.render_target = None;
            if let Err(err) = self.listeners.notify_lost(self.backend.as_mut()) {
                return Err(self.fatal(err.to_string()));
            }
            self.collect_released();
            self.lost_notified = true;
        }

        match self.backend.reset() {
            Ok(()) => {}
            Err(BackendError::DeviceLost) => {
                log::debug!("device not ready for reset yet");
                return Ok(false);
            }
            Err(err) => return Err(self.fatal(format!("device reset failed: {err}"))),
        }

        if let Err(err) = self.backend.acquire_surfaces() {
            return Err(self.fatal(format!("failed to re-acquire surfaces: {err}")));
        }
        if let Err(err) = self.listeners.notify_restored(self.backend.as_mut()) {
            return Err(self.fatal(err.to_string()));
        }

        self.state = LifecycleState::Active;
        self.lost_notified = false;
        self.generation += 1;
        self.reset_device_state();
        log::info!("device restored (generation {})", self.generation);
        Ok(true)
    }

    fn mark_lost(&mut self) {
        if self.state == LifecycleState::Active {
            log::warn!("device lost");
            self.state = LifecycleState::Lost;
        }
    }

    fn fatal(&mut self, msg: String) -> EngineError {
        log::error!("fatal device error: {msg}");
        self.state = LifecycleState::Fatal(msg.clone());
        EngineError::DeviceFatal(msg)
    }

    /// Destroys backend handles whose owners were dropped.
    pub fn collect_released(&mut self) -> usize {
        self.releases.drain(self.backend.as_mut())
    }

    // ── state ─────────────────────────────────────────────────────────────

    /// Restores blend, viewport and filter defaults (after creation and every reset).
    fn reset_device_state(&mut self) {
        self.blend = None;
        self.set_blend_mode(BlendMode::Alpha);
        self.set_viewport(Viewport::new(
            0.0,
            0.0,
            self.screen_width as f32,
            self.screen_height as f32,
        ));
        self.set_texture_filter(TextureFilter::linear());
    }

    /// Applies a blend mode; a repeat of the last applied mode is skipped.
    pub fn set_blend_mode(&mut self, mode: BlendMode) {
        if self.blend == Some(mode) {
            return;
        }
        self.blend = Some(mode);
        self.backend.set_blend_mode(mode);
    }

    pub fn set_texture_filter(&mut self, filter: TextureFilter) {
        self.filter = filter;
        self.backend.set_texture_filter(filter);
    }

    /// Sets the viewport and recomputes the view-projection matrix.
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        self.view_projection = viewport.view_projection();
        self.backend.set_viewport(&viewport);
    }

    /// Window resize: resizes the surface and resets the viewport to the new screen.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.screen_width = width;
        self.screen_height = height;
        self.backend.resize_surface(width, height);
        self.set_viewport(Viewport::new(0.0, 0.0, width as f32, height as f32));
    }

    /// Redirects draws into `target`, or back to the screen with `None`.
    pub fn set_render_target(&mut self, target: Option<TextureId>) -> Result<()> {
        self.backend
            .set_render_target(target)
            .map_err(|err| EngineError::invalid(format!("cannot bind render target: {err}")))?;
        self.render_target = target;
        Ok(())
    }

    pub fn render_target(&self) -> Option<TextureId> {
        self.render_target
    }

    /// Issues a draw. Skipped with [`DrawError::DeviceLost`] while the device is lost.
    pub fn draw(&mut self, call: &DrawCall<'_>) -> std::result::Result<(), DrawError> {
        if !self.is_active() {
            return Err(DrawError::DeviceLost);
        }
        self.backend.draw(call).map_err(|err| {
            if err == BackendError::DeviceLost {
                self.mark_lost();
            }
            DrawError::from(err)
        })
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        let released = self.collect_released();
        if released > 0 {
            log::debug!("released {released} deferred handles at device shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::HeadlessBackend;

    struct Counter {
        lost: u32,
        restored: u32,
    }

    impl DeviceListener for Counter {
        fn on_device_lost(&mut self, _backend: &mut dyn RenderBackend) -> Result<()> {
            self.lost += 1;
            Ok(())
        }

        fn on_device_restored(&mut self, _backend: &mut dyn RenderBackend) -> Result<()> {
            self.restored += 1;
            Ok(())
        }
    }

    fn device() -> (Device, Rc<RefCell<HeadlessBackend>>) {
        let backend = HeadlessBackend::shared();
        let device = Device::new(Box::new(backend.clone()), DeviceInit::default());
        (device, backend)
    }

    fn counter() -> Rc<RefCell<Counter>> {
        Rc::new(RefCell::new(Counter {
            lost: 0,
            restored: 0,
        }))
    }

    // ── state cache ───────────────────────────────────────────────────────

    #[test]
    fn redundant_blend_modes_are_skipped() {
        let (mut device, backend) = device();
        device.set_blend_mode(BlendMode::Alpha);
        device.set_blend_mode(BlendMode::Add);
        device.set_blend_mode(BlendMode::Add);
        device.set_blend_mode(BlendMode::Alpha);
        assert_eq!(
            backend.borrow().blend_changes(),
            &[BlendMode::Alpha, BlendMode::Add, BlendMode::Alpha]
        );
    }

    #[test]
    fn default_viewport_covers_the_screen() {
        let (device, backend) = device();
        assert_eq!(device.viewport(), Viewport::new(0.0, 0.0, 640.0, 480.0));
        assert_eq!(backend.borrow().viewport(), device.viewport());
        assert_eq!(backend.borrow().texture_filter(), TextureFilter::linear());
    }

    // ── lifecycle ─────────────────────────────────────────────────────────

    #[test]
    fn loss_and_restore_notify_once_each() {
        let (mut device, backend) = device();
        let listener = counter();
        device.register_listener(&listener);

        assert_eq!(device.begin_frame(Color::BLACK).unwrap(), FrameStatus::Ready);
        backend.borrow_mut().lose_device();
        device.end_frame(true).unwrap();

        assert!(device.is_active());
        assert_eq!(device.generation(), 1);
        let l = listener.borrow();
        assert_eq!((l.lost, l.restored), (1, 1));
        assert!(backend.borrow().surfaces_acquired());
    }

    #[test]
    fn waiting_for_reset_does_not_renotify() {
        let (mut device, backend) = device();
        let listener = counter();
        device.register_listener(&listener);

        backend.borrow_mut().lose_device();
        backend.borrow_mut().fail_next_reset(BackendError::DeviceLost);
        backend.borrow_mut().fail_next_reset(BackendError::DeviceLost);

        assert!(!device.test_cooperation().unwrap());
        assert_eq!(device.state(), &LifecycleState::Lost);
        assert_eq!(device.begin_frame(Color::BLACK).unwrap(), FrameStatus::Skipped);
        assert_eq!(device.begin_frame(Color::BLACK).unwrap(), FrameStatus::Ready);

        let l = listener.borrow();
        assert_eq!((l.lost, l.restored), (1, 1));
    }

    #[test]
    fn lost_but_not_resettable_waits_without_notifying() {
        let (mut device, backend) = device();
        let listener = counter();
        device.register_listener(&listener);

        backend.borrow_mut().set_status(DeviceStatus::Lost);
        assert_eq!(device.begin_frame(Color::BLACK).unwrap(), FrameStatus::Skipped);
        device.end_frame(true).unwrap();
        assert_eq!(device.state(), &LifecycleState::Lost);
        assert_eq!(listener.borrow().lost, 0);

        backend.borrow_mut().lose_device();
        assert!(device.test_cooperation().unwrap());
        assert!(device.is_active());
    }

    #[test]
    fn unexpected_reset_failure_is_fatal() {
        let (mut device, backend) = device();
        backend.borrow_mut().lose_device();
        backend
            .borrow_mut()
            .fail_next_reset(BackendError::Other("driver hung".into()));

        let err = device.test_cooperation().unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(device.state(), LifecycleState::Fatal(_)));
        assert!(device.begin_frame(Color::BLACK).unwrap_err().is_fatal());
    }

    #[test]
    fn failed_status_is_fatal() {
        let (mut device, backend) = device();
        backend
            .borrow_mut()
            .set_status(DeviceStatus::Failed("adapter removed".into()));
        assert!(device.test_cooperation().unwrap_err().is_fatal());
    }

    #[test]
    fn restore_resets_cached_state() {
        let (mut device, backend) = device();
        device.set_blend_mode(BlendMode::Invert);
        backend.borrow_mut().lose_device();
        device.test_cooperation().unwrap();
        assert_eq!(device.blend_mode(), Some(BlendMode::Alpha));
        assert_eq!(backend.borrow().blend_changes().last(), Some(&BlendMode::Alpha));
    }

    #[test]
    fn draws_are_skipped_while_lost() {
        let (mut device, backend) = device();
        backend.borrow_mut().set_status(DeviceStatus::Lost);
        device.test_cooperation().unwrap();

        let call = DrawCall {
            program: Default::default(),
            technique: 0,
            pass: 0,
            topology: crate::gpu::PrimitiveTopology::Triangles,
            primitive_count: 1,
            vertex_buffer: Default::default(),
            vertex_stride: 24,
            vertex_count: 3,
            index_buffer: None,
            texture: None,
            uniforms: &[],
        };
        assert_eq!(device.draw(&call), Err(DrawError::DeviceLost));
    }
}
