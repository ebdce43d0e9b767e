use std::sync::Arc;

use anyhow::{Context, Result};
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::config::GraphicsConfig;
use crate::core::{App, AppControl, Graphics, run_step};
use crate::gpu::{GpuInit, WgpuBackend};
use crate::logging::{LoggingConfig, init_logging};
use crate::time::FixedStepClock;

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub title: String,
    /// Initial window size in logical pixels.
    pub width: u32,
    pub height: u32,
    pub steps_per_second: u32,
    /// Installed before the window opens. `None` leaves logging to the host.
    pub logging: Option<LoggingConfig>,
    pub gpu: GpuInit,
    /// The screen size is overwritten with the window's drawable size.
    pub graphics: GraphicsConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            title: "lumen".to_string(),
            width: 640,
            height: 480,
            steps_per_second: 60,
            logging: Some(LoggingConfig::default()),
            gpu: GpuInit::default(),
            graphics: GraphicsConfig::default(),
        }
    }
}

/// Owns the event loop for one window.
pub struct Runtime;

impl Runtime {
    /// Opens the window and drives `app` until it exits or the window closes.
    ///
    /// Returns the first error raised by startup, an update, or the device.
    pub fn run<A: App + 'static>(config: RuntimeConfig, app: A) -> Result<()> {
        if let Some(logging) = &config.logging {
            init_logging(logging);
        }

        let event_loop = EventLoop::new().context("failed to create event loop")?;
        let mut host = Host::new(config, app);
        event_loop
            .run_app(&mut host)
            .context("event loop terminated with an error")?;

        host.error.map_or(Ok(()), Err)
    }
}

/// Window and graphics, created together on the first resume.
struct Live {
    window: Arc<Window>,
    gfx: Graphics,
}

struct Host<A> {
    config: RuntimeConfig,
    app: A,
    live: Option<Live>,
    clock: FixedStepClock,
    exiting: bool,
    error: Option<anyhow::Error>,
}

impl<A: App + 'static> Host<A> {
    fn new(config: RuntimeConfig, app: A) -> Self {
        let clock = FixedStepClock::new(config.steps_per_second);
        Self {
            config,
            app,
            live: None,
            clock,
            exiting: false,
            error: None,
        }
    }

    /// Drops graphics before the loop exits so backend objects go before the device.
    fn exit(&mut self, event_loop: &ActiveEventLoop) {
        self.exiting = true;
        self.live = None;
        event_loop.exit();
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        log::error!("{err:#}");
        self.error.get_or_insert(err);
        self.exit(event_loop);
    }

    fn open(&mut self, event_loop: &ActiveEventLoop) -> Result<Live> {
        let attrs = Window::default_attributes()
            .with_title(self.config.title.as_str())
            .with_inner_size(LogicalSize::new(self.config.width, self.config.height));
        let window = Arc::new(
            event_loop
                .create_window(attrs)
                .context("failed to create window")?,
        );

        let backend = WgpuBackend::new(window.clone(), self.config.gpu.clone())?;
        let size = window.inner_size();
        let graphics = GraphicsConfig {
            screen_width: size.width,
            screen_height: size.height,
            ..self.config.graphics.clone()
        };
        let mut gfx = Graphics::new(Box::new(backend), graphics)
            .context("failed to initialize graphics")?;
        self.app.start(&mut gfx).context("application failed to start")?;

        log::info!("window open at {}x{}", size.width, size.height);
        Ok(Live { window, gfx })
    }

    /// Runs every fixed step that is due.
    fn step(&mut self, event_loop: &ActiveEventLoop) {
        let Some(live) = self.live.as_mut() else { return };

        for _ in 0..self.clock.tick() {
            let time = self.clock.next_step();
            match run_step(&mut self.app, &mut live.gfx, time, self.clock.fps()) {
                Ok(AppControl::Continue) => {}
                Ok(AppControl::Exit) => return self.exit(event_loop),
                Err(err) => return self.fail(event_loop, err),
            }
        }
    }

    fn sync_size(&mut self) {
        if let Some(live) = self.live.as_mut() {
            let size = live.window.inner_size();
            live.gfx.device_mut().resize(size.width, size.height);
            live.window.request_redraw();
        }
    }
}

impl<A: App + 'static> ApplicationHandler for Host<A> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.live.is_some() || self.exiting {
            return;
        }
        match self.open(event_loop) {
            Ok(live) => {
                live.window.request_redraw();
                self.clock.reset();
                self.live = Some(live);
            }
            Err(err) => self.fail(event_loop, err),
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.exiting {
            return event_loop.exit();
        }
        // Redraw continuously; the clock decides how many steps each redraw runs.
        event_loop.set_control_flow(ControlFlow::Wait);
        if let Some(live) = &self.live {
            live.window.request_redraw();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        if self.exiting {
            return event_loop.exit();
        }
        if self.app.on_window_event(&event) == AppControl::Exit {
            return self.exit(event_loop);
        }

        match event {
            WindowEvent::CloseRequested => self.exit(event_loop),
            WindowEvent::Resized(_) | WindowEvent::ScaleFactorChanged { .. } => self.sync_size(),
            WindowEvent::RedrawRequested => self.step(event_loop),
            _ => {}
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.live = None;
    }
}
