use std::path::PathBuf;

use anyhow::{Context, Result};
use ouroboros::self_referencing;
use prism_engine::device::WgpuInit;
use prism_engine::time::FrameClock;
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use crate::swapchain::Swapchain;
use crate::viewer::Viewer;

/// Window/runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub title: String,
    pub initial_size: LogicalSize<f64>,
    /// Image composited over the animated background.
    pub image: Option<PathBuf>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            title: "prism".to_string(),
            initial_size: LogicalSize::new(960.0, 600.0),
            image: None,
        }
    }
}

/// Entry point for the runtime.
pub struct Runtime;

impl Runtime {
    pub fn run(config: RuntimeConfig, init: WgpuInit) -> Result<()> {
        let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        let mut state = AppState {
            config,
            init,
            session: None,
            exit_requested: false,
        };

        event_loop
            .run_app(&mut state)
            .context("winit event loop terminated with error")?;

        if let Some(session) = state.session.take() {
            session.viewer.shutdown();
        }
        Ok(())
    }
}

#[self_referencing]
struct WindowEntry {
    clock: FrameClock,

    window: Window,

    #[borrows(window)]
    #[covariant]
    swapchain: Swapchain<'this>,
}

struct Session {
    entry: WindowEntry,
    viewer: Viewer,
}

struct AppState {
    config: RuntimeConfig,
    init: WgpuInit,
    session: Option<Session>,
    exit_requested: bool,
}

impl AppState {
    fn request_exit(&mut self, event_loop: &ActiveEventLoop) {
        self.exit_requested = true;
        event_loop.exit();
    }

    fn create_session(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(self.config.initial_size);

        let window = event_loop
            .create_window(attrs)
            .context("failed to create window")?;

        let init = self.init.clone();
        let entry = WindowEntryTryBuilder {
            clock: FrameClock::default(),
            window,
            swapchain_builder: |w| pollster::block_on(Swapchain::new(w, &init)),
        }
        .try_build()
        .context("GPU initialization failed for window")?;

        let viewer = entry.with_swapchain(|swapchain| {
            Viewer::new(swapchain, &self.init, self.config.image.clone())
        });
        entry.with_window(|w| w.request_redraw());
        self.session = Some(Session { entry, viewer });
        Ok(())
    }
}

impl ApplicationHandler for AppState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.session.is_some() {
            return;
        }
        if let Err(e) = self.create_session(event_loop) {
            log::error!("failed to create window: {e:#}");
            self.request_exit(event_loop);
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }

        event_loop.set_control_flow(ControlFlow::Wait);

        // Redraw only while the surface has work; auto-redraw keeps it busy.
        if let Some(session) = &self.session {
            if session.viewer.needs_redraw() {
                session.entry.with_window(|w| w.request_redraw());
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };

        match &event {
            WindowEvent::CloseRequested => self.request_exit(event_loop),

            WindowEvent::KeyboardInput { event, .. }
                if event.state == ElementState::Pressed && !event.repeat =>
            {
                match event.physical_key {
                    PhysicalKey::Code(KeyCode::KeyC) => session.viewer.request_capture(),
                    PhysicalKey::Code(KeyCode::Escape) => self.request_exit(event_loop),
                    _ => {}
                }
            }

            WindowEvent::Resized(new_size) => {
                session.entry.with_swapchain_mut(|s| s.resize(*new_size));
                session.entry.with_window(|w| w.request_redraw());
            }

            WindowEvent::ScaleFactorChanged { .. } => {
                let new_size = session.entry.with_window(|w| w.inner_size());
                session.entry.with_swapchain_mut(|s| s.resize(new_size));
                session.entry.with_window(|w| w.request_redraw());
            }

            WindowEvent::RedrawRequested => {
                let Session { entry, viewer } = session;
                let result = entry.with_mut(|fields| {
                    let time = fields.clock.tick();
                    let size = fields.window.inner_size();
                    let scale = fields.window.scale_factor();
                    viewer.frame(fields.swapchain, size, scale, time)
                });
                match result {
                    Ok(true) => {}
                    Ok(false) => {
                        log::error!("surface lost beyond recovery");
                        self.request_exit(event_loop);
                    }
                    Err(e) => {
                        log::error!("{e:#}");
                        self.request_exit(event_loop);
                    }
                }
            }

            _ => {}
        }
    }
}
