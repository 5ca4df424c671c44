use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{Context, Result};
use futures::FutureExt;
use prism_engine::capture::{CaptureData, CaptureFormat, CaptureFuture, CaptureOptions};
use prism_engine::device::{WgpuContext, WgpuInit};
use prism_engine::loader::FsImageLoader;
use prism_engine::shader::Shaders;
use prism_engine::surface::{Surface, SurfaceConfig, SurfaceResources};
use prism_engine::time::FrameTime;
use winit::dpi::PhysicalSize;

use crate::demo::Demo;
use crate::present::Presenter;
use crate::swapchain::{Presented, Swapchain};

/// Drives one engine surface for a window and presents its output.
pub struct Viewer {
    surface: Surface<WgpuContext>,
    presenter: Presenter,
    demo: Demo,
    captures: Vec<CaptureFuture>,
    saved: u32,
}

impl Viewer {
    pub fn new(swapchain: &Swapchain<'_>, init: &WgpuInit, image: Option<PathBuf>) -> Self {
        let ctx = WgpuContext::from_device(
            swapchain.device().clone(),
            swapchain.queue().clone(),
            init,
        );

        let mut shaders = Shaders::new();
        let demo = Demo::new(&mut shaders, image.as_deref());

        let mut surface = Surface::mount(
            SurfaceResources::new(ctx),
            Rc::new(shaders),
            Box::new(FsImageLoader::new()),
            SurfaceConfig {
                auto_redraw: true,
                preload: demo.preload(),
            },
        );
        surface.on_progress(|p| {
            log::info!("loading {}/{} ({:.0}%)", p.loaded, p.total, p.progress * 100.0)
        });
        surface.on_load(|| log::info!("all images loaded"));

        Self {
            surface,
            presenter: Presenter::new(swapchain.device(), swapchain.format()),
            demo,
            captures: Vec::new(),
            saved: 0,
        }
    }

    pub fn needs_redraw(&self) -> bool {
        self.surface.needs_frame() || self.surface.has_pending_loads() || !self.captures.is_empty()
    }

    /// Queues a PNG capture of the next drawn frame.
    pub fn request_capture(&mut self) {
        let options = CaptureOptions::default().with_format(CaptureFormat::Blob);
        match self.surface.request_capture(options) {
            Ok(future) => {
                if !track_capture(&mut self.captures, future) {
                    log::debug!("capture already queued for the next frame");
                }
            }
            Err(e) => log::error!("capture rejected: {e}"),
        }
    }

    /// Runs one frame: scene update, engine frame, present, finished captures.
    ///
    /// Returns false when the window should close.
    pub fn frame(
        &mut self,
        swapchain: &mut Swapchain<'_>,
        size: PhysicalSize<u32>,
        scale_factor: f64,
        time: FrameTime,
    ) -> Result<bool> {
        self.surface.poll_loads();

        let ratio = scale_factor as f32;
        let (w, h) = (size.width as f32 / ratio, size.height as f32 / ratio);
        self.surface
            .set_scene(self.demo.scene(w, h, ratio, time.elapsed));

        if self.surface.needs_frame() {
            let report = self
                .surface
                .on_animation_frame()
                .context("engine frame failed")?;
            if let Some(e) = report.compile_error {
                log::warn!("frame {} kept the previous scene: {e}", time.frame_index);
            }
        }

        let source = self.surface.context().presentation_view();
        let presenter = &self.presenter;
        let presented = swapchain.present(|device, encoder, view| {
            presenter.blit(device, encoder, source, view);
        });

        self.save_captures();
        Ok(presented != Presented::Lost)
    }

    fn save_captures(&mut self) {
        let mut pending = Vec::with_capacity(self.captures.len());
        for capture in self.captures.drain(..) {
            match capture.clone().now_or_never() {
                None => pending.push(capture),
                Some(Ok(CaptureData::Blob { bytes, .. })) => {
                    self.saved += 1;
                    let path = format!("prism-capture-{}.png", self.saved);
                    match std::fs::write(&path, bytes) {
                        Ok(()) => log::info!("saved {path}"),
                        Err(e) => log::error!("failed to write {path}: {e}"),
                    }
                }
                Some(Ok(CaptureData::Base64(_))) => {}
                Some(Err(e)) => log::error!("capture failed: {e}"),
            }
        }
        self.captures = pending;
    }

    /// Releases every GPU object the surface created.
    pub fn shutdown(self) {
        let mut resources = self.surface.teardown();
        resources.cache.dispose_all(&mut resources.ctx);
    }
}

/// Keeps `future` unless a merged request already handed out the same one.
fn track_capture(captures: &mut Vec<CaptureFuture>, future: CaptureFuture) -> bool {
    if captures.iter().any(|held| held.ptr_eq(&future)) {
        return false;
    }
    captures.push(future);
    true
}
