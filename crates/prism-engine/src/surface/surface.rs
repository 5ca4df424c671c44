use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crate::cache::{ImageState, ResourceCache};
use crate::capture::{CaptureFuture, CaptureOptions, CaptureQueue};
use crate::compile::{CompiledNode, compile};
use crate::draw::{ContentSource, DebugProbe, DrawEngine, DrawStats};
use crate::error::{CompileError, ConfigurationError, SyncError};
use crate::gfx::GraphicsContext;
use crate::loader::{ImageLoader, PendingLoads};
use crate::preload::{PreloadProgress, PreloadTracker};
use crate::scene::SceneNode;
use crate::scheduler::{FrameScheduler, FrameState};
use crate::shader::ShaderRegistry;

use super::SurfaceResources;

/// Mount-time options of a surface.
#[derive(Debug, Clone, Default)]
pub struct SurfaceConfig {
    /// Draw every frame, for time-varying uniforms.
    pub auto_redraw: bool,
    /// Uris that must settle before the first draw.
    pub preload: Vec<String>,
}

/// What one animation frame callback did.
#[derive(Debug, Default)]
pub struct FrameReport {
    pub synced: bool,
    /// Author error caught during sync; the previous tree stayed in effect.
    pub compile_error: Option<CompileError>,
    pub drawn: Option<DrawStats>,
    /// The preload load callback fired after this frame's draw.
    pub loaded: bool,
}

/// One rendering surface: owns its resources and drives sync and draw from
/// host animation frames.
///
/// The host calls [`Surface::on_animation_frame`] whenever
/// [`Surface::needs_frame`] is true, and [`Surface::poll_loads`] regularly
/// while [`Surface::has_pending_loads`] is true.
pub struct Surface<G: GraphicsContext> {
    resources: SurfaceResources<G>,
    registry: Rc<dyn ShaderRegistry>,
    loader: Box<dyn ImageLoader>,
    loads: PendingLoads,
    scheduler: FrameScheduler,
    preload: PreloadTracker,
    captures: CaptureQueue,
    engine: DrawEngine,
    probe: Option<DebugProbe>,
    scene: Option<Arc<SceneNode>>,
    compiled: Option<CompiledNode>,
    contents: Vec<Box<dyn ContentSource>>,
}

impl<G: GraphicsContext> fmt::Debug for Surface<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Surface")
            .field("scheduler", &self.scheduler)
            .field("preload", &self.preload)
            .field("captures", &self.captures.len())
            .field("contents", &self.contents.len())
            .field("compiled", &self.compiled.is_some())
            .finish_non_exhaustive()
    }
}

impl<G: GraphicsContext> Surface<G> {
    pub fn mount(
        resources: SurfaceResources<G>,
        registry: Rc<dyn ShaderRegistry>,
        loader: Box<dyn ImageLoader>,
        config: SurfaceConfig,
    ) -> Self {
        let mut preload = PreloadTracker::new(config.preload);
        let settled: Vec<&str> = resources
            .cache
            .image_uris()
            .filter(|uri| {
                resources
                    .cache
                    .image(uri)
                    .is_some_and(|img| img.state != ImageState::Loading)
            })
            .collect();
        preload.seed(settled);

        let mut scheduler = FrameScheduler::new();
        scheduler.set_auto_redraw(config.auto_redraw);

        log::info!(
            "surface mounted (auto_redraw: {}, preload: {})",
            config.auto_redraw,
            preload.manifest().count()
        );

        Self {
            resources,
            registry,
            loader,
            loads: PendingLoads::new(),
            scheduler,
            preload,
            captures: CaptureQueue::new(),
            engine: DrawEngine::new(),
            probe: None,
            scene: None,
            compiled: None,
            contents: Vec::new(),
        }
    }

    pub fn context(&self) -> &G {
        &self.resources.ctx
    }

    pub fn context_mut(&mut self) -> &mut G {
        &mut self.resources.ctx
    }

    pub fn cache(&self) -> &ResourceCache {
        &self.resources.cache
    }

    pub fn compiled(&self) -> Option<&CompiledNode> {
        self.compiled.as_ref()
    }

    pub fn frame_state(&self) -> FrameState {
        self.scheduler.state()
    }

    /// Supplies a new scene description; it is compiled on the next frame.
    pub fn set_scene(&mut self, root: impl Into<Arc<SceneNode>>) {
        self.scene = Some(root.into());
        self.scheduler.invalidate_scene();
    }

    /// Replaces the content inputs sampled through `Uniform::Content`.
    ///
    /// A different number of inputs resizes the content pool and forces a
    /// resync; otherwise only a redraw is requested.
    pub fn set_contents(&mut self, contents: Vec<Box<dyn ContentSource>>) {
        let SurfaceResources { ctx, cache } = &mut self.resources;
        if contents.len() != cache.content_len() {
            cache.resize_content_textures(ctx, contents.len());
            self.scheduler.invalidate_scene();
        } else {
            self.scheduler.request_draw();
        }
        self.contents = contents;
    }

    /// Redraws without recompiling, e.g. after content inputs changed.
    pub fn request_draw(&mut self) {
        self.scheduler.request_draw();
    }

    pub fn set_auto_redraw(&mut self, on: bool) {
        self.scheduler.set_auto_redraw(on);
    }

    pub fn set_preload<I, S>(&mut self, manifest: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.preload.set_manifest(manifest);
        self.scheduler.request_draw();
    }

    pub fn on_progress(&mut self, cb: impl FnMut(PreloadProgress) + 'static) {
        self.preload.set_on_progress(cb);
    }

    pub fn on_load(&mut self, cb: impl FnMut() + 'static) {
        self.preload.set_on_load(cb);
    }

    pub fn preload_progress(&self) -> PreloadProgress {
        self.preload.progress()
    }

    /// Captures the next drawn frame.
    pub fn request_capture(
        &mut self,
        options: CaptureOptions,
    ) -> Result<CaptureFuture, ConfigurationError> {
        let future = self.captures.request(options)?;
        self.scheduler.request_draw();
        Ok(future)
    }

    /// Like [`Surface::request_capture`], with `{format, type, quality}` JSON options.
    pub fn request_capture_json(
        &mut self,
        options: &serde_json::Value,
    ) -> Result<CaptureFuture, ConfigurationError> {
        self.request_capture(CaptureOptions::from_json(options)?)
    }

    /// Attaches a probe, replacing any previous one.
    pub fn attach_debug_probe(&mut self, probe: DebugProbe) {
        self.probe = Some(probe);
        self.scheduler.request_draw();
    }

    pub fn detach_debug_probe(&mut self) -> Option<DebugProbe> {
        self.probe.take()
    }

    pub fn needs_frame(&self) -> bool {
        self.scheduler.wants_frame()
    }

    pub fn has_pending_loads(&self) -> bool {
        !self.loads.is_empty()
    }

    /// Applies completed image loads. Each one requests a redraw.
    pub fn poll_loads(&mut self) -> usize {
        let ready = self.loads.poll_ready();
        let mut applied = 0;
        for (uri, result) in ready {
            let SurfaceResources { ctx, cache } = &mut self.resources;
            if cache.complete_image(ctx, &uri, result).is_some() {
                self.preload.mark_loaded(&uri);
                applied += 1;
            }
        }
        if applied > 0 {
            self.scheduler.request_draw();
        }
        applied
    }

    /// Runs one animation frame callback.
    ///
    /// Compile errors are caught and reported; any other failure is returned.
    pub fn on_animation_frame(&mut self) -> anyhow::Result<FrameReport> {
        let plan = self.scheduler.begin_frame();
        let mut report = FrameReport::default();

        if plan.sync {
            match self.sync() {
                Ok(()) => {
                    self.scheduler.finish_sync(true);
                    report.synced = true;
                }
                Err(SyncError::Compile(e)) => {
                    log::error!("{e}");
                    self.scheduler.finish_sync(false);
                    report.compile_error = Some(e);
                }
                Err(SyncError::Fatal(e)) => return Err(e),
            }
        }

        if plan.draw {
            match &self.compiled {
                Some(root) if self.preload.is_satisfied() => {
                    let SurfaceResources { ctx, cache } = &mut self.resources;
                    let stats = self.engine.draw(
                        ctx,
                        cache,
                        root,
                        &self.contents,
                        self.probe.as_mut(),
                        &mut self.captures,
                    );
                    self.scheduler.finish_draw(true);
                    report.drawn = Some(stats);
                    report.loaded = self.preload.after_draw();
                }
                Some(_) => {
                    log::debug!(
                        "draw withheld, preload at {}/{}",
                        self.preload.progress().loaded,
                        self.preload.progress().total
                    );
                    self.scheduler.finish_draw(false);
                }
                None => self.scheduler.finish_draw(true),
            }
        }

        Ok(report)
    }

    fn sync(&mut self) -> Result<(), SyncError> {
        let Some(scene) = self.scene.clone() else {
            return Ok(());
        };
        let SurfaceResources { ctx, cache } = &mut self.resources;
        let compiled = compile(ctx, cache, self.registry.as_ref(), &scene)?;

        for uri in &compiled.report.dropped_images {
            self.loads.cancel(uri);
        }
        for uri in &compiled.report.new_images {
            self.loads.start(self.loader.as_ref(), uri);
        }
        self.preload
            .note_in_tree(compiled.report.new_images.iter().map(String::as_str));

        log::debug!("scene compiled ({} nodes)", compiled.root.node_count());
        self.compiled = Some(compiled.root);
        Ok(())
    }

    /// Stops the surface and hands back its resources.
    ///
    /// Cancels the armed frame and in-flight loads, rejects pending captures
    /// and releases deferred disposals.
    pub fn teardown(mut self) -> SurfaceResources<G> {
        self.scheduler.cancel();
        self.loads.cancel_all();
        self.captures.reject_all();
        self.compiled = None;
        let SurfaceResources { ctx, cache } = &mut self.resources;
        cache.drain_disposals(ctx);
        log::info!("surface torn down");
        self.resources
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use futures::FutureExt;
    use serde_json::json;

    use super::*;
    use crate::draw::{DebugProbeConfig, PixelContent};
    use crate::error::{CaptureError, TeardownError};
    use crate::gfx::recording::{Event, RecordingContext};
    use crate::gfx::{Extent, RenderTarget};
    use crate::loader::DecodedImage;
    use crate::loader::manual::ManualLoader;
    use crate::scene::{Target, Uniform};
    use crate::shader::{ShaderId, Shaders};

    struct Ids {
        plain: ShaderId,
        sampler: ShaderId,
        triple: ShaderId,
    }

    fn registry() -> (Rc<dyn ShaderRegistry>, Ids) {
        let mut shaders = Shaders::new();
        let ids = Ids {
            plain: shaders.create("plain", "t: float"),
            sampler: shaders.create("sampler", "img: sampler2D"),
            triple: shaders.create("triple", "a: sampler2D; b: sampler2D; c: sampler2D"),
        };
        (Rc::new(shaders), ids)
    }

    fn mount(config: SurfaceConfig) -> (Surface<RecordingContext>, ManualLoader, Ids) {
        let (registry, ids) = registry();
        let loader = ManualLoader::new();
        let surface = Surface::mount(
            SurfaceResources::new(RecordingContext::new()),
            registry,
            Box::new(loader.clone()),
            config,
        );
        (surface, loader, ids)
    }

    fn pixel() -> DecodedImage {
        DecodedImage {
            size: Extent::new(1, 1),
            pixels: vec![255; 4],
        }
    }

    fn draws(surface: &Surface<RecordingContext>) -> usize {
        surface.context().count(|e| *e == Event::Draw)
    }

    #[test]
    fn scene_change_compiles_and_draws_once() {
        let (mut surface, _, ids) = mount(SurfaceConfig::default());
        assert!(!surface.needs_frame());

        surface.set_scene(SceneNode::new(ids.plain, 2.0, 2.0).with_uniform("t", 1.0f32));
        assert!(surface.needs_frame());
        let report = surface.on_animation_frame().unwrap();
        assert!(report.synced);
        assert_eq!(report.drawn.map(|s| s.nodes), Some(1));
        assert!(report.loaded);

        assert!(!surface.needs_frame());
        assert_eq!(surface.frame_state(), FrameState::Idle);
    }

    #[test]
    fn preload_withholds_draw_until_manifest_settles() {
        let (mut surface, loader, ids) = mount(SurfaceConfig {
            preload: vec!["a.png".into(), "b.png".into(), "c.png".into()],
            ..Default::default()
        });
        let progress: Rc<RefCell<Vec<PreloadProgress>>> = Rc::default();
        let loads = Rc::new(RefCell::new(0));
        {
            let progress = Rc::clone(&progress);
            surface.on_progress(move |p| progress.borrow_mut().push(p));
            let loads = Rc::clone(&loads);
            surface.on_load(move || *loads.borrow_mut() += 1);
        }

        surface.set_scene(
            SceneNode::new(ids.triple, 2.0, 2.0)
                .with_uniform("a", Uniform::uri("a.png"))
                .with_uniform("b", Uniform::uri("b.png"))
                .with_uniform("c", Uniform::uri("c.png")),
        );
        let report = surface.on_animation_frame().unwrap();
        assert!(report.synced);
        assert!(report.drawn.is_none());
        assert_eq!(loader.started().len(), 3);

        loader.complete("a.png", Ok(pixel()));
        loader.complete("b.png", Ok(pixel()));
        assert_eq!(surface.poll_loads(), 2);
        let last = *progress.borrow().last().unwrap();
        assert_eq!((last.loaded, last.total), (2, 3));
        assert!((last.progress - 0.667).abs() < 1e-3);

        let report = surface.on_animation_frame().unwrap();
        assert!(report.drawn.is_none());
        assert_eq!(draws(&surface), 0);

        loader.complete("c.png", Ok(pixel()));
        surface.poll_loads();
        assert!(surface.needs_frame());
        let report = surface.on_animation_frame().unwrap();
        assert!(!report.synced);
        assert!(report.drawn.is_some());
        assert!(report.loaded);
        assert_eq!(*loads.borrow(), 1);

        surface.request_draw();
        surface.on_animation_frame().unwrap();
        assert_eq!(*loads.borrow(), 1);
    }

    #[test]
    fn failed_load_settles_the_manifest() {
        let (mut surface, loader, ids) = mount(SurfaceConfig {
            preload: vec!["missing.png".into()],
            ..Default::default()
        });
        surface.set_scene(
            SceneNode::new(ids.sampler, 1.0, 1.0).with_uniform("img", Uniform::uri("missing.png")),
        );
        surface.on_animation_frame().unwrap();
        loader.fail("missing.png");
        surface.poll_loads();
        assert!(surface.on_animation_frame().unwrap().drawn.is_some());
        assert_eq!(
            surface.cache().image("missing.png").map(|i| i.state),
            Some(ImageState::Failed)
        );
    }

    #[test]
    fn compile_error_keeps_previous_tree_and_is_not_retried() {
        let (mut surface, _, ids) = mount(SurfaceConfig::default());
        surface.set_scene(SceneNode::new(ids.plain, 1.0, 1.0).with_uniform("t", 0.0f32));
        surface.on_animation_frame().unwrap();
        let good = surface.compiled().map(|c| c.program.id());

        surface.set_scene(SceneNode::new(ShaderId(404), 1.0, 1.0));
        let report = surface.on_animation_frame().unwrap();
        assert_eq!(
            report.compile_error,
            Some(CompileError::UnknownShader(ShaderId(404)))
        );
        assert!(report.drawn.is_some());
        assert_eq!(surface.compiled().map(|c| c.program.id()), good);
        assert_eq!(surface.frame_state(), FrameState::SyncPending);
        assert!(!surface.needs_frame());

        surface.request_draw();
        let report = surface.on_animation_frame().unwrap();
        assert!(report.compile_error.is_none());
        assert!(!report.synced);

        surface.set_scene(SceneNode::new(ids.plain, 1.0, 1.0).with_uniform("t", 2.0f32));
        assert!(surface.on_animation_frame().unwrap().synced);
    }

    #[test]
    fn capture_requests_a_draw_without_resync() {
        let (mut surface, _, ids) = mount(SurfaceConfig::default());
        surface.set_scene(SceneNode::new(ids.plain, 2.0, 2.0).with_uniform("t", 0.0f32));
        surface.on_animation_frame().unwrap();

        let a = surface.request_capture(CaptureOptions::default()).unwrap();
        let b = surface
            .request_capture_json(&json!({"format": "base64", "type": "png", "quality": 1}))
            .unwrap();
        let c = surface
            .request_capture_json(&json!({"quality": 0.5}))
            .unwrap();
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&c));
        assert!(surface.needs_frame());

        let report = surface.on_animation_frame().unwrap();
        assert!(!report.synced);
        assert_eq!(report.drawn.map(|s| s.captures), Some(2));
        assert!(a.now_or_never().unwrap().is_ok());
        assert!(c.now_or_never().unwrap().is_ok());
    }

    #[test]
    fn invalid_capture_options_fail_synchronously() {
        let (mut surface, ..) = mount(SurfaceConfig::default());
        assert!(matches!(
            surface.request_capture_json(&json!({"quality": 1.5})),
            Err(ConfigurationError::InvalidQuality(_))
        ));
        assert!(matches!(
            surface.request_capture_json(&json!({"format": 42})),
            Err(ConfigurationError::InvalidFormat(_))
        ));
        assert!(!surface.needs_frame());
    }

    #[test]
    fn teardown_rejects_pending_captures() {
        let (mut surface, _, ids) = mount(SurfaceConfig::default());
        surface.set_scene(SceneNode::new(ids.plain, 1.0, 1.0).with_uniform("t", 0.0f32));
        let capture = surface.request_capture(CaptureOptions::default()).unwrap();

        let resources = surface.teardown();
        assert_eq!(
            capture.now_or_never(),
            Some(Err(CaptureError::Teardown(TeardownError)))
        );
        assert_eq!(resources.ctx.count(|e| *e == Event::Draw), 0);
    }

    #[test]
    fn dropped_shader_is_disposed_after_its_last_draw() {
        let (mut surface, _, ids) = mount(SurfaceConfig::default());
        surface.set_scene(SceneNode::new(ids.plain, 1.0, 1.0).with_uniform("t", 0.0f32));
        surface.on_animation_frame().unwrap();
        let old = surface.compiled().map(|c| c.program.id()).unwrap();

        surface.set_scene(SceneNode::new(ids.sampler, 1.0, 1.0).with_uniform("img", Uniform::Empty));
        surface.on_animation_frame().unwrap();
        surface.set_scene(SceneNode::new(ids.sampler, 1.0, 1.0).with_uniform("img", Uniform::Empty));
        surface.on_animation_frame().unwrap();

        let ctx = surface.context();
        assert_eq!(ctx.count(|e| *e == Event::DisposeProgram(old)), 1);
        let last_draw_of_old = ctx
            .events
            .iter()
            .rposition(|e| *e == Event::BindProgram(old))
            .unwrap();
        let dispose = ctx.position(|e| *e == Event::DisposeProgram(old)).unwrap();
        assert!(last_draw_of_old < dispose);
        assert_eq!(ctx.count(|e| matches!(e, Event::CreateProgram(..))), 2);
    }

    #[test]
    fn auto_redraw_draws_every_frame() {
        let (mut surface, _, ids) = mount(SurfaceConfig {
            auto_redraw: true,
            ..Default::default()
        });
        surface.set_scene(SceneNode::new(ids.plain, 1.0, 1.0).with_uniform("t", 0.0f32));
        for _ in 0..3 {
            assert!(surface.needs_frame());
            surface.on_animation_frame().unwrap();
        }
        assert_eq!(draws(&surface), 3);

        surface.set_auto_redraw(false);
        surface.on_animation_frame().unwrap();
        assert!(!surface.needs_frame());
    }

    #[test]
    fn content_count_change_forces_resync() {
        let (mut surface, _, ids) = mount(SurfaceConfig::default());
        surface.set_scene(SceneNode::new(ids.sampler, 1.0, 1.0).with_uniform("img", Uniform::Content(0)));
        let report = surface.on_animation_frame().unwrap();
        assert!(matches!(report.compile_error, Some(CompileError::MissingContent { .. })));

        let frame: Box<dyn ContentSource> = Box::new(PixelContent {
            label: "frame".into(),
            size: Extent::new(1, 1),
            pixels: vec![0; 4],
        });
        surface.set_contents(vec![frame]);
        let report = surface.on_animation_frame().unwrap();
        assert!(report.synced);
        assert!(report.drawn.is_some());

        let empty: Box<dyn ContentSource> = Box::new(PixelContent::default());
        surface.set_contents(vec![empty]);
        let report = surface.on_animation_frame().unwrap();
        assert!(!report.synced);
        assert!(report.drawn.is_some());
    }

    #[test]
    fn shrunk_content_stays_bound_until_a_resync_succeeds() {
        let (mut surface, _, ids) = mount(SurfaceConfig::default());
        let two: Vec<Box<dyn ContentSource>> =
            vec![Box::new(PixelContent::default()), Box::new(PixelContent::default())];
        surface.set_contents(two);
        surface.set_scene(SceneNode::new(ids.sampler, 1.0, 1.0).with_uniform("img", Uniform::Content(1)));
        assert!(surface.on_animation_frame().unwrap().synced);
        let bound = surface.cache().content_texture(1).unwrap();

        let one: Vec<Box<dyn ContentSource>> = vec![Box::new(PixelContent::default())];
        surface.set_contents(one);
        let report = surface.on_animation_frame().unwrap();
        assert!(matches!(
            report.compile_error,
            Some(CompileError::MissingContent { index: 1, .. })
        ));
        assert!(report.drawn.is_some());

        surface.request_draw();
        assert!(surface.on_animation_frame().unwrap().drawn.is_some());
        assert!(surface.context().live_textures.contains(&bound));
        assert_eq!(surface.cache().retired_content_len(), 1);

        surface.set_scene(SceneNode::new(ids.sampler, 1.0, 1.0).with_uniform("img", Uniform::Content(0)));
        assert!(surface.on_animation_frame().unwrap().synced);
        assert!(!surface.context().live_textures.contains(&bound));
        assert_eq!(surface.context().count(|e| *e == Event::DisposeTexture(bound)), 1);
    }

    #[test]
    fn probe_attachment_triggers_a_draw() {
        let (mut surface, _, ids) = mount(SurfaceConfig::default());
        surface.set_scene(
            SceneNode::new(ids.sampler, 2.0, 2.0)
                .with_uniform("img", Uniform::Fbo(1))
                .with_child(
                    SceneNode::new(ids.plain, 2.0, 2.0)
                        .with_uniform("t", 0.0f32)
                        .with_target(Target::Offscreen(1)),
                ),
        );
        surface.on_animation_frame().unwrap();

        let seen = Rc::new(RefCell::new(0usize));
        let sink = Rc::clone(&seen);
        surface.attach_debug_probe(DebugProbe::new(DebugProbeConfig::default(), move |frame| {
            *sink.borrow_mut() += 1 + frame.tree.children.len();
        }));
        assert!(surface.needs_frame());
        surface.on_animation_frame().unwrap();
        assert_eq!(*seen.borrow(), 2);
        assert!(surface
            .context()
            .events
            .contains(&Event::ReadPixels(RenderTarget::Surface)));

        assert!(surface.detach_debug_probe().is_some());
    }

    #[test]
    fn remounted_cache_seeds_preload() {
        let (registry, ids) = registry();
        let loader = ManualLoader::new();
        let mut surface = Surface::mount(
            SurfaceResources::new(RecordingContext::new()),
            Rc::clone(&registry),
            Box::new(loader.clone()),
            SurfaceConfig::default(),
        );
        surface.set_scene(SceneNode::new(ids.sampler, 1.0, 1.0).with_uniform("img", Uniform::uri("a.png")));
        surface.on_animation_frame().unwrap();
        loader.complete("a.png", Ok(pixel()));
        surface.poll_loads();
        let resources = surface.teardown();

        let surface = Surface::mount(
            resources,
            registry,
            Box::new(loader),
            SurfaceConfig {
                preload: vec!["a.png".into()],
                ..Default::default()
            },
        );
        assert_eq!(surface.preload_progress().loaded, 1);
    }
}
