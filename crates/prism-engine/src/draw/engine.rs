use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cache::ResourceCache;
use crate::capture::CaptureQueue;
use crate::compile::CompiledNode;
use crate::gfx::{BlendMode, GraphicsContext, RenderTarget};
use crate::scene::Target;

use super::{
    ContentSource, DebugContent, DebugFrame, DebugNode, DebugProbe, NodeCapture, PixelPool,
    Profile,
};

/// Counters of one draw pass.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct DrawStats {
    pub nodes: usize,
    pub captures: usize,
    pub disposed: usize,
}

/// Per-pass instrumentation switches.
struct PassMode<'a> {
    debug: bool,
    profile: bool,
    capture: bool,
    content_times: &'a [Duration],
}

struct Rendered {
    debug: Option<DebugNode>,
    inclusive: Duration,
}

/// Executes compiled trees against a graphics context.
#[derive(Debug, Default)]
pub struct DrawEngine {
    pixels: PixelPool,
    capture_buf: Vec<u8>,
}

impl DrawEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Draws one frame.
    ///
    /// Content inputs are uploaded first, then the tree is rendered, then the
    /// probe sink runs, pending captures resolve from the presentation surface
    /// and the cache's deferred disposals are released.
    pub fn draw<G: GraphicsContext + ?Sized>(
        &mut self,
        ctx: &mut G,
        cache: &mut ResourceCache,
        root: &CompiledNode,
        contents: &[Box<dyn ContentSource>],
        mut probe: Option<&mut DebugProbe>,
        captures: &mut CaptureQueue,
    ) -> DrawStats {
        let (profile, capture) = match probe.as_deref_mut() {
            Some(p) => (p.profiles(), p.should_capture(Instant::now())),
            None => (false, false),
        };
        let debug = probe.is_some();

        let mut content_times = Vec::with_capacity(contents.len());
        let mut debug_contents = Vec::new();
        for (index, source) in contents.iter().enumerate().take(cache.content_len()) {
            let start = profile.then(Instant::now);
            let frame = source.frame().filter(|f| {
                let ok = f.pixels.len() == f.size.rgba_len() && f.size.rgba_len() > 0;
                if !ok {
                    log::warn!(
                        "content #{index} supplied {} bytes for {}x{}, skipping upload",
                        f.pixels.len(),
                        f.size.width,
                        f.size.height
                    );
                }
                ok
            });
            cache.sync_content_texture(ctx, index, frame.map(|f| (f.size, f.pixels)));
            let elapsed = start.map(|s| s.elapsed());
            content_times.push(elapsed.unwrap_or_default());
            if debug {
                let capture = frame.filter(|_| capture).map(|f| {
                    let mut pixels = self.pixels.take();
                    pixels.extend_from_slice(f.pixels);
                    NodeCapture {
                        size: f.size,
                        pixels,
                    }
                });
                debug_contents.push(DebugContent {
                    index,
                    label: source.label(),
                    profile: elapsed,
                    capture,
                });
            }
        }

        let mode = PassMode {
            debug,
            profile,
            capture,
            content_times: &content_times,
        };
        let mut stats = DrawStats::default();
        let rendered = self.render(ctx, cache, root, &mode, &mut stats);

        if let (Some(probe), Some(tree)) = (probe, rendered.debug) {
            let mut frame = DebugFrame {
                tree,
                contents: debug_contents,
            };
            probe.emit(&frame);
            let mut buffers = Vec::new();
            frame.tree.take_captures(&mut buffers);
            buffers.extend(
                frame
                    .contents
                    .iter_mut()
                    .filter_map(|c| c.capture.take())
                    .map(|c| c.pixels),
            );
            for buf in buffers {
                self.pixels.give(buf);
            }
        }

        stats.captures = captures.len();
        captures.resolve(ctx, &mut self.capture_buf);
        stats.disposed = cache.drain_disposals(ctx);
        stats
    }

    fn render<G: GraphicsContext + ?Sized>(
        &mut self,
        ctx: &mut G,
        cache: &mut ResourceCache,
        node: &CompiledNode,
        mode: &PassMode<'_>,
        stats: &mut DrawStats,
    ) -> Rendered {
        let mut context_children = Vec::with_capacity(node.context_children.len());
        for child in &node.context_children {
            context_children.push(self.render(ctx, cache, child, mode, stats));
        }
        let mut children = Vec::with_capacity(node.children.len());
        for child in &node.children {
            children.push(self.render(ctx, cache, child, mode, stats));
        }

        let start = mode.profile.then(Instant::now);
        let size = node.size();
        let target = match node.target {
            Target::Surface => {
                ctx.bind_target(RenderTarget::Surface, size, BlendMode::Over);
                RenderTarget::Surface
            }
            Target::Offscreen(slot) => {
                let fb = cache.framebuffer_sized(ctx, slot, size);
                let target = RenderTarget::Framebuffer(fb.id);
                ctx.bind_target(target, size, BlendMode::Alpha);
                target
            }
        };

        ctx.bind_program(node.program.id());
        ctx.bind_geometry();
        for binding in &node.textures {
            ctx.bind_texture(binding.unit, binding.texture);
        }
        for (name, value) in &node.uniforms {
            ctx.set_uniform(name, value);
        }
        ctx.clear([0.0; 4]);
        ctx.draw();
        stats.nodes += 1;

        let exclusive = start.map(|s| s.elapsed()).unwrap_or_default();
        let inclusive = exclusive
            + context_children
                .iter()
                .chain(&children)
                .map(|r| r.inclusive)
                .sum::<Duration>()
            + node
                .content_inputs()
                .filter_map(|i| mode.content_times.get(i).copied())
                .sum::<Duration>();

        if !mode.debug {
            return Rendered {
                debug: None,
                inclusive,
            };
        }

        let capture = if mode.capture {
            let mut buf = self.pixels.take();
            match ctx.read_pixels(target, &mut buf) {
                Ok(size) => Some(NodeCapture { size, pixels: buf }),
                Err(e) => {
                    log::warn!("debug capture of '{}' failed: {e}", node.program.name);
                    self.pixels.give(buf);
                    None
                }
            }
        } else {
            None
        };

        let debug = DebugNode {
            shader: node.program.name.clone(),
            uniform_types: node.program.info.uniforms.clone(),
            source: Arc::clone(&node.source),
            profile: mode.profile.then_some(Profile {
                exclusive,
                inclusive,
            }),
            capture,
            children: children.into_iter().filter_map(|r| r.debug).collect(),
            context_children: context_children
                .into_iter()
                .filter_map(|r| r.debug)
                .collect(),
        };
        Rendered {
            debug: Some(debug),
            inclusive,
        }
    }
}
