use std::path::Path;

use prism_engine::scene::{SceneNode, Target, Uniform};
use prism_engine::shader::{ShaderId, Shaders};

/// Offscreen slot the animated gradient renders into.
const GRADIENT_SLOT: u32 = 1;

/// The demo scene: an animated gradient rendered offscreen, composited under
/// an optional image with a vignette.
pub struct Demo {
    gradient: ShaderId,
    composite: ShaderId,
    overlay: Option<String>,
}

impl Demo {
    pub fn new(shaders: &mut Shaders, overlay: Option<&Path>) -> Self {
        Self {
            gradient: shaders.create("gradient", include_str!("shaders/gradient.wgsl")),
            composite: shaders.create("composite", include_str!("shaders/composite.wgsl")),
            overlay: overlay.map(|p| p.to_string_lossy().into_owned()),
        }
    }

    /// Uris that must load before the first frame is shown.
    pub fn preload(&self) -> Vec<String> {
        self.overlay.iter().cloned().collect()
    }

    pub fn scene(&self, width: f32, height: f32, pixel_ratio: f32, time: f32) -> SceneNode {
        let overlay = match &self.overlay {
            Some(uri) => Uniform::uri(uri.as_str()),
            None => Uniform::Empty,
        };

        let gradient = SceneNode::new(self.gradient, width, height)
            .with_pixel_ratio(pixel_ratio)
            .with_uniform("time", time)
            .with_target(Target::Offscreen(GRADIENT_SLOT));

        SceneNode::new(self.composite, width, height)
            .with_pixel_ratio(pixel_ratio)
            .with_uniform("base", Uniform::Fbo(GRADIENT_SLOT))
            .with_uniform("overlay", overlay)
            .with_uniform("vignette", 0.8f32)
            .with_child(gradient)
    }
}
