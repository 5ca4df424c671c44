use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::CompileError;
use crate::gfx::Extent;
use crate::shader::ShaderId;

use super::Uniform;

/// Where a node renders.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Target {
    /// The presentation surface (`fboId == -1`).
    Surface,
    /// An offscreen slot; its color output is sampled through `Uniform::Fbo`.
    Offscreen(u32),
}

impl Target {
    /// Converts a raw fbo id where `-1` denotes the surface.
    pub fn from_fbo_id(id: i64) -> Result<Self, CompileError> {
        match id {
            -1 => Ok(Target::Surface),
            id => u32::try_from(id)
                .ok()
                .filter(|slot| *slot > 0)
                .map(Target::Offscreen)
                .ok_or(CompileError::InvalidTarget { id }),
        }
    }

    pub fn fbo_id(self) -> i64 {
        match self {
            Target::Surface => -1,
            Target::Offscreen(slot) => i64::from(slot),
        }
    }
}

/// One declarative unit of shader-based rendering.
///
/// Trees are supplied wholesale per frame and never mutated once handed to a
/// surface; children are shared so compiled nodes can point back at them.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    pub shader: ShaderId,
    /// Uniforms in iteration order; texture units follow this order.
    pub uniforms: IndexMap<String, Uniform>,
    /// Rendered into their own targets before this node.
    pub children: Vec<Arc<SceneNode>>,
    /// Rendered first for their outputs only, not composited under this node.
    pub context_children: Vec<Arc<SceneNode>>,
    pub width: f32,
    pub height: f32,
    pub pixel_ratio: f32,
    pub target: Target,
}

impl SceneNode {
    /// Creates a node drawing `shader` onto the surface at pixel ratio 1.
    pub fn new(shader: ShaderId, width: f32, height: f32) -> Self {
        Self {
            shader,
            uniforms: IndexMap::new(),
            children: Vec::new(),
            context_children: Vec::new(),
            width,
            height,
            pixel_ratio: 1.0,
            target: Target::Surface,
        }
    }

    pub fn with_uniform(mut self, name: impl Into<String>, value: impl Into<Uniform>) -> Self {
        self.uniforms.insert(name.into(), value.into());
        self
    }

    pub fn with_child(mut self, child: SceneNode) -> Self {
        self.children.push(Arc::new(child));
        self
    }

    pub fn with_context_child(mut self, child: SceneNode) -> Self {
        self.context_children.push(Arc::new(child));
        self
    }

    pub fn with_pixel_ratio(mut self, pixel_ratio: f32) -> Self {
        self.pixel_ratio = pixel_ratio;
        self
    }

    pub fn with_target(mut self, target: Target) -> Self {
        self.target = target;
        self
    }

    /// Physical size of this node's target.
    #[inline]
    pub fn physical_size(&self) -> Extent {
        Extent::scaled(self.width, self.height, self.pixel_ratio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fbo_id_round_trips_surface_marker() {
        assert_eq!(Target::from_fbo_id(-1), Ok(Target::Surface));
        assert_eq!(Target::from_fbo_id(3), Ok(Target::Offscreen(3)));
        assert_eq!(Target::Offscreen(3).fbo_id(), 3);
        assert_eq!(Target::Surface.fbo_id(), -1);
    }

    #[test]
    fn non_positive_fbo_ids_are_rejected() {
        assert_eq!(
            Target::from_fbo_id(-2),
            Err(CompileError::InvalidTarget { id: -2 })
        );
        assert_eq!(
            Target::from_fbo_id(0),
            Err(CompileError::InvalidTarget { id: 0 })
        );
    }

    #[test]
    fn uniforms_keep_insertion_order() {
        let node = SceneNode::new(ShaderId(0), 10.0, 10.0)
            .with_uniform("zeta", 1.0f32)
            .with_uniform("alpha", 2.0f32);
        let names: Vec<_> = node.uniforms.keys().map(String::as_str).collect();
        assert_eq!(names, ["zeta", "alpha"]);
    }
}
