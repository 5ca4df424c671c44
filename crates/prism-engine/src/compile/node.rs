use std::rc::Rc;
use std::sync::Arc;

use crate::cache::Program;
use crate::gfx::{Extent, TextureId};
use crate::scene::{SceneNode, Target, UniformValue};

/// What a bound texture unit samples.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TextureSource {
    /// Transparent 2x2 texture standing in for an empty uniform.
    Placeholder,
    /// Pooled content texture at this index.
    Content(usize),
    /// Color output of an offscreen slot.
    Fbo(u32),
    Image,
    Pixels,
}

/// A texture bound to a unit for one draw call.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TextureBinding {
    pub unit: u32,
    pub texture: TextureId,
    pub source: TextureSource,
}

/// A scene node bound to GPU resources, ready to draw.
#[derive(Debug)]
pub struct CompiledNode {
    pub program: Rc<Program>,
    /// Resolved uniforms in scene order; samplers carry their texture unit.
    pub uniforms: Vec<(String, UniformValue)>,
    pub textures: Vec<TextureBinding>,
    pub children: Vec<CompiledNode>,
    pub context_children: Vec<CompiledNode>,
    pub width: f32,
    pub height: f32,
    pub pixel_ratio: f32,
    pub target: Target,
    pub source: Arc<SceneNode>,
}

impl CompiledNode {
    /// Physical size of the node's target.
    #[inline]
    pub fn size(&self) -> Extent {
        Extent::scaled(self.width, self.height, self.pixel_ratio)
    }

    /// Content indices this node samples directly.
    pub fn content_inputs(&self) -> impl Iterator<Item = usize> + '_ {
        self.textures.iter().filter_map(|b| match b.source {
            TextureSource::Content(i) => Some(i),
            _ => None,
        })
    }

    /// Number of nodes in this subtree.
    pub fn node_count(&self) -> usize {
        1 + self
            .context_children
            .iter()
            .chain(&self.children)
            .map(CompiledNode::node_count)
            .sum::<usize>()
    }
}
