use std::collections::BTreeMap;

use crate::error::{ProgramError, ResourceError};
use crate::scene::UniformValue;
use crate::shader::UniformType;

use super::{Extent, Framebuffer, FramebufferId, ProgramId, TextureId};

/// A compiled program plus the uniforms its source declares.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramInfo {
    pub id: ProgramId,
    pub uniforms: BTreeMap<String, UniformType>,
}

/// Texture sampling filter.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Filter {
    Nearest,
    Linear,
}

/// Blend state used for a node's draw call.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BlendMode {
    /// Straight-over compositing onto the presentation surface.
    Over,
    /// Standard alpha blending into an offscreen target.
    Alpha,
}

/// Where a draw call lands.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum RenderTarget {
    /// The presentation surface.
    Surface,
    /// An offscreen framebuffer.
    Framebuffer(FramebufferId),
}

/// GPU primitives the engine needs from its host.
///
/// The engine never creates or destroys the context itself; it only creates,
/// binds and disposes objects through it. Binding calls are stateful in the
/// GL sense: `draw` uses whatever was bound last.
pub trait GraphicsContext {
    /// Compiles a fragment program and reflects its declared uniforms.
    fn create_program(&mut self, name: &str, fragment_source: &str)
    -> Result<ProgramInfo, ProgramError>;

    fn dispose_program(&mut self, program: ProgramId);

    /// Creates a zero-filled RGBA texture.
    fn create_texture(&mut self, size: Extent, filter: Filter) -> TextureId;

    /// Reallocates a texture to `size`, discarding its contents.
    fn set_texture_shape(&mut self, texture: TextureId, size: Extent);

    /// Uploads tightly packed RGBA8 pixels, reshaping the texture if needed.
    fn upload_texture(&mut self, texture: TextureId, size: Extent, pixels: &[u8]);

    fn dispose_texture(&mut self, texture: TextureId);

    /// Creates a framebuffer with a linearly filtered color attachment.
    fn create_framebuffer(&mut self, size: Extent) -> Framebuffer;

    fn resize_framebuffer(&mut self, framebuffer: FramebufferId, size: Extent);

    fn dispose_framebuffer(&mut self, framebuffer: FramebufferId);

    /// Binds the target of the next draw. The surface is resized to `size`.
    fn bind_target(&mut self, target: RenderTarget, size: Extent, blend: BlendMode);

    fn bind_program(&mut self, program: ProgramId);

    /// Binds the shared full-surface triangle.
    fn bind_geometry(&mut self);

    fn bind_texture(&mut self, unit: u32, texture: TextureId);

    fn set_uniform(&mut self, name: &str, value: &UniformValue);

    fn clear(&mut self, color: [f32; 4]);

    fn draw(&mut self);

    /// Reads back the RGBA8 content of `target` into `out` (replacing its contents).
    fn read_pixels(
        &mut self,
        target: RenderTarget,
        out: &mut Vec<u8>,
    ) -> Result<Extent, ResourceError>;
}
