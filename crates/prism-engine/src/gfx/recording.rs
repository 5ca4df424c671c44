//! Graphics context that records every call, for tests.
//!
//! Program sources use a tiny declaration syntax instead of a shading
//! language: `"time:float; source:sampler2D"`. A source starting with `!`
//! fails to compile with the rest of the string as message.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::{ProgramError, ResourceError};
use crate::scene::UniformValue;
use crate::shader::UniformType;

use super::{
    BlendMode, Extent, Filter, Framebuffer, FramebufferId, GraphicsContext, ProgramId,
    ProgramInfo, RenderTarget, TextureId,
};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Event {
    CreateProgram(ProgramId, String),
    DisposeProgram(ProgramId),
    CreateTexture(TextureId, Extent, Filter),
    ShapeTexture(TextureId, Extent),
    UploadTexture(TextureId, Extent),
    DisposeTexture(TextureId),
    CreateFramebuffer(FramebufferId, TextureId),
    ResizeFramebuffer(FramebufferId, Extent),
    DisposeFramebuffer(FramebufferId),
    BindTarget(RenderTarget, Extent, BlendMode),
    BindProgram(ProgramId),
    BindGeometry,
    BindTexture(u32, TextureId),
    SetUniform(String, UniformValue),
    Clear([f32; 4]),
    Draw,
    ReadPixels(RenderTarget),
}

#[derive(Debug, Default)]
pub(crate) struct RecordingContext {
    next_id: u64,
    pub(crate) events: Vec<Event>,
    pub(crate) live_programs: HashSet<ProgramId>,
    pub(crate) live_textures: HashSet<TextureId>,
    pub(crate) live_framebuffers: HashSet<FramebufferId>,
    framebuffer_colors: HashMap<FramebufferId, TextureId>,
    target_sizes: HashMap<RenderTarget, Extent>,
    /// Makes every readback fail.
    pub(crate) fail_readback: bool,
}

impl RecordingContext {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn next(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub(crate) fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }

    pub(crate) fn position(&self, pred: impl Fn(&Event) -> bool) -> Option<usize> {
        self.events.iter().position(pred)
    }

    pub(crate) fn clear_events(&mut self) {
        self.events.clear();
    }
}

fn parse_declarations(source: &str) -> Result<BTreeMap<String, UniformType>, String> {
    if let Some(message) = source.strip_prefix('!') {
        return Err(message.to_string());
    }
    let mut uniforms = BTreeMap::new();
    for decl in source.split(';').map(str::trim).filter(|d| !d.is_empty()) {
        let (name, ty) = decl
            .split_once(':')
            .ok_or_else(|| format!("bad declaration '{decl}'"))?;
        let ty = match ty.trim() {
            "float" => UniformType::Float,
            "int" => UniformType::Int,
            "bool" => UniformType::Bool,
            "vec2" => UniformType::Vec2,
            "vec3" => UniformType::Vec3,
            "vec4" => UniformType::Vec4,
            "sampler2D" => UniformType::Sampler2D,
            "samplerCube" => UniformType::SamplerCube,
            other => return Err(format!("unknown type '{other}'")),
        };
        uniforms.insert(name.trim().to_string(), ty);
    }
    Ok(uniforms)
}

impl GraphicsContext for RecordingContext {
    fn create_program(
        &mut self,
        name: &str,
        fragment_source: &str,
    ) -> Result<ProgramInfo, ProgramError> {
        let uniforms = parse_declarations(fragment_source).map_err(ProgramError::Compile)?;
        let id = ProgramId(self.next());
        self.live_programs.insert(id);
        self.events.push(Event::CreateProgram(id, name.to_string()));
        Ok(ProgramInfo { id, uniforms })
    }

    fn dispose_program(&mut self, program: ProgramId) {
        assert!(self.live_programs.remove(&program), "{program:?} disposed twice");
        self.events.push(Event::DisposeProgram(program));
    }

    fn create_texture(&mut self, size: Extent, filter: Filter) -> TextureId {
        let id = TextureId(self.next());
        self.live_textures.insert(id);
        self.events.push(Event::CreateTexture(id, size, filter));
        id
    }

    fn set_texture_shape(&mut self, texture: TextureId, size: Extent) {
        assert!(self.live_textures.contains(&texture), "{texture:?} is not live");
        self.events.push(Event::ShapeTexture(texture, size));
    }

    fn upload_texture(&mut self, texture: TextureId, size: Extent, pixels: &[u8]) {
        assert!(self.live_textures.contains(&texture), "{texture:?} is not live");
        assert_eq!(pixels.len(), size.rgba_len());
        self.events.push(Event::UploadTexture(texture, size));
    }

    fn dispose_texture(&mut self, texture: TextureId) {
        assert!(self.live_textures.remove(&texture), "{texture:?} disposed twice");
        self.events.push(Event::DisposeTexture(texture));
    }

    fn create_framebuffer(&mut self, _size: Extent) -> Framebuffer {
        let id = FramebufferId(self.next());
        let color = TextureId(self.next());
        self.live_framebuffers.insert(id);
        self.framebuffer_colors.insert(id, color);
        self.events.push(Event::CreateFramebuffer(id, color));
        Framebuffer { id, color }
    }

    fn resize_framebuffer(&mut self, framebuffer: FramebufferId, size: Extent) {
        assert!(self.live_framebuffers.contains(&framebuffer));
        self.events.push(Event::ResizeFramebuffer(framebuffer, size));
    }

    fn dispose_framebuffer(&mut self, framebuffer: FramebufferId) {
        assert!(
            self.live_framebuffers.remove(&framebuffer),
            "{framebuffer:?} disposed twice"
        );
        self.framebuffer_colors.remove(&framebuffer);
        self.events.push(Event::DisposeFramebuffer(framebuffer));
    }

    fn bind_target(&mut self, target: RenderTarget, size: Extent, blend: BlendMode) {
        self.target_sizes.insert(target, size);
        self.events.push(Event::BindTarget(target, size, blend));
    }

    fn bind_program(&mut self, program: ProgramId) {
        assert!(self.live_programs.contains(&program), "{program:?} bound after disposal");
        self.events.push(Event::BindProgram(program));
    }

    fn bind_geometry(&mut self) {
        self.events.push(Event::BindGeometry);
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureId) {
        let framebuffer_color = self.framebuffer_colors.values().any(|c| *c == texture);
        assert!(
            framebuffer_color || self.live_textures.contains(&texture),
            "{texture:?} bound after disposal"
        );
        self.events.push(Event::BindTexture(unit, texture));
    }

    fn set_uniform(&mut self, name: &str, value: &UniformValue) {
        self.events
            .push(Event::SetUniform(name.to_string(), value.clone()));
    }

    fn clear(&mut self, color: [f32; 4]) {
        self.events.push(Event::Clear(color));
    }

    fn draw(&mut self) {
        self.events.push(Event::Draw);
    }

    fn read_pixels(
        &mut self,
        target: RenderTarget,
        out: &mut Vec<u8>,
    ) -> Result<Extent, ResourceError> {
        self.events.push(Event::ReadPixels(target));
        if self.fail_readback {
            return Err(ResourceError::Readback("context lost".into()));
        }
        let size = self
            .target_sizes
            .get(&target)
            .copied()
            .ok_or_else(|| ResourceError::Readback(format!("{target:?} was never bound")))?;
        out.clear();
        out.resize(size.rgba_len(), 0);
        Ok(size)
    }
}
