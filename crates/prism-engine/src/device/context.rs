use std::collections::HashMap;

use anyhow::{Context as _, Result, anyhow};
use wgpu::util::DeviceExt;

use crate::error::{ProgramError, ResourceError};
use crate::gfx::{
    BlendMode, Extent, FULL_SURFACE_TRIANGLE, Filter, Framebuffer, FramebufferId,
    GraphicsContext, ProgramId, ProgramInfo, RenderTarget, TextureId,
};
use crate::scene::UniformValue;
use crate::shader::{BindingKind, Reflection, UniformType, reflect_wgsl};

use super::program::{GpuProgram, pack_uniform};
use super::readback::read_texture;
use super::{WgpuInit, request_device};

struct GpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    size: Extent,
    filter: Filter,
}

/// GL-style binding state consumed by the next draw.
#[derive(Default)]
struct Bindings {
    target: Option<(RenderTarget, BlendMode)>,
    program: Option<ProgramId>,
    geometry: bool,
    units: HashMap<u32, TextureId>,
    /// Texture uniform name to texture unit.
    sampler_units: HashMap<String, u32>,
    values: HashMap<String, UniformValue>,
    clear: Option<wgpu::Color>,
}

/// [`GraphicsContext`] on a wgpu device.
///
/// Owns every object the engine creates plus the presentation texture that
/// root nodes draw into. Hosts present that texture themselves, see
/// [`WgpuContext::presentation_view`].
pub struct WgpuContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
    format: wgpu::TextureFormat,

    vertex_module: wgpu::ShaderModule,
    geometry: wgpu::Buffer,
    nearest: wgpu::Sampler,
    linear: wgpu::Sampler,
    /// Bound in place of missing textures.
    fallback: GpuTexture,

    programs: HashMap<ProgramId, GpuProgram>,
    textures: HashMap<TextureId, GpuTexture>,
    framebuffers: HashMap<FramebufferId, TextureId>,
    presentation: Option<GpuTexture>,

    bindings: Bindings,
    next_id: u64,
}

impl WgpuContext {
    /// Creates a context on a device of its own.
    pub fn new(init: WgpuInit) -> Result<Self> {
        let (device, queue) = pollster::block_on(request_device(&init))?;
        Ok(Self::from_device(device, queue, &init))
    }

    /// Creates a context on a device the host already owns.
    pub fn from_device(device: wgpu::Device, queue: wgpu::Queue, init: &WgpuInit) -> Self {
        let vertex_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("prism fullscreen vertex"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/fullscreen.wgsl").into()),
        });

        let geometry = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("prism full-surface triangle"),
            contents: bytemuck::cast_slice(&FULL_SURFACE_TRIANGLE),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let nearest = create_sampler(&device, Filter::Nearest);
        let linear = create_sampler(&device, Filter::Linear);
        let fallback = allocate(
            &device,
            init.target_format,
            Extent::new(1, 1),
            Filter::Nearest,
        );

        Self {
            device,
            queue,
            format: init.target_format,
            vertex_module,
            geometry,
            nearest,
            linear,
            fallback,
            programs: HashMap::new(),
            textures: HashMap::new(),
            framebuffers: HashMap::new(),
            presentation: None,
            bindings: Bindings::default(),
            next_id: 1,
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    /// View of the texture root nodes draw into, once one was drawn.
    pub fn presentation_view(&self) -> Option<&wgpu::TextureView> {
        self.presentation.as_ref().map(|t| &t.view)
    }

    pub fn presentation_size(&self) -> Option<Extent> {
        self.presentation.as_ref().map(|t| t.size)
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn sampler(&self, filter: Filter) -> &wgpu::Sampler {
        match filter {
            Filter::Nearest => &self.nearest,
            Filter::Linear => &self.linear,
        }
    }

    fn target_texture(&self, target: RenderTarget) -> Option<&GpuTexture> {
        match target {
            RenderTarget::Surface => self.presentation.as_ref(),
            RenderTarget::Framebuffer(fb) => {
                self.framebuffers.get(&fb).and_then(|color| self.textures.get(color))
            }
        }
    }

    fn target_color(&self, target: RenderTarget) -> Option<TextureId> {
        match target {
            RenderTarget::Surface => None,
            RenderTarget::Framebuffer(fb) => self.framebuffers.get(&fb).copied(),
        }
    }

    /// Texture bound to the unit a texture uniform was assigned.
    ///
    /// A texture that is also the current target cannot be sampled; the
    /// fallback is bound instead.
    fn bound_texture(&self, name: &str, target: Option<TextureId>) -> &GpuTexture {
        let id = self
            .bindings
            .sampler_units
            .get(name)
            .and_then(|unit| self.bindings.units.get(unit));
        match id {
            Some(id) if Some(*id) == target => {
                log::warn!("'{name}' samples its own render target; bound an empty texture");
                &self.fallback
            }
            Some(id) => self.textures.get(id).unwrap_or(&self.fallback),
            None => &self.fallback,
        }
    }

    /// Filtering for a `sampler` global: its paired texture's, else the first texture's.
    fn sampler_for(
        &self,
        reflection: &Reflection,
        name: &str,
        target: Option<TextureId>,
    ) -> &wgpu::Sampler {
        let paired = Reflection::sampler_texture(name)
            .filter(|tex| reflection.uniforms.get(*tex) == Some(&UniformType::Sampler2D));
        let texture = paired.or_else(|| {
            reflection
                .bindings
                .iter()
                .find(|b| b.kind == BindingKind::Texture)
                .map(|b| b.name.as_str())
        });
        let filter = texture.map_or(Filter::Linear, |tex| self.bound_texture(tex, target).filter);
        self.sampler(filter)
    }

    fn reshape(&mut self, texture: TextureId, size: Extent) {
        let Some(current) = self.textures.get(&texture) else {
            log::warn!("reshape of unknown {texture:?}");
            return;
        };
        if current.size == size {
            return;
        }
        let filter = current.filter;
        let replacement = allocate(&self.device, self.format, size, filter);
        self.textures.insert(texture, replacement);
    }

    fn encode_draw(&mut self) -> Result<()> {
        let (target, blend) = self.bindings.target.context("no render target bound")?;
        let program_id = self.bindings.program.context("no program bound")?;
        anyhow::ensure!(self.bindings.geometry, "geometry not bound");
        let clear = self.bindings.clear.take();

        self.programs
            .get_mut(&program_id)
            .ok_or_else(|| anyhow!("{program_id:?} is not live"))?
            .prepare_pipeline(&self.device, &self.vertex_module, self.format, blend);

        let program = self
            .programs
            .get(&program_id)
            .ok_or_else(|| anyhow!("{program_id:?} is not live"))?;
        let pipeline = program
            .pipeline(blend)
            .context("pipeline missing after preparation")?;
        let view = &self
            .target_texture(target)
            .with_context(|| format!("{target:?} has no color texture"))?
            .view;
        let target_color = self.target_color(target);

        let buffers: Vec<(u32, wgpu::Buffer)> = program
            .reflection
            .bindings
            .iter()
            .filter_map(|b| {
                let BindingKind::Buffer { size } = b.kind else {
                    return None;
                };
                let contents = match self.bindings.values.get(&b.name) {
                    Some(v) => pack_uniform(v, program.uniform_type(&b.name), size),
                    None => vec![0; size.max(16).next_multiple_of(16) as usize],
                };
                let buffer = self
                    .device
                    .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some(b.name.as_str()),
                        contents: &contents,
                        usage: wgpu::BufferUsages::UNIFORM,
                    });
                Some((b.binding, buffer))
            })
            .collect();

        let entries = program
            .reflection
            .bindings
            .iter()
            .map(|b| -> Result<wgpu::BindGroupEntry<'_>> {
                let resource = match b.kind {
                    BindingKind::Buffer { .. } => buffers
                        .iter()
                        .find(|(binding, _)| *binding == b.binding)
                        .map(|(_, buffer)| buffer.as_entire_binding())
                        .with_context(|| format!("no buffer for '{}'", b.name))?,
                    BindingKind::Texture => wgpu::BindingResource::TextureView(
                        &self.bound_texture(&b.name, target_color).view,
                    ),
                    BindingKind::Sampler => wgpu::BindingResource::Sampler(self.sampler_for(
                        &program.reflection,
                        &b.name,
                        target_color,
                    )),
                };
                Ok(wgpu::BindGroupEntry {
                    binding: b.binding,
                    resource,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("prism node bind group"),
            layout: &program.bind_group_layout,
            entries: &entries,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("prism node encoder"),
            });

        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("prism node pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: clear.map_or(wgpu::LoadOp::Load, wgpu::LoadOp::Clear),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            rpass.set_pipeline(pipeline);
            rpass.set_bind_group(0, &bind_group, &[]);
            rpass.set_vertex_buffer(0, self.geometry.slice(..));
            rpass.draw(0..FULL_SURFACE_TRIANGLE.len() as u32, 0..1);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }
}

impl GraphicsContext for WgpuContext {
    fn create_program(
        &mut self,
        name: &str,
        fragment_source: &str,
    ) -> Result<ProgramInfo, ProgramError> {
        let reflection = reflect_wgsl(fragment_source).map_err(ProgramError::Compile)?;
        if let Some((uniform, _)) = reflection
            .uniforms
            .iter()
            .find(|(_, ty)| **ty == UniformType::SamplerCube)
        {
            return Err(ProgramError::Compile(format!(
                "'{uniform}': cube textures are not supported"
            )));
        }

        let program = GpuProgram::new(&self.device, name, fragment_source, reflection);
        let uniforms = program.reflection.uniforms.clone();
        let id = ProgramId(self.next_id());
        self.programs.insert(id, program);
        Ok(ProgramInfo { id, uniforms })
    }

    fn dispose_program(&mut self, program: ProgramId) {
        if self.programs.remove(&program).is_none() {
            log::warn!("dispose of unknown {program:?}");
        }
        if self.bindings.program == Some(program) {
            self.bindings.program = None;
        }
    }

    fn create_texture(&mut self, size: Extent, filter: Filter) -> TextureId {
        let id = TextureId(self.next_id());
        let texture = allocate(&self.device, self.format, size, filter);
        self.textures.insert(id, texture);
        id
    }

    fn set_texture_shape(&mut self, texture: TextureId, size: Extent) {
        self.reshape(texture, size);
    }

    fn upload_texture(&mut self, texture: TextureId, size: Extent, pixels: &[u8]) {
        if pixels.len() != size.rgba_len() || size.rgba_len() == 0 {
            log::warn!(
                "upload to {texture:?} skipped: {} bytes for {}x{}",
                pixels.len(),
                size.width,
                size.height
            );
            return;
        }
        self.reshape(texture, size);
        let Some(gpu) = self.textures.get(&texture) else {
            return;
        };
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &gpu.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(size.width * 4),
                rows_per_image: Some(size.height),
            },
            extent_3d(size),
        );
    }

    fn dispose_texture(&mut self, texture: TextureId) {
        if self.textures.remove(&texture).is_none() {
            log::warn!("dispose of unknown {texture:?}");
        }
    }

    fn create_framebuffer(&mut self, size: Extent) -> Framebuffer {
        let color = self.create_texture(size, Filter::Linear);
        let id = FramebufferId(self.next_id());
        self.framebuffers.insert(id, color);
        Framebuffer { id, color }
    }

    fn resize_framebuffer(&mut self, framebuffer: FramebufferId, size: Extent) {
        match self.framebuffers.get(&framebuffer).copied() {
            Some(color) => self.reshape(color, size),
            None => log::warn!("resize of unknown {framebuffer:?}"),
        }
    }

    fn dispose_framebuffer(&mut self, framebuffer: FramebufferId) {
        match self.framebuffers.remove(&framebuffer) {
            Some(color) => self.dispose_texture(color),
            None => log::warn!("dispose of unknown {framebuffer:?}"),
        }
    }

    fn bind_target(&mut self, target: RenderTarget, size: Extent, blend: BlendMode) {
        if target == RenderTarget::Surface
            && self.presentation.as_ref().map(|t| t.size) != Some(size)
        {
            log::debug!("presentation texture {}x{}", size.width, size.height);
            self.presentation = Some(allocate(&self.device, self.format, size, Filter::Linear));
        }
        self.bindings.target = Some((target, blend));
    }

    fn bind_program(&mut self, program: ProgramId) {
        let b = &mut self.bindings;
        b.program = Some(program);
        b.units.clear();
        b.sampler_units.clear();
        b.values.clear();
    }

    fn bind_geometry(&mut self) {
        self.bindings.geometry = true;
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureId) {
        self.bindings.units.insert(unit, texture);
    }

    fn set_uniform(&mut self, name: &str, value: &UniformValue) {
        let is_sampler = self
            .bindings
            .program
            .and_then(|p| self.programs.get(&p))
            .and_then(|p| p.uniform_type(name))
            .is_some_and(UniformType::is_sampler);

        match (is_sampler, value) {
            (true, UniformValue::Int(unit)) => {
                let unit = u32::try_from(*unit).unwrap_or_default();
                self.bindings.sampler_units.insert(name.to_string(), unit);
            }
            (true, other) => log::warn!("texture uniform '{name}' given a {}", other.kind()),
            (false, _) => {
                self.bindings.values.insert(name.to_string(), value.clone());
            }
        }
    }

    fn clear(&mut self, color: [f32; 4]) {
        let [r, g, b, a] = color.map(f64::from);
        self.bindings.clear = Some(wgpu::Color { r, g, b, a });
    }

    fn draw(&mut self) {
        if let Err(e) = self.encode_draw() {
            log::warn!("draw skipped: {e:#}");
        }
    }

    fn read_pixels(
        &mut self,
        target: RenderTarget,
        out: &mut Vec<u8>,
    ) -> Result<Extent, ResourceError> {
        let gpu = self
            .target_texture(target)
            .ok_or_else(|| ResourceError::Readback(format!("{target:?} has nothing to read")))?;
        read_texture(&self.device, &self.queue, &gpu.texture, gpu.size, out)?;
        Ok(gpu.size)
    }
}

fn extent_3d(size: Extent) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width: size.width,
        height: size.height,
        depth_or_array_layers: 1,
    }
}

fn allocate(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
    size: Extent,
    filter: Filter,
) -> GpuTexture {
    let size = Extent::new(size.width.max(1), size.height.max(1));
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("prism texture"),
        size: extent_3d(size),
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::COPY_DST
            | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    GpuTexture {
        texture,
        view,
        size,
        filter,
    }
}

fn create_sampler(device: &wgpu::Device, filter: Filter) -> wgpu::Sampler {
    let (mode, mipmap, label) = match filter {
        Filter::Nearest => (
            wgpu::FilterMode::Nearest,
            wgpu::MipmapFilterMode::Nearest,
            "prism nearest sampler",
        ),
        Filter::Linear => (
            wgpu::FilterMode::Linear,
            wgpu::MipmapFilterMode::Linear,
            "prism linear sampler",
        ),
    };
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some(label),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: mode,
        min_filter: mode,
        mipmap_filter: mipmap,
        ..Default::default()
    })
}
