use std::collections::HashMap;

use crate::gfx::{BlendMode, SurfaceVertex};
use crate::scene::UniformValue;
use crate::shader::{BindingKind, FRAGMENT_ENTRY, Reflection, UniformType};

/// A fragment module with its reflected bind group and lazily built pipelines.
pub(crate) struct GpuProgram {
    pub name: String,
    pub module: wgpu::ShaderModule,
    pub reflection: Reflection,
    pub bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    pipelines: HashMap<BlendMode, wgpu::RenderPipeline>,
}

impl GpuProgram {
    pub fn new(
        device: &wgpu::Device,
        name: &str,
        source: &str,
        reflection: Reflection,
    ) -> Self {
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(name),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let entries: Vec<wgpu::BindGroupLayoutEntry> = reflection
            .bindings
            .iter()
            .map(|b| wgpu::BindGroupLayoutEntry {
                binding: b.binding,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: match b.kind {
                    BindingKind::Buffer { .. } => wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    BindingKind::Texture => wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    BindingKind::Sampler => {
                        wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering)
                    }
                },
                count: None,
            })
            .collect();

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("prism program bgl"),
            entries: &entries,
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("prism program pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        Self {
            name: name.to_string(),
            module,
            reflection,
            bind_group_layout,
            pipeline_layout,
            pipelines: HashMap::new(),
        }
    }

    pub fn uniform_type(&self, name: &str) -> Option<UniformType> {
        self.reflection.uniforms.get(name).copied()
    }

    /// Builds the pipeline for `blend` unless it exists.
    pub fn prepare_pipeline(
        &mut self,
        device: &wgpu::Device,
        vertex: &wgpu::ShaderModule,
        format: wgpu::TextureFormat,
        blend: BlendMode,
    ) {
        if self.pipelines.contains_key(&blend) {
            return;
        }
        log::debug!("building pipeline for '{}' ({blend:?})", self.name);

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(self.name.as_str()),
            layout: Some(&self.pipeline_layout),

            vertex: wgpu::VertexState {
                module: vertex,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[SurfaceVertex::layout()],
            },

            fragment: Some(wgpu::FragmentState {
                module: &self.module,
                entry_point: Some(FRAGMENT_ENTRY),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(blend_state(blend)),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),

            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },

            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });
        self.pipelines.insert(blend, pipeline);
    }

    pub fn pipeline(&self, blend: BlendMode) -> Option<&wgpu::RenderPipeline> {
        self.pipelines.get(&blend)
    }
}

pub(crate) fn blend_state(blend: BlendMode) -> wgpu::BlendState {
    let src_alpha = wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::SrcAlpha,
        dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
        operation: wgpu::BlendOperation::Add,
    };
    match blend {
        // Destination alpha accumulates so the surface composites correctly on the host.
        BlendMode::Over => wgpu::BlendState {
            color: src_alpha,
            alpha: wgpu::BlendComponent::OVER,
        },
        BlendMode::Alpha => wgpu::BlendState {
            color: src_alpha,
            alpha: src_alpha,
        },
    }
}

/// Lays out `value` for a uniform buffer binding of `size` bytes.
///
/// `mat3` columns are padded to 16 bytes; the result is zero-filled to a
/// multiple of 16 and never shorter than the binding.
pub(crate) fn pack_uniform(value: &UniformValue, ty: Option<UniformType>, size: u64) -> Vec<u8> {
    let raw = value.to_bytes();
    let mut bytes = if ty == Some(UniformType::Mat3) {
        let mut padded = Vec::with_capacity(48);
        for column in raw.chunks(12) {
            padded.extend_from_slice(column);
            padded.resize(padded.len() + 16 - column.len(), 0);
        }
        padded
    } else {
        raw
    };
    let len = (size.max(bytes.len() as u64).max(16)).next_multiple_of(16) as usize;
    bytes.resize(len, 0);
    bytes
}
