use std::collections::HashSet;
use std::sync::Arc;

use crate::cache::{ResourceCache, SyncPass, SyncReport};
use crate::error::{CompileError, SyncError};
use crate::gfx::{Extent, Filter, GraphicsContext};
use crate::scene::{SceneNode, Target, Uniform, UniformValue};
use crate::shader::ShaderRegistry;

use super::{CompiledNode, TextureBinding, TextureSource};

/// Result of a successful compile.
#[derive(Debug)]
pub struct Compiled {
    pub root: CompiledNode,
    pub report: SyncReport,
}

/// Compiles `root` against `cache`.
///
/// On success the cache's live sets are replaced and stale entries queued for
/// disposal. On failure everything created along the way is released and the
/// cache is left as the last successful compile left it.
pub fn compile<G: GraphicsContext + ?Sized>(
    ctx: &mut G,
    cache: &mut ResourceCache,
    registry: &dyn ShaderRegistry,
    root: &Arc<SceneNode>,
) -> Result<Compiled, SyncError> {
    let mut compiler = TreeCompiler {
        ctx: &mut *ctx,
        registry,
        pass: cache.begin_sync(),
        targets: HashSet::new(),
    };
    match compiler.node(root) {
        Ok(root) => {
            let report = compiler.pass.commit();
            Ok(Compiled { root, report })
        }
        Err(e) => {
            let TreeCompiler { ctx, pass, .. } = compiler;
            pass.rollback(ctx);
            Err(e)
        }
    }
}

struct TreeCompiler<'a, 'c, G: ?Sized> {
    ctx: &'a mut G,
    registry: &'a dyn ShaderRegistry,
    pass: SyncPass<'c>,
    targets: HashSet<u32>,
}

impl<G: GraphicsContext + ?Sized> TreeCompiler<'_, '_, G> {
    fn node(&mut self, node: &Arc<SceneNode>) -> Result<CompiledNode, SyncError> {
        let context_children = node
            .context_children
            .iter()
            .map(|child| self.node(child))
            .collect::<Result<Vec<_>, _>>()?;
        let children = node
            .children
            .iter()
            .map(|child| self.node(child))
            .collect::<Result<Vec<_>, _>>()?;

        if let Target::Offscreen(slot) = node.target {
            if !self.targets.insert(slot) {
                return Err(CompileError::DuplicateTarget { slot }.into());
            }
        }

        let program = self
            .pass
            .get_or_create_shader(self.ctx, self.registry, node.shader)?;

        let mut uniforms = Vec::with_capacity(node.uniforms.len());
        let mut textures = Vec::new();

        for (name, value) in &node.uniforms {
            let Some(ty) = program.uniform_type(name) else {
                return Err(CompileError::UndeclaredUniform {
                    shader: program.name.clone(),
                    uniform: name.clone(),
                }
                .into());
            };

            if !ty.is_sampler() {
                let Uniform::Value(v) = value else {
                    return Err(invalid_value(&program.name, name, value));
                };
                uniforms.push((name.clone(), v.clone()));
                continue;
            }

            let unit = textures.len() as u32;
            let (texture, source) = match value {
                Uniform::Empty => {
                    let tex = self.pass.create_standalone_texture(
                        self.ctx,
                        Extent::PLACEHOLDER,
                        Filter::Linear,
                        None,
                    );
                    (tex, TextureSource::Placeholder)
                }
                Uniform::Content(index) => {
                    let tex = self.pass.content_texture(*index).ok_or_else(|| {
                        CompileError::MissingContent {
                            shader: program.name.clone(),
                            uniform: name.clone(),
                            index: *index,
                        }
                    })?;
                    (tex, TextureSource::Content(*index))
                }
                Uniform::Fbo(slot) => {
                    let fb = self.pass.get_or_create_framebuffer(self.ctx, *slot);
                    (fb.color, TextureSource::Fbo(*slot))
                }
                Uniform::Uri(uri) => {
                    let image = self.pass.get_or_create_image(self.ctx, uri);
                    (image.texture, TextureSource::Image)
                }
                Uniform::NdArray(array) => {
                    let filter = if array.disable_linear_interpolation {
                        Filter::Nearest
                    } else {
                        Filter::Linear
                    };
                    let tex = self.pass.create_standalone_texture(
                        self.ctx,
                        array.size(),
                        filter,
                        Some(array.pixels()),
                    );
                    (tex, TextureSource::Pixels)
                }
                Uniform::Value(_) => return Err(invalid_value(&program.name, name, value)),
            };

            textures.push(TextureBinding {
                unit,
                texture,
                source,
            });
            uniforms.push((name.clone(), UniformValue::Int(unit as i32)));
        }

        let missing: Vec<String> = program
            .info
            .uniforms
            .keys()
            .filter(|declared| !node.uniforms.contains_key(declared.as_str()))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(CompileError::MissingUniforms {
                shader: program.name.clone(),
                missing,
            }
            .into());
        }

        Ok(CompiledNode {
            program,
            uniforms,
            textures,
            children,
            context_children,
            width: node.width,
            height: node.height,
            pixel_ratio: node.pixel_ratio,
            target: node.target,
            source: Arc::clone(node),
        })
    }
}

fn invalid_value(shader: &str, uniform: &str, value: &Uniform) -> SyncError {
    CompileError::InvalidUniformValue {
        shader: shader.to_string(),
        uniform: uniform.to_string(),
        kind: value.kind(),
    }
    .into()
}
