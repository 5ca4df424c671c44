//! WGSL uniform reflection using naga.
//!
//! Conventions for fragment programs:
//! - entry point `fs_main`, taking `@location(0) uv: vec2<f32>`
//! - every resource lives in `@group(0)`
//! - `var<uniform> name: T` declares a value uniform
//! - `var name: texture_2d<f32>` declares a sampler uniform
//! - `sampler` globals are not uniforms; `name_sampler` pairs with texture `name`

use std::collections::BTreeMap;

use naga::{AddressSpace, ImageDimension, ScalarKind, ShaderStage, TypeInner, VectorSize};

use super::UniformType;

/// Entry point every fragment program must export.
pub const FRAGMENT_ENTRY: &str = "fs_main";

/// Suffix pairing a `sampler` global with a texture global.
pub const SAMPLER_SUFFIX: &str = "_sampler";

/// Resource slot found in a program's bind group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflectedBinding {
    pub binding: u32,
    pub name: String,
    pub kind: BindingKind,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BindingKind {
    /// Uniform buffer holding one value of `size` bytes.
    Buffer { size: u64 },
    Texture,
    Sampler,
}

/// What a fragment program declares.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reflection {
    pub uniforms: BTreeMap<String, UniformType>,
    pub bindings: Vec<ReflectedBinding>,
}

impl Reflection {
    /// Name of the texture a sampler binding belongs to, if it follows the naming convention.
    pub fn sampler_texture(name: &str) -> Option<&str> {
        name.strip_suffix(SAMPLER_SUFFIX).filter(|n| !n.is_empty())
    }
}

/// Parses, validates and reflects a WGSL fragment program.
///
/// Errors are human-readable diagnostics meant for the scene author.
pub fn reflect_wgsl(source: &str) -> Result<Reflection, String> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| e.emit_to_string(source))?;

    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .map_err(|e| e.as_inner().to_string())?;

    let has_entry = module
        .entry_points
        .iter()
        .any(|ep| ep.stage == ShaderStage::Fragment && ep.name == FRAGMENT_ENTRY);
    if !has_entry {
        return Err(format!("missing @fragment entry point '{FRAGMENT_ENTRY}'"));
    }

    let mut reflection = Reflection::default();
    for (_, var) in module.global_variables.iter() {
        if !matches!(var.space, AddressSpace::Uniform | AddressSpace::Handle) {
            continue;
        }
        let name = var
            .name
            .clone()
            .ok_or_else(|| "resource globals must be named".to_string())?;
        let Some(binding) = var.binding.as_ref() else {
            return Err(format!("'{name}' has no @binding"));
        };
        if binding.group != 0 {
            return Err(format!("'{name}' must live in @group(0), found @group({})", binding.group));
        }

        let inner = &module.types[var.ty].inner;
        let kind = match inner {
            TypeInner::Sampler { .. } => BindingKind::Sampler,
            TypeInner::Image { dim, arrayed, .. } => {
                let ty = match (dim, arrayed) {
                    (ImageDimension::D2, false) => UniformType::Sampler2D,
                    (ImageDimension::Cube, false) => UniformType::SamplerCube,
                    _ => return Err(format!("'{name}': only texture_2d and texture_cube are supported")),
                };
                reflection.uniforms.insert(name.clone(), ty);
                BindingKind::Texture
            }
            _ => {
                let ty = value_type(inner)
                    .ok_or_else(|| format!("'{name}': unsupported uniform type"))?;
                reflection.uniforms.insert(name.clone(), ty);
                BindingKind::Buffer {
                    size: u64::from(inner.size(module.to_ctx())),
                }
            }
        };

        reflection.bindings.push(ReflectedBinding {
            binding: binding.binding,
            name,
            kind,
        });
    }

    reflection.bindings.sort_by_key(|b| b.binding);
    Ok(reflection)
}

fn value_type(inner: &TypeInner) -> Option<UniformType> {
    match *inner {
        TypeInner::Scalar(s) => match s.kind {
            ScalarKind::Float => Some(UniformType::Float),
            ScalarKind::Sint => Some(UniformType::Int),
            ScalarKind::Uint => Some(UniformType::UInt),
            ScalarKind::Bool => Some(UniformType::Bool),
            _ => None,
        },
        TypeInner::Vector { size, scalar } => match (scalar.kind, size) {
            (ScalarKind::Float, VectorSize::Bi) => Some(UniformType::Vec2),
            (ScalarKind::Float, VectorSize::Tri) => Some(UniformType::Vec3),
            (ScalarKind::Float, VectorSize::Quad) => Some(UniformType::Vec4),
            (ScalarKind::Sint, VectorSize::Bi) => Some(UniformType::IVec2),
            (ScalarKind::Sint, VectorSize::Tri) => Some(UniformType::IVec3),
            (ScalarKind::Sint, VectorSize::Quad) => Some(UniformType::IVec4),
            _ => None,
        },
        TypeInner::Matrix { columns, rows, .. } if columns == rows => match columns {
            VectorSize::Bi => Some(UniformType::Mat2),
            VectorSize::Tri => Some(UniformType::Mat3),
            VectorSize::Quad => Some(UniformType::Mat4),
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLEND: &str = r#"
@group(0) @binding(0) var<uniform> amount: f32;
@group(0) @binding(1) var<uniform> tint: vec4<f32>;
@group(0) @binding(2) var source: texture_2d<f32>;
@group(0) @binding(3) var source_sampler: sampler;

@fragment
fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    return textureSample(source, source_sampler, uv) * tint * amount;
}
"#;

    #[test]
    fn reflects_values_and_textures() {
        let r = reflect_wgsl(BLEND).unwrap();
        assert_eq!(r.uniforms.get("amount"), Some(&UniformType::Float));
        assert_eq!(r.uniforms.get("tint"), Some(&UniformType::Vec4));
        assert_eq!(r.uniforms.get("source"), Some(&UniformType::Sampler2D));
        assert_eq!(r.uniforms.len(), 3, "samplers are not uniforms");
    }

    #[test]
    fn bindings_are_sorted_and_sized() {
        let r = reflect_wgsl(BLEND).unwrap();
        let kinds: Vec<_> = r.bindings.iter().map(|b| b.kind).collect();
        assert_eq!(
            kinds,
            vec![
                BindingKind::Buffer { size: 4 },
                BindingKind::Buffer { size: 16 },
                BindingKind::Texture,
                BindingKind::Sampler,
            ]
        );
    }

    #[test]
    fn rejects_missing_entry_point() {
        let src = r#"
@fragment
fn main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    return vec4<f32>(uv, 0.0, 1.0);
}
"#;
        let err = reflect_wgsl(src).unwrap_err();
        assert!(err.contains("fs_main"), "{err}");
    }

    #[test]
    fn rejects_other_groups() {
        let src = r#"
@group(1) @binding(0) var<uniform> amount: f32;

@fragment
fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    return vec4<f32>(uv, amount, 1.0);
}
"#;
        let err = reflect_wgsl(src).unwrap_err();
        assert!(err.contains("@group(0)"), "{err}");
    }

    #[test]
    fn reports_parse_errors() {
        assert!(reflect_wgsl("this is not wgsl").is_err());
    }

    #[test]
    fn sampler_pairing_follows_suffix() {
        assert_eq!(Reflection::sampler_texture("source_sampler"), Some("source"));
        assert_eq!(Reflection::sampler_texture("_sampler"), None);
        assert_eq!(Reflection::sampler_texture("linear"), None);
    }
}
