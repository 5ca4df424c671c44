//! Shader registry and program reflection.

mod reflect;
mod registry;
mod uniform_type;

pub use reflect::{
    BindingKind, FRAGMENT_ENTRY, ReflectedBinding, Reflection, SAMPLER_SUFFIX, reflect_wgsl,
};
pub use registry::{ShaderId, ShaderRegistry, ShaderSource, Shaders};
pub use uniform_type::UniformType;
