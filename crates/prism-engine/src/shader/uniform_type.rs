use std::fmt;

/// Declared type of a program uniform, as reported by reflection.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum UniformType {
    Bool,
    Int,
    UInt,
    Float,
    Vec2,
    Vec3,
    Vec4,
    IVec2,
    IVec3,
    IVec4,
    Mat2,
    Mat3,
    Mat4,
    Sampler2D,
    SamplerCube,
}

impl UniformType {
    /// Sampler kinds take a texture unit instead of a value.
    #[inline]
    pub fn is_sampler(self) -> bool {
        matches!(self, UniformType::Sampler2D | UniformType::SamplerCube)
    }
}

impl fmt::Display for UniformType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UniformType::Bool => "bool",
            UniformType::Int => "int",
            UniformType::UInt => "uint",
            UniformType::Float => "float",
            UniformType::Vec2 => "vec2",
            UniformType::Vec3 => "vec3",
            UniformType::Vec4 => "vec4",
            UniformType::IVec2 => "ivec2",
            UniformType::IVec3 => "ivec3",
            UniformType::IVec4 => "ivec4",
            UniformType::Mat2 => "mat2",
            UniformType::Mat3 => "mat3",
            UniformType::Mat4 => "mat4",
            UniformType::Sampler2D => "sampler2D",
            UniformType::SamplerCube => "samplerCube",
        };
        f.write_str(name)
    }
}
