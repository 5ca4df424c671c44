use std::sync::Arc;

use crate::error::ConfigurationError;
use crate::gfx::Extent;

/// A plain scalar or vector uniform value.
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    Bool(bool),
    Floats(Vec<f32>),
    Ints(Vec<i32>),
}

impl UniformValue {
    /// Short kind name used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            UniformValue::Float(_) | UniformValue::Int(_) | UniformValue::Bool(_) => "scalar",
            UniformValue::Floats(_) | UniformValue::Ints(_) => "vector",
        }
    }

    /// Little-endian bytes as laid out in a uniform buffer (bools are 32-bit).
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            UniformValue::Float(v) => v.to_le_bytes().to_vec(),
            UniformValue::Int(v) => v.to_le_bytes().to_vec(),
            UniformValue::Bool(v) => u32::from(*v).to_le_bytes().to_vec(),
            UniformValue::Floats(v) => bytemuck::cast_slice(v).to_vec(),
            UniformValue::Ints(v) => bytemuck::cast_slice(v).to_vec(),
        }
    }
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        UniformValue::Float(v)
    }
}

impl From<i32> for UniformValue {
    fn from(v: i32) -> Self {
        UniformValue::Int(v)
    }
}

impl From<bool> for UniformValue {
    fn from(v: bool) -> Self {
        UniformValue::Bool(v)
    }
}

impl<const N: usize> From<[f32; N]> for UniformValue {
    fn from(v: [f32; N]) -> Self {
        UniformValue::Floats(v.to_vec())
    }
}

impl From<Vec<f32>> for UniformValue {
    fn from(v: Vec<f32>) -> Self {
        UniformValue::Floats(v)
    }
}

/// Raw RGBA8 pixels sampled by a uniform.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelArray {
    size: Extent,
    pixels: Arc<[u8]>,
    /// Keep nearest-neighbour sampling instead of linear filtering.
    pub disable_linear_interpolation: bool,
}

impl PixelArray {
    /// Wraps tightly packed RGBA8 pixels; the length must match the size.
    pub fn rgba(
        width: u32,
        height: u32,
        pixels: impl Into<Arc<[u8]>>,
    ) -> Result<Self, ConfigurationError> {
        let size = Extent::new(width, height);
        let pixels = pixels.into();
        if pixels.len() != size.rgba_len() || size.rgba_len() == 0 {
            return Err(ConfigurationError::PixelLength {
                width,
                height,
                expected: size.rgba_len(),
                actual: pixels.len(),
            });
        }
        Ok(Self {
            size,
            pixels,
            disable_linear_interpolation: false,
        })
    }

    pub fn without_interpolation(mut self) -> Self {
        self.disable_linear_interpolation = true;
        self
    }

    #[inline]
    pub fn size(&self) -> Extent {
        self.size
    }

    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

/// A uniform as supplied by the scene description.
///
/// Sampler uniforms take one of the resource variants (or `Empty`); every
/// other uniform takes `Value`.
#[derive(Debug, Clone, PartialEq)]
pub enum Uniform {
    /// No texture: sampled as a transparent 2x2 placeholder.
    Empty,
    Value(UniformValue),
    /// Externally rendered content, by index in the surface's content list.
    Content(usize),
    /// Color output of the node targeting this offscreen slot.
    Fbo(u32),
    /// Lazily loaded image; the uri is its identity.
    Uri(String),
    NdArray(PixelArray),
}

impl Uniform {
    pub fn uri(uri: impl Into<String>) -> Self {
        Uniform::Uri(uri.into())
    }

    /// Short kind name used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Uniform::Empty => "empty",
            Uniform::Value(v) => v.kind(),
            Uniform::Content(_) => "content",
            Uniform::Fbo(_) => "fbo",
            Uniform::Uri(_) => "uri",
            Uniform::NdArray(_) => "ndarray",
        }
    }
}

impl From<UniformValue> for Uniform {
    fn from(v: UniformValue) -> Self {
        Uniform::Value(v)
    }
}

impl From<f32> for Uniform {
    fn from(v: f32) -> Self {
        Uniform::Value(v.into())
    }
}

impl From<i32> for Uniform {
    fn from(v: i32) -> Self {
        Uniform::Value(v.into())
    }
}

impl From<bool> for Uniform {
    fn from(v: bool) -> Self {
        Uniform::Value(v.into())
    }
}

impl<const N: usize> From<[f32; N]> for Uniform {
    fn from(v: [f32; N]) -> Self {
        Uniform::Value(v.into())
    }
}

impl From<PixelArray> for Uniform {
    fn from(v: PixelArray) -> Self {
        Uniform::NdArray(v)
    }
}
