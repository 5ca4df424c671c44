//! Error taxonomy.
//!
//! - [`ConfigurationError`]: invalid caller input, reported synchronously.
//! - [`CompileError`]: an author error in the scene description, caught by the
//!   frame callback so the previous tree stays in effect.
//! - [`ResourceError`]: a readback/encoding failure; rejects one capture only.
//! - [`TeardownError`]: the surface went away while a capture was pending.
//!
//! Anything else is fatal and travels as `anyhow::Error`.

use thiserror::Error;

use crate::shader::ShaderId;

/// Invalid options supplied by the caller.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("capture options must be an object with {{format, type, quality}}, got {0}")]
    NotAnObject(String),

    #[error("capture options contain unrecognized keys: {}", .0.join(", "))]
    UnknownKeys(Vec<String>),

    #[error("capture format must be \"base64\" or \"blob\", got {0}")]
    InvalidFormat(String),

    #[error("capture type must be a non-empty string (e.g. \"png\", \"jpeg\"), got {0}")]
    InvalidType(String),

    #[error("capture quality must be a number between 0 and 1, got {0}")]
    InvalidQuality(String),

    #[error("pixel array of {width}x{height} needs {expected} RGBA bytes, got {actual}")]
    PixelLength {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

/// The scene description cannot be bound to GPU resources.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("shader {0} does not exist")]
    UnknownShader(ShaderId),

    #[error("shader '{shader}' failed to compile: {message}")]
    ShaderCompile { shader: String, message: String },

    #[error("shader '{shader}': uniform '{uniform}' is not defined/used")]
    UndeclaredUniform { shader: String, uniform: String },

    #[error("shader '{shader}': all declared uniforms must be provided, missing: '{}'", .missing.join("', '"))]
    MissingUniforms { shader: String, missing: Vec<String> },

    #[error("shader '{shader}': invalid uniform '{uniform}' value of kind '{kind}'")]
    InvalidUniformValue {
        shader: String,
        uniform: String,
        kind: &'static str,
    },

    #[error("shader '{shader}': uniform '{uniform}' samples content #{index}, which is not provided")]
    MissingContent {
        shader: String,
        uniform: String,
        index: usize,
    },

    #[error("offscreen target #{slot} is used by more than one node")]
    DuplicateTarget { slot: u32 },

    #[error("fbo id must be a positive integer or -1 for the surface, got {id}")]
    InvalidTarget { id: i64 },
}

/// A GPU-side operation on an existing resource failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceError {
    #[error("pixel readback failed: {0}")]
    Readback(String),

    #[error("failed to encode capture as '{mime}': {message}")]
    Encode { mime: String, message: String },
}

/// The owning surface was torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("surface was torn down before the capture completed")]
pub struct TeardownError;

/// Reason a capture future rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error(transparent)]
    Teardown(#[from] TeardownError),
}

/// Failure reported by a graphics context while creating a program.
#[derive(Debug, Error)]
pub enum ProgramError {
    /// The fragment source was rejected; recoverable at the scene level.
    #[error("{0}")]
    Compile(String),

    /// The context itself failed.
    #[error(transparent)]
    Device(#[from] anyhow::Error),
}

/// Failure of one image load.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to load image '{uri}': {message}")]
pub struct LoadError {
    pub uri: String,
    pub message: String,
}

/// Result of a synchronization pass.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Fatal(#[from] anyhow::Error),
}
