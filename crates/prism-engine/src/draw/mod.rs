//! Draw pass.
//!
//! Renders a compiled tree dependencies-first, with optional profiling and
//! per-node readback for an attached [`DebugProbe`].

mod content;
mod engine;
mod pool;
mod probe;

pub use content::{ContentFrame, ContentSource, PixelContent};
pub use engine::{DrawEngine, DrawStats};
pub use pool::PixelPool;
pub use probe::{
    DebugContent, DebugFrame, DebugNode, DebugProbe, DebugProbeConfig, NodeCapture, Profile,
};
