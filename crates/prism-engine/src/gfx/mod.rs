//! Graphics context seam.
//!
//! Everything the engine needs from the GPU (programs, textures, framebuffers,
//! the shared geometry, readback) goes through [`GraphicsContext`].
//! `device::WgpuContext` is the wgpu implementation.

mod context;
mod geometry;
mod handle;

#[cfg(test)]
pub(crate) mod recording;

pub use context::{BlendMode, Filter, GraphicsContext, ProgramInfo, RenderTarget};
pub use geometry::{FULL_SURFACE_TRIANGLE, SurfaceVertex};
pub use handle::{Extent, Framebuffer, FramebufferId, ProgramId, TextureId};
