//! wgpu implementation of the graphics context.
//!
//! This module is responsible for:
//! - acquiring a device (or adopting the host's)
//! - compiling WGSL fragment programs against the shared vertex stage
//! - owning textures, framebuffers and the presentation texture
//! - synchronous pixel readback

mod context;
mod init;
mod program;
mod readback;

pub use context::WgpuContext;
pub use init::{WgpuInit, request_device};
