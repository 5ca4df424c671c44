//! Per-surface GPU resource cache.
//!
//! Owns every program, texture and framebuffer a surface uses and decides
//! what is reused, created or released between synchronizations.

mod disposal;
mod resource_cache;

pub use disposal::{Disposal, DisposalQueue};
pub use resource_cache::{ImageResource, ImageState, Program, ResourceCache, SyncPass, SyncReport};
