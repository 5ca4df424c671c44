//! Prism engine crate.
//!
//! Keeps a per-frame tree of shader nodes in sync with GPU resources and
//! draws it: compile the scene against a resource cache, render children into
//! offscreen targets before their parents, resolve captures, then release
//! what the new tree no longer uses.

pub mod cache;
pub mod capture;
pub mod compile;
pub mod device;
pub mod draw;
pub mod error;
pub mod gfx;
pub mod loader;
pub mod preload;
pub mod scene;
pub mod scheduler;
pub mod shader;
pub mod surface;
pub mod time;

pub mod logging;
