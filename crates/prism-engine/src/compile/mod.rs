//! Scene tree compilation.
//!
//! Turns a [`SceneNode`](crate::scene::SceneNode) tree into a tree of
//! [`CompiledNode`]s bound to cached GPU resources.

mod compiler;
mod node;

pub use compiler::{Compiled, compile};
pub use node::{CompiledNode, TextureBinding, TextureSource};
