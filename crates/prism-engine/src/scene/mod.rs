//! Scene description types.
//!
//! A scene is a tree of [`SceneNode`]s supplied wholesale by the caller each
//! time its logical content changes. It is fully resolved: every shader id and
//! uniform value is final.

mod node;
mod uniform;

pub use node::{SceneNode, Target};
pub use uniform::{PixelArray, Uniform, UniformValue};
