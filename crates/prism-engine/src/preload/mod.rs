//! Preload gating.
//!
//! Drawing is withheld until every uri of the preload manifest has settled.

mod tracker;

pub use tracker::{PreloadProgress, PreloadTracker};
