//! Frame timing.
//!
//! One `FrameClock` per surface; `tick()` once per animation frame callback.

mod frame_clock;

pub use frame_clock::{FrameClock, FrameTime};
