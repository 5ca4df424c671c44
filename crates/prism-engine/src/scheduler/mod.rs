//! Frame scheduling state machine.

mod frame;

pub use frame::{FramePlan, FrameScheduler, FrameState};
