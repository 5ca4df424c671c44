//! Frame captures.
//!
//! Requests are validated up front, merged by their exact options and
//! resolved from the presentation surface after the next draw.

mod encode;
mod options;
mod queue;

pub use encode::{CaptureData, encode};
pub use options::{CaptureFormat, CaptureKey, CaptureOptions};
pub use queue::{CaptureFuture, CaptureQueue, CaptureResult};
