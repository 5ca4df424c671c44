//! Surface coordinator and pool.

mod pool;
mod surface;

pub use pool::{DEFAULT_POOL_CAPACITY, SurfacePool, SurfaceResources};
pub use surface::{FrameReport, Surface, SurfaceConfig};
