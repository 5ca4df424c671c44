//! Asynchronous image loading.
//!
//! Loads are futures keyed by uri. The surface owns a [`PendingLoads`] set
//! and polls it from the host loop; completions re-enter through the frame
//! scheduler, never mid-draw.

mod fs;
mod pending;

#[cfg(test)]
pub(crate) mod manual;

use futures::future::BoxFuture;

use crate::error::LoadError;
use crate::gfx::Extent;

pub use fs::FsImageLoader;
pub use pending::PendingLoads;

/// Decoded, tightly packed RGBA8 image.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    pub size: Extent,
    pub pixels: Vec<u8>,
}

/// Starts image loads.
///
/// The returned future must not borrow the loader; it may be polled after the
/// loader is gone and is dropped to cancel the load.
pub trait ImageLoader {
    fn load(&self, uri: &str) -> BoxFuture<'static, Result<DecodedImage, LoadError>>;
}
