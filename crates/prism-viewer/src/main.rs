//! Prism viewer.
//!
//! Opens a window and drives one engine surface with a small demo scene.
//! Usage: `prism-viewer [IMAGE]`. Press C to save a capture, Esc to quit.

mod demo;
mod present;
mod runtime;
mod swapchain;
mod viewer;

use std::path::PathBuf;

use anyhow::Result;
use prism_engine::device::WgpuInit;
use prism_engine::logging::{LoggingConfig, init_logging};

use runtime::{Runtime, RuntimeConfig};

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let config = RuntimeConfig {
        image: std::env::args_os().nth(1).map(PathBuf::from),
        ..RuntimeConfig::default()
    };
    if let Some(image) = &config.image {
        log::info!("overlay image: {}", image.display());
    }

    Runtime::run(config, WgpuInit::default())
}
