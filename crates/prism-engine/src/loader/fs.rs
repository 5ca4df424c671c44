use std::path::PathBuf;
use std::thread;

use futures::channel::oneshot;
use futures::future::BoxFuture;
use futures::FutureExt;

use crate::error::LoadError;
use crate::gfx::Extent;

use super::{DecodedImage, ImageLoader};

/// Decodes images from the local filesystem on short-lived worker threads.
///
/// Uris are paths, optionally prefixed with `file://`.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsImageLoader;

impl FsImageLoader {
    pub fn new() -> Self {
        Self
    }
}

fn decode(path: PathBuf) -> Result<DecodedImage, String> {
    let img = image::open(&path).map_err(|e| e.to_string())?;
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    if width == 0 || height == 0 {
        return Err("image has no pixels".into());
    }
    Ok(DecodedImage {
        size: Extent::new(width, height),
        pixels: rgba.into_raw(),
    })
}

impl ImageLoader for FsImageLoader {
    fn load(&self, uri: &str) -> BoxFuture<'static, Result<DecodedImage, LoadError>> {
        let uri = uri.to_string();
        let path = PathBuf::from(uri.strip_prefix("file://").unwrap_or(&uri));
        let (tx, rx) = oneshot::channel();

        let spawned = thread::Builder::new()
            .name("prism-image-decode".into())
            .spawn(move || {
                // The receiver is gone when the load was cancelled.
                let _ = tx.send(decode(path));
            });

        if let Err(e) = spawned {
            let err = LoadError {
                uri,
                message: format!("failed to spawn decoder thread: {e}"),
            };
            return futures::future::ready(Err(err)).boxed();
        }

        rx.map(move |res| match res {
            Ok(Ok(image)) => Ok(image),
            Ok(Err(message)) => Err(LoadError { uri, message }),
            Err(oneshot::Canceled) => Err(LoadError {
                uri,
                message: "decoder thread exited".into(),
            }),
        })
        .boxed()
    }
}
