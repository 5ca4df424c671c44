use futures::channel::oneshot;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use indexmap::IndexMap;

use crate::error::{CaptureError, ConfigurationError, TeardownError};
use crate::gfx::{GraphicsContext, RenderTarget};

use super::{CaptureData, CaptureKey, CaptureOptions, encode};

pub type CaptureResult = Result<CaptureData, CaptureError>;

/// Future of one capture, shared by every identical request.
pub type CaptureFuture = Shared<BoxFuture<'static, CaptureResult>>;

struct PendingCapture {
    options: CaptureOptions,
    tx: oneshot::Sender<CaptureResult>,
    future: CaptureFuture,
}

/// Capture requests waiting for the next completed draw.
///
/// Dropping the queue rejects everything still pending with
/// [`TeardownError`].
#[derive(Default)]
pub struct CaptureQueue {
    pending: IndexMap<CaptureKey, PendingCapture>,
}

impl CaptureQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a capture of the next draw.
    ///
    /// Identical options share one future until it resolves.
    pub fn request(&mut self, options: CaptureOptions) -> Result<CaptureFuture, ConfigurationError> {
        options.validate()?;
        let key = options.key();
        if let Some(pending) = self.pending.get(&key) {
            return Ok(pending.future.clone());
        }

        let (tx, rx) = oneshot::channel();
        let future = rx
            .map(|res| res.unwrap_or(Err(CaptureError::Teardown(TeardownError))))
            .boxed()
            .shared();
        self.pending.insert(
            key,
            PendingCapture {
                options,
                tx,
                future: future.clone(),
            },
        );
        Ok(future)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Resolves every pending capture from the presentation surface.
    ///
    /// The surface is read back once; a readback failure rejects them all, an
    /// encoding failure rejects only the affected capture.
    pub fn resolve<G: GraphicsContext + ?Sized>(&mut self, ctx: &mut G, pixels: &mut Vec<u8>) {
        if self.pending.is_empty() {
            return;
        }
        let readback = ctx.read_pixels(RenderTarget::Surface, pixels);
        for (_, capture) in self.pending.drain(..) {
            let result = match &readback {
                Ok(size) => encode(pixels, *size, &capture.options).map_err(CaptureError::from),
                Err(e) => Err(CaptureError::from(e.clone())),
            };
            if let Err(e) = &result {
                log::warn!("capture failed: {e}");
            }
            // The requester may have dropped its future.
            let _ = capture.tx.send(result);
        }
    }

    /// Rejects every pending capture with [`TeardownError`].
    pub fn reject_all(&mut self) {
        for (_, capture) in self.pending.drain(..) {
            let _ = capture
                .tx
                .send(Err(CaptureError::Teardown(TeardownError)));
        }
    }
}
