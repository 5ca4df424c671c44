use std::collections::HashMap;
use std::task::{Context, Poll};

use futures::future::{AbortHandle, Abortable, BoxFuture};
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};

use crate::error::LoadError;

use super::{DecodedImage, ImageLoader};

type LoadResult = Result<DecodedImage, LoadError>;

/// In-flight loads keyed by uri.
///
/// Polled without an executor: [`PendingLoads::poll_ready`] drains whatever
/// has completed and returns immediately.
#[derive(Default)]
pub struct PendingLoads {
    tasks: FuturesUnordered<BoxFuture<'static, Option<(String, LoadResult)>>>,
    handles: HashMap<String, AbortHandle>,
}

impl PendingLoads {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts loading `uri` unless a load for it is already in flight.
    pub fn start(&mut self, loader: &dyn ImageLoader, uri: &str) {
        if self.handles.contains_key(uri) {
            return;
        }
        let (handle, registration) = AbortHandle::new_pair();
        let key = uri.to_string();
        let task = Abortable::new(loader.load(uri), registration)
            .map(move |res| res.ok().map(|loaded| (key, loaded)))
            .boxed();
        self.tasks.push(task);
        self.handles.insert(uri.to_string(), handle);
        log::debug!("image load started: {uri}");
    }

    /// Cancels the load of `uri`, if any.
    pub fn cancel(&mut self, uri: &str) {
        if let Some(handle) = self.handles.remove(uri) {
            handle.abort();
            log::debug!("image load cancelled: {uri}");
        }
    }

    pub fn cancel_all(&mut self) {
        for (_, handle) in self.handles.drain() {
            handle.abort();
        }
        self.tasks.clear();
    }

    pub fn is_loading(&self, uri: &str) -> bool {
        self.handles.contains_key(uri)
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Returns every load that completed since the last call.
    pub fn poll_ready(&mut self) -> Vec<(String, LoadResult)> {
        let waker = futures::task::noop_waker();
        let mut cx = Context::from_waker(&waker);
        let mut ready = Vec::new();

        while let Poll::Ready(Some(item)) = self.tasks.poll_next_unpin(&mut cx) {
            let Some((uri, result)) = item else {
                continue;
            };
            // A cancelled uri may have been restarted; only the live load counts.
            if self.handles.remove(&uri).is_some() {
                ready.push((uri, result));
            }
        }
        ready
    }
}

impl Drop for PendingLoads {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
