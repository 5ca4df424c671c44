//! Loader completed by hand from tests.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use futures::channel::oneshot;
use futures::future::BoxFuture;
use futures::FutureExt;

use crate::error::LoadError;

use super::{DecodedImage, ImageLoader};

type Senders = HashMap<String, Vec<oneshot::Sender<Result<DecodedImage, LoadError>>>>;

#[derive(Clone, Default)]
pub(crate) struct ManualLoader {
    senders: Rc<RefCell<Senders>>,
    started: Rc<RefCell<Vec<String>>>,
}

impl ManualLoader {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Uris requested so far, in order.
    pub(crate) fn started(&self) -> Vec<String> {
        self.started.borrow().clone()
    }

    /// Completes every outstanding load of `uri`.
    pub(crate) fn complete(&self, uri: &str, result: Result<DecodedImage, LoadError>) {
        let senders = self.senders.borrow_mut().remove(uri).unwrap_or_default();
        for tx in senders {
            let _ = tx.send(result.clone());
        }
    }

    pub(crate) fn fail(&self, uri: &str) {
        self.complete(
            uri,
            Err(LoadError {
                uri: uri.to_string(),
                message: "not found".into(),
            }),
        );
    }
}

impl ImageLoader for ManualLoader {
    fn load(&self, uri: &str) -> BoxFuture<'static, Result<DecodedImage, LoadError>> {
        let (tx, rx) = oneshot::channel();
        self.senders
            .borrow_mut()
            .entry(uri.to_string())
            .or_default()
            .push(tx);
        self.started.borrow_mut().push(uri.to_string());
        let uri = uri.to_string();
        rx.map(move |res| {
            res.unwrap_or_else(|_| {
                Err(LoadError {
                    uri,
                    message: "dropped".into(),
                })
            })
        })
        .boxed()
    }
}
