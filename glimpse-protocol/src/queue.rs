//! FIFO wrapper around a [`MessageProcessor`].

use crate::processor::{MessageHandler, MessageProcessor, ProcessError};
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Runs processing calls one at a time, in the order they were made.
///
/// Each call chains onto the completion signal of the call before it, so the
/// order is fixed when `process_message` is called, not when the returned
/// future is first polled. A call that fails, panics or is dropped still
/// releases the next one.
pub struct QueuedMessageProcessor {
    inner: Arc<dyn MessageProcessor>,
    tail: Mutex<Option<oneshot::Receiver<()>>>,
}

impl QueuedMessageProcessor {
    pub fn new(inner: Arc<dyn MessageProcessor>) -> Self {
        Self {
            inner,
            tail: Mutex::new(None),
        }
    }

    /// Resolves once every call made so far has settled.
    pub fn drained(&self) -> BoxFuture<'static, ()> {
        let (done, next) = oneshot::channel();
        let previous = self.tail.lock().replace(next);
        Box::pin(async move {
            if let Some(previous) = previous {
                let _ = previous.await;
            }
            let _ = done.send(());
        })
    }
}

impl MessageProcessor for QueuedMessageProcessor {
    fn register_handler(&self, key: &str, handler: Arc<dyn MessageHandler>) {
        self.inner.register_handler(key, handler);
    }

    fn process_message(&self, raw: String) -> BoxFuture<'static, Result<(), ProcessError>> {
        let (done, next) = oneshot::channel();
        let previous = self.tail.lock().replace(next);
        let work = self.inner.process_message(raw);

        Box::pin(async move {
            if let Some(previous) = previous {
                // A dropped sender means the previous call ended without signalling.
                let _ = previous.await;
            }
            let result = work.await;
            let _ = done.send(());
            result
        })
    }
}
