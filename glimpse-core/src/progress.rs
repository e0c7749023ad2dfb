//! Progress reporting for renderer initialization.
//!
//! A [`ProgressStream`] is multicast with full replay: every subscriber sees
//! every event from the beginning, no matter when it subscribed. The event
//! log lives in a `tokio::sync::watch` channel; the stream ends once the
//! sending side is dropped and the log is drained.

use futures::stream::{self, BoxStream, StreamExt};
use serde::Serialize;
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub renderer_name: String,
    /// Percentage in `0..=100`.
    pub progress: f64,
    pub message: String,
}

impl ProgressEvent {
    pub fn new(renderer_name: impl Into<String>, progress: f64, message: impl Into<String>) -> Self {
        Self {
            renderer_name: renderer_name.into(),
            progress: progress.clamp(0.0, 100.0),
            message: message.into(),
        }
    }
}

/// Create a connected sender and stream.
pub fn channel() -> (ProgressSender, ProgressStream) {
    let (tx, rx) = watch::channel(Vec::new());
    (ProgressSender { tx }, ProgressStream { rx })
}

/// Appends events to the log. Dropping it completes the stream.
#[derive(Debug)]
pub struct ProgressSender {
    tx: watch::Sender<Vec<ProgressEvent>>,
}

impl ProgressSender {
    pub fn send(&self, event: ProgressEvent) {
        // send_modify stores the event even when no receiver is alive.
        self.tx.send_modify(|log| log.push(event));
    }

    pub fn emit(&self, renderer_name: &str, progress: f64, message: impl Into<String>) {
        self.send(ProgressEvent::new(renderer_name, progress, message));
    }
}

/// Handle to a replaying progress log. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ProgressStream {
    rx: watch::Receiver<Vec<ProgressEvent>>,
}

impl ProgressStream {
    /// A finished stream holding exactly `events`.
    pub fn from_events(events: Vec<ProgressEvent>) -> Self {
        let (tx, rx) = watch::channel(events);
        drop(tx);
        Self { rx }
    }

    pub fn empty() -> Self {
        Self::from_events(Vec::new())
    }

    /// New subscriber positioned at the first event.
    pub fn subscribe(&self) -> ProgressSubscription {
        ProgressSubscription {
            rx: self.rx.clone(),
            cursor: 0,
        }
    }

    /// Events emitted so far.
    pub fn history(&self) -> Vec<ProgressEvent> {
        self.rx.borrow().clone()
    }

    /// Subscribe and adapt to a `futures::Stream`.
    pub fn into_stream(self) -> BoxStream<'static, ProgressEvent> {
        stream::unfold(self.subscribe(), |mut sub| async move {
            let event = sub.next().await?;
            Some((event, sub))
        })
        .boxed()
    }

    /// Collect every event until the stream completes.
    pub async fn collect(self) -> Vec<ProgressEvent> {
        self.into_stream().collect().await
    }

    /// Interleave several streams into one, in arrival order.
    ///
    /// Must be called inside a Tokio runtime; a forwarding task feeds the
    /// merged log and finishes once every input has completed.
    pub fn merge(streams: Vec<ProgressStream>) -> ProgressStream {
        if streams.is_empty() {
            return ProgressStream::empty();
        }

        let (tx, merged) = channel();
        let mut inputs = stream::select_all(streams.into_iter().map(ProgressStream::into_stream));
        tokio::spawn(async move {
            while let Some(event) = inputs.next().await {
                tx.send(event);
            }
        });
        merged
    }
}

/// A single reader's position in a [`ProgressStream`].
#[derive(Debug)]
pub struct ProgressSubscription {
    rx: watch::Receiver<Vec<ProgressEvent>>,
    cursor: usize,
}

impl ProgressSubscription {
    /// Next event, or `None` when the sender is gone and the log is drained.
    pub async fn next(&mut self) -> Option<ProgressEvent> {
        loop {
            if let Some(event) = self.take_buffered() {
                return Some(event);
            }
            if self.rx.changed().await.is_err() {
                return self.take_buffered();
            }
        }
    }

    fn take_buffered(&mut self) -> Option<ProgressEvent> {
        let log = self.rx.borrow_and_update();
        let event = log.get(self.cursor).cloned()?;
        self.cursor += 1;
        Some(event)
    }
}
