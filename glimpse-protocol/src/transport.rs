//! Newline-delimited JSON over a byte stream.
//!
//! Incoming bytes are buffered until a `\n` completes a frame; each non-blank
//! frame is handed to the [`MessageProcessor`] in arrival order. Outgoing
//! messages are queued to a single writer task, so sends never block and
//! never interleave.

use crate::message::{LogLevel, Message};
use crate::processor::MessageProcessor;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

const READ_CHUNK: usize = 8 * 1024;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Failed to serialize message: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Output stream is closed")]
    Closed,
}

pub trait MessageLayer: Send + Sync {
    /// Begin reading frames. Calling it while running does nothing.
    fn start(&self);

    /// Stop reading. Bytes not yet terminated by a newline are dropped.
    fn stop(&self);

    fn is_running(&self) -> bool;

    /// Queue `message` for writing. Works whether or not the layer is running.
    fn send_message(&self, message: &Message) -> Result<(), TransportError>;

    /// Resolves once the layer is no longer running.
    fn closed(&self) -> BoxFuture<'static, ()>;

    /// Resolves once every message queued so far has been written.
    fn flush(&self) -> BoxFuture<'static, Result<(), TransportError>>;
}

enum Outgoing {
    Frame(String),
    Flush(oneshot::Sender<()>),
}

type BoxReader = Box<dyn AsyncRead + Send + Unpin>;

struct Shared {
    reader: Arc<tokio::sync::Mutex<BoxReader>>,
    processor: Arc<dyn MessageProcessor>,
    outgoing: mpsc::UnboundedSender<Outgoing>,
    running: watch::Sender<bool>,
    /// Bumped on every start and stop so a stale reader cannot flip state.
    generation: AtomicU64,
    reader_task: Mutex<Option<JoinHandle<()>>>,
}

/// [`MessageLayer`] over any async reader/writer pair, typically stdin and
/// stdout.
#[derive(Clone)]
pub struct StreamMessageLayer {
    shared: Arc<Shared>,
}

impl StreamMessageLayer {
    /// Must be called inside a Tokio runtime; the writer task starts here.
    pub fn new<R, W>(reader: R, writer: W, processor: Arc<dyn MessageProcessor>) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (outgoing, rx) = mpsc::unbounded_channel();
        tokio::spawn(write_loop(writer, rx));

        let (running, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                reader: Arc::new(tokio::sync::Mutex::new(Box::new(reader) as BoxReader)),
                processor,
                outgoing,
                running,
                generation: AtomicU64::new(0),
                reader_task: Mutex::new(None),
            }),
        }
    }

    /// Standard input and output of the current process.
    pub fn stdio(processor: Arc<dyn MessageProcessor>) -> Self {
        Self::new(tokio::io::stdin(), tokio::io::stdout(), processor)
    }
}

impl MessageLayer for StreamMessageLayer {
    fn start(&self) {
        let mut task = self.shared.reader_task.lock();
        if *self.shared.running.borrow() {
            return;
        }
        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared.running.send_replace(true);
        *task = Some(tokio::spawn(read_loop(self.shared.clone(), generation)));
        debug!(generation, "transport started");
    }

    fn stop(&self) {
        let mut task = self.shared.reader_task.lock();
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(handle) = task.take() {
            handle.abort();
        }
        if self.shared.running.send_replace(false) {
            debug!("transport stopped");
        }
    }

    fn is_running(&self) -> bool {
        *self.shared.running.borrow()
    }

    fn send_message(&self, message: &Message) -> Result<(), TransportError> {
        self.shared.send(message)
    }

    fn closed(&self) -> BoxFuture<'static, ()> {
        let mut rx = self.shared.running.subscribe();
        Box::pin(async move {
            // The sender lives as long as the layer, so this only ends on a state change.
            let _ = rx.wait_for(|running| !*running).await;
        })
    }

    fn flush(&self) -> BoxFuture<'static, Result<(), TransportError>> {
        let (ack, done) = oneshot::channel();
        let queued = self.shared.outgoing.send(Outgoing::Flush(ack));
        Box::pin(async move {
            queued.map_err(|_| TransportError::Closed)?;
            done.await.map_err(|_| TransportError::Closed)
        })
    }
}

fn encode(message: &Message) -> Result<String, TransportError> {
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    Ok(line)
}

impl Shared {
    fn send(&self, message: &Message) -> Result<(), TransportError> {
        let line = encode(message)?;
        trace!(message_type = message.message_type(), "queueing frame");
        self.outgoing
            .send(Outgoing::Frame(line))
            .map_err(|_| TransportError::Closed)
    }

    /// Called by a reader that ran out of input.
    fn finish(&self, generation: u64) {
        let mut task = self.reader_task.lock();
        if self.generation.load(Ordering::SeqCst) != generation {
            return;
        }
        task.take();
        self.running.send_replace(false);
        debug!(generation, "transport stopped");
    }

    /// Hand a frame to the processor. The processing order is fixed here;
    /// the outcome is observed on a separate task.
    fn dispatch(&self, frame: String) {
        let work = self.processor.process_message(frame);
        let outgoing = self.outgoing.clone();
        tokio::spawn(async move {
            if let Err(err) = work.await {
                warn!(error = %err, "message rejected");
                let report = Message::log(LogLevel::Error, err.to_string());
                match encode(&report) {
                    Ok(line) => {
                        let _ = outgoing.send(Outgoing::Frame(line));
                    }
                    Err(err) => warn!(%err, "failed to report rejection"),
                }
            }
        });
    }
}

/// Bytes read but not yet split into frames.
///
/// Consumed frames are only compacted away when new input arrives, and the
/// newline search resumes where the last one stopped, so a frame split over
/// many chunks is scanned once.
#[derive(Default)]
struct FrameBuffer {
    bytes: Vec<u8>,
    /// Start of the first unconsumed frame.
    consumed: usize,
    /// Everything before this offset is known to hold no newline.
    scanned: usize,
}

impl FrameBuffer {
    fn extend(&mut self, chunk: &[u8]) {
        if self.consumed > 0 {
            self.bytes.drain(..self.consumed);
            self.scanned -= self.consumed;
            self.consumed = 0;
        }
        self.bytes.extend_from_slice(chunk);
    }

    /// Next complete frame, newline included.
    fn next_frame(&mut self) -> Option<&[u8]> {
        let offset = self.scanned.max(self.consumed);
        match self.bytes[offset..].iter().position(|b| *b == b'\n') {
            Some(pos) => {
                let start = self.consumed;
                let end = offset + pos + 1;
                self.consumed = end;
                self.scanned = end;
                Some(&self.bytes[start..end])
            }
            None => {
                self.scanned = self.bytes.len();
                None
            }
        }
    }
}

async fn read_loop(shared: Arc<Shared>, generation: u64) {
    let input = shared.reader.clone();
    let mut reader = input.lock().await;
    let mut buffer = FrameBuffer::default();
    let mut chunk = vec![0u8; READ_CHUNK];

    loop {
        let n = match reader.read(&mut chunk).await {
            Ok(0) => {
                debug!("input closed");
                break;
            }
            Ok(n) => n,
            Err(err) => {
                warn!(%err, "failed to read input");
                break;
            }
        };
        buffer.extend(&chunk[..n]);

        while let Some(line) = buffer.next_frame() {
            let frame = match std::str::from_utf8(line) {
                Ok(frame) => frame,
                Err(err) => {
                    warn!(%err, "frame is not valid UTF-8, stopping");
                    shared.finish(generation);
                    return;
                }
            };
            let frame = frame.trim_end_matches(['\n', '\r']);
            if frame.trim().is_empty() {
                continue;
            }
            shared.dispatch(frame.to_string());
        }
    }

    shared.finish(generation);
}

async fn write_loop<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<Outgoing>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(command) = rx.recv().await {
        match command {
            Outgoing::Frame(line) => {
                if let Err(err) = writer.write_all(line.as_bytes()).await {
                    warn!(%err, "failed to write frame");
                    break;
                }
                if let Err(err) = writer.flush().await {
                    warn!(%err, "failed to flush output");
                    break;
                }
            }
            Outgoing::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
    debug!("writer finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::{MessageHandler, ProcessError};
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, BufReader, DuplexStream, Lines};

    /// Records frames in call order; frames containing "bad" fail.
    #[derive(Default)]
    struct Recorder {
        frames: Mutex<Vec<String>>,
    }

    impl MessageProcessor for Recorder {
        fn register_handler(&self, _key: &str, _handler: Arc<dyn MessageHandler>) {}

        fn process_message(&self, raw: String) -> BoxFuture<'static, Result<(), ProcessError>> {
            self.frames.lock().push(raw.clone());
            Box::pin(async move {
                if raw.contains("bad") {
                    return Err(ProcessError::Handler {
                        key: "1.0:test".into(),
                        source: anyhow::anyhow!("cannot handle {raw}"),
                    });
                }
                Ok(())
            })
        }
    }

    struct Harness {
        layer: StreamMessageLayer,
        recorder: Arc<Recorder>,
        input: DuplexStream,
        output: Lines<BufReader<DuplexStream>>,
    }

    fn harness() -> Harness {
        let (input, engine_in) = tokio::io::duplex(256);
        let (engine_out, output) = tokio::io::duplex(4096);
        let recorder = Arc::new(Recorder::default());
        let layer = StreamMessageLayer::new(engine_in, engine_out, recorder.clone());
        Harness {
            layer,
            recorder,
            input,
            output: BufReader::new(output).lines(),
        }
    }

    async fn frames_eventually(recorder: &Recorder, count: usize) -> Vec<String> {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                {
                    let frames = recorder.frames.lock();
                    if frames.len() >= count {
                        return frames.clone();
                    }
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("frames did not arrive")
    }

    async fn next_line(output: &mut Lines<BufReader<DuplexStream>>) -> String {
        tokio::time::timeout(Duration::from_secs(2), output.next_line())
            .await
            .expect("no output")
            .unwrap()
            .expect("output closed")
    }

    #[tokio::test]
    async fn test_single_and_concatenated_frames() {
        let mut h = harness();
        h.layer.start();
        h.input.write_all(b"{\"n\":1}\n").await.unwrap();
        h.input.write_all(b"{\"n\":2}\n{\"n\":3}\n").await.unwrap();

        let frames = frames_eventually(&h.recorder, 3).await;
        assert_eq!(frames, vec![r#"{"n":1}"#, r#"{"n":2}"#, r#"{"n":3}"#]);
    }

    #[tokio::test]
    async fn test_partial_frames_and_blank_lines() {
        let mut h = harness();
        h.layer.start();
        h.input.write_all(b"{\"a\":").await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(h.recorder.frames.lock().is_empty());

        h.input.write_all(b"true}\r\n\n   \n{\"b\"").await.unwrap();
        h.input.write_all(b":1}\n").await.unwrap();

        let frames = frames_eventually(&h.recorder, 2).await;
        assert_eq!(frames, vec![r#"{"a":true}"#, r#"{"b":1}"#]);
    }

    #[tokio::test]
    async fn test_eof_stops_layer() {
        let h = harness();
        h.layer.start();
        assert!(h.layer.is_running());
        drop(h.input);
        tokio::time::timeout(Duration::from_secs(2), h.layer.closed())
            .await
            .unwrap();
        assert!(!h.layer.is_running());
    }

    #[tokio::test]
    async fn test_invalid_utf8_stops_layer() {
        let mut h = harness();
        h.layer.start();
        h.input.write_all(b"{\"ok\":1}\n\xff\xfe\n{\"late\":1}\n").await.unwrap();
        tokio::time::timeout(Duration::from_secs(2), h.layer.closed())
            .await
            .unwrap();
        assert_eq!(*h.recorder.frames.lock(), vec![r#"{"ok":1}"#]);
    }

    #[tokio::test]
    async fn test_stop_and_restart() {
        let mut h = harness();
        h.layer.start();
        h.layer.start();
        h.input.write_all(b"{\"n\":1}\n").await.unwrap();
        frames_eventually(&h.recorder, 1).await;

        h.layer.stop();
        h.layer.stop();
        assert!(!h.layer.is_running());

        h.layer.start();
        h.input.write_all(b"{\"n\":2}\n").await.unwrap();
        let frames = frames_eventually(&h.recorder, 2).await;
        assert_eq!(frames[1], r#"{"n":2}"#);
    }

    #[tokio::test]
    async fn test_send_preserves_order_in_any_state() {
        let mut h = harness();
        h.layer
            .send_message(&Message::log(LogLevel::Info, "before start"))
            .unwrap();
        h.layer.start();
        h.layer.send_message(&Message::shutdown("done", 3)).unwrap();
        h.layer.flush().await.unwrap();

        let first: serde_json::Value = serde_json::from_str(&next_line(&mut h.output).await).unwrap();
        let second: serde_json::Value = serde_json::from_str(&next_line(&mut h.output).await).unwrap();
        assert_eq!(first["messageType"], "log");
        assert_eq!(first["message"], "before start");
        assert_eq!(second["messageType"], "shutdown");
        assert_eq!(second["code"], 3);
    }

    #[tokio::test]
    async fn test_rejection_reported_as_log() {
        let mut h = harness();
        h.layer.start();
        h.input.write_all(b"{\"bad\":1}\n{\"fine\":1}\n").await.unwrap();

        let report: serde_json::Value = serde_json::from_str(&next_line(&mut h.output).await).unwrap();
        assert_eq!(report["messageType"], "log");
        assert_eq!(report["level"], "error");
        assert!(report["message"].as_str().unwrap().contains("cannot handle"));

        frames_eventually(&h.recorder, 2).await;
        assert!(h.layer.is_running());
    }

    #[test]
    fn test_frame_buffer_scans_each_byte_once() {
        let mut buffer = FrameBuffer::default();
        for piece in [&b"{\"a\""[..], &b":1"[..], &b"}"[..]] {
            buffer.extend(piece);
            assert!(buffer.next_frame().is_none());
            assert_eq!(buffer.scanned, buffer.bytes.len());
        }

        buffer.extend(b"\n{\"b\":2}\npartial");
        assert_eq!(buffer.next_frame(), Some(&b"{\"a\":1}\n"[..]));
        assert_eq!(buffer.next_frame(), Some(&b"{\"b\":2}\n"[..]));
        assert!(buffer.next_frame().is_none());

        buffer.extend(b" end\n");
        assert_eq!(buffer.consumed, 0);
        assert_eq!(buffer.next_frame(), Some(&b"partial end\n"[..]));
        assert!(buffer.next_frame().is_none());
    }
}
