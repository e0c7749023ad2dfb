//! The preview engine: protocol handlers over the renderer and filesystem
//! layers.

use crate::message::{
    handler_key, Acknowledge, FileAction, FileUpdate, InitProgress, LogLevel, Message,
    MessageBody, PreviewAcknowledge, PreviewComplete, PreviewFail, PreviewProgress, Reject,
    RequestPreview, Shutdown, Start, UpdateFilesystem, PROTOCOL_VERSION,
};
use crate::processor::{MessageHandler, MessageProcessor, ValidatingMessageProcessor};
use crate::queue::QueuedMessageProcessor;
use crate::transport::{MessageLayer, StreamMessageLayer, TransportError};
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use base64::Engine as _;
use futures::StreamExt;
use glimpse_core::{
    markdown, CompositeFileSystem, CompositeRendererFactory, ConfigError, Encoding, EngineConfig,
    InMemoryFileSystem, MarkdownRendererFactory, PhysicalFileSystem, Reader, RenderError,
    RenderResult, Renderer, RendererFactory, Writer,
};
use glimpse_types::{Capabilities, Capability, VERSION_1_0};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeSet;
use std::sync::{Arc, Weak};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

/// Message types the engine handles.
const HANDLED: [&str; 4] = ["start", "update_filesystem", "request_preview", "shutdown"];

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// The default factory: markdown with every built-in plugin, behind a
/// composite router.
pub fn default_factory(config: &EngineConfig) -> Arc<dyn RendererFactory> {
    let descriptors = markdown::builtin_plugins(&config.markdown);
    let registry = markdown::capability_registry(&descriptors);
    let factories: Vec<Arc<dyn RendererFactory>> =
        vec![Arc::new(MarkdownRendererFactory::new(&registry, descriptors))];
    Arc::new(CompositeRendererFactory::new(factories))
}

/// Capabilities advertised in `init`: protocol version plus everything the
/// factory provides.
pub fn advertised_capabilities(factory: &dyn RendererFactory) -> Capabilities {
    let mut capabilities = Capabilities::from_names([VERSION_1_0]);
    for capability in factory.capabilities().iter() {
        capabilities.insert(capability.clone());
    }
    capabilities
}

#[derive(Default)]
struct Session {
    renderer: Option<Arc<dyn Renderer>>,
    live: BTreeSet<String>,
}

struct EngineInner {
    transport: Arc<dyn MessageLayer>,
    factory: Arc<dyn RendererFactory>,
    capabilities: Capabilities,
    overlay: Arc<InMemoryFileSystem>,
    files: CompositeFileSystem,
    encoding: Encoding,
    session: RwLock<Session>,
    exit_code: Mutex<Option<i32>>,
}

pub struct Engine {
    inner: Arc<EngineInner>,
    queue: Arc<QueuedMessageProcessor>,
}

impl Engine {
    /// Engine over the default markdown factory.
    pub fn new<R, W>(config: &EngineConfig, reader: R, writer: W) -> Result<Self, EngineError>
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self::with_factory(config, default_factory(config), reader, writer)
    }

    /// Engine reading frames from `reader` and writing to `writer`.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn with_factory<R, W>(
        config: &EngineConfig,
        factory: Arc<dyn RendererFactory>,
        reader: R,
        writer: W,
    ) -> Result<Self, EngineError>
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let encoding = config.encoding()?;
        let physical = match config.root_dir() {
            Some(root) => PhysicalFileSystem::with_root(root),
            None => PhysicalFileSystem::new(),
        };
        let overlay = Arc::new(InMemoryFileSystem::new());
        let layers: Vec<Arc<dyn Reader>> = vec![overlay.clone(), Arc::new(physical)];
        let files = CompositeFileSystem::new(layers);

        let queue = Arc::new(QueuedMessageProcessor::new(Arc::new(
            ValidatingMessageProcessor::default(),
        )));
        let transport: Arc<dyn MessageLayer> =
            Arc::new(StreamMessageLayer::new(reader, writer, queue.clone()));

        let inner = Arc::new(EngineInner {
            transport,
            capabilities: advertised_capabilities(factory.as_ref()),
            factory,
            overlay,
            files,
            encoding,
            session: RwLock::new(Session::default()),
            exit_code: Mutex::new(None),
        });

        let handler: Arc<dyn MessageHandler> = Arc::new(EngineHandler {
            engine: Arc::downgrade(&inner),
        });
        for message_type in HANDLED {
            queue.register_handler(&handler_key(PROTOCOL_VERSION, message_type), handler.clone());
        }

        Ok(Self { inner, queue })
    }

    /// Engine on the process's stdin and stdout.
    pub fn stdio(config: &EngineConfig) -> Result<Self, EngineError> {
        Self::new(config, tokio::io::stdin(), tokio::io::stdout())
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.inner.capabilities
    }

    /// Processor frames are dispatched through; extra handlers may be
    /// registered on it.
    pub fn processor(&self) -> Arc<dyn MessageProcessor> {
        self.queue.clone()
    }

    /// Announce the engine with `init`, then start reading.
    ///
    /// `init` is queued before the reader exists, so it is always the first
    /// frame out even when input is already waiting.
    pub fn start(&self) -> Result<(), EngineError> {
        self.inner
            .transport
            .send_message(&Message::init(self.inner.capabilities.clone()))?;
        self.inner.transport.start();
        info!(capabilities = %self.inner.capabilities, "engine started");
        Ok(())
    }

    pub fn stop(&self) {
        self.inner.transport.stop();
    }

    /// Wait until the transport stops and every frame read before that has
    /// been handled, then return the exit code the host asked for, or `0`
    /// when the input simply ended.
    pub async fn wait(&self) -> i32 {
        self.inner.transport.closed().await;
        self.queue.drained().await;
        self.inner.exit_code.lock().unwrap_or(0)
    }

    /// Wait for queued output to be written.
    pub async fn flush(&self) -> Result<(), EngineError> {
        self.inner.transport.flush().await?;
        Ok(())
    }
}

struct EngineHandler {
    engine: Weak<EngineInner>,
}

#[async_trait]
impl MessageHandler for EngineHandler {
    async fn handle(&self, message: Message) -> anyhow::Result<()> {
        let Some(engine) = self.engine.upgrade() else {
            debug!(message_type = message.message_type(), "engine dropped, ignoring");
            return Ok(());
        };
        match message.body {
            MessageBody::Start(start) => engine.on_start(start).await,
            MessageBody::UpdateFilesystem(update) => engine.on_update_filesystem(update).await,
            MessageBody::RequestPreview(request) => engine.on_request_preview(request).await,
            MessageBody::Shutdown(shutdown) => engine.on_shutdown(shutdown),
            other => {
                debug!(message_type = other.message_type(), "not handled by the engine");
                Ok(())
            }
        }
    }
}

impl EngineInner {
    fn send(&self, body: MessageBody) {
        if let Err(err) = self.transport.send_message(&Message::new(body)) {
            warn!(%err, "failed to send message");
        }
    }

    fn log(&self, level: LogLevel, message: impl Into<String>) {
        if let Err(err) = self.transport.send_message(&Message::log(level, message)) {
            warn!(%err, "failed to send log message");
        }
    }

    async fn on_start(&self, start: Start) -> anyhow::Result<()> {
        if !start.capabilities.has(VERSION_1_0) {
            warn!(requested = %start.capabilities, "host does not speak a supported protocol version");
            self.send(MessageBody::Reject(Reject {
                reason: format!(
                    "Unsupported protocol version; engine requires {VERSION_1_0}, host offered [{}]",
                    start.capabilities
                ),
            }));
            return Ok(());
        }

        let negotiated = self.capabilities.intersection(&start.capabilities);
        info!(capabilities = %negotiated, "capabilities negotiated");
        self.send(MessageBody::Acknowledge(Acknowledge {
            capabilities: negotiated.clone(),
        }));

        let RenderResult { renderer, progress } = self.factory.create_renderer(&negotiated);
        let mut events = progress.into_stream();
        while let Some(event) = events.next().await {
            self.send(MessageBody::InitProgress(InitProgress {
                renderer_name: event.renderer_name,
                progress: event.progress,
                message: event.message,
            }));
        }

        match renderer.await {
            Ok(renderer) => {
                self.session.write().renderer = Some(renderer);
                debug!("renderer ready");
                Ok(())
            }
            Err(err) => {
                self.log(LogLevel::Error, format!("Renderer failed to initialize: {err}"));
                Err(anyhow::Error::new(err).context("renderer initialization failed"))
            }
        }
    }

    async fn on_update_filesystem(&self, update: UpdateFilesystem) -> anyhow::Result<()> {
        let mut touched = BTreeSet::new();
        let mut failures = Vec::new();

        for file in &update.updates {
            match self.apply(file).await {
                Ok(()) => {
                    touched.insert(file.path.clone());
                    if let Some(new_path) = &file.new_path {
                        touched.insert(new_path.clone());
                    }
                }
                Err(err) => {
                    warn!(path = %file.path, action = ?file.action, ?err, "update failed");
                    failures.push(format!("{}: {err:#}", file.path));
                }
            }
        }

        let live: Vec<String> = {
            let session = self.session.read();
            session.live.intersection(&touched).cloned().collect()
        };
        for path in live {
            debug!(%path, "re-rendering live preview");
            self.render_and_report(&path).await;
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(anyhow!("{} update(s) failed: {}", failures.len(), failures.join("; ")))
        }
    }

    async fn apply(&self, update: &FileUpdate) -> anyhow::Result<()> {
        match update.action {
            FileAction::Create | FileAction::Update => {
                let content = update
                    .content
                    .as_ref()
                    .ok_or_else(|| anyhow!("missing content"))?;
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(&content.base64)
                    .context("content is not valid base64")?;
                let original: Encoding = content.original_encoding.parse()?;
                let text = original
                    .decode(&bytes)
                    .ok_or_else(|| anyhow!("content is not valid {original}"))?;
                self.overlay
                    .write_file(&update.path, text, self.encoding)
                    .await?;
            }
            FileAction::Delete => self.overlay.delete_file(&update.path).await?,
            FileAction::Rename => {
                let new_path = update
                    .new_path
                    .as_deref()
                    .ok_or_else(|| anyhow!("missing newPath"))?;
                self.overlay.rename_file(&update.path, new_path).await?;
            }
        }
        Ok(())
    }

    async fn on_request_preview(&self, request: RequestPreview) -> anyhow::Result<()> {
        let path = request.path;
        self.send(MessageBody::PreviewAcknowledge(PreviewAcknowledge {
            path: path.clone(),
        }));
        self.send(MessageBody::PreviewProgress(PreviewProgress {
            path: path.clone(),
            progress: 0.0,
            message: "Rendering".to_string(),
        }));

        {
            let mut session = self.session.write();
            if request.live_update {
                session.live.insert(path.clone());
            } else {
                session.live.remove(&path);
            }
        }

        self.render_and_report(&path).await;
        Ok(())
    }

    async fn render(&self, path: &str) -> Result<String, RenderError> {
        let renderer = self
            .session
            .read()
            .renderer
            .clone()
            .ok_or(RenderError::RendererUnset)?;
        let source = self.files.read_file(path, self.encoding).await?;
        let path = path.to_string();
        tokio::task::spawn_blocking(move || renderer.render(&path, &source)).await?
    }

    async fn render_and_report(&self, path: &str) {
        match self.render(path).await {
            Ok(html) => {
                debug!(%path, bytes = html.len(), "preview rendered");
                self.send(MessageBody::PreviewComplete(PreviewComplete {
                    path: path.to_string(),
                    html,
                }));
            }
            Err(err) => {
                warn!(%path, %err, "preview failed");
                self.send(MessageBody::PreviewFail(PreviewFail {
                    path: path.to_string(),
                    reason: err.to_string(),
                }));
            }
        }
    }

    fn on_shutdown(&self, shutdown: Shutdown) -> anyhow::Result<()> {
        info!(reason = %shutdown.reason, code = shutdown.code, "shutdown requested");
        *self.exit_code.lock() = Some(shutdown.code);
        self.send(MessageBody::Shutdown(shutdown));
        self.transport.stop();
        Ok(())
    }
}

/// Capability names a one-shot render should request: everything the
/// factory offers unless `names` narrows it.
pub fn requested_capabilities(factory: &dyn RendererFactory, names: &[String]) -> Capabilities {
    if names.is_empty() {
        return advertised_capabilities(factory);
    }
    let mut requested: Capabilities = names.iter().map(|n| Capability::new(n.as_str())).collect();
    requested.insert(Capability::new(VERSION_1_0));
    requested
}
