//! Renderer factories.
//!
//! A [`RendererFactory`] turns a requested capability set into a
//! [`RenderResult`]: a renderer that becomes available once its plugins are
//! initialized, plus a replaying stream of initialization progress.

pub mod composite;
pub mod markdown;
pub mod router;

pub use composite::CompositeRendererFactory;
pub use markdown::MarkdownRendererFactory;
pub use router::RendererRouter;

use crate::fs::FsError;
use crate::progress::ProgressStream;
use glimpse_types::Capabilities;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::task::{JoinError, JoinHandle};

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("No renderer for file type '{0}'")]
    UnsupportedType(String),

    #[error("Renderer is not initialized; the host has not sent start")]
    RendererUnset,

    #[error("Plugin '{plugin}' failed to initialize: {reason}")]
    PluginInit { plugin: String, reason: String },

    #[error("Failed to read source: {0}")]
    Read(#[from] FsError),

    #[error("Renderer task failed: {0}")]
    Task(#[from] JoinError),
}

/// Turns source text into HTML.
pub trait Renderer: Send + Sync {
    /// `path` identifies the document; single-format renderers ignore it.
    fn render(&self, path: &str, source: &str) -> Result<String, RenderError>;
}

/// A renderer still being initialized.
///
/// Initialization starts immediately on a Tokio task; awaiting only observes
/// the result.
pub struct PendingRenderer {
    handle: JoinHandle<Result<Arc<dyn Renderer>, RenderError>>,
}

impl PendingRenderer {
    pub fn spawn<F>(init: F) -> Self
    where
        F: Future<Output = Result<Arc<dyn Renderer>, RenderError>> + Send + 'static,
    {
        Self {
            handle: tokio::spawn(init),
        }
    }

    pub fn ready(renderer: Arc<dyn Renderer>) -> Self {
        Self::spawn(async move { Ok(renderer) })
    }
}

impl Future for PendingRenderer {
    type Output = Result<Arc<dyn Renderer>, RenderError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.handle)
            .poll(cx)
            .map(|joined| joined.map_err(RenderError::Task).and_then(|result| result))
    }
}

pub struct RenderResult {
    pub renderer: PendingRenderer,
    pub progress: ProgressStream,
}

pub trait RendererFactory: Send + Sync {
    fn name(&self) -> &str;

    /// Start building a renderer for the requested capabilities.
    ///
    /// Must be called inside a Tokio runtime.
    fn create_renderer(&self, requested: &Capabilities) -> RenderResult;

    /// Every capability this factory can provide.
    fn capabilities(&self) -> Capabilities;

    /// Lower-case file extensions, without the dot.
    fn supported_extensions(&self) -> Vec<String>;
}

/// Extension of the final path segment, lower-cased and without the dot.
///
/// ```
/// use glimpse_core::render::extension_of;
///
/// assert_eq!(extension_of("notes/Plan.MD").as_deref(), Some("md"));
/// assert_eq!(extension_of("v1.2/README").as_deref(), None);
/// ```
pub fn extension_of(path: &str) -> Option<String> {
    let segment = path.rsplit(['/', '\\']).next().unwrap_or(path);
    let (_, ext) = segment.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}
