//! Dispatch by file extension.

use super::{extension_of, RenderError, Renderer};
use crate::fs::{Encoding, Reader};
use std::collections::HashMap;
use std::sync::Arc;

/// Maps lower-case extensions to renderers.
#[derive(Default, Clone)]
pub struct RendererRouter {
    routes: HashMap<String, Arc<dyn Renderer>>,
}

impl RendererRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route `extension` to `renderer`, replacing any earlier route.
    pub fn insert(&mut self, extension: &str, renderer: Arc<dyn Renderer>) {
        self.routes.insert(extension.to_lowercase(), renderer);
    }

    pub fn renderer_for(&self, path: &str) -> Result<&Arc<dyn Renderer>, RenderError> {
        let ext = extension_of(path).unwrap_or_default();
        self.routes
            .get(&ext)
            .ok_or(RenderError::UnsupportedType(ext))
    }

    /// Sorted list of routed extensions.
    pub fn extensions(&self) -> Vec<&str> {
        let mut exts: Vec<&str> = self.routes.keys().map(String::as_str).collect();
        exts.sort_unstable();
        exts
    }

    /// Read `path` through `fs` and render it.
    pub async fn render_file(
        &self,
        fs: &dyn Reader,
        path: &str,
        encoding: Encoding,
    ) -> Result<String, RenderError> {
        let renderer = self.renderer_for(path)?;
        let source = fs.read_file(path, encoding).await?;
        renderer.render(path, &source)
    }
}

impl Renderer for RendererRouter {
    fn render(&self, path: &str, source: &str) -> Result<String, RenderError> {
        self.renderer_for(path)?.render(path, source)
    }
}
