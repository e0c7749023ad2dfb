//! Markdown renderer factory.

use super::{PendingRenderer, RenderResult, Renderer, RendererFactory};
use crate::config::MarkdownConfig;
use crate::markdown::{builtin_plugins, MarkdownRenderer, PluginDescriptor};
use crate::progress;
use glimpse_types::{Capabilities, Capability, CapabilityRegistry, RENDER_MARKDOWN};
use std::sync::Arc;

pub const NAME: &str = "markdown";

const EXTENSIONS: &[&str] = &["md", "markdown", "mdown", "mkd"];

/// Builds markdown renderers from a plugin table.
pub struct MarkdownRendererFactory {
    plugins: Vec<(Capability, PluginDescriptor)>,
    capabilities: Capabilities,
}

impl MarkdownRendererFactory {
    /// Resolve each descriptor's capability through `registry`.
    ///
    /// Descriptors whose capability the registry does not know are skipped.
    pub fn new(registry: &CapabilityRegistry, descriptors: Vec<PluginDescriptor>) -> Self {
        let mut plugins = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            match registry.get(descriptor.capability()) {
                Some(capability) => plugins.push((capability.clone(), descriptor)),
                None => tracing::warn!(
                    plugin = descriptor.name(),
                    capability = descriptor.capability(),
                    "plugin capability is not registered, skipping"
                ),
            }
        }

        let mut capabilities: Capabilities = plugins.iter().map(|(c, _)| c.clone()).collect();
        capabilities.insert(Capability::new(RENDER_MARKDOWN));

        Self {
            plugins,
            capabilities,
        }
    }

    /// Factory over the built-in plugin table.
    pub fn with_builtin_plugins(registry: &CapabilityRegistry, config: &MarkdownConfig) -> Self {
        Self::new(registry, builtin_plugins(config))
    }

    pub fn plugin_names(&self) -> Vec<&str> {
        self.plugins.iter().map(|(_, d)| d.name()).collect()
    }
}

fn percent(done: usize, total: usize) -> f64 {
    done as f64 / total as f64 * 100.0
}

impl RendererFactory for MarkdownRendererFactory {
    fn name(&self) -> &str {
        NAME
    }

    fn create_renderer(&self, requested: &Capabilities) -> RenderResult {
        let selected: Vec<PluginDescriptor> = self
            .plugins
            .iter()
            .filter(|(capability, _)| {
                requested.has_all(&Capabilities::from_iter([capability.clone()]))
            })
            .map(|(_, descriptor)| descriptor.clone())
            .collect();

        tracing::debug!(
            plugins = ?selected.iter().map(|d| d.name()).collect::<Vec<_>>(),
            "creating markdown renderer"
        );

        let (tx, progress) = progress::channel();
        let renderer = PendingRenderer::spawn(async move {
            let total = selected.len();
            if total == 0 {
                tx.emit(NAME, 100.0, "No plugins to initialize");
            }

            let mut plugins = Vec::with_capacity(total);
            for (i, descriptor) in selected.iter().enumerate() {
                tx.emit(
                    NAME,
                    percent(i, total),
                    format!("Initializing {}", descriptor.name()),
                );
                let plugin = descriptor.initialize().await.map_err(|err| {
                    tracing::warn!(plugin = descriptor.name(), %err, "plugin failed to initialize");
                    err
                })?;
                plugins.push(plugin);
                tx.emit(
                    NAME,
                    percent(i + 1, total),
                    format!("Initialized {}", descriptor.name()),
                );
            }

            Ok(Arc::new(MarkdownRenderer::new(plugins)) as Arc<dyn Renderer>)
        });

        RenderResult { renderer, progress }
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities.clone()
    }

    fn supported_extensions(&self) -> Vec<String> {
        EXTENSIONS.iter().map(|e| e.to_string()).collect()
    }
}
