use anyhow::{Context, Result};
use glimpse_core::{EngineConfig, PhysicalFileSystem, Reader, RenderResult};
use glimpse_protocol::{default_factory, requested_capabilities};
use tracing::debug;

/// Render `path` with the requested capabilities and print the HTML.
pub async fn render_file(config: &EngineConfig, path: &str, capabilities: &[String]) -> Result<()> {
    let factory = default_factory(config);
    let requested = requested_capabilities(factory.as_ref(), capabilities);
    debug!(capabilities = %requested, "creating renderer");

    let RenderResult { renderer, progress } = factory.create_renderer(&requested);
    let renderer = renderer.await.context("renderer failed to initialize")?;
    for event in progress.history() {
        debug!(renderer = %event.renderer_name, progress = event.progress, "{}", event.message);
    }

    let fs = match config.root_dir() {
        Some(root) => PhysicalFileSystem::with_root(root),
        None => PhysicalFileSystem::new(),
    };
    let source = fs.read_file(path, config.encoding()?).await?;
    let html = renderer
        .render(path, &source)
        .with_context(|| format!("failed to render {path}"))?;

    print!("{html}");
    Ok(())
}
