//! Composite factory: several factories behind one extension router.

use super::{PendingRenderer, RenderResult, Renderer, RendererFactory, RendererRouter};
use crate::progress::ProgressStream;
use glimpse_types::Capabilities;
use std::sync::Arc;

pub const NAME: &str = "composite";

pub struct CompositeRendererFactory {
    factories: Vec<Arc<dyn RendererFactory>>,
}

impl CompositeRendererFactory {
    pub fn new(factories: Vec<Arc<dyn RendererFactory>>) -> Self {
        Self { factories }
    }
}

impl RendererFactory for CompositeRendererFactory {
    fn name(&self) -> &str {
        NAME
    }

    /// Factories whose capabilities intersect the request take part; the
    /// rest are skipped. On overlapping extensions the later factory wins.
    fn create_renderer(&self, requested: &Capabilities) -> RenderResult {
        let mut routes = Vec::new();
        let mut streams = Vec::new();

        for factory in &self.factories {
            if !factory.capabilities().has_any(requested) {
                tracing::debug!(factory = factory.name(), "not requested, skipping");
                continue;
            }
            let RenderResult { renderer, progress } = factory.create_renderer(requested);
            routes.push((factory.supported_extensions(), renderer));
            streams.push(progress);
        }

        let progress = ProgressStream::merge(streams);
        let renderer = PendingRenderer::spawn(async move {
            let mut router = RendererRouter::new();
            for (extensions, pending) in routes {
                let renderer = pending.await?;
                for ext in &extensions {
                    router.insert(ext, renderer.clone());
                }
            }
            Ok(Arc::new(router) as Arc<dyn Renderer>)
        });

        RenderResult { renderer, progress }
    }

    fn capabilities(&self) -> Capabilities {
        let sets: Vec<Capabilities> = self.factories.iter().map(|f| f.capabilities()).collect();
        Capabilities::merge(&sets)
    }

    fn supported_extensions(&self) -> Vec<String> {
        let mut extensions: Vec<String> = Vec::new();
        for ext in self.factories.iter().flat_map(|f| f.supported_extensions()) {
            if !extensions.contains(&ext) {
                extensions.push(ext);
            }
        }
        extensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress;
    use crate::render::RenderError;

    struct Stub {
        name: &'static str,
        caps: Capabilities,
        exts: Vec<String>,
    }

    impl Stub {
        fn shared(name: &'static str, caps: &[&str], exts: &[&str]) -> Arc<dyn RendererFactory> {
            Arc::new(Self {
                name,
                caps: Capabilities::from_names(caps.iter().copied()),
                exts: exts.iter().map(|e| e.to_string()).collect(),
            })
        }
    }

    struct Output(&'static str);

    impl Renderer for Output {
        fn render(&self, _path: &str, _source: &str) -> Result<String, RenderError> {
            Ok(self.0.to_string())
        }
    }

    impl RendererFactory for Stub {
        fn name(&self) -> &str {
            self.name
        }

        fn create_renderer(&self, _requested: &Capabilities) -> RenderResult {
            let (tx, progress) = progress::channel();
            let name = self.name;
            let renderer = PendingRenderer::spawn(async move {
                tx.emit(name, 0.0, "start");
                tokio::task::yield_now().await;
                tx.emit(name, 100.0, "done");
                Ok(Arc::new(Output(name)) as Arc<dyn Renderer>)
            });
            RenderResult { renderer, progress }
        }

        fn capabilities(&self) -> Capabilities {
            self.caps.clone()
        }

        fn supported_extensions(&self) -> Vec<String> {
            self.exts.clone()
        }
    }

    fn composite() -> CompositeRendererFactory {
        CompositeRendererFactory::new(vec![
            Stub::shared("first", &["render/a", "shared"], &["a", "txt"]),
            Stub::shared("second", &["render/b", "shared"], &["b", "txt"]),
            Stub::shared("third", &["render/c"], &["c"]),
        ])
    }

    #[test]
    fn test_unions_are_deduplicated() {
        let factory = composite();
        assert_eq!(
            factory.capabilities().to_string_list(),
            vec!["render/a", "shared", "render/b", "render/c"]
        );
        assert_eq!(factory.supported_extensions(), vec!["a", "txt", "b", "c"]);
    }

    #[tokio::test]
    async fn test_last_factory_wins_on_overlap() {
        let result = composite().create_renderer(&Capabilities::from_names(["shared"]));
        let router = result.renderer.await.unwrap();

        assert_eq!(router.render("x.a", "").unwrap(), "first");
        assert_eq!(router.render("x.b", "").unwrap(), "second");
        assert_eq!(router.render("x.txt", "").unwrap(), "second");
        assert!(matches!(
            router.render("x.c", ""),
            Err(RenderError::UnsupportedType(ext)) if ext == "c"
        ));
    }

    #[tokio::test]
    async fn test_progress_merges_participants_only() {
        let result = composite().create_renderer(&Capabilities::from_names(["render/a", "render/c"]));
        result.renderer.await.unwrap();

        let events = result.progress.collect().await;
        assert_eq!(events.len(), 4);
        assert!(events.iter().all(|e| e.renderer_name != "second"));
        for name in ["first", "third"] {
            let own: Vec<f64> = events
                .iter()
                .filter(|e| e.renderer_name == name)
                .map(|e| e.progress)
                .collect();
            assert_eq!(own, vec![0.0, 100.0]);
        }
    }

    #[tokio::test]
    async fn test_nothing_requested_yields_empty_router() {
        let result = composite().create_renderer(&Capabilities::new());
        let router = result.renderer.await.unwrap();
        assert!(matches!(
            router.render("x.a", ""),
            Err(RenderError::UnsupportedType(_))
        ));
        assert!(result.progress.collect().await.is_empty());
    }
}
