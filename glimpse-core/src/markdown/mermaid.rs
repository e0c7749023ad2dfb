//! ```` ```mermaid ```` fences handed to the client-side diagram renderer.

use super::{boxed, html_escape, MarkdownPlugin};
use pulldown_cmark::{CodeBlockKind, Event, Tag, TagEnd};

#[derive(Debug, Clone, Default)]
pub struct MermaidPlugin;

impl MermaidPlugin {
    pub fn new() -> Self {
        Self
    }
}

impl MarkdownPlugin for MermaidPlugin {
    fn name(&self) -> &str {
        "mermaid"
    }

    fn transform<'a>(&self, events: Vec<Event<'a>>) -> Vec<Event<'a>> {
        let mut out = Vec::with_capacity(events.len());
        let mut diagram: Option<String> = None;

        for event in events {
            match event {
                Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(ref info)))
                    if info.trim() == "mermaid" =>
                {
                    diagram = Some(String::new());
                }
                Event::Text(ref text) if diagram.is_some() => {
                    if let Some(source) = diagram.as_mut() {
                        source.push_str(text);
                    }
                }
                Event::End(TagEnd::CodeBlock) if diagram.is_some() => {
                    if let Some(source) = diagram.take() {
                        out.push(Event::Html(boxed(format!(
                            "<pre class=\"mermaid\">{}</pre>\n",
                            html_escape(&source)
                        ))));
                    }
                }
                other => out.push(other),
            }
        }
        out
    }
}
