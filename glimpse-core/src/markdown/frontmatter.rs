//! YAML frontmatter.
//!
//! A leading `---` block is parsed as YAML and removed from the body. When it
//! carries a `title`, the title is rendered as a header.

use super::{boxed, html_escape, MarkdownPlugin};
use pulldown_cmark::{Event, Options, Tag, TagEnd};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
struct Frontmatter {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct FrontmatterPlugin;

impl FrontmatterPlugin {
    pub fn new() -> Self {
        Self
    }

    fn header(&self, yaml: &str) -> Option<String> {
        let meta: Frontmatter = match serde_yaml::from_str(yaml) {
            Ok(meta) => meta,
            Err(err) => {
                tracing::warn!(%err, "ignoring malformed frontmatter");
                return None;
            }
        };

        let title = meta.title.filter(|t| !t.trim().is_empty())?;
        let mut html = String::from(r#"<header class="frontmatter">"#);
        html.push_str(&format!(r#"<h1 class="title">{}</h1>"#, html_escape(title.trim())));
        if let Some(description) = meta.description.filter(|d| !d.trim().is_empty()) {
            html.push_str(&format!(
                r#"<p class="description">{}</p>"#,
                html_escape(description.trim())
            ));
        }
        html.push_str("</header>\n");
        Some(html)
    }
}

impl MarkdownPlugin for FrontmatterPlugin {
    fn name(&self) -> &str {
        "frontmatter"
    }

    fn options(&self) -> Options {
        Options::ENABLE_YAML_STYLE_METADATA_BLOCKS
    }

    fn transform<'a>(&self, events: Vec<Event<'a>>) -> Vec<Event<'a>> {
        let mut out = Vec::with_capacity(events.len());
        let mut yaml: Option<String> = None;

        for event in events {
            match event {
                Event::Start(Tag::MetadataBlock(_)) => yaml = Some(String::new()),
                Event::End(TagEnd::MetadataBlock(_)) => {
                    if let Some(header) = yaml.take().and_then(|y| self.header(&y)) {
                        out.push(Event::Html(boxed(header)));
                    }
                }
                Event::Text(text) if yaml.is_some() => {
                    if let Some(buf) = yaml.as_mut() {
                        buf.push_str(&text);
                    }
                }
                other => out.push(other),
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown::MarkdownRenderer;

    fn render(source: &str) -> String {
        MarkdownRenderer::new(vec![Box::new(FrontmatterPlugin::new())]).to_html(source)
    }

    #[test]
    fn test_title_becomes_header() {
        let html = render("---\ntitle: Notes & Ideas\ndescription: Scratch\n---\n\nBody\n");
        assert!(html.contains(r#"<h1 class="title">Notes &amp; Ideas</h1>"#));
        assert!(html.contains(r#"<p class="description">Scratch</p>"#));
        assert!(html.contains("<p>Body</p>"));
        assert!(!html.contains("title:"));
    }

    #[test]
    fn test_block_without_title_is_dropped() {
        let html = render("---\ntags: [a, b]\n---\n\nBody\n");
        assert!(!html.contains("tags"));
        assert!(!html.contains("<header"));
        assert!(html.contains("<p>Body</p>"));
    }

    #[test]
    fn test_malformed_yaml_is_dropped() {
        let html = render("---\ntitle: [unclosed\n---\n\nBody\n");
        assert!(!html.contains("<header"));
        assert!(html.contains("<p>Body</p>"));
    }
}
