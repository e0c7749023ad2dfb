//! Open absolute web links outside the preview.

use super::{boxed, html_escape, MarkdownPlugin};
use pulldown_cmark::{Event, Tag, TagEnd};

#[derive(Debug, Clone, Default)]
pub struct ExternalLinkPlugin;

impl ExternalLinkPlugin {
    pub fn new() -> Self {
        Self
    }
}

fn is_external(url: &str) -> bool {
    let lower = url.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

impl MarkdownPlugin for ExternalLinkPlugin {
    fn name(&self) -> &str {
        "external-link"
    }

    fn transform<'a>(&self, events: Vec<Event<'a>>) -> Vec<Event<'a>> {
        let mut out = Vec::with_capacity(events.len());
        let mut open: Vec<bool> = Vec::new();

        for event in events {
            match event {
                Event::Start(Tag::Link {
                    ref dest_url,
                    ref title,
                    ..
                }) => {
                    if is_external(dest_url) {
                        let title = if title.is_empty() {
                            String::new()
                        } else {
                            format!(r#" title="{}""#, html_escape(title))
                        };
                        out.push(Event::InlineHtml(boxed(format!(
                            r#"<a href="{}"{} target="_blank" rel="noopener">"#,
                            html_escape(dest_url),
                            title
                        ))));
                        open.push(true);
                    } else {
                        open.push(false);
                        out.push(event);
                    }
                }
                Event::End(TagEnd::Link) => {
                    if open.pop().unwrap_or(false) {
                        out.push(Event::InlineHtml(boxed("</a>".to_string())));
                    } else {
                        out.push(event);
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
        MarkdownRenderer::new(vec![Box::new(ExternalLinkPlugin::new())]).to_html(source)
    }

    #[test]
    fn test_external_gets_target() {
        let html = render(r#"[site](https://example.com/a?b=1&c=2 "Home")"#);
        assert_eq!(
            html,
            "<p><a href=\"https://example.com/a?b=1&amp;c=2\" title=\"Home\" target=\"_blank\" rel=\"noopener\">site</a></p>\n"
        );
    }

    #[test]
    fn test_relative_untouched() {
        let html = render("[local](notes/a.md) and <https://auto.link>");
        assert!(html.contains(r#"<a href="notes/a.md">local</a>"#));
        assert!(html.contains(r#"<a href="https://auto.link" target="_blank" rel="noopener">"#));
    }
}
