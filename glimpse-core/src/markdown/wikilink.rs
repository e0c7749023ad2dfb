//! `[[target]]` and `[[target|text]]` links.

use super::{boxed, html_escape, merge_text, MarkdownPlugin};
use crate::slug::slugify;
use pulldown_cmark::{Event, Tag, TagEnd};

#[derive(Debug, Clone)]
pub struct WikilinkPlugin {
    base_url: String,
}

impl WikilinkPlugin {
    /// `base_url` must already carry leading and trailing slashes.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    fn href(&self, target: &str) -> String {
        let (path, fragment) = match target.split_once('#') {
            Some((path, fragment)) => (path, Some(fragment)),
            None => (target, None),
        };

        let slug = path
            .split('/')
            .map(slugify)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("/");

        let mut href = format!("{}{}", self.base_url, slug);
        if let Some(fragment) = fragment.map(slugify).filter(|f| !f.is_empty()) {
            href.push('#');
            href.push_str(&fragment);
        }
        href
    }

    fn link(&self, inner: &str) -> String {
        let (target, display) = match inner.split_once('|') {
            Some((target, display)) => (target.trim(), display.trim()),
            None => (inner.trim(), inner.trim()),
        };
        format!(
            r#"<a class="wikilink" href="{}">{}</a>"#,
            html_escape(&self.href(target)),
            html_escape(display)
        )
    }

    fn expand<'a>(&self, text: &str, out: &mut Vec<Event<'a>>) {
        let mut rest = text;
        let mut literal = String::new();
        while let Some(start) = rest.find("[[") {
            let Some(len) = rest[start + 2..].find("]]") else {
                break;
            };
            let end = start + 2 + len + 2;
            let inner = &rest[start + 2..start + 2 + len];
            if inner.trim().is_empty() {
                // Empty brackets stay as text; scanning resumes after them.
                literal.push_str(&rest[..end]);
                rest = &rest[end..];
                continue;
            }
            literal.push_str(&rest[..start]);
            if !literal.is_empty() {
                out.push(Event::Text(boxed(std::mem::take(&mut literal))));
            }
            out.push(Event::InlineHtml(boxed(self.link(inner))));
            rest = &rest[end..];
        }
        literal.push_str(rest);
        if !literal.is_empty() {
            out.push(Event::Text(boxed(literal)));
        }
    }
}

impl MarkdownPlugin for WikilinkPlugin {
    fn name(&self) -> &str {
        "wikilink"
    }

    fn transform<'a>(&self, events: Vec<Event<'a>>) -> Vec<Event<'a>> {
        let mut out = Vec::with_capacity(events.len());
        let mut in_code = false;

        for event in merge_text(events) {
            match event {
                Event::Start(Tag::CodeBlock(_)) => {
                    in_code = true;
                    out.push(event);
                }
                Event::End(TagEnd::CodeBlock) => {
                    in_code = false;
                    out.push(event);
                }
                Event::Text(text) if !in_code && text.contains("[[") => {
                    self.expand(&text, &mut out);
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

    fn render(base: &str, source: &str) -> String {
        MarkdownRenderer::new(vec![Box::new(WikilinkPlugin::new(base))]).to_html(source)
    }

    #[test]
    fn test_simple_link() {
        let html = render("/", "See [[Garden Log]].");
        assert_eq!(
            html,
            "<p>See <a class=\"wikilink\" href=\"/garden-log\">Garden Log</a>.</p>\n"
        );
    }

    #[test]
    fn test_alias_fragment_and_base() {
        let html = render("/wiki/", "[[Plants/Ferns#Watering Guide|water ferns]]");
        assert!(html.contains(
            r#"<a class="wikilink" href="/wiki/plants/ferns#watering-guide">water ferns</a>"#
        ));
    }

    #[test]
    fn test_multiple_links_in_one_line() {
        let html = render("/", "[[A]] and [[B]]");
        assert_eq!(html.matches("class=\"wikilink\"").count(), 2);
        assert!(html.contains("</a> and <a"));
    }

    #[test]
    fn test_unclosed_and_code_are_literal() {
        let html = render("/", "open [[ended\n\n```\n[[code]]\n```\n");
        assert!(html.contains("open [[ended"));
        assert!(html.contains("[[code]]"));
        assert!(!html.contains("wikilink"));
    }

    #[test]
    fn test_empty_brackets_do_not_stop_later_links() {
        let html = render("/", "[[ ]] and [[A]]");
        assert_eq!(
            html,
            "<p>[[ ]] and <a class=\"wikilink\" href=\"/a\">A</a></p>\n"
        );
    }
}
