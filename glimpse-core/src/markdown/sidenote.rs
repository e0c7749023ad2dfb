//! Inline `[^sidenote: text]` notes, numbered per document.

use super::{boxed, html_escape, merge_text, MarkdownPlugin};
use pulldown_cmark::{Event, Tag, TagEnd};

const MARKER: &str = "[^sidenote:";

#[derive(Debug, Clone, Default)]
pub struct SidenotePlugin;

impl SidenotePlugin {
    pub fn new() -> Self {
        Self
    }
}

fn expand<'a>(text: &str, counter: &mut usize, out: &mut Vec<Event<'a>>) {
    let mut rest = text;
    while let Some(start) = rest.find(MARKER) {
        let body_start = start + MARKER.len();
        let Some(len) = rest[body_start..].find(']') else {
            break;
        };
        if start > 0 {
            out.push(Event::Text(boxed(rest[..start].to_string())));
        }
        *counter += 1;
        out.push(Event::InlineHtml(boxed(format!(
            r#"<span class="sidenote"><span class="sidenote-number">{}</span>{}</span>"#,
            counter,
            html_escape(rest[body_start..body_start + len].trim())
        ))));
        rest = &rest[body_start + len + 1..];
    }
    if !rest.is_empty() {
        out.push(Event::Text(boxed(rest.to_string())));
    }
}

impl MarkdownPlugin for SidenotePlugin {
    fn name(&self) -> &str {
        "sidenote"
    }

    fn transform<'a>(&self, events: Vec<Event<'a>>) -> Vec<Event<'a>> {
        let mut out = Vec::with_capacity(events.len());
        let mut counter = 0;
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
                Event::Text(text) if !in_code && text.contains(MARKER) => {
                    expand(&text, &mut counter, &mut out);
                }
                other => out.push(other),
            }
        }
        out
    }
}
