//! GitHub-style alerts.
//!
//! ```markdown
//! > [!WARNING]
//! > Mind the gap.
//! ```
//!
//! becomes a `div.markdown-alert.markdown-alert-warning` with a title line.

use super::{boxed, MarkdownPlugin};
use pulldown_cmark::{BlockQuoteKind, Event, Options, Tag, TagEnd};

#[derive(Debug, Clone, Default)]
pub struct AlertPlugin;

impl AlertPlugin {
    pub fn new() -> Self {
        Self
    }
}

fn kind_parts(kind: BlockQuoteKind) -> (&'static str, &'static str) {
    match kind {
        BlockQuoteKind::Note => ("note", "Note"),
        BlockQuoteKind::Tip => ("tip", "Tip"),
        BlockQuoteKind::Important => ("important", "Important"),
        BlockQuoteKind::Warning => ("warning", "Warning"),
        BlockQuoteKind::Caution => ("caution", "Caution"),
        #[allow(unreachable_patterns)]
        _ => ("note", "Note"),
    }
}

impl MarkdownPlugin for AlertPlugin {
    fn name(&self) -> &str {
        "alert"
    }

    fn options(&self) -> Options {
        Options::ENABLE_GFM
    }

    fn transform<'a>(&self, events: Vec<Event<'a>>) -> Vec<Event<'a>> {
        let mut out = Vec::with_capacity(events.len());
        // One entry per open blockquote: true when it was rewritten as an alert.
        let mut open: Vec<bool> = Vec::new();

        for event in events {
            match event {
                Event::Start(Tag::BlockQuote(Some(kind))) => {
                    let (class, title) = kind_parts(kind);
                    open.push(true);
                    out.push(Event::Html(boxed(format!(
                        "<div class=\"markdown-alert markdown-alert-{class}\">\n\
                         <p class=\"markdown-alert-title\">{title}</p>\n"
                    ))));
                }
                Event::Start(Tag::BlockQuote(None)) => {
                    open.push(false);
                    out.push(event);
                }
                Event::End(TagEnd::BlockQuote(_)) => {
                    if open.pop().unwrap_or(false) {
                        out.push(Event::Html(boxed("</div>\n".to_string())));
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
