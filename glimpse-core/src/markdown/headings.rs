//! Heading ids, anchors and the `[[toc]]` table of contents.

use super::{boxed, html_escape, merge_text, MarkdownPlugin};
use crate::slug::SlugCounter;
use pulldown_cmark::{Event, Tag, TagEnd};

#[derive(Debug, Clone, PartialEq)]
struct TocItem {
    level: u32,
    title: String,
    id: String,
}

/// Give every heading an id, keeping explicit `{#id}` ids and suffixing repeats.
fn assign_ids(events: &mut [Event<'_>]) -> Vec<TocItem> {
    let mut counter = SlugCounter::new();
    for event in events.iter() {
        if let Event::Start(Tag::Heading { id: Some(id), .. }) = event {
            counter.reserve(id);
        }
    }

    let mut items = Vec::new();
    let mut i = 0;
    while i < events.len() {
        let Event::Start(Tag::Heading { level, .. }) = &events[i] else {
            i += 1;
            continue;
        };
        let level = *level as u32;

        let mut title = String::new();
        let mut j = i + 1;
        while j < events.len() && !matches!(events[j], Event::End(TagEnd::Heading(_))) {
            if let Event::Text(text) | Event::Code(text) = &events[j] {
                title.push_str(text);
            }
            j += 1;
        }

        if let Event::Start(Tag::Heading { id, .. }) = &mut events[i] {
            if id.is_none() {
                *id = Some(boxed(counter.unique(&title)));
            }
            items.push(TocItem {
                level,
                id: id.as_deref().unwrap_or_default().to_string(),
                title,
            });
        }
        i = j;
    }
    items
}

/// Slug ids plus a trailing `#` link on every heading.
#[derive(Debug, Clone, Default)]
pub struct HeadingAnchorPlugin;

impl HeadingAnchorPlugin {
    pub fn new() -> Self {
        Self
    }
}

impl MarkdownPlugin for HeadingAnchorPlugin {
    fn name(&self) -> &str {
        "heading-anchor"
    }

    fn transform<'a>(&self, mut events: Vec<Event<'a>>) -> Vec<Event<'a>> {
        assign_ids(&mut events);

        let mut out = Vec::with_capacity(events.len());
        let mut current: Option<String> = None;
        for event in events {
            match event {
                Event::Start(Tag::Heading { ref id, .. }) => {
                    current = id.as_ref().map(|s| s.to_string());
                    out.push(event);
                }
                Event::End(TagEnd::Heading(_)) => {
                    if let Some(id) = current.take() {
                        out.push(Event::Html(boxed(format!(
                            r##"<a class="heading-anchor" href="#{}" aria-label="Link to heading">#</a>"##,
                            html_escape(&id)
                        ))));
                    }
                    out.push(event);
                }
                other => out.push(other),
            }
        }
        out
    }
}

/// Replaces a paragraph consisting of `[[toc]]` with a list of the headings.
#[derive(Debug, Clone, Default)]
pub struct TocPlugin;

impl TocPlugin {
    pub fn new() -> Self {
        Self
    }
}

fn render_toc(items: &[TocItem]) -> String {
    let mut html = String::from("<nav class=\"toc\"><ul>");
    for item in items {
        html.push_str(&format!(
            r##"<li class="toc-level-{}"><a href="#{}">{}</a></li>"##,
            item.level,
            html_escape(&item.id),
            html_escape(&item.title)
        ));
    }
    html.push_str("</ul></nav>\n");
    html
}

fn is_toc_marker(event: &Event<'_>) -> bool {
    matches!(event, Event::Text(text) if text.trim().eq_ignore_ascii_case("[[toc]]"))
}

impl MarkdownPlugin for TocPlugin {
    fn name(&self) -> &str {
        "toc"
    }

    fn transform<'a>(&self, events: Vec<Event<'a>>) -> Vec<Event<'a>> {
        let mut events = merge_text(events);
        let marker_at = |events: &[Event<'a>], i: usize| {
            matches!(events.get(i), Some(Event::Start(Tag::Paragraph)))
                && events.get(i + 1).is_some_and(is_toc_marker)
                && matches!(events.get(i + 2), Some(Event::End(TagEnd::Paragraph)))
        };
        if !(0..events.len()).any(|i| marker_at(&events, i)) {
            return events;
        }

        let items = assign_ids(&mut events);
        let mut out = Vec::with_capacity(events.len());
        let mut i = 0;
        while i < events.len() {
            if marker_at(&events, i) {
                if !items.is_empty() {
                    out.push(Event::Html(boxed(render_toc(&items))));
                }
                i += 3;
                continue;
            }
            out.push(events[i].clone());
            i += 1;
        }
        out
    }
}
