//! `$inline$` and `$$display$$` math.
//!
//! The parser recognizes the delimiters; this plugin emits the TeX source in
//! spans a client-side typesetter can pick up.

use super::{boxed, html_escape, MarkdownPlugin};
use pulldown_cmark::{Event, Options};

#[derive(Debug, Clone, Default)]
pub struct MathPlugin;

impl MathPlugin {
    pub fn new() -> Self {
        Self
    }
}

impl MarkdownPlugin for MathPlugin {
    fn name(&self) -> &str {
        "math"
    }

    fn options(&self) -> Options {
        Options::ENABLE_MATH
    }

    fn transform<'a>(&self, events: Vec<Event<'a>>) -> Vec<Event<'a>> {
        events
            .into_iter()
            .map(|event| match event {
                Event::InlineMath(tex) => Event::InlineHtml(boxed(format!(
                    r#"<span class="math-inline">\({}\)</span>"#,
                    html_escape(&tex)
                ))),
                Event::DisplayMath(tex) => Event::InlineHtml(boxed(format!(
                    r#"<span class="math-display">\[{}\]</span>"#,
                    html_escape(&tex)
                ))),
                other => other,
            })
            .collect()
    }
}
