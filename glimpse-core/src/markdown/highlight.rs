//! Fenced code highlighting with syntect.
//!
//! Loading the syntax and theme sets is the slowest part of renderer setup,
//! so it happens on a blocking task during plugin initialization and is
//! cached for the life of the process.

use super::{boxed, html_escape, MarkdownPlugin};
use crate::render::RenderError;
use pulldown_cmark::{CodeBlockKind, Event, Tag, TagEnd};
use std::sync::{Arc, OnceLock};
use syntect::highlighting::{Theme, ThemeSet};
use syntect::html::highlighted_html_for_string;
use syntect::parsing::SyntaxSet;

pub const NAME: &str = "highlight";

static SYNTAX_SET: OnceLock<SyntaxSet> = OnceLock::new();
static THEME_SET: OnceLock<ThemeSet> = OnceLock::new();

fn syntax_set() -> &'static SyntaxSet {
    SYNTAX_SET.get_or_init(SyntaxSet::load_defaults_newlines)
}

fn theme_set() -> &'static ThemeSet {
    THEME_SET.get_or_init(ThemeSet::load_defaults)
}

#[derive(Debug, Clone)]
pub struct HighlightPlugin {
    theme: Arc<Theme>,
}

impl HighlightPlugin {
    /// Blocking: may load the bundled syntax definitions.
    pub fn load(theme_name: &str) -> Result<Self, RenderError> {
        let theme = theme_set()
            .themes
            .get(theme_name)
            .ok_or_else(|| RenderError::PluginInit {
                plugin: NAME.to_string(),
                reason: format!("unknown highlight theme '{theme_name}'"),
            })?;
        syntax_set();
        tracing::debug!(theme = theme_name, "syntax highlighting ready");
        Ok(Self {
            theme: Arc::new(theme.clone()),
        })
    }

    pub async fn load_boxed(theme_name: String) -> Result<Box<dyn MarkdownPlugin>, RenderError> {
        let plugin = tokio::task::spawn_blocking(move || Self::load(&theme_name)).await??;
        Ok(Box::new(plugin))
    }

    fn highlight(&self, code: &str, lang: &str) -> String {
        let ss = syntax_set();
        let syntax = ss
            .find_syntax_by_token(lang)
            .unwrap_or_else(|| ss.find_syntax_plain_text());

        highlighted_html_for_string(code, ss, syntax, &self.theme).unwrap_or_else(|err| {
            tracing::debug!(%lang, %err, "highlighting failed, emitting plain block");
            format!("<pre><code>{}</code></pre>\n", html_escape(code))
        })
    }
}

fn fence_language(info: &str) -> Option<&str> {
    info.split([',', ' ', '{'])
        .next()
        .map(str::trim)
        .filter(|lang| !lang.is_empty())
}

impl MarkdownPlugin for HighlightPlugin {
    fn name(&self) -> &str {
        NAME
    }

    fn transform<'a>(&self, events: Vec<Event<'a>>) -> Vec<Event<'a>> {
        let mut out = Vec::with_capacity(events.len());
        let mut block: Option<(String, String)> = None;

        for event in events {
            match event {
                Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(ref info))) => {
                    match fence_language(info) {
                        Some(lang) => block = Some((lang.to_string(), String::new())),
                        None => out.push(event),
                    }
                }
                Event::Text(ref text) if block.is_some() => {
                    if let Some((_, code)) = block.as_mut() {
                        code.push_str(text);
                    }
                }
                Event::End(TagEnd::CodeBlock) if block.is_some() => {
                    if let Some((lang, code)) = block.take() {
                        out.push(Event::Html(boxed(self.highlight(&code, &lang))));
                    }
                }
                other => out.push(other),
            }
        }
        out
    }
}
