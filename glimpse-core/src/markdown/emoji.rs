//! `:shortcode:` emoji.

use super::{boxed, MarkdownPlugin};
use pulldown_cmark::{Event, Tag, TagEnd};
use regex::{Captures, Regex};
use std::sync::OnceLock;

const SHORTCODES: &[(&str, &str)] = &[
    ("+1", "👍"),
    ("-1", "👎"),
    ("bug", "🐛"),
    ("bulb", "💡"),
    ("check", "✔️"),
    ("construction", "🚧"),
    ("eyes", "👀"),
    ("fire", "🔥"),
    ("heart", "❤️"),
    ("hourglass", "⌛"),
    ("info", "ℹ️"),
    ("joy", "😂"),
    ("lock", "🔒"),
    ("memo", "📝"),
    ("question", "❓"),
    ("rocket", "🚀"),
    ("seedling", "🌱"),
    ("smile", "😄"),
    ("sparkles", "✨"),
    ("star", "⭐"),
    ("tada", "🎉"),
    ("thinking", "🤔"),
    ("warning", "⚠️"),
    ("wave", "👋"),
    ("white_check_mark", "✅"),
    ("wrench", "🔧"),
    ("x", "❌"),
    ("zap", "⚡"),
];

fn shortcode_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r":([a-z0-9_+\-]+):").expect("valid shortcode regex"))
}

fn lookup(code: &str) -> Option<&'static str> {
    SHORTCODES
        .binary_search_by(|(name, _)| name.cmp(&code))
        .ok()
        .map(|i| SHORTCODES[i].1)
}

#[derive(Debug, Clone, Default)]
pub struct EmojiPlugin;

impl EmojiPlugin {
    pub fn new() -> Self {
        Self
    }

    pub fn replace(&self, text: &str) -> String {
        shortcode_regex()
            .replace_all(text, |caps: &Captures| match lookup(&caps[1]) {
                Some(emoji) => emoji.to_string(),
                None => caps[0].to_string(),
            })
            .into_owned()
    }
}

impl MarkdownPlugin for EmojiPlugin {
    fn name(&self) -> &str {
        "emoji"
    }

    fn transform<'a>(&self, events: Vec<Event<'a>>) -> Vec<Event<'a>> {
        let mut in_code = false;
        events
            .into_iter()
            .map(|event| match event {
                Event::Start(Tag::CodeBlock(_)) => {
                    in_code = true;
                    event
                }
                Event::End(TagEnd::CodeBlock) => {
                    in_code = false;
                    event
                }
                Event::Text(text) if !in_code && text.contains(':') => {
                    Event::Text(boxed(self.replace(&text)))
                }
                other => other,
            })
            .collect()
    }
}
