//! Heading slugs.

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;
use unicode_segmentation::UnicodeSegmentation;

fn hyphen_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"-+").expect("valid hyphen regex"))
}

/// Convert heading text to an anchor id.
///
/// Lowercases, maps whitespace and underscores to hyphens, drops punctuation
/// and symbols, keeps unicode letters, collapses hyphen runs.
///
/// ```
/// use glimpse_core::slugify;
///
/// assert_eq!(slugify("Getting Started"), "getting-started");
/// assert_eq!(slugify("What's new?"), "whats-new");
/// ```
pub fn slugify(input: &str) -> String {
    let cleaned: String = input
        .to_lowercase()
        .graphemes(true)
        .filter_map(|g| {
            let c = g.chars().next()?;
            if c.is_whitespace() || c == '_' {
                Some("-")
            } else if c == '-' || c.is_alphanumeric() {
                Some(g)
            } else {
                None
            }
        })
        .collect();

    hyphen_runs()
        .replace_all(&cleaned, "-")
        .trim_matches('-')
        .to_string()
}

/// Hands out unique slugs within one document.
///
/// Repeats get a numeric suffix: `intro`, `intro-1`, `intro-2`.
#[derive(Debug, Default)]
pub struct SlugCounter {
    seen: HashMap<String, usize>,
}

impl SlugCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an id that is already fixed (e.g. `{#custom}`) so later slugs avoid it.
    pub fn reserve(&mut self, id: &str) {
        self.seen.entry(id.to_string()).or_insert(0);
    }

    pub fn unique(&mut self, text: &str) -> String {
        let base = match slugify(text) {
            s if s.is_empty() => "section".to_string(),
            s => s,
        };

        let mut count = match self.seen.get(&base) {
            Some(&count) => count,
            None => {
                self.seen.insert(base.clone(), 0);
                return base;
            }
        };

        loop {
            count += 1;
            let candidate = format!("{base}-{count}");
            if !self.seen.contains_key(&candidate) {
                self.seen.insert(base, count);
                self.seen.insert(candidate.clone(), 0);
                return candidate;
            }
        }
    }
}
