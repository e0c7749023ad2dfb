//! Plugins that only switch on a parser extension.

use super::MarkdownPlugin;
use pulldown_cmark::Options;

/// Enables a `pulldown-cmark` extension without touching the events.
#[derive(Debug, Clone)]
pub struct OptionPlugin {
    name: &'static str,
    options: Options,
}

impl OptionPlugin {
    pub fn new(name: &'static str, options: Options) -> Self {
        Self { name, options }
    }
}

impl MarkdownPlugin for OptionPlugin {
    fn name(&self) -> &str {
        self.name
    }

    fn options(&self) -> Options {
        self.options
    }
}
