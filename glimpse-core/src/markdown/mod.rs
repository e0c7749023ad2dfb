//! Plugin-composed markdown rendering.
//!
//! Every markdown feature beyond plain CommonMark is a [`MarkdownPlugin`]:
//! it contributes parser options, rewrites the event stream, or both. The
//! [`PluginDescriptor`] table ties each plugin to its capability and an async
//! initializer so a renderer only pays for what the host asked for.

pub mod alert;
pub mod emoji;
pub mod extensions;
pub mod external_link;
pub mod frontmatter;
pub mod headings;
pub mod highlight;
pub mod math;
pub mod mermaid;
pub mod sidenote;
pub mod wikilink;

use crate::config::MarkdownConfig;
use crate::render::{RenderError, Renderer};
use futures::future::BoxFuture;
use glimpse_types::{CapabilityRegistry, RENDER_MARKDOWN, VERSION_1_0};
use pulldown_cmark::{html, CowStr, Event, Options, Parser};
use std::future::Future;
use std::sync::Arc;

pub use alert::AlertPlugin;
pub use emoji::EmojiPlugin;
pub use extensions::OptionPlugin;
pub use external_link::ExternalLinkPlugin;
pub use frontmatter::FrontmatterPlugin;
pub use headings::{HeadingAnchorPlugin, TocPlugin};
pub use highlight::HighlightPlugin;
pub use math::MathPlugin;
pub use mermaid::MermaidPlugin;
pub use sidenote::SidenotePlugin;
pub use wikilink::WikilinkPlugin;

/// One markdown feature.
pub trait MarkdownPlugin: Send + Sync {
    fn name(&self) -> &str;

    /// Parser options this plugin needs.
    fn options(&self) -> Options {
        Options::empty()
    }

    /// Rewrite the event stream. Runs after parsing, in table order.
    fn transform<'a>(&self, events: Vec<Event<'a>>) -> Vec<Event<'a>> {
        events
    }
}

pub type InitFuture = BoxFuture<'static, Result<Box<dyn MarkdownPlugin>, RenderError>>;

/// Capability name for a plugin: `render/markdown/<name>`.
pub fn plugin_capability(name: &str) -> String {
    format!("{RENDER_MARKDOWN}/{name}")
}

/// A plugin's name, capability and initializer.
#[derive(Clone)]
pub struct PluginDescriptor {
    name: String,
    capability: String,
    init: Arc<dyn Fn() -> InitFuture + Send + Sync>,
}

impl PluginDescriptor {
    pub fn new<F, Fut>(name: impl Into<String>, init: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Box<dyn MarkdownPlugin>, RenderError>> + Send + 'static,
    {
        let name = name.into();
        Self {
            capability: plugin_capability(&name),
            name,
            init: Arc::new(move || Box::pin(init())),
        }
    }

    /// Descriptor for a plugin that needs no asynchronous setup.
    pub fn ready<P>(plugin: P) -> Self
    where
        P: MarkdownPlugin + Clone + 'static,
    {
        let name = plugin.name().to_string();
        Self::new(name, move || {
            let plugin = plugin.clone();
            async move { Ok(Box::new(plugin) as Box<dyn MarkdownPlugin>) }
        })
    }

    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capability = capability.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capability(&self) -> &str {
        &self.capability
    }

    pub fn initialize(&self) -> InitFuture {
        (self.init)()
    }
}

impl std::fmt::Debug for PluginDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginDescriptor")
            .field("name", &self.name)
            .field("capability", &self.capability)
            .finish_non_exhaustive()
    }
}

/// The built-in plugin table, in transform order, minus disabled plugins.
pub fn builtin_plugins(config: &MarkdownConfig) -> Vec<PluginDescriptor> {
    let base_url = crate::config::normalize_base_url(&config.wikilink_base_url);
    let theme = config.highlight_theme.clone();

    let mut table = vec![
        PluginDescriptor::ready(FrontmatterPlugin::new()),
        PluginDescriptor::ready(OptionPlugin::new("table", Options::ENABLE_TABLES)),
        PluginDescriptor::ready(OptionPlugin::new("footnote", Options::ENABLE_FOOTNOTES)),
        PluginDescriptor::ready(OptionPlugin::new(
            "strikethrough",
            Options::ENABLE_STRIKETHROUGH,
        )),
        PluginDescriptor::ready(OptionPlugin::new("tasklist", Options::ENABLE_TASKLISTS)),
        PluginDescriptor::ready(OptionPlugin::new(
            "smart-punctuation",
            Options::ENABLE_SMART_PUNCTUATION,
        )),
        PluginDescriptor::ready(OptionPlugin::new(
            "heading-attributes",
            Options::ENABLE_HEADING_ATTRIBUTES,
        )),
        PluginDescriptor::ready(OptionPlugin::new(
            "definition-list",
            Options::ENABLE_DEFINITION_LIST,
        )),
        PluginDescriptor::ready(OptionPlugin::new("superscript", Options::ENABLE_SUPERSCRIPT)),
        PluginDescriptor::ready(OptionPlugin::new("subscript", Options::ENABLE_SUBSCRIPT)),
        PluginDescriptor::ready(MathPlugin::new()),
        PluginDescriptor::ready(AlertPlugin::new()),
        PluginDescriptor::ready(HeadingAnchorPlugin::new()),
        PluginDescriptor::ready(TocPlugin::new()),
        PluginDescriptor::ready(WikilinkPlugin::new(base_url)),
        PluginDescriptor::ready(SidenotePlugin::new()),
        PluginDescriptor::ready(EmojiPlugin::new()),
        PluginDescriptor::ready(MermaidPlugin::new()),
        PluginDescriptor::new(highlight::NAME, move || {
            HighlightPlugin::load_boxed(theme.clone())
        }),
        PluginDescriptor::ready(ExternalLinkPlugin::new()),
    ];

    table.retain(|d| !config.disabled_plugins.iter().any(|name| name == d.name()));
    table
}

/// Registry of every capability the engine can advertise for `descriptors`.
pub fn capability_registry(descriptors: &[PluginDescriptor]) -> CapabilityRegistry {
    let names = [VERSION_1_0.to_string(), RENDER_MARKDOWN.to_string()]
        .into_iter()
        .chain(descriptors.iter().map(|d| d.capability().to_string()));
    CapabilityRegistry::new(names)
}

/// Renders markdown with an initialized set of plugins.
pub struct MarkdownRenderer {
    plugins: Vec<Box<dyn MarkdownPlugin>>,
    options: Options,
}

impl MarkdownRenderer {
    pub fn new(plugins: Vec<Box<dyn MarkdownPlugin>>) -> Self {
        let options = plugins
            .iter()
            .fold(Options::empty(), |acc, plugin| acc | plugin.options());
        Self { plugins, options }
    }

    pub fn plugin_names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    pub fn to_html(&self, source: &str) -> String {
        let events: Vec<Event> = Parser::new_ext(source, self.options).collect();
        let events = self
            .plugins
            .iter()
            .fold(events, |events, plugin| plugin.transform(events));

        let mut output = String::with_capacity(source.len() * 3 / 2);
        html::push_html(&mut output, events.into_iter());
        output
    }
}

impl Renderer for MarkdownRenderer {
    fn render(&self, _path: &str, source: &str) -> Result<String, RenderError> {
        Ok(self.to_html(source))
    }
}

pub(crate) fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

pub(crate) fn boxed<'a>(text: String) -> CowStr<'a> {
    CowStr::Boxed(text.into_boxed_str())
}

/// Join adjacent `Text` events; the parser splits text at brackets.
pub(crate) fn merge_text(events: Vec<Event<'_>>) -> Vec<Event<'_>> {
    let mut out: Vec<Event> = Vec::with_capacity(events.len());
    for event in events {
        if let (Event::Text(text), Some(Event::Text(prev))) = (&event, out.last_mut()) {
            let mut joined = prev.to_string();
            joined.push_str(text);
            *prev = boxed(joined);
            continue;
        }
        out.push(event);
    }
    out
}
