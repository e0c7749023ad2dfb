//! # glimpse-core
//!
//! Core library for the glimpse markdown preview engine.
//!
//! This crate provides the pieces the engine renders with:
//! - a layered filesystem (physical disk, in-memory overlay, fallback composite)
//! - markdown plugins and the plugin-composing renderer
//! - renderer factories with replaying initialization progress
//! - configuration loading

pub mod config;
pub mod fs;
pub mod markdown;
pub mod progress;
pub mod render;
pub mod slug;

pub use config::{ConfigError, EngineConfig, MarkdownConfig};
pub use fs::{
    CompositeFileSystem, Encoding, FsError, InMemoryFileSystem, PhysicalFileSystem, Reader, Writer,
};
pub use markdown::{MarkdownPlugin, MarkdownRenderer, PluginDescriptor};
pub use progress::{ProgressEvent, ProgressStream};
pub use render::{
    CompositeRendererFactory, MarkdownRendererFactory, PendingRenderer, RenderError,
    RenderResult, Renderer, RendererFactory, RendererRouter,
};
pub use slug::slugify;
