//! CLI command implementations.

pub mod capabilities;
pub mod render;
pub mod serve;

pub use capabilities::list_capabilities;
pub use render::render_file;
pub use serve::serve;

use anyhow::{Context, Result};
use glimpse_core::EngineConfig;
use std::path::Path;

/// Load the config file (defaults when absent) and apply `--root`.
pub fn load_config(config_path: &Path, root: Option<&Path>) -> Result<EngineConfig> {
    let config = EngineConfig::load_or_default(config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    Ok(match root {
        Some(root) => config.with_root(root),
        None => config,
    })
}
