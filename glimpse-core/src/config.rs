//! Engine configuration loaded from `glimpse.yml`.

use crate::fs::Encoding;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Base directory for relative physical reads.
    #[serde(default)]
    pub root: Option<PathBuf>,

    /// Encoding used when reading files for preview.
    #[serde(default = "default_encoding")]
    pub encoding: String,

    #[serde(default)]
    pub markdown: MarkdownConfig,

    #[serde(skip)]
    config_path: Option<PathBuf>,
}

fn default_encoding() -> String {
    String::from("utf-8")
}

fn default_base_url() -> String {
    String::from("/")
}

fn default_highlight_theme() -> String {
    String::from("InspiredGitHub")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkdownConfig {
    #[serde(default = "default_base_url")]
    pub wikilink_base_url: String,

    #[serde(default = "default_highlight_theme")]
    pub highlight_theme: String,

    /// Plugin names removed from the plugin table.
    #[serde(default)]
    pub disabled_plugins: Vec<String>,
}

impl Default for MarkdownConfig {
    fn default() -> Self {
        Self {
            wikilink_base_url: default_base_url(),
            highlight_theme: default_highlight_theme(),
            disabled_plugins: Vec::new(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            root: None,
            encoding: default_encoding(),
            markdown: MarkdownConfig::default(),
            config_path: None,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml(&contents)?;
        config.config_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Like [`EngineConfig::from_file`], but a missing file yields the defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        Self::from_file(path)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes to unit, not a mapping.
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: EngineConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.encoding()?;
        if self.markdown.highlight_theme.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "markdown.highlight_theme must not be empty".into(),
            ));
        }
        Ok(())
    }

    pub fn encoding(&self) -> Result<Encoding, ConfigError> {
        self.encoding
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("unknown encoding '{}'", self.encoding)))
    }

    /// The physical root, resolved relative to the config file location.
    pub fn root_dir(&self) -> Option<PathBuf> {
        let root = self.root.as_ref()?;
        if root.is_absolute() {
            return Some(root.clone());
        }
        match self.config_path.as_ref().and_then(|p| p.parent()) {
            Some(parent) => Some(parent.join(root)),
            None => Some(root.clone()),
        }
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Normalized wikilink base URL ("/docs/" or "/").
    pub fn wikilink_base_url(&self) -> String {
        normalize_base_url(&self.markdown.wikilink_base_url)
    }
}

/// Ensure a base URL has one leading and one trailing slash.
pub fn normalize_base_url(raw: &str) -> String {
    let parts: Vec<&str> = raw.trim().split('/').filter(|s| !s.is_empty()).collect();
    if parts.is_empty() {
        return "/".to_string();
    }
    format!("/{}/", parts.join("/"))
}
