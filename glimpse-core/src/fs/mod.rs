//! Layered filesystem used by the renderers.
//!
//! Reads go through a [`CompositeFileSystem`] that prefers the in-memory
//! overlay (files pushed by the host) and falls back to the physical disk.
//! Only the overlay accepts writes.

pub mod composite;
pub mod memory;
pub mod physical;

pub use composite::CompositeFileSystem;
pub use memory::InMemoryFileSystem;
pub use physical::PhysicalFileSystem;

use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FsError {
    #[error("File not found: {path}")]
    NotFound { path: String },

    #[error("Encoding mismatch for {path}: stored as {stored}, requested {requested}")]
    EncodingMismatch {
        path: String,
        stored: Encoding,
        requested: Encoding,
    },

    #[error("Path {path} is outside the root directory")]
    OutsideRoot { path: String },

    #[error("Unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    #[error("Content of {path} is not valid {encoding}")]
    Decode { path: String, encoding: Encoding },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl FsError {
    pub fn not_found(path: impl Into<String>) -> Self {
        FsError::NotFound { path: path.into() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, FsError::NotFound { .. })
    }
}

/// Text encodings a stored or physical file can be read with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Encoding {
    #[default]
    Utf8,
    Latin1,
    Ascii,
}

impl Encoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            Encoding::Utf8 => "utf-8",
            Encoding::Latin1 => "latin1",
            Encoding::Ascii => "ascii",
        }
    }

    /// Decode raw bytes; `None` when the bytes are not valid in this encoding.
    pub fn decode(&self, bytes: &[u8]) -> Option<String> {
        match self {
            Encoding::Utf8 => String::from_utf8(bytes.to_vec()).ok(),
            Encoding::Latin1 => Some(bytes.iter().map(|&b| b as char).collect()),
            Encoding::Ascii => {
                if bytes.is_ascii() {
                    Some(bytes.iter().map(|&b| b as char).collect())
                } else {
                    None
                }
            }
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Encoding {
    type Err = FsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(Encoding::Utf8),
            "latin1" | "latin-1" | "iso-8859-1" | "binary" => Ok(Encoding::Latin1),
            "ascii" | "us-ascii" => Ok(Encoding::Ascii),
            other => Err(FsError::UnsupportedEncoding(other.to_string())),
        }
    }
}

/// Read access to a filesystem layer.
#[async_trait]
pub trait Reader: Send + Sync {
    async fn read_file(&self, path: &str, encoding: Encoding) -> Result<String, FsError>;
}

/// Write access to a filesystem layer.
#[async_trait]
pub trait Writer: Send + Sync {
    async fn write_file(&self, path: &str, content: String, encoding: Encoding)
        -> Result<(), FsError>;

    /// Remove a file. Removing a missing path succeeds.
    async fn delete_file(&self, path: &str) -> Result<(), FsError>;

    /// Move a file to a new path, replacing anything stored there.
    async fn rename_file(&self, old_path: &str, new_path: &str) -> Result<(), FsError>;
}
