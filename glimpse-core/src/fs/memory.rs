//! Virtual overlay holding files pushed by the host.

use super::{Encoding, FsError, Reader, Writer};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
struct StoredFile {
    content: String,
    encoding: Encoding,
}

/// In-memory filesystem keyed by path.
#[derive(Debug, Default)]
pub struct InMemoryFileSystem {
    files: RwLock<HashMap<String, StoredFile>>,
}

impl InMemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exists(&self, path: &str) -> bool {
        self.files.read().contains_key(path)
    }

    /// Stored paths, sorted.
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.files.read().keys().cloned().collect();
        paths.sort();
        paths
    }
}

#[async_trait]
impl Reader for InMemoryFileSystem {
    async fn read_file(&self, path: &str, encoding: Encoding) -> Result<String, FsError> {
        let files = self.files.read();
        let stored = files.get(path).ok_or_else(|| FsError::not_found(path))?;
        if stored.encoding != encoding {
            return Err(FsError::EncodingMismatch {
                path: path.to_string(),
                stored: stored.encoding,
                requested: encoding,
            });
        }
        Ok(stored.content.clone())
    }
}

#[async_trait]
impl Writer for InMemoryFileSystem {
    async fn write_file(
        &self,
        path: &str,
        content: String,
        encoding: Encoding,
    ) -> Result<(), FsError> {
        tracing::trace!(%path, %encoding, bytes = content.len(), "overlay write");
        self.files
            .write()
            .insert(path.to_string(), StoredFile { content, encoding });
        Ok(())
    }

    async fn delete_file(&self, path: &str) -> Result<(), FsError> {
        self.files.write().remove(path);
        Ok(())
    }

    async fn rename_file(&self, old_path: &str, new_path: &str) -> Result<(), FsError> {
        let mut files = self.files.write();
        let stored = files
            .remove(old_path)
            .ok_or_else(|| FsError::not_found(old_path))?;
        files.insert(new_path.to_string(), stored);
        Ok(())
    }
}
