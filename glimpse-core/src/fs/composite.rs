//! Ordered fallback across several readers.

use super::{Encoding, FsError, Reader};
use async_trait::async_trait;
use std::sync::Arc;

/// Tries each reader in order and returns the first successful read.
#[derive(Clone, Default)]
pub struct CompositeFileSystem {
    readers: Vec<Arc<dyn Reader>>,
}

impl CompositeFileSystem {
    pub fn new(readers: Vec<Arc<dyn Reader>>) -> Self {
        Self { readers }
    }

    pub fn len(&self) -> usize {
        self.readers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readers.is_empty()
    }
}

#[async_trait]
impl Reader for CompositeFileSystem {
    async fn read_file(&self, path: &str, encoding: Encoding) -> Result<String, FsError> {
        for (layer, reader) in self.readers.iter().enumerate() {
            match reader.read_file(path, encoding).await {
                Ok(content) => return Ok(content),
                Err(err) => tracing::trace!(%path, layer, %err, "layer miss"),
            }
        }
        Err(FsError::not_found(path))
    }
}
