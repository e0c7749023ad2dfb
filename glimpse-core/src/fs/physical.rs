//! Read-only access to files on disk.

use super::{Encoding, FsError, Reader};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};

/// Reads files from disk, resolving relative paths against an optional root.
#[derive(Debug, Clone, Default)]
pub struct PhysicalFileSystem {
    root: Option<PathBuf>,
}

impl PhysicalFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    /// Resolve `path` for reading.
    ///
    /// With a root, the result must stay inside it: absolute paths and `..`
    /// segments that lead elsewhere fail with [`FsError::OutsideRoot`].
    pub fn resolve(&self, path: &str) -> Result<PathBuf, FsError> {
        let Some(root) = &self.root else {
            return Ok(PathBuf::from(path));
        };
        let root = normalize(root);
        let resolved = normalize(&root.join(path));
        let inside = resolved
            .strip_prefix(&root)
            .is_ok_and(|rest| rest.components().all(|c| matches!(c, Component::Normal(_))));
        if inside {
            Ok(resolved)
        } else {
            Err(FsError::OutsideRoot {
                path: path.to_string(),
            })
        }
    }
}

/// Lexically fold `.` and `..` segments. Leading `..` of a relative path
/// are kept; `..` at the filesystem root is dropped.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    out
}

#[async_trait]
impl Reader for PhysicalFileSystem {
    async fn read_file(&self, path: &str, encoding: Encoding) -> Result<String, FsError> {
        let resolved = self.resolve(path)?;
        let bytes = tokio::fs::read(&resolved).await.map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                FsError::not_found(path)
            } else {
                FsError::Io {
                    path: resolved.display().to_string(),
                    source,
                }
            }
        })?;

        encoding.decode(&bytes).ok_or_else(|| FsError::Decode {
            path: path.to_string(),
            encoding,
        })
    }
}
