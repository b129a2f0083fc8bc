use crate::error::StorageError;
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};

/// Where generated artifacts (cover images, documents) end up.
///
/// Keys are relative, `/`-separated names such as `<book id>/cover.png`.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn write(&self, key: &str, bytes: &[u8]) -> Result<PathBuf, StorageError>;

    async fn read(&self, path: &Path) -> Result<Vec<u8>, StorageError>;
}

fn relative_key(key: &str) -> Result<PathBuf, StorageError> {
    let path = PathBuf::from(key);
    let plain = !key.is_empty()
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
    if plain {
        Ok(path)
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}

pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl Storage for FsStorage {
    async fn write(&self, key: &str, bytes: &[u8]) -> Result<PathBuf, StorageError> {
        let path = self.root.join(relative_key(key)?);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>, StorageError> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(path.display().to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
#[derive(Default)]
pub struct MemoryStorage {
    files: std::sync::Mutex<std::collections::HashMap<PathBuf, Vec<u8>>>,
}

#[cfg(test)]
impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(&self) -> Vec<PathBuf> {
        let files = self.files.lock().unwrap_or_else(|e| e.into_inner());
        let mut keys: Vec<_> = files.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[cfg(test)]
#[async_trait]
impl Storage for MemoryStorage {
    async fn write(&self, key: &str, bytes: &[u8]) -> Result<PathBuf, StorageError> {
        let path = relative_key(key)?;
        self.files
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(path.clone(), bytes.to_vec());
        Ok(path)
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>, StorageError> {
        self.files
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(path)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(path.display().to_string()))
    }
}
