use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use tracing::info;

use super::{validate_path, BlobStore, StorageError};
use crate::models::blob::{mime_for_path, Blob};

/// Stores blobs as plain files below `root`. Content types are inferred from extensions.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        validate_path(path)?;
        Ok(self.root.join(path))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn read(&self, path: &str) -> Result<Option<Blob>, StorageError> {
        let file = self.resolve(path)?;
        match tokio::fs::read(&file).await {
            Ok(bytes) => Ok(Some(Blob::new(bytes, mime_for_path(path)))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn upload(&self, path: &str, blob: Blob) -> Result<(), StorageError> {
        let file = self.resolve(path)?;
        if let Some(parent) = file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&file, &blob.bytes).await?;
        info!("Stored {} bytes at {}", blob.size(), file.display());
        Ok(())
    }
}
