//! Blob storage for uploaded resumes and their preview images.
//!
//! `S3BlobStore` is used in production (AWS or MinIO); `LocalBlobStore`
//! keeps blobs under a directory for local development.

pub mod local;
pub mod s3;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::blob::Blob;

pub use local::LocalBlobStore;
pub use s3::S3BlobStore;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("S3 error: {0}")]
    S3(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid blob path: {0}")]
    InvalidPath(String),
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Returns `None` when nothing is stored at `path`.
    async fn read(&self, path: &str) -> Result<Option<Blob>, StorageError>;

    async fn upload(&self, path: &str, blob: Blob) -> Result<(), StorageError>;
}

/// Rejects absolute paths, empty segments and parent traversal.
pub fn validate_path(path: &str) -> Result<(), StorageError> {
    let bad = path.is_empty()
        || path.starts_with('/')
        || path.contains('\\')
        || path.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..");
    if bad {
        return Err(StorageError::InvalidPath(path.to_string()));
    }
    Ok(())
}

/// Reduces an uploaded file name to a single safe path segment.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_control() { '_' } else { c })
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        "resume.pdf".to_string()
    } else {
        cleaned.to_string()
    }
}
