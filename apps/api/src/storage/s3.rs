use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use tracing::info;

use super::{validate_path, BlobStore, StorageError};
use crate::models::blob::{mime_for_path, Blob};

#[derive(Clone)]
pub struct S3BlobStore {
    client: S3Client,
    bucket: String,
}

impl S3BlobStore {
    pub fn new(client: S3Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn read(&self, path: &str) -> Result<Option<Blob>, StorageError> {
        validate_path(path)?;

        let output = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
        {
            Ok(output) => output,
            Err(e) => {
                let missing = e
                    .as_service_error()
                    .map(|service| service.is_no_such_key())
                    .unwrap_or(false);
                if missing {
                    return Ok(None);
                }
                return Err(StorageError::S3(format!("download of {path} failed: {e}")));
            }
        };

        let content_type = output
            .content_type()
            .map(str::to_string)
            .unwrap_or_else(|| mime_for_path(path).to_string());
        let data = output
            .body
            .collect()
            .await
            .map_err(|e| StorageError::S3(format!("reading body of {path} failed: {e}")))?;

        Ok(Some(Blob::new(data.into_bytes(), content_type)))
    }

    async fn upload(&self, path: &str, blob: Blob) -> Result<(), StorageError> {
        validate_path(path)?;
        let size = blob.size();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(path)
            .body(ByteStream::from(blob.bytes.to_vec()))
            .content_type(blob.content_type)
            .send()
            .await
            .map_err(|e| StorageError::S3(format!("upload of {path} failed: {e}")))?;

        info!("Uploaded {size} bytes to s3://{}/{}", self.bucket, path);
        Ok(())
    }
}
