//! AWS S3 storage implementation.
//!
//! Snapshots live at `s3://{bucket}/{key}`. Credentials come from the AWS
//! default provider chain (`AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`,
//! profiles, instance roles).

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;

use crate::error::{AppError, Result};
use crate::models::StorageConfig;
use crate::storage::SnapshotStore;

/// S3-backed snapshot storage.
pub struct S3Storage {
    client: Client,
    bucket: String,
}

impl S3Storage {
    /// Create a new S3 storage instance.
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Create S3 storage for the configured bucket and region.
    pub async fn from_config(config: &StorageConfig) -> Self {
        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()))
            .load()
            .await;
        Self::new(Client::new(&sdk_config), &config.bucket)
    }
}

#[async_trait]
impl SnapshotStore for S3Storage {
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        match result {
            Ok(output) => {
                let bytes = output
                    .body
                    .collect()
                    .await
                    .map_err(|e| AppError::store(format!("{}: {e}", self.location(key))))?;
                Ok(Some(bytes.into_bytes().to_vec()))
            }
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_no_such_key() {
                    log::info!("No existing data at {}", self.location(key));
                    Ok(None)
                } else {
                    Err(AppError::store(format!(
                        "{}: {}",
                        self.location(key),
                        DisplayErrorContext(&service_err)
                    )))
                }
            }
        }
    }

    async fn store(&self, key: &str, bytes: &[u8]) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes.to_vec()))
            .content_type("text/csv")
            .send()
            .await
            .map_err(|e| {
                AppError::store(format!("{}: {}", self.location(key), DisplayErrorContext(&e)))
            })?;

        log::info!("Wrote {} bytes to {}", bytes.len(), self.location(key));
        Ok(())
    }

    fn location(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket, key)
    }
}
