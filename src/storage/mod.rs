//! Storage abstractions for snapshot persistence.
//!
//! Snapshots are flat CSV objects addressed by key. Every run writes two
//! copies of the same bytes:
//!
//! ```text
//! {prefix}/
//! ├── qiita.csv               # Latest: overwritten on every run
//! ├── qiita-2016-03-08.csv    # Dated: one per day, never expired
//! └── qiita-2016-03-09.csv
//! ```

pub mod codec;
pub mod local;
#[cfg(feature = "s3")]
pub mod s3;

use async_trait::async_trait;

use crate::error::Result;
#[cfg(not(feature = "s3"))]
use crate::error::AppError;
use crate::models::{Backend, StorageConfig};

// Re-export for convenience
pub use local::LocalStorage;
#[cfg(feature = "s3")]
pub use s3::S3Storage;

/// Key/value object storage for encoded snapshots.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Read the object at `key`.
    ///
    /// Returns `Ok(None)` when the key does not exist; any other failure
    /// is an error.
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Write `bytes` at `key`, replacing any existing object.
    async fn store(&self, key: &str, bytes: &[u8]) -> Result<()>;

    /// Human-readable location of `key`, for logs.
    fn location(&self, key: &str) -> String;
}

/// Open the configured storage backend.
pub async fn open(config: &StorageConfig) -> Result<Box<dyn SnapshotStore>> {
    match config.backend {
        Backend::Local => Ok(Box::new(LocalStorage::new(&config.local_dir))),
        #[cfg(feature = "s3")]
        Backend::S3 => Ok(Box::new(S3Storage::from_config(config).await)),
        #[cfg(not(feature = "s3"))]
        Backend::S3 => Err(AppError::config(
            "storage backend 's3' requires the `s3` feature",
        )),
    }
}
