//! Durable blob storage
//!
//! This module provides the storage boundary used by export and drift
//! normalization:
//!
//! - [`traits`] - the [`BlobStore`] trait
//! - [`object`] - an `object_store`-backed implementation (GCS, local, memory)
//! - [`retry`] - deadline-bounded exponential backoff over classified errors

pub mod object;
pub mod retry;
pub mod traits;

pub use object::{classify_object_store_error, ObjectBlobStore};
pub use retry::{with_backoff, Outcome, RetryPolicy};
pub use traits::BlobStore;

use crate::config::StorageConfig;
use crate::domain::{Result, StowageError};
use std::sync::Arc;

/// Create a blob store based on the configured URL scheme
///
/// # Errors
///
/// Returns a configuration error if the URL cannot be parsed, the scheme is
/// unsupported, or the backend client cannot be built.
pub fn create_blob_store(config: &StorageConfig) -> Result<Arc<dyn BlobStore>> {
    let url = url::Url::parse(&config.url).map_err(|e| {
        StowageError::Configuration(format!("Invalid storage.url '{}': {e}", config.url))
    })?;
    let policy = RetryPolicy::from_config(&config.retry);

    let store = match url.scheme() {
        "gs" => {
            tracing::info!(url = %config.url, "Creating GCS blob store");
            ObjectBlobStore::gcs(config)?
        }
        "file" => {
            let root = url.to_file_path().map_err(|_| {
                StowageError::Configuration(format!(
                    "storage.url '{}' is not an absolute file path",
                    config.url
                ))
            })?;
            tracing::info!(root = %root.display(), "Creating local blob store");
            ObjectBlobStore::local(root)?
                .with_policy(policy)
                .with_part_size(config.chunk_bytes())
        }
        "memory" => {
            tracing::info!("Creating in-memory blob store");
            ObjectBlobStore::in_memory()
                .with_policy(policy)
                .with_part_size(config.chunk_bytes())
        }
        other => {
            return Err(StowageError::Configuration(format!(
                "Unsupported storage.url scheme '{other}'"
            )))
        }
    };

    Ok(Arc::new(store))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_memory_store() {
        let config = StorageConfig::default();
        let store = create_blob_store(&config).unwrap();
        assert_eq!(store.describe(), "memory://");
    }

    #[test]
    fn test_create_local_store() {
        let dir = TempDir::new().unwrap();
        let config = StorageConfig {
            url: format!("file://{}", dir.path().display()),
            ..Default::default()
        };
        let store = create_blob_store(&config).unwrap();
        assert!(store.describe().starts_with("file://"));
    }

    #[test]
    fn test_unsupported_scheme() {
        let config = StorageConfig {
            url: "s3://bucket".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            create_blob_store(&config),
            Err(StowageError::Configuration(_))
        ));
    }
}
