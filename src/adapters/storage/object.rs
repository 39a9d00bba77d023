//! `object_store`-backed blob store
//!
//! One implementation covers Google Cloud Storage, the local filesystem and an
//! in-memory store. The client's own retry loop is switched off; every call is
//! wrapped in [`with_backoff`] so that the transient allow-list and the
//! wall-clock deadline are the only retry rules in play.

use super::retry::{with_backoff, RetryPolicy};
use super::traits::BlobStore;
use crate::config::StorageConfig;
use crate::domain::{Result, StorageError, StorageErrorKind, StowageError};
use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::multipart::{MultipartStore, PartId};
use object_store::path::Path as ObjectPath;
use object_store::{ClientOptions, ObjectStore, PutPayload};
use regex::Regex;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

/// Default upload part size (16 MiB)
pub const DEFAULT_PART_SIZE: usize = 16 * 1024 * 1024;

/// Blob store over any `object_store` backend
pub struct ObjectBlobStore {
    store: Arc<dyn ObjectStore>,
    multipart: Option<Arc<dyn MultipartStore>>,
    policy: RetryPolicy,
    part_size: usize,
    location: String,
}

impl ObjectBlobStore {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        multipart: Option<Arc<dyn MultipartStore>>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            store,
            multipart,
            policy: RetryPolicy::default(),
            part_size: DEFAULT_PART_SIZE,
            location: location.into(),
        }
    }

    /// In-memory store, supports multipart uploads
    pub fn in_memory() -> Self {
        let store = Arc::new(InMemory::new());
        Self::new(store.clone(), Some(store), "memory://")
    }

    /// Store rooted at a local directory, created if missing
    pub fn local(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        std::fs::create_dir_all(root).map_err(|e| {
            StowageError::Configuration(format!(
                "Failed to create storage directory {}: {e}",
                root.display()
            ))
        })?;
        let store = LocalFileSystem::new_with_prefix(root).map_err(|e| {
            StowageError::Configuration(format!(
                "Failed to open storage directory {}: {e}",
                root.display()
            ))
        })?;
        Ok(Self::new(
            Arc::new(store),
            None,
            format!("file://{}", root.display()),
        ))
    }

    /// Google Cloud Storage bucket named by `gs://<bucket>`
    ///
    /// Credentials come from the environment unless a service account key
    /// file is configured.
    pub fn gcs(config: &StorageConfig) -> Result<Self> {
        let url = url::Url::parse(&config.url)
            .map_err(|e| StowageError::Configuration(format!("Invalid storage.url: {e}")))?;
        let bucket = url
            .host_str()
            .filter(|b| !b.is_empty())
            .ok_or_else(|| {
                StowageError::Configuration(format!("No bucket in storage.url '{}'", config.url))
            })?
            .to_string();

        let client_options = ClientOptions::new()
            .with_connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .with_timeout(Duration::from_secs(config.read_timeout_seconds));

        // Retries are driven by `with_backoff`, not by the client.
        let client_retry = object_store::RetryConfig {
            max_retries: 0,
            ..Default::default()
        };

        let mut builder = GoogleCloudStorageBuilder::from_env()
            .with_bucket_name(&bucket)
            .with_client_options(client_options)
            .with_retry(client_retry);

        if let Some(path) = &config.service_account_path {
            tracing::debug!(path = %path, "Using service account key file");
            builder = builder.with_service_account_path(path);
        }

        let gcs = Arc::new(builder.build().map_err(|e| {
            StowageError::Configuration(format!("Failed to build GCS client: {e}"))
        })?);

        Ok(Self::new(gcs.clone(), Some(gcs), format!("gs://{bucket}"))
            .with_policy(RetryPolicy::from_config(&config.retry))
            .with_part_size(config.chunk_bytes()))
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_part_size(mut self, part_size: usize) -> Self {
        self.part_size = part_size.max(1);
        self
    }

    async fn put_with_retry(&self, path: &str, bytes: Bytes, operation: &str) -> Result<()> {
        let location = &ObjectPath::from(path);
        let store = self.store.as_ref();
        let bytes = &bytes;
        with_backoff(
            &self.policy,
            operation,
            StorageError::is_retryable,
            move || async move {
                store
                    .put(location, PutPayload::from(bytes.clone()))
                    .await
                    .map(|_| ())
                    .map_err(|e| to_storage_error(e, operation, path))
            },
        )
        .await?;
        Ok(())
    }

    async fn upload_multipart(
        &self,
        multipart: &dyn MultipartStore,
        path: &str,
        bytes: Bytes,
    ) -> Result<()> {
        let location = &ObjectPath::from(path);
        let upload_id = with_backoff(
            &self.policy,
            "create_multipart",
            StorageError::is_retryable,
            move || async move {
                multipart
                    .create_multipart(location)
                    .await
                    .map_err(|e| to_storage_error(e, "create_multipart", path))
            },
        )
        .await?;
        let upload_id = &upload_id;

        let total = bytes.len();
        let part_count = total.div_ceil(self.part_size);
        tracing::debug!(path, bytes = total, parts = part_count, "Starting multipart upload");

        let mut parts: Vec<PartId> = Vec::with_capacity(part_count);
        for idx in 0..part_count {
            let start = idx * self.part_size;
            let end = (start + self.part_size).min(total);
            let data = &bytes.slice(start..end);

            let part = with_backoff(
                &self.policy,
                "put_part",
                StorageError::is_retryable,
                move || async move {
                    multipart
                        .put_part(location, upload_id, idx, PutPayload::from(data.clone()))
                        .await
                        .map_err(|e| to_storage_error(e, "put_part", path))
                },
            )
            .await;

            match part {
                Ok(part) => parts.push(part),
                Err(err) => {
                    if let Err(abort_err) = multipart.abort_multipart(location, upload_id).await {
                        tracing::warn!(
                            path,
                            error = %abort_err,
                            "Failed to abort multipart upload"
                        );
                    }
                    return Err(err.into());
                }
            }
        }

        let parts = &parts;
        with_backoff(
            &self.policy,
            "complete_multipart",
            StorageError::is_retryable,
            move || async move {
                multipart
                    .complete_multipart(location, upload_id, parts.clone())
                    .await
                    .map(|_| ())
                    .map_err(|e| to_storage_error(e, "complete_multipart", path))
            },
        )
        .await?;

        Ok(())
    }
}

#[async_trait]
impl BlobStore for ObjectBlobStore {
    async fn exists(&self, path: &str) -> Result<bool> {
        let location = &ObjectPath::from(path);
        let store = self.store.as_ref();
        let head = with_backoff(
            &self.policy,
            "exists",
            StorageError::is_retryable,
            move || async move {
                store
                    .head(location)
                    .await
                    .map_err(|e| to_storage_error(e, "exists", path))
            },
        )
        .await;

        match head {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    async fn upload(&self, path: &str, local_file: &Path) -> Result<u64> {
        let bytes = Bytes::from(tokio::fs::read(local_file).await.map_err(|e| {
            StowageError::Io(format!("Failed to read {}: {e}", local_file.display()))
        })?);
        let size = bytes.len() as u64;

        match &self.multipart {
            Some(multipart) if bytes.len() > self.part_size => {
                self.upload_multipart(multipart.as_ref(), path, bytes).await?
            }
            _ => self.put_with_retry(path, bytes, "upload").await?,
        }

        tracing::debug!(path, bytes = size, "Uploaded object");
        Ok(size)
    }

    async fn read_text(&self, path: &str) -> Result<Option<String>> {
        match self.read_bytes(path).await {
            Ok(bytes) => String::from_utf8(bytes.to_vec()).map(Some).map_err(|e| {
                StowageError::Serialization(format!("Object {path} is not valid UTF-8: {e}"))
            }),
            Err(StowageError::Storage(err)) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn write_text(&self, path: &str, text: &str) -> Result<()> {
        self.put_with_retry(path, Bytes::from(text.to_owned()), "write_text")
            .await
    }

    async fn read_bytes(&self, path: &str) -> Result<Bytes> {
        let location = &ObjectPath::from(path);
        let store = self.store.as_ref();
        let bytes = with_backoff(
            &self.policy,
            "read",
            StorageError::is_retryable,
            move || async move {
                let result = store
                    .get(location)
                    .await
                    .map_err(|e| to_storage_error(e, "read", path))?;
                result
                    .bytes()
                    .await
                    .map_err(|e| to_storage_error(e, "read", path))
            },
        )
        .await?;
        Ok(bytes)
    }

    async fn put_bytes_atomic(&self, path: &str, bytes: Bytes) -> Result<()> {
        let tmp = format!("{path}.tmp-{}", uuid::Uuid::new_v4().simple());
        self.put_with_retry(&tmp, bytes, "put_tmp").await?;

        let from = &ObjectPath::from(tmp.as_str());
        let to = &ObjectPath::from(path);
        let store = self.store.as_ref();
        let renamed = with_backoff(
            &self.policy,
            "rename",
            StorageError::is_retryable,
            move || async move {
                store
                    .rename(from, to)
                    .await
                    .map_err(|e| to_storage_error(e, "rename", path))
            },
        )
        .await;

        if let Err(err) = renamed {
            if let Err(delete_err) = store.delete(from).await {
                tracing::warn!(path = %tmp, error = %delete_err, "Failed to remove temporary object");
            }
            return Err(err.into());
        }
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let trimmed = prefix.trim_matches('/');
        let location = &ObjectPath::from(trimmed);
        let store = self.store.as_ref();
        let mut paths = with_backoff(
            &self.policy,
            "list",
            StorageError::is_retryable,
            move || async move {
                let scope = if trimmed.is_empty() {
                    None
                } else {
                    Some(location)
                };
                store
                    .list(scope)
                    .map_ok(|meta| meta.location.to_string())
                    .try_collect::<Vec<_>>()
                    .await
                    .map_err(|e| to_storage_error(e, "list", trimmed))
            },
        )
        .await?;
        paths.sort();
        Ok(paths)
    }

    fn describe(&self) -> String {
        self.location.clone()
    }
}

/// Converts an `object_store` failure into a classified [`StorageError`]
pub fn to_storage_error(err: object_store::Error, operation: &str, path: &str) -> StorageError {
    StorageError::new(
        classify_object_store_error(&err),
        operation,
        path,
        err.to_string(),
    )
}

/// Classifies an `object_store` failure
///
/// Structured variants are mapped directly. HTTP and transport failures only
/// surface as `Generic`, so their message is searched for a status code or a
/// timeout.
pub fn classify_object_store_error(err: &object_store::Error) -> StorageErrorKind {
    use object_store::Error;
    match err {
        Error::NotFound { .. } => StorageErrorKind::NotFound,
        Error::AlreadyExists { .. } | Error::Precondition { .. } => StorageErrorKind::AlreadyExists,
        Error::PermissionDenied { .. } => StorageErrorKind::PermissionDenied,
        Error::Unauthenticated { .. } => StorageErrorKind::Unauthenticated,
        Error::InvalidPath { .. }
        | Error::NotSupported { .. }
        | Error::NotImplemented
        | Error::UnknownConfigurationKey { .. } => StorageErrorKind::InvalidRequest,
        other => classify_message(&other.to_string()),
    }
}

fn status_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(
                r"(?i)(?:status(?: code)?\s*[:=]?\s*(\d{3}))|(?:\b([45]\d{2})\s+(?:Too Many Requests|Service Unavailable|Internal Server Error|Bad Gateway|Gateway Timeout|Request Timeout|Forbidden|Unauthorized|Not Found)\b)",
            )
            .ok()
        })
        .as_ref()
}

/// Classifies a free-form error message
pub fn classify_message(message: &str) -> StorageErrorKind {
    let status = status_pattern()
        .and_then(|re| re.captures(message))
        .and_then(|caps| caps.get(1).or_else(|| caps.get(2)))
        .and_then(|m| m.as_str().parse::<u16>().ok());
    if let Some(status) = status {
        return StorageErrorKind::from_status(status);
    }

    let lower = message.to_lowercase();
    if lower.contains("timed out") || lower.contains("timeout") {
        StorageErrorKind::RequestTimeout
    } else if lower.contains("deadline") {
        StorageErrorKind::DeadlineExceeded
    } else if lower.contains("connection reset")
        || lower.contains("connection refused")
        || lower.contains("connection closed")
        || lower.contains("error sending request")
    {
        StorageErrorKind::ServiceUnavailable
    } else {
        StorageErrorKind::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use test_case::test_case;

    #[test_case("Server returned non-2xx status code: 503 Service Unavailable: ", StorageErrorKind::ServiceUnavailable; "503")]
    #[test_case("Error after 0 retries, source: status: 429", StorageErrorKind::RateLimited; "429")]
    #[test_case("status code 502", StorageErrorKind::BadGateway; "502")]
    #[test_case("504 Gateway Timeout from upstream", StorageErrorKind::GatewayTimeout; "504 reason")]
    #[test_case("status: 403", StorageErrorKind::PermissionDenied; "403")]
    #[test_case("operation timed out", StorageErrorKind::RequestTimeout; "socket timeout")]
    #[test_case("request deadline exceeded", StorageErrorKind::DeadlineExceeded; "deadline")]
    #[test_case("connection reset by peer", StorageErrorKind::ServiceUnavailable; "reset")]
    #[test_case("bucket policy forbids this", StorageErrorKind::Other; "unclassified")]
    fn test_classify_message(message: &str, expected: StorageErrorKind) {
        assert_eq!(classify_message(message), expected);
    }

    #[test]
    fn test_classify_structured_variants() {
        let not_found = object_store::Error::NotFound {
            path: "a/b".to_string(),
            source: "missing".into(),
        };
        assert_eq!(
            classify_object_store_error(&not_found),
            StorageErrorKind::NotFound
        );
        assert_eq!(
            classify_object_store_error(&object_store::Error::NotImplemented),
            StorageErrorKind::InvalidRequest
        );
    }

    #[tokio::test]
    async fn test_text_round_trip_and_missing() {
        let store = ObjectBlobStore::in_memory();
        assert_eq!(store.read_text("runs/_checkpoint.json").await.unwrap(), None);
        assert!(!store.exists("runs/_checkpoint.json").await.unwrap());

        store
            .write_text("runs/_checkpoint.json", "{\"chunk_idx\":1}")
            .await
            .unwrap();
        assert!(store.exists("runs/_checkpoint.json").await.unwrap());
        assert_eq!(
            store.read_text("runs/_checkpoint.json").await.unwrap().as_deref(),
            Some("{\"chunk_idx\":1}")
        );
    }

    #[tokio::test]
    async fn test_multipart_upload_reassembles_parts() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("part-000001.parquet");
        let payload: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(&file, &payload).unwrap();

        let store = ObjectBlobStore::in_memory().with_part_size(4096);
        let sent = store.upload("run/part-000001.parquet", &file).await.unwrap();

        assert_eq!(sent, 10_000);
        let stored = store.read_bytes("run/part-000001.parquet").await.unwrap();
        assert_eq!(stored.as_ref(), payload.as_slice());
    }

    #[tokio::test]
    async fn test_local_store_atomic_put_and_list() {
        let dir = TempDir::new().unwrap();
        let store = ObjectBlobStore::local(dir.path()).unwrap();

        store
            .put_bytes_atomic("out/b.parquet", Bytes::from_static(b"b"))
            .await
            .unwrap();
        store
            .put_bytes_atomic("out/a.parquet", Bytes::from_static(b"a"))
            .await
            .unwrap();
        store
            .write_text("other/c.json", "{}")
            .await
            .unwrap();

        let listed = store.list("out/").await.unwrap();
        assert_eq!(listed, vec!["out/a.parquet", "out/b.parquet"]);
        assert!(store.describe().starts_with("file://"));
    }

    #[tokio::test]
    async fn test_read_missing_object_is_not_found() {
        let store = ObjectBlobStore::in_memory();
        let err = store.read_bytes("nope.parquet").await.unwrap_err();
        match err {
            StowageError::Storage(e) => assert!(e.is_not_found()),
            other => panic!("unexpected error: {other}"),
        }
    }
}
