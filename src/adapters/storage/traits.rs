//! Blob store abstraction
//!
//! The export and drift-normalization stages talk to durable storage only
//! through [`BlobStore`]. Paths are `/`-separated object keys relative to the
//! store root (bucket or directory).

use crate::domain::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::Path;

/// Durable, path-addressed object storage
///
/// Implementations retry transient failures internally and return only
/// fatal errors or the error of the last attempt once the retry deadline is
/// spent.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Whether an object exists at `path`
    async fn exists(&self, path: &str) -> Result<bool>;

    /// Uploads a local file, returning the number of bytes sent
    ///
    /// Files larger than the configured part size are sent in parts; a failed
    /// part is retried on its own.
    async fn upload(&self, path: &str, local_file: &Path) -> Result<u64>;

    /// Reads an object as UTF-8 text, `None` when it does not exist
    async fn read_text(&self, path: &str) -> Result<Option<String>>;

    /// Writes (or replaces) a text object
    async fn write_text(&self, path: &str, text: &str) -> Result<()>;

    /// Reads the full contents of an object
    async fn read_bytes(&self, path: &str) -> Result<Bytes>;

    /// Writes bytes under a temporary name and moves them to `path`
    ///
    /// A failure part-way never leaves an object at `path`.
    async fn put_bytes_atomic(&self, path: &str, bytes: Bytes) -> Result<()>;

    /// Lists every object under `prefix`, sorted lexicographically
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Human-readable location for logs
    fn describe(&self) -> String;
}
