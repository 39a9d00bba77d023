//! Document source abstraction
//!
//! This module defines the trait the batch cursor reads through.

use crate::domain::Result;
use async_trait::async_trait;
use bson::{Bson, Document};

/// Ordered, filterable document collection
///
/// Implementations perform exactly one bounded query per call and never
/// retry; a failed query is fatal to the run.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Test the connection to the source
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be reached.
    async fn ping(&self) -> Result<()>;

    /// Fetch up to `limit` documents ordered ascending by `sort_field`
    ///
    /// With `after` set, only documents whose sort field compares greater
    /// than it are returned; without it the query is unfiltered.
    ///
    /// # Errors
    ///
    /// Returns the underlying query or connectivity error.
    async fn fetch_batch(
        &self,
        sort_field: &str,
        after: Option<&Bson>,
        limit: usize,
    ) -> Result<Vec<Document>>;

    /// Database and collection label for logs and paths
    fn describe(&self) -> String;
}
