//! Batch cursor over a document source
//!
//! Pages through the source by value rather than with a server-side cursor:
//! each batch is one bounded query for documents strictly after the last
//! sort value seen. A cursor can therefore be rebuilt from a checkpoint at
//! any time.

use crate::adapters::source::DocumentSource;
use crate::domain::{Result, SortValue, StowageError};
use bson::Document;
use std::sync::Arc;

/// One batch read from the source
#[derive(Debug, Clone, Default)]
pub struct Batch {
    pub docs: Vec<Document>,
    /// Sort value of the last document, `None` for an empty batch
    pub last_sort_value: SortValue,
}

impl Batch {
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }
}

/// Value-based pagination state
pub struct BatchCursor {
    source: Arc<dyn DocumentSource>,
    sort_field: String,
    batch_size: usize,
    position: SortValue,
}

impl BatchCursor {
    /// Creates a cursor resuming strictly after `position`
    pub fn new(
        source: Arc<dyn DocumentSource>,
        sort_field: impl Into<String>,
        batch_size: usize,
        position: SortValue,
    ) -> Self {
        Self {
            source,
            sort_field: sort_field.into(),
            batch_size,
            position,
        }
    }

    pub fn position(&self) -> &SortValue {
        &self.position
    }

    /// Reads the next batch of at most `batch_size` documents
    ///
    /// An empty batch means the source is exhausted.
    pub async fn next_batch(&mut self) -> Result<Batch> {
        self.next_batch_limited(self.batch_size).await
    }

    /// Reads the next batch of at most `limit` documents
    ///
    /// # Errors
    ///
    /// Source errors are returned as is. A document without the sort field,
    /// or whose sort value has no checkpoint form, is an export error, since
    /// the cursor could not move past it.
    pub async fn next_batch_limited(&mut self, limit: usize) -> Result<Batch> {
        let after = self
            .position
            .to_bson()
            .map_err(|e| StowageError::Checkpoint(format!("Unusable cursor value: {e}")))?;

        let docs = self
            .source
            .fetch_batch(&self.sort_field, after.as_ref(), limit.min(self.batch_size))
            .await?;

        let Some(last) = docs.last() else {
            return Ok(Batch::default());
        };

        if let Some(missing) = docs.iter().position(|d| !d.contains_key(&self.sort_field)) {
            return Err(StowageError::Export(format!(
                "Document {} of the batch after {} has no '{}' field; it cannot be used as a sort key",
                missing, self.position, self.sort_field
            )));
        }

        let last_sort_value = match last.get(&self.sort_field) {
            Some(value) => SortValue::from_bson(value).map_err(|e| {
                StowageError::Export(format!(
                    "Cannot page on '{}' after {}: {e}",
                    self.sort_field, self.position
                ))
            })?,
            None => SortValue::None,
        };
        self.position = last_sort_value.clone();

        Ok(Batch {
            docs,
            last_sort_value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::source::MemorySource;
    use bson::doc;

    fn source(n: i64) -> Arc<dyn DocumentSource> {
        Arc::new(MemorySource::new(
            (1..=n).map(|i| doc! { "seq": i }).collect(),
        ))
    }

    #[tokio::test]
    async fn test_pages_until_empty() {
        let mut cursor = BatchCursor::new(source(7), "seq", 3, SortValue::None);

        let sizes = [
            cursor.next_batch().await.unwrap().len(),
            cursor.next_batch().await.unwrap().len(),
            cursor.next_batch().await.unwrap().len(),
        ];
        assert_eq!(sizes, [3, 3, 1]);
        assert_eq!(cursor.position(), &SortValue::Int(7));
        assert!(cursor.next_batch().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_resumes_after_position() {
        let mut cursor = BatchCursor::new(source(7), "seq", 10, SortValue::Int(5));
        let batch = cursor.next_batch().await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.last_sort_value, SortValue::Int(7));
    }

    #[tokio::test]
    async fn test_limit_caps_batch() {
        let mut cursor = BatchCursor::new(source(7), "seq", 5, SortValue::None);
        assert_eq!(cursor.next_batch_limited(2).await.unwrap().len(), 2);
        assert_eq!(cursor.next_batch_limited(50).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_missing_sort_field_is_fatal() {
        let source: Arc<dyn DocumentSource> = Arc::new(MemorySource::new(vec![
            doc! { "other": 1 },
            doc! { "seq": 1 },
        ]));
        let mut cursor = BatchCursor::new(source, "seq", 10, SortValue::None);
        assert!(matches!(
            cursor.next_batch().await,
            Err(StowageError::Export(_))
        ));
    }

    #[tokio::test]
    async fn test_timestamp_sort_key_is_fatal() {
        let source: Arc<dyn DocumentSource> = Arc::new(MemorySource::new(
            (1..=4u32)
                .map(|i| doc! { "ts": bson::Timestamp { time: i, increment: 0 } })
                .collect(),
        ));
        let mut cursor = BatchCursor::new(source, "ts", 2, SortValue::None);

        let err = cursor.next_batch().await.unwrap_err();
        assert!(matches!(err, StowageError::Export(_)));
        assert!(err.to_string().contains("'ts'"));
        // The position never moves to a value it could not query back.
        assert_eq!(cursor.position(), &SortValue::None);
    }
}
