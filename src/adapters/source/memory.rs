//! In-memory document source
//!
//! Holds a fixed set of documents and answers batch queries with the same
//! ordering and filtering rules as a real collection. Used by tests and for
//! trying the pipeline without a database.

use super::traits::DocumentSource;
use crate::domain::{Result, StowageError};
use async_trait::async_trait;
use bson::{Bson, Document};
use std::cmp::Ordering;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::RwLock;

/// Document source backed by a vector
#[derive(Default)]
pub struct MemorySource {
    docs: RwLock<Vec<Document>>,
    label: String,
    queries: AtomicUsize,
}

impl MemorySource {
    pub fn new(docs: Vec<Document>) -> Self {
        Self::with_label(docs, "memory.collection")
    }

    pub fn with_label(docs: Vec<Document>, label: impl Into<String>) -> Self {
        Self {
            docs: RwLock::new(docs),
            label: label.into(),
            queries: AtomicUsize::new(0),
        }
    }

    /// Replaces the stored documents
    pub fn replace(&self, docs: Vec<Document>) -> Result<()> {
        let mut guard = self
            .docs
            .write()
            .map_err(|_| StowageError::Source("memory source lock poisoned".to_string()))?;
        *guard = docs;
        Ok(())
    }

    /// Number of `fetch_batch` calls served
    pub fn query_count(&self) -> usize {
        self.queries.load(AtomicOrdering::SeqCst)
    }
}

#[async_trait]
impl DocumentSource for MemorySource {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn fetch_batch(
        &self,
        sort_field: &str,
        after: Option<&Bson>,
        limit: usize,
    ) -> Result<Vec<Document>> {
        self.queries.fetch_add(1, AtomicOrdering::SeqCst);
        let guard = self
            .docs
            .read()
            .map_err(|_| StowageError::Source("memory source lock poisoned".to_string()))?;

        let mut matching: Vec<&Document> = guard
            .iter()
            .filter(|doc| match after {
                None => true,
                Some(bound) => doc
                    .get(sort_field)
                    .is_some_and(|v| compare_bson(v, bound) == Ordering::Greater),
            })
            .collect();

        matching.sort_by(|a, b| match (a.get(sort_field), b.get(sort_field)) {
            (Some(x), Some(y)) => compare_bson(x, y),
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });

        Ok(matching.into_iter().take(limit).cloned().collect())
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}

/// Cross-type rank, following the server's comparison order
fn type_rank(value: &Bson) -> u8 {
    match value {
        Bson::MinKey => 0,
        Bson::Null | Bson::Undefined => 1,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_) => 2,
        Bson::String(_) | Bson::Symbol(_) => 3,
        Bson::Document(_) => 4,
        Bson::Array(_) => 5,
        Bson::Binary(_) => 6,
        Bson::ObjectId(_) => 7,
        Bson::Boolean(_) => 8,
        Bson::DateTime(_) => 9,
        Bson::Timestamp(_) => 10,
        Bson::RegularExpression(_) => 11,
        Bson::MaxKey => 13,
        _ => 12,
    }
}

fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(i) => Some(f64::from(*i)),
        Bson::Int64(i) => Some(*i as f64),
        Bson::Double(f) => Some(*f),
        _ => None,
    }
}

/// Total order over the value kinds used as sort keys
pub fn compare_bson(a: &Bson, b: &Bson) -> Ordering {
    let rank = type_rank(a).cmp(&type_rank(b));
    if rank != Ordering::Equal {
        return rank;
    }
    match (a, b) {
        (Bson::Int32(x), Bson::Int32(y)) => x.cmp(y),
        (Bson::Int64(x), Bson::Int64(y)) => x.cmp(y),
        (Bson::Int32(x), Bson::Int64(y)) => i64::from(*x).cmp(y),
        (Bson::Int64(x), Bson::Int32(y)) => x.cmp(&i64::from(*y)),
        (x, y) if as_f64(x).is_some() && as_f64(y).is_some() => as_f64(x)
            .zip(as_f64(y))
            .map(|(x, y)| x.total_cmp(&y))
            .unwrap_or(Ordering::Equal),
        (Bson::String(x), Bson::String(y)) => x.cmp(y),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => x.bytes().cmp(&y.bytes()),
        (Bson::Boolean(x), Bson::Boolean(y)) => x.cmp(y),
        (Bson::DateTime(x), Bson::DateTime(y)) => x.cmp(y),
        (Bson::Timestamp(x), Bson::Timestamp(y)) => {
            (x.time, x.increment).cmp(&(y.time, y.increment))
        }
        (x, y) => x.to_string().cmp(&y.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use bson::oid::ObjectId;

    fn numbered(n: i64) -> Vec<Document> {
        // Inserted in reverse to check the source sorts.
        (0..n).rev().map(|i| doc! { "seq": i, "v": i * 10 }).collect()
    }

    #[tokio::test]
    async fn test_first_batch_is_unfiltered_and_sorted() {
        let source = MemorySource::new(numbered(10));
        let batch = source.fetch_batch("seq", None, 3).await.unwrap();
        let seqs: Vec<i64> = batch.iter().map(|d| d.get_i64("seq").unwrap()).collect();
        assert_eq!(seqs, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_filter_is_strictly_greater() {
        let source = MemorySource::new(numbered(10));
        let batch = source
            .fetch_batch("seq", Some(&Bson::Int64(7)), 5)
            .await
            .unwrap();
        let seqs: Vec<i64> = batch.iter().map(|d| d.get_i64("seq").unwrap()).collect();
        assert_eq!(seqs, vec![8, 9]);

        let empty = source
            .fetch_batch("seq", Some(&Bson::Int64(9)), 5)
            .await
            .unwrap();
        assert!(empty.is_empty());
        assert_eq!(source.query_count(), 2);
    }

    #[test]
    fn test_compare_object_ids_by_bytes() {
        let a = ObjectId::parse_str("64b000000000000000000001").unwrap();
        let b = ObjectId::parse_str("64b000000000000000000002").unwrap();
        assert_eq!(
            compare_bson(&Bson::ObjectId(a), &Bson::ObjectId(b)),
            Ordering::Less
        );
    }

    #[test]
    fn test_compare_mixed_numbers() {
        assert_eq!(
            compare_bson(&Bson::Int32(2), &Bson::Double(2.5)),
            Ordering::Less
        );
        assert_eq!(
            compare_bson(&Bson::Int64(3), &Bson::Int32(3)),
            Ordering::Equal
        );
        assert_eq!(
            compare_bson(&Bson::Int32(1), &Bson::String("0".into())),
            Ordering::Less
        );
    }
}
