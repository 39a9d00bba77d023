//! Checkpoint model for tracking export progress
//!
//! One checkpoint exists per run. It is the resume anchor: a restarted export
//! continues strictly after `last_sort_value` and numbers its next chunk
//! `chunk_idx + 1`.

use crate::domain::{Result, RunId, SortValue, StowageError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current checkpoint layout version
pub const CHECKPOINT_SCHEMA_VERSION: u32 = 1;

/// Durable export progress of one run
///
/// Decoding is lenient: unknown fields are ignored and missing fields take
/// their defaults, so older and newer writers can read each other's files.
///
/// # Examples
///
/// ```
/// use stowage::core::state::Checkpoint;
/// use stowage::domain::{RunId, SortValue};
///
/// let run_id = RunId::new("20250101T000000Z").unwrap();
/// let checkpoint = Checkpoint::new(&run_id);
/// assert!(checkpoint.is_fresh());
///
/// let next = checkpoint.advanced(5000, SortValue::Int(4999));
/// assert_eq!(next.chunk_idx, 1);
/// assert_eq!(next.exported_docs, 5000);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    #[serde(default)]
    pub run_id: String,

    /// Index of the last chunk accounted for; 0 before the first chunk
    #[serde(default)]
    pub chunk_idx: u64,

    /// Documents accounted for across all chunks
    #[serde(default)]
    pub exported_docs: u64,

    /// Sort key of the last exported document
    #[serde(default)]
    pub last_sort_value: SortValue,

    /// When the run first saved a checkpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_utc: Option<DateTime<Utc>>,

    #[serde(default)]
    pub updated_utc: Option<DateTime<Utc>>,
}

fn default_schema_version() -> u32 {
    CHECKPOINT_SCHEMA_VERSION
}

impl Checkpoint {
    /// Empty checkpoint for a run that has not exported anything yet
    pub fn new(run_id: &RunId) -> Self {
        Self {
            schema_version: CHECKPOINT_SCHEMA_VERSION,
            run_id: run_id.to_string(),
            chunk_idx: 0,
            exported_docs: 0,
            last_sort_value: SortValue::None,
            started_utc: None,
            updated_utc: None,
        }
    }

    /// Whether nothing has been exported yet
    pub fn is_fresh(&self) -> bool {
        self.chunk_idx == 0 && self.exported_docs == 0 && self.last_sort_value.is_none()
    }

    /// Index the next chunk will get
    pub fn next_chunk_idx(&self) -> u64 {
        self.chunk_idx + 1
    }

    /// The checkpoint after one more chunk of `rows` documents
    pub fn advanced(&self, rows: u64, last_sort_value: SortValue) -> Self {
        let now = Utc::now();
        Self {
            schema_version: CHECKPOINT_SCHEMA_VERSION,
            run_id: self.run_id.clone(),
            chunk_idx: self.chunk_idx + 1,
            exported_docs: self.exported_docs + rows,
            last_sort_value,
            started_utc: self.started_utc.or(Some(now)),
            updated_utc: Some(now),
        }
    }

    /// Checks that `self` does not move backwards relative to `previous`
    ///
    /// # Errors
    ///
    /// Returns a checkpoint error if the chunk index or document count would
    /// decrease, or a set cursor would be cleared.
    pub fn ensure_follows(&self, previous: &Checkpoint) -> Result<()> {
        if self.chunk_idx < previous.chunk_idx {
            return Err(StowageError::Checkpoint(format!(
                "chunk_idx would move backwards ({} -> {})",
                previous.chunk_idx, self.chunk_idx
            )));
        }
        if self.exported_docs < previous.exported_docs {
            return Err(StowageError::Checkpoint(format!(
                "exported_docs would move backwards ({} -> {})",
                previous.exported_docs, self.exported_docs
            )));
        }
        if self.last_sort_value.is_none() && !previous.last_sort_value.is_none() {
            return Err(StowageError::Checkpoint(
                "last_sort_value cannot be reset once set".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_id() -> RunId {
        RunId::new("r1").unwrap()
    }

    #[test]
    fn test_new_checkpoint_is_fresh() {
        let checkpoint = Checkpoint::new(&run_id());
        assert!(checkpoint.is_fresh());
        assert_eq!(checkpoint.next_chunk_idx(), 1);
        assert_eq!(checkpoint.schema_version, CHECKPOINT_SCHEMA_VERSION);
    }

    #[test]
    fn test_advanced_is_monotonic() {
        let first = Checkpoint::new(&run_id()).advanced(5000, SortValue::Int(10));
        let second = first.advanced(2345, SortValue::Int(20));

        assert_eq!(second.chunk_idx, 2);
        assert_eq!(second.exported_docs, 7345);
        assert_eq!(second.started_utc, first.started_utc);
        assert!(second.ensure_follows(&first).is_ok());
        assert!(first.ensure_follows(&second).is_err());
    }

    #[test]
    fn test_cursor_cannot_be_cleared() {
        let first = Checkpoint::new(&run_id()).advanced(1, SortValue::Int(1));
        let cleared = first.advanced(1, SortValue::None);
        assert!(matches!(
            cleared.ensure_follows(&first),
            Err(StowageError::Checkpoint(_))
        ));
    }

    #[test]
    fn test_wire_format() {
        let checkpoint = Checkpoint::new(&run_id()).advanced(3, SortValue::Int(42));
        let json: serde_json::Value = serde_json::to_value(&checkpoint).unwrap();

        assert_eq!(json["chunk_idx"], 1);
        assert_eq!(json["exported_docs"], 3);
        assert_eq!(json["last_sort_value"]["type"], "int");
        assert_eq!(json["last_sort_value"]["value"], 42);
        assert!(json["updated_utc"].is_string());
    }

    #[test]
    fn test_lenient_decode() {
        // Written by an older exporter: no version, no run id, extra field.
        let text = r#"{
            "chunk_idx": 2,
            "exported_docs": 10000,
            "last_sort_value": {"type": "objectid", "value": "65a1b2c3d4e5f60718293a4b"},
            "updated_utc": "2025-01-01T00:00:00+00:00",
            "host": "worker-3"
        }"#;

        let checkpoint: Checkpoint = serde_json::from_str(text).unwrap();
        assert_eq!(checkpoint.schema_version, CHECKPOINT_SCHEMA_VERSION);
        assert_eq!(checkpoint.chunk_idx, 2);
        assert_eq!(
            checkpoint.last_sort_value,
            SortValue::ObjectId("65a1b2c3d4e5f60718293a4b".to_string())
        );
        assert!(checkpoint.run_id.is_empty());
    }
}
