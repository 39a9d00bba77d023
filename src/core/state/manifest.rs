//! Run manifest
//!
//! Written once when an export run reaches the end of the source. Its
//! presence marks the run as finished.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current manifest layout version
pub const MANIFEST_SCHEMA_VERSION: u32 = 1;

/// Terminal summary of a finished export run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    pub run_id: String,

    /// Source database
    pub db: String,

    /// Source collection
    pub collection: String,

    /// Number of chunks in the run
    pub chunks: u64,

    pub exported_docs: u64,

    pub batch_size: usize,

    /// Document cap in effect; 0 means unlimited
    #[serde(default)]
    pub max_docs: u64,

    pub sort_field: String,

    pub started_utc: DateTime<Utc>,

    pub ended_utc: DateTime<Utc>,
}

fn default_schema_version() -> u32 {
    MANIFEST_SCHEMA_VERSION
}

impl Manifest {
    /// Wall-clock span of the run
    pub fn duration(&self) -> chrono::Duration {
        self.ended_utc - self.started_utc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_manifest_wire_format() {
        let manifest = Manifest {
            schema_version: MANIFEST_SCHEMA_VERSION,
            run_id: "r1".to_string(),
            db: "countly".to_string(),
            collection: "summary".to_string(),
            chunks: 3,
            exported_docs: 12345,
            batch_size: 5000,
            max_docs: 0,
            sort_field: "_id".to_string(),
            started_utc: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            ended_utc: Utc.with_ymd_and_hms(2025, 1, 1, 0, 10, 0).unwrap(),
        };

        let json = serde_json::to_value(&manifest).unwrap();
        assert_eq!(json["chunks"], 3);
        assert_eq!(json["exported_docs"], 12345);
        assert_eq!(json["collection"], "summary");
        assert_eq!(manifest.duration(), chrono::Duration::minutes(10));

        let back: Manifest = serde_json::from_value(json).unwrap();
        assert_eq!(back, manifest);
    }
}
