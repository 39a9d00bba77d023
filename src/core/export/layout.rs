//! Object paths of one export run
//!
//! ```text
//! <prefix>/run_id=<id>/db=<db>/collection=<coll>/part-000001.parquet
//! <prefix>/run_id=<id>/db=<db>/collection=<coll>/_checkpoint.json
//! <prefix>/run_id=<id>/db=<db>/collection=<coll>/manifest.json
//! <prefix>_normalized/run_id=<id>/db=<db>/collection=<coll>/part-000001.parquet
//! ```

use crate::core::normalize::chunk_file_name;
use crate::domain::RunId;

pub const CHECKPOINT_FILE: &str = "_checkpoint.json";
pub const MANIFEST_FILE: &str = "manifest.json";
pub const NORMALIZED_SUFFIX: &str = "_normalized";

/// Path scheme of one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLayout {
    prefix: String,
    run_id: RunId,
    database: String,
    collection: String,
}

impl RunLayout {
    pub fn new(
        prefix: &str,
        run_id: RunId,
        database: impl Into<String>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            prefix: prefix.trim_matches('/').to_string(),
            run_id,
            database: database.into(),
            collection: collection.into(),
        }
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    fn scoped(&self, prefix: &str) -> String {
        format!(
            "{prefix}/run_id={}/db={}/collection={}",
            self.run_id, self.database, self.collection
        )
    }

    /// Directory holding the run's chunks, checkpoint and manifest
    pub fn run_prefix(&self) -> String {
        self.scoped(&self.prefix)
    }

    pub fn chunk_path(&self, idx: u64) -> String {
        format!("{}/{}", self.run_prefix(), chunk_file_name(idx))
    }

    pub fn checkpoint_path(&self) -> String {
        format!("{}/{CHECKPOINT_FILE}", self.run_prefix())
    }

    pub fn manifest_path(&self) -> String {
        format!("{}/{MANIFEST_FILE}", self.run_prefix())
    }

    /// Mirror directory the drift rewrite writes to
    pub fn normalized_prefix(&self) -> String {
        self.scoped(&format!("{}{NORMALIZED_SUFFIX}", self.prefix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> RunLayout {
        RunLayout::new(
            "/exports/mongo_parquet/",
            RunId::new("20250101T000000Z").unwrap(),
            "countly",
            "summary",
        )
    }

    #[test]
    fn test_run_paths() {
        let layout = layout();
        assert_eq!(
            layout.run_prefix(),
            "exports/mongo_parquet/run_id=20250101T000000Z/db=countly/collection=summary"
        );
        assert_eq!(
            layout.chunk_path(2),
            "exports/mongo_parquet/run_id=20250101T000000Z/db=countly/collection=summary/part-000002.parquet"
        );
        assert!(layout.checkpoint_path().ends_with("/collection=summary/_checkpoint.json"));
        assert!(layout.manifest_path().ends_with("/collection=summary/manifest.json"));
    }

    #[test]
    fn test_normalized_mirror() {
        assert_eq!(
            layout().normalized_prefix(),
            "exports/mongo_parquet_normalized/run_id=20250101T000000Z/db=countly/collection=summary"
        );
    }
}
