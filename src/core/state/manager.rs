//! Checkpoint store for run state persistence
//!
//! This module provides the CheckpointStore for loading and saving the
//! checkpoint and manifest of one run through the blob store.

use super::checkpoint::{Checkpoint, CHECKPOINT_SCHEMA_VERSION};
use super::manifest::Manifest;
use crate::adapters::storage::BlobStore;
use crate::core::export::RunLayout;
use crate::domain::{Result, SortValue, StowageError};
use std::sync::Arc;

/// Checkpoint and manifest persistence for one run
///
/// Assumes a single writer per run id.
pub struct CheckpointStore {
    /// Blob store backend
    storage: Arc<dyn BlobStore>,

    checkpoint_path: String,
    manifest_path: String,
    run_id: crate::domain::RunId,
}

impl CheckpointStore {
    /// Create a checkpoint store for the run described by `layout`
    pub fn new(storage: Arc<dyn BlobStore>, layout: &RunLayout) -> Self {
        Self {
            storage,
            checkpoint_path: layout.checkpoint_path(),
            manifest_path: layout.manifest_path(),
            run_id: layout.run_id().clone(),
        }
    }

    pub fn checkpoint_path(&self) -> &str {
        &self.checkpoint_path
    }

    /// Load the checkpoint, or an empty one when the run has none yet
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails for reasons other than "not found",
    /// or the stored checkpoint cannot be decoded.
    pub async fn load(&self) -> Result<Checkpoint> {
        let Some(text) = self.storage.read_text(&self.checkpoint_path).await? else {
            return Ok(Checkpoint::new(&self.run_id));
        };

        let mut checkpoint: Checkpoint = serde_json::from_str(&text).map_err(|e| {
            StowageError::Checkpoint(format!(
                "Failed to decode {}: {e}",
                self.checkpoint_path
            ))
        })?;

        if checkpoint.schema_version > CHECKPOINT_SCHEMA_VERSION {
            tracing::warn!(
                found = checkpoint.schema_version,
                supported = CHECKPOINT_SCHEMA_VERSION,
                "Checkpoint written by a newer version; unknown fields are ignored"
            );
        }
        if checkpoint.run_id.is_empty() {
            checkpoint.run_id = self.run_id.to_string();
        }
        Ok(checkpoint)
    }

    /// Save a checkpoint
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails after retries.
    pub async fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        let text = serde_json::to_string_pretty(checkpoint)?;
        self.storage.write_text(&self.checkpoint_path, &text).await
    }

    /// Advance the checkpoint by one chunk and persist it
    ///
    /// `checkpoint` is only updated once the save succeeded.
    ///
    /// # Errors
    ///
    /// Returns a checkpoint error if the advance would move backwards, or the
    /// storage error of the save.
    pub async fn advance(
        &self,
        checkpoint: &mut Checkpoint,
        rows: u64,
        last_sort_value: SortValue,
    ) -> Result<()> {
        let next = checkpoint.advanced(rows, last_sort_value);
        next.ensure_follows(checkpoint)?;

        tracing::info!(
            chunk_idx = next.chunk_idx,
            exported_docs = next.exported_docs,
            last_sort_value = %next.last_sort_value,
            "Checkpointing batch"
        );

        self.save(&next).await?;
        *checkpoint = next;
        Ok(())
    }

    /// Load the manifest, `None` while the run is unfinished
    pub async fn load_manifest(&self) -> Result<Option<Manifest>> {
        match self.storage.read_text(&self.manifest_path).await? {
            Some(text) => serde_json::from_str(&text).map(Some).map_err(|e| {
                StowageError::Checkpoint(format!("Failed to decode {}: {e}", self.manifest_path))
            }),
            None => Ok(None),
        }
    }

    /// Write the manifest
    ///
    /// # Errors
    ///
    /// Returns a checkpoint error if a manifest is already present.
    pub async fn write_manifest(&self, manifest: &Manifest) -> Result<()> {
        if self.storage.exists(&self.manifest_path).await? {
            return Err(StowageError::Checkpoint(format!(
                "Manifest already exists at {}",
                self.manifest_path
            )));
        }
        let text = serde_json::to_string_pretty(manifest)?;
        self.storage.write_text(&self.manifest_path, &text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::storage::ObjectBlobStore;
    use crate::domain::RunId;
    use chrono::Utc;

    fn store() -> (Arc<dyn BlobStore>, CheckpointStore) {
        let blobs: Arc<dyn BlobStore> = Arc::new(ObjectBlobStore::in_memory());
        let layout = RunLayout::new("exports", RunId::new("r1").unwrap(), "db", "coll");
        let checkpoints = CheckpointStore::new(blobs.clone(), &layout);
        (blobs, checkpoints)
    }

    #[tokio::test]
    async fn test_load_missing_gives_fresh_checkpoint() {
        let (_, checkpoints) = store();
        let checkpoint = checkpoints.load().await.unwrap();
        assert!(checkpoint.is_fresh());
        assert_eq!(checkpoint.run_id, "r1");
    }

    #[tokio::test]
    async fn test_advance_persists() {
        let (_, checkpoints) = store();
        let mut checkpoint = checkpoints.load().await.unwrap();

        checkpoints
            .advance(&mut checkpoint, 5000, SortValue::Int(4999))
            .await
            .unwrap();

        let reloaded = checkpoints.load().await.unwrap();
        assert_eq!(reloaded, checkpoint);
        assert_eq!(reloaded.chunk_idx, 1);
        assert_eq!(reloaded.last_sort_value, SortValue::Int(4999));
    }

    #[tokio::test]
    async fn test_corrupt_checkpoint_is_an_error() {
        let (blobs, checkpoints) = store();
        blobs
            .write_text(checkpoints.checkpoint_path(), "{not json")
            .await
            .unwrap();
        assert!(matches!(
            checkpoints.load().await,
            Err(StowageError::Checkpoint(_))
        ));
    }

    #[tokio::test]
    async fn test_manifest_written_once() {
        let (_, checkpoints) = store();
        assert!(checkpoints.load_manifest().await.unwrap().is_none());

        let manifest = Manifest {
            schema_version: 1,
            run_id: "r1".to_string(),
            db: "db".to_string(),
            collection: "coll".to_string(),
            chunks: 1,
            exported_docs: 10,
            batch_size: 10,
            max_docs: 0,
            sort_field: "_id".to_string(),
            started_utc: Utc::now(),
            ended_utc: Utc::now(),
        };
        checkpoints.write_manifest(&manifest).await.unwrap();
        assert_eq!(checkpoints.load_manifest().await.unwrap(), Some(manifest.clone()));
        assert!(checkpoints.write_manifest(&manifest).await.is_err());
    }
}
