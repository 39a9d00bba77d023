//! Export coordinator - main orchestrator for the export process
//!
//! Drives read, normalize, write, upload and checkpoint for one run:
//!
//! ```text
//! LOADING_CHECKPOINT -> READING_BATCH -> EMPTY -> DONE (manifest)
//!                                     -> CHECK_EXISTING_CHUNK -> EXISTS -> ADVANCE_SKIP
//!                                                             -> ABSENT -> WRITE_LOCAL -> UPLOAD
//!                                                                       -> DELETE_LOCAL -> ADVANCE
//! ```
//!
//! The chunk blob is always durable before the checkpoint that accounts for
//! it, so killing the process at any point leaves a state the next run with
//! the same run id resumes from exactly.

use crate::adapters::source::DocumentSource;
use crate::adapters::storage::BlobStore;
use crate::config::StowageConfig;
use crate::core::export::cursor::{Batch, BatchCursor};
use crate::core::export::layout::RunLayout;
use crate::core::export::summary::{ExportOutcome, ExportSummary};
use crate::core::normalize::{
    batch_fingerprint, chunk_file_name, normalize_batch, read_footer, ChunkMetadata, ChunkWriter,
};
use crate::core::state::{Checkpoint, CheckpointStore, Manifest, MANIFEST_SCHEMA_VERSION};
use crate::domain::{Result, RunId, StowageError};
use crate::{log_chunk_uploaded, log_export_complete};
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;

/// Export coordinator
pub struct ExportCoordinator {
    config: StowageConfig,
    layout: RunLayout,
    source: Arc<dyn DocumentSource>,
    store: Arc<dyn BlobStore>,
    checkpoints: CheckpointStore,
    writer: ChunkWriter,
    shutdown_signal: watch::Receiver<bool>,
}

impl ExportCoordinator {
    /// Create a new export coordinator
    ///
    /// The run id comes from `application.run_id`, or is generated from the
    /// current time when unset.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the configured run id is invalid.
    pub fn new(
        config: StowageConfig,
        source: Arc<dyn DocumentSource>,
        store: Arc<dyn BlobStore>,
        shutdown_signal: watch::Receiver<bool>,
    ) -> Result<Self> {
        let run_id = RunId::resolve(config.application.run_id.as_deref())
            .map_err(StowageError::Configuration)?;
        let layout = RunLayout::new(
            &config.storage.base_prefix(),
            run_id,
            config.source.database.clone(),
            config.source.collection.clone(),
        );
        let checkpoints = CheckpointStore::new(store.clone(), &layout);
        let writer = ChunkWriter::new(config.export.compression);

        Ok(Self {
            config,
            layout,
            source,
            store,
            checkpoints,
            writer,
            shutdown_signal,
        })
    }

    pub fn run_id(&self) -> &RunId {
        self.layout.run_id()
    }

    pub fn layout(&self) -> &RunLayout {
        &self.layout
    }

    /// Execute the export
    ///
    /// Resumes from the run's checkpoint, exports until the source is
    /// exhausted, the document cap is reached or a shutdown is requested,
    /// and writes the manifest when the run finishes.
    ///
    /// # Errors
    ///
    /// Any source, encoding or storage error stops the run; the checkpoint
    /// stays consistent with the uploaded chunks.
    pub async fn execute_export(&self) -> Result<ExportSummary> {
        let start_time = Instant::now();
        let started_utc = Utc::now();
        let export = &self.config.export;
        let mut summary = ExportSummary::new(self.run_id().as_str());

        tracing::info!(
            run_id = %self.run_id(),
            source = %self.source.describe(),
            target = %format!("{}/{}", self.store.describe(), self.layout.run_prefix()),
            batch_size = export.batch_size,
            max_docs = export.max_docs,
            sort_field = %export.sort_field,
            "Starting export"
        );

        if let Some(manifest) = self.checkpoints.load_manifest().await? {
            tracing::info!(
                chunks = manifest.chunks,
                exported_docs = manifest.exported_docs,
                ended_utc = %manifest.ended_utc,
                "Run already complete; nothing to do"
            );
            summary.total_chunks = manifest.chunks;
            summary.total_docs = manifest.exported_docs;
            summary.outcome = ExportOutcome::AlreadyComplete;
            return Ok(summary.with_duration(start_time.elapsed()));
        }

        let mut checkpoint = self.checkpoints.load().await?;
        tracing::info!(
            chunk_idx = checkpoint.chunk_idx,
            exported_docs = checkpoint.exported_docs,
            last_sort_value = %checkpoint.last_sort_value,
            "Resume checkpoint"
        );

        let staging_dir = PathBuf::from(&export.local_tmp_dir);
        tokio::fs::create_dir_all(&staging_dir).await.map_err(|e| {
            StowageError::Io(format!(
                "Failed to create staging directory {}: {e}",
                staging_dir.display()
            ))
        })?;

        let mut cursor = BatchCursor::new(
            self.source.clone(),
            export.sort_field.clone(),
            export.batch_size,
            checkpoint.last_sort_value.clone(),
        );

        loop {
            if *self.shutdown_signal.borrow() {
                tracing::warn!(
                    chunk_idx = checkpoint.chunk_idx,
                    "Shutdown requested; stopping before the next batch"
                );
                summary.outcome = ExportOutcome::Interrupted;
                break;
            }

            let limit = match export.doc_cap() {
                Some(cap) if checkpoint.exported_docs >= cap => {
                    tracing::warn!(max_docs = cap, "Reached max_docs. Stopping.");
                    break;
                }
                Some(cap) => export
                    .batch_size
                    .min(usize::try_from(cap - checkpoint.exported_docs).unwrap_or(usize::MAX)),
                None => export.batch_size,
            };

            let batch = cursor.next_batch_limited(limit).await?;
            if batch.is_empty() {
                tracing::info!("No more documents. Finished reading.");
                break;
            }

            let rows = batch.len() as u64;
            let chunk_idx = checkpoint.next_chunk_idx();
            let blob_path = self.layout.chunk_path(chunk_idx);
            let fingerprint = batch_fingerprint(&batch.docs)?;

            if self.store.exists(&blob_path).await? {
                self.verify_existing_chunk(&blob_path, &fingerprint, rows)
                    .await?;
                tracing::info!(chunk_idx, path = %blob_path, "Skip existing chunk");
                self.checkpoints
                    .advance(&mut checkpoint, rows, batch.last_sort_value)
                    .await?;
                summary.chunks_skipped += 1;
            } else {
                self.export_chunk(chunk_idx, &blob_path, &batch, fingerprint, &staging_dir)
                    .await?;
                self.checkpoints
                    .advance(&mut checkpoint, rows, batch.last_sort_value)
                    .await?;
                summary.chunks_written += 1;
            }
            summary.docs_exported += rows;

            if checkpoint.chunk_idx % export.progress_every_chunks.max(1) == 0 {
                tracing::info!(
                    chunks = checkpoint.chunk_idx,
                    exported_docs = checkpoint.exported_docs,
                    elapsed_secs = %format!("{:.1}", start_time.elapsed().as_secs_f64()),
                    "Progress"
                );
            }
        }

        summary.total_chunks = checkpoint.chunk_idx;
        summary.total_docs = checkpoint.exported_docs;

        if summary.outcome != ExportOutcome::Interrupted {
            let manifest = self.build_manifest(&checkpoint, started_utc);
            self.checkpoints.write_manifest(&manifest).await?;
            log_export_complete!(
                checkpoint.chunk_idx,
                checkpoint.exported_docs,
                start_time.elapsed()
            );
        }

        let summary = summary.with_duration(start_time.elapsed());
        summary.log_summary();
        Ok(summary)
    }

    /// WRITE_LOCAL -> UPLOAD -> DELETE_LOCAL
    async fn export_chunk(
        &self,
        chunk_idx: u64,
        blob_path: &str,
        batch: &Batch,
        fingerprint: String,
        staging_dir: &std::path::Path,
    ) -> Result<()> {
        let local_path = staging_dir.join(chunk_file_name(chunk_idx));
        let table = normalize_batch(&batch.docs)?;
        let metadata = ChunkMetadata {
            batch_sha256: fingerprint,
            rows: batch.len(),
        };
        let rows = self.writer.write(&table, &local_path, &metadata)?;

        tracing::debug!(chunk_idx, rows, path = %blob_path, "Uploading chunk");
        self.store.upload(blob_path, &local_path).await?;
        log_chunk_uploaded!(chunk_idx, rows, blob_path);

        if let Err(e) = tokio::fs::remove_file(&local_path).await {
            tracing::warn!(
                path = %local_path.display(),
                error = %e,
                "Failed to remove local chunk"
            );
        }
        Ok(())
    }

    /// Compares an already uploaded chunk with the batch just re-read
    ///
    /// The chunk exists because a previous process crashed after uploading it
    /// and before saving the checkpoint. Advancing is only correct if the
    /// source still returns the same documents at this position.
    async fn verify_existing_chunk(&self, blob_path: &str, fingerprint: &str, rows: u64) -> Result<()> {
        if !self.config.export.verify_existing_chunks {
            return Ok(());
        }

        let footer = read_footer(self.store.read_bytes(blob_path).await?)?;
        match footer.batch_sha256.as_deref() {
            Some(stored) if stored == fingerprint => Ok(()),
            Some(stored) => Err(StowageError::Export(format!(
                "Existing chunk {blob_path} does not match the documents the source now returns \
                 at this position (stored {stored}, current {fingerprint}). The source changed \
                 since the chunk was uploaded; start a new run id."
            ))),
            None if footer.rows != rows as i64 => Err(StowageError::Export(format!(
                "Existing chunk {blob_path} holds {} rows but the source returned {rows}; \
                 start a new run id.",
                footer.rows
            ))),
            None => {
                tracing::warn!(
                    path = %blob_path,
                    "Existing chunk has no batch fingerprint; assuming it matches the source"
                );
                Ok(())
            }
        }
    }

    fn build_manifest(&self, checkpoint: &Checkpoint, started_utc: chrono::DateTime<Utc>) -> Manifest {
        Manifest {
            schema_version: MANIFEST_SCHEMA_VERSION,
            run_id: self.run_id().to_string(),
            db: self.config.source.database.clone(),
            collection: self.config.source.collection.clone(),
            chunks: checkpoint.chunk_idx,
            exported_docs: checkpoint.exported_docs,
            batch_size: self.config.export.batch_size,
            max_docs: self.config.export.max_docs,
            sort_field: self.config.export.sort_field.clone(),
            started_utc: checkpoint.started_utc.unwrap_or(started_utc),
            ended_utc: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::source::MemorySource;
    use crate::adapters::storage::ObjectBlobStore;
    use crate::config::{
        ApplicationConfig, ExportConfig, LoadConfig, LoggingConfig, NormalizeConfig,
        SourceConfig, StorageConfig,
    };
    use bson::doc;
    use tempfile::TempDir;

    fn config(tmp: &TempDir, batch_size: usize, max_docs: u64) -> StowageConfig {
        let mut config = StowageConfig {
            application: ApplicationConfig::default(),
            source: SourceConfig::default(),
            export: ExportConfig::default(),
            storage: StorageConfig::default(),
            normalize: NormalizeConfig::default(),
            load: LoadConfig::default(),
            logging: LoggingConfig::default(),
        };
        config.application.run_id = Some("unit".to_string());
        config.export.sort_field = "seq".to_string();
        config.export.batch_size = batch_size;
        config.export.max_docs = max_docs;
        config.export.local_tmp_dir = tmp.path().display().to_string();
        config
    }

    fn source(n: i64) -> Arc<dyn DocumentSource> {
        Arc::new(MemorySource::new(
            (1..=n).map(|i| doc! { "seq": i, "payload": format!("doc-{i}") }).collect(),
        ))
    }

    #[tokio::test]
    async fn test_exports_all_batches_and_writes_manifest() {
        let tmp = TempDir::new().unwrap();
        let store: Arc<dyn BlobStore> = Arc::new(ObjectBlobStore::in_memory());
        let (_tx, rx) = watch::channel(false);
        let coordinator =
            ExportCoordinator::new(config(&tmp, 4, 0), source(10), store.clone(), rx).unwrap();

        let summary = coordinator.execute_export().await.unwrap();

        assert_eq!(summary.chunks_written, 3);
        assert_eq!(summary.total_docs, 10);
        assert_eq!(summary.outcome, ExportOutcome::Completed);
        let layout = coordinator.layout();
        assert!(store.exists(&layout.chunk_path(3)).await.unwrap());
        assert!(!store.exists(&layout.chunk_path(4)).await.unwrap());
        assert!(store.exists(&layout.manifest_path()).await.unwrap());
        // Staging files are removed after upload.
        assert!(!tmp.path().join(chunk_file_name(1)).exists());
    }

    #[tokio::test]
    async fn test_doc_cap_trims_last_batch() {
        let tmp = TempDir::new().unwrap();
        let store: Arc<dyn BlobStore> = Arc::new(ObjectBlobStore::in_memory());
        let (_tx, rx) = watch::channel(false);
        let coordinator =
            ExportCoordinator::new(config(&tmp, 4, 6), source(10), store.clone(), rx).unwrap();

        let summary = coordinator.execute_export().await.unwrap();

        assert_eq!(summary.total_chunks, 2);
        assert_eq!(summary.total_docs, 6);
        let manifest = CheckpointStore::new(store, coordinator.layout())
            .load_manifest()
            .await
            .unwrap()
            .unwrap();
        assert_eq!(manifest.exported_docs, 6);
        assert_eq!(manifest.max_docs, 6);
    }

    #[tokio::test]
    async fn test_shutdown_stops_before_reading() {
        let tmp = TempDir::new().unwrap();
        let store: Arc<dyn BlobStore> = Arc::new(ObjectBlobStore::in_memory());
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();
        let coordinator =
            ExportCoordinator::new(config(&tmp, 4, 0), source(10), store.clone(), rx).unwrap();

        let summary = coordinator.execute_export().await.unwrap();

        assert_eq!(summary.outcome, ExportOutcome::Interrupted);
        assert_eq!(summary.total_chunks, 0);
        assert!(!store
            .exists(&coordinator.layout().manifest_path())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_empty_source_completes_with_zero_chunks() {
        let tmp = TempDir::new().unwrap();
        let store: Arc<dyn BlobStore> = Arc::new(ObjectBlobStore::in_memory());
        let (_tx, rx) = watch::channel(false);
        let coordinator =
            ExportCoordinator::new(config(&tmp, 4, 0), source(0), store, rx).unwrap();

        let summary = coordinator.execute_export().await.unwrap();

        assert_eq!(summary.total_chunks, 0);
        assert!(summary.is_complete());
    }
}
