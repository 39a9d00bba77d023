//! Drift rewrite pass
//!
//! Copies every chunk under a source prefix to a mirrored destination path,
//! casting the planned columns to text on the way. Files already present at
//! the destination are skipped, which makes the pass restartable at whole
//! file granularity. Destination objects are published with
//! [`BlobStore::put_bytes_atomic`], so a file that failed mid-write never
//! looks finished to the next run.

use super::detector::DriftPlan;
use crate::adapters::storage::BlobStore;
use crate::config::{CompressionCodec, NormalizeConfig};
use crate::core::normalize::writer::writer_properties;
use crate::domain::{Result, StowageError};
use arrow::array::{Array, ArrayRef, RecordBatch, StringBuilder};
use arrow::compute::{can_cast_types, cast_with_options, CastOptions};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::util::display::{ArrayFormatter, FormatOptions};
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::file::metadata::KeyValue;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Footer key the Arrow writer manages itself
const ARROW_SCHEMA_KEY: &str = "ARROW:schema";

/// Failures listed by [`RewriteSummary::log_summary`]
const LOGGED_FAILURES: usize = 10;

/// A file the pass could not rewrite
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteFailure {
    pub path: String,
    pub error: String,
}

/// Result of one rewrite pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteSummary {
    pub total: usize,
    pub rewritten: usize,
    pub skipped_existing: usize,
    pub failures: Vec<RewriteFailure>,
}

impl RewriteSummary {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn log_summary(&self) {
        tracing::info!(
            total = self.total,
            rewritten = self.rewritten,
            skipped = self.skipped_existing,
            failed = self.failures.len(),
            "Drift rewrite finished"
        );
        for failure in self.failures.iter().take(LOGGED_FAILURES) {
            tracing::error!(path = %failure.path, error = %failure.error, "Rewrite failed");
        }
    }
}

enum FileOutcome {
    Rewritten,
    Skipped,
}

/// Rewrites chunk files with the planned columns cast to text
pub struct DriftNormalizer {
    store: Arc<dyn BlobStore>,
    codec: CompressionCodec,
    overwrite: bool,
    concurrency: usize,
    log_every: usize,
}

impl DriftNormalizer {
    pub fn new(store: Arc<dyn BlobStore>, config: &NormalizeConfig) -> Self {
        Self {
            store,
            codec: config.compression,
            overwrite: !config.resume,
            concurrency: config.concurrency.max(1),
            log_every: config.log_every.max(1),
        }
    }

    /// Rewrite files even when the destination already exists
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Rewrites every file in `files` from `src_prefix` to `dst_prefix`
    ///
    /// Per-file failures are collected in the summary and never stop the
    /// remaining files.
    pub async fn run(
        &self,
        files: &[String],
        src_prefix: &str,
        dst_prefix: &str,
        plan: &DriftPlan,
    ) -> RewriteSummary {
        let src_prefix = src_prefix.trim_matches('/');
        let dst_prefix = dst_prefix.trim_matches('/');
        let total = files.len();
        let mut summary = RewriteSummary {
            total,
            ..Default::default()
        };

        tracing::info!(
            files = total,
            src = %src_prefix,
            dst = %dst_prefix,
            columns = plan.targets.len(),
            concurrency = self.concurrency,
            "Starting drift rewrite"
        );

        let mut results = stream::iter(files.iter())
            .map(|src| async move {
                let outcome = match mirrored_path(src, src_prefix, dst_prefix) {
                    Some(dst) => self.rewrite_file(src, &dst, &plan.targets).await,
                    None => Err(StowageError::Drift(format!(
                        "{src} is not under {src_prefix}"
                    ))),
                };
                (src, outcome)
            })
            .buffer_unordered(self.concurrency);

        let mut done = 0;
        while let Some((src, outcome)) = results.next().await {
            done += 1;
            match outcome {
                Ok(FileOutcome::Rewritten) => summary.rewritten += 1,
                Ok(FileOutcome::Skipped) => summary.skipped_existing += 1,
                Err(e) => {
                    tracing::warn!(path = %src, error = %e, "Failed to rewrite file");
                    summary.failures.push(RewriteFailure {
                        path: src.clone(),
                        error: e.to_string(),
                    });
                }
            }

            if done % self.log_every == 0 || done == total {
                tracing::info!(
                    progress = %format!("{done}/{total}"),
                    written = summary.rewritten,
                    skipped = summary.skipped_existing,
                    failed = summary.failures.len(),
                    last = %src,
                    "Drift rewrite progress"
                );
            }
        }

        summary.failures.sort_by(|a, b| a.path.cmp(&b.path));
        summary
    }

    async fn rewrite_file(
        &self,
        src: &str,
        dst: &str,
        targets: &BTreeSet<String>,
    ) -> Result<FileOutcome> {
        if !self.overwrite && self.store.exists(dst).await? {
            tracing::debug!(path = %dst, "Destination exists, skipping");
            return Ok(FileOutcome::Skipped);
        }

        let bytes = self.store.read_bytes(src).await?;
        let encoded = rewrite_bytes(bytes, targets, self.codec)?;
        self.store.put_bytes_atomic(dst, encoded).await?;
        Ok(FileOutcome::Rewritten)
    }
}

/// `src` relative to `src_prefix`, re-rooted under `dst_prefix`
pub fn mirrored_path(src: &str, src_prefix: &str, dst_prefix: &str) -> Option<String> {
    let relative = if src_prefix.is_empty() {
        src
    } else {
        src.strip_prefix(src_prefix)?.strip_prefix('/')?
    };
    Some(if dst_prefix.is_empty() {
        relative.to_string()
    } else {
        format!("{dst_prefix}/{relative}")
    })
}

/// Decodes a Parquet file, casts `targets` to text and re-encodes it
///
/// Footer entries of the source file are carried over.
pub fn rewrite_bytes(
    bytes: Bytes,
    targets: &BTreeSet<String>,
    codec: CompressionCodec,
) -> Result<Bytes> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(bytes)?;
    let source_schema = builder.schema().clone();
    let footer: Vec<KeyValue> = builder
        .metadata()
        .file_metadata()
        .key_value_metadata()
        .map(|entries| {
            entries
                .iter()
                .filter(|kv| kv.key != ARROW_SCHEMA_KEY)
                .cloned()
                .collect()
        })
        .unwrap_or_default();
    let reader = builder.build()?;

    let schema = text_schema(&source_schema, targets);
    let props = writer_properties(codec, (!footer.is_empty()).then_some(footer));
    let mut buf = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buf, schema.clone(), Some(props))?;
    for batch in reader {
        let batch = cast_batch(&batch?, &schema)?;
        writer.write(&batch)?;
    }
    writer.close()?;

    Ok(Bytes::from(buf))
}

fn text_schema(schema: &SchemaRef, targets: &BTreeSet<String>) -> SchemaRef {
    let fields: Vec<Field> = schema
        .fields()
        .iter()
        .map(|field| {
            if targets.contains(field.name()) {
                Field::new(field.name(), DataType::Utf8, true)
                    .with_metadata(field.metadata().clone())
            } else {
                field.as_ref().clone()
            }
        })
        .collect();
    Arc::new(Schema::new_with_metadata(fields, schema.metadata().clone()))
}

fn cast_batch(batch: &RecordBatch, schema: &SchemaRef) -> Result<RecordBatch> {
    let columns = batch
        .columns()
        .iter()
        .zip(schema.fields())
        .map(|(column, field)| {
            if column.data_type() == field.data_type() {
                Ok(column.clone())
            } else {
                cast_to_utf8(column)
            }
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(RecordBatch::try_new(schema.clone(), columns)?)
}

/// Casts any array to `Utf8`
///
/// Values the cast kernel cannot convert become null. Types the kernel does
/// not support at all are rendered with Arrow's display formatter.
pub fn cast_to_utf8(array: &ArrayRef) -> Result<ArrayRef> {
    if can_cast_types(array.data_type(), &DataType::Utf8) {
        let options = CastOptions {
            safe: true,
            format_options: FormatOptions::default(),
        };
        return Ok(cast_with_options(array, &DataType::Utf8, &options)?);
    }

    let options = FormatOptions::default();
    let formatter = ArrayFormatter::try_new(array.as_ref(), &options)?;
    let mut builder = StringBuilder::with_capacity(array.len(), array.len() * 8);
    for i in 0..array.len() {
        if array.is_null(i) {
            builder.append_null();
        } else {
            builder.append_value(formatter.value(i).to_string());
        }
    }
    Ok(Arc::new(builder.finish()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::storage::ObjectBlobStore;
    use crate::core::drift::detector::{read_schema, DriftReport};
    use arrow::array::{BooleanArray, Int64Array, ListArray, StringArray};
    use arrow::datatypes::Int32Type;

    fn encode(batch: &RecordBatch) -> Bytes {
        let mut buf = Vec::new();
        let mut writer = ArrowWriter::try_new(&mut buf, batch.schema(), None).unwrap();
        writer.write(batch).unwrap();
        writer.close().unwrap();
        Bytes::from(buf)
    }

    fn int_chunk(values: Vec<Option<i64>>) -> Bytes {
        encode(
            &RecordBatch::try_from_iter(vec![
                ("code", Arc::new(Int64Array::from(values)) as ArrayRef),
                ("flag", Arc::new(BooleanArray::from(vec![true, false])) as ArrayRef),
            ])
            .unwrap(),
        )
    }

    fn text_chunk() -> Bytes {
        encode(
            &RecordBatch::try_from_iter(vec![
                ("code", Arc::new(StringArray::from(vec!["A1", "B2"])) as ArrayRef),
                ("flag", Arc::new(BooleanArray::from(vec![true, true])) as ArrayRef),
            ])
            .unwrap(),
        )
    }

    fn targets(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_mirrored_path() {
        assert_eq!(
            mirrored_path("exports/run_id=r/part-000001.parquet", "exports", "exports_normalized"),
            Some("exports_normalized/run_id=r/part-000001.parquet".to_string())
        );
        assert_eq!(mirrored_path("elsewhere/a.parquet", "exports", "out"), None);
        assert_eq!(mirrored_path("exportsX/a.parquet", "exports", "out"), None);
    }

    #[test]
    fn test_cast_to_utf8_keeps_nulls() {
        let array: ArrayRef = Arc::new(Int64Array::from(vec![Some(7), None]));
        let cast = cast_to_utf8(&array).unwrap();
        let cast = cast.as_any().downcast_ref::<StringArray>().unwrap();
        assert_eq!(cast.value(0), "7");
        assert!(cast.is_null(1));
    }

    #[test]
    fn test_cast_to_utf8_handles_nested_types() {
        let array: ArrayRef = Arc::new(ListArray::from_iter_primitive::<Int32Type, _, _>(vec![
            Some(vec![Some(1), Some(2)]),
            None,
        ]));
        let cast = cast_to_utf8(&array).unwrap();
        assert_eq!(cast.data_type(), &DataType::Utf8);
        assert_eq!(cast.len(), 2);
        assert!(cast.is_null(1));
    }

    #[test]
    fn test_rewrite_bytes_only_changes_targets() {
        let out = rewrite_bytes(
            int_chunk(vec![Some(1), Some(2)]),
            &targets(&["code"]),
            CompressionCodec::Snappy,
        )
        .unwrap();

        let reader = ParquetRecordBatchReaderBuilder::try_new(out)
            .unwrap()
            .build()
            .unwrap();
        let batches: Vec<RecordBatch> = reader.map(|b| b.unwrap()).collect();
        let schema = batches[0].schema();
        assert_eq!(schema.field(0).data_type(), &DataType::Utf8);
        assert_eq!(schema.field(1).data_type(), &DataType::Boolean);
        assert_eq!(batches[0].num_rows(), 2);
    }

    #[tokio::test]
    async fn test_run_rewrites_resumes_and_collects_failures() {
        let store: Arc<dyn BlobStore> = Arc::new(ObjectBlobStore::in_memory());
        store
            .put_bytes_atomic("src/part-000001.parquet", int_chunk(vec![Some(1), None]))
            .await
            .unwrap();
        store
            .put_bytes_atomic("src/part-000002.parquet", text_chunk())
            .await
            .unwrap();
        store
            .put_bytes_atomic("src/part-000003.parquet", Bytes::from_static(b"not parquet"))
            .await
            .unwrap();

        let files = crate::core::drift::list_parquet(store.as_ref(), "src").await.unwrap();
        let report = DriftReport::sample(store.as_ref(), &files, 2, &BTreeSet::new()).await;
        let plan = DriftPlan::resolve(&report, BTreeSet::new(), BTreeSet::new(), false);
        assert_eq!(plan.targets, targets(&["code"]));

        let normalizer = DriftNormalizer::new(store.clone(), &NormalizeConfig::default());
        let summary = normalizer.run(&files, "src", "dst", &plan).await;
        assert_eq!(summary.total, 3);
        assert_eq!(summary.rewritten, 2);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].path, "src/part-000003.parquet");
        assert!(!store.exists("dst/part-000003.parquet").await.unwrap());

        let first = store.read_bytes("dst/part-000001.parquet").await.unwrap();
        let schema = read_schema(store.as_ref(), "dst/part-000001.parquet").await.unwrap();
        assert_eq!(schema.field(0).data_type(), &DataType::Utf8);

        let again = normalizer.run(&files, "src", "dst", &plan).await;
        assert_eq!(again.rewritten, 0);
        assert_eq!(again.skipped_existing, 2);
        assert_eq!(
            store.read_bytes("dst/part-000001.parquet").await.unwrap(),
            first
        );
    }
}
