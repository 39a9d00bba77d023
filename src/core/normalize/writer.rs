//! Parquet chunk writer
//!
//! Writes one normalized batch to a local staging file. The file is written
//! under a `.tmp` name and renamed into place once the footer is flushed, so
//! a crash never leaves a truncated chunk behind under its final name.

use crate::config::CompressionCodec;
use crate::domain::{Result, StowageError};
use arrow::array::RecordBatch;
use bytes::Bytes;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::metadata::KeyValue;
use parquet::file::properties::WriterProperties;
use parquet::file::reader::{FileReader, SerializedFileReader};
use std::fs::{self, File};
use std::path::Path;

/// Footer key holding the batch fingerprint
pub const FINGERPRINT_KEY: &str = "stowage.batch_sha256";

/// Footer key holding the row count
pub const ROWS_KEY: &str = "stowage.rows";

/// File name of chunk `idx`; zero padding keeps lexical and export order equal
pub fn chunk_file_name(idx: u64) -> String {
    format!("part-{idx:06}.parquet")
}

/// Provenance stored in the chunk footer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkMetadata {
    pub batch_sha256: String,
    pub rows: usize,
}

impl ChunkMetadata {
    fn key_values(&self) -> Vec<KeyValue> {
        vec![
            KeyValue::new(FINGERPRINT_KEY.to_string(), self.batch_sha256.clone()),
            KeyValue::new(ROWS_KEY.to_string(), self.rows.to_string()),
        ]
    }
}

/// What a chunk footer says about its content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkFooter {
    /// Missing for files written by other tools
    pub batch_sha256: Option<String>,
    pub rows: i64,
}

/// Maps the configured codec onto Parquet compression
pub fn compression_for(codec: CompressionCodec) -> Compression {
    match codec {
        CompressionCodec::Snappy => Compression::SNAPPY,
        CompressionCodec::Zstd => Compression::ZSTD(ZstdLevel::default()),
        CompressionCodec::None => Compression::UNCOMPRESSED,
    }
}

/// Writer properties shared by the exporter and the drift rewrite
pub fn writer_properties(
    codec: CompressionCodec,
    metadata: Option<Vec<KeyValue>>,
) -> WriterProperties {
    WriterProperties::builder()
        .set_compression(compression_for(codec))
        .set_key_value_metadata(metadata)
        .build()
}

/// Writes normalized batches as single-file Parquet chunks
#[derive(Debug, Clone, Copy, Default)]
pub struct ChunkWriter {
    codec: CompressionCodec,
}

impl ChunkWriter {
    pub fn new(codec: CompressionCodec) -> Self {
        Self { codec }
    }

    /// Write `batch` to `path`, returning the number of rows written
    ///
    /// # Errors
    ///
    /// I/O and encoding failures are returned as is; nothing is retried.
    pub fn write(&self, batch: &RecordBatch, path: &Path, metadata: &ChunkMetadata) -> Result<usize> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                StowageError::Io(format!("Failed to create {}: {e}", parent.display()))
            })?;
        }

        let tmp_path = path.with_extension("parquet.tmp");
        if tmp_path.exists() {
            fs::remove_file(&tmp_path)?;
        }

        let file = File::create(&tmp_path).map_err(|e| {
            StowageError::Io(format!("Failed to create {}: {e}", tmp_path.display()))
        })?;
        let props = writer_properties(self.codec, Some(metadata.key_values()));
        let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
        writer.write(batch)?;
        writer.close()?;

        fs::rename(&tmp_path, path).map_err(|e| {
            StowageError::Io(format!("Failed to move chunk into {}: {e}", path.display()))
        })?;

        Ok(batch.num_rows())
    }
}

/// Reads the provenance entries from an encoded chunk's footer
///
/// Only the footer is decoded; row groups are not touched.
pub fn read_footer(bytes: Bytes) -> Result<ChunkFooter> {
    let reader = SerializedFileReader::new(bytes)?;
    let file_metadata = reader.metadata().file_metadata();

    let batch_sha256 = file_metadata.key_value_metadata().and_then(|entries| {
        entries
            .iter()
            .find(|kv| kv.key == FINGERPRINT_KEY)
            .and_then(|kv| kv.value.clone())
    });

    Ok(ChunkFooter {
        batch_sha256,
        rows: file_metadata.num_rows(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::normalize::normalize_batch;
    use bson::doc;
    use tempfile::TempDir;

    #[test]
    fn test_chunk_file_name_is_zero_padded() {
        assert_eq!(chunk_file_name(1), "part-000001.parquet");
        assert_eq!(chunk_file_name(123456), "part-123456.parquet");
        assert!(chunk_file_name(9) < chunk_file_name(10));
    }

    #[test]
    fn test_write_then_read_footer() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("part-000001.parquet");
        let batch = normalize_batch(&[doc! { "_id": 1 }, doc! { "_id": 2 }]).unwrap();
        let metadata = ChunkMetadata {
            batch_sha256: "abc123".to_string(),
            rows: 2,
        };

        let rows = ChunkWriter::new(CompressionCodec::Zstd)
            .write(&batch, &path, &metadata)
            .unwrap();

        assert_eq!(rows, 2);
        assert!(path.exists());
        assert!(!path.with_extension("parquet.tmp").exists());

        let footer = read_footer(Bytes::from(fs::read(&path).unwrap())).unwrap();
        assert_eq!(footer.batch_sha256.as_deref(), Some("abc123"));
        assert_eq!(footer.rows, 2);
    }

    #[test]
    fn test_footer_without_fingerprint() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("foreign.parquet");
        let batch = normalize_batch(&[doc! { "a": "x" }]).unwrap();

        let file = File::create(&path).unwrap();
        let mut writer = ArrowWriter::try_new(file, batch.schema(), None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let footer = read_footer(Bytes::from(fs::read(&path).unwrap())).unwrap();
        assert_eq!(footer.batch_sha256, None);
        assert_eq!(footer.rows, 1);
    }
}
