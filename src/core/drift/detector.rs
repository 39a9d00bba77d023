//! Schema drift detection
//!
//! Reads the footers of a deterministic sample of chunk files and reports
//! every column that was encoded with more than one type. Only Parquet
//! metadata is decoded, never row groups.

use crate::adapters::storage::BlobStore;
use crate::domain::{Result, StowageError};
use arrow::datatypes::SchemaRef;
use parquet::arrow::parquet_to_arrow_schema;
use parquet::file::reader::{FileReader, SerializedFileReader};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

const SUSPICIOUS_PREFIXES: &[&str] = &["is_", "has_", "key_", "cat_", "flag_"];
const SUSPICIOUS_CONTAINS: &[&str] = &["_id", "id_", "uuid", "guid", "code", "type", "search"];
const SUSPICIOUS_SUFFIXES: &[&str] = &["_id", "_code", "_type", "_key"];

/// Lines of drifting columns printed by [`DriftPlan::log_plan`]
const PLAN_DRIFT_LINES: usize = 20;
/// Target columns printed by [`DriftPlan::log_plan`]
const PLAN_TARGET_LINES: usize = 30;

/// Lists the `*.parquet` objects under `prefix`, sorted
pub async fn list_parquet(store: &dyn BlobStore, prefix: &str) -> Result<Vec<String>> {
    let mut files: Vec<String> = store
        .list(prefix)
        .await?
        .into_iter()
        .filter(|path| path.ends_with(".parquet"))
        .collect();
    files.sort();
    Ok(files)
}

/// Reads the Arrow schema stored in a Parquet file's footer
///
/// # Errors
///
/// Returns the storage error of the read, or a drift error if the footer
/// cannot be decoded.
pub async fn read_schema(store: &dyn BlobStore, path: &str) -> Result<SchemaRef> {
    let bytes = store.read_bytes(path).await?;
    let reader = SerializedFileReader::new(bytes)
        .map_err(|e| StowageError::Drift(format!("Unreadable footer in {path}: {e}")))?;
    let file_metadata = reader.metadata().file_metadata();
    let schema = parquet_to_arrow_schema(
        file_metadata.schema_descr(),
        file_metadata.key_value_metadata(),
    )
    .map_err(|e| StowageError::Drift(format!("Unsupported schema in {path}: {e}")))?;
    Ok(Arc::new(schema))
}

/// Whether a column name looks like an identifier or a flag
///
/// Such columns tend to drift outside any sample window (numeric ids that
/// later turn alphanumeric, booleans stored as 0/1 or "yes").
pub fn is_suspicious(name: &str) -> bool {
    let name = name.to_lowercase();
    SUSPICIOUS_PREFIXES.iter().any(|p| name.starts_with(p))
        || SUSPICIOUS_SUFFIXES.iter().any(|s| name.ends_with(s))
        || SUSPICIOUS_CONTAINS.iter().any(|c| name.contains(c))
}

/// Column name to the distinct types observed for it in the sample
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriftReport {
    pub types: BTreeMap<String, BTreeSet<String>>,
    /// Files whose schema was read successfully
    pub sampled: usize,
}

impl DriftReport {
    /// Builds a report from already-read schemas, ignoring `excluded` columns
    pub fn from_schemas(schemas: &[SchemaRef], excluded: &BTreeSet<String>) -> Self {
        let mut types: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for schema in schemas {
            for field in schema.fields() {
                if excluded.contains(field.name()) {
                    continue;
                }
                types
                    .entry(field.name().clone())
                    .or_default()
                    .insert(field.data_type().to_string());
            }
        }
        Self {
            types,
            sampled: schemas.len(),
        }
    }

    /// Samples the first `sample_size` of the sorted `files` and builds a report
    ///
    /// A file whose schema cannot be read is logged and left out of the
    /// sample.
    pub async fn sample(
        store: &dyn BlobStore,
        files: &[String],
        sample_size: usize,
        excluded: &BTreeSet<String>,
    ) -> Self {
        let sample = &files[..sample_size.min(files.len())];
        tracing::info!(files = sample.len(), "Sampling files for schema drift");

        let mut schemas = Vec::with_capacity(sample.len());
        for path in sample {
            match read_schema(store, path).await {
                Ok(schema) => schemas.push(schema),
                Err(e) => tracing::warn!(path = %path, error = %e, "Failed to read schema"),
            }
        }
        Self::from_schemas(&schemas, excluded)
    }

    /// Columns observed with more than one type
    pub fn drifting(&self) -> BTreeMap<&str, &BTreeSet<String>> {
        self.types
            .iter()
            .filter(|(_, types)| types.len() > 1)
            .map(|(name, types)| (name.as_str(), types))
            .collect()
    }

    /// Observed columns matching the naming heuristics
    pub fn suspicious(&self) -> BTreeSet<String> {
        self.types
            .keys()
            .filter(|name| is_suspicious(name))
            .cloned()
            .collect()
    }
}

/// Columns the rewrite pass casts to text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriftPlan {
    pub drifting: BTreeMap<String, BTreeSet<String>>,
    pub suspicious: BTreeSet<String>,
    pub forced: BTreeSet<String>,
    pub excluded: BTreeSet<String>,
    pub targets: BTreeSet<String>,
}

impl DriftPlan {
    /// Targets are drifting columns, plus forced ones, plus suspicious ones
    /// when `include_suspicious` is set, minus excluded ones
    pub fn resolve(
        report: &DriftReport,
        forced: BTreeSet<String>,
        excluded: BTreeSet<String>,
        include_suspicious: bool,
    ) -> Self {
        let drifting: BTreeMap<String, BTreeSet<String>> = report
            .drifting()
            .into_iter()
            .filter(|(name, _)| !excluded.contains(*name))
            .map(|(name, types)| (name.to_string(), types.clone()))
            .collect();
        let suspicious: BTreeSet<String> = report
            .suspicious()
            .into_iter()
            .filter(|name| !excluded.contains(name))
            .collect();

        let mut targets: BTreeSet<String> = drifting.keys().cloned().collect();
        targets.extend(forced.iter().cloned());
        if include_suspicious {
            targets.extend(suspicious.iter().cloned());
        }
        targets.retain(|name| !excluded.contains(name));

        Self {
            drifting,
            suspicious,
            forced,
            excluded,
            targets,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn log_plan(&self) {
        tracing::info!(
            drifting = self.drifting.len(),
            suspicious = self.suspicious.len(),
            forced = ?self.forced,
            excluded = ?self.excluded,
            targets = self.targets.len(),
            "Drift plan"
        );
        for (name, types) in self.drifting.iter().take(PLAN_DRIFT_LINES) {
            tracing::info!(column = %name, types = ?types, "Drifting column");
        }
        if self.drifting.len() > PLAN_DRIFT_LINES {
            tracing::info!(
                more = self.drifting.len() - PLAN_DRIFT_LINES,
                "More drifting columns not shown"
            );
        }
        if !self.targets.is_empty() {
            let first: Vec<&str> = self
                .targets
                .iter()
                .take(PLAN_TARGET_LINES)
                .map(String::as_str)
                .collect();
            tracing::info!(columns = ?first, "Columns cast to text (first {PLAN_TARGET_LINES})");
        }
    }
}
