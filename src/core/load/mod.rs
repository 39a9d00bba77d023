//! Downstream warehouse load planning
//!
//! Splits the chunk files of a run into load jobs small enough for a
//! warehouse's per-job source limit. Only the seam to a warehouse client is
//! defined here ([`WarehouseLoader`]); no client ships with the crate.

use crate::domain::{Result, StowageError};
use async_trait::async_trait;
use std::fmt;

/// Default maximum source URIs per job
pub const DEFAULT_MAX_URIS_PER_JOB: usize = 9500;

/// How a job writes into the destination table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Replace the table contents
    Truncate,
    Append,
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteMode::Truncate => write!(f, "truncate"),
            WriteMode::Append => write!(f, "append"),
        }
    }
}

/// One load job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadJob {
    /// 1-based position in the plan
    pub index: usize,
    pub mode: WriteMode,
    pub uris: Vec<String>,
}

/// Client able to run a load job against a warehouse table
#[async_trait]
pub trait WarehouseLoader: Send + Sync {
    /// Runs one job to completion, returning the rows loaded
    async fn submit(&self, job: &LoadJob) -> Result<u64>;
}

/// Splits `uris` into jobs of at most `max_uris_per_job`
///
/// The first job uses `mode`; every later job appends, so a truncating load
/// only truncates once.
pub fn plan_load(uris: &[String], max_uris_per_job: usize, mode: WriteMode) -> Vec<LoadJob> {
    uris.chunks(max_uris_per_job.max(1))
        .enumerate()
        .map(|(i, chunk)| LoadJob {
            index: i + 1,
            mode: if i == 0 { mode } else { WriteMode::Append },
            uris: chunk.to_vec(),
        })
        .collect()
}

/// Full URI of an object, e.g. `gs://bucket/path`
pub fn object_uri(store_location: &str, path: &str) -> String {
    if store_location.ends_with("://") {
        format!("{store_location}{path}")
    } else {
        format!("{}/{path}", store_location.trim_end_matches('/'))
    }
}

/// Submits `jobs` in order, stopping at the first failure
///
/// Returns the total rows reported by the loader.
pub async fn run_load(loader: &dyn WarehouseLoader, jobs: &[LoadJob]) -> Result<u64> {
    let mut rows = 0;
    for job in jobs {
        tracing::info!(
            job = job.index,
            jobs = jobs.len(),
            files = job.uris.len(),
            mode = %job.mode,
            "Submitting load job"
        );
        rows += loader.submit(job).await.map_err(|e| {
            StowageError::Other(format!("Load job {}/{} failed: {e}", job.index, jobs.len()))
        })?;
    }
    Ok(rows)
}
