//! Export summary and reporting
//!
//! This module defines the structure returned by one export invocation.

use std::time::Duration;

/// How an export invocation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportOutcome {
    /// Source exhausted (or cap reached) and manifest written
    #[default]
    Completed,
    /// The run already had a manifest; nothing was written
    AlreadyComplete,
    /// Stopped on a shutdown signal between batches
    Interrupted,
}

/// Summary of an export invocation
#[derive(Debug, Clone, Default)]
pub struct ExportSummary {
    pub run_id: String,

    /// Chunks written and uploaded by this invocation
    pub chunks_written: u64,

    /// Chunks found already uploaded and only checkpointed
    pub chunks_skipped: u64,

    /// Documents accounted for by this invocation
    pub docs_exported: u64,

    /// Chunk index in the checkpoint after this invocation
    pub total_chunks: u64,

    /// Document count in the checkpoint after this invocation
    pub total_docs: u64,

    /// Duration of the invocation
    pub duration: Duration,

    pub outcome: ExportOutcome,
}

impl ExportSummary {
    /// Create a new empty export summary
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            ..Default::default()
        }
    }

    /// Set the duration
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Whether the run is finished (manifest present)
    pub fn is_complete(&self) -> bool {
        matches!(
            self.outcome,
            ExportOutcome::Completed | ExportOutcome::AlreadyComplete
        )
    }

    /// Documents per second over this invocation
    pub fn throughput(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        self.docs_exported as f64 / secs
    }

    /// Log the summary
    pub fn log_summary(&self) {
        tracing::info!(
            run_id = %self.run_id,
            outcome = ?self.outcome,
            chunks_written = self.chunks_written,
            chunks_skipped = self.chunks_skipped,
            docs_exported = self.docs_exported,
            total_chunks = self.total_chunks,
            total_docs = self.total_docs,
            duration_secs = self.duration.as_secs(),
            docs_per_sec = %format!("{:.1}", self.throughput()),
            "Export summary"
        );

        if self.outcome == ExportOutcome::Interrupted {
            tracing::warn!(
                run_id = %self.run_id,
                "Export interrupted; rerun with the same run id to resume"
            );
        }
    }
}
