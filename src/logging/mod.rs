//! Logging and observability
//!
//! Structured logging through `tracing`:
//! - human-readable console output
//! - optional JSON file output with rotation
//! - a few macros for events that are logged from several places
//!
//! # Example
//!
//! ```no_run
//! use stowage::logging::init_logging;
//! use stowage::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!(chunk_idx = 3, "Uploaded chunk");
//! ```

pub mod structured;

// Re-export commonly used items
pub use structured::{init_logging, parse_log_level, LoggingGuard};

/// Log a chunk that reached durable storage
///
/// # Example
///
/// ```no_run
/// use stowage::log_chunk_uploaded;
///
/// log_chunk_uploaded!(7, 5000, "exports/run_id=r1/part-000007.parquet");
/// ```
#[macro_export]
macro_rules! log_chunk_uploaded {
    ($chunk_idx:expr, $rows:expr, $path:expr) => {
        tracing::info!(
            chunk_idx = $chunk_idx,
            rows = $rows,
            path = %$path,
            "Uploaded chunk"
        );
    };
}

/// Log the completion of an export run
///
/// # Example
///
/// ```no_run
/// use stowage::log_export_complete;
/// use std::time::Duration;
///
/// log_export_complete!(3, 12345, Duration::from_secs(10));
/// ```
#[macro_export]
macro_rules! log_export_complete {
    ($chunks:expr, $docs:expr, $duration:expr) => {
        tracing::info!(
            chunks = $chunks,
            exported_docs = $docs,
            duration_ms = $duration.as_millis() as u64,
            "Export completed"
        );
    };
}

/// Log a retry attempt at the storage boundary
///
/// # Example
///
/// ```no_run
/// use stowage::log_retry_attempt;
/// use std::time::Duration;
///
/// log_retry_attempt!("upload", 2, Duration::from_millis(1500), "503 Service Unavailable");
/// ```
#[macro_export]
macro_rules! log_retry_attempt {
    ($operation:expr, $attempt:expr, $delay:expr, $reason:expr) => {
        tracing::warn!(
            operation = $operation,
            attempt = $attempt,
            delay_ms = $delay.as_millis() as u64,
            reason = %$reason,
            "Retrying storage operation"
        );
    };
}
