//! Normalize command implementation
//!
//! This module implements the `normalize` command: schema drift detection
//! over an exported run followed by the rewrite pass into a mirror prefix.

use super::{existing_run_layout, load_or_exit_code, parse_csv_set};
use crate::adapters::storage::create_blob_store;
use crate::core::drift::{list_parquet, DriftNormalizer, DriftPlan, DriftReport};
use clap::Args;

/// Failures printed at the end of a pass
const PRINTED_FAILURES: usize = 10;

/// Arguments for the normalize command
#[derive(Args, Debug, Default)]
pub struct NormalizeArgs {
    /// Run to normalize; defaults to application.run_id
    #[arg(long)]
    pub run_id: Option<String>,

    /// Source prefix (defaults to the run prefix)
    #[arg(long)]
    pub src_prefix: Option<String>,

    /// Destination prefix (defaults to the `_normalized` mirror of the run)
    #[arg(long)]
    pub dst_prefix: Option<String>,

    /// Number of files sampled for drift detection
    #[arg(long)]
    pub sample_size: Option<usize>,

    /// Comma-separated columns to always cast to text
    #[arg(long)]
    pub force_string_cols: Option<String>,

    /// Comma-separated columns never to cast
    #[arg(long)]
    pub exclude_cols: Option<String>,

    /// Also cast every column whose name looks like an id or flag
    #[arg(long)]
    pub include_all_suspicious: bool,

    /// Rewrite files already present at the destination
    #[arg(long)]
    pub overwrite: bool,

    /// Files processed concurrently
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Progress line every N files
    #[arg(long)]
    pub log_every: Option<usize>,

    /// Print the plan and stop
    #[arg(long)]
    pub plan_only: bool,
}

impl NormalizeArgs {
    /// Execute the normalize command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!("Starting normalize command");

        let mut config = match load_or_exit_code(config_path) {
            Ok(c) => c,
            Err(code) => return Ok(code),
        };

        let normalize = &mut config.normalize;
        if let Some(n) = self.sample_size {
            normalize.sample_size = n;
        }
        if let Some(n) = self.concurrency {
            normalize.concurrency = n;
        }
        if let Some(n) = self.log_every {
            normalize.log_every = n;
        }
        if self.src_prefix.is_some() {
            normalize.src_prefix = self.src_prefix.clone();
        }
        if self.dst_prefix.is_some() {
            normalize.dst_prefix = self.dst_prefix.clone();
        }
        if self.force_string_cols.is_some() {
            normalize.force_string_cols =
                parse_csv_set(self.force_string_cols.as_deref()).into_iter().collect();
        }
        if self.exclude_cols.is_some() {
            normalize.exclude_cols =
                parse_csv_set(self.exclude_cols.as_deref()).into_iter().collect();
        }
        normalize.include_all_suspicious |= self.include_all_suspicious;

        if let Err(e) = config.validate() {
            eprintln!("Configuration validation failed: {e}");
            return Ok(2);
        }

        let layout = match existing_run_layout(&config, self.run_id.as_deref()) {
            Ok(layout) => layout,
            Err(e) => {
                eprintln!("Invalid run id: {e}");
                return Ok(2);
            }
        };
        let src_prefix = match (&config.normalize.src_prefix, &layout) {
            (Some(prefix), _) => prefix.trim_matches('/').to_string(),
            (None, Some(layout)) => layout.run_prefix(),
            (None, None) => {
                eprintln!("Either --run-id or --src-prefix is required");
                return Ok(2);
            }
        };
        let dst_prefix = match (&config.normalize.dst_prefix, &layout) {
            (Some(prefix), _) => prefix.trim_matches('/').to_string(),
            (None, Some(layout)) => layout.normalized_prefix(),
            (None, None) => {
                eprintln!("--dst-prefix is required when no run id is given");
                return Ok(2);
            }
        };
        if src_prefix == dst_prefix {
            eprintln!("Source and destination prefixes must differ: {src_prefix}");
            return Ok(2);
        }

        let store = match create_blob_store(&config.storage) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("Failed to open storage: {e}");
                return Ok(4);
            }
        };

        let files = match list_parquet(store.as_ref(), &src_prefix).await {
            Ok(files) if files.is_empty() => {
                eprintln!("No parquet files found under {}/{src_prefix}", store.describe());
                return Ok(5);
            }
            Ok(files) => files,
            Err(e) => {
                eprintln!("Failed to list {src_prefix}: {e}");
                return Ok(5);
            }
        };
        println!("Found {} parquet files under {}/{src_prefix}", files.len(), store.describe());

        let forced = config.normalize.force_string_cols.iter().cloned().collect();
        let excluded = config.normalize.exclude_cols.iter().cloned().collect();
        let report = DriftReport::sample(
            store.as_ref(),
            &files,
            config.normalize.sample_size,
            &excluded,
        )
        .await;
        let plan = DriftPlan::resolve(
            &report,
            forced,
            excluded,
            config.normalize.include_all_suspicious,
        );
        plan.log_plan();

        println!();
        println!("=== Plan ===");
        println!("Sampled files: {}", report.sampled);
        println!("Drifting columns: {}", plan.drifting.len());
        for (column, types) in plan.drifting.iter().take(20) {
            println!(" - {column}: {types:?}");
        }
        if plan.drifting.len() > 20 {
            println!(" ... and {} more", plan.drifting.len() - 20);
        }
        println!("Suspicious columns (name-based): {}", plan.suspicious.len());
        println!("Columns cast to text: {}", plan.targets.len());
        println!();

        if self.plan_only {
            return Ok(0);
        }

        let normalizer = DriftNormalizer::new(store, &config.normalize)
            .with_overwrite(self.overwrite || !config.normalize.resume);
        let summary = normalizer.run(&files, &src_prefix, &dst_prefix, &plan).await;
        summary.log_summary();

        println!("=== Done ===");
        println!("Total  : {}", summary.total);
        println!("Written: {}", summary.rewritten);
        println!("Skipped: {}", summary.skipped_existing);
        println!("Failed : {}", summary.failures.len());
        if summary.is_success() {
            return Ok(0);
        }

        println!("First failures:");
        for failure in summary.failures.iter().take(PRINTED_FAILURES) {
            println!(" - {} -> {}", failure.path, failure.error);
        }
        Ok(1)
    }
}
