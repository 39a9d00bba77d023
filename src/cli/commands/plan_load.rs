//! Plan-load command implementation
//!
//! Lists the chunk files of a run and prints the warehouse load jobs that
//! would load them.

use super::{existing_run_layout, load_or_exit_code};
use crate::adapters::storage::create_blob_store;
use crate::core::drift::list_parquet;
use crate::core::export::layout::NORMALIZED_SUFFIX;
use crate::core::load::{object_uri, plan_load, WriteMode};
use clap::Args;

/// Arguments for the plan-load command
#[derive(Args, Debug, Default)]
pub struct PlanLoadArgs {
    /// Run whose normalized files are loaded; defaults to application.run_id
    #[arg(long)]
    pub run_id: Option<String>,

    /// Prefix listed for `*.parquet` files (overrides the run)
    #[arg(long)]
    pub prefix: Option<String>,

    /// Maximum source files per job
    #[arg(long)]
    pub max_uris: Option<usize>,

    /// Append with every job instead of truncating with the first
    #[arg(long)]
    pub append: bool,
}

impl PlanLoadArgs {
    /// Execute the plan-load command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let config = match load_or_exit_code(config_path) {
            Ok(c) => c,
            Err(code) => return Ok(code),
        };

        let prefix = match (&self.prefix, &config.load.prefix) {
            (Some(prefix), _) | (None, Some(prefix)) => prefix.trim_matches('/').to_string(),
            (None, None) => match existing_run_layout(&config, self.run_id.as_deref()) {
                Ok(Some(layout)) => layout.normalized_prefix(),
                Ok(None) => format!("{}{NORMALIZED_SUFFIX}", config.storage.base_prefix()),
                Err(e) => {
                    eprintln!("Invalid run id: {e}");
                    return Ok(2);
                }
            },
        };
        let max_uris = self.max_uris.unwrap_or(config.load.max_uris_per_job);
        if max_uris == 0 {
            eprintln!("--max-uris must be > 0");
            return Ok(2);
        }
        let mode = if self.append || !config.load.truncate_first {
            WriteMode::Append
        } else {
            WriteMode::Truncate
        };

        let store = match create_blob_store(&config.storage) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("Failed to open storage: {e}");
                return Ok(4);
            }
        };
        let files = match list_parquet(store.as_ref(), &prefix).await {
            Ok(files) => files,
            Err(e) => {
                eprintln!("Failed to list {prefix}: {e}");
                return Ok(5);
            }
        };
        if files.is_empty() {
            eprintln!("No parquet files found under {}", object_uri(&store.describe(), &prefix));
            return Ok(5);
        }

        let location = store.describe();
        let uris: Vec<String> = files.iter().map(|f| object_uri(&location, f)).collect();
        let jobs = plan_load(&uris, max_uris, mode);
        tracing::info!(files = uris.len(), jobs = jobs.len(), "Load plan ready");

        println!(
            "Loading {} parquet files from {} in {} job(s).",
            uris.len(),
            object_uri(&location, &prefix),
            jobs.len()
        );
        for job in &jobs {
            println!(
                "Job {}/{}: {} files, {} (first {}, last {})",
                job.index,
                jobs.len(),
                job.uris.len(),
                job.mode,
                job.uris.first().map(String::as_str).unwrap_or_default(),
                job.uris.last().map(String::as_str).unwrap_or_default()
            );
        }
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_load_args_defaults() {
        let args = PlanLoadArgs::default();
        assert!(args.prefix.is_none());
        assert!(!args.append);
    }

    #[tokio::test]
    async fn test_empty_prefix_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("stowage.toml");
        std::fs::write(&path, "[source]\n[storage]\nurl = \"memory://\"\n").unwrap();

        let code = PlanLoadArgs::default()
            .execute(path.to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(code, 5);
    }
}
