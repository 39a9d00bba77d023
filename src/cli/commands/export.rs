//! Export command implementation
//!
//! This module implements the `export` command, which runs or resumes an
//! export of the configured collection into object storage.

use super::load_or_exit_code;
use crate::adapters::source::create_document_source;
use crate::adapters::storage::create_blob_store;
use crate::core::export::{ExportCoordinator, ExportOutcome};
use crate::domain::RunId;
use clap::Args;
use tokio::sync::watch;

/// Arguments for the export command
#[derive(Args, Debug, Default)]
pub struct ExportArgs {
    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Run identifier; reuse an earlier one to resume that run
    #[arg(long)]
    pub run_id: Option<String>,

    /// Stop after this many documents (0 = unlimited)
    #[arg(long)]
    pub max_docs: Option<u64>,

    /// Documents per batch and per chunk file
    #[arg(long)]
    pub batch_size: Option<usize>,
}

impl ExportArgs {
    /// Execute the export command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        tracing::info!("Starting export command");

        let mut config = match load_or_exit_code(config_path) {
            Ok(c) => c,
            Err(code) => return Ok(code),
        };

        // Apply CLI overrides
        if let Some(run_id) = &self.run_id {
            tracing::info!(run_id = %run_id, "Overriding run id from CLI");
            config.application.run_id = Some(run_id.clone());
        }
        if let Some(max_docs) = self.max_docs {
            tracing::info!(max_docs, "Overriding max_docs from CLI");
            config.export.max_docs = max_docs;
        }
        if let Some(batch_size) = self.batch_size {
            tracing::info!(batch_size, "Overriding batch size from CLI");
            config.export.batch_size = batch_size;
        }

        // Fix the run id now so the prompt and the run agree on it
        if config.application.run_id.is_none() {
            config.application.run_id = Some(RunId::generate().to_string());
        }

        if let Err(e) = config.validate() {
            tracing::error!(error = %e, "Configuration validation failed");
            eprintln!("Configuration validation failed: {e}");
            return Ok(2);
        }

        if !self.yes {
            println!("Export Configuration:");
            println!(
                "  Run ID: {}",
                config.application.run_id.as_deref().unwrap_or_default()
            );
            println!(
                "  Source: {}:{} {}.{}",
                config.source.host,
                config.source.port,
                config.source.database,
                config.source.collection
            );
            println!("  Target: {}/{}", config.storage.url, config.storage.prefix);
            println!("  Sort field: {}", config.export.sort_field);
            println!("  Batch size: {}", config.export.batch_size);
            println!(
                "  Max docs: {}",
                match config.export.doc_cap() {
                    Some(cap) => cap.to_string(),
                    None => "unlimited".to_string(),
                }
            );
            println!();
            print!("Proceed with export? [y/N]: ");
            use std::io::{self, Write};
            io::stdout().flush()?;

            let mut input = String::new();
            io::stdin().read_line(&mut input)?;

            if !input.trim().eq_ignore_ascii_case("y") {
                println!("Export cancelled.");
                return Ok(0);
            }
        }

        let source = match create_document_source(&config.source).await {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "Failed to connect to source");
                eprintln!("Failed to connect to source: {e}");
                return Ok(4);
            }
        };
        let store = match create_blob_store(&config.storage) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "Failed to open storage");
                eprintln!("Failed to open storage: {e}");
                return Ok(4);
            }
        };

        let coordinator = match ExportCoordinator::new(config, source, store, shutdown_signal) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "Failed to create export coordinator");
                eprintln!("Failed to initialize export: {e}");
                return Ok(2);
            }
        };

        println!("🚀 Starting export of run {}...", coordinator.run_id());
        println!();

        let summary = match coordinator.execute_export().await {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "Export failed");
                eprintln!("Export failed: {e}");
                eprintln!(
                    "Progress up to the last checkpoint is kept; rerun with --run-id {} to resume.",
                    coordinator.run_id()
                );
                return Ok(5);
            }
        };

        println!();
        println!("📊 Export Summary:");
        println!("  Run ID: {}", summary.run_id);
        println!("  Chunks written: {}", summary.chunks_written);
        println!("  Chunks already present: {}", summary.chunks_skipped);
        println!("  Documents this run: {}", summary.docs_exported);
        println!("  Total chunks: {}", summary.total_chunks);
        println!("  Total documents: {}", summary.total_docs);
        println!("  Duration: {:.2}s", summary.duration.as_secs_f64());
        println!();

        let exit_code = match summary.outcome {
            ExportOutcome::Completed => {
                println!("✅ Export completed successfully!");
                0
            }
            ExportOutcome::AlreadyComplete => {
                println!("✅ Run {} was already complete; nothing to do.", summary.run_id);
                0
            }
            ExportOutcome::Interrupted => {
                println!("⚠️  Export interrupted gracefully. Progress saved.");
                println!("   Run with --run-id {} to resume from checkpoint.", summary.run_id);
                tracing::info!("Export interrupted by user signal");
                130
            }
        };

        Ok(exit_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_args_defaults() {
        let args = ExportArgs::default();

        assert!(!args.yes);
        assert!(args.run_id.is_none());
        assert!(args.max_docs.is_none());
        assert!(args.batch_size.is_none());
    }

    #[tokio::test]
    async fn test_broken_config_is_a_configuration_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("stowage.toml");
        std::fs::write(&path, "invalid = toml = syntax").unwrap();
        let (_tx, rx) = watch::channel(false);
        let args = ExportArgs {
            yes: true,
            ..Default::default()
        };

        let code = args
            .execute(path.to_str().unwrap(), rx)
            .await
            .unwrap();
        assert_eq!(code, 2);
    }
}
