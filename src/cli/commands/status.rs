//! Status command implementation
//!
//! This module implements the `status` command for displaying the
//! checkpoint and manifest of an export run.

use super::{existing_run_layout, load_or_exit_code};
use crate::adapters::storage::create_blob_store;
use crate::core::state::CheckpointStore;
use clap::Args;

/// Arguments for the status command
#[derive(Args, Debug, Default)]
pub struct StatusArgs {
    /// Run to inspect; defaults to application.run_id
    #[arg(long)]
    pub run_id: Option<String>,
}

impl StatusArgs {
    /// Execute the status command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!("Checking export status");

        println!("📊 Export Status");
        println!();

        let config = match load_or_exit_code(config_path) {
            Ok(c) => c,
            Err(code) => return Ok(code),
        };

        let layout = match existing_run_layout(&config, self.run_id.as_deref()) {
            Ok(Some(layout)) => layout,
            Ok(None) => {
                println!("❌ No run id given");
                println!("   Use --run-id or set application.run_id");
                return Ok(2);
            }
            Err(e) => {
                println!("❌ Invalid run id: {e}");
                return Ok(2);
            }
        };

        let store = match create_blob_store(&config.storage) {
            Ok(s) => s,
            Err(e) => {
                println!("❌ Failed to open storage");
                println!("   Error: {e}");
                return Ok(4);
            }
        };
        let checkpoints = CheckpointStore::new(store.clone(), &layout);

        let (checkpoint, manifest) =
            match tokio::try_join!(checkpoints.load(), checkpoints.load_manifest()) {
                Ok(state) => state,
                Err(e) => {
                    println!("❌ Failed to read run state");
                    println!("   Error: {e}");
                    return Ok(5);
                }
            };

        println!("Run: {}", layout.run_id());
        println!("Location: {}/{}", store.describe(), layout.run_prefix());
        println!();

        if checkpoint.is_fresh() && manifest.is_none() {
            println!("No export history found for this run.");
            println!("Run 'stowage export --run-id {}' to start it.", layout.run_id());
            return Ok(0);
        }

        println!("Checkpoint:");
        println!("  Chunks: {}", checkpoint.chunk_idx);
        println!("  Exported documents: {}", checkpoint.exported_docs);
        println!("  Last sort value: {}", checkpoint.last_sort_value);
        if let Some(updated) = checkpoint.updated_utc {
            println!("  Updated: {}", updated.format("%Y-%m-%d %H:%M:%S"));
        }
        println!();

        match manifest {
            Some(manifest) => {
                println!("✅ Completed");
                println!("  Chunks: {}", manifest.chunks);
                println!("  Exported documents: {}", manifest.exported_docs);
                println!("  Started: {}", manifest.started_utc.format("%Y-%m-%d %H:%M:%S"));
                println!("  Ended: {}", manifest.ended_utc.format("%Y-%m-%d %H:%M:%S"));
                println!("  Duration: {}s", manifest.duration().num_seconds());
            }
            None => println!("🔄 In progress (no manifest yet)"),
        }
        println!();
        Ok(0)
    }
}
