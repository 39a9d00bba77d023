//! Validate config command implementation
//!
//! This module implements the `validate-config` command for validating
//! the Stowage configuration.

use crate::config::load_config_or_env;
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    ///
    /// Loading already validates, so any failure here is reported as a
    /// configuration error.
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration: {config_path}");
        println!();

        let config = match load_config_or_env(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Configuration validation failed");
                println!("   Error: {e}");
                println!();
                return Ok(2);
            }
        };

        println!("✅ Configuration is valid");
        println!();
        println!("Configuration Summary:");
        println!("  Log Level: {}", config.application.log_level);
        println!(
            "  Run ID: {}",
            config.application.run_id.as_deref().unwrap_or("(generated per export)")
        );
        println!(
            "  Source: {}:{} {}.{}",
            config.source.host, config.source.port, config.source.database, config.source.collection
        );
        println!(
            "  Source user: {}",
            config.source.username.as_deref().unwrap_or("(none)")
        );
        println!("  Sort field: {}", config.export.sort_field);
        println!("  Batch size: {}", config.export.batch_size);
        println!("  Compression: {:?}", config.export.compression);
        println!("  Storage: {}", config.storage.url);
        println!("  Prefix: {}", config.storage.prefix);
        println!("  Upload part size: {} MiB", config.storage.chunk_mb);
        println!("  Retry deadline: {}s", config.storage.retry.deadline_seconds);
        println!("  Drift sample size: {}", config.normalize.sample_size);
        println!();
        Ok(0)
    }
}
