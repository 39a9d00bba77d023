//! Init command implementation
//!
//! This module implements the `init` command for generating a sample
//! configuration file.

use clap::Args;
use std::fs;
use std::path::Path;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path where to create the configuration file
    #[arg(short, long, default_value = "stowage.toml")]
    pub output: String,

    /// Overwrite existing file
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    /// Execute the init command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        tracing::info!(output = %self.output, "Initializing configuration file");

        println!("📝 Initializing Stowage configuration");
        println!();

        if Path::new(&self.output).exists() && !self.force {
            println!("❌ Configuration file already exists: {}", self.output);
            println!("   Use --force to overwrite");
            return Ok(2);
        }

        match fs::write(&self.output, sample_config()) {
            Ok(_) => {
                println!("✅ Configuration file created: {}", self.output);
                println!();
                println!("Next steps:");
                println!("  1. Edit {} with your settings", self.output);
                println!("  2. Put MONGO_PASSWORD in a .env file and uncomment the password line");
                println!("  3. Validate configuration: stowage validate-config");
                println!("  4. Run export: stowage export");
                println!("  5. Fix type drift: stowage normalize --run-id <run id>");
                println!();
                Ok(0)
            }
            Err(e) => {
                println!("❌ Failed to write configuration file");
                println!("   Error: {e}");
                Ok(5)
            }
        }
    }
}

/// Sample configuration with every section and its defaults
pub fn sample_config() -> &'static str {
    r#"# Stowage Configuration File
# MongoDB to Parquet export pipeline

[application]
log_level = "info"
# Reuse a run id to resume that run; unset generates one per export
# run_id = "20250101T000000Z"

[source]
host = "127.0.0.1"
port = 27017
# username = "reader"
# password = "${MONGO_PASSWORD}"
auth_source = "admin"
database = "countly"
collection = "summary"
server_selection_timeout_seconds = 10
connect_timeout_seconds = 10

[export]
sort_field = "_id"
batch_size = 5000
max_docs = 0                      # 0 = unlimited
local_tmp_dir = "tmp/mongo_export"
compression = "snappy"            # snappy | zstd | none
verify_existing_chunks = true
progress_every_chunks = 10

[storage]
url = "gs://your-bucket"          # gs://bucket | file:///path | memory://
prefix = "exports/mongo_parquet"
chunk_mb = 16
connect_timeout_seconds = 30
read_timeout_seconds = 600
# service_account_path = "/secrets/gcs.json"

[storage.retry]
initial_delay_ms = 1000
max_delay_ms = 60000
backoff_multiplier = 2.0
deadline_seconds = 3600

[normalize]
sample_size = 300
log_every = 200
force_string_cols = []
exclude_cols = []
include_all_suspicious = false
resume = true
concurrency = 1

[load]
max_uris_per_job = 9500
truncate_first = true

[logging]
local_enabled = false
local_path = "logs"
local_rotation = "daily"
"#
}
