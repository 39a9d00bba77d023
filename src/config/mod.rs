//! Configuration management for Stowage.
//!
//! Stowage uses TOML configuration files with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `STOWAGE_<SECTION>_<KEY>` overrides
//! - A pure-environment mode driven by the export job's classic variables
//!   (`MONGO_HOST`, `GCS_BUCKET`, `BATCH_SIZE`, ...)
//! - Validation on load
//!
//! # Example Configuration
//!
//! ```toml
//! [application]
//! log_level = "info"
//! run_id = "20250101T000000Z"
//!
//! [source]
//! host = "127.0.0.1"
//! port = 27017
//! username = "reader"
//! password = "${MONGO_PASSWORD}"
//! database = "countly"
//! collection = "summary"
//!
//! [export]
//! sort_field = "_id"
//! batch_size = 5000
//!
//! [storage]
//! url = "gs://analytics-landing"
//! prefix = "exports/mongo_parquet"
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

// Re-export commonly used types
pub use loader::{config_from_env, load_config, load_config_or_env};
pub use schema::{
    ApplicationConfig, CompressionCodec, ExportConfig, LoadConfig, LoggingConfig,
    NormalizeConfig, RetryConfig, SourceConfig, StorageConfig, StowageConfig,
};
pub use secret::{secret_string, secret_string_opt, SecretString, SecretValue};
