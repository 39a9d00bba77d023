//! Configuration schema types
//!
//! This module defines the configuration structure for Stowage. The whole
//! struct is built once at start-up and handed to each component; nothing
//! below the CLI reads the process environment.

use crate::config::SecretString;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main Stowage configuration
///
/// This is the root configuration structure that maps to the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StowageConfig {
    /// Application-level settings
    #[serde(default)]
    pub application: ApplicationConfig,

    /// Source document store
    pub source: SourceConfig,

    /// Export loop settings
    #[serde(default)]
    pub export: ExportConfig,

    /// Object storage destination
    pub storage: StorageConfig,

    /// Schema drift normalization pass
    #[serde(default)]
    pub normalize: NormalizeConfig,

    /// Downstream load planning
    #[serde(default)]
    pub load: LoadConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl StowageConfig {
    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid
    pub fn validate(&self) -> Result<(), String> {
        self.application.validate()?;
        self.source.validate()?;
        self.export.validate()?;
        self.storage.validate()?;
        self.normalize.validate()?;
        self.load.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Run identifier; generated from the current UTC time when unset
    #[serde(default)]
    pub run_id: Option<String>,
}

impl ApplicationConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            ));
        }
        if let Some(run_id) = &self.run_id {
            if run_id.contains('/') {
                return Err(format!("application.run_id '{run_id}' cannot contain '/'"));
            }
        }
        Ok(())
    }
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            run_id: None,
        }
    }
}

/// Source document store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Host name of the document store
    #[serde(default = "default_source_host")]
    pub host: String,

    /// Port of the document store
    #[serde(default = "default_source_port")]
    pub port: u16,

    /// Username (optional)
    #[serde(default)]
    pub username: Option<String>,

    /// Password (optional)
    /// Stored securely in memory and automatically zeroized on drop
    #[serde(default)]
    pub password: Option<SecretString>,

    /// Authentication database
    #[serde(default = "default_auth_source")]
    pub auth_source: String,

    /// Database name
    #[serde(default = "default_database")]
    pub database: String,

    /// Collection name
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Server selection timeout in seconds
    #[serde(default = "default_source_timeout_seconds")]
    pub server_selection_timeout_seconds: u64,

    /// Connect timeout in seconds
    #[serde(default = "default_source_timeout_seconds")]
    pub connect_timeout_seconds: u64,
}

impl SourceConfig {
    fn validate(&self) -> Result<(), String> {
        if self.host.trim().is_empty() {
            return Err("source.host cannot be empty".to_string());
        }
        if self.database.trim().is_empty() {
            return Err("source.database cannot be empty".to_string());
        }
        if self.collection.trim().is_empty() {
            return Err("source.collection cannot be empty".to_string());
        }
        if self.password.is_some() && self.username.is_none() {
            return Err("source.password is set but source.username is missing".to_string());
        }
        if self.server_selection_timeout_seconds == 0 || self.connect_timeout_seconds == 0 {
            return Err("source timeouts must be > 0".to_string());
        }
        Ok(())
    }

    /// Builds the connection string
    ///
    /// The result embeds the password and must never be logged.
    pub fn connection_uri(&self) -> String {
        use secrecy::ExposeSecret;

        let credentials = match (&self.username, &self.password) {
            (Some(user), Some(password)) => format!(
                "{}:{}@",
                encode_component(user),
                encode_component(password.expose_secret().as_ref())
            ),
            (Some(user), None) => format!("{}@", encode_component(user)),
            _ => String::new(),
        };

        format!(
            "mongodb://{credentials}{}:{}/?authSource={}",
            self.host,
            self.port,
            encode_component(&self.auth_source)
        )
    }

    pub fn server_selection_timeout(&self) -> Duration {
        Duration::from_secs(self.server_selection_timeout_seconds)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            host: default_source_host(),
            port: default_source_port(),
            username: None,
            password: None,
            auth_source: default_auth_source(),
            database: default_database(),
            collection: default_collection(),
            server_selection_timeout_seconds: default_source_timeout_seconds(),
            connect_timeout_seconds: default_source_timeout_seconds(),
        }
    }
}

fn encode_component(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Parquet compression codec for written files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CompressionCodec {
    #[default]
    Snappy,
    Zstd,
    #[serde(alias = "uncompressed")]
    None,
}

impl std::str::FromStr for CompressionCodec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "snappy" => Ok(CompressionCodec::Snappy),
            "zstd" => Ok(CompressionCodec::Zstd),
            "none" | "uncompressed" => Ok(CompressionCodec::None),
            other => Err(format!(
                "Invalid compression '{other}'. Must be one of: snappy, zstd, none"
            )),
        }
    }
}

/// Export loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Monotonic, always-present field used as the cursor
    #[serde(default = "default_sort_field")]
    pub sort_field: String,

    /// Documents per batch (and per chunk file)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Stop extracting after this many documents; 0 means unlimited
    #[serde(default)]
    pub max_docs: u64,

    /// Local staging directory for chunk files awaiting upload
    #[serde(default = "default_local_tmp_dir")]
    pub local_tmp_dir: String,

    /// Compression codec for chunk files
    #[serde(default)]
    pub compression: CompressionCodec,

    /// Compare the fingerprint of an existing chunk with the re-read batch
    /// before skipping it on resume
    #[serde(default = "default_true")]
    pub verify_existing_chunks: bool,

    /// Emit a progress line every N chunks
    #[serde(default = "default_progress_every_chunks")]
    pub progress_every_chunks: u64,
}

impl ExportConfig {
    fn validate(&self) -> Result<(), String> {
        if self.sort_field.trim().is_empty() {
            return Err("export.sort_field cannot be empty".to_string());
        }
        if self.batch_size == 0 {
            return Err("export.batch_size must be > 0".to_string());
        }
        if self.local_tmp_dir.trim().is_empty() {
            return Err("export.local_tmp_dir cannot be empty".to_string());
        }
        if self.progress_every_chunks == 0 {
            return Err("export.progress_every_chunks must be > 0".to_string());
        }
        Ok(())
    }

    /// Document cap, `None` when unlimited
    pub fn doc_cap(&self) -> Option<u64> {
        (self.max_docs > 0).then_some(self.max_docs)
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            sort_field: default_sort_field(),
            batch_size: default_batch_size(),
            max_docs: 0,
            local_tmp_dir: default_local_tmp_dir(),
            compression: CompressionCodec::default(),
            verify_existing_chunks: true,
            progress_every_chunks: default_progress_every_chunks(),
        }
    }
}

/// Retry configuration for the blob store boundary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Initial delay in milliseconds
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Maximum delay in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Backoff multiplier
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Total wall-clock budget measured from the first attempt, in seconds
    #[serde(default = "default_retry_deadline_seconds")]
    pub deadline_seconds: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            deadline_seconds: default_retry_deadline_seconds(),
        }
    }
}

impl RetryConfig {
    fn validate(&self) -> Result<(), String> {
        if self.initial_delay_ms == 0 {
            return Err("storage.retry.initial_delay_ms must be > 0".to_string());
        }
        if self.max_delay_ms < self.initial_delay_ms {
            return Err("storage.retry.max_delay_ms must be >= initial_delay_ms".to_string());
        }
        if self.backoff_multiplier < 1.0 {
            return Err("storage.retry.backoff_multiplier must be >= 1.0".to_string());
        }
        Ok(())
    }
}

/// Object storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Storage location: `gs://<bucket>`, `file:///<dir>` or `memory://`
    pub url: String,

    /// Key prefix under which runs are written
    #[serde(default = "default_storage_prefix")]
    pub prefix: String,

    /// Upload part size in MiB
    #[serde(default = "default_chunk_mb")]
    pub chunk_mb: u64,

    /// Connect timeout in seconds
    #[serde(default = "default_connect_timeout_seconds")]
    pub connect_timeout_seconds: u64,

    /// Read timeout in seconds
    #[serde(default = "default_read_timeout_seconds")]
    pub read_timeout_seconds: u64,

    /// Optional service account key file (GCS only)
    #[serde(default)]
    pub service_account_path: Option<String>,

    /// Retry policy
    #[serde(default)]
    pub retry: RetryConfig,
}

impl StorageConfig {
    fn validate(&self) -> Result<(), String> {
        let parsed = url::Url::parse(&self.url)
            .map_err(|e| format!("Invalid storage.url '{}': {e}", self.url))?;
        match parsed.scheme() {
            "gs" => {
                if parsed.host_str().unwrap_or_default().is_empty() {
                    return Err("storage.url must name a bucket (gs://<bucket>)".to_string());
                }
                if self.chunk_mb < 5 {
                    return Err("storage.chunk_mb must be >= 5 for gs:// destinations".to_string());
                }
            }
            "file" | "memory" => {}
            other => {
                return Err(format!(
                    "Unsupported storage.url scheme '{other}'. Must be one of: gs, file, memory"
                ))
            }
        }
        if self.prefix.trim_matches('/').is_empty() {
            return Err("storage.prefix cannot be empty".to_string());
        }
        if self.chunk_mb == 0 {
            return Err("storage.chunk_mb must be > 0".to_string());
        }
        if self.connect_timeout_seconds == 0 || self.read_timeout_seconds == 0 {
            return Err("storage timeouts must be > 0".to_string());
        }
        self.retry.validate()
    }

    /// Base prefix without surrounding slashes
    pub fn base_prefix(&self) -> String {
        self.prefix.trim_matches('/').to_string()
    }

    pub fn chunk_bytes(&self) -> usize {
        (self.chunk_mb as usize) * 1024 * 1024
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            url: "memory://".to_string(),
            prefix: default_storage_prefix(),
            chunk_mb: default_chunk_mb(),
            connect_timeout_seconds: default_connect_timeout_seconds(),
            read_timeout_seconds: default_read_timeout_seconds(),
            service_account_path: None,
            retry: RetryConfig::default(),
        }
    }
}

/// Schema drift normalization configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizeConfig {
    /// Source prefix; defaults to the run prefix of the export
    #[serde(default)]
    pub src_prefix: Option<String>,

    /// Destination prefix; defaults to the `_normalized` mirror
    #[serde(default)]
    pub dst_prefix: Option<String>,

    /// Number of files (sorted) whose schemas are sampled
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,

    /// Emit a progress line every N files
    #[serde(default = "default_log_every")]
    pub log_every: usize,

    /// Columns always cast to text
    #[serde(default)]
    pub force_string_cols: Vec<String>,

    /// Columns never cast
    #[serde(default)]
    pub exclude_cols: Vec<String>,

    /// Also cast every column whose name looks like an id or flag
    #[serde(default)]
    pub include_all_suspicious: bool,

    /// Skip files already present at the destination
    #[serde(default = "default_true")]
    pub resume: bool,

    /// Files processed concurrently
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Compression codec for rewritten files
    #[serde(default)]
    pub compression: CompressionCodec,
}

impl NormalizeConfig {
    fn validate(&self) -> Result<(), String> {
        if self.sample_size == 0 {
            return Err("normalize.sample_size must be > 0".to_string());
        }
        if self.log_every == 0 {
            return Err("normalize.log_every must be > 0".to_string());
        }
        if self.concurrency == 0 || self.concurrency > 64 {
            return Err("normalize.concurrency must be between 1 and 64".to_string());
        }
        if let Some(col) = self
            .force_string_cols
            .iter()
            .find(|c| self.exclude_cols.contains(c))
        {
            tracing::warn!(
                column = %col,
                "Column is both forced and excluded; exclusion wins"
            );
        }
        Ok(())
    }
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            src_prefix: None,
            dst_prefix: None,
            sample_size: default_sample_size(),
            log_every: default_log_every(),
            force_string_cols: Vec::new(),
            exclude_cols: Vec::new(),
            include_all_suspicious: false,
            resume: true,
            concurrency: default_concurrency(),
            compression: CompressionCodec::default(),
        }
    }
}

/// Downstream load planning configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    /// Prefix listed for `*.parquet` files; defaults to the normalized mirror
    #[serde(default)]
    pub prefix: Option<String>,

    /// Maximum source URIs per load job
    #[serde(default = "default_max_uris_per_job")]
    pub max_uris_per_job: usize,

    /// Replace the destination table with the first job
    #[serde(default = "default_true")]
    pub truncate_first: bool,
}

impl LoadConfig {
    fn validate(&self) -> Result<(), String> {
        if self.max_uris_per_job == 0 {
            return Err("load.max_uris_per_job must be > 0".to_string());
        }
        Ok(())
    }
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            prefix: None,
            max_uris_per_job: default_max_uris_per_job(),
            truncate_first: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Enable local JSON file logging
    #[serde(default)]
    pub local_enabled: bool,

    /// Local log directory
    #[serde(default = "default_local_path")]
    pub local_path: String,

    /// Log rotation strategy (daily, hourly, never)
    #[serde(default = "default_local_rotation")]
    pub local_rotation: String,
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&self.local_rotation.as_str()) {
            return Err(format!(
                "Invalid logging.local_rotation '{}'. Must be one of: {}",
                self.local_rotation,
                valid_rotations.join(", ")
            ));
        }
        if self.local_enabled && self.local_path.trim().is_empty() {
            return Err("logging.local_path cannot be empty when file logging is on".to_string());
        }
        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            local_enabled: false,
            local_path: default_local_path(),
            local_rotation: default_local_rotation(),
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_source_host() -> String {
    "127.0.0.1".to_string()
}

fn default_source_port() -> u16 {
    27017
}

fn default_auth_source() -> String {
    "admin".to_string()
}

fn default_database() -> String {
    "countly".to_string()
}

fn default_collection() -> String {
    "summary".to_string()
}

fn default_source_timeout_seconds() -> u64 {
    10
}

fn default_sort_field() -> String {
    "_id".to_string()
}

fn default_batch_size() -> usize {
    5000
}

fn default_local_tmp_dir() -> String {
    "tmp/mongo_export".to_string()
}

fn default_progress_every_chunks() -> u64 {
    10
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    60_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_retry_deadline_seconds() -> u64 {
    3600
}

fn default_storage_prefix() -> String {
    "exports/mongo_parquet".to_string()
}

fn default_chunk_mb() -> u64 {
    16
}

fn default_connect_timeout_seconds() -> u64 {
    30
}

fn default_read_timeout_seconds() -> u64 {
    600
}

fn default_sample_size() -> usize {
    300
}

fn default_log_every() -> usize {
    200
}

fn default_concurrency() -> usize {
    1
}

fn default_max_uris_per_job() -> usize {
    9500
}

fn default_local_path() -> String {
    "logs".to_string()
}

fn default_local_rotation() -> String {
    "daily".to_string()
}
