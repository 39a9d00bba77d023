//! Configuration loader with TOML parsing and environment variable overrides
//!
//! Two entry points exist:
//! - [`load_config`] reads a TOML file, substitutes `${VAR}` placeholders and
//!   applies `STOWAGE_<SECTION>_<KEY>` overrides.
//! - [`config_from_env`] builds the same struct from the flat variables the
//!   export job has always been driven by (`MONGO_HOST`, `GCS_BUCKET`, ...).
//!
//! Both validate before returning, so callers always get a usable config.

use super::schema::{
    ApplicationConfig, ExportConfig, LoadConfig, LoggingConfig, NormalizeConfig, RetryConfig,
    SourceConfig, StorageConfig, StowageConfig,
};
use super::secret::secret_string_opt;
use crate::domain::errors::StowageError;
use crate::domain::result::Result;
use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into StowageConfig
/// 4. Applies environment variable overrides (STOWAGE_* prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns an error if the file cannot be read, a referenced variable is
/// missing, parsing fails or validation fails.
///
/// # Examples
///
/// ```no_run
/// use stowage::config::loader::load_config;
///
/// let config = load_config("stowage.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<StowageConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(StowageError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        StowageError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    let contents = substitute_env_vars(&contents)?;

    let mut config: StowageConfig = toml::from_str(&contents)
        .map_err(|e| StowageError::Configuration(format!("Failed to parse TOML: {e}")))?;

    let env: HashMap<String, String> = std::env::vars().collect();
    apply_env_overrides(&mut config, &env)?;

    config.validate().map_err(|e| {
        StowageError::Configuration(format!("Configuration validation failed: {e}"))
    })?;

    Ok(config)
}

/// Loads the TOML file when it exists, otherwise falls back to the
/// environment surface
pub fn load_config_or_env(path: impl AsRef<Path>) -> Result<StowageConfig> {
    let path = path.as_ref();
    if path.exists() {
        load_config(path)
    } else {
        tracing::info!(
            path = %path.display(),
            "Configuration file not found, reading configuration from environment"
        );
        let env: HashMap<String, String> = std::env::vars().collect();
        config_from_env(&env)
    }
}

/// Builds a configuration from flat environment variables
///
/// `GCS_BUCKET` is required; every other variable has a default.
pub fn config_from_env(env: &HashMap<String, String>) -> Result<StowageConfig> {
    let get = |key: &str| env.get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    let bucket = get("GCS_BUCKET").ok_or_else(|| {
        StowageError::Configuration("Missing required environment variable: GCS_BUCKET".into())
    })?;
    let url = if bucket.contains("://") {
        bucket
    } else {
        format!("gs://{bucket}")
    };

    let defaults = SourceConfig::default();
    let source = SourceConfig {
        host: get("MONGO_HOST").unwrap_or(defaults.host),
        port: parse_var(env, "MONGO_PORT")?.unwrap_or(defaults.port),
        username: get("MONGO_USERNAME"),
        password: secret_string_opt(get("MONGO_PASSWORD")),
        auth_source: get("MONGO_AUTH_SOURCE").unwrap_or(defaults.auth_source),
        database: get("MONGO_DB").unwrap_or(defaults.database),
        collection: get("MONGO_COLLECTION").unwrap_or(defaults.collection),
        ..defaults
    };

    let export_defaults = ExportConfig::default();
    let export = ExportConfig {
        sort_field: get("SORT_FIELD").unwrap_or(export_defaults.sort_field.clone()),
        batch_size: parse_var(env, "BATCH_SIZE")?.unwrap_or(export_defaults.batch_size),
        max_docs: parse_var(env, "MAX_DOCS")?.unwrap_or(0),
        local_tmp_dir: get("LOCAL_TMP_DIR").unwrap_or(export_defaults.local_tmp_dir.clone()),
        ..export_defaults
    };

    let storage_defaults = StorageConfig::default();
    let storage = StorageConfig {
        url,
        prefix: get("GCS_PREFIX").unwrap_or(storage_defaults.prefix.clone()),
        chunk_mb: parse_var(env, "GCS_CHUNK_MB")?.unwrap_or(storage_defaults.chunk_mb),
        connect_timeout_seconds: parse_var(env, "GCS_CONNECT_TIMEOUT")?
            .unwrap_or(storage_defaults.connect_timeout_seconds),
        read_timeout_seconds: parse_var(env, "GCS_READ_TIMEOUT")?
            .unwrap_or(storage_defaults.read_timeout_seconds),
        service_account_path: get("GOOGLE_APPLICATION_CREDENTIALS"),
        retry: RetryConfig {
            deadline_seconds: parse_var(env, "GCS_RETRY_DEADLINE")?
                .unwrap_or(storage_defaults.retry.deadline_seconds),
            ..RetryConfig::default()
        },
    };

    let application = ApplicationConfig {
        log_level: get("LOG_LEVEL")
            .map(|l| l.to_lowercase())
            .unwrap_or_else(|| ApplicationConfig::default().log_level),
        run_id: get("RUN_ID"),
    };

    let config = StowageConfig {
        application,
        source,
        export,
        storage,
        normalize: NormalizeConfig::default(),
        load: LoadConfig::default(),
        logging: LoggingConfig::default(),
    };

    config.validate().map_err(|e| {
        StowageError::Configuration(format!("Configuration validation failed: {e}"))
    })?;

    Ok(config)
}

fn parse_var<T: FromStr>(env: &HashMap<String, String>, key: &str) -> Result<Option<T>> {
    match env.get(key).map(|v| v.trim()).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(raw) => raw.parse::<T>().map(Some).map_err(|_| {
            StowageError::Configuration(format!("Invalid value for {key}: '{raw}'"))
        }),
    }
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// Comment lines are left untouched.
///
/// # Errors
///
/// Returns an error naming every referenced variable that is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| StowageError::Configuration(format!("Invalid substitution pattern: {e}")))?;
    let mut lines = Vec::new();
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            lines.push(line.to_string());
            continue;
        }

        let processed = re.replace_all(line, |caps: &regex::Captures| {
            let var_name = &caps[1];
            match std::env::var(var_name) {
                Ok(value) => value,
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                    String::new()
                }
            }
        });
        lines.push(processed.into_owned());
    }

    if !missing_vars.is_empty() {
        return Err(StowageError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(lines.join("\n"))
}

/// Applies environment variable overrides using the STOWAGE_* prefix
///
/// Variables follow the pattern STOWAGE_<SECTION>_<KEY>, for example
/// STOWAGE_SOURCE_HOST or STOWAGE_EXPORT_BATCH_SIZE.
fn apply_env_overrides(config: &mut StowageConfig, env: &HashMap<String, String>) -> Result<()> {
    let get = |key: &str| env.get(key).cloned();

    // Application overrides
    if let Some(val) = get("STOWAGE_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }
    if let Some(val) = get("STOWAGE_APPLICATION_RUN_ID") {
        config.application.run_id = Some(val).filter(|v| !v.is_empty());
    }

    // Source overrides
    if let Some(val) = get("STOWAGE_SOURCE_HOST") {
        config.source.host = val;
    }
    if let Some(port) = parse_var(env, "STOWAGE_SOURCE_PORT")? {
        config.source.port = port;
    }
    if let Some(val) = get("STOWAGE_SOURCE_USERNAME") {
        config.source.username = Some(val);
    }
    if let Some(val) = get("STOWAGE_SOURCE_PASSWORD") {
        config.source.password = secret_string_opt(Some(val));
    }
    if let Some(val) = get("STOWAGE_SOURCE_AUTH_SOURCE") {
        config.source.auth_source = val;
    }
    if let Some(val) = get("STOWAGE_SOURCE_DATABASE") {
        config.source.database = val;
    }
    if let Some(val) = get("STOWAGE_SOURCE_COLLECTION") {
        config.source.collection = val;
    }

    // Export overrides
    if let Some(val) = get("STOWAGE_EXPORT_SORT_FIELD") {
        config.export.sort_field = val;
    }
    if let Some(size) = parse_var(env, "STOWAGE_EXPORT_BATCH_SIZE")? {
        config.export.batch_size = size;
    }
    if let Some(max) = parse_var(env, "STOWAGE_EXPORT_MAX_DOCS")? {
        config.export.max_docs = max;
    }
    if let Some(val) = get("STOWAGE_EXPORT_LOCAL_TMP_DIR") {
        config.export.local_tmp_dir = val;
    }
    if let Some(codec) = get("STOWAGE_EXPORT_COMPRESSION") {
        config.export.compression = codec.parse().map_err(StowageError::Configuration)?;
    }

    // Storage overrides
    if let Some(val) = get("STOWAGE_STORAGE_URL") {
        config.storage.url = val;
    }
    if let Some(val) = get("STOWAGE_STORAGE_PREFIX") {
        config.storage.prefix = val;
    }
    if let Some(mb) = parse_var(env, "STOWAGE_STORAGE_CHUNK_MB")? {
        config.storage.chunk_mb = mb;
    }
    if let Some(secs) = parse_var(env, "STOWAGE_STORAGE_CONNECT_TIMEOUT_SECONDS")? {
        config.storage.connect_timeout_seconds = secs;
    }
    if let Some(secs) = parse_var(env, "STOWAGE_STORAGE_READ_TIMEOUT_SECONDS")? {
        config.storage.read_timeout_seconds = secs;
    }
    if let Some(secs) = parse_var(env, "STOWAGE_STORAGE_RETRY_DEADLINE_SECONDS")? {
        config.storage.retry.deadline_seconds = secs;
    }

    // Normalize overrides
    if let Some(n) = parse_var(env, "STOWAGE_NORMALIZE_SAMPLE_SIZE")? {
        config.normalize.sample_size = n;
    }
    if let Some(n) = parse_var(env, "STOWAGE_NORMALIZE_CONCURRENCY")? {
        config.normalize.concurrency = n;
    }

    // Logging overrides
    if let Some(val) = get("STOWAGE_LOGGING_LOCAL_ENABLED") {
        config.logging.local_enabled = val.parse().unwrap_or(false);
    }
    if let Some(val) = get("STOWAGE_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }

    Ok(())
}
