//! CLI command implementations
//!
//! This module contains all CLI command implementations.

pub mod export;
pub mod init;
pub mod normalize;
pub mod plan_load;
pub mod status;
pub mod validate;

use crate::config::{load_config_or_env, StowageConfig};
use crate::core::export::RunLayout;
use crate::domain::RunId;

/// Loads the configuration, printing the failure and returning exit code 2
pub(crate) fn load_or_exit_code(config_path: &str) -> Result<StowageConfig, i32> {
    load_config_or_env(config_path).map_err(|e| {
        tracing::error!(error = %e, "Failed to load configuration");
        println!("❌ Failed to load configuration");
        println!("   Error: {e}");
        2
    })
}

/// Layout of an existing run, named on the command line or in the config
///
/// Unlike `export`, commands that inspect a run never generate a run id.
pub(crate) fn existing_run_layout(
    config: &StowageConfig,
    run_id: Option<&str>,
) -> Result<Option<RunLayout>, String> {
    let Some(id) = run_id.or(config.application.run_id.as_deref()) else {
        return Ok(None);
    };
    let run_id = RunId::new(id)?;
    Ok(Some(RunLayout::new(
        &config.storage.base_prefix(),
        run_id,
        config.source.database.clone(),
        config.source.collection.clone(),
    )))
}

/// Splits a comma-separated column list, dropping empty entries
pub(crate) fn parse_csv_set(value: Option<&str>) -> std::collections::BTreeSet<String> {
    value
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_csv_set() {
        let set = parse_csv_set(Some(" a, b,,a ,"));
        assert_eq!(set.into_iter().collect::<Vec<_>>(), vec!["a", "b"]);
        assert!(parse_csv_set(None).is_empty());
    }
}
