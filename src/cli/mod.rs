//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for Stowage using clap.

pub mod commands;

use clap::{Parser, Subcommand};

/// Stowage - MongoDB to Parquet export pipeline
#[derive(Parser, Debug)]
#[command(name = "stowage")]
#[command(version, about, long_about = None)]
#[command(author = "Stowage Contributors")]
pub struct Cli {
    /// Path to configuration file; the environment is used when it is missing
    #[arg(short, long, default_value = "stowage.toml", env = "STOWAGE_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "STOWAGE_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run or resume an export into object storage
    Export(commands::export::ExportArgs),

    /// Detect schema drift in a run and rewrite it with uniform column types
    Normalize(commands::normalize::NormalizeArgs),

    /// Show the checkpoint and manifest of a run
    Status(commands::status::StatusArgs),

    /// List a run's files and print the warehouse load jobs
    PlanLoad(commands::plan_load::PlanLoadArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_export() {
        let cli = Cli::parse_from(["stowage", "export", "--run-id", "r1", "--max-docs", "100"]);
        assert_eq!(cli.config, "stowage.toml");
        match cli.command {
            Commands::Export(args) => {
                assert_eq!(args.run_id.as_deref(), Some("r1"));
                assert_eq!(args.max_docs, Some(100));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_parse_with_config() {
        let cli = Cli::parse_from(["stowage", "--config", "custom.toml", "export"]);
        assert_eq!(cli.config, "custom.toml");
    }

    #[test]
    fn test_cli_parse_with_log_level() {
        let cli = Cli::parse_from(["stowage", "--log-level", "debug", "export"]);
        assert_eq!(cli.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_cli_parse_normalize() {
        let cli = Cli::parse_from([
            "stowage",
            "normalize",
            "--run-id",
            "r1",
            "--force-string-cols",
            "a,b",
            "--include-all-suspicious",
            "--plan-only",
        ]);
        match cli.command {
            Commands::Normalize(args) => {
                assert_eq!(args.force_string_cols.as_deref(), Some("a,b"));
                assert!(args.include_all_suspicious);
                assert!(args.plan_only);
                assert!(!args.overwrite);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_parse_plan_load() {
        let cli = Cli::parse_from(["stowage", "plan-load", "--max-uris", "10", "--append"]);
        assert!(matches!(cli.command, Commands::PlanLoad(_)));
    }

    #[test]
    fn test_cli_parse_validate_config() {
        let cli = Cli::parse_from(["stowage", "validate-config"]);
        assert!(matches!(cli.command, Commands::ValidateConfig(_)));
    }

    #[test]
    fn test_cli_parse_status() {
        let cli = Cli::parse_from(["stowage", "status", "--run-id", "r1"]);
        assert!(matches!(cli.command, Commands::Status(_)));
    }

    #[test]
    fn test_cli_parse_init() {
        let cli = Cli::parse_from(["stowage", "init"]);
        assert!(matches!(cli.command, Commands::Init(_)));
    }
}
