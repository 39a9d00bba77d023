// Stowage - MongoDB to Parquet export pipeline
// Copyright (c) 2025 Stowage Contributors
// Licensed under the MIT License

//! # Stowage - MongoDB to Parquet export pipeline
//!
//! Stowage moves a large document collection into immutable Parquet files in
//! object storage, surviving crashes and network failures, and then rewrites
//! those files so every column has one type across the whole run.
//!
//! ## Overview
//!
//! This library provides the core functionality for:
//! - **Extracting** documents in bounded batches ordered by a monotonic field
//! - **Normalizing** heterogeneous documents into all-text columnar chunks
//! - **Uploading** chunks with retries bounded by a total deadline
//! - **Checkpointing** after every durable chunk so a rerun resumes exactly
//! - **Rewriting** exported chunks to remove cross-file type drift
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Business logic (export, normalize, state, drift, load)
//! - [`adapters`] - External integrations (MongoDB, object storage)
//! - [`domain`] - Core domain types and errors
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use stowage::adapters::source::create_document_source;
//! use stowage::adapters::storage::create_blob_store;
//! use stowage::config::load_config;
//! use stowage::core::export::ExportCoordinator;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config("stowage.toml")?;
//!     let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//!
//!     let source = create_document_source(&config.source).await?;
//!     let store = create_blob_store(&config.storage)?;
//!     let coordinator = ExportCoordinator::new(config, source, store, shutdown_rx)?;
//!
//!     let summary = coordinator.execute_export().await?;
//!     println!("Exported {} documents", summary.total_docs);
//!     Ok(())
//! }
//! ```
//!
//! ## Resuming
//!
//! Every run lives under `run_id=<id>`. Running the export again with the
//! same run id continues after the last checkpointed chunk; a run with a
//! manifest is complete and is left untouched.
//!
//! ## Error Handling
//!
//! All library errors are [`domain::StowageError`]:
//!
//! ```rust,no_run
//! use stowage::domain::StowageError;
//!
//! fn example() -> Result<(), StowageError> {
//!     let config = stowage::config::load_config("stowage.toml")?;
//!     println!("{}", config.storage.url);
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
