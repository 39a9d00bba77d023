//! Core business logic for Stowage.
//!
//! # Modules
//!
//! - [`export`] - Resumable export loop, cursor and run layout
//! - [`normalize`] - Document batches to Parquet chunks
//! - [`state`] - Checkpoint and manifest persistence
//! - [`drift`] - Schema drift detection and the rewrite pass
//! - [`load`] - Warehouse load planning
//!
//! # Export Workflow
//!
//! 1. **Load State**: Read the run's checkpoint (or start fresh)
//! 2. **Read**: Fetch the next batch strictly after the last sort value
//! 3. **Normalize**: Render every field as text and encode a Parquet chunk
//! 4. **Upload**: Publish the chunk, unless it is already there
//! 5. **Checkpoint**: Advance the checkpoint only after the chunk is durable
//! 6. **Finish**: Write the manifest once the source is exhausted
//!
//! # Example
//!
//! ```rust,no_run
//! use stowage::adapters::source::create_document_source;
//! use stowage::adapters::storage::create_blob_store;
//! use stowage::config::load_config;
//! use stowage::core::export::ExportCoordinator;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("stowage.toml")?;
//! let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//!
//! let source = create_document_source(&config.source).await?;
//! let store = create_blob_store(&config.storage)?;
//! let coordinator = ExportCoordinator::new(config, source, store, shutdown_rx)?;
//!
//! let summary = coordinator.execute_export().await?;
//! println!("Chunks: {}", summary.total_chunks);
//! println!("Documents: {}", summary.total_docs);
//! # Ok(())
//! # }
//! ```

pub mod drift;
pub mod export;
pub mod load;
pub mod normalize;
pub mod state;
