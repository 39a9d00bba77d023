//! External system integrations for Stowage.
//!
//! This module provides adapters for the two systems the pipeline talks to:
//!
//! - [`source`] - the document store exports read from (MongoDB)
//! - [`storage`] - durable object storage chunks are written to (GCS, local,
//!   in-memory)
//!
//! # Design Pattern
//!
//! Adapters follow the **Adapter Pattern** to isolate external dependencies and
//! enable testing with in-memory implementations. Both layers are trait-based
//! ([`source::DocumentSource`], [`storage::BlobStore`]).
//!
//! # Example
//!
//! ```rust,no_run
//! use stowage::adapters::storage::{create_blob_store, BlobStore};
//! use stowage::config::StorageConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = StorageConfig {
//!     url: "file:///var/lib/stowage".to_string(),
//!     ..Default::default()
//! };
//! let store = create_blob_store(&config)?;
//! let checkpoint = store.read_text("exports/run_id=r1/_checkpoint.json").await?;
//! println!("{checkpoint:?}");
//! # Ok(())
//! # }
//! ```

pub mod source;
pub mod storage;
