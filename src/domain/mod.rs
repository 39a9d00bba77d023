//! Domain models and types for Stowage.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Strongly-typed identifiers** ([`RunId`])
//! - **Record value model** ([`RecordValue`]) used by the normalizer
//! - **Typed cursor values** ([`SortValue`]) stored in checkpoints
//! - **Error types** ([`StowageError`], [`StorageError`])
//! - **Result type alias** ([`Result`])
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T, StowageError>`]:
//!
//! ```rust,no_run
//! use stowage::domain::Result;
//!
//! fn example() -> Result<()> {
//!     let config = stowage::config::load_config("stowage.toml")?;
//!     println!("{}", config.source.collection);
//!     Ok(())
//! }
//! ```

pub mod errors;
pub mod ids;
pub mod result;
pub mod sort_key;
pub mod value;

// Re-export commonly used types for convenience
pub use errors::{StorageError, StorageErrorKind, StowageError};
pub use ids::RunId;
pub use result::Result;
pub use sort_key::SortValue;
pub use value::RecordValue;
