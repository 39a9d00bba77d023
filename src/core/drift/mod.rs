//! Schema drift handling
//!
//! A second pass over an exported run:
//! - [`detector`] samples chunk schemas and plans which columns to cast
//! - [`rewrite`] copies every chunk to a mirror prefix with those columns
//!   cast to text

pub mod detector;
pub mod rewrite;

pub use detector::{is_suspicious, list_parquet, read_schema, DriftPlan, DriftReport};
pub use rewrite::{cast_to_utf8, mirrored_path, DriftNormalizer, RewriteFailure, RewriteSummary};
