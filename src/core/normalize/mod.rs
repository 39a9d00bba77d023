//! Record normalization and chunk encoding
//!
//! - [`record`] - heterogeneous documents to an all-text Arrow table
//! - [`writer`] - Arrow table to a local Parquet chunk
//! - [`fingerprint`] - batch content hashes stored in chunk footers

pub mod fingerprint;
pub mod record;
pub mod writer;

pub use fingerprint::batch_fingerprint;
pub use record::{column_order, normalize_batch};
pub use writer::{chunk_file_name, read_footer, ChunkFooter, ChunkMetadata, ChunkWriter};
