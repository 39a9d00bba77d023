//! Source document store
//!
//! - [`traits`] - the [`DocumentSource`] trait
//! - [`mongo`] - MongoDB implementation
//! - [`memory`] - in-memory implementation for tests and dry runs

pub mod memory;
pub mod mongo;
pub mod traits;

pub use memory::MemorySource;
pub use mongo::MongoSource;
pub use traits::DocumentSource;

use crate::config::SourceConfig;
use crate::domain::Result;
use std::sync::Arc;

/// Connect to the configured MongoDB collection
///
/// # Errors
///
/// Returns an error if the connection or the initial ping fails.
pub async fn create_document_source(config: &SourceConfig) -> Result<Arc<dyn DocumentSource>> {
    tracing::info!(
        database = %config.database,
        collection = %config.collection,
        "Creating MongoDB source"
    );
    let source = MongoSource::connect(config.clone()).await?;
    Ok(Arc::new(source))
}
