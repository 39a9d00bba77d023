// Run state: checkpoint, manifest and their persistence

pub mod checkpoint;
pub mod manager;
pub mod manifest;

pub use checkpoint::{Checkpoint, CHECKPOINT_SCHEMA_VERSION};
pub use manager::CheckpointStore;
pub use manifest::{Manifest, MANIFEST_SCHEMA_VERSION};
