//! Export orchestration
//!
//! This module provides the resumable export loop:
//! - Run layout (object paths of chunks, checkpoint and manifest)
//! - Value-based batch cursor over the source
//! - Export coordination and orchestration
//! - Summary and reporting

pub mod coordinator;
pub mod cursor;
pub mod layout;
pub mod summary;

pub use coordinator::ExportCoordinator;
pub use cursor::{Batch, BatchCursor};
pub use layout::RunLayout;
pub use summary::{ExportOutcome, ExportSummary};
