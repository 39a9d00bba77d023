//! Batch fingerprints
//!
//! A chunk records the SHA-256 of the batch it was built from. When a resumed
//! run finds the chunk already uploaded, the re-read batch is hashed again and
//! compared, so a source that changed since the crash is detected instead of
//! silently advancing the checkpoint past different data.

use crate::domain::value::document_to_json;
use crate::domain::Result;
use bson::Document;
use sha2::{Digest, Sha256};

/// Calculate the SHA-256 fingerprint of a batch
///
/// Each document is serialized as canonical JSON (sorted keys, per-kind text
/// rules for leaves) followed by a newline; the batch order is significant.
///
/// # Examples
///
/// ```
/// use stowage::core::normalize::fingerprint::batch_fingerprint;
/// use bson::doc;
///
/// let fp = batch_fingerprint(&[doc! { "_id": 1 }]).unwrap();
/// assert_eq!(fp.len(), 64);
/// ```
pub fn batch_fingerprint(docs: &[Document]) -> Result<String> {
    let mut hasher = Sha256::new();
    for doc in docs {
        let line = serde_json::to_string(&document_to_json(doc))?;
        hasher.update(line.as_bytes());
        hasher.update(b"\n");
    }
    let result = hasher.finalize();

    Ok(format!("{result:x}"))
}
