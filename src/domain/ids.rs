//! Domain identifier types with validation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Format used for generated run identifiers
pub const RUN_ID_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Run identifier newtype wrapper
///
/// Scopes the checkpoint, chunks and manifest of one export attempt. The
/// value becomes part of an object path (`run_id=<id>`), so it must be
/// non-empty and cannot contain a path separator.
///
/// # Examples
///
/// ```
/// use stowage::domain::ids::RunId;
/// use std::str::FromStr;
///
/// let run_id = RunId::from_str("20250101T000000Z").unwrap();
/// assert_eq!(run_id.as_str(), "20250101T000000Z");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(String);

impl RunId {
    /// Creates a new RunId from a string
    pub fn new(id: impl Into<String>) -> Result<Self, String> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err("Run ID cannot be empty".to_string());
        }
        if trimmed.contains('/') {
            return Err(format!("Run ID '{trimmed}' cannot contain '/'"));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Generates a run id from the current UTC time
    pub fn generate() -> Self {
        Self::from_timestamp(Utc::now())
    }

    /// Formats a timestamp as a run id
    pub fn from_timestamp(ts: DateTime<Utc>) -> Self {
        Self(ts.format(RUN_ID_FORMAT).to_string())
    }

    /// Resolves an optional configured id, generating one when absent
    pub fn resolve(configured: Option<&str>) -> Result<Self, String> {
        match configured {
            Some(id) if !id.trim().is_empty() => Self::new(id),
            _ => Ok(Self::generate()),
        }
    }

    /// Returns the run id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RunId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for RunId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_run_id_valid() {
        let id = RunId::new("nightly-01").unwrap();
        assert_eq!(id.as_str(), "nightly-01");
        assert_eq!(id.to_string(), "nightly-01");
    }

    #[test]
    fn test_run_id_rejects_empty_and_separator() {
        assert!(RunId::new("").is_err());
        assert!(RunId::new("   ").is_err());
        assert!(RunId::new("a/b").is_err());
    }

    #[test]
    fn test_run_id_from_timestamp() {
        let ts = Utc.with_ymd_and_hms(2025, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(RunId::from_timestamp(ts).as_str(), "20250309T140507Z");
    }

    #[test]
    fn test_run_id_resolve() {
        assert_eq!(RunId::resolve(Some("r1")).unwrap().as_str(), "r1");
        let generated = RunId::resolve(None).unwrap();
        assert_eq!(generated.as_str().len(), 16);
        assert!(generated.as_str().ends_with('Z'));
        assert!(RunId::resolve(Some("")).is_ok());
    }
}
