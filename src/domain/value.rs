//! Record value model used at the normalization boundary
//!
//! Source documents are schemaless: the same field can hold a boolean in one
//! record, a string in the next and a nested document in a third. Every value
//! is first classified into a [`RecordValue`] and then rendered to text with
//! one deterministic rule per kind, so a column never has to reconcile types.

use bson::{Bson, Document};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

/// One field value, classified by kind
#[derive(Debug, Clone, PartialEq)]
pub enum RecordValue {
    /// Absent or explicit null
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// Object identifier, held in its canonical hex form
    Identifier(String),
    Timestamp(DateTime<Utc>),
    Binary(Vec<u8>),
    /// Nested document or array, already mapped to JSON
    Composite(Value),
    /// Any kind without a dedicated rule (decimal, regex, code, internal
    /// timestamps, min/max keys), mapped through relaxed Extended JSON
    Other(Value),
}

impl From<&Bson> for RecordValue {
    fn from(value: &Bson) -> Self {
        match value {
            Bson::Null | Bson::Undefined => RecordValue::Null,
            Bson::Boolean(b) => RecordValue::Bool(*b),
            Bson::Int32(i) => RecordValue::Int(i64::from(*i)),
            Bson::Int64(i) => RecordValue::Int(*i),
            Bson::Double(f) => RecordValue::Float(*f),
            Bson::String(s) | Bson::Symbol(s) => RecordValue::Text(s.clone()),
            Bson::ObjectId(oid) => RecordValue::Identifier(oid.to_hex()),
            Bson::DateTime(dt) => RecordValue::Timestamp(dt.to_chrono()),
            Bson::Binary(bin) => RecordValue::Binary(bin.bytes.clone()),
            Bson::Array(_) | Bson::Document(_) => RecordValue::Composite(bson_to_json(value)),
            other => RecordValue::Other(other.clone().into_relaxed_extjson()),
        }
    }
}

impl RecordValue {
    /// Renders the value as text; null stays null
    pub fn render(&self) -> Option<String> {
        match self {
            RecordValue::Null => None,
            RecordValue::Bool(b) => Some(b.to_string()),
            RecordValue::Int(i) => Some(i.to_string()),
            RecordValue::Float(f) => Some(format_float(*f)),
            RecordValue::Text(s) | RecordValue::Identifier(s) => Some(s.clone()),
            RecordValue::Timestamp(ts) => Some(format_timestamp(ts)),
            RecordValue::Binary(bytes) => Some(render_binary(bytes)),
            RecordValue::Composite(v) | RecordValue::Other(v) => Some(v.to_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, RecordValue::Null)
    }
}

/// ISO-8601 in UTC with a `Z` designator
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Shortest round-trip form; whole values keep a trailing `.0` so they stay
/// distinguishable from integers
pub fn format_float(f: f64) -> String {
    format!("{f:?}")
}

/// UTF-8 when the payload decodes cleanly, lowercase hex otherwise
pub fn render_binary(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => hex::encode(bytes),
    }
}

/// Maps a BSON value to JSON, applying the per-kind text rules to leaves
///
/// Keys of nested documents are emitted in sorted order, which keeps the
/// rendering deterministic without changing any value.
pub fn bson_to_json(value: &Bson) -> Value {
    match value {
        Bson::Null | Bson::Undefined => Value::Null,
        Bson::Boolean(b) => Value::Bool(*b),
        Bson::Int32(i) => Value::from(*i),
        Bson::Int64(i) => Value::from(*i),
        Bson::Double(f) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(format_float(*f))),
        Bson::String(s) | Bson::Symbol(s) => Value::String(s.clone()),
        Bson::ObjectId(oid) => Value::String(oid.to_hex()),
        Bson::DateTime(dt) => Value::String(format_timestamp(&dt.to_chrono())),
        Bson::Binary(bin) => Value::String(render_binary(&bin.bytes)),
        Bson::Array(items) => Value::Array(items.iter().map(bson_to_json).collect()),
        Bson::Document(doc) => document_to_json(doc),
        other => other.clone().into_relaxed_extjson(),
    }
}

/// Maps a whole document to a JSON object
pub fn document_to_json(doc: &Document) -> Value {
    let mut entries: Vec<(&String, &Bson)> = doc.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    Value::Object(
        entries
            .into_iter()
            .map(|(k, v)| (k.clone(), bson_to_json(v)))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::oid::ObjectId;
    use bson::spec::BinarySubtype;
    use bson::{doc, Binary};
    use chrono::TimeZone;

    #[test]
    fn test_scalars_render_uniformly() {
        assert_eq!(RecordValue::from(&Bson::Boolean(true)).render(), Some("true".into()));
        assert_eq!(RecordValue::from(&Bson::Int32(7)).render(), Some("7".into()));
        assert_eq!(RecordValue::from(&Bson::Int64(-3)).render(), Some("-3".into()));
        assert_eq!(RecordValue::from(&Bson::Double(1.0)).render(), Some("1.0".into()));
        assert_eq!(RecordValue::from(&Bson::Double(2.5)).render(), Some("2.5".into()));
        assert_eq!(
            RecordValue::from(&Bson::String("héllo".into())).render(),
            Some("héllo".into())
        );
    }

    #[test]
    fn test_null_stays_null() {
        assert_eq!(RecordValue::from(&Bson::Null).render(), None);
        assert!(RecordValue::from(&Bson::Undefined).is_null());
    }

    #[test]
    fn test_identifier_renders_hex() {
        let oid = ObjectId::parse_str("65a1b2c3d4e5f60718293a4b").unwrap();
        assert_eq!(
            RecordValue::from(&Bson::ObjectId(oid)).render(),
            Some("65a1b2c3d4e5f60718293a4b".into())
        );
    }

    #[test]
    fn test_timestamp_renders_iso_utc() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let value = Bson::DateTime(bson::DateTime::from_chrono(ts));
        assert_eq!(
            RecordValue::from(&value).render(),
            Some("2024-01-02T03:04:05Z".into())
        );
    }

    #[test]
    fn test_binary_utf8_or_hex() {
        let text = Bson::Binary(Binary {
            subtype: BinarySubtype::Generic,
            bytes: b"plain".to_vec(),
        });
        assert_eq!(RecordValue::from(&text).render(), Some("plain".into()));

        let raw = Bson::Binary(Binary {
            subtype: BinarySubtype::Generic,
            bytes: vec![0xff, 0x00, 0xab],
        });
        assert_eq!(RecordValue::from(&raw).render(), Some("ff00ab".into()));
    }

    #[test]
    fn test_composite_is_json_without_ascii_escaping() {
        let oid = ObjectId::parse_str("65a1b2c3d4e5f60718293a4b").unwrap();
        let nested = Bson::Document(doc! {
            "zeta": "ü",
            "alpha": [1, 2],
            "ref": oid,
        });
        let rendered = RecordValue::from(&nested).render().unwrap();
        assert_eq!(
            rendered,
            r#"{"alpha":[1,2],"ref":"65a1b2c3d4e5f60718293a4b","zeta":"ü"}"#
        );
    }

    #[test]
    fn test_unsupported_kind_falls_back_to_text() {
        let regex = Bson::RegularExpression(bson::Regex {
            pattern: "^a".into(),
            options: "i".into(),
        });
        let rendered = RecordValue::from(&regex).render().unwrap();
        assert!(rendered.contains("^a"));
    }
}
