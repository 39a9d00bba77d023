//! Typed cursor values
//!
//! The checkpoint stores the last sort-key value as `{"type": ..., "value": ...}`
//! so that a resumed run can rebuild a value the source compares correctly
//! (an object id must be queried as an object id, not as its hex string).

use bson::oid::ObjectId;
use bson::Bson;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Last observed value of the sort field
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "TaggedSortValue", into = "TaggedSortValue")]
pub enum SortValue {
    /// No cursor yet; the next query is unfiltered
    #[default]
    None,
    ObjectId(String),
    DateTime(DateTime<Utc>),
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

/// Wire shape of a [`SortValue`]
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TaggedSortValue {
    #[serde(rename = "type", default = "default_tag")]
    kind: String,
    #[serde(default)]
    value: Value,
}

fn default_tag() -> String {
    "none".to_string()
}

impl SortValue {
    /// Captures the sort value of a document field
    ///
    /// Only kinds the checkpoint can tag are accepted. Any other kind (a
    /// timestamp, a decimal, a null, ...) could not be queried back with
    /// `$gt`, and non-finite floats could not be written to the checkpoint.
    pub fn from_bson(value: &Bson) -> Result<Self, String> {
        match value {
            Bson::ObjectId(oid) => Ok(SortValue::ObjectId(oid.to_hex())),
            Bson::DateTime(dt) => Ok(SortValue::DateTime(dt.to_chrono())),
            Bson::Int32(i) => Ok(SortValue::Int(i64::from(*i))),
            Bson::Int64(i) => Ok(SortValue::Int(*i)),
            Bson::Double(f) if f.is_finite() => Ok(SortValue::Float(*f)),
            Bson::Double(f) => Err(format!("non-finite float {f} cannot be a sort value")),
            Bson::Boolean(b) => Ok(SortValue::Bool(*b)),
            Bson::String(s) => Ok(SortValue::Str(s.clone())),
            other => Err(format!(
                "{:?} values cannot be used as a sort key (got {other})",
                other.element_type()
            )),
        }
    }

    /// Rebuilds the query-comparable value; `None` means "no filter"
    pub fn to_bson(&self) -> Result<Option<Bson>, String> {
        let value = match self {
            SortValue::None => return Ok(None),
            SortValue::ObjectId(hex) => Bson::ObjectId(
                ObjectId::parse_str(hex).map_err(|e| format!("Invalid object id '{hex}': {e}"))?,
            ),
            SortValue::DateTime(ts) => Bson::DateTime(bson::DateTime::from_chrono(*ts)),
            SortValue::Int(i) => Bson::Int64(*i),
            SortValue::Float(f) => Bson::Double(*f),
            SortValue::Bool(b) => Bson::Boolean(*b),
            SortValue::Str(s) => Bson::String(s.clone()),
        };
        Ok(Some(value))
    }

    pub fn is_none(&self) -> bool {
        matches!(self, SortValue::None)
    }

    /// Tag written to the checkpoint file
    pub fn type_name(&self) -> &'static str {
        match self {
            SortValue::None => "none",
            SortValue::ObjectId(_) => "objectid",
            SortValue::DateTime(_) => "datetime",
            SortValue::Int(_) => "int",
            SortValue::Float(_) => "float",
            SortValue::Bool(_) => "bool",
            SortValue::Str(_) => "str",
        }
    }
}

impl fmt::Display for SortValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortValue::None => write!(f, "<none>"),
            SortValue::ObjectId(hex) => write!(f, "ObjectId({hex})"),
            SortValue::DateTime(ts) => {
                write!(f, "{}", ts.to_rfc3339_opts(SecondsFormat::Millis, true))
            }
            SortValue::Int(i) => write!(f, "{i}"),
            SortValue::Float(v) => write!(f, "{v:?}"),
            SortValue::Bool(b) => write!(f, "{b}"),
            SortValue::Str(s) => write!(f, "{s}"),
        }
    }
}

impl From<SortValue> for TaggedSortValue {
    fn from(value: SortValue) -> Self {
        let kind = value.type_name().to_string();
        let value = match value {
            SortValue::None => Value::Null,
            SortValue::ObjectId(hex) => Value::String(hex),
            SortValue::DateTime(ts) => {
                Value::String(ts.to_rfc3339_opts(SecondsFormat::Millis, true))
            }
            SortValue::Int(i) => Value::from(i),
            SortValue::Float(f) => serde_json::Number::from_f64(f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            SortValue::Bool(b) => Value::Bool(b),
            SortValue::Str(s) => Value::String(s),
        };
        TaggedSortValue { kind, value }
    }
}

impl TryFrom<TaggedSortValue> for SortValue {
    type Error = String;

    fn try_from(tagged: TaggedSortValue) -> Result<Self, Self::Error> {
        let TaggedSortValue { kind, value } = tagged;
        match kind.as_str() {
            "none" => Ok(SortValue::None),
            "objectid" => value
                .as_str()
                .map(|s| SortValue::ObjectId(s.to_string()))
                .ok_or_else(|| mismatch(&kind, "a hex string", &value)),
            "datetime" => {
                let raw = value
                    .as_str()
                    .ok_or_else(|| mismatch(&kind, "an ISO-8601 string", &value))?;
                DateTime::parse_from_rfc3339(raw)
                    .map(|ts| SortValue::DateTime(ts.with_timezone(&Utc)))
                    .map_err(|e| format!("Invalid datetime cursor '{raw}': {e}"))
            }
            "int" => value
                .as_i64()
                .map(SortValue::Int)
                .ok_or_else(|| mismatch(&kind, "an integer", &value)),
            "float" => value
                .as_f64()
                .map(SortValue::Float)
                .ok_or_else(|| mismatch(&kind, "a number", &value)),
            "bool" => value
                .as_bool()
                .map(SortValue::Bool)
                .ok_or_else(|| mismatch(&kind, "a boolean", &value)),
            "str" => match value {
                Value::String(s) => Ok(SortValue::Str(s)),
                Value::Null => Err(mismatch(&kind, "a string", &Value::Null)),
                other => Ok(SortValue::Str(other.to_string())),
            },
            other => Err(format!("Unknown last_sort_value type '{other}'")),
        }
    }
}

fn mismatch(kind: &str, expected: &str, value: &Value) -> String {
    format!("last_sort_value of type '{kind}' needs {expected}, got {value}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_objectid_round_trip_to_query_value() {
        let oid = ObjectId::parse_str("65a1b2c3d4e5f60718293a4b").unwrap();
        let value = SortValue::from_bson(&Bson::ObjectId(oid)).unwrap();

        let encoded = serde_json::to_value(&value).unwrap();
        assert_eq!(
            encoded,
            json!({"type": "objectid", "value": "65a1b2c3d4e5f60718293a4b"})
        );

        let decoded: SortValue = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded.to_bson().unwrap(), Some(Bson::ObjectId(oid)));
    }

    #[test]
    fn test_datetime_is_reconstructed_as_date() {
        let ts = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let value =
            SortValue::from_bson(&Bson::DateTime(bson::DateTime::from_chrono(ts))).unwrap();

        let encoded = serde_json::to_value(&value).unwrap();
        assert_eq!(encoded["type"], "datetime");
        assert_eq!(encoded["value"], "2024-06-01T12:00:00.000Z");

        let decoded: SortValue = serde_json::from_value(encoded).unwrap();
        assert!(matches!(decoded.to_bson().unwrap(), Some(Bson::DateTime(_))));
    }

    #[test]
    fn test_none_accepts_null_or_missing_value() {
        let a: SortValue = serde_json::from_value(json!({"type": "none", "value": null})).unwrap();
        let b: SortValue = serde_json::from_value(json!({"type": "none"})).unwrap();
        let c: SortValue = serde_json::from_value(json!({})).unwrap();
        assert!(a.is_none() && b.is_none() && c.is_none());
        assert_eq!(a.to_bson().unwrap(), None);
    }

    #[test]
    fn test_scalar_tags() {
        for (value, tag) in [
            (SortValue::Int(5), "int"),
            (SortValue::Float(1.5), "float"),
            (SortValue::Bool(true), "bool"),
            (SortValue::Str("k".into()), "str"),
        ] {
            let encoded = serde_json::to_value(&value).unwrap();
            assert_eq!(encoded["type"], tag);
            let decoded: SortValue = serde_json::from_value(encoded).unwrap();
            assert_eq!(decoded, value);
        }
    }

    #[test]
    fn test_unknown_tag_is_rejected() {
        let result: Result<SortValue, _> =
            serde_json::from_value(json!({"type": "decimal", "value": "1"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_int32_widens() {
        assert_eq!(SortValue::from_bson(&Bson::Int32(4)), Ok(SortValue::Int(4)));
    }

    #[test]
    fn test_untagged_kinds_are_rejected() {
        let timestamp = Bson::Timestamp(bson::Timestamp {
            time: 2,
            increment: 0,
        });
        assert!(SortValue::from_bson(&timestamp).is_err());
        assert!(SortValue::from_bson(&Bson::Null).is_err());
        assert!(SortValue::from_bson(&Bson::Document(bson::doc! { "a": 1 })).is_err());
    }

    #[test]
    fn test_non_finite_floats_are_rejected() {
        assert!(SortValue::from_bson(&Bson::Double(f64::NAN)).is_err());
        assert!(SortValue::from_bson(&Bson::Double(f64::INFINITY)).is_err());
        assert_eq!(
            SortValue::from_bson(&Bson::Double(2.5)),
            Ok(SortValue::Float(2.5))
        );
    }
}
