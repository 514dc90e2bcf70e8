//! The logical value representation shared by the query planner, the schema
//! engine and the driver boundary. A [`Value`] is what gets bound as a SQL
//! parameter and what column defaults are stored as in schema snapshots.

use base64::Engine as _;
use bigdecimal::BigDecimal;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
#[error("conversion failed: expected {expected}, got {got}")]
pub struct ConversionFailure {
    pub expected: &'static str,
    pub got: &'static str,
}

impl ConversionFailure {
    pub fn new(expected: &'static str, got: &'static str) -> Self {
        ConversionFailure { expected, got }
    }
}

/// A logical database value.
///
/// `Int` and `BigInt` are both backed by `i64`; the distinction is preserved
/// because dialects shape them differently on the wire (e.g. big integers are
/// carried as strings through JSON aggregation).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum Value {
    Null,
    Boolean(bool),
    Int(i64),
    BigInt(i64),
    Float(f64),
    Decimal(BigDecimal),
    String(String),
    Enum(String),
    DateTime(DateTime<FixedOffset>),
    Date(NaiveDate),
    Time(NaiveTime),
    Json(serde_json::Value),
    Bytes(Vec<u8>),
    Vector(Vec<f32>),
    Point { x: f64, y: f64 },
    List(Vec<Value>),
    /// Symbolic reference to a column returned by an earlier statement in a
    /// write plan, e.g. `"user.id"`. The driver substitutes the concrete
    /// value before binding; rendering treats it like any other parameter.
    Placeholder(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Enum(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) | Value::BigInt(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn into_list(self) -> Option<Vec<Value>> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn into_string(self) -> Option<String> {
        match self {
            Value::String(s) | Value::Enum(s) => Some(s),
            _ => None,
        }
    }

    /// The variant name, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Boolean(_) => "Boolean",
            Value::Int(_) => "Int",
            Value::BigInt(_) => "BigInt",
            Value::Float(_) => "Float",
            Value::Decimal(_) => "Decimal",
            Value::String(_) => "String",
            Value::Enum(_) => "Enum",
            Value::DateTime(_) => "DateTime",
            Value::Date(_) => "Date",
            Value::Time(_) => "Time",
            Value::Json(_) => "Json",
            Value::Bytes(_) => "Bytes",
            Value::Vector(_) => "Vector",
            Value::Point { .. } => "Point",
            Value::List(_) => "List",
            Value::Placeholder(_) => "Placeholder",
        }
    }

    /// Render the value into its JSON wire form, the shape rows come back in
    /// from JSON-aggregated relation subqueries.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            // i64 loses precision in JS number space, so big integers travel
            // as strings.
            Value::BigInt(i) => serde_json::Value::String(i.to_string()),
            Value::Float(f) => serde_json::json!(f),
            Value::Decimal(d) => serde_json::Value::String(d.to_string()),
            Value::String(s) | Value::Enum(s) => serde_json::Value::String(s.clone()),
            Value::DateTime(dt) => serde_json::Value::String(dt.to_rfc3339()),
            Value::Date(d) => serde_json::Value::String(d.to_string()),
            Value::Time(t) => serde_json::Value::String(t.to_string()),
            Value::Json(j) => j.clone(),
            Value::Bytes(b) => {
                serde_json::Value::String(base64::engine::general_purpose::STANDARD.encode(b))
            }
            Value::Vector(v) => serde_json::Value::from_iter(v.iter().map(|f| {
                serde_json::Number::from_f64(f64::from(*f)).map_or(serde_json::Value::Null, Into::into)
            })),
            Value::Point { x, y } => serde_json::json!({ "x": x, "y": y }),
            Value::List(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Value::Placeholder(name) => serde_json::Value::String(format!("${{{name}}}")),
        }
    }

    /// Parse an RFC 3339 timestamp, the canonical text form used on dialects
    /// without a native timestamp parameter type.
    pub fn datetime_from_str(s: &str) -> Result<Value, ConversionFailure> {
        DateTime::parse_from_rfc3339(s)
            .map(Value::DateTime)
            .map_err(|_| ConversionFailure::new("RFC 3339 datetime", "String"))
    }

    pub fn decimal_from_str(s: &str) -> Result<Value, ConversionFailure> {
        BigDecimal::from_str(s)
            .map(Value::Decimal)
            .map_err(|_| ConversionFailure::new("decimal string", "String"))
    }

    pub fn bytes_from_base64(s: &str) -> Result<Value, ConversionFailure> {
        base64::engine::general_purpose::STANDARD
            .decode(s)
            .map(Value::Bytes)
            .map_err(|_| ConversionFailure::new("base64 string", "String"))
    }

    pub fn now() -> Value {
        Value::DateTime(Utc::now().fixed_offset())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Int(i) | Value::BigInt(i) => write!(f, "{i}"),
            Value::Float(fl) => write!(f, "{fl}"),
            Value::Decimal(d) => write!(f, "{d}"),
            Value::String(s) | Value::Enum(s) => write!(f, "{s}"),
            Value::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
            Value::Date(d) => write!(f, "{d}"),
            Value::Time(t) => write!(f, "{t}"),
            Value::Json(j) => write!(f, "{j}"),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Value::Vector(v) => write!(f, "[{} dims]", v.len()),
            Value::Point { x, y } => write!(f, "POINT({x} {y})"),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Placeholder(name) => write!(f, "${{{name}}}"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl<T> From<Option<T>> for Value
where
    Value: From<T>,
{
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(v) => Value::from(v),
            None => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn bigint_travels_as_string_in_json() {
        assert_eq!(
            Value::BigInt(9_007_199_254_740_993).to_json(),
            serde_json::Value::String("9007199254740993".to_owned())
        );
        assert_eq!(Value::Int(42).to_json(), serde_json::json!(42));
    }

    #[test]
    fn bytes_round_trip_base64() {
        let bytes = Value::Bytes(vec![0xde, 0xad, 0xbe, 0xef]);
        let encoded = match bytes.to_json() {
            serde_json::Value::String(s) => s,
            other => panic!("expected string, got {other:?}"),
        };
        assert_eq!(Value::bytes_from_base64(&encoded).unwrap(), bytes);
    }

    #[test]
    fn datetime_parsing_accepts_offsets() {
        let value = Value::datetime_from_str("2021-03-01T09:00:00+02:00").unwrap();
        match value {
            Value::DateTime(dt) => assert_eq!(dt.offset().local_minus_utc(), 2 * 3600),
            other => panic!("expected datetime, got {other:?}"),
        }
    }

    #[test]
    fn serde_round_trip() {
        let values = vec![
            Value::Null,
            Value::Boolean(true),
            Value::Int(-7),
            Value::String("hi".into()),
            Value::List(vec![Value::Int(1), Value::Int(2)]),
            Value::Placeholder("user.id".into()),
        ];
        for value in values {
            let text = serde_json::to_string(&value).unwrap();
            let back: Value = serde_json::from_str(&text).unwrap();
            assert_eq!(back, value);
        }
    }
}
