//! Shared value-shaping helpers used by the dialect implementations.

use base64::Engine as _;
use model_value::Value;
use query_structure::{Error, Field, Result, ScalarKind};

/// Render a vector as the `[1,2,3]` text form understood by pgvector.
pub(crate) fn vector_text(reference: &[f32]) -> String {
    let mut out = String::with_capacity(reference.len() * 8 + 2);
    out.push('[');
    for (i, f) in reference.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&f.to_string());
    }
    out.push(']');
    out
}

/// Interpret a driver value against the field's logical kind. Dialects that
/// store temporals, booleans, JSON or lists in degraded column types share
/// this recovery path.
pub(crate) fn from_database(value: Value, field: &Field) -> Result<Value> {
    let mismatch = |value: &Value| {
        Error::internal(format!(
            "driver returned {} for {} field `{}`",
            value.type_name(),
            field.kind.name(),
            field.name,
        ))
    };

    if value.is_null() {
        return Ok(Value::Null);
    }

    if field.is_list() {
        return match value {
            Value::List(items) => Ok(Value::List(
                items
                    .into_iter()
                    .map(|item| element_from_database(item, field, &mismatch))
                    .collect::<Result<_>>()?,
            )),
            Value::Json(serde_json::Value::Array(items)) => Ok(Value::List(
                items
                    .into_iter()
                    .map(|item| json_element(item, field).ok_or_else(|| mismatch(&Value::Null)))
                    .collect::<Result<_>>()?,
            )),
            Value::String(text) => {
                let json: serde_json::Value = serde_json::from_str(&text)
                    .map_err(|_| mismatch(&Value::String(text.clone())))?;
                from_database(Value::Json(json), field)
            }
            other => Err(mismatch(&other)),
        };
    }

    element_from_database(value, field, &mismatch)
}

fn element_from_database(
    value: Value,
    field: &Field,
    mismatch: &dyn Fn(&Value) -> Error,
) -> Result<Value> {
    match (field.kind, value) {
        (ScalarKind::Boolean, Value::Int(i)) => Ok(Value::Boolean(i != 0)),
        (ScalarKind::DateTime, Value::String(s)) => parse_datetime(&s)
            .ok_or_else(|| mismatch(&Value::String(s.clone()))),
        (ScalarKind::Date, Value::String(s)) => s
            .parse()
            .map(Value::Date)
            .map_err(|_| mismatch(&Value::String(s.clone()))),
        (ScalarKind::Time, Value::String(s)) => s
            .parse()
            .map(Value::Time)
            .map_err(|_| mismatch(&Value::String(s.clone()))),
        (ScalarKind::Json, Value::String(s)) => serde_json::from_str(&s)
            .map(Value::Json)
            .map_err(|_| mismatch(&Value::String(s.clone()))),
        (ScalarKind::Decimal, Value::String(s)) => {
            Value::decimal_from_str(&s).map_err(|_| mismatch(&Value::String(s.clone())))
        }
        (ScalarKind::Decimal, Value::Float(f)) => {
            Value::decimal_from_str(&f.to_string()).map_err(|_| mismatch(&Value::Float(f)))
        }
        (ScalarKind::BigInt, Value::Int(i)) => Ok(Value::BigInt(i)),
        (ScalarKind::BigInt, Value::String(s)) => s
            .parse()
            .map(Value::BigInt)
            .map_err(|_| mismatch(&Value::String(s.clone()))),
        (ScalarKind::Bytes, Value::String(s)) => {
            Value::bytes_from_base64(&s).map_err(|_| mismatch(&Value::String(s.clone())))
        }
        (ScalarKind::Enum, Value::String(s)) => Ok(Value::Enum(s)),
        (ScalarKind::Vector, Value::String(s)) => parse_vector_text(&s)
            .map(Value::Vector)
            .ok_or_else(|| mismatch(&Value::String(s.clone()))),
        (_, value) => Ok(value),
    }
}

fn json_element(json: serde_json::Value, field: &Field) -> Option<Value> {
    match (field.kind, json) {
        (ScalarKind::String, serde_json::Value::String(s)) => Some(Value::String(s)),
        (ScalarKind::Enum, serde_json::Value::String(s)) => Some(Value::Enum(s)),
        (ScalarKind::Int | ScalarKind::BigInt, serde_json::Value::Number(n)) => {
            n.as_i64().map(if field.kind == ScalarKind::Int {
                Value::Int
            } else {
                Value::BigInt
            })
        }
        (ScalarKind::Float, serde_json::Value::Number(n)) => n.as_f64().map(Value::Float),
        (ScalarKind::Decimal, serde_json::Value::String(s)) => Value::decimal_from_str(&s).ok(),
        (ScalarKind::Decimal, serde_json::Value::Number(n)) => {
            Value::decimal_from_str(&n.to_string()).ok()
        }
        (ScalarKind::Boolean, serde_json::Value::Bool(b)) => Some(Value::Boolean(b)),
        (ScalarKind::DateTime, serde_json::Value::String(s)) => parse_datetime(&s),
        (_, other) => Some(Value::Json(other)),
    }
}

pub(crate) fn parse_datetime(s: &str) -> Option<Value> {
    if let Ok(value) = Value::datetime_from_str(s) {
        return Some(value);
    }
    // The `YYYY-MM-DD HH:MM:SS[.ffffff]` form MySQL and SQLite hand back.
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|naive| Value::DateTime(naive.and_utc().fixed_offset()))
}

fn parse_vector_text(s: &str) -> Option<Vec<f32>> {
    let trimmed = s.trim().strip_prefix('[')?.strip_suffix(']')?;
    if trimmed.is_empty() {
        return Some(Vec::new());
    }
    trimmed
        .split(',')
        .map(|part| part.trim().parse::<f32>().ok())
        .collect()
}

/// Serialize a list value into a JSON array for dialects without native
/// array columns.
pub(crate) fn list_to_json(items: Vec<Value>) -> Value {
    Value::Json(serde_json::Value::Array(
        items.into_iter().map(|item| item.to_json()).collect(),
    ))
}

/// Render a constant default as a SQL literal, for DDL.
pub(crate) fn default_literal(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some("NULL".to_owned()),
        Value::Boolean(b) => Some(if *b { "true" } else { "false" }.to_owned()),
        Value::Int(i) | Value::BigInt(i) => Some(i.to_string()),
        Value::Float(f) => Some(f.to_string()),
        Value::Decimal(d) => Some(d.to_string()),
        Value::String(s) | Value::Enum(s) => Some(format!("'{}'", s.replace('\'', "''"))),
        Value::DateTime(dt) => Some(format!("'{}'", dt.to_rfc3339())),
        Value::Date(d) => Some(format!("'{d}'")),
        Value::Time(t) => Some(format!("'{t}'")),
        Value::Json(j) => Some(format!("'{}'", j.to_string().replace('\'', "''"))),
        Value::Bytes(b) => Some(format!(
            "'{}'",
            base64::engine::general_purpose::STANDARD.encode(b)
        )),
        _ => None,
    }
}
