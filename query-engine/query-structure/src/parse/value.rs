use super::{json_kind, Parser};
use crate::error::Result;
use crate::schema::{Field, ScalarKind};
use model_value::Value;
use serde_json::Value as JsonValue;
use std::str::FromStr;

/// Coerce a payload value for a field, honoring list arity: list fields
/// accept arrays of elements.
pub(crate) fn coerce_field_value(
    parser: &Parser<'_>,
    field: &Field,
    json: &JsonValue,
) -> Result<Value> {
    if field.is_list() {
        match json {
            JsonValue::Null => Ok(Value::Null),
            JsonValue::Array(items) => {
                let values = items
                    .iter()
                    .map(|item| coerce_element(parser, field, item))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::List(values))
            }
            other => Err(parser.shape_error(format!(
                "expected an array for list field `{}`, got {}",
                field.name,
                json_kind(other)
            ))),
        }
    } else {
        coerce_element(parser, field, json)
    }
}

/// Coerce a single element of the field's scalar kind.
pub(crate) fn coerce_element(parser: &Parser<'_>, field: &Field, json: &JsonValue) -> Result<Value> {
    if json.is_null() {
        return Ok(Value::Null);
    }

    let mismatch =
        || parser.shape_error(format!(
            "expected a {} value for field `{}`, got {}",
            field.kind.name(),
            field.name,
            json_kind(json)
        ));

    match field.kind {
        ScalarKind::String => json
            .as_str()
            .map(|s| Value::String(s.to_owned()))
            .ok_or_else(mismatch),
        ScalarKind::Enum => json
            .as_str()
            .map(|s| Value::Enum(s.to_owned()))
            .ok_or_else(mismatch),
        ScalarKind::Int => json.as_i64().map(Value::Int).ok_or_else(mismatch),
        ScalarKind::BigInt => match json {
            JsonValue::Number(n) => n.as_i64().map(Value::BigInt).ok_or_else(mismatch),
            // Big integers may arrive as strings to dodge JS number limits.
            JsonValue::String(s) => s.parse::<i64>().map(Value::BigInt).map_err(|_| mismatch()),
            _ => Err(mismatch()),
        },
        ScalarKind::Float => json.as_f64().map(Value::Float).ok_or_else(mismatch),
        ScalarKind::Decimal => match json {
            JsonValue::Number(n) => Value::decimal_from_str(&n.to_string()).map_err(|_| mismatch()),
            JsonValue::String(s) => Value::decimal_from_str(s).map_err(|_| mismatch()),
            _ => Err(mismatch()),
        },
        ScalarKind::Boolean => json.as_bool().map(Value::Boolean).ok_or_else(mismatch),
        ScalarKind::DateTime => json
            .as_str()
            .ok_or_else(mismatch)
            .and_then(|s| Value::datetime_from_str(s).map_err(|_| mismatch())),
        ScalarKind::Date => json
            .as_str()
            .ok_or_else(mismatch)
            .and_then(|s| chrono::NaiveDate::from_str(s).map(Value::Date).map_err(|_| mismatch())),
        ScalarKind::Time => json
            .as_str()
            .ok_or_else(mismatch)
            .and_then(|s| chrono::NaiveTime::from_str(s).map(Value::Time).map_err(|_| mismatch())),
        ScalarKind::Json => Ok(Value::Json(json.clone())),
        ScalarKind::Bytes => json
            .as_str()
            .ok_or_else(mismatch)
            .and_then(|s| Value::bytes_from_base64(s).map_err(|_| mismatch())),
        ScalarKind::Vector => coerce_vector(parser, field, json).map(Value::Vector),
        ScalarKind::Point => coerce_point(json).ok_or_else(mismatch),
    }
}

pub(crate) fn coerce_vector(
    parser: &Parser<'_>,
    field: &Field,
    json: &JsonValue,
) -> Result<Vec<f32>> {
    let items = json.as_array().ok_or_else(|| {
        parser.shape_error(format!(
            "expected a number array for vector field `{}`",
            field.name
        ))
    })?;

    let floats = items
        .iter()
        .map(|item| {
            item.as_f64().map(|f| f as f32).ok_or_else(|| {
                parser.shape_error(format!(
                    "vector for field `{}` contains a non-number",
                    field.name
                ))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    if let Some(dimension) = field.dimension {
        if floats.len() != dimension as usize {
            return Err(parser.shape_error(format!(
                "vector for field `{}` has {} dimensions, expected {dimension}",
                field.name,
                floats.len(),
            )));
        }
    }

    Ok(floats)
}

fn coerce_point(json: &JsonValue) -> Option<Value> {
    match json {
        JsonValue::Object(map) => {
            let x = map.get("x")?.as_f64()?;
            let y = map.get("y")?.as_f64()?;
            Some(Value::Point { x, y })
        }
        JsonValue::Array(items) if items.len() == 2 => {
            let x = items[0].as_f64()?;
            let y = items[1].as_f64()?;
            Some(Value::Point { x, y })
        }
        _ => None,
    }
}
