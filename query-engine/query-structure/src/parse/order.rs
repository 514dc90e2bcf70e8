use super::{json_kind, Parser};
use crate::error::Result;
use crate::order_by::{AggregateFunction, NullsOrder, OrderBy, OrderByTarget, SortOrder};
use crate::schema::Model;
use serde_json::Value as JsonValue;

/// Parse `orderBy`: a single object or an array of objects. Aggregate
/// targets are only legal where `allow_aggregates` is set (`aggregate`,
/// `groupBy`); `_count` over a relation is always allowed.
pub(super) fn parse_order_by(
    parser: &mut Parser<'_>,
    model: &Model,
    json: &JsonValue,
    allow_aggregates: bool,
) -> Result<Vec<OrderBy>> {
    let objects: Vec<&JsonValue> = match json {
        JsonValue::Array(items) => items.iter().collect(),
        JsonValue::Object(_) => vec![json],
        other => {
            return Err(parser.shape_error(format!(
                "`orderBy` must be an object or array, got {}",
                json_kind(other)
            )))
        }
    };

    let mut entries = Vec::new();
    for object in objects {
        let map = parser.expect_object(object)?;
        for (key, value) in map {
            let entry = parser.scoped(key, |p| {
                parse_order_entry(p, model, key, value, allow_aggregates)
            })?;
            entries.push(entry);
        }
    }

    Ok(entries)
}

fn parse_order_entry(
    parser: &mut Parser<'_>,
    model: &Model,
    key: &str,
    value: &JsonValue,
    allow_aggregates: bool,
) -> Result<OrderBy> {
    let aggregate = match key {
        "_count" => Some(AggregateFunction::Count),
        "_sum" => Some(AggregateFunction::Sum),
        "_avg" => Some(AggregateFunction::Avg),
        "_min" => Some(AggregateFunction::Min),
        "_max" => Some(AggregateFunction::Max),
        _ => None,
    };

    if let Some(func) = aggregate {
        return parse_aggregate_order(parser, model, func, value, allow_aggregates);
    }

    // A plain scalar ordering.
    let field = model.find_field(key)?;
    let (direction, nulls) = parse_direction(parser, value)?;
    Ok(OrderBy {
        target: OrderByTarget::Scalar(field.name.clone()),
        direction,
        nulls,
    })
}

fn parse_aggregate_order(
    parser: &mut Parser<'_>,
    model: &Model,
    func: AggregateFunction,
    value: &JsonValue,
    allow_aggregates: bool,
) -> Result<OrderBy> {
    let map = parser.expect_object(value)?;
    let (inner_key, inner_value) = map
        .iter()
        .next()
        .ok_or_else(|| parser.shape_error("aggregate ordering requires a field"))?;
    if map.len() > 1 {
        return Err(parser.shape_error("aggregate ordering takes a single field"));
    }

    // `_count: { relation: dir }` orders by the related row count.
    if func == AggregateFunction::Count && model.relations.contains_key(inner_key) {
        let (direction, nulls) = parse_direction(parser, inner_value)?;
        return Ok(OrderBy {
            target: OrderByTarget::RelationCount(inner_key.clone()),
            direction,
            nulls,
        });
    }

    if !allow_aggregates {
        return Err(parser.shape_error(format!(
            "aggregate ordering `{}` is only valid in `aggregate` and `groupBy`",
            func.payload_key()
        )));
    }

    let field = if inner_key == "_all" {
        if func != AggregateFunction::Count {
            return Err(parser.shape_error("`_all` is only valid under `_count`"));
        }
        None
    } else {
        Some(model.find_field(inner_key)?.name.clone())
    };

    let (direction, nulls) = parse_direction(parser, inner_value)?;
    Ok(OrderBy {
        target: OrderByTarget::Aggregate { func, field },
        direction,
        nulls,
    })
}

/// Accepts `"asc"`, `"desc"` or `{ sort, nulls }`.
fn parse_direction(parser: &Parser<'_>, json: &JsonValue) -> Result<(SortOrder, Option<NullsOrder>)> {
    match json {
        JsonValue::String(s) => Ok((parse_sort(parser, s)?, None)),
        JsonValue::Object(map) => {
            for key in map.keys() {
                if key != "sort" && key != "nulls" {
                    return Err(parser.shape_error(format!("unknown ordering key `{key}`")));
                }
            }
            let sort = map
                .get("sort")
                .and_then(JsonValue::as_str)
                .ok_or_else(|| parser.shape_error("ordering object requires `sort`"))?;
            let nulls = match map.get("nulls").and_then(JsonValue::as_str) {
                Some("first") => Some(NullsOrder::First),
                Some("last") => Some(NullsOrder::Last),
                Some(other) => {
                    return Err(parser.shape_error(format!("unknown nulls ordering `{other}`")))
                }
                None => None,
            };
            Ok((parse_sort(parser, sort)?, nulls))
        }
        other => Err(parser.shape_error(format!(
            "ordering direction must be a string or object, got {}",
            json_kind(other)
        ))),
    }
}

fn parse_sort(parser: &Parser<'_>, s: &str) -> Result<SortOrder> {
    match s {
        "asc" => Ok(SortOrder::Asc),
        "desc" => Ok(SortOrder::Desc),
        other => Err(parser.shape_error(format!("unknown sort direction `{other}`"))),
    }
}
