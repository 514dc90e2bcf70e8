use super::value::{coerce_element, coerce_field_value, coerce_vector};
use super::{json_kind, Parser};
use crate::arguments::UniqueFilter;
use crate::error::{Error, Result};
use crate::filter::{
    AggregateFilter, Filter, GeometryCondition, GeometryOp, GroupFilter, JsonCondition, JsonOp,
    JsonPathSegment, QueryMode, RelationCondition, RelationFilter, ScalarCondition, ScalarFilter,
    VectorCondition, VectorMetric,
};
use crate::operation::Operation;
use crate::order_by::AggregateFunction;
use crate::schema::{Field, Model, RelationKind, ScalarKind};
use model_value::Value;
use serde_json::Value as JsonValue;

pub(super) fn parse_filter(parser: &mut Parser<'_>, model: &Model, json: &JsonValue) -> Result<Filter> {
    let object = parser.expect_object(json)?;
    let mut children = Vec::with_capacity(object.len());

    for (key, value) in object {
        let child = parser.scoped(key, |p| match key.as_str() {
            "AND" => Ok(Filter::And(parse_filter_list(p, model, value)?)),
            "OR" => Ok(Filter::Or(parse_filter_list(p, model, value)?)),
            "NOT" => Ok(Filter::Not(parse_filter_list(p, model, value)?)),
            _ => {
                if let Ok(field) = model.find_field(key) {
                    parse_scalar_entry(p, field, value)
                } else if let Ok(relation) = model.find_relation(key) {
                    parse_relation_entry(p, model, relation.name.clone(), relation.kind, value)
                } else {
                    Err(Error::UnknownField {
                        model: model.name.clone(),
                        field: key.clone(),
                    })
                }
            }
        })?;
        children.push(child);
    }

    Ok(Filter::and(children))
}

fn parse_filter_list(parser: &mut Parser<'_>, model: &Model, json: &JsonValue) -> Result<Vec<Filter>> {
    match json {
        JsonValue::Array(items) => items
            .iter()
            .map(|item| parse_filter(parser, model, item))
            .collect(),
        JsonValue::Object(_) => Ok(vec![parse_filter(parser, model, json)?]),
        other => Err(parser.shape_error(format!(
            "expected a filter or array of filters, got {}",
            json_kind(other)
        ))),
    }
}

fn parse_scalar_entry(parser: &mut Parser<'_>, field: &Field, json: &JsonValue) -> Result<Filter> {
    // A bare value is shorthand for `equals`.
    if !json.is_object() || field.kind == ScalarKind::Json && !is_filter_object(json) {
        let value = coerce_field_value(parser, field, json)?;
        return Ok(Filter::Scalar(ScalarFilter {
            field: field.name.clone(),
            condition: ScalarCondition::Equals(value),
            mode: QueryMode::Default,
        }));
    }

    let (conditions, mode) = parse_condition_object(parser, field, json)?;
    let filters = conditions
        .into_iter()
        .map(|condition| {
            Filter::Scalar(ScalarFilter {
                field: field.name.clone(),
                condition,
                mode,
            })
        })
        .collect();
    Ok(Filter::and(filters))
}

/// JSON fields take whole objects as equality values; only objects that
/// consist solely of filter-operator keys are treated as conditions.
fn is_filter_object(json: &JsonValue) -> bool {
    const JSON_OPERATORS: &[&str] = &[
        "equals",
        "not",
        "path",
        "string_contains",
        "string_starts_with",
        "string_ends_with",
        "array_contains",
        "array_starts_with",
        "array_ends_with",
    ];

    match json.as_object() {
        Some(map) if !map.is_empty() => map.keys().all(|k| JSON_OPERATORS.contains(&k.as_str())),
        _ => false,
    }
}

fn parse_condition_object(
    parser: &mut Parser<'_>,
    field: &Field,
    json: &JsonValue,
) -> Result<(Vec<ScalarCondition>, QueryMode)> {
    let object = parser.expect_object(json)?;

    let mode = match object.get("mode").and_then(JsonValue::as_str) {
        Some("insensitive") => QueryMode::Insensitive,
        Some("default") | None => QueryMode::Default,
        Some(other) => {
            return Err(parser.shape_error(format!("unknown query mode `{other}`")));
        }
    };

    if mode == QueryMode::Insensitive && field.kind != ScalarKind::String {
        return Err(Error::UnsupportedFilter {
            kind: field.kind.name(),
            operator: "mode: insensitive".to_owned(),
            field: field.name.clone(),
        });
    }

    // JSON fields route through their own operator set so `path` composes
    // with the comparison in one condition.
    if field.kind == ScalarKind::Json {
        return Ok((vec![parse_json_condition(parser, field, object)?], mode));
    }

    let mut conditions = Vec::with_capacity(object.len());
    for (key, value) in object {
        if key == "mode" {
            continue;
        }
        let condition = parser.scoped(key, |p| parse_operator(p, field, key, value))?;
        conditions.push(condition);
    }

    if conditions.is_empty() {
        return Err(parser.shape_error(format!(
            "filter object for field `{}` has no operators",
            field.name
        )));
    }

    Ok((conditions, mode))
}

fn parse_operator(
    parser: &mut Parser<'_>,
    field: &Field,
    operator: &str,
    json: &JsonValue,
) -> Result<ScalarCondition> {
    let unsupported = |op: &str| Error::UnsupportedFilter {
        kind: field.kind.name(),
        operator: op.to_owned(),
        field: field.name.clone(),
    };

    if field.is_list() {
        return match operator {
            "equals" => Ok(ScalarCondition::Equals(coerce_field_value(parser, field, json)?)),
            "has" => Ok(ScalarCondition::Has(coerce_element(parser, field, json)?)),
            "hasEvery" => Ok(ScalarCondition::HasEvery(coerce_element_list(parser, field, json)?)),
            "hasSome" => Ok(ScalarCondition::HasSome(coerce_element_list(parser, field, json)?)),
            "isEmpty" => json
                .as_bool()
                .map(ScalarCondition::IsEmpty)
                .ok_or_else(|| parser.shape_error("`isEmpty` takes a boolean")),
            "not" => Ok(parse_not(parser, field, json)?),
            other => Err(unsupported(other)),
        };
    }

    match field.kind {
        ScalarKind::Vector => {
            return match operator {
                "l2" => parse_vector_condition(parser, field, VectorMetric::L2, json),
                "cosine" => parse_vector_condition(parser, field, VectorMetric::Cosine, json),
                other => Err(unsupported(other)),
            };
        }
        ScalarKind::Point => {
            return parse_geometry_condition(parser, field, operator, json).ok_or_else(|| unsupported(operator))?;
        }
        _ => {}
    }

    let ordered = field.kind.is_numeric()
        || field.kind.is_temporal()
        || matches!(field.kind, ScalarKind::String);
    let text = matches!(field.kind, ScalarKind::String);
    let equatable_in = !matches!(field.kind, ScalarKind::Boolean);

    match operator {
        "equals" => Ok(ScalarCondition::Equals(coerce_field_value(parser, field, json)?)),
        "not" => parse_not(parser, field, json),
        "in" if equatable_in => Ok(ScalarCondition::In(coerce_element_list(parser, field, json)?)),
        "notIn" if equatable_in => Ok(ScalarCondition::NotIn(coerce_element_list(parser, field, json)?)),
        "lt" if ordered => Ok(ScalarCondition::LessThan(coerce_element(parser, field, json)?)),
        "lte" if ordered => Ok(ScalarCondition::LessThanOrEquals(coerce_element(parser, field, json)?)),
        "gt" if ordered => Ok(ScalarCondition::GreaterThan(coerce_element(parser, field, json)?)),
        "gte" if ordered => Ok(ScalarCondition::GreaterThanOrEquals(coerce_element(
            parser, field, json,
        )?)),
        "contains" if text => Ok(ScalarCondition::Contains(coerce_element(parser, field, json)?)),
        "startsWith" if text => Ok(ScalarCondition::StartsWith(coerce_element(parser, field, json)?)),
        "endsWith" if text => Ok(ScalarCondition::EndsWith(coerce_element(parser, field, json)?)),
        other => Err(unsupported(other)),
    }
}

/// `not` takes either a bare value (`!=`) or a nested operator object whose
/// conditions are negated.
fn parse_not(parser: &mut Parser<'_>, field: &Field, json: &JsonValue) -> Result<ScalarCondition> {
    if !json.is_object() || field.kind == ScalarKind::Json && !is_filter_object(json) {
        let value = coerce_field_value(parser, field, json)?;
        return Ok(ScalarCondition::NotEquals(value));
    }

    let (conditions, _mode) = parse_condition_object(parser, field, json)?;
    let negated: Vec<_> = conditions.into_iter().map(ScalarCondition::negate).collect();

    match negated.len() {
        1 => Ok(negated.into_iter().next().unwrap()),
        // `not: { a, b }` negates the conjunction; without an `Or` condition
        // node we conservatively negate each conjunct.
        _ => Err(parser.shape_error("`not` accepts a single operator")),
    }
}

fn coerce_element_list(parser: &mut Parser<'_>, field: &Field, json: &JsonValue) -> Result<Vec<Value>> {
    let items = json
        .as_array()
        .ok_or_else(|| parser.shape_error(format!("expected an array, got {}", json_kind(json))))?;
    items
        .iter()
        .map(|item| coerce_element(parser, field, item))
        .collect()
}



fn parse_vector_condition(
    parser: &mut Parser<'_>,
    field: &Field,
    metric: VectorMetric,
    json: &JsonValue,
) -> Result<ScalarCondition> {
    let object = parser.expect_object(json)?;

    let reference = object
        .get("to")
        .ok_or_else(|| parser.shape_error("vector filter requires `to`"))
        .and_then(|to| coerce_vector(parser, field, to))?;

    let mut comparison = None;
    for (key, value) in object {
        let threshold = || {
            value
                .as_f64()
                .map(|f| Value::Float(f))
                .ok_or_else(|| parser.shape_error("distance threshold must be a number"))
        };
        let condition = match key.as_str() {
            "to" => continue,
            "lt" => ScalarCondition::LessThan(threshold()?),
            "lte" => ScalarCondition::LessThanOrEquals(threshold()?),
            "gt" => ScalarCondition::GreaterThan(threshold()?),
            "gte" => ScalarCondition::GreaterThanOrEquals(threshold()?),
            "equals" => ScalarCondition::Equals(threshold()?),
            other => {
                return Err(Error::UnsupportedFilter {
                    kind: field.kind.name(),
                    operator: other.to_owned(),
                    field: field.name.clone(),
                })
            }
        };
        if comparison.replace(condition).is_some() {
            return Err(parser.shape_error("vector filter accepts a single comparison"));
        }
    }

    let comparison = comparison
        .ok_or_else(|| parser.shape_error("vector filter requires a distance comparison"))?;

    Ok(ScalarCondition::Vector(VectorCondition {
        metric,
        reference,
        comparison: Box::new(comparison),
    }))
}

fn parse_geometry_condition(
    parser: &mut Parser<'_>,
    field: &Field,
    operator: &str,
    json: &JsonValue,
) -> Option<Result<ScalarCondition>> {
    let op = match operator {
        "equals" => GeometryOp::Equals,
        "intersects" => GeometryOp::Intersects,
        "contains" => GeometryOp::Contains,
        "within" => GeometryOp::Within,
        "crosses" => GeometryOp::Crosses,
        "overlaps" => GeometryOp::Overlaps,
        "touches" => GeometryOp::Touches,
        "covers" => GeometryOp::Covers,
        "dWithin" => {
            let result = (|| {
                let object = parser.expect_object(json)?;
                let of = object
                    .get("of")
                    .ok_or_else(|| parser.shape_error("`dWithin` requires `of`"))?;
                let distance = object
                    .get("distance")
                    .and_then(JsonValue::as_f64)
                    .ok_or_else(|| parser.shape_error("`dWithin` requires a numeric `distance`"))?;
                let value = coerce_element(parser, field, of)?;
                Ok(ScalarCondition::Geometry(GeometryCondition {
                    op: GeometryOp::DWithin { distance },
                    value,
                }))
            })();
            return Some(result);
        }
        _ => return None,
    };

    let result = coerce_element(parser, field, json).map(|value| {
        ScalarCondition::Geometry(GeometryCondition { op, value })
    });
    Some(result)
}

fn parse_json_condition(
    parser: &mut Parser<'_>,
    field: &Field,
    object: &serde_json::Map<String, JsonValue>,
) -> Result<ScalarCondition> {
    let path = match object.get("path") {
        Some(JsonValue::Array(segments)) => {
            let parsed = segments
                .iter()
                .map(|segment| match segment {
                    JsonValue::String(key) => Ok(JsonPathSegment::Key(key.clone())),
                    JsonValue::Number(n) => n
                        .as_u64()
                        .map(|i| JsonPathSegment::Index(i as usize))
                        .ok_or_else(|| parser.shape_error("JSON path indexes must be unsigned")),
                    _ => Err(parser.shape_error("JSON path segments are keys or indexes")),
                })
                .collect::<Result<Vec<_>>>()?;
            Some(parsed)
        }
        Some(other) => {
            return Err(parser.shape_error(format!(
                "`path` must be an array of keys/indexes, got {}",
                json_kind(other)
            )))
        }
        None => None,
    };

    let mut op = None;
    for (key, value) in object {
        let next = match key.as_str() {
            "path" => continue,
            "equals" => JsonOp::Equals(Value::Json(value.clone())),
            "not" => JsonOp::NotEquals(Value::Json(value.clone())),
            "string_contains" => JsonOp::StringContains(expect_string(parser, value)?),
            "string_starts_with" => JsonOp::StringStartsWith(expect_string(parser, value)?),
            "string_ends_with" => JsonOp::StringEndsWith(expect_string(parser, value)?),
            "array_contains" => JsonOp::ArrayContains(Value::Json(value.clone())),
            "array_starts_with" => JsonOp::ArrayStartsWith(Value::Json(value.clone())),
            "array_ends_with" => JsonOp::ArrayEndsWith(Value::Json(value.clone())),
            other => {
                return Err(Error::UnsupportedFilter {
                    kind: field.kind.name(),
                    operator: other.to_owned(),
                    field: field.name.clone(),
                })
            }
        };
        if op.replace(next).is_some() {
            return Err(parser.shape_error("JSON filter accepts a single comparison"));
        }
    }

    let op = op.ok_or_else(|| {
        parser.shape_error(format!("JSON filter on `{}` has no comparison", field.name))
    })?;

    Ok(ScalarCondition::Json(JsonCondition { path, op }))
}

fn expect_string(parser: &Parser<'_>, json: &JsonValue) -> Result<String> {
    json.as_str()
        .map(str::to_owned)
        .ok_or_else(|| parser.shape_error(format!("expected a string, got {}", json_kind(json))))
}

fn parse_relation_entry(
    parser: &mut Parser<'_>,
    model: &Model,
    relation_name: String,
    kind: RelationKind,
    json: &JsonValue,
) -> Result<Filter> {
    let relation = model.find_relation(&relation_name)?;
    let target = parser.schema.target_of(relation)?.clone();

    let to_many = !kind.is_to_one();
    let object = parser.expect_object(json)?;

    let known_wrappers: &[&str] = if to_many {
        &["some", "every", "none"]
    } else {
        &["is", "isNot"]
    };

    let uses_wrappers = !object.is_empty() && object.keys().all(|k| known_wrappers.contains(&k.as_str()));

    if !uses_wrappers {
        if to_many {
            return Err(parser.shape_error(format!(
                "to-many relation filter `{relation_name}` requires `some`, `every` or `none`",
            )));
        }
        // A bare filter object on a to-one relation means `is`.
        let nested = parse_filter(parser, &target, json)?;
        return Ok(Filter::Relation(RelationFilter {
            relation: relation_name,
            condition: RelationCondition::ToOneRelatedRecord,
            nested: Box::new(nested),
        }));
    }

    let mut filters = Vec::with_capacity(object.len());
    for (key, value) in object {
        // `is: null` / `isNot: null` test link existence.
        let condition = match (key.as_str(), value) {
            ("some", _) => RelationCondition::AtLeastOneRelatedRecord,
            ("every", _) => RelationCondition::EveryRelatedRecord,
            ("none", _) => RelationCondition::NoRelatedRecord,
            ("is", JsonValue::Null) => RelationCondition::NoRelatedRecord,
            ("isNot", JsonValue::Null) => RelationCondition::AtLeastOneRelatedRecord,
            ("is", _) => RelationCondition::ToOneRelatedRecord,
            ("isNot", _) => RelationCondition::NotToOneRelatedRecord,
            _ => unreachable!("wrapper keys are pre-checked"),
        };

        let nested = match value {
            JsonValue::Null => Filter::empty(),
            _ => parser.scoped(key, |p| parse_filter(p, &target, value))?,
        };

        filters.push(Filter::Relation(RelationFilter {
            relation: relation_name.clone(),
            condition,
            nested: Box::new(nested),
        }));
    }

    Ok(Filter::and(filters))
}

/// Parse a `whereUnique`-shaped object: resolve the unique criteria the keys
/// match, and parse any remaining keys as an ordinary filter conjunct.
pub(super) fn parse_where_unique(
    parser: &mut Parser<'_>,
    model: &Model,
    json: &JsonValue,
    operation: Operation,
) -> Result<(UniqueFilter, Option<Filter>)> {
    let object = parser.expect_object(json)?;

    let mut unique_fields: Vec<(String, Value)> = Vec::new();
    let mut rest = serde_json::Map::new();

    for (key, value) in object {
        match model.unique_criteria(key) {
            Some(criteria) if criteria.len() == 1 => {
                let field = model.find_field(&criteria[0])?;
                let coerced = parser.scoped(key, |p| coerce_field_value(p, field, value))?;
                unique_fields.push((field.name.clone(), coerced));
            }
            Some(criteria) => {
                // Compound criteria referenced by constraint name: the value
                // is an object with one entry per member field.
                let members = parser.scoped(key, |p| p.expect_object(value).map(Clone::clone))?;
                for name in &criteria {
                    let member = members.get(*name).ok_or_else(|| {
                        parser.shape_error(format!(
                            "compound key `{key}` requires field `{name}`"
                        ))
                    })?;
                    let field = model.find_field(name)?;
                    let coerced = parser.scoped(key, |p| coerce_field_value(p, field, member))?;
                    unique_fields.push((field.name.clone(), coerced));
                }
                if members.len() != criteria.len() {
                    return Err(parser.shape_error(format!(
                        "compound key `{key}` has extraneous fields"
                    )));
                }
            }
            None => {
                rest.insert(key.clone(), value.clone());
            }
        }
    }

    if unique_fields.is_empty() {
        return Err(Error::UniqueWhereRequired {
            model: model.name.clone(),
            operation: operation.name().to_owned(),
        });
    }

    let extra = if rest.is_empty() {
        None
    } else {
        let filter = parse_filter(parser, model, &JsonValue::Object(rest))?;
        (!filter.is_empty()).then_some(filter)
    };

    Ok((UniqueFilter { fields: unique_fields }, extra))
}

/// Parse a `having` tree: aggregate conditions plus scalar conditions on
/// grouped fields.
pub(super) fn parse_group_filter(
    parser: &mut Parser<'_>,
    model: &Model,
    by: &[String],
    json: &JsonValue,
) -> Result<GroupFilter> {
    let object = parser.expect_object(json)?;
    let mut children = Vec::with_capacity(object.len());

    for (key, value) in object {
        let child = parser.scoped(key, |p| match key.as_str() {
            "AND" => Ok(GroupFilter::And(parse_group_filter_list(p, model, by, value)?)),
            "OR" => Ok(GroupFilter::Or(parse_group_filter_list(p, model, by, value)?)),
            "NOT" => Ok(GroupFilter::Not(parse_group_filter_list(p, model, by, value)?)),
            "_count" => parse_aggregate_filter(p, model, AggregateFunction::Count, value),
            "_sum" => parse_aggregate_filter(p, model, AggregateFunction::Sum, value),
            "_avg" => parse_aggregate_filter(p, model, AggregateFunction::Avg, value),
            "_min" => parse_aggregate_filter(p, model, AggregateFunction::Min, value),
            "_max" => parse_aggregate_filter(p, model, AggregateFunction::Max, value),
            _ => {
                let field = model.find_field(key)?;
                if !by.iter().any(|b| b == key) {
                    return Err(p.shape_error(format!(
                        "`having` field `{key}` must appear in `by`"
                    )));
                }
                match parse_scalar_entry(p, field, value)? {
                    Filter::Scalar(sf) => Ok(GroupFilter::Scalar(sf)),
                    Filter::And(filters) => Ok(GroupFilter::And(
                        filters
                            .into_iter()
                            .map(|f| match f {
                                Filter::Scalar(sf) => Ok(GroupFilter::Scalar(sf)),
                                _ => Err(p.shape_error("`having` supports scalar conditions only")),
                            })
                            .collect::<Result<_>>()?,
                    )),
                    _ => Err(p.shape_error("`having` supports scalar conditions only")),
                }
            }
        })?;
        children.push(child);
    }

    Ok(match children.len() {
        1 => children.into_iter().next().unwrap(),
        _ => GroupFilter::And(children),
    })
}

fn parse_group_filter_list(
    parser: &mut Parser<'_>,
    model: &Model,
    by: &[String],
    json: &JsonValue,
) -> Result<Vec<GroupFilter>> {
    match json {
        JsonValue::Array(items) => items
            .iter()
            .map(|item| parse_group_filter(parser, model, by, item))
            .collect(),
        JsonValue::Object(_) => Ok(vec![parse_group_filter(parser, model, by, json)?]),
        other => Err(parser.shape_error(format!(
            "expected a filter or array of filters, got {}",
            json_kind(other)
        ))),
    }
}

fn parse_aggregate_filter(
    parser: &mut Parser<'_>,
    model: &Model,
    func: AggregateFunction,
    json: &JsonValue,
) -> Result<GroupFilter> {
    let object = parser.expect_object(json)?;
    let mut filters = Vec::with_capacity(object.len());

    for (key, value) in object {
        let field = if key == "_all" {
            if func != AggregateFunction::Count {
                return Err(parser.shape_error("`_all` is only valid under `_count`"));
            }
            None
        } else {
            Some(model.find_field(key)?.name.clone())
        };

        let conditions = parser.scoped(key, |p| parse_numeric_conditions(p, value))?;

        for condition in conditions {
            filters.push(GroupFilter::Aggregate(AggregateFilter {
                func,
                field: field.clone(),
                condition,
            }));
        }
    }

    Ok(match filters.len() {
        1 => filters.into_iter().next().unwrap(),
        _ => GroupFilter::And(filters),
    })
}

/// Aggregate comparisons are numeric regardless of the aggregated field's
/// type; integer thresholds stay integers.
fn parse_numeric_conditions(parser: &mut Parser<'_>, json: &JsonValue) -> Result<Vec<ScalarCondition>> {
    let object = parser.expect_object(json)?;

    let number = |p: &Parser<'_>, value: &JsonValue| -> Result<Value> {
        match value {
            JsonValue::Number(n) if n.is_i64() => Ok(Value::Int(n.as_i64().unwrap())),
            JsonValue::Number(n) => Ok(Value::Float(n.as_f64().unwrap_or_default())),
            other => Err(p.shape_error(format!(
                "aggregate comparison takes a number, got {}",
                json_kind(other)
            ))),
        }
    };
    let numbers = |p: &Parser<'_>, value: &JsonValue| -> Result<Vec<Value>> {
        value
            .as_array()
            .ok_or_else(|| p.shape_error("expected an array of numbers"))?
            .iter()
            .map(|item| number(p, item))
            .collect()
    };

    let mut conditions = Vec::with_capacity(object.len());
    for (key, value) in object {
        let condition = parser.scoped(key, |p| match key.as_str() {
            "equals" => Ok(ScalarCondition::Equals(number(p, value)?)),
            "not" => Ok(ScalarCondition::NotEquals(number(p, value)?)),
            "in" => Ok(ScalarCondition::In(numbers(p, value)?)),
            "notIn" => Ok(ScalarCondition::NotIn(numbers(p, value)?)),
            "lt" => Ok(ScalarCondition::LessThan(number(p, value)?)),
            "lte" => Ok(ScalarCondition::LessThanOrEquals(number(p, value)?)),
            "gt" => Ok(ScalarCondition::GreaterThan(number(p, value)?)),
            "gte" => Ok(ScalarCondition::GreaterThanOrEquals(number(p, value)?)),
            other => Err(p.shape_error(format!("unknown aggregate comparison `{other}`"))),
        })?;
        conditions.push(condition);
    }

    if conditions.is_empty() {
        return Err(parser.shape_error("aggregate comparison object has no operators"));
    }

    Ok(conditions)
}
