use super::{filter, json_kind, order, Parser};
use crate::arguments::QueryArguments;
use crate::error::{Error, Result};
use crate::schema::Model;
use crate::selection::{AggregationSelection, FieldSelection, RelationSelection, SelectedField};
use serde_json::Value as JsonValue;

/// Resolve the projection of one query level from optional `select` and
/// `include` payloads. `select` replaces the scalar projection; `include`
/// appends relations to the default one. Passing both is a shape error.
pub(super) fn parse_projection(
    parser: &mut Parser<'_>,
    model: &Model,
    select: Option<&JsonValue>,
    include: Option<&JsonValue>,
) -> Result<FieldSelection> {
    match (select, include) {
        (Some(_), Some(_)) => {
            Err(parser.shape_error("`select` and `include` cannot be used together"))
        }
        (Some(select), None) => parser.scoped("select", |p| parse_select(p, model, select)),
        (None, Some(include)) => {
            let mut selection = FieldSelection::default_scalars(model);
            let extra = parser.scoped("include", |p| parse_include(p, model, include))?;
            selection.entries.extend(extra);
            Ok(selection)
        }
        (None, None) => Ok(FieldSelection::default_scalars(model)),
    }
}

fn parse_select(parser: &mut Parser<'_>, model: &Model, json: &JsonValue) -> Result<FieldSelection> {
    let object = parser.expect_object(json)?;
    let mut entries = Vec::with_capacity(object.len());

    for (key, value) in object {
        if key == "_count" {
            let counts = parser.scoped(key, |p| parse_count_selection(p, model, value))?;
            entries.extend(counts);
            continue;
        }

        if let Ok(field) = model.find_field(key) {
            match value {
                JsonValue::Bool(true) => entries.push(SelectedField::Scalar(field.name.clone())),
                JsonValue::Bool(false) => {}
                other => {
                    return Err(parser.shape_error(format!(
                        "scalar selection `{key}` must be a boolean, got {}",
                        json_kind(other)
                    )))
                }
            }
            continue;
        }

        if model.relations.contains_key(key) {
            if let Some(entry) = parse_relation_selection(parser, model, key, value)? {
                entries.push(SelectedField::Relation(entry));
            }
            continue;
        }

        return Err(Error::UnknownField {
            model: model.name.clone(),
            field: key.clone(),
        });
    }

    Ok(FieldSelection { entries })
}

fn parse_include(
    parser: &mut Parser<'_>,
    model: &Model,
    json: &JsonValue,
) -> Result<Vec<SelectedField>> {
    let object = parser.expect_object(json)?;
    let mut entries = Vec::with_capacity(object.len());

    for (key, value) in object {
        if key == "_count" {
            let counts = parser.scoped(key, |p| parse_count_selection(p, model, value))?;
            entries.extend(counts);
            continue;
        }

        if !model.relations.contains_key(key) {
            return Err(Error::UnknownRelation {
                model: model.name.clone(),
                relation: key.clone(),
            });
        }

        if let Some(entry) = parse_relation_selection(parser, model, key, value)? {
            entries.push(SelectedField::Relation(entry));
        }
    }

    Ok(entries)
}

/// `relation: true` selects the default subtree; an object carries nested
/// arguments and projection. `false` drops the relation.
fn parse_relation_selection(
    parser: &mut Parser<'_>,
    model: &Model,
    relation_name: &str,
    json: &JsonValue,
) -> Result<Option<RelationSelection>> {
    let relation = model.find_relation(relation_name)?;
    let target = parser.schema.target_of(relation)?.clone();

    match json {
        JsonValue::Bool(true) => Ok(Some(RelationSelection {
            relation: relation_name.to_owned(),
            args: QueryArguments::default(),
            nested: FieldSelection::default_scalars(&target),
        })),
        JsonValue::Bool(false) => Ok(None),
        JsonValue::Object(object) => parser.scoped(relation_name, |p| {
            const ALLOWED: &[&str] = &[
                "where", "orderBy", "take", "skip", "cursor", "distinct", "select", "include",
            ];
            for key in object.keys() {
                if !ALLOWED.contains(&key.as_str()) {
                    return Err(p.shape_error(format!("unknown key `{key}` in relation selection")));
                }
            }

            let mut args = QueryArguments::default();

            if let Some(where_json) = object.get("where") {
                let parsed = p.scoped("where", |p| filter::parse_filter(p, &target, where_json))?;
                args.filter = (!parsed.is_empty()).then_some(parsed);
            }
            if let Some(order_json) = object.get("orderBy") {
                args.order_by =
                    p.scoped("orderBy", |p| order::parse_order_by(p, &target, order_json, false))?;
            }
            if let Some(take) = object.get("take") {
                args.take = Some(p.scoped("take", |p| super::parse_int(p, take))?);
            }
            if let Some(skip) = object.get("skip") {
                args.skip = Some(p.scoped("skip", |p| super::parse_int(p, skip))?);
            }
            if let Some(cursor) = object.get("cursor") {
                let (unique, extra) = p.scoped("cursor", |p| {
                    filter::parse_where_unique(p, &target, cursor, crate::operation::Operation::FindMany)
                })?;
                if extra.is_some() {
                    return Err(p.shape_error("`cursor` accepts only unique criteria fields"));
                }
                args.cursor = Some(unique);
            }
            if let Some(distinct) = object.get("distinct") {
                args.distinct =
                    p.scoped("distinct", |p| super::parse_distinct(p, &target, distinct))?;
            }

            let nested =
                parse_projection(p, &target, object.get("select"), object.get("include"))?;

            Ok(Some(RelationSelection {
                relation: relation_name.to_owned(),
                args,
                nested,
            }))
        }),
        other => Err(parser.shape_error(format!(
            "relation selection `{relation_name}` must be a boolean or object, got {}",
            json_kind(other)
        ))),
    }
}

/// `_count: true` counts every to-many relation; the object form names them:
/// `_count: { select: { posts: true | { where } } }`.
fn parse_count_selection(
    parser: &mut Parser<'_>,
    model: &Model,
    json: &JsonValue,
) -> Result<Vec<SelectedField>> {
    match json {
        JsonValue::Bool(true) => Ok(model
            .relations
            .values()
            .filter(|r| !r.kind.is_to_one())
            .map(|r| SelectedField::RelationCount {
                relation: r.name.clone(),
                filter: None,
            })
            .collect()),
        JsonValue::Object(object) => {
            let select = object
                .get("select")
                .ok_or_else(|| parser.shape_error("`_count` requires `select`"))?;
            if object.len() > 1 {
                return Err(parser.shape_error("`_count` accepts only `select`"));
            }

            let select = parser.expect_object(select)?;
            let mut entries = Vec::with_capacity(select.len());

            for (key, value) in select {
                let relation = model.find_relation(key)?;
                let target = parser.schema.target_of(relation)?.clone();

                let filter = match value {
                    JsonValue::Bool(true) => None,
                    JsonValue::Object(inner) => match inner.get("where") {
                        Some(where_json) if inner.len() == 1 => {
                            let parsed = parser.scoped(key, |p| {
                                p.scoped("where", |p| filter::parse_filter(p, &target, where_json))
                            })?;
                            (!parsed.is_empty()).then_some(parsed)
                        }
                        _ => {
                            return Err(parser.shape_error(format!(
                                "`_count.select.{key}` accepts only `where`"
                            )))
                        }
                    },
                    other => {
                        return Err(parser.shape_error(format!(
                            "`_count.select.{key}` must be `true` or an object, got {}",
                            json_kind(other)
                        )))
                    }
                };

                entries.push(SelectedField::RelationCount {
                    relation: key.clone(),
                    filter,
                });
            }

            Ok(entries)
        }
        other => Err(parser.shape_error(format!(
            "`_count` must be `true` or an object, got {}",
            json_kind(other)
        ))),
    }
}

/// Parse the `_count`/`_sum`/`_avg`/`_min`/`_max` selections of `aggregate`
/// and `groupBy` payloads.
pub(super) fn parse_aggregations(
    parser: &mut Parser<'_>,
    model: &Model,
    object: &serde_json::Map<String, JsonValue>,
) -> Result<Vec<AggregationSelection>> {
    let mut selections = Vec::new();

    if let Some(count) = object.get("_count") {
        let selection = parser.scoped("_count", |p| match count {
            JsonValue::Bool(true) => Ok(AggregationSelection::Count {
                all: true,
                fields: Vec::new(),
            }),
            JsonValue::Object(map) => {
                let mut all = false;
                let mut fields = Vec::new();
                for (key, value) in map {
                    if value != &JsonValue::Bool(true) {
                        return Err(p.shape_error(format!("`_count.{key}` must be `true`")));
                    }
                    if key == "_all" {
                        all = true;
                    } else {
                        fields.push(model.find_field(key)?.name.clone());
                    }
                }
                Ok(AggregationSelection::Count { all, fields })
            }
            other => Err(p.shape_error(format!(
                "`_count` must be `true` or an object, got {}",
                json_kind(other)
            ))),
        })?;
        selections.push(selection);
    }

    for (key, make) in [
        ("_sum", AggregationSelection::Sum as fn(Vec<String>) -> _),
        ("_avg", AggregationSelection::Average),
        ("_min", AggregationSelection::Min),
        ("_max", AggregationSelection::Max),
    ] {
        if let Some(value) = object.get(key) {
            let fields = parser.scoped(key, |p| {
                let map = p.expect_object(value)?;
                let mut fields = Vec::with_capacity(map.len());
                for (field_key, field_value) in map {
                    if field_value != &JsonValue::Bool(true) {
                        return Err(p.shape_error(format!("`{key}.{field_key}` must be `true`")));
                    }
                    let field = model.find_field(field_key)?;
                    if key != "_min" && key != "_max" && !field.kind.is_numeric() {
                        return Err(p.shape_error(format!(
                            "`{key}` requires a numeric field, `{field_key}` is {}",
                            field.kind.name()
                        )));
                    }
                    fields.push(field.name.clone());
                }
                Ok(fields)
            })?;
            selections.push(make(fields));
        }
    }

    Ok(selections)
}
