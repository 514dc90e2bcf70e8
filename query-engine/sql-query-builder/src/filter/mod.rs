use crate::context::Context;
use crate::model_extensions::column_ref;
use crate::select;
use model_value::Value;
use query_structure::{
    AggregateFunction, Error, Field, Filter, GroupFilter, JsonCondition, JsonOp, Model, QueryMode,
    Result, ScalarCondition, ScalarFilter, ScalarKind,
};
use query_template::Sql;
use sql_dialect::{Capability, ListPredicate, TextMatch};

/// Lower a filter tree into a predicate fragment. Empty conjunctions reduce
/// to an empty fragment; callers skip the WHERE clause entirely then.
pub(crate) fn build_filter(
    filter: &Filter,
    model: &Model,
    alias: &str,
    ctx: &Context<'_>,
) -> Result<Sql> {
    Ok(match build_node(filter, model, alias, ctx)? {
        Some((sql, _)) => sql,
        None => Sql::empty(),
    })
}

/// Returns the rendered node plus whether it needs parentheses when embedded
/// in a surrounding conjunction.
fn build_node(
    filter: &Filter,
    model: &Model,
    alias: &str,
    ctx: &Context<'_>,
) -> Result<Option<(Sql, bool)>> {
    match filter {
        Filter::And(children) => build_composite(children, " AND ", model, alias, ctx),
        Filter::Or(children) => build_composite(children, " OR ", model, alias, ctx),
        Filter::Not(children) => {
            match build_composite(children, " AND ", model, alias, ctx)? {
                Some((inner, _)) => Ok(Some((
                    Sql::raw("NOT (").append(inner).append_raw(")"),
                    false,
                ))),
                None => Ok(None),
            }
        }
        Filter::Scalar(scalar) => {
            let sql = build_scalar_filter(scalar, model, alias, ctx)?;
            Ok(Some((sql, false)))
        }
        Filter::Relation(relation) => {
            let sql = select::relation_filter_predicate(model, relation, alias, ctx)?;
            Ok(Some((sql, false)))
        }
    }
}

fn build_composite(
    children: &[Filter],
    separator: &str,
    model: &Model,
    alias: &str,
    ctx: &Context<'_>,
) -> Result<Option<(Sql, bool)>> {
    let mut rendered = Vec::with_capacity(children.len());
    for child in children {
        if let Some((sql, composite)) = build_node(child, model, alias, ctx)? {
            rendered.push(if composite {
                Sql::raw("(").append(sql).append_raw(")")
            } else {
                sql
            });
        }
    }

    match rendered.len() {
        0 => Ok(None),
        1 => Ok(Some((rendered.into_iter().next().unwrap(), false))),
        _ => Ok(Some((Sql::join(rendered, separator), true))),
    }
}

fn build_scalar_filter(
    scalar: &ScalarFilter,
    model: &Model,
    alias: &str,
    ctx: &Context<'_>,
) -> Result<Sql> {
    let field = model.find_field(&scalar.field)?;
    let column = column_ref(ctx, alias, field.db_name());
    build_condition(&scalar.condition, field, column, scalar.mode, ctx)
}

fn build_condition(
    condition: &ScalarCondition,
    field: &Field,
    column: Sql,
    mode: QueryMode,
    ctx: &Context<'_>,
) -> Result<Sql> {
    let dialect = ctx.dialect;
    let shape = |value: &Value| dialect.transform_to_database(value.clone(), field);
    let insensitive = mode == QueryMode::Insensitive;

    let sql = match condition {
        ScalarCondition::Equals(Value::Null) => column.append_raw(" IS NULL"),
        ScalarCondition::NotEquals(Value::Null) => column.append_raw(" IS NOT NULL"),
        ScalarCondition::Equals(value) if insensitive => {
            lowered(column).append_raw(" = ").append(lowered_param(shape(value)))
        }
        ScalarCondition::NotEquals(value) if insensitive => {
            lowered(column).append_raw(" <> ").append(lowered_param(shape(value)))
        }
        ScalarCondition::Equals(value) => column.append_raw(" = ").append_parameter(shape(value)),
        ScalarCondition::NotEquals(value) => {
            column.append_raw(" <> ").append_parameter(shape(value))
        }
        ScalarCondition::In(values) if values.is_empty() => Sql::raw("1=0"),
        ScalarCondition::NotIn(values) if values.is_empty() => Sql::raw("1=1"),
        ScalarCondition::In(values) => in_list(column, values, false, insensitive, field, ctx),
        ScalarCondition::NotIn(values) => in_list(column, values, true, insensitive, field, ctx),
        ScalarCondition::LessThan(value) => column.append_raw(" < ").append_parameter(shape(value)),
        ScalarCondition::LessThanOrEquals(value) => {
            column.append_raw(" <= ").append_parameter(shape(value))
        }
        ScalarCondition::GreaterThan(value) => {
            column.append_raw(" > ").append_parameter(shape(value))
        }
        ScalarCondition::GreaterThanOrEquals(value) => {
            column.append_raw(" >= ").append_parameter(shape(value))
        }
        ScalarCondition::Contains(value) => {
            dialect.text_match(column, TextMatch::Contains, shape(value), insensitive, false)
        }
        ScalarCondition::NotContains(value) => {
            dialect.text_match(column, TextMatch::Contains, shape(value), insensitive, true)
        }
        ScalarCondition::StartsWith(value) => {
            dialect.text_match(column, TextMatch::StartsWith, shape(value), insensitive, false)
        }
        ScalarCondition::NotStartsWith(value) => {
            dialect.text_match(column, TextMatch::StartsWith, shape(value), insensitive, true)
        }
        ScalarCondition::EndsWith(value) => {
            dialect.text_match(column, TextMatch::EndsWith, shape(value), insensitive, false)
        }
        ScalarCondition::NotEndsWith(value) => {
            dialect.text_match(column, TextMatch::EndsWith, shape(value), insensitive, true)
        }
        ScalarCondition::Has(value) => {
            dialect.list_predicate(column, ListPredicate::Has(shape(value)), field)?
        }
        ScalarCondition::HasEvery(values) => dialect.list_predicate(
            column,
            ListPredicate::HasEvery(values.iter().map(&shape).collect()),
            field,
        )?,
        ScalarCondition::HasSome(values) => dialect.list_predicate(
            column,
            ListPredicate::HasSome(values.iter().map(&shape).collect()),
            field,
        )?,
        ScalarCondition::IsEmpty(empty) => {
            dialect.list_predicate(column, ListPredicate::IsEmpty(*empty), field)?
        }
        ScalarCondition::Json(json) => build_json_condition(json, column, ctx)?,
        ScalarCondition::Vector(vector) => {
            if !dialect.supports(Capability::VectorOps) {
                return Err(Error::FeatureNotSupported {
                    feature: format!("vector search on {}", dialect.family().as_str()),
                });
            }
            let distance =
                dialect.vector_distance(column, vector.metric, vector.reference.clone())?;
            build_condition(&vector.comparison, field, distance, QueryMode::Default, ctx)?
        }
        ScalarCondition::Geometry(geometry) => {
            if !dialect.supports(Capability::GeoOps) {
                return Err(Error::FeatureNotSupported {
                    feature: format!("geospatial filters on {}", dialect.family().as_str()),
                });
            }
            dialect.geometry_predicate(column, &geometry.op, shape(&geometry.value))?
        }
        ScalarCondition::Not(inner) => Sql::raw("NOT (")
            .append(build_condition(inner, field, column, mode, ctx)?)
            .append_raw(")"),
    };

    Ok(sql)
}

fn lowered(expr: Sql) -> Sql {
    Sql::raw("LOWER(").append(expr).append_raw(")")
}

fn lowered_param(value: Value) -> Sql {
    Sql::raw("LOWER(").append_parameter(value).append_raw(")")
}

fn in_list(
    column: Sql,
    values: &[Value],
    negated: bool,
    insensitive: bool,
    field: &Field,
    ctx: &Context<'_>,
) -> Sql {
    let shape = |value: &Value| ctx.dialect.transform_to_database(value.clone(), field);
    let keyword = if negated { " NOT IN (" } else { " IN (" };

    let (target, params): (Sql, Vec<Sql>) = if insensitive {
        (
            lowered(column),
            values.iter().map(|v| lowered_param(shape(v))).collect(),
        )
    } else {
        (
            column,
            values.iter().map(|v| Sql::parameter(shape(v))).collect(),
        )
    };

    target
        .append_raw(keyword)
        .append(Sql::join(params, ", "))
        .append_raw(")")
}

fn build_json_condition(json: &JsonCondition, column: Sql, ctx: &Context<'_>) -> Result<Sql> {
    let dialect = ctx.dialect;

    let as_json = |column: Sql| match &json.path {
        Some(path) => dialect.json_extract(column, path, false),
        None => column,
    };
    let as_text = |column: Sql| match &json.path {
        Some(path) => dialect.json_extract(column, path, true),
        None => column,
    };

    let sql = match &json.op {
        JsonOp::Equals(value) => as_json(column)
            .append_raw(" = ")
            .append(dialect.json_param(value.clone())),
        JsonOp::NotEquals(value) => as_json(column)
            .append_raw(" <> ")
            .append(dialect.json_param(value.clone())),
        JsonOp::StringContains(needle) => dialect.text_match(
            as_text(column),
            TextMatch::Contains,
            Value::String(needle.clone()),
            false,
            false,
        ),
        JsonOp::StringStartsWith(needle) => dialect.text_match(
            as_text(column),
            TextMatch::StartsWith,
            Value::String(needle.clone()),
            false,
            false,
        ),
        JsonOp::StringEndsWith(needle) => dialect.text_match(
            as_text(column),
            TextMatch::EndsWith,
            Value::String(needle.clone()),
            false,
            false,
        ),
        JsonOp::ArrayContains(value) => {
            dialect.json_array_contains(as_json(column), value.clone(), false)
        }
        JsonOp::ArrayStartsWith(value) => dialect
            .json_array_edge(as_json(column), false)
            .append_raw(" = ")
            .append(dialect.json_param(value.clone())),
        JsonOp::ArrayEndsWith(value) => dialect
            .json_array_edge(as_json(column), true)
            .append_raw(" = ")
            .append(dialect.json_param(value.clone())),
    };

    Ok(sql)
}

/// Lower a `having` tree. Aggregate references render as the aggregate
/// expression itself, so `HAVING COUNT(*) > $1`.
pub(crate) fn build_group_filter(
    filter: &GroupFilter,
    model: &Model,
    alias: &str,
    ctx: &Context<'_>,
) -> Result<Sql> {
    match filter {
        GroupFilter::And(children) => join_group(children, " AND ", model, alias, ctx),
        GroupFilter::Or(children) => join_group(children, " OR ", model, alias, ctx),
        GroupFilter::Not(children) => Ok(Sql::raw("NOT (")
            .append(join_group(children, " AND ", model, alias, ctx)?)
            .append_raw(")")),
        GroupFilter::Scalar(scalar) => build_scalar_filter(scalar, model, alias, ctx),
        GroupFilter::Aggregate(aggregate) => {
            let expr = aggregate_expr(aggregate.func, aggregate.field.as_deref(), model, alias, ctx)?;
            let field = match &aggregate.field {
                Some(name) => model.find_field(name)?.clone(),
                None => Field::new("_all", ScalarKind::Int),
            };
            build_condition(&aggregate.condition, &field, expr, QueryMode::Default, ctx)
        }
    }
}

fn join_group(
    children: &[GroupFilter],
    separator: &str,
    model: &Model,
    alias: &str,
    ctx: &Context<'_>,
) -> Result<Sql> {
    let rendered = children
        .iter()
        .map(|child| build_group_filter(child, model, alias, ctx))
        .collect::<Result<Vec<_>>>()?;

    Ok(match rendered.len() {
        1 => rendered.into_iter().next().unwrap(),
        _ => Sql::join(rendered, separator),
    })
}

/// `COUNT(*)`, `SUM("t0"."price")`, …
pub(crate) fn aggregate_expr(
    func: AggregateFunction,
    field: Option<&str>,
    model: &Model,
    alias: &str,
    ctx: &Context<'_>,
) -> Result<Sql> {
    Ok(match (func, field) {
        (AggregateFunction::Count, _) => Sql::raw("COUNT(*)"),
        (_, Some(name)) => {
            let field = model.find_field(name)?;
            Sql::raw(format!("{}(", func.as_sql()))
                .append(column_ref(ctx, alias, field.db_name()))
                .append_raw(")")
        }
        (_, None) => {
            return Err(Error::internal(format!(
                "{} aggregate requires a field",
                func.as_sql()
            )))
        }
    })
}
