use crate::context::Context;
use crate::cursor_condition::build_cursor_condition;
use crate::filter::{aggregate_expr, build_filter, build_group_filter};
use crate::limit::build_limit_offset;
use crate::model_extensions::{column_ref, table_ref};
use crate::ordering::build_order_by;
use crate::{nested_aggregations, select};
use itertools::Itertools;
use query_structure::{
    AggregationSelection, Error, FieldSelection, Model, ParsedPayload, QueryArguments, Result,
    SelectedField, UniqueFilter,
};
use query_template::Sql;
use sql_dialect::Capability;

/// Assemble one SELECT level: projection (with relation subqueries), FROM,
/// WHERE (link + filter + cursor), distinct, ordering and pagination.
/// Returns the statement plus its output column names, which relation
/// aggregation uses as JSON keys.
///
/// Projection renders before the filter so parameter order follows the
/// SELECT-then-WHERE traversal.
pub(crate) fn build_select_core(
    model: &Model,
    alias: &str,
    args: &QueryArguments,
    selection: &FieldSelection,
    link_condition: Option<Sql>,
    ctx: &Context<'_>,
) -> Result<(Sql, Vec<String>)> {
    let distinct_native =
        !args.distinct.is_empty() && ctx.dialect.supports(Capability::DistinctOn);
    let distinct_emulated = !args.distinct.is_empty() && !distinct_native;

    if distinct_emulated
        && selection
            .entries
            .iter()
            .any(|entry| !matches!(entry, SelectedField::Scalar(_)))
    {
        return Err(Error::FeatureNotSupported {
            feature: "distinct combined with relation selections on this database".to_owned(),
        });
    }

    if selection.is_empty() {
        return Err(Error::shape("selection must name at least one field", &["select"]));
    }

    // Projection first: parameter order follows SELECT-then-WHERE.
    let mut columns = Vec::with_capacity(selection.entries.len());
    let mut keys = Vec::with_capacity(selection.entries.len());

    for entry in &selection.entries {
        match entry {
            SelectedField::Scalar(name) => {
                let field = model.find_field(name)?;
                let mut expr = column_ref(ctx, alias, field.db_name());
                let mut needs_alias = field.db_name() != name;

                if distinct_emulated && !args.distinct.contains(name) {
                    expr = Sql::raw("MIN(").append(expr).append_raw(")");
                    needs_alias = true;
                }

                if needs_alias {
                    expr = expr.append_raw(&format!(" AS {}", ctx.dialect.quote_ident(name)));
                }

                columns.push(expr);
                keys.push(name.clone());
            }
            SelectedField::Relation(rs) => {
                let sub = select::relation_selection_subquery(model, rs, alias, ctx)?;
                columns.push(sub.append_raw(&format!(" AS {}", ctx.dialect.quote_ident(&rs.relation))));
                keys.push(rs.relation.clone());
            }
            SelectedField::RelationCount { relation, filter } => {
                let sub = nested_aggregations::relation_count_subquery(
                    model,
                    relation,
                    filter.as_ref(),
                    alias,
                    ctx,
                )?;
                let name = format!("_count_{relation}");
                columns.push(sub.append_raw(&format!(" AS {}", ctx.dialect.quote_ident(&name))));
                keys.push(name);
            }
        }
    }

    let mut sql = Sql::raw("SELECT ");

    if distinct_native {
        let distinct_cols = args
            .distinct
            .iter()
            .map(|name| {
                model
                    .find_field(name)
                    .map(|field| column_ref(ctx, alias, field.db_name()))
            })
            .collect::<Result<Vec<_>>>()?;
        sql = sql
            .append_raw("DISTINCT ON (")
            .append(Sql::join(distinct_cols, ", "))
            .append_raw(") ");
    }

    sql = sql
        .append(Sql::join(columns, ", "))
        .append_raw(" FROM ")
        .append(table_ref(ctx, model, alias));

    // WHERE: link condition, then the user filter, then the cursor seek.
    let mut conditions = Vec::new();
    if let Some(link) = link_condition {
        conditions.push(link);
    }
    if let Some(filter) = &args.filter {
        let built = build_filter(filter, model, alias, ctx)?;
        if !built.is_empty() {
            conditions.push(built);
        }
    }
    if let Some(cursor) = &args.cursor {
        conditions.push(build_cursor_condition(cursor, &args.order_by, model, alias, ctx)?);
    }

    if !conditions.is_empty() {
        sql = sql.append_raw(" WHERE ").append(Sql::join(conditions, " AND "));
    }

    if distinct_emulated {
        let group_cols = args
            .distinct
            .iter()
            .map(|name| {
                model
                    .find_field(name)
                    .map(|field| column_ref(ctx, alias, field.db_name()))
            })
            .collect::<Result<Vec<_>>>()?;
        sql = sql.append_raw(" GROUP BY ").append(Sql::join(group_cols, ", "));
    }

    // DISTINCT ON requires the distinct columns leftmost in ORDER BY.
    let mut order_sql = Sql::empty();
    if distinct_native {
        let leading = args
            .distinct
            .iter()
            .map(|name| {
                model
                    .find_field(name)
                    .map(|field| column_ref(ctx, alias, field.db_name()).append_raw(" ASC"))
            })
            .collect::<Result<Vec<_>>>()?;
        order_sql = Sql::join(leading, ", ");
    }
    let user_order = build_order_by(&args.order_by, model, alias, ctx)?;
    if !user_order.is_empty() {
        order_sql = if order_sql.is_empty() {
            user_order
        } else {
            order_sql.append_raw(", ").append(user_order)
        };
    }
    if !order_sql.is_empty() {
        sql = sql.append_raw(" ORDER BY ").append(order_sql);
    }

    sql = sql.append(build_limit_offset(args.take, args.skip)?);

    Ok((sql, keys))
}

/// The conjunction pinning a row to a unique criteria.
pub(crate) fn unique_condition(
    unique: &UniqueFilter,
    model: &Model,
    alias: &str,
    ctx: &Context<'_>,
) -> Result<Sql> {
    let conditions = unique
        .fields
        .iter()
        .map(|(name, value)| {
            let field = model.find_field(name)?;
            let shaped = ctx.dialect.transform_to_database(value.clone(), field);
            Ok(column_ref(ctx, alias, field.db_name())
                .append_raw(" = ")
                .append_parameter(shaped))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Sql::join(conditions, " AND "))
}

/// `findMany`/`findFirst`/`findUnique`: one SELECT, single-record reads get
/// `LIMIT 1`.
pub(crate) fn get_records(
    model: &Model,
    parsed: &ParsedPayload,
    single_record: bool,
    ctx: &Context<'_>,
) -> Result<Sql> {
    let alias = ctx.next_table_alias();

    let unique = match &parsed.unique_filter {
        Some(unique) => Some(unique_condition(unique, model, &alias, ctx)?),
        None => None,
    };

    let mut args = parsed.args.clone();
    if single_record {
        args.take = Some(1);
    }

    let (sql, _) = build_select_core(model, &alias, &args, &parsed.selection, unique, ctx)?;
    Ok(sql)
}

/// `exist`: `SELECT EXISTS ( SELECT 1 FROM … WHERE … LIMIT 1 )`. Never
/// projects fields, never orders, never paginates.
pub(crate) fn exist(model: &Model, parsed: &ParsedPayload, ctx: &Context<'_>) -> Result<Sql> {
    let alias = ctx.next_table_alias();

    let mut inner = Sql::raw("SELECT 1 FROM ").append(table_ref(ctx, model, &alias));
    if let Some(filter) = &parsed.args.filter {
        let built = build_filter(filter, model, &alias, ctx)?;
        if !built.is_empty() {
            inner = inner.append_raw(" WHERE ").append(built);
        }
    }
    inner = inner.append_raw(" LIMIT 1");

    Ok(Sql::raw("SELECT EXISTS ( ").append(inner).append_raw(" )"))
}

/// `count`: a plain COUNT(*), wrapped in a derived table when pagination
/// bounds the counted window.
pub(crate) fn count(model: &Model, parsed: &ParsedPayload, ctx: &Context<'_>) -> Result<Sql> {
    let alias = ctx.next_table_alias();

    let mut where_sql = Sql::empty();
    if let Some(filter) = &parsed.args.filter {
        let built = build_filter(filter, model, &alias, ctx)?;
        if !built.is_empty() {
            where_sql = Sql::raw(" WHERE ").append(built);
        }
    }

    if parsed.args.take.is_some() || parsed.args.skip.is_some() {
        let inner = Sql::raw("SELECT 1 FROM ")
            .append(table_ref(ctx, model, &alias))
            .append(where_sql)
            .append(build_limit_offset(parsed.args.take, parsed.args.skip)?);
        let sub_alias = ctx.next_table_alias();
        return Ok(Sql::raw("SELECT COUNT(*) FROM (")
            .append(inner)
            .append_raw(&format!(") AS {}", ctx.dialect.quote_ident(&sub_alias))));
    }

    Ok(Sql::raw("SELECT COUNT(*) FROM ")
        .append(table_ref(ctx, model, &alias))
        .append(where_sql))
}

fn aggregate_alias(prefix: &str, field: Option<&str>) -> String {
    match field {
        Some(field) => format!("_{prefix}_{field}"),
        None => format!("_{prefix}_all"),
    }
}

fn aggregation_columns(
    selections: &[AggregationSelection],
    model: &Model,
    alias: &str,
    ctx: &Context<'_>,
) -> Result<Vec<Sql>> {
    use query_structure::AggregateFunction as Func;

    let mut columns = Vec::new();
    for selection in selections {
        let (func, all, fields) = match selection {
            AggregationSelection::Count { all, fields } => (Func::Count, *all, fields),
            AggregationSelection::Sum(fields) => (Func::Sum, false, fields),
            AggregationSelection::Average(fields) => (Func::Avg, false, fields),
            AggregationSelection::Min(fields) => (Func::Min, false, fields),
            AggregationSelection::Max(fields) => (Func::Max, false, fields),
        };

        let prefix = func.payload_key().trim_start_matches('_').to_owned();

        if all {
            columns.push(Sql::raw(format!(
                "COUNT(*) AS {}",
                ctx.dialect.quote_ident(&aggregate_alias(&prefix, None))
            )));
        }

        for name in fields {
            let field = model.find_field(name)?;
            let expr = match func {
                Func::Count => Sql::raw("COUNT(")
                    .append(column_ref(ctx, alias, field.db_name()))
                    .append_raw(")"),
                _ => Sql::raw(format!("{}(", func.as_sql()))
                    .append(column_ref(ctx, alias, field.db_name()))
                    .append_raw(")"),
            };
            columns.push(expr.append_raw(&format!(
                " AS {}",
                ctx.dialect.quote_ident(&aggregate_alias(&prefix, Some(name)))
            )));
        }
    }

    Ok(columns)
}

/// `aggregate`: aggregate selections over the filtered window.
pub(crate) fn aggregate(model: &Model, parsed: &ParsedPayload, ctx: &Context<'_>) -> Result<Sql> {
    let alias = ctx.next_table_alias();

    let columns = aggregation_columns(&parsed.aggregates, model, &alias, ctx)?;
    if columns.is_empty() {
        return Err(Error::shape(
            "`aggregate` requires at least one aggregate selection",
            &[],
        ));
    }

    let mut sql = Sql::raw("SELECT ")
        .append(Sql::join(columns, ", "))
        .append_raw(" FROM ")
        .append(table_ref(ctx, model, &alias));

    if let Some(filter) = &parsed.args.filter {
        let built = build_filter(filter, model, &alias, ctx)?;
        if !built.is_empty() {
            sql = sql.append_raw(" WHERE ").append(built);
        }
    }

    let order = build_order_by(&parsed.args.order_by, model, &alias, ctx)?;
    if !order.is_empty() {
        sql = sql.append_raw(" ORDER BY ").append(order);
    }

    sql = sql.append(build_limit_offset(parsed.args.take, parsed.args.skip)?);

    Ok(sql)
}

/// `groupBy`: grouped aggregation with HAVING and aggregate-aware ordering.
pub(crate) fn group_by(model: &Model, parsed: &ParsedPayload, ctx: &Context<'_>) -> Result<Sql> {
    let alias = ctx.next_table_alias();

    let group_cols = parsed
        .by
        .iter()
        .map(|name| {
            let field = model.find_field(name)?;
            let mut expr = column_ref(ctx, &alias, field.db_name());
            if field.db_name() != name.as_str() {
                expr = expr.append_raw(&format!(" AS {}", ctx.dialect.quote_ident(name)));
            }
            Ok(expr)
        })
        .collect::<Result<Vec<_>>>()?;

    let agg_cols = aggregation_columns(&parsed.aggregates, model, &alias, ctx)?;
    let projection = group_cols.into_iter().chain(agg_cols).collect_vec();

    let mut sql = Sql::raw("SELECT ")
        .append(Sql::join(projection, ", "))
        .append_raw(" FROM ")
        .append(table_ref(ctx, model, &alias));

    if let Some(filter) = &parsed.args.filter {
        let built = build_filter(filter, model, &alias, ctx)?;
        if !built.is_empty() {
            sql = sql.append_raw(" WHERE ").append(built);
        }
    }

    let group_refs = parsed
        .by
        .iter()
        .map(|name| {
            model
                .find_field(name)
                .map(|field| column_ref(ctx, &alias, field.db_name()))
        })
        .collect::<Result<Vec<_>>>()?;
    sql = sql.append_raw(" GROUP BY ").append(Sql::join(group_refs, ", "));

    if let Some(having) = &parsed.having {
        sql = sql
            .append_raw(" HAVING ")
            .append(build_group_filter(having, model, &alias, ctx)?);
    }

    let order = build_order_by(&parsed.args.order_by, model, &alias, ctx)?;
    if !order.is_empty() {
        sql = sql.append_raw(" ORDER BY ").append(order);
    }

    sql = sql.append(build_limit_offset(parsed.args.take, parsed.args.skip)?);

    Ok(sql)
}
