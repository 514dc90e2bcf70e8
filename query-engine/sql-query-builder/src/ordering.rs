use crate::context::Context;
use crate::filter::aggregate_expr;
use crate::model_extensions::column_ref;
use crate::nested_aggregations;
use query_structure::{Model, NullsOrder, OrderBy, OrderByTarget, Result, SortOrder};
use query_template::Sql;
use sql_connection::SqlFamily;

/// Render the ORDER BY entries (without the leading keyword). Empty input
/// yields an empty fragment.
pub(crate) fn build_order_by(
    order_by: &[OrderBy],
    model: &Model,
    alias: &str,
    ctx: &Context<'_>,
) -> Result<Sql> {
    let mut rendered = Vec::with_capacity(order_by.len());
    for entry in order_by {
        rendered.push(build_entry(entry, model, alias, ctx)?);
    }
    Ok(Sql::join(rendered, ", "))
}

fn build_entry(entry: &OrderBy, model: &Model, alias: &str, ctx: &Context<'_>) -> Result<Sql> {
    let expr = match &entry.target {
        OrderByTarget::Scalar(name) => {
            let field = model.find_field(name)?;
            column_ref(ctx, alias, field.db_name())
        }
        OrderByTarget::Aggregate { func, field } => {
            aggregate_expr(*func, field.as_deref(), model, alias, ctx)?
        }
        OrderByTarget::RelationCount(relation) => {
            nested_aggregations::relation_count_subquery(model, relation, None, alias, ctx)?
        }
    };

    Ok(apply_direction(expr, entry.direction, entry.nulls, ctx))
}

fn apply_direction(
    expr: Sql,
    direction: SortOrder,
    nulls: Option<NullsOrder>,
    ctx: &Context<'_>,
) -> Sql {
    match nulls {
        None => expr.append_raw(&format!(" {}", direction.as_sql())),
        Some(nulls) if ctx.dialect.family() == SqlFamily::Mysql => {
            // MySQL has no NULLS FIRST/LAST; an ISNULL key in front emulates
            // it.
            let isnull_dir = match nulls {
                NullsOrder::First => SortOrder::Desc,
                NullsOrder::Last => SortOrder::Asc,
            };
            Sql::raw("ISNULL(")
                .append(expr.clone())
                .append_raw(&format!(
                    ") {}, ",
                    isnull_dir.as_sql()
                ))
                .append(expr)
                .append_raw(&format!(" {}", direction.as_sql()))
        }
        Some(nulls) => expr.append_raw(&format!(" {} {}", direction.as_sql(), nulls.as_sql())),
    }
}
