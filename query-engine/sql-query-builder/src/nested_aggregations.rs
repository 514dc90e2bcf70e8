use crate::context::Context;
use crate::filter::build_filter;
use crate::model_extensions::table_ref;
use crate::select::link_condition;
use query_structure::{Filter, Model, Result};
use query_template::Sql;

/// A scalar subquery counting the related records of one to-many relation:
/// `(SELECT COUNT(*) FROM "child" AS "tN" WHERE <link> [AND <where>])`.
pub(crate) fn relation_count_subquery(
    model: &Model,
    relation_name: &str,
    filter: Option<&Filter>,
    parent_alias: &str,
    ctx: &Context<'_>,
) -> Result<Sql> {
    let relation = model.find_relation(relation_name)?;
    let target = ctx.schema.target_of(relation)?;
    let child_alias = ctx.next_table_alias();

    let link = link_condition(model, relation, parent_alias, &child_alias, ctx)?;

    let mut where_clause = link;
    if let Some(filter) = filter {
        let nested = build_filter(filter, target, &child_alias, ctx)?;
        if !nested.is_empty() {
            where_clause = where_clause.append_raw(" AND ").append(nested);
        }
    }

    Ok(Sql::raw("(SELECT COUNT(*) FROM ")
        .append(table_ref(ctx, target, &child_alias))
        .append_raw(" WHERE ")
        .append(where_clause)
        .append_raw(")"))
}
