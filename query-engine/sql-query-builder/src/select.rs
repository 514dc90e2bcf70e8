//! Relation subqueries: JSON-aggregated materialization for `select`/
//! `include` entries and EXISTS predicates for relation filters. The emitted
//! SQL stays a single statement no matter how deep the nesting goes.

use crate::context::Context;
use crate::filter::build_filter;
use crate::model_extensions::{column_ref, table_ref};
use crate::read;
use query_structure::{
    Model, Relation, RelationCondition, RelationFilter, RelationSelection, Result,
};
use query_template::Sql;

/// The condition coupling a child row to its parent row. For many-to-many
/// relations the coupling goes through an EXISTS over the junction table.
pub(crate) fn link_condition(
    parent_model: &Model,
    relation: &Relation,
    parent_alias: &str,
    child_alias: &str,
    ctx: &Context<'_>,
) -> Result<Sql> {
    if relation.kind.is_many_to_many() {
        let junction = ctx.schema.junction_info(parent_model, relation)?;
        let junction_alias = ctx.next_table_alias();

        let child_link = column_ref(ctx, &junction_alias, &junction.child_column)
            .append_raw(" = ")
            .append(column_ref(ctx, child_alias, &junction.child_id_column));
        let parent_link = column_ref(ctx, &junction_alias, &junction.parent_column)
            .append_raw(" = ")
            .append(column_ref(ctx, parent_alias, &junction.parent_id_column));

        return Ok(Sql::raw("EXISTS (SELECT 1 FROM ")
            .append_raw(&format!(
                "{} AS {}",
                ctx.dialect.quote_ident(&junction.table),
                ctx.dialect.quote_ident(&junction_alias)
            ))
            .append_raw(" WHERE ")
            .append(child_link)
            .append_raw(" AND ")
            .append(parent_link)
            .append_raw(")"));
    }

    let pairs = ctx.schema.linking_columns(parent_model, relation)?;
    let conditions = pairs.into_iter().map(|(parent_column, child_column)| {
        column_ref(ctx, child_alias, &child_column)
            .append_raw(" = ")
            .append(column_ref(ctx, parent_alias, &parent_column))
    });

    Ok(Sql::join(conditions, " AND "))
}

/// Materialize a relation subtree as a JSON-valued scalar subquery. To-many
/// relations aggregate to a JSON array coalesced to `[]`; to-one relations
/// yield a JSON object or NULL.
pub(crate) fn relation_selection_subquery(
    parent_model: &Model,
    selection: &RelationSelection,
    parent_alias: &str,
    ctx: &Context<'_>,
) -> Result<Sql> {
    let relation = parent_model.find_relation(&selection.relation)?;
    let target = ctx.schema.target_of(relation)?;
    let child_alias = ctx.next_table_alias();

    let link = link_condition(parent_model, relation, parent_alias, &child_alias, ctx)?;

    let mut args = selection.args.clone();
    if relation.kind.is_to_one() {
        args.take = Some(1);
    }

    let (inner, keys) = read::build_select_core(
        target,
        &child_alias,
        &args,
        &selection.nested,
        Some(link),
        ctx,
    )?;

    let sql = if relation.kind.is_to_one() {
        ctx.dialect.json_agg_object(inner, &child_alias, &keys)
    } else {
        ctx.dialect.json_agg_array(inner, &child_alias, &keys)
    };

    Ok(sql)
}

/// Lower a relation filter into an EXISTS / NOT EXISTS predicate.
pub(crate) fn relation_filter_predicate(
    model: &Model,
    filter: &RelationFilter,
    parent_alias: &str,
    ctx: &Context<'_>,
) -> Result<Sql> {
    let relation = model.find_relation(&filter.relation)?;
    let target = ctx.schema.target_of(relation)?;
    let child_alias = ctx.next_table_alias();

    let link = link_condition(model, relation, parent_alias, &child_alias, ctx)?;
    let nested = build_filter(&filter.nested, target, &child_alias, ctx)?;

    let inner_where = match filter.condition {
        // `every` holds when no related record violates the filter.
        RelationCondition::EveryRelatedRecord => {
            let violated = if nested.is_empty() {
                Sql::raw("NOT (1=1)")
            } else {
                Sql::raw("NOT (").append(nested).append_raw(")")
            };
            link.append_raw(" AND ").append(violated)
        }
        _ if nested.is_empty() => link,
        _ => link.append_raw(" AND ").append(nested),
    };

    let exists = Sql::raw("EXISTS (SELECT 1 FROM ")
        .append(table_ref(ctx, target, &child_alias))
        .append_raw(" WHERE ")
        .append(inner_where)
        .append_raw(")");

    Ok(match filter.condition {
        RelationCondition::AtLeastOneRelatedRecord | RelationCondition::ToOneRelatedRecord => exists,
        RelationCondition::NoRelatedRecord
        | RelationCondition::NotToOneRelatedRecord
        | RelationCondition::EveryRelatedRecord => Sql::raw("NOT ").append(exists),
    })
}
