use crate::context::Context;
use crate::model_extensions::{column_ref, table_ref};
use query_structure::{Model, OrderBy, OrderByTarget, Result, SortOrder, UniqueFilter};
use query_template::Sql;

/// Build the seek predicate positioning the scan at the cursor row
/// (inclusive), honoring the query's ordering. Without an explicit
/// `orderBy`, the model's id fields in ascending order drive the seek.
pub(crate) fn build_cursor_condition(
    cursor: &UniqueFilter,
    order_by: &[OrderBy],
    model: &Model,
    alias: &str,
    ctx: &Context<'_>,
) -> Result<Sql> {
    let keys = ordering_keys(order_by, model)?;

    // (k1 > c1) OR (k1 = c1 AND k2 > c2) OR … OR (k1 = c1 AND … kn = cn)
    let mut terms = Vec::with_capacity(keys.len() + 1);

    for i in 0..keys.len() {
        let mut conjuncts = Vec::with_capacity(i + 1);
        for (j, (column, direction)) in keys.iter().take(i + 1).enumerate() {
            let operator = if j < i {
                " = "
            } else {
                match direction {
                    SortOrder::Asc => " > ",
                    SortOrder::Desc => " < ",
                }
            };
            conjuncts.push(
                column_ref(ctx, alias, column)
                    .append_raw(operator)
                    .append(cursor_value_subquery(cursor, column, model, ctx)?),
            );
        }
        terms.push(Sql::join_with(conjuncts, " AND ", "(", ")"));
    }

    let equal_row = keys
        .iter()
        .map(|(column, _)| {
            cursor_value_subquery(cursor, column, model, ctx).map(|sub| {
                column_ref(ctx, alias, column).append_raw(" = ").append(sub)
            })
        })
        .collect::<Result<Vec<_>>>()?;
    terms.push(Sql::join_with(equal_row, " AND ", "(", ")"));

    Ok(Sql::join_with(terms, " OR ", "(", ")"))
}

/// The physical ordering keys the seek follows: the scalar `orderBy` entries
/// or, absent any, the id columns ascending.
fn ordering_keys(order_by: &[OrderBy], model: &Model) -> Result<Vec<(String, SortOrder)>> {
    let mut keys = Vec::new();
    for entry in order_by {
        if let OrderByTarget::Scalar(name) = &entry.target {
            let field = model.find_field(name)?;
            keys.push((field.db_name().to_owned(), entry.direction));
        }
    }

    if keys.is_empty() {
        keys = model
            .id_fields()
            .into_iter()
            .map(|field| (field.db_name().to_owned(), SortOrder::Asc))
            .collect();
    }

    Ok(keys)
}

/// A scalar subquery reading one ordering-key value of the cursor row:
/// `(SELECT "col" FROM "table" AS "tN" WHERE <cursor equality>)`.
fn cursor_value_subquery(
    cursor: &UniqueFilter,
    column: &str,
    model: &Model,
    ctx: &Context<'_>,
) -> Result<Sql> {
    let alias = ctx.next_table_alias();

    let mut conditions = Vec::with_capacity(cursor.fields.len());
    for (name, value) in &cursor.fields {
        let field = model.find_field(name)?;
        let shaped = ctx.dialect.transform_to_database(value.clone(), field);
        conditions.push(
            column_ref(ctx, &alias, field.db_name())
                .append_raw(" = ")
                .append_parameter(shaped),
        );
    }

    Ok(Sql::raw("(SELECT ")
        .append(column_ref(ctx, &alias, column))
        .append_raw(" FROM ")
        .append(table_ref(ctx, model, &alias))
        .append_raw(" WHERE ")
        .append(Sql::join(conditions, " AND "))
        .append_raw(")"))
}
