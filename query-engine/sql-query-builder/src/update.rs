use crate::context::Context;
use crate::filter::build_filter;
use crate::model_extensions::{column_ref, table_name};
use crate::write::returning_columns;
use query_structure::{
    Error, Field, FieldSelection, Filter, Model, Result, WriteArgs, WriteOperation,
};
use query_template::Sql;
use sql_dialect::Capability;

/// The SET clause of an update: user assignments in payload order, plus a
/// refresh of absent `updatedAt` fields. Assignment targets are unqualified;
/// arithmetic right-hand sides qualify by table name.
pub(crate) fn set_clause(model: &Model, args: &WriteArgs, ctx: &Context<'_>) -> Result<Sql> {
    let mut assignments = Vec::with_capacity(args.entries.len());

    for (name, op) in &args.entries {
        let field = model.find_field(name)?;
        assignments.push(assignment(model, field, op, ctx)?);
    }

    for field in model.scalar_fields() {
        if field.is_updated_at() && !args.contains(&field.name) {
            let value = ctx
                .dialect
                .transform_to_database(model_value::Value::now(), field);
            assignments.push(
                Sql::raw(ctx.dialect.quote_ident(field.db_name()))
                    .append_raw(" = ")
                    .append_parameter(value),
            );
        }
    }

    if assignments.is_empty() {
        return Err(Error::shape("`data` must assign at least one field", &["data"]));
    }

    Ok(Sql::join(assignments, ", "))
}

fn assignment(
    model: &Model,
    field: &Field,
    op: &WriteOperation,
    ctx: &Context<'_>,
) -> Result<Sql> {
    let target = Sql::raw(ctx.dialect.quote_ident(field.db_name()));
    let current = || column_ref(ctx, model.db_name(), field.db_name());
    let shape = |value: &model_value::Value| ctx.dialect.transform_to_database(value.clone(), field);

    let arithmetic = |operator: &str, value: &model_value::Value| {
        target
            .clone()
            .append_raw(" = ")
            .append(current())
            .append_raw(operator)
            .append_parameter(shape(value))
    };

    Ok(match op {
        WriteOperation::Set(value) => target.append_raw(" = ").append_parameter(shape(value)),
        WriteOperation::Increment(value) => arithmetic(" + ", value),
        WriteOperation::Decrement(value) => arithmetic(" - ", value),
        WriteOperation::Multiply(value) => arithmetic(" * ", value),
        WriteOperation::Divide(value) => arithmetic(" / ", value),
        WriteOperation::Push(value) => {
            let rhs = ctx
                .dialect
                .list_append(current(), shape(value), false, field)?;
            target.append_raw(" = ").append(rhs)
        }
        WriteOperation::Unshift(value) => {
            let rhs = ctx
                .dialect
                .list_append(current(), shape(value), true, field)?;
            target.append_raw(" = ").append(rhs)
        }
    })
}

/// `UPDATE "table" SET … WHERE … [RETURNING …]`.
pub(crate) fn update_record(
    model: &Model,
    condition: Sql,
    args: &WriteArgs,
    selection: Option<&FieldSelection>,
    ctx: &Context<'_>,
) -> Result<Sql> {
    let mut sql = Sql::raw("UPDATE ")
        .append(table_name(ctx, model))
        .append_raw(" SET ")
        .append(set_clause(model, args, ctx)?)
        .append_raw(" WHERE ")
        .append(condition);

    if let Some(selection) = selection {
        if ctx.dialect.supports(Capability::Returning) {
            sql = sql
                .append_raw(" RETURNING ")
                .append(returning_columns(model, selection, ctx)?);
        }
    }

    Ok(sql)
}

/// `UPDATE "table" SET … [WHERE …]` over a generic filter; no RETURNING.
pub(crate) fn update_many_records(
    model: &Model,
    filter: Option<&Filter>,
    args: &WriteArgs,
    ctx: &Context<'_>,
) -> Result<Sql> {
    let mut sql = Sql::raw("UPDATE ")
        .append(table_name(ctx, model))
        .append_raw(" SET ")
        .append(set_clause(model, args, ctx)?);

    if let Some(filter) = filter {
        let built = build_filter(filter, model, model.db_name(), ctx)?;
        if !built.is_empty() {
            sql = sql.append_raw(" WHERE ").append(built);
        }
    }

    Ok(sql)
}
