use crate::context::Context;
use crate::model_extensions::table_name;
use crate::read::unique_condition;
use crate::update::set_clause;
use model_value::Value;
use query_structure::{
    DefaultValue, Error, FieldSelection, Model, Result, UniqueFilter, WriteArgs,
    WriteOperation,
};
use query_template::Sql;
use sql_dialect::{Capability, UpsertParts};

/// The column/value pairs of one insert row: the user-provided scalars in
/// payload order, followed by client-side generated defaults for absent
/// fields. Values are shaped for the dialect.
pub(crate) fn insert_pairs(
    model: &Model,
    args: &WriteArgs,
    ctx: &Context<'_>,
) -> Result<Vec<(String, Value)>> {
    let mut pairs = Vec::with_capacity(args.entries.len());

    for (name, op) in &args.entries {
        let field = model.find_field(name)?;
        let value = match op {
            WriteOperation::Set(value) => value.clone(),
            other => {
                return Err(Error::shape(
                    format!("`{}` is not valid in inserts", other.operator_name()),
                    &["data", name],
                ))
            }
        };
        pairs.push((
            field.db_name().to_owned(),
            ctx.dialect.transform_to_database(value, field),
        ));
    }

    for field in model.scalar_fields() {
        if args.contains(&field.name) {
            continue;
        }
        if let Some(DefaultValue::Generator(generator)) = &field.default {
            if let Some(value) = generator.generate() {
                pairs.push((
                    field.db_name().to_owned(),
                    ctx.dialect.transform_to_database(value, field),
                ));
            }
        }
    }

    Ok(pairs)
}

/// The RETURNING column list for a projection (scalars only).
pub(crate) fn returning_columns(
    model: &Model,
    selection: &FieldSelection,
    ctx: &Context<'_>,
) -> Result<Sql> {
    let columns = selection
        .scalars()
        .map(|name| {
            let field = model.find_field(name)?;
            let mut expr = Sql::raw(ctx.dialect.quote_ident(field.db_name()));
            if field.db_name() != name {
                expr = expr.append_raw(&format!(" AS {}", ctx.dialect.quote_ident(name)));
            }
            Ok(expr)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Sql::join(columns, ", "))
}

fn values_tuple(pairs: &[(String, Value)]) -> Sql {
    Sql::join(
        pairs.iter().map(|(_, value)| Sql::parameter(value.clone())),
        ", ",
    )
}

fn column_list(pairs: &[(String, Value)], ctx: &Context<'_>) -> Sql {
    Sql::raw(
        pairs
            .iter()
            .map(|(column, _)| ctx.dialect.quote_ident(column))
            .collect::<Vec<_>>()
            .join(", "),
    )
}

/// `INSERT INTO "table" (…) VALUES (…) [RETURNING …]`.
pub(crate) fn create_record(
    model: &Model,
    args: &WriteArgs,
    selection: Option<&FieldSelection>,
    ctx: &Context<'_>,
) -> Result<Sql> {
    let pairs = insert_pairs(model, args, ctx)?;
    if pairs.is_empty() {
        return Err(Error::shape("`create` requires at least one column", &["data"]));
    }

    let mut sql = Sql::raw("INSERT INTO ")
        .append(table_name(ctx, model))
        .append_raw(" (")
        .append(column_list(&pairs, ctx))
        .append_raw(") VALUES (")
        .append(values_tuple(&pairs))
        .append_raw(")");

    if let Some(selection) = selection {
        if ctx.dialect.supports(Capability::Returning) {
            sql = sql
                .append_raw(" RETURNING ")
                .append(returning_columns(model, selection, ctx)?);
        }
    }

    Ok(sql)
}

/// Batch insert for `createMany`. Rows are normalized over the union of
/// provided columns; absent slots fall back to the field's generator,
/// constant default, or NULL for nullable fields.
pub(crate) fn create_many_records(
    model: &Model,
    rows: &[WriteArgs],
    skip_duplicates: bool,
    ctx: &Context<'_>,
) -> Result<Sql> {
    if rows.is_empty() {
        return Err(Error::shape("`createMany` requires at least one row", &["data"]));
    }

    // Stable column set: field declaration order, restricted to fields any
    // row provides or that carry generators.
    let mut columns: Vec<&str> = Vec::new();
    for field in model.scalar_fields() {
        let provided = rows.iter().any(|row| row.contains(&field.name));
        let generated = matches!(&field.default, Some(DefaultValue::Generator(g)) if g.is_client_side());
        if provided || generated {
            columns.push(&field.name);
        }
    }

    let mut tuples = Vec::with_capacity(rows.len());
    for row in rows {
        for name in row.entries.keys() {
            model.find_field(name)?;
        }

        let mut values = Vec::with_capacity(columns.len());
        for name in &columns {
            let field = model.find_field(name)?;
            let value = match row.get(name) {
                Some(WriteOperation::Set(value)) => value.clone(),
                Some(other) => {
                    return Err(Error::shape(
                        format!("`{}` is not valid in inserts", other.operator_name()),
                        &["data", name],
                    ))
                }
                None => match &field.default {
                    Some(DefaultValue::Generator(generator)) if generator.is_client_side() => {
                        generator.generate().unwrap_or(Value::Null)
                    }
                    Some(DefaultValue::Value(value)) => value.clone(),
                    _ if field.is_nullable() => Value::Null,
                    _ => {
                        return Err(Error::shape(
                            format!("row is missing required field `{name}`"),
                            &["data"],
                        ))
                    }
                },
            };
            values.push(ctx.dialect.transform_to_database(value, field));
        }

        tuples.push(
            Sql::raw("(")
                .append(Sql::join(values.into_iter().map(Sql::parameter), ", "))
                .append_raw(")"),
        );
    }

    let quoted_columns = columns
        .iter()
        .map(|name| {
            model
                .find_field(name)
                .map(|field| ctx.dialect.quote_ident(field.db_name()))
        })
        .collect::<Result<Vec<_>>>()?
        .join(", ");

    let sql = Sql::raw(format!("{} INTO ", ctx.dialect.insert_verb(skip_duplicates)))
        .append(table_name(ctx, model))
        .append_raw(&format!(" ({quoted_columns}) VALUES "))
        .append(Sql::join(tuples, ", "))
        .append_raw(ctx.dialect.insert_conflict_suffix(skip_duplicates));

    Ok(sql)
}

/// `DELETE FROM "table" WHERE … [RETURNING …]`. Columns qualify by table
/// name; MySQL rejects aliases in single-table deletes.
pub(crate) fn delete_record(
    model: &Model,
    condition: Sql,
    selection: Option<&FieldSelection>,
    ctx: &Context<'_>,
) -> Result<Sql> {
    let mut sql = Sql::raw("DELETE FROM ")
        .append(table_name(ctx, model))
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

/// The native upsert: insert from the create data, update from the update
/// data, keyed on the unique criteria.
pub(crate) fn native_upsert(
    model: &Model,
    unique: &UniqueFilter,
    create_args: &WriteArgs,
    update_args: &WriteArgs,
    selection: Option<&FieldSelection>,
    ctx: &Context<'_>,
) -> Result<Sql> {
    let pairs = insert_pairs(model, create_args, ctx)?;
    if pairs.is_empty() {
        return Err(Error::shape("`upsert.create` requires at least one column", &["create"]));
    }

    let conflict_target = Sql::raw(
        unique
            .fields
            .iter()
            .map(|(name, _)| {
                model
                    .find_field(name)
                    .map(|field| ctx.dialect.quote_ident(field.db_name()))
            })
            .collect::<Result<Vec<_>>>()?
            .join(", "),
    );

    let set = set_clause(model, update_args, ctx)?;

    let returning = match selection {
        Some(selection) if ctx.dialect.supports(Capability::Returning) => {
            Some(returning_columns(model, selection, ctx)?)
        }
        _ => None,
    };

    Ok(ctx.dialect.upsert(UpsertParts {
        table: table_name(ctx, model),
        columns: column_list(&pairs, ctx),
        values: values_tuple(&pairs),
        conflict_target,
        set,
        returning,
    }))
}

/// The WHERE fragment for a unique criteria qualified by table name.
pub(crate) fn unique_where(model: &Model, unique: &UniqueFilter, ctx: &Context<'_>) -> Result<Sql> {
    unique_condition(unique, model, model.db_name(), ctx)
}

/// `DELETE FROM "table" [WHERE …]` over a generic filter.
pub(crate) fn delete_many_records(
    model: &Model,
    filter: Option<&query_structure::Filter>,
    ctx: &Context<'_>,
) -> Result<Sql> {
    let mut sql = Sql::raw("DELETE FROM ").append(table_name(ctx, model));

    if let Some(filter) = filter {
        let built = crate::filter::build_filter(filter, model, model.db_name(), ctx)?;
        if !built.is_empty() {
            sql = sql.append_raw(" WHERE ").append(built);
        }
    }

    Ok(sql)
}
