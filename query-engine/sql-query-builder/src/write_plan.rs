//! Nested writes do not collapse into one statement; they become a
//! dependency-ordered list of statements executed by the driver inside a
//! transaction. Statements reference columns returned by earlier steps
//! through `Value::Placeholder("<step label>.<column>")` parameters, which
//! the driver substitutes from prior RETURNING rows in emission order.
//!
//! The assembler walks
//! `InitializingChildren → InsertingParent → AttachingChildren →
//! ApplyingNestedMutations → Done` for every write node; the current phase
//! travels with emission errors.

use crate::context::Context;
use crate::model_extensions::{column_ref, table_name};
use crate::update::{set_clause, update_record};
use crate::write::{create_many_records, create_record, insert_pairs, native_upsert, unique_where};
use crate::filter as filter_builder;
use model_value::Value;
use query_structure::{
    Error, Model, NestedWrite, NestedWriteOp, Relation, Result, UniqueFilter, WriteArgs,
    WriteData, WriteOperation,
};
use query_template::Sql;
use sql_dialect::Capability;

/// The assembler's progress through one write node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanPhase {
    InitializingChildren,
    InsertingParent,
    AttachingChildren,
    ApplyingNestedMutations,
    Done,
}

/// One statement of a write plan. `returning` names the columns later steps
/// reference through placeholders; on dialects without RETURNING the driver
/// recovers them (e.g. `last_insert_id`, or a follow-up read).
#[derive(Debug, Clone, PartialEq)]
pub struct WriteStep {
    pub label: String,
    pub sql: Sql,
    pub returning: Vec<String>,
}

/// The ordered statement list implementing a nested write. Emission order is
/// execution order; callers must not reorder and must run the plan inside a
/// single transaction.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WritePlan {
    pub steps: Vec<WriteStep>,
}

struct PlanBuilder<'a, 'b> {
    ctx: &'a Context<'b>,
    steps: Vec<WriteStep>,
    phase: PlanPhase,
}

impl<'a, 'b> PlanBuilder<'a, 'b> {
    fn push(&mut self, label: impl Into<String>, sql: Sql, returning: Vec<String>) {
        self.steps.push(WriteStep {
            label: label.into(),
            sql,
            returning,
        });
    }

    fn unsupported(&self, op: &NestedWriteOp, relation: &Relation) -> Error {
        Error::internal(format!(
            "nested `{}` is not valid on relation `{}` in phase {:?}",
            op.name(),
            relation.name,
            self.phase,
        ))
        .nested(&relation.name)
    }
}

fn placeholder(label: &str, column: &str) -> Value {
    Value::Placeholder(format!("{label}.{column}"))
}

/// Split a node's nested writes into those targeting owning to-one
/// relations (resolved before the parent row exists) and the rest.
fn split_nested<'d>(
    model: &Model,
    data: &'d WriteData,
) -> Result<(Vec<&'d NestedWrite>, Vec<&'d NestedWrite>)> {
    let mut owning = Vec::new();
    let mut inverse = Vec::new();

    for nested in &data.nested {
        let relation = model.find_relation(&nested.relation)?;
        if relation.kind.is_to_one() && relation.is_owning_side() {
            owning.push(nested);
        } else {
            inverse.push(nested);
        }
    }

    Ok((owning, inverse))
}

/// Plan a `create` with nested writes.
pub(crate) fn plan_create(
    model: &Model,
    data: &WriteData,
    ctx: &Context<'_>,
) -> Result<WritePlan> {
    let mut builder = PlanBuilder {
        ctx,
        steps: Vec::new(),
        phase: PlanPhase::InitializingChildren,
    };

    plan_create_node(model, data, &model.name, &mut builder)?;
    builder.phase = PlanPhase::Done;

    Ok(WritePlan {
        steps: builder.steps,
    })
}

fn plan_create_node(
    model: &Model,
    data: &WriteData,
    label: &str,
    builder: &mut PlanBuilder<'_, '_>,
) -> Result<()> {
    let (owning, inverse) = split_nested(model, data)?;

    // Targets that must exist before the parent row: creates behind the
    // parent's own FK columns.
    builder.phase = PlanPhase::InitializingChildren;
    let mut args = data.scalars.clone();
    for nested in owning {
        let relation = model.find_relation(&nested.relation)?;
        resolve_owning_side(model, relation, &nested.ops, label, &mut args, builder)
            .map_err(|e| e.nested(&nested.relation))?;
    }

    // The parent row itself.
    builder.phase = PlanPhase::InsertingParent;
    let returning = parent_returning(model, &inverse, builder.ctx.schema)?;
    let mut sql = create_record(model, &args, None, builder.ctx)?;
    if !returning.is_empty() && builder.ctx.dialect.supports(Capability::Returning) {
        let cols = returning
            .iter()
            .map(|c| builder.ctx.dialect.quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        sql = sql.append_raw(&format!(" RETURNING {cols}"));
    }
    builder.push(label, sql, returning);

    // Children that reference the parent.
    builder.phase = PlanPhase::AttachingChildren;
    for nested in inverse {
        let relation = model.find_relation(&nested.relation)?;
        attach_children(model, relation, &nested.ops, label, builder)
            .map_err(|e| e.nested(&nested.relation))?;
    }

    Ok(())
}

/// The columns the parent statement must return: ids, plus every column
/// child statements link through.
fn parent_returning(
    model: &Model,
    inverse: &[&NestedWrite],
    schema: &query_structure::ModelSet,
) -> Result<Vec<String>> {
    let mut columns: Vec<String> = model
        .id_fields()
        .iter()
        .map(|f| f.db_name().to_owned())
        .collect();

    let mut add = |column: String| {
        if !columns.contains(&column) {
            columns.push(column);
        }
    };

    for nested in inverse {
        let relation = model.find_relation(&nested.relation)?;
        if relation.kind.is_many_to_many() {
            continue;
        }
        // linking_columns yields (parent, child) pairs; the parent side must
        // come back from the insert.
        for (parent_column, _) in schema.linking_columns(model, relation)? {
            add(parent_column);
        }
    }

    Ok(columns)
}

/// Resolve the FK values of an owning to-one relation, emitting child
/// statements as needed, and write them into the parent's args.
fn resolve_owning_side(
    model: &Model,
    relation: &Relation,
    ops: &[NestedWriteOp],
    label: &str,
    args: &mut WriteArgs,
    builder: &mut PlanBuilder<'_, '_>,
) -> Result<()> {
    let ctx = builder.ctx;
    let target = ctx.schema.target_of(relation)?;
    let child_label = format!("{label}.{}", relation.name);

    for op in ops {
        match op {
            NestedWriteOp::Create(child_data) => {
                plan_create_node(target, child_data, &child_label, builder)?;
                link_parent_args(relation, &child_label, target, args)?;
            }
            NestedWriteOp::Connect(unique) => {
                if inline_connect(relation, unique, args) {
                    continue;
                }
                push_lookup_step(target, unique, relation, &child_label, builder)?;
                link_parent_args(relation, &child_label, target, args)?;
            }
            NestedWriteOp::ConnectOrCreate { filter, create } => {
                if create.has_nested() {
                    return Err(Error::internal(
                        "nested writes inside `connectOrCreate.create` are not supported",
                    ));
                }
                let insert = create_with_skip(target, &create.scalars, builder.ctx)?;
                builder.push(format!("{child_label}#insert"), insert, Vec::new());
                push_lookup_step(target, filter, relation, &child_label, builder)?;
                link_parent_args(relation, &child_label, target, args)?;
            }
            NestedWriteOp::Disconnect(None) => {
                for local in &relation.fields {
                    args.insert(local.clone(), WriteOperation::Set(Value::Null));
                }
            }
            other => return Err(builder.unsupported(other, relation)),
        }
    }

    Ok(())
}

/// A skip-duplicates single-row insert, used by `connectOrCreate`.
fn create_with_skip(model: &Model, args: &WriteArgs, ctx: &Context<'_>) -> Result<Sql> {
    let rows = vec![args.clone()];
    create_many_records(model, &rows, true, ctx)
}

/// `SELECT <referenced columns> FROM target WHERE <unique>` — resolves a
/// connect target so later steps can reference its columns.
fn push_lookup_step(
    target: &Model,
    unique: &UniqueFilter,
    relation: &Relation,
    label: &str,
    builder: &mut PlanBuilder<'_, '_>,
) -> Result<()> {
    let ctx = builder.ctx;
    let columns: Vec<String> = relation
        .references
        .iter()
        .map(|name| target.find_field(name).map(|f| f.db_name().to_owned()))
        .collect::<Result<_>>()?;

    let projection = columns
        .iter()
        .map(|c| ctx.dialect.quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");

    let sql = Sql::raw(format!("SELECT {projection} FROM "))
        .append(table_name(ctx, target))
        .append_raw(" WHERE ")
        .append(unique_where(target, unique, ctx)?);

    builder.push(label, sql, columns);
    Ok(())
}

/// Point the parent's FK fields at a prior step's returned columns.
fn link_parent_args(
    relation: &Relation,
    child_label: &str,
    target: &Model,
    args: &mut WriteArgs,
) -> Result<()> {
    for (local, referenced) in relation.fields.iter().zip(relation.references.iter()) {
        let referenced_db = target.find_field(referenced)?.db_name().to_owned();
        args.insert(
            local.clone(),
            WriteOperation::Set(placeholder(child_label, &referenced_db)),
        );
    }
    Ok(())
}

/// `connect` resolves without a lookup when the unique criteria already
/// carries the referenced columns.
fn inline_connect(relation: &Relation, unique: &UniqueFilter, args: &mut WriteArgs) -> bool {
    let mut values = Vec::with_capacity(relation.references.len());
    for referenced in &relation.references {
        match unique.fields.iter().find(|(name, _)| name == referenced) {
            Some((_, value)) => values.push(value.clone()),
            None => return false,
        }
    }

    for (local, value) in relation.fields.iter().zip(values) {
        args.insert(local.clone(), WriteOperation::Set(value));
    }
    true
}

/// Attach phase: children referencing the freshly written parent.
fn attach_children(
    model: &Model,
    relation: &Relation,
    ops: &[NestedWriteOp],
    parent_label: &str,
    builder: &mut PlanBuilder<'_, '_>,
) -> Result<()> {
    if relation.kind.is_many_to_many() {
        return attach_m2m(model, relation, ops, parent_label, builder);
    }

    let ctx = builder.ctx;
    let target = ctx.schema.target_of(relation)?;
    let child_label = format!("{parent_label}.{}", relation.name);

    // (parent, child) column pairs the FK couples.
    let pairs = ctx.schema.linking_columns(model, relation)?;

    let fk_args = |target: &Model| -> Result<Vec<(String, Value)>> {
        pairs
            .iter()
            .map(|(parent_column, child_column)| {
                // Field name on the child for the db column.
                let field = target
                    .scalar_fields()
                    .find(|f| f.db_name() == child_column)
                    .ok_or_else(|| {
                        Error::schema(format!(
                            "relation `{}` references unknown column `{child_column}`",
                            relation.name
                        ))
                    })?;
                Ok((field.name.clone(), placeholder(parent_label, parent_column)))
            })
            .collect()
    };

    let mut batched: Vec<WriteArgs> = Vec::new();

    for op in ops {
        match op {
            NestedWriteOp::Create(child_data) => {
                let mut scalars = child_data.scalars.clone();
                for (field_name, value) in fk_args(target)? {
                    scalars.insert(field_name, WriteOperation::Set(value));
                }

                if child_data.has_nested() {
                    let data = WriteData {
                        scalars,
                        nested: child_data.nested.clone(),
                    };
                    plan_create_node(target, &data, &child_label, builder)?;
                } else {
                    batched.push(scalars);
                }
            }
            NestedWriteOp::Connect(unique) => {
                let mut args = WriteArgs::default();
                for (field_name, value) in fk_args(target)? {
                    args.insert(field_name, WriteOperation::Set(value));
                }
                let condition = unique_where(target, unique, ctx)?;
                let sql = update_record(target, condition, &args, None, ctx)?;
                builder.push(format!("{child_label}#connect"), sql, Vec::new());
            }
            NestedWriteOp::ConnectOrCreate { filter, create } => {
                if create.has_nested() {
                    return Err(Error::internal(
                        "nested writes inside `connectOrCreate.create` are not supported",
                    ));
                }
                let mut scalars = create.scalars.clone();
                for (field_name, value) in fk_args(target)? {
                    scalars.insert(field_name, WriteOperation::Set(value));
                }
                let insert = create_with_skip(target, &scalars, ctx)?;
                builder.push(format!("{child_label}#insert"), insert, Vec::new());

                let mut args = WriteArgs::default();
                for (field_name, value) in fk_args(target)? {
                    args.insert(field_name, WriteOperation::Set(value));
                }
                let condition = unique_where(target, filter, ctx)?;
                let sql = update_record(target, condition, &args, None, ctx)?;
                builder.push(format!("{child_label}#connect"), sql, Vec::new());
            }
            other => return Err(builder.unsupported(other, relation)),
        }
    }

    if !batched.is_empty() {
        let sql = create_many_records(target, &batched, false, ctx)?;
        builder.push(child_label, sql, Vec::new());
    }

    Ok(())
}

/// Attach phase for many-to-many relations: child rows first, then junction
/// rows pairing parent and child ids.
fn attach_m2m(
    model: &Model,
    relation: &Relation,
    ops: &[NestedWriteOp],
    parent_label: &str,
    builder: &mut PlanBuilder<'_, '_>,
) -> Result<()> {
    let ctx = builder.ctx;
    let target = ctx.schema.target_of(relation)?;
    let junction = ctx.schema.junction_info(model, relation)?;
    let child_label = format!("{parent_label}.{}", relation.name);

    let junction_insert = |parent_value: Value, child_value: Value, ctx: &Context<'_>| {
        let columns = format!(
            "{}, {}",
            ctx.dialect.quote_ident(&junction.parent_column),
            ctx.dialect.quote_ident(&junction.child_column)
        );
        Sql::raw(format!(
            "{} INTO {} ({columns}) VALUES (",
            ctx.dialect.insert_verb(true),
            ctx.dialect.quote_ident(&junction.table)
        ))
        .append_parameter(parent_value)
        .append_raw(", ")
        .append_parameter(child_value)
        .append_raw(")")
        .append_raw(ctx.dialect.insert_conflict_suffix(true))
    };

    for (index, op) in ops.iter().enumerate() {
        let parent_value = placeholder(parent_label, &junction.parent_id_column);

        match op {
            NestedWriteOp::Create(child_data) => {
                let step_label = format!("{child_label}[{index}]");
                plan_create_node(target, child_data, &step_label, builder)?;
                let child_value = placeholder(&step_label, &junction.child_id_column);
                builder.push(
                    format!("{step_label}#junction"),
                    junction_insert(parent_value, child_value, ctx),
                    Vec::new(),
                );
            }
            NestedWriteOp::Connect(unique) => {
                // The child id may sit in the unique criteria already.
                let direct = unique
                    .fields
                    .iter()
                    .find(|(name, _)| {
                        target
                            .find_field(name)
                            .map(|f| f.db_name() == junction.child_id_column)
                            .unwrap_or(false)
                    })
                    .map(|(_, value)| value.clone());

                let child_value = match direct {
                    Some(value) => value,
                    None => {
                        let step_label = format!("{child_label}[{index}]");
                        push_id_lookup(target, unique, &junction.child_id_column, &step_label, builder)?;
                        placeholder(&step_label, &junction.child_id_column)
                    }
                };

                builder.push(
                    format!("{child_label}[{index}]#junction"),
                    junction_insert(parent_value, child_value, ctx),
                    Vec::new(),
                );
            }
            NestedWriteOp::ConnectOrCreate { filter, create } => {
                if create.has_nested() {
                    return Err(Error::internal(
                        "nested writes inside `connectOrCreate.create` are not supported",
                    ));
                }
                let step_label = format!("{child_label}[{index}]");
                let insert = create_with_skip(target, &create.scalars, ctx)?;
                builder.push(format!("{step_label}#insert"), insert, Vec::new());
                push_id_lookup(target, filter, &junction.child_id_column, &step_label, builder)?;
                builder.push(
                    format!("{step_label}#junction"),
                    junction_insert(
                        parent_value,
                        placeholder(&step_label, &junction.child_id_column),
                        ctx,
                    ),
                    Vec::new(),
                );
            }
            other => return Err(builder.unsupported(other, relation)),
        }
    }

    Ok(())
}

fn push_id_lookup(
    target: &Model,
    unique: &UniqueFilter,
    id_column: &str,
    label: &str,
    builder: &mut PlanBuilder<'_, '_>,
) -> Result<()> {
    let ctx = builder.ctx;
    let sql = Sql::raw(format!(
        "SELECT {} FROM ",
        ctx.dialect.quote_ident(id_column)
    ))
    .append(table_name(ctx, target))
    .append_raw(" WHERE ")
    .append(unique_where(target, unique, ctx)?);

    builder.push(label, sql, vec![id_column.to_owned()]);
    Ok(())
}

/// Plan an `update` with nested writes. Detachments run before the parent
/// update (referencing the parent through subqueries on its original unique
/// criteria); attachments run after it (referencing returned columns).
pub(crate) fn plan_update(
    model: &Model,
    unique: &UniqueFilter,
    data: &WriteData,
    ctx: &Context<'_>,
) -> Result<WritePlan> {
    let mut builder = PlanBuilder {
        ctx,
        steps: Vec::new(),
        phase: PlanPhase::InitializingChildren,
    };

    let (owning, inverse) = split_nested(model, data)?;
    let label = model.name.clone();

    // A parent column as a scalar subquery against the pre-update row.
    let parent_sub = |column: &str| -> Result<Sql> {
        Ok(Sql::raw("(SELECT ")
            .append(column_ref(ctx, model.db_name(), column))
            .append_raw(" FROM ")
            .append(table_name(ctx, model))
            .append_raw(" WHERE ")
            .append(unique_where(model, unique, ctx)?)
            .append_raw(")"))
    };

    // Detach and delete existing children first.
    for nested in &inverse {
        let relation = model.find_relation(&nested.relation)?;
        detach_children(model, relation, &nested.ops, &parent_sub, &mut builder)
            .map_err(|e| e.nested(&nested.relation))?;
    }

    // New to-one targets the parent will point at.
    builder.phase = PlanPhase::InitializingChildren;
    let mut args = data.scalars.clone();
    for nested in &owning {
        let relation = model.find_relation(&nested.relation)?;
        resolve_owning_side(model, relation, &nested.ops, &label, &mut args, &mut builder)
            .map_err(|e| e.nested(&nested.relation))?;
    }

    // The parent update, returning the columns attachments reference.
    builder.phase = PlanPhase::InsertingParent;
    let returning = parent_returning(model, &inverse, ctx.schema)?;
    let condition = unique_where(model, unique, ctx)?;
    let mut sql = update_record(model, condition, &args, None, ctx)?;
    if !returning.is_empty() && ctx.dialect.supports(Capability::Returning) {
        let cols = returning
            .iter()
            .map(|c| ctx.dialect.quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        sql = sql.append_raw(&format!(" RETURNING {cols}"));
    }
    builder.push(&label, sql, returning);

    // Attach and mutate children.
    builder.phase = PlanPhase::AttachingChildren;
    for nested in &inverse {
        let relation = model.find_relation(&nested.relation)?;
        let attach_ops: Vec<NestedWriteOp> = nested
            .ops
            .iter()
            .filter(|op| {
                matches!(
                    op,
                    NestedWriteOp::Create(_)
                        | NestedWriteOp::Connect(_)
                        | NestedWriteOp::ConnectOrCreate { .. }
                        | NestedWriteOp::Set(_)
                )
            })
            .flat_map(|op| match op {
                // `set` detached everything already; the listed records now
                // connect.
                NestedWriteOp::Set(uniques) => uniques
                    .iter()
                    .cloned()
                    .map(NestedWriteOp::Connect)
                    .collect::<Vec<_>>(),
                other => vec![other.clone()],
            })
            .collect();
        if !attach_ops.is_empty() {
            attach_children(model, relation, &attach_ops, &label, &mut builder)
                .map_err(|e| e.nested(&nested.relation))?;
        }
    }

    builder.phase = PlanPhase::ApplyingNestedMutations;
    for nested in &inverse {
        let relation = model.find_relation(&nested.relation)?;
        mutate_children(model, relation, &nested.ops, &label, &mut builder)
            .map_err(|e| e.nested(&nested.relation))?;
    }

    builder.phase = PlanPhase::Done;
    Ok(WritePlan {
        steps: builder.steps,
    })
}

/// Pre-update phase: `disconnect`, `delete`, `deleteMany` and the clearing
/// half of `set`.
fn detach_children(
    model: &Model,
    relation: &Relation,
    ops: &[NestedWriteOp],
    parent_sub: &dyn Fn(&str) -> Result<Sql>,
    builder: &mut PlanBuilder<'_, '_>,
) -> Result<()> {
    let ctx = builder.ctx;
    let target = ctx.schema.target_of(relation)?;

    for op in ops {
        match op {
            NestedWriteOp::Disconnect(unique) | NestedWriteOp::Delete(unique)
                if relation.kind.is_many_to_many() =>
            {
                let junction = ctx.schema.junction_info(model, relation)?;
                let mut sql = Sql::raw("DELETE FROM ")
                    .append_raw(&ctx.dialect.quote_ident(&junction.table))
                    .append_raw(" WHERE ")
                    .append_raw(&ctx.dialect.quote_ident(&junction.parent_column))
                    .append_raw(" = ")
                    .append(parent_sub(&junction.parent_id_column)?);
                if let Some(unique) = unique {
                    sql = sql
                        .append_raw(&format!(
                            " AND {} IN (SELECT {} FROM ",
                            ctx.dialect.quote_ident(&junction.child_column),
                            ctx.dialect.quote_ident(&junction.child_id_column),
                        ))
                        .append(table_name(ctx, target))
                        .append_raw(" WHERE ")
                        .append(unique_where(target, unique, ctx)?)
                        .append_raw(")");
                }
                builder.push(format!("{}.{}#detach", model.name, relation.name), sql, Vec::new());

                if matches!(op, NestedWriteOp::Delete(_)) {
                    let mut del = Sql::raw("DELETE FROM ").append(table_name(ctx, target));
                    if let Some(unique) = unique {
                        del = del.append_raw(" WHERE ").append(unique_where(target, unique, ctx)?);
                    }
                    builder.push(format!("{}.{}#delete", model.name, relation.name), del, Vec::new());
                }
            }
            NestedWriteOp::Set(_) if relation.kind.is_many_to_many() => {
                let junction = ctx.schema.junction_info(model, relation)?;
                let sql = Sql::raw("DELETE FROM ")
                    .append_raw(&ctx.dialect.quote_ident(&junction.table))
                    .append_raw(" WHERE ")
                    .append_raw(&ctx.dialect.quote_ident(&junction.parent_column))
                    .append_raw(" = ")
                    .append(parent_sub(&junction.parent_id_column)?);
                builder.push(format!("{}.{}#clear", model.name, relation.name), sql, Vec::new());
            }
            NestedWriteOp::Disconnect(_) | NestedWriteOp::Set(_) | NestedWriteOp::Delete(_)
                if !relation.kind.is_many_to_many() =>
            {
                let pairs = ctx.schema.linking_columns(model, relation)?;

                let link_condition = |ctx: &Context<'_>| -> Result<Sql> {
                    let conditions = pairs
                        .iter()
                        .map(|(parent_column, child_column)| {
                            parent_sub(parent_column).map(|sub| {
                                column_ref(ctx, target.db_name(), child_column)
                                    .append_raw(" = ")
                                    .append(sub)
                            })
                        })
                        .collect::<Result<Vec<_>>>()?;
                    Ok(Sql::join(conditions, " AND "))
                };

                if matches!(op, NestedWriteOp::Delete(_)) {
                    let mut condition = link_condition(ctx)?;
                    if let NestedWriteOp::Delete(Some(unique)) = op {
                        condition = condition
                            .append_raw(" AND ")
                            .append(unique_where(target, unique, ctx)?);
                    }
                    let sql = Sql::raw("DELETE FROM ")
                        .append(table_name(ctx, target))
                        .append_raw(" WHERE ")
                        .append(condition);
                    builder.push(format!("{}.{}#delete", model.name, relation.name), sql, Vec::new());
                } else {
                    // Disconnect / clear: null out the child FK.
                    let mut null_args = WriteArgs::default();
                    for (_, child_column) in &pairs {
                        let field = target
                            .scalar_fields()
                            .find(|f| f.db_name() == child_column.as_str())
                            .ok_or_else(|| {
                                Error::schema(format!(
                                    "relation `{}` references unknown column `{child_column}`",
                                    relation.name
                                ))
                            })?;
                        if !field.is_nullable() {
                            return Err(Error::schema(format!(
                                "cannot disconnect required relation through `{}.{}`",
                                target.name, field.name,
                            )));
                        }
                        null_args.insert(field.name.clone(), WriteOperation::Set(Value::Null));
                    }

                    let mut condition = link_condition(ctx)?;
                    if let NestedWriteOp::Disconnect(Some(unique)) = op {
                        condition = condition
                            .append_raw(" AND ")
                            .append(unique_where(target, unique, ctx)?);
                    }

                    let sql = update_record(target, condition, &null_args, None, ctx)?;
                    builder.push(
                        format!("{}.{}#detach", model.name, relation.name),
                        sql,
                        Vec::new(),
                    );
                }
            }
            NestedWriteOp::DeleteMany(filter) if relation.kind.is_many_to_many() => {
                let junction = ctx.schema.junction_info(model, relation)?;
                let mut condition = Sql::raw(format!(
                    "EXISTS (SELECT 1 FROM {} WHERE {} = ",
                    ctx.dialect.quote_ident(&junction.table),
                    ctx.dialect.quote_ident(&junction.child_column),
                ))
                .append(column_ref(ctx, target.db_name(), &junction.child_id_column))
                .append_raw(&format!(
                    " AND {} = ",
                    ctx.dialect.quote_ident(&junction.parent_column)
                ))
                .append(parent_sub(&junction.parent_id_column)?)
                .append_raw(")");

                if let Some(filter) = filter {
                    let built =
                        filter_builder::build_filter(filter, target, target.db_name(), ctx)?;
                    if !built.is_empty() {
                        condition = condition.append_raw(" AND ").append(built);
                    }
                }

                let sql = Sql::raw("DELETE FROM ")
                    .append(table_name(ctx, target))
                    .append_raw(" WHERE ")
                    .append(condition);
                builder.push(format!("{}.{}#deleteMany", model.name, relation.name), sql, Vec::new());
            }
            NestedWriteOp::DeleteMany(filter) => {
                let pairs = ctx.schema.linking_columns(model, relation)?;
                let mut conditions = pairs
                    .iter()
                    .map(|(parent_column, child_column)| {
                        parent_sub(parent_column).map(|sub| {
                            column_ref(ctx, target.db_name(), child_column)
                                .append_raw(" = ")
                                .append(sub)
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;

                if let Some(filter) = filter {
                    let built =
                        filter_builder::build_filter(filter, target, target.db_name(), ctx)?;
                    if !built.is_empty() {
                        conditions.push(built);
                    }
                }

                let sql = Sql::raw("DELETE FROM ")
                    .append(table_name(ctx, target))
                    .append_raw(" WHERE ")
                    .append(Sql::join(conditions, " AND "));
                builder.push(format!("{}.{}#deleteMany", model.name, relation.name), sql, Vec::new());
            }
            _ => {}
        }
    }

    Ok(())
}

/// Post-update phase: nested `update`, `updateMany` and `upsert`.
fn mutate_children(
    model: &Model,
    relation: &Relation,
    ops: &[NestedWriteOp],
    parent_label: &str,
    builder: &mut PlanBuilder<'_, '_>,
) -> Result<()> {
    let ctx = builder.ctx;
    let target = ctx.schema.target_of(relation)?;
    let child_label = format!("{parent_label}.{}", relation.name);

    let link_condition = |ctx: &Context<'_>| -> Result<Sql> {
        if relation.kind.is_many_to_many() {
            let junction = ctx.schema.junction_info(model, relation)?;
            return Ok(Sql::raw(format!(
                "EXISTS (SELECT 1 FROM {} WHERE {} = ",
                ctx.dialect.quote_ident(&junction.table),
                ctx.dialect.quote_ident(&junction.child_column),
            ))
            .append(column_ref(ctx, target.db_name(), &junction.child_id_column))
            .append_raw(&format!(
                " AND {} = ",
                ctx.dialect.quote_ident(&junction.parent_column)
            ))
            .append_parameter(placeholder(parent_label, &junction.parent_id_column))
            .append_raw(")"));
        }

        let pairs = ctx.schema.linking_columns(model, relation)?;
        let conditions = pairs.into_iter().map(|(parent_column, child_column)| {
            column_ref(ctx, target.db_name(), &child_column)
                .append_raw(" = ")
                .append_parameter(placeholder(parent_label, &parent_column))
        });
        Ok(Sql::join(conditions, " AND "))
    };

    for op in ops {
        match op {
            NestedWriteOp::Update { filter, data } => {
                if data.has_nested() {
                    return Err(Error::internal(
                        "deeply nested writes inside nested `update` are not supported",
                    ));
                }
                let mut condition = link_condition(ctx)?;
                if let Some(unique) = filter {
                    condition = condition
                        .append_raw(" AND ")
                        .append(unique_where(target, unique, ctx)?);
                }
                let sql = update_record(target, condition, &data.scalars, None, ctx)?;
                builder.push(format!("{child_label}#update"), sql, Vec::new());
            }
            NestedWriteOp::UpdateMany { filter, data } => {
                let mut condition = link_condition(ctx)?;
                if let Some(filter) = filter {
                    let built =
                        filter_builder::build_filter(filter, target, target.db_name(), ctx)?;
                    if !built.is_empty() {
                        condition = condition.append_raw(" AND ").append(built);
                    }
                }
                let sql = update_record(target, condition, data, None, ctx)?;
                builder.push(format!("{child_label}#updateMany"), sql, Vec::new());
            }
            NestedWriteOp::Upsert {
                filter,
                create,
                update,
            } => {
                if filter.fields.is_empty() {
                    return Err(Error::internal(
                        "nested to-one `upsert` requires a `where`",
                    ));
                }
                if create.has_nested() || update.has_nested() {
                    return Err(Error::internal(
                        "deeply nested writes inside nested `upsert` are not supported",
                    ));
                }

                let mut create_args = create.scalars.clone();
                if !relation.kind.is_many_to_many() {
                    let pairs = ctx.schema.linking_columns(model, relation)?;
                    for (parent_column, child_column) in pairs {
                        let field = target
                            .scalar_fields()
                            .find(|f| f.db_name() == child_column)
                            .ok_or_else(|| {
                                Error::schema(format!(
                                    "relation `{}` references unknown column `{child_column}`",
                                    relation.name
                                ))
                            })?;
                        create_args.insert(
                            field.name.clone(),
                            WriteOperation::Set(placeholder(parent_label, &parent_column)),
                        );
                    }
                }

                let sql =
                    native_upsert(target, filter, &create_args, &update.scalars, None, ctx)?;
                builder.push(format!("{child_label}#upsert"), sql, Vec::new());
            }
            _ => {}
        }
    }

    Ok(())
}

/// Plan an `upsert` with nested writes: the native upsert first, then the
/// create-side attachments referencing its returned columns.
pub(crate) fn plan_upsert(
    model: &Model,
    unique: &UniqueFilter,
    create: &WriteData,
    update: &WriteData,
    ctx: &Context<'_>,
) -> Result<WritePlan> {
    if update.has_nested() {
        return Err(Error::internal(
            "nested writes in `upsert.update` are not supported",
        ));
    }

    let mut builder = PlanBuilder {
        ctx,
        steps: Vec::new(),
        phase: PlanPhase::InitializingChildren,
    };
    let label = model.name.clone();

    let (owning, inverse) = split_nested(model, create)?;
    let mut create_args = create.scalars.clone();
    for nested in &owning {
        let relation = model.find_relation(&nested.relation)?;
        resolve_owning_side(model, relation, &nested.ops, &label, &mut create_args, &mut builder)
            .map_err(|e| e.nested(&nested.relation))?;
    }

    builder.phase = PlanPhase::InsertingParent;
    let returning = parent_returning(model, &inverse, ctx.schema)?;
    let sql = {
        let returning_sql = if ctx.dialect.supports(Capability::Returning) && !returning.is_empty() {
            Some(Sql::raw(
                returning
                    .iter()
                    .map(|c| ctx.dialect.quote_ident(c))
                    .collect::<Vec<_>>()
                    .join(", "),
            ))
        } else {
            None
        };

        let pairs = insert_pairs(model, &create_args, ctx)?;
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

        let columns = Sql::raw(
            pairs
                .iter()
                .map(|(c, _)| ctx.dialect.quote_ident(c))
                .collect::<Vec<_>>()
                .join(", "),
        );
        let values = Sql::join(
            pairs.iter().map(|(_, v)| Sql::parameter(v.clone())),
            ", ",
        );

        ctx.dialect.upsert(sql_dialect::UpsertParts {
            table: table_name(ctx, model),
            columns,
            values,
            conflict_target,
            set: set_clause(model, &update.scalars, ctx)?,
            returning: returning_sql,
        })
    };
    builder.push(&label, sql, returning);

    builder.phase = PlanPhase::AttachingChildren;
    for nested in &inverse {
        let relation = model.find_relation(&nested.relation)?;
        attach_children(model, relation, &nested.ops, &label, &mut builder)
            .map_err(|e| e.nested(&nested.relation))?;
    }

    builder.phase = PlanPhase::Done;
    Ok(WritePlan {
        steps: builder.steps,
    })
}
