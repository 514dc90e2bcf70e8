//! The query planner: translates parsed query payloads into parameterized
//! SQL for the configured dialect.
//!
//! The planner is synchronous and pure. Given the same schema, payload and
//! dialect it produces bit-identical output; it performs no IO and mutates
//! none of its inputs. One statement comes out per root operation — nested
//! relation reads fold into JSON-aggregated correlated subqueries — except
//! for nested writes, which become an ordered [`WritePlan`].

mod context;
mod cursor_condition;
mod filter;
mod limit;
mod model_extensions;
mod nested_aggregations;
mod ordering;
mod read;
mod select;
mod update;
mod write;
mod write_plan;

pub use context::Context;
pub use write_plan::{PlanPhase, WritePlan, WriteStep};

pub use query_template::{PlaceholderStyle, Sql};

use query_structure::{parse_payload, Error, ModelSet, Operation, Result};
use sql_dialect::Dialect;

/// Translate one operation payload into a single SQL statement.
///
/// Write operations whose `data` carries nested relation writes cannot
/// collapse into one statement; route those through [`plan_nested_write`].
pub fn parse(
    schema: &ModelSet,
    model_name: &str,
    operation: Operation,
    payload: &serde_json::Value,
    dialect: &dyn Dialect,
) -> Result<Sql> {
    let model = schema.model(model_name)?;
    let parsed = parse_payload(schema, model, operation, payload)?;
    let ctx = Context::new(schema, dialect);

    tracing::debug!(
        model = model.name.as_str(),
        operation = operation.name(),
        "building statement"
    );

    let requires_plan = |has_nested: bool| {
        if has_nested {
            Err(Error::shape(
                format!(
                    "`{}` with nested writes produces a write plan; use `plan_nested_write`",
                    operation.name()
                ),
                &["data"],
            ))
        } else {
            Ok(())
        }
    };

    match operation {
        Operation::FindMany => read::get_records(model, &parsed, false, &ctx),
        Operation::FindFirst
        | Operation::FindFirstOrThrow
        | Operation::FindUnique
        | Operation::FindUniqueOrThrow => read::get_records(model, &parsed, true, &ctx),
        Operation::Exist => read::exist(model, &parsed, &ctx),
        Operation::Count => read::count(model, &parsed, &ctx),
        Operation::Aggregate => read::aggregate(model, &parsed, &ctx),
        Operation::GroupBy => read::group_by(model, &parsed, &ctx),
        Operation::Create => {
            let data = parsed.data.as_ref().expect("create payload carries data");
            requires_plan(data.has_nested())?;
            write::create_record(model, &data.scalars, Some(&parsed.selection), &ctx)
        }
        Operation::CreateMany => {
            write::create_many_records(model, &parsed.many_data, parsed.skip_duplicates, &ctx)
        }
        Operation::Update => {
            let data = parsed.data.as_ref().expect("update payload carries data");
            requires_plan(data.has_nested())?;
            let condition = write_condition(&parsed, model, &ctx)?;
            update::update_record(model, condition, &data.scalars, Some(&parsed.selection), &ctx)
        }
        Operation::UpdateMany => {
            let data = parsed.data.as_ref().expect("updateMany payload carries data");
            requires_plan(data.has_nested())?;
            update::update_many_records(model, parsed.args.filter.as_ref(), &data.scalars, &ctx)
        }
        Operation::Upsert => {
            let create = parsed.create_data.as_ref().expect("upsert payload carries create");
            let update = parsed.update_data.as_ref().expect("upsert payload carries update");
            requires_plan(create.has_nested() || update.has_nested())?;
            let unique = parsed.unique_filter.as_ref().expect("upsert requires unique where");
            write::native_upsert(
                model,
                unique,
                &create.scalars,
                &update.scalars,
                Some(&parsed.selection),
                &ctx,
            )
        }
        Operation::Delete => {
            let condition = write_condition(&parsed, model, &ctx)?;
            write::delete_record(model, condition, Some(&parsed.selection), &ctx)
        }
        Operation::DeleteMany => {
            write::delete_many_records(model, parsed.args.filter.as_ref(), &ctx)
        }
    }
}

/// Plan a `create`/`update`/`upsert` whose data may carry nested relation
/// writes into a dependency-ordered statement list.
pub fn plan_nested_write(
    schema: &ModelSet,
    model_name: &str,
    operation: Operation,
    payload: &serde_json::Value,
    dialect: &dyn Dialect,
) -> Result<WritePlan> {
    let model = schema.model(model_name)?;
    let parsed = parse_payload(schema, model, operation, payload)?;
    let ctx = Context::new(schema, dialect);

    match operation {
        Operation::Create => {
            let data = parsed.data.as_ref().expect("create payload carries data");
            write_plan::plan_create(model, data, &ctx)
        }
        Operation::Update => {
            let data = parsed.data.as_ref().expect("update payload carries data");
            let unique = parsed.unique_filter.as_ref().expect("update requires unique where");
            write_plan::plan_update(model, unique, data, &ctx)
        }
        Operation::Upsert => {
            let create = parsed.create_data.as_ref().expect("upsert payload carries create");
            let update = parsed.update_data.as_ref().expect("upsert payload carries update");
            let unique = parsed.unique_filter.as_ref().expect("upsert requires unique where");
            write_plan::plan_upsert(model, unique, create, update, &ctx)
        }
        other => Err(Error::shape(
            format!("`{}` does not produce a write plan", other.name()),
            &[],
        )),
    }
}

/// The WHERE condition of a unique write: the unique criteria plus any
/// additional filters given alongside it.
fn write_condition(
    parsed: &query_structure::ParsedPayload,
    model: &query_structure::Model,
    ctx: &Context<'_>,
) -> Result<Sql> {
    let unique = parsed
        .unique_filter
        .as_ref()
        .expect("unique write operations carry a unique filter");

    let mut condition = write::unique_where(model, unique, ctx)?;
    if let Some(extra) = &parsed.args.filter {
        let built = filter::build_filter(extra, model, model.db_name(), ctx)?;
        if !built.is_empty() {
            condition = condition.append_raw(" AND ").append(built);
        }
    }
    Ok(condition)
}
