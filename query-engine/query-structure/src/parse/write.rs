use super::value::coerce_field_value;
use super::{filter, json_kind, Parser};
use crate::error::{Error, Result};
use crate::schema::{Field, Model, Relation, ScalarKind};
use crate::write::{NestedWrite, NestedWriteOp, WriteArgs, WriteData, WriteOperation};
use serde_json::Value as JsonValue;

/// Parse `create.data`: scalar assignments plus nested relation creates and
/// connects.
pub(super) fn parse_create_data(
    parser: &mut Parser<'_>,
    model: &Model,
    json: &JsonValue,
) -> Result<WriteData> {
    parse_write_data(parser, model, json, WriteContext::Create)
}

/// Parse `update.data`: scalar update operations plus the full nested write
/// surface.
pub(super) fn parse_update_data(
    parser: &mut Parser<'_>,
    model: &Model,
    json: &JsonValue,
) -> Result<WriteData> {
    parse_write_data(parser, model, json, WriteContext::Update)
}

/// `createMany.data` is an array of scalar-only rows; nested writes are not
/// exposed there.
pub(super) fn parse_create_many(
    parser: &mut Parser<'_>,
    model: &Model,
    json: &JsonValue,
) -> Result<Vec<WriteArgs>> {
    let rows = match json {
        JsonValue::Array(items) => items.iter().collect::<Vec<_>>(),
        JsonValue::Object(_) => vec![json],
        other => {
            return Err(parser.shape_error(format!(
                "`createMany.data` must be an object or array, got {}",
                json_kind(other)
            )))
        }
    };

    rows.into_iter()
        .map(|row| {
            let data = parse_write_data(parser, model, row, WriteContext::CreateMany)?;
            Ok(data.scalars)
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum WriteContext {
    Create,
    CreateMany,
    Update,
}

fn parse_write_data(
    parser: &mut Parser<'_>,
    model: &Model,
    json: &JsonValue,
    context: WriteContext,
) -> Result<WriteData> {
    let object = parser.expect_object(json)?;
    let mut data = WriteData::default();

    for (key, value) in object {
        if let Ok(field) = model.find_field(key) {
            let op = parser.scoped(key, |p| parse_scalar_write(p, field, value, context))?;
            data.scalars.insert(field.name.clone(), op);
            continue;
        }

        if let Ok(relation) = model.find_relation(key) {
            if context == WriteContext::CreateMany {
                return Err(parser.shape_error(format!(
                    "nested writes are not supported in `createMany` (relation `{key}`)"
                )));
            }
            let nested = parser.scoped(key, |p| parse_nested_write(p, model, relation, value, context))?;
            data.nested.push(nested);
            continue;
        }

        return Err(Error::UnknownField {
            model: model.name.clone(),
            field: key.clone(),
        });
    }

    Ok(data)
}

fn parse_scalar_write(
    parser: &mut Parser<'_>,
    field: &Field,
    json: &JsonValue,
    context: WriteContext,
) -> Result<WriteOperation> {
    // Bare values assign; JSON fields always take the bare form.
    if !json.is_object() || field.kind == ScalarKind::Json {
        let value = coerce_field_value(parser, field, json)?;
        return Ok(WriteOperation::Set(value));
    }

    let object = parser.expect_object(json)?;
    if object.len() != 1 {
        return Err(parser.shape_error(format!(
            "write operation for `{}` takes exactly one operator",
            field.name
        )));
    }

    let (op, value) = object.iter().next().unwrap();

    let numeric = || -> Result<()> {
        if !field.kind.is_numeric() {
            return Err(parser.shape_error(format!(
                "`{op}` requires a numeric field, `{}` is {}",
                field.name,
                field.kind.name()
            )));
        }
        Ok(())
    };
    let list = || -> Result<()> {
        if !field.is_list() {
            return Err(parser.shape_error(format!(
                "`{op}` requires a list field, `{}` is not a list",
                field.name
            )));
        }
        Ok(())
    };

    let operation = match op.as_str() {
        "set" => WriteOperation::Set(coerce_field_value(parser, field, value)?),
        "increment" => {
            numeric()?;
            WriteOperation::Increment(coerce_field_value(parser, field, value)?)
        }
        "decrement" => {
            numeric()?;
            WriteOperation::Decrement(coerce_field_value(parser, field, value)?)
        }
        "multiply" => {
            numeric()?;
            WriteOperation::Multiply(coerce_field_value(parser, field, value)?)
        }
        "divide" => {
            numeric()?;
            WriteOperation::Divide(coerce_field_value(parser, field, value)?)
        }
        "push" => {
            list()?;
            WriteOperation::Push(coerce_push_value(parser, field, value)?)
        }
        "unshift" => {
            list()?;
            WriteOperation::Unshift(coerce_push_value(parser, field, value)?)
        }
        other => {
            return Err(parser.shape_error(format!(
                "unknown write operator `{other}` for field `{}`",
                field.name
            )))
        }
    };

    if context != WriteContext::Update && !matches!(operation, WriteOperation::Set(_)) {
        return Err(parser.shape_error(format!(
            "`{op}` is only valid in updates (field `{}`)",
            field.name
        )));
    }

    Ok(operation)
}

/// `push`/`unshift` accept an element or a list of elements.
fn coerce_push_value(parser: &mut Parser<'_>, field: &Field, json: &JsonValue) -> Result<model_value::Value> {
    if json.is_array() {
        coerce_field_value(parser, field, json)
    } else {
        super::value::coerce_element(parser, field, json)
    }
}

fn parse_nested_write(
    parser: &mut Parser<'_>,
    model: &Model,
    relation: &Relation,
    json: &JsonValue,
    context: WriteContext,
) -> Result<NestedWrite> {
    let target = parser.schema.target_of(relation)?.clone();
    let to_many = !relation.kind.is_to_one();
    let object = parser.expect_object(json)?;

    let mut ops = Vec::with_capacity(object.len());

    for (key, value) in object {
        let parsed: Result<Vec<NestedWriteOp>> = parser.scoped(key, |p| match key.as_str() {
            "create" => each_object(p, value, |p, item| {
                parse_create_data(p, &target, item).map(NestedWriteOp::Create)
            }),
            "connect" => each_object(p, value, |p, item| {
                parse_unique(p, &target, item).map(NestedWriteOp::Connect)
            }),
            "connectOrCreate" => each_object(p, value, |p, item| {
                let map = p.expect_object(item)?;
                let where_json = map
                    .get("where")
                    .ok_or_else(|| p.shape_error("`connectOrCreate` requires `where`"))?;
                let create_json = map
                    .get("create")
                    .ok_or_else(|| p.shape_error("`connectOrCreate` requires `create`"))?;
                if map.len() > 2 {
                    return Err(p.shape_error("`connectOrCreate` accepts `where` and `create`"));
                }
                Ok(NestedWriteOp::ConnectOrCreate {
                    filter: parse_unique(p, &target, where_json)?,
                    create: parse_create_data(p, &target, create_json)?,
                })
            }),
            "disconnect" if context == WriteContext::Update => match (to_many, value) {
                (false, JsonValue::Bool(true)) => Ok(vec![NestedWriteOp::Disconnect(None)]),
                (false, other) => Err(p.shape_error(format!(
                    "to-one `disconnect` takes `true`, got {}",
                    json_kind(other)
                ))),
                (true, _) => each_object(p, value, |p, item| {
                    parse_unique(p, &target, item).map(|u| NestedWriteOp::Disconnect(Some(u)))
                }),
            },
            "delete" if context == WriteContext::Update => match (to_many, value) {
                (false, JsonValue::Bool(true)) => Ok(vec![NestedWriteOp::Delete(None)]),
                (false, other) => Err(p.shape_error(format!(
                    "to-one `delete` takes `true`, got {}",
                    json_kind(other)
                ))),
                (true, _) => each_object(p, value, |p, item| {
                    parse_unique(p, &target, item).map(|u| NestedWriteOp::Delete(Some(u)))
                }),
            },
            "update" if context == WriteContext::Update => each_object(p, value, |p, item| {
                let map = p.expect_object(item)?;
                if to_many || map.contains_key("where") && map.contains_key("data") {
                    let where_json = map
                        .get("where")
                        .ok_or_else(|| p.shape_error("nested `update` requires `where`"))?;
                    let data_json = map
                        .get("data")
                        .ok_or_else(|| p.shape_error("nested `update` requires `data`"))?;
                    Ok(NestedWriteOp::Update {
                        filter: Some(parse_unique(p, &target, where_json)?),
                        data: Box::new(parse_update_data(p, &target, data_json)?),
                    })
                } else {
                    // To-one update may take the data object directly.
                    Ok(NestedWriteOp::Update {
                        filter: None,
                        data: Box::new(parse_update_data(p, &target, item)?),
                    })
                }
            }),
            "updateMany" if context == WriteContext::Update && to_many => {
                each_object(p, value, |p, item| {
                    let map = p.expect_object(item)?;
                    let filter = match map.get("where") {
                        Some(where_json) => {
                            let parsed = filter::parse_filter(p, &target, where_json)?;
                            (!parsed.is_empty()).then_some(parsed)
                        }
                        None => None,
                    };
                    let data_json = map
                        .get("data")
                        .ok_or_else(|| p.shape_error("`updateMany` requires `data`"))?;
                    let data = parse_update_data(p, &target, data_json)?;
                    if data.has_nested() {
                        return Err(p.shape_error("`updateMany` data cannot contain nested writes"));
                    }
                    Ok(NestedWriteOp::UpdateMany {
                        filter,
                        data: data.scalars,
                    })
                })
            }
            "upsert" if context == WriteContext::Update => each_object(p, value, |p, item| {
                let map = p.expect_object(item)?;
                let create_json = map
                    .get("create")
                    .ok_or_else(|| p.shape_error("nested `upsert` requires `create`"))?;
                let update_json = map
                    .get("update")
                    .ok_or_else(|| p.shape_error("nested `upsert` requires `update`"))?;
                let filter = match map.get("where") {
                    Some(where_json) => parse_unique(p, &target, where_json)?,
                    None if !to_many => crate::arguments::UniqueFilter { fields: Vec::new() },
                    None => return Err(p.shape_error("nested `upsert` requires `where`")),
                };
                Ok(NestedWriteOp::Upsert {
                    filter,
                    create: parse_create_data(p, &target, create_json)?,
                    update: parse_update_data(p, &target, update_json)?,
                })
            }),
            "set" if context == WriteContext::Update && to_many => {
                let items = each_object(p, value, |p, item| parse_unique(p, &target, item))?;
                Ok(vec![NestedWriteOp::Set(items)])
            }
            "deleteMany" if context == WriteContext::Update && to_many => {
                each_object(p, value, |p, item| {
                    let parsed = filter::parse_filter(p, &target, item)?;
                    Ok(NestedWriteOp::DeleteMany((!parsed.is_empty()).then_some(parsed)))
                })
            }
            other => Err(parser_unknown_nested(p, model, relation, other)),
        });

        ops.extend(parsed?);
    }

    if ops.is_empty() {
        return Err(parser.shape_error(format!(
            "relation write `{}` names no operations",
            relation.name
        )));
    }

    Ok(NestedWrite {
        relation: relation.name.clone(),
        ops,
    })
}

fn parser_unknown_nested(
    parser: &Parser<'_>,
    model: &Model,
    relation: &Relation,
    op: &str,
) -> Error {
    parser.shape_error(format!(
        "unknown nested write `{op}` on relation `{}.{}`",
        model.name, relation.name
    ))
}

/// Apply a parser to a single object or each element of an array.
fn each_object<T>(
    parser: &mut Parser<'_>,
    json: &JsonValue,
    mut f: impl FnMut(&mut Parser<'_>, &JsonValue) -> Result<T>,
) -> Result<Vec<T>> {
    match json {
        JsonValue::Array(items) => items.iter().map(|item| f(parser, item)).collect(),
        JsonValue::Object(_) => Ok(vec![f(parser, json)?]),
        other => Err(parser.shape_error(format!(
            "expected an object or array of objects, got {}",
            json_kind(other)
        ))),
    }
}

fn parse_unique(
    parser: &mut Parser<'_>,
    model: &Model,
    json: &JsonValue,
) -> Result<crate::arguments::UniqueFilter> {
    let (unique, extra) = filter::parse_where_unique(
        parser,
        model,
        json,
        crate::operation::Operation::FindUnique,
    )?;
    if extra.is_some() {
        return Err(parser.shape_error("only unique criteria fields are allowed here"));
    }
    Ok(unique)
}
