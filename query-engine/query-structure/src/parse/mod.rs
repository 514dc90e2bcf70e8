//! Payload parsing: turns the dynamic JSON payload tree into the typed query
//! IR, validating shapes, field references and operator/type compatibility.
//!
//! Every operation accepts a fixed set of top-level keys; unknown keys are
//! `ShapeError`s rather than silently ignored.

mod filter;
mod order;
mod selection;
mod value;
mod write;

pub(crate) use value::{coerce_element, coerce_field_value};

use crate::arguments::{QueryArguments, UniqueFilter};
use crate::error::{Error, Result};
use crate::filter::GroupFilter;
use crate::operation::Operation;
use crate::schema::{Model, ModelSet};
use crate::selection::{AggregationSelection, FieldSelection};
use crate::write::{WriteArgs, WriteData};
use serde_json::Value as JsonValue;

/// The typed form of one operation payload. Fields are populated according
/// to the operation; e.g. `data` only for `create`/`update`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedPayload {
    pub args: QueryArguments,
    /// The unique criteria, for operations that require a unique `where`.
    pub unique_filter: Option<UniqueFilter>,
    pub selection: FieldSelection,
    pub data: Option<WriteData>,
    pub create_data: Option<WriteData>,
    pub update_data: Option<WriteData>,
    pub many_data: Vec<WriteArgs>,
    pub skip_duplicates: bool,
    pub aggregates: Vec<AggregationSelection>,
    pub by: Vec<String>,
    pub having: Option<GroupFilter>,
}

struct Parser<'a> {
    schema: &'a ModelSet,
    path: Vec<String>,
}

impl<'a> Parser<'a> {
    fn shape_error(&self, message: impl Into<String>) -> Error {
        Error::Shape {
            message: message.into(),
            path: self.path.clone(),
        }
    }

    fn scoped<T>(&mut self, key: &str, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.path.push(key.to_owned());
        let result = f(self);
        self.path.pop();
        result
    }

    fn expect_object<'j>(
        &self,
        json: &'j JsonValue,
    ) -> Result<&'j serde_json::Map<String, JsonValue>> {
        json.as_object()
            .ok_or_else(|| self.shape_error(format!("expected an object, got {}", json_kind(json))))
    }
}

fn json_kind(json: &JsonValue) -> &'static str {
    match json {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}

/// Parse one operation payload against a model.
pub fn parse_payload(
    schema: &ModelSet,
    model: &Model,
    operation: Operation,
    payload: &JsonValue,
) -> Result<ParsedPayload> {
    let mut parser = Parser {
        schema,
        path: Vec::new(),
    };

    let object = parser.expect_object(payload)?;

    let allowed = allowed_keys(operation);
    for key in object.keys() {
        if !allowed.contains(&key.as_str()) {
            return Err(parser.shape_error(format!(
                "unknown key `{key}` for `{}` on `{}`",
                operation.name(),
                model.name,
            )));
        }
    }

    let mut parsed = ParsedPayload::default();

    // `where`: either a generic filter or a unique criteria plus remainder.
    if operation.requires_unique_where() {
        let where_json = object.get("where").ok_or_else(|| {
            parser.shape_error(format!("`{}` requires `where`", operation.name()))
        })?;
        let (unique, extra) = parser.scoped("where", |p| {
            filter::parse_where_unique(p, model, where_json, operation)
        })?;
        parsed.unique_filter = Some(unique);
        parsed.args.filter = extra;
    } else if let Some(where_json) = object.get("where") {
        let filter = parser.scoped("where", |p| filter::parse_filter(p, model, where_json))?;
        parsed.args.filter = (!filter.is_empty()).then_some(filter);
    }

    if let Some(order_json) = object.get("orderBy") {
        let allow_aggregates = matches!(operation, Operation::Aggregate | Operation::GroupBy);
        parsed.args.order_by = parser.scoped("orderBy", |p| {
            order::parse_order_by(p, model, order_json, allow_aggregates)
        })?;
    }

    if let Some(take) = object.get("take") {
        parsed.args.take = Some(parser.scoped("take", |p| parse_int(p, take))?);
    }
    if let Some(skip) = object.get("skip") {
        parsed.args.skip = Some(parser.scoped("skip", |p| parse_int(p, skip))?);
    }

    if let Some(cursor) = object.get("cursor") {
        let (unique, extra) = parser.scoped("cursor", |p| {
            filter::parse_where_unique(p, model, cursor, operation)
        })?;
        if extra.is_some() {
            return Err(parser.shape_error("`cursor` accepts only unique criteria fields"));
        }
        parsed.args.cursor = Some(unique);
    }

    if let Some(distinct) = object.get("distinct") {
        parsed.args.distinct = parser.scoped("distinct", |p| parse_distinct(p, model, distinct))?;
    }

    parsed.selection = selection::parse_projection(
        &mut parser,
        model,
        object.get("select"),
        object.get("include"),
    )?;

    match operation {
        Operation::Create => {
            let data = object
                .get("data")
                .ok_or_else(|| parser.shape_error("`create` requires `data`"))?;
            parsed.data = Some(parser.scoped("data", |p| write::parse_create_data(p, model, data))?);
        }
        Operation::CreateMany => {
            let data = object
                .get("data")
                .ok_or_else(|| parser.shape_error("`createMany` requires `data`"))?;
            parsed.many_data = parser.scoped("data", |p| write::parse_create_many(p, model, data))?;
            if let Some(skip) = object.get("skipDuplicates") {
                parsed.skip_duplicates = skip.as_bool().ok_or_else(|| {
                    parser.shape_error("`skipDuplicates` must be a boolean")
                })?;
            }
        }
        Operation::Update | Operation::UpdateMany => {
            let data = object
                .get("data")
                .ok_or_else(|| parser.shape_error(format!("`{}` requires `data`", operation.name())))?;
            parsed.data = Some(parser.scoped("data", |p| write::parse_update_data(p, model, data))?);
        }
        Operation::Upsert => {
            let create = object
                .get("create")
                .ok_or_else(|| parser.shape_error("`upsert` requires `create`"))?;
            let update = object
                .get("update")
                .ok_or_else(|| parser.shape_error("`upsert` requires `update`"))?;
            parsed.create_data =
                Some(parser.scoped("create", |p| write::parse_create_data(p, model, create))?);
            parsed.update_data =
                Some(parser.scoped("update", |p| write::parse_update_data(p, model, update))?);
        }
        Operation::Aggregate => {
            parsed.aggregates = selection::parse_aggregations(&mut parser, model, object)?;
        }
        Operation::GroupBy => {
            let by = object
                .get("by")
                .ok_or_else(|| parser.shape_error("`groupBy` requires `by`"))?;
            parsed.by = parser.scoped("by", |p| parse_by(p, model, by))?;
            parsed.aggregates = selection::parse_aggregations(&mut parser, model, object)?;

            if let Some(having) = object.get("having") {
                parsed.having = Some(parser.scoped("having", |p| {
                    filter::parse_group_filter(p, model, &parsed.by, having)
                })?);
            }

            // Scalar orderings must group; aggregates are free.
            for entry in &parsed.args.order_by {
                if let crate::order_by::OrderByTarget::Scalar(field) = &entry.target {
                    if !parsed.by.contains(field) {
                        return Err(parser.shape_error(format!(
                            "`orderBy` field `{field}` must appear in `by`",
                        )));
                    }
                }
            }
        }
        _ => {}
    }

    Ok(parsed)
}

fn allowed_keys(operation: Operation) -> &'static [&'static str] {
    match operation {
        Operation::FindMany | Operation::FindFirst | Operation::FindFirstOrThrow => &[
            "where", "orderBy", "take", "skip", "cursor", "distinct", "select", "include",
        ],
        Operation::FindUnique | Operation::FindUniqueOrThrow => &["where", "select", "include"],
        Operation::Create => &["data", "select", "include"],
        Operation::CreateMany => &["data", "skipDuplicates"],
        Operation::Update => &["where", "data", "select", "include"],
        Operation::UpdateMany => &["where", "data"],
        Operation::Upsert => &["where", "create", "update", "select", "include"],
        Operation::Delete => &["where", "select", "include"],
        Operation::DeleteMany => &["where"],
        Operation::Count => &["where", "take", "skip"],
        Operation::Aggregate => &[
            "where", "orderBy", "take", "skip", "cursor", "_count", "_sum", "_avg", "_min", "_max",
        ],
        Operation::GroupBy => &[
            "by", "where", "having", "orderBy", "take", "skip", "_count", "_sum", "_avg", "_min",
            "_max",
        ],
        Operation::Exist => &["where"],
    }
}

fn parse_int(parser: &Parser<'_>, json: &JsonValue) -> Result<i64> {
    json.as_i64()
        .ok_or_else(|| parser.shape_error(format!("expected an integer, got {}", json_kind(json))))
}

fn parse_distinct(parser: &mut Parser<'_>, model: &Model, json: &JsonValue) -> Result<Vec<String>> {
    let names: Vec<&str> = match json {
        JsonValue::String(s) => vec![s.as_str()],
        JsonValue::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .ok_or_else(|| parser.shape_error("`distinct` entries must be field names"))
            })
            .collect::<Result<_>>()?,
        other => {
            return Err(parser.shape_error(format!(
                "`distinct` must be a field name or array, got {}",
                json_kind(other)
            )))
        }
    };

    names
        .into_iter()
        .map(|name| model.find_field(name).map(|f| f.name.clone()))
        .collect()
}

fn parse_by(parser: &mut Parser<'_>, model: &Model, json: &JsonValue) -> Result<Vec<String>> {
    let fields = parse_distinct(parser, model, json)?;
    if fields.is_empty() {
        return Err(parser.shape_error("`by` must name at least one field"));
    }
    Ok(fields)
}
