use crate::convert;
use crate::{needle_text, wildcard_pattern, Capability, Dialect, ListPredicate, TextMatch, UpsertParts};
use enumflags2::BitFlags;
use itertools::Itertools;
use model_value::Value;
use query_structure::{
    DefaultValue, Error, Field, GeneratorKind, GeometryOp, JsonPathSegment, Result, ScalarKind,
    VectorMetric,
};
use query_template::Sql;
use sql_connection::SqlFamily;

/// SQLite. `RETURNING` is available, everything else is emulated: lists and
/// JSON live in TEXT columns and are taken apart with the `json_*`
/// functions. Vector and geospatial operators are not available.
#[derive(Debug)]
pub struct SqliteDialect;

impl SqliteDialect {
    fn json_path(path: &[JsonPathSegment]) -> String {
        let mut out = String::from("$");
        for segment in path {
            match segment {
                JsonPathSegment::Key(key) => {
                    out.push('.');
                    out.push_str(key);
                }
                JsonPathSegment::Index(idx) => out.push_str(&format!("[{idx}]")),
            }
        }
        out
    }
}

impl Dialect for SqliteDialect {
    fn family(&self) -> SqlFamily {
        SqlFamily::Sqlite
    }

    fn capabilities(&self) -> BitFlags<Capability> {
        Capability::Returning | Capability::TransactionalDdl
    }

    fn quote_ident(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    fn map_type(&self, field: &Field, _enum_values: Option<&[String]>) -> Result<String> {
        if let Some(native) = field.native_type_for(SqlFamily::Sqlite) {
            return Ok(native.to_owned());
        }

        if field.is_list() {
            return Ok("TEXT".to_owned());
        }

        let tpe = match field.kind {
            ScalarKind::String | ScalarKind::Enum | ScalarKind::Json => "TEXT",
            ScalarKind::Int => "INTEGER",
            ScalarKind::Float => "REAL",
            ScalarKind::Decimal => "DECIMAL",
            ScalarKind::BigInt => "BIGINT",
            ScalarKind::Boolean => "BOOLEAN",
            ScalarKind::DateTime => "DATETIME",
            ScalarKind::Date => "DATE",
            ScalarKind::Time => "TIME",
            ScalarKind::Bytes => "BLOB",
            ScalarKind::Vector | ScalarKind::Point => {
                return Err(Error::FeatureNotSupported {
                    feature: format!("{} columns on SQLite", field.kind.name()),
                })
            }
        };

        Ok(tpe.to_owned())
    }

    fn render_default(&self, _field: &Field, default: &DefaultValue) -> Option<String> {
        match default {
            DefaultValue::Value(value) => convert::default_literal(value),
            DefaultValue::Generator(GeneratorKind::Now | GeneratorKind::UpdatedAt) => {
                Some("CURRENT_TIMESTAMP".to_owned())
            }
            DefaultValue::Generator(_) => None,
        }
    }

    fn text_match(
        &self,
        column: Sql,
        op: TextMatch,
        needle: Value,
        insensitive: bool,
        negated: bool,
    ) -> Sql {
        let pattern = Value::String(wildcard_pattern(op, &needle_text(&needle)));
        let not = if negated { " NOT" } else { "" };

        // SQLite LIKE is already case-insensitive for ASCII; the LOWER form
        // keeps behavior consistent across drivers.
        if insensitive {
            Sql::raw("LOWER(")
                .append(column)
                .append_raw(&format!("){not} LIKE LOWER("))
                .append_parameter(pattern)
                .append_raw(")")
        } else {
            column
                .append_raw(&format!("{not} LIKE "))
                .append_parameter(pattern)
        }
    }

    fn json_extract(&self, column: Sql, path: &[JsonPathSegment], as_text: bool) -> Sql {
        // json_extract returns SQL text for JSON strings already; the JSON
        // form goes through json().
        let extract = Sql::raw("json_extract(")
            .append(column)
            .append_raw(", ")
            .append_parameter(Value::String(Self::json_path(path)))
            .append_raw(")");

        if as_text {
            extract
        } else {
            Sql::raw("json(").append(extract).append_raw(")")
        }
    }

    fn json_param(&self, value: Value) -> Sql {
        // Normalize the bound text through json() so key order and spacing
        // do not break equality.
        Sql::raw("json(").append_parameter(value).append_raw(")")
    }

    fn json_array_contains(&self, column: Sql, value: Value, negated: bool) -> Sql {
        // Element-wise containment through json_each.
        let exists = if negated { "NOT EXISTS" } else { "EXISTS" };
        Sql::raw(format!(
            "{exists} (SELECT 1 FROM json_each("
        ))
        .append(column)
        .append_raw(") WHERE json_each.value = ")
        .append_parameter(value)
        .append_raw(")")
    }

    fn json_array_edge(&self, column: Sql, last: bool) -> Sql {
        if last {
            Sql::raw("json_extract(")
                .append(column.clone())
                .append_raw(", '$[' || (json_array_length(")
                .append(column)
                .append_raw(") - 1) || ']')")
        } else {
            Sql::raw("json_extract(")
                .append(column)
                .append_raw(", '$[0]')")
        }
    }

    fn list_predicate(&self, column: Sql, predicate: ListPredicate, _field: &Field) -> Result<Sql> {
        Ok(match predicate {
            ListPredicate::Has(value) => Sql::raw("EXISTS (SELECT 1 FROM json_each(")
                .append(column)
                .append_raw(") WHERE json_each.value = ")
                .append_parameter(value)
                .append_raw(")"),
            ListPredicate::HasEvery(values) => {
                let needle = Value::Json(Value::List(values).to_json());
                Sql::raw("NOT EXISTS (SELECT 1 FROM json_each(")
                    .append_parameter(needle)
                    .append_raw(") WHERE json_each.value NOT IN (SELECT value FROM json_each(")
                    .append(column)
                    .append_raw(")))")
            }
            ListPredicate::HasSome(values) => {
                let needle = Value::Json(Value::List(values).to_json());
                Sql::raw("EXISTS (SELECT 1 FROM json_each(")
                    .append_parameter(needle)
                    .append_raw(") WHERE json_each.value IN (SELECT value FROM json_each(")
                    .append(column)
                    .append_raw(")))")
            }
            ListPredicate::IsEmpty(empty) => {
                let check = if empty { " = 0" } else { " > 0" };
                Sql::raw("json_array_length(COALESCE(")
                    .append(column)
                    .append_raw(", json('[]')))")
                    .append_raw(check)
            }
        })
    }

    fn list_append(&self, column: Sql, value: Value, front: bool, _field: &Field) -> Result<Sql> {
        let as_array = match value {
            list @ Value::List(_) => Value::Json(list.to_json()),
            single => Value::Json(serde_json::Value::Array(vec![single.to_json()])),
        };

        // Concatenate two JSON arrays by walking both sides in order.
        let (first, second): (Sql, Sql) = if front {
            (Sql::parameter(as_array), column)
        } else {
            (column, Sql::parameter(as_array))
        };

        Ok(Sql::raw("(SELECT json_group_array(value) FROM (SELECT value FROM json_each(COALESCE(")
            .append(first)
            .append_raw(", json('[]'))) UNION ALL SELECT value FROM json_each(COALESCE(")
            .append(second)
            .append_raw(", json('[]')))))"))
    }

    fn vector_distance(&self, _column: Sql, _metric: VectorMetric, _reference: Vec<f32>) -> Result<Sql> {
        Err(Error::FeatureNotSupported {
            feature: "vector distance search on SQLite".to_owned(),
        })
    }

    fn geometry_predicate(&self, _column: Sql, _op: &GeometryOp, _value: Value) -> Result<Sql> {
        Err(Error::FeatureNotSupported {
            feature: "geospatial predicates on SQLite".to_owned(),
        })
    }

    fn json_agg_array(&self, inner: Sql, alias: &str, keys: &[String]) -> Sql {
        let pairs = keys
            .iter()
            .map(|key| format!("'{key}', {}.{}", self.quote_ident(alias), self.quote_ident(key)))
            .join(", ");

        Sql::raw(format!(
            "(SELECT COALESCE(json_group_array(json_object({pairs})), json('[]')) FROM ("
        ))
        .append(inner)
        .append_raw(&format!(") AS {})", self.quote_ident(alias)))
    }

    fn json_agg_object(&self, inner: Sql, alias: &str, keys: &[String]) -> Sql {
        let pairs = keys
            .iter()
            .map(|key| format!("'{key}', {}.{}", self.quote_ident(alias), self.quote_ident(key)))
            .join(", ");

        Sql::raw(format!("(SELECT json_object({pairs}) FROM ("))
            .append(inner)
            .append_raw(&format!(") AS {})", self.quote_ident(alias)))
    }

    fn insert_verb(&self, skip_duplicates: bool) -> &'static str {
        if skip_duplicates {
            "INSERT OR IGNORE"
        } else {
            "INSERT"
        }
    }

    fn upsert(&self, parts: UpsertParts) -> Sql {
        let mut sql = Sql::raw("INSERT INTO ")
            .append(parts.table)
            .append_raw(" (")
            .append(parts.columns)
            .append_raw(") VALUES (")
            .append(parts.values)
            .append_raw(") ON CONFLICT (")
            .append(parts.conflict_target)
            .append_raw(") DO UPDATE SET ")
            .append(parts.set);
        if let Some(returning) = parts.returning {
            sql = sql.append_raw(" RETURNING ").append(returning);
        }
        sql
    }

    fn transform_to_database(&self, value: Value, field: &Field) -> Value {
        if field.is_list() {
            if let Value::List(items) = value {
                return convert::list_to_json(items);
            }
        }

        match (field.kind, value) {
            (ScalarKind::Boolean, Value::Boolean(b)) => Value::Int(i64::from(b)),
            (ScalarKind::DateTime, Value::DateTime(dt)) => Value::String(dt.to_rfc3339()),
            (ScalarKind::Date, Value::Date(d)) => Value::String(d.to_string()),
            (ScalarKind::Time, Value::Time(t)) => Value::String(t.to_string()),
            (ScalarKind::Json, Value::Json(j)) => Value::String(j.to_string()),
            (ScalarKind::Decimal, Value::Decimal(d)) => Value::String(d.to_string()),
            (_, value) => value,
        }
    }

    fn transform_from_database(&self, value: Value, field: &Field) -> Result<Value> {
        convert::from_database(value, field)
    }
}
