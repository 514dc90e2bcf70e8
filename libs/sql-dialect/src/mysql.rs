use crate::convert;
use crate::{needle_text, point_wkt, wildcard_pattern, Capability, Dialect, ListPredicate, TextMatch, UpsertParts};
use enumflags2::BitFlags;
use itertools::Itertools;
use model_value::Value;
use query_structure::{
    DefaultValue, Error, Field, GeneratorKind, GeometryOp, JsonPathSegment, Result, ScalarKind,
    VectorMetric,
};
use query_template::Sql;
use sql_connection::SqlFamily;

/// MySQL. No `RETURNING`, no array columns, no `DISTINCT ON`; scalar lists
/// are emulated as JSON and enums are spelled inline in the column type.
#[derive(Debug)]
pub struct MysqlDialect;

impl MysqlDialect {
    fn json_path(path: &[JsonPathSegment]) -> String {
        let mut out = String::from("$");
        for segment in path {
            match segment {
                JsonPathSegment::Key(key) => {
                    out.push('.');
                    // Quote keys so dots and spaces survive.
                    out.push('"');
                    out.push_str(&key.replace('"', "\\\""));
                    out.push('"');
                }
                JsonPathSegment::Index(idx) => {
                    out.push_str(&format!("[{idx}]"));
                }
            }
        }
        out
    }

    fn cast_json_param(value: Value) -> Sql {
        Sql::raw("CAST(")
            .append_parameter(value)
            .append_raw(" AS JSON)")
    }
}

impl Dialect for MysqlDialect {
    fn family(&self) -> SqlFamily {
        SqlFamily::Mysql
    }

    fn capabilities(&self) -> BitFlags<Capability> {
        Capability::NativeEnums | Capability::GeoOps
    }

    fn quote_ident(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    fn map_type(&self, field: &Field, enum_values: Option<&[String]>) -> Result<String> {
        if let Some(native) = field.native_type_for(SqlFamily::Mysql) {
            return Ok(native.to_owned());
        }

        if field.is_list() {
            return Ok("json".to_owned());
        }

        let tpe = match field.kind {
            ScalarKind::String => "varchar(191)".to_owned(),
            ScalarKind::Int => "int".to_owned(),
            ScalarKind::Float => "double".to_owned(),
            ScalarKind::Decimal => "decimal(65,30)".to_owned(),
            ScalarKind::BigInt => "bigint".to_owned(),
            ScalarKind::Boolean => "tinyint(1)".to_owned(),
            ScalarKind::DateTime => "datetime(3)".to_owned(),
            ScalarKind::Date => "date".to_owned(),
            ScalarKind::Time => "time(3)".to_owned(),
            ScalarKind::Json => "json".to_owned(),
            ScalarKind::Bytes => "longblob".to_owned(),
            ScalarKind::Enum => {
                let values = enum_values.ok_or_else(|| {
                    Error::schema(format!("enum field `{}` has no resolved values", field.name))
                })?;
                format!(
                    "enum({})",
                    values
                        .iter()
                        .map(|v| format!("'{}'", v.replace('\'', "''")))
                        .join(", ")
                )
            }
            ScalarKind::Vector => {
                return Err(Error::FeatureNotSupported {
                    feature: "vector columns on MySQL".to_owned(),
                })
            }
            ScalarKind::Point => "point".to_owned(),
        };

        Ok(tpe)
    }

    fn render_default(&self, field: &Field, default: &DefaultValue) -> Option<String> {
        match default {
            DefaultValue::Value(value) => {
                // MySQL refuses literal defaults on blob/text/json columns.
                if matches!(field.kind, ScalarKind::Json | ScalarKind::Bytes) || field.is_list() {
                    None
                } else {
                    convert::default_literal(value)
                }
            }
            DefaultValue::Generator(GeneratorKind::Now | GeneratorKind::UpdatedAt) => {
                Some("CURRENT_TIMESTAMP(3)".to_owned())
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
        let extract = Sql::raw("JSON_EXTRACT(")
            .append(column)
            .append_raw(", ")
            .append_parameter(Value::String(Self::json_path(path)))
            .append_raw(")");

        if as_text {
            Sql::raw("JSON_UNQUOTE(").append(extract).append_raw(")")
        } else {
            extract
        }
    }

    fn json_param(&self, value: Value) -> Sql {
        Self::cast_json_param(value)
    }

    fn json_array_contains(&self, column: Sql, value: Value, negated: bool) -> Sql {
        let predicate = Sql::raw("JSON_CONTAINS(")
            .append(column)
            .append_raw(", ")
            .append(Self::cast_json_param(value))
            .append_raw(")");
        if negated {
            Sql::raw("NOT ").append(predicate)
        } else {
            predicate
        }
    }

    fn json_array_edge(&self, column: Sql, last: bool) -> Sql {
        if last {
            Sql::raw("JSON_EXTRACT(")
                .append(column.clone())
                .append_raw(", CONCAT('$[', JSON_LENGTH(")
                .append(column)
                .append_raw(") - 1, ']'))")
        } else {
            Sql::raw("JSON_EXTRACT(")
                .append(column)
                .append_raw(", '$[0]')")
        }
    }

    fn list_predicate(&self, column: Sql, predicate: ListPredicate, _field: &Field) -> Result<Sql> {
        Ok(match predicate {
            ListPredicate::Has(value) => {
                let encoded = Value::Json(value.to_json());
                self.json_array_contains(column, encoded, false)
            }
            ListPredicate::HasEvery(values) => {
                let encoded = Value::Json(Value::List(values).to_json());
                self.json_array_contains(column, encoded, false)
            }
            ListPredicate::HasSome(values) => {
                let encoded = Value::Json(Value::List(values).to_json());
                Sql::raw("JSON_OVERLAPS(")
                    .append(column)
                    .append_raw(", ")
                    .append(Self::cast_json_param(encoded))
                    .append_raw(")")
            }
            ListPredicate::IsEmpty(empty) => {
                let check = if empty { " = 0" } else { " > 0" };
                Sql::raw("JSON_LENGTH(COALESCE(")
                    .append(column)
                    .append_raw(", JSON_ARRAY()))")
                    .append_raw(check)
            }
        })
    }

    fn list_append(&self, column: Sql, value: Value, front: bool, _field: &Field) -> Result<Sql> {
        // Everything merges as arrays; single elements are wrapped first.
        let as_array = match value {
            list @ Value::List(_) => Value::Json(list.to_json()),
            single => Value::Json(serde_json::Value::Array(vec![single.to_json()])),
        };

        let coalesced = |column: Sql| {
            Sql::raw("COALESCE(")
                .append(column)
                .append_raw(", JSON_ARRAY())")
        };

        Ok(if front {
            Sql::raw("JSON_MERGE_PRESERVE(")
                .append(Self::cast_json_param(as_array))
                .append_raw(", ")
                .append(coalesced(column))
                .append_raw(")")
        } else {
            Sql::raw("JSON_MERGE_PRESERVE(")
                .append(coalesced(column))
                .append_raw(", ")
                .append(Self::cast_json_param(as_array))
                .append_raw(")")
        })
    }

    fn vector_distance(&self, _column: Sql, _metric: VectorMetric, _reference: Vec<f32>) -> Result<Sql> {
        Err(Error::FeatureNotSupported {
            feature: "vector distance search on MySQL".to_owned(),
        })
    }

    fn geometry_predicate(&self, column: Sql, op: &GeometryOp, value: Value) -> Result<Sql> {
        let wkt = point_wkt(&value)
            .ok_or_else(|| Error::internal("geometry filter value is not a geometry"))?;

        let function = match op {
            GeometryOp::Equals => "ST_Equals",
            GeometryOp::Intersects => "ST_Intersects",
            GeometryOp::Contains => "ST_Contains",
            GeometryOp::Within => "ST_Within",
            GeometryOp::Crosses => "ST_Crosses",
            GeometryOp::Overlaps => "ST_Overlaps",
            GeometryOp::Touches => "ST_Touches",
            GeometryOp::Covers => {
                return Err(Error::FeatureNotSupported {
                    feature: "`covers` on MySQL".to_owned(),
                })
            }
            GeometryOp::DWithin { distance } => {
                return Ok(Sql::raw("ST_Distance(")
                    .append(column)
                    .append_raw(", ST_GeomFromText(")
                    .append_parameter(Value::String(wkt))
                    .append_raw(&format!(")) <= {distance}")));
            }
        };

        Ok(Sql::raw(format!("{function}("))
            .append(column)
            .append_raw(", ST_GeomFromText(")
            .append_parameter(Value::String(wkt))
            .append_raw("))"))
    }

    fn json_agg_array(&self, inner: Sql, alias: &str, keys: &[String]) -> Sql {
        let pairs = keys
            .iter()
            .map(|key| format!("'{key}', {}.{}", self.quote_ident(alias), self.quote_ident(key)))
            .join(", ");

        Sql::raw(format!(
            "(SELECT COALESCE(JSON_ARRAYAGG(JSON_OBJECT({pairs})), JSON_ARRAY()) FROM ("
        ))
        .append(inner)
        .append_raw(&format!(") AS {})", self.quote_ident(alias)))
    }

    fn json_agg_object(&self, inner: Sql, alias: &str, keys: &[String]) -> Sql {
        let pairs = keys
            .iter()
            .map(|key| format!("'{key}', {}.{}", self.quote_ident(alias), self.quote_ident(key)))
            .join(", ");

        Sql::raw(format!("(SELECT JSON_OBJECT({pairs}) FROM ("))
            .append(inner)
            .append_raw(&format!(") AS {})", self.quote_ident(alias)))
    }

    fn insert_verb(&self, skip_duplicates: bool) -> &'static str {
        if skip_duplicates {
            "INSERT IGNORE"
        } else {
            "INSERT"
        }
    }

    fn upsert(&self, parts: UpsertParts) -> Sql {
        // MySQL keys on any unique violation; the conflict target is implied.
        Sql::raw("INSERT INTO ")
            .append(parts.table)
            .append_raw(" (")
            .append(parts.columns)
            .append_raw(") VALUES (")
            .append(parts.values)
            .append_raw(") ON DUPLICATE KEY UPDATE ")
            .append(parts.set)
    }

    fn transform_to_database(&self, value: Value, field: &Field) -> Value {
        if field.is_list() {
            if let Value::List(items) = value {
                return convert::list_to_json(items);
            }
        }

        match (field.kind, value) {
            (ScalarKind::Boolean, Value::Boolean(b)) => Value::Int(i64::from(b)),
            (ScalarKind::DateTime, Value::DateTime(dt)) => Value::String(
                dt.naive_utc().format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
            ),
            (ScalarKind::Date, Value::Date(d)) => Value::String(d.to_string()),
            (ScalarKind::Time, Value::Time(t)) => Value::String(t.to_string()),
            (ScalarKind::Point, point @ Value::Point { .. }) => {
                Value::String(point_wkt(&point).unwrap_or_default())
            }
            (_, value) => value,
        }
    }

    fn transform_from_database(&self, value: Value, field: &Field) -> Result<Value> {
        convert::from_database(value, field)
    }
}
