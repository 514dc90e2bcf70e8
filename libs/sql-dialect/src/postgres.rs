use crate::convert;
use crate::{needle_text, point_wkt, wildcard_pattern, Capability, Dialect, ListPredicate, TextMatch, UpsertParts};
use enumflags2::BitFlags;
use model_value::Value;
use query_structure::{
    DefaultValue, Error, Field, GeneratorKind, GeometryOp, JsonPathSegment, Result, ScalarKind,
    VectorMetric,
};
use query_template::Sql;
use sql_connection::SqlFamily;

/// PostgreSQL. The most capable target: native arrays, enums, `RETURNING`,
/// `DISTINCT ON`, `ILIKE`, pgvector and PostGIS.
#[derive(Debug)]
pub struct PostgresDialect;

impl Dialect for PostgresDialect {
    fn family(&self) -> SqlFamily {
        SqlFamily::Postgres
    }

    fn capabilities(&self) -> BitFlags<Capability> {
        Capability::Returning
            | Capability::ArrayColumns
            | Capability::NativeEnums
            | Capability::DistinctOn
            | Capability::InsensitiveLike
            | Capability::VectorOps
            | Capability::GeoOps
            | Capability::TransactionalDdl
    }

    fn quote_ident(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    fn map_type(&self, field: &Field, enum_values: Option<&[String]>) -> Result<String> {
        if let Some(native) = field.native_type_for(SqlFamily::Postgres) {
            return Ok(native.to_owned());
        }

        let base = match field.kind {
            ScalarKind::String => "text".to_owned(),
            ScalarKind::Int => "integer".to_owned(),
            ScalarKind::Float => "double precision".to_owned(),
            ScalarKind::Decimal => "decimal(65,30)".to_owned(),
            ScalarKind::BigInt => "bigint".to_owned(),
            ScalarKind::Boolean => "boolean".to_owned(),
            ScalarKind::DateTime => "timestamp(3)".to_owned(),
            ScalarKind::Date => "date".to_owned(),
            ScalarKind::Time => "time(3)".to_owned(),
            ScalarKind::Json => "jsonb".to_owned(),
            ScalarKind::Bytes => "bytea".to_owned(),
            ScalarKind::Enum => {
                let _ = enum_values;
                let name = field.enum_name.as_deref().ok_or_else(|| {
                    Error::schema(format!("enum field `{}` has no enum definition", field.name))
                })?;
                self.quote_ident(name)
            }
            ScalarKind::Vector => match field.dimension {
                Some(dimension) => format!("vector({dimension})"),
                None => "vector".to_owned(),
            },
            ScalarKind::Point => "geometry(Point)".to_owned(),
        };

        Ok(if field.is_list() { format!("{base}[]") } else { base })
    }

    fn render_default(&self, field: &Field, default: &DefaultValue) -> Option<String> {
        match default {
            DefaultValue::Value(value) => convert::default_literal(value),
            DefaultValue::Generator(GeneratorKind::Now | GeneratorKind::UpdatedAt) => {
                Some("CURRENT_TIMESTAMP".to_owned())
            }
            // Client-side generators and autoincrement have no DDL default
            // (autoincrement becomes a serial type).
            DefaultValue::Generator(_) => {
                let _ = field;
                None
            }
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
        let operator = match (insensitive, negated) {
            (false, false) => " LIKE ",
            (false, true) => " NOT LIKE ",
            (true, false) => " ILIKE ",
            (true, true) => " NOT ILIKE ",
        };
        column.append_raw(operator).append_parameter(pattern)
    }

    fn json_extract(&self, column: Sql, path: &[JsonPathSegment], as_text: bool) -> Sql {
        let rendered = path
            .iter()
            .map(|segment| match segment {
                JsonPathSegment::Key(key) => key.clone(),
                JsonPathSegment::Index(idx) => idx.to_string(),
            })
            .collect::<Vec<_>>()
            .join(",");

        let operator = if as_text { " #>> " } else { " #> " };
        column
            .append_raw(operator)
            .append_parameter(Value::String(format!("{{{rendered}}}")))
            .append_raw("::text[]")
    }

    fn json_array_contains(&self, column: Sql, value: Value, negated: bool) -> Sql {
        let predicate = column.append_raw(" @> ").append_parameter(value);
        if negated {
            Sql::raw("NOT (").append(predicate).append_raw(")")
        } else {
            predicate
        }
    }

    fn json_array_edge(&self, column: Sql, last: bool) -> Sql {
        column.append_raw(if last { " -> -1" } else { " -> 0" })
    }

    fn list_predicate(&self, column: Sql, predicate: ListPredicate, _field: &Field) -> Result<Sql> {
        Ok(match predicate {
            ListPredicate::Has(value) => Sql::parameter(value)
                .append_raw(" = ANY(")
                .append(column)
                .append_raw(")"),
            ListPredicate::HasEvery(values) => column
                .append_raw(" @> ")
                .append_parameter(Value::List(values)),
            ListPredicate::HasSome(values) => column
                .append_raw(" && ")
                .append_parameter(Value::List(values)),
            ListPredicate::IsEmpty(empty) => {
                let check = if empty { " = 0" } else { " > 0" };
                Sql::raw("COALESCE(cardinality(")
                    .append(column)
                    .append_raw("), 0)")
                    .append_raw(check)
            }
        })
    }

    fn list_append(&self, column: Sql, value: Value, front: bool, _field: &Field) -> Result<Sql> {
        Ok(match (front, &value) {
            (false, Value::List(_)) => column.append_raw(" || ").append_parameter(value),
            (false, _) => Sql::raw("array_append(")
                .append(column)
                .append_raw(", ")
                .append_parameter(value)
                .append_raw(")"),
            (true, Value::List(_)) => Sql::parameter(value).append_raw(" || ").append(column),
            (true, _) => Sql::raw("array_prepend(")
                .append_parameter(value)
                .append_raw(", ")
                .append(column)
                .append_raw(")"),
        })
    }

    fn vector_distance(&self, column: Sql, metric: VectorMetric, reference: Vec<f32>) -> Result<Sql> {
        let operator = match metric {
            VectorMetric::L2 => " <-> ",
            VectorMetric::Cosine => " <=> ",
        };
        Ok(column
            .append_raw(operator)
            .append_parameter(Value::String(convert::vector_text(&reference)))
            .append_raw("::vector"))
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
            GeometryOp::Covers => "ST_Covers",
            GeometryOp::DWithin { distance } => {
                return Ok(Sql::raw("ST_DWithin(")
                    .append(column)
                    .append_raw(", ST_GeomFromText(")
                    .append_parameter(Value::String(wkt))
                    .append_raw(&format!("), {distance})")));
            }
        };

        Ok(Sql::raw(format!("{function}("))
            .append(column)
            .append_raw(", ST_GeomFromText(")
            .append_parameter(Value::String(wkt))
            .append_raw("))"))
    }

    fn json_agg_array(&self, inner: Sql, alias: &str, _keys: &[String]) -> Sql {
        Sql::raw(format!(
            "(SELECT COALESCE(json_agg(row_to_json({alias})), '[]'::json) FROM ("
        ))
        .append(inner)
        .append_raw(&format!(") {alias})"))
    }

    fn json_agg_object(&self, inner: Sql, alias: &str, _keys: &[String]) -> Sql {
        Sql::raw(format!("(SELECT row_to_json({alias}) FROM ("))
            .append(inner)
            .append_raw(&format!(") {alias})"))
    }

    fn insert_conflict_suffix(&self, skip_duplicates: bool) -> &'static str {
        if skip_duplicates {
            " ON CONFLICT DO NOTHING"
        } else {
            ""
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
        match (field.kind, value) {
            (ScalarKind::Vector, Value::Vector(v)) => Value::String(convert::vector_text(&v)),
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
