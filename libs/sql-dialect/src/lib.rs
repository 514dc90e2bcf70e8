//! Per-dialect strategy objects.
//!
//! Everything dialect-specific sits behind the [`Dialect`] trait so the query
//! planner and the schema engine stay free of database conditionals. One
//! implementation exists per supported database; new dialects plug in
//! without touching the planner.

mod convert;
mod mysql;
mod postgres;
mod sqlite;

pub use mysql::MysqlDialect;
pub use postgres::PostgresDialect;
pub use sqlite::SqliteDialect;

use enumflags2::{bitflags, BitFlags};
use model_value::Value;
use query_structure::{
    DefaultValue, Field, GeometryOp, JsonPathSegment, Result, VectorMetric,
};
use query_template::{PlaceholderStyle, Sql};
use sql_connection::SqlFamily;

/// Feature switches gating native code paths. When a capability is absent
/// the planner substitutes an emulation where one exists, and surfaces
/// `FeatureNotSupported` where none does.
#[bitflags]
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Returning,
    ArrayColumns,
    NativeEnums,
    DistinctOn,
    InsensitiveLike,
    VectorOps,
    GeoOps,
    TransactionalDdl,
}

/// The text-matching operators of string filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextMatch {
    Contains,
    StartsWith,
    EndsWith,
}

/// Scalar-list predicate requests, with values already shaped for the
/// database.
#[derive(Debug, Clone, PartialEq)]
pub enum ListPredicate {
    Has(Value),
    HasEvery(Vec<Value>),
    HasSome(Vec<Value>),
    IsEmpty(bool),
}

/// Pieces of an upsert, assembled per dialect.
#[derive(Debug)]
pub struct UpsertParts {
    pub table: Sql,
    pub columns: Sql,
    pub values: Sql,
    pub conflict_target: Sql,
    pub set: Sql,
    pub returning: Option<Sql>,
}

/// The dialect strategy consumed by clause builders and the schema engine.
pub trait Dialect: Send + Sync + std::fmt::Debug {
    fn family(&self) -> SqlFamily;

    fn capabilities(&self) -> BitFlags<Capability>;

    fn supports(&self, capability: Capability) -> bool {
        self.capabilities().contains(capability)
    }

    fn placeholder_style(&self) -> PlaceholderStyle {
        self.family().placeholder_style()
    }

    /// Quote an identifier (column, table, alias).
    fn quote_ident(&self, name: &str) -> String;

    /// The SQL column type for a field, honoring native overrides. Enum
    /// fields receive the resolved enum values for dialects that spell enums
    /// inline.
    fn map_type(&self, field: &Field, enum_values: Option<&[String]>) -> Result<String>;

    /// Render a column default for DDL, if the default is expressible.
    fn render_default(&self, field: &Field, default: &DefaultValue) -> Option<String>;

    /// A text-matching predicate: `contains`/`startsWith`/`endsWith` with
    /// optional case-insensitivity and negation. The pattern value is the
    /// raw needle; wildcard wrapping happens here.
    fn text_match(
        &self,
        column: Sql,
        op: TextMatch,
        needle: Value,
        insensitive: bool,
        negated: bool,
    ) -> Sql;

    /// Extract a JSON path from a column, as JSON or as text.
    fn json_extract(&self, column: Sql, path: &[JsonPathSegment], as_text: bool) -> Sql;

    /// A parameter expression comparable against JSON expressions.
    fn json_param(&self, value: Value) -> Sql {
        Sql::parameter(value)
    }

    /// JSON containment/shape predicates that have no portable spelling.
    fn json_array_contains(&self, column: Sql, value: Value, negated: bool) -> Sql;

    /// First/last element of a JSON array, as JSON.
    fn json_array_edge(&self, column: Sql, last: bool) -> Sql;

    /// A predicate over a scalar-list column.
    fn list_predicate(&self, column: Sql, predicate: ListPredicate, field: &Field) -> Result<Sql>;

    /// The SET right-hand side appending (or prepending) to a scalar list.
    fn list_append(&self, column: Sql, value: Value, front: bool, field: &Field) -> Result<Sql>;

    /// The distance expression between a vector column and a reference
    /// vector.
    fn vector_distance(&self, column: Sql, metric: VectorMetric, reference: Vec<f32>) -> Result<Sql>;

    /// A geospatial predicate.
    fn geometry_predicate(&self, column: Sql, op: &GeometryOp, value: Value) -> Result<Sql>;

    /// Wrap a derived-table subselect into a JSON array aggregation,
    /// coalescing the empty set to the dialect's empty array literal.
    /// `keys` are the derived table's output column names, which double as
    /// the JSON object keys.
    fn json_agg_array(&self, inner: Sql, alias: &str, keys: &[String]) -> Sql;

    /// Wrap a single-row derived-table subselect into a JSON object (NULL
    /// when no row matches).
    fn json_agg_object(&self, inner: Sql, alias: &str, keys: &[String]) -> Sql;

    /// The INSERT verb, possibly absorbing duplicate-skipping.
    fn insert_verb(&self, skip_duplicates: bool) -> &'static str {
        let _ = skip_duplicates;
        "INSERT"
    }

    /// A statement suffix absorbing duplicate-skipping, where the dialect
    /// spells it at the end.
    fn insert_conflict_suffix(&self, skip_duplicates: bool) -> &'static str {
        let _ = skip_duplicates;
        ""
    }

    /// Assemble the dialect's native upsert.
    fn upsert(&self, parts: UpsertParts) -> Sql;

    /// Shape a value for parameter binding.
    fn transform_to_database(&self, value: Value, field: &Field) -> Value;

    /// Shape a driver value back into the logical representation.
    fn transform_from_database(&self, value: Value, field: &Field) -> Result<Value>;
}

/// Select the dialect for a driver tag.
pub fn dialect_for(family: SqlFamily) -> &'static dyn Dialect {
    match family {
        SqlFamily::Postgres => &PostgresDialect,
        SqlFamily::Mysql => &MysqlDialect,
        SqlFamily::Sqlite => &SqliteDialect,
    }
}

pub(crate) fn wildcard_pattern(op: TextMatch, needle: &str) -> String {
    let escaped = needle.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    match op {
        TextMatch::Contains => format!("%{escaped}%"),
        TextMatch::StartsWith => format!("{escaped}%"),
        TextMatch::EndsWith => format!("%{escaped}"),
    }
}

pub(crate) fn needle_text(needle: &Value) -> String {
    match needle {
        Value::String(s) | Value::Enum(s) => s.clone(),
        other => other.to_string(),
    }
}

pub(crate) fn point_wkt(value: &Value) -> Option<String> {
    match value {
        Value::Point { x, y } => Some(format!("POINT({x} {y})")),
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcards_are_escaped() {
        assert_eq!(wildcard_pattern(TextMatch::Contains, "50%"), "%50\\%%");
        assert_eq!(wildcard_pattern(TextMatch::StartsWith, "a_b"), "a\\_b%");
        assert_eq!(wildcard_pattern(TextMatch::EndsWith, "Hi"), "%Hi");
    }

    #[test]
    fn dialect_selection_matches_family() {
        assert_eq!(dialect_for(SqlFamily::Postgres).family(), SqlFamily::Postgres);
        assert_eq!(dialect_for(SqlFamily::Mysql).family(), SqlFamily::Mysql);
        assert_eq!(dialect_for(SqlFamily::Sqlite).family(), SqlFamily::Sqlite);
    }

    #[test]
    fn capability_sets_differ() {
        assert!(dialect_for(SqlFamily::Postgres).supports(Capability::DistinctOn));
        assert!(!dialect_for(SqlFamily::Mysql).supports(Capability::Returning));
        assert!(dialect_for(SqlFamily::Sqlite).supports(Capability::Returning));
        assert!(!dialect_for(SqlFamily::Sqlite).supports(Capability::ArrayColumns));
    }
}
