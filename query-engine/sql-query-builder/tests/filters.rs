mod common;

use common::{blog_schema, catalog_schema};
use model_value::Value;
use pretty_assertions::assert_eq;
use query_structure::Operation;
use query_template::PlaceholderStyle;
use serde_json::json;
use sql_dialect::{MysqlDialect, PostgresDialect, SqliteDialect};
use sql_query_builder::parse;

fn where_clause(payload: serde_json::Value, dialect: &dyn sql_dialect::Dialect) -> (String, Vec<Value>) {
    let schema = catalog_schema();
    let sql = parse(&schema, "Product", Operation::Count, &payload, dialect).unwrap();
    let stmt = sql.to_statement(dialect.placeholder_style()).to_owned();
    let clause = stmt
        .split_once(" WHERE ")
        .map(|(_, rest)| rest.to_owned())
        .unwrap_or_default();
    (clause, sql.parameters().to_vec())
}

#[test]
fn null_equality_uses_is_null() {
    let (clause, params) = where_clause(json!({ "where": { "meta": null } }), &PostgresDialect);
    assert_eq!(clause, "\"t0\".\"meta\" IS NULL");
    assert!(params.is_empty());

    let (clause, _) = where_clause(
        json!({ "where": { "meta": { "not": null } } }),
        &PostgresDialect,
    );
    assert_eq!(clause, "\"t0\".\"meta\" IS NOT NULL");
}

#[test]
fn insensitive_mode_uses_ilike_on_postgres_and_lower_elsewhere() {
    let payload = json!({ "where": { "name": { "contains": "Cup", "mode": "insensitive" } } });

    let (clause, params) = where_clause(payload.clone(), &PostgresDialect);
    assert_eq!(clause, "\"t0\".\"name\" ILIKE $1");
    assert_eq!(params, vec![Value::String("%Cup%".into())]);

    let (clause, _) = where_clause(payload, &MysqlDialect);
    assert_eq!(clause, "LOWER(`t0`.`name`) LIKE LOWER(?)");
}

#[test]
fn wildcards_in_needles_are_escaped() {
    let (_, params) = where_clause(
        json!({ "where": { "name": { "contains": "50%_off" } } }),
        &PostgresDialect,
    );
    assert_eq!(params, vec![Value::String("%50\\%\\_off%".into())]);
}

#[test]
fn empty_in_collapses_to_false() {
    let (clause, params) = where_clause(json!({ "where": { "sku": { "in": [] } } }), &PostgresDialect);
    assert_eq!(clause, "1=0");
    assert!(params.is_empty());

    let (clause, _) = where_clause(json!({ "where": { "sku": { "notIn": [] } } }), &PostgresDialect);
    assert_eq!(clause, "1=1");
}

#[test]
fn not_wrapping_produces_logical_negation() {
    let (clause, _) = where_clause(
        json!({ "where": { "stock": { "not": { "lt": 5 } } } }),
        &PostgresDialect,
    );
    assert_eq!(clause, "NOT (\"t0\".\"stock\" < $1)");

    // Double negation collapses back to the original predicate.
    let (clause, _) = where_clause(
        json!({ "where": { "stock": { "not": { "not": { "lt": 5 } } } } }),
        &PostgresDialect,
    );
    assert_eq!(clause, "\"t0\".\"stock\" < $1");
}

#[test]
fn and_or_nest_with_parentheses() {
    let (clause, _) = where_clause(
        json!({
            "where": {
                "OR": [
                    { "stock": { "gt": 0 } },
                    { "AND": [ { "active": true }, { "stock": 0 } ] },
                ],
            },
        }),
        &PostgresDialect,
    );
    assert_eq!(
        clause,
        "\"t0\".\"stock\" > $1 OR (\"t0\".\"active\" = $2 AND \"t0\".\"stock\" = $3)"
    );
}

#[test]
fn scalar_list_filters_per_dialect() {
    let payload = json!({ "where": { "labels": { "has": "new" } } });

    let (clause, _) = where_clause(payload.clone(), &PostgresDialect);
    assert_eq!(clause, "$1 = ANY(\"t0\".\"labels\")");

    let (clause, _) = where_clause(payload.clone(), &MysqlDialect);
    assert_eq!(clause, "JSON_CONTAINS(`t0`.`labels`, CAST(? AS JSON))");

    let (clause, _) = where_clause(payload, &SqliteDialect);
    assert_eq!(
        clause,
        "EXISTS (SELECT 1 FROM json_each(\"t0\".\"labels\") WHERE json_each.value = ?)"
    );
}

#[test]
fn list_is_empty_and_has_every() {
    let (clause, _) = where_clause(
        json!({ "where": { "labels": { "isEmpty": true } } }),
        &PostgresDialect,
    );
    assert_eq!(clause, "COALESCE(cardinality(\"t0\".\"labels\"), 0) = 0");

    let (clause, params) = where_clause(
        json!({ "where": { "labels": { "hasEvery": ["a", "b"] } } }),
        &PostgresDialect,
    );
    assert_eq!(clause, "\"t0\".\"labels\" @> $1");
    assert_eq!(
        params,
        vec![Value::List(vec![
            Value::String("a".into()),
            Value::String("b".into()),
        ])]
    );
}

#[test]
fn json_path_filters_per_dialect() {
    let payload =
        json!({ "where": { "meta": { "path": ["specs", 0], "string_contains": "steel" } } });

    let (clause, params) = where_clause(payload.clone(), &PostgresDialect);
    assert_eq!(clause, "\"t0\".\"meta\" #>> $1::text[] LIKE $2");
    assert_eq!(
        params,
        vec![
            Value::String("{specs,0}".into()),
            Value::String("%steel%".into()),
        ]
    );

    let (clause, _) = where_clause(payload, &MysqlDialect);
    assert_eq!(
        clause,
        "JSON_UNQUOTE(JSON_EXTRACT(`t0`.`meta`, ?)) LIKE ?"
    );
}

#[test]
fn json_array_contains() {
    let (clause, params) = where_clause(
        json!({ "where": { "meta": { "array_contains": ["red"] } } }),
        &PostgresDialect,
    );
    assert_eq!(clause, "\"t0\".\"meta\" @> $1");
    assert_eq!(params, vec![Value::Json(json!(["red"]))]);
}

#[test]
fn vector_distance_filters_on_postgres_only() {
    let payload = json!({ "where": { "embedding": { "l2": { "to": [1.0, 2.0, 3.0], "lt": 0.5 } } } });

    let (clause, params) = where_clause(payload.clone(), &PostgresDialect);
    assert_eq!(clause, "\"t0\".\"embedding\" <-> $1::vector < $2");
    assert_eq!(
        params,
        vec![Value::String("[1,2,3]".into()), Value::Float(0.5)]
    );

    let schema = catalog_schema();
    let err = parse(&schema, "Product", Operation::Count, &payload, &SqliteDialect).unwrap_err();
    assert_eq!(err.code(), "feature_not_supported");
}

#[test]
fn geometry_predicates_use_st_functions() {
    let payload = json!({ "where": { "location": { "dWithin": { "of": { "x": 1.0, "y": 2.0 }, "distance": 100.0 } } } });

    let (clause, params) = where_clause(payload.clone(), &PostgresDialect);
    assert_eq!(
        clause,
        "ST_DWithin(\"t0\".\"location\", ST_GeomFromText($1), 100)"
    );
    assert_eq!(params, vec![Value::String("POINT(1 2)".into())]);

    let schema = catalog_schema();
    let err = parse(&schema, "Product", Operation::Count, &payload, &SqliteDialect).unwrap_err();
    assert_eq!(err.code(), "feature_not_supported");
}

#[test]
fn relation_filters_become_exists_predicates() {
    let schema = blog_schema();

    let sql = parse(
        &schema,
        "User",
        Operation::Count,
        &json!({ "where": { "posts": { "some": { "title": { "startsWith": "Hi" } } } } }),
        &PostgresDialect,
    )
    .unwrap();

    assert_eq!(
        sql.to_statement(PlaceholderStyle::Dollar),
        "SELECT COUNT(*) FROM \"user\" AS \"t0\" WHERE \
         EXISTS (SELECT 1 FROM \"post\" AS \"t1\" \
         WHERE \"t1\".\"authorId\" = \"t0\".\"id\" AND \"t1\".\"title\" LIKE $1)"
    );
}

#[test]
fn every_negates_the_inner_filter() {
    let schema = blog_schema();

    let sql = parse(
        &schema,
        "User",
        Operation::Count,
        &json!({ "where": { "posts": { "every": { "title": { "startsWith": "Hi" } } } } }),
        &PostgresDialect,
    )
    .unwrap();

    assert_eq!(
        sql.to_statement(PlaceholderStyle::Dollar),
        "SELECT COUNT(*) FROM \"user\" AS \"t0\" WHERE \
         NOT EXISTS (SELECT 1 FROM \"post\" AS \"t1\" \
         WHERE \"t1\".\"authorId\" = \"t0\".\"id\" AND NOT (\"t1\".\"title\" LIKE $1))"
    );
}

#[test]
fn none_becomes_not_exists() {
    let schema = blog_schema();

    let sql = parse(
        &schema,
        "User",
        Operation::Count,
        &json!({ "where": { "posts": { "none": {} } } }),
        &PostgresDialect,
    )
    .unwrap();

    assert_eq!(
        sql.to_statement(PlaceholderStyle::Dollar),
        "SELECT COUNT(*) FROM \"user\" AS \"t0\" WHERE \
         NOT EXISTS (SELECT 1 FROM \"post\" AS \"t1\" WHERE \"t1\".\"authorId\" = \"t0\".\"id\")"
    );
}

#[test]
fn parameter_count_always_matches_placeholders() {
    let schema = blog_schema();
    let payloads = [
        json!({ "where": { "name": { "contains": "A" } }, "include": { "posts": { "where": { "title": { "in": ["a", "b", "c"] } } } } }),
        json!({ "where": { "OR": [{ "name": "x" }, { "name": "y" }] } }),
        json!({ "where": { "posts": { "some": { "title": "t" } } }, "take": 3, "skip": 1 }),
    ];

    for payload in payloads {
        let sql = parse(&schema, "User", Operation::FindMany, &payload, &PostgresDialect).unwrap();
        let stmt = sql.to_statement(PlaceholderStyle::Dollar);
        let placeholder_count = (1..).take_while(|n| stmt.contains(&format!("${n}"))).count();
        assert_eq!(placeholder_count, sql.parameters().len(), "payload: {stmt}");
    }
}
