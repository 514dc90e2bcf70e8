mod common;

use common::{blog_schema, catalog_schema};
use model_value::Value;
use pretty_assertions::assert_eq;
use query_structure::Operation;
use query_template::PlaceholderStyle;
use serde_json::json;
use sql_dialect::PostgresDialect;
use sql_query_builder::parse;

#[test]
fn exist_emits_the_canonical_form() {
    let schema = blog_schema();

    let sql = parse(
        &schema,
        "User",
        Operation::Exist,
        &json!({ "where": { "id": "u1" } }),
        &PostgresDialect,
    )
    .unwrap();

    assert_eq!(
        sql.to_statement(PlaceholderStyle::Dollar),
        "SELECT EXISTS ( SELECT 1 FROM \"user\" AS \"t0\" WHERE \"t0\".\"id\" = $1 LIMIT 1 )"
    );
    assert_eq!(sql.parameters(), &[Value::String("u1".into())]);
}

#[test]
fn exist_never_projects_orders_or_paginates() {
    let schema = blog_schema();

    let sql = parse(&schema, "User", Operation::Exist, &json!({}), &PostgresDialect).unwrap();
    let stmt = sql.to_statement(PlaceholderStyle::Dollar);

    assert_eq!(stmt, "SELECT EXISTS ( SELECT 1 FROM \"user\" AS \"t0\" LIMIT 1 )");
    assert!(!stmt.contains("SELECT *"));
    assert!(!stmt.contains("ORDER BY"));
    assert!(!stmt.contains("OFFSET"));
    assert!(!stmt.contains("GROUP BY"));
}

#[test]
fn group_by_with_having_and_aggregate_ordering() {
    let schema = blog_schema();

    let sql = parse(
        &schema,
        "Post",
        Operation::GroupBy,
        &json!({
            "by": ["authorId"],
            "_count": { "_all": true },
            "having": { "_count": { "_all": { "gt": 5 } } },
            "orderBy": { "_count": { "authorId": "desc" } },
        }),
        &PostgresDialect,
    )
    .unwrap();

    assert_eq!(
        sql.to_statement(PlaceholderStyle::Dollar),
        "SELECT \"t0\".\"authorId\", COUNT(*) AS \"_count_all\" FROM \"post\" AS \"t0\" \
         GROUP BY \"t0\".\"authorId\" HAVING COUNT(*) > $1 ORDER BY COUNT(*) DESC"
    );
    assert_eq!(sql.parameters(), &[Value::Int(5)]);
}

#[test]
fn aggregate_selects_requested_functions() {
    let schema = catalog_schema();

    let sql = parse(
        &schema,
        "Product",
        Operation::Aggregate,
        &json!({
            "where": { "active": true },
            "_count": true,
            "_sum": { "stock": true },
            "_avg": { "stock": true },
            "_min": { "price": true },
            "_max": { "price": true },
        }),
        &PostgresDialect,
    )
    .unwrap();

    assert_eq!(
        sql.to_statement(PlaceholderStyle::Dollar),
        "SELECT COUNT(*) AS \"_count_all\", \
         SUM(\"t0\".\"stock\") AS \"_sum_stock\", \
         AVG(\"t0\".\"stock\") AS \"_avg_stock\", \
         MIN(\"t0\".\"price\") AS \"_min_price\", \
         MAX(\"t0\".\"price\") AS \"_max_price\" \
         FROM \"product\" AS \"t0\" WHERE \"t0\".\"active\" = $1"
    );
}

#[test]
fn count_wraps_when_paginated() {
    let schema = blog_schema();

    let plain = parse(
        &schema,
        "Post",
        Operation::Count,
        &json!({}),
        &PostgresDialect,
    )
    .unwrap();
    assert_eq!(
        plain.to_statement(PlaceholderStyle::Dollar),
        "SELECT COUNT(*) FROM \"post\" AS \"t0\""
    );

    let windowed = parse(
        &schema,
        "Post",
        Operation::Count,
        &json!({ "take": 10, "skip": 5 }),
        &PostgresDialect,
    )
    .unwrap();
    assert_eq!(
        windowed.to_statement(PlaceholderStyle::Dollar),
        "SELECT COUNT(*) FROM (SELECT 1 FROM \"post\" AS \"t0\" LIMIT 10 OFFSET 5) AS \"t1\""
    );
}

#[test]
fn group_by_having_on_sum() {
    let schema = catalog_schema();

    let sql = parse(
        &schema,
        "Product",
        Operation::GroupBy,
        &json!({
            "by": ["active"],
            "_sum": { "stock": true },
            "having": { "_sum": { "stock": { "gte": 100 } } },
        }),
        &PostgresDialect,
    )
    .unwrap();

    assert_eq!(
        sql.to_statement(PlaceholderStyle::Dollar),
        "SELECT \"t0\".\"active\", SUM(\"t0\".\"stock\") AS \"_sum_stock\" FROM \"product\" AS \"t0\" \
         GROUP BY \"t0\".\"active\" HAVING SUM(\"t0\".\"stock\") >= $1"
    );
    assert_eq!(sql.parameters(), &[Value::Int(100)]);
}
