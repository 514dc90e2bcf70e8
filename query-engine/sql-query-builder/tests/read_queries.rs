mod common;

use common::blog_schema;
use model_value::Value;
use pretty_assertions::assert_eq;
use query_structure::Operation;
use query_template::PlaceholderStyle;
use serde_json::json;
use sql_dialect::{MysqlDialect, PostgresDialect, SqliteDialect};
use sql_query_builder::parse;

#[test]
fn find_many_with_one_to_many_include() {
    let schema = blog_schema();

    let sql = parse(
        &schema,
        "User",
        Operation::FindMany,
        &json!({
            "where": { "name": { "contains": "A" } },
            "include": { "posts": { "where": { "title": { "startsWith": "Hi" } } } },
        }),
        &PostgresDialect,
    )
    .unwrap();

    assert_eq!(
        sql.to_statement(PlaceholderStyle::Dollar),
        "SELECT \"t0\".\"id\", \"t0\".\"name\", \
         (SELECT COALESCE(json_agg(row_to_json(t1)), '[]'::json) FROM \
         (SELECT \"t1\".\"id\", \"t1\".\"title\", \"t1\".\"authorId\" FROM \"post\" AS \"t1\" \
         WHERE \"t1\".\"authorId\" = \"t0\".\"id\" AND \"t1\".\"title\" LIKE $1) t1) AS \"posts\" \
         FROM \"user\" AS \"t0\" WHERE \"t0\".\"name\" LIKE $2"
    );
    // Parameter order reflects the SELECT-then-WHERE traversal.
    assert_eq!(
        sql.parameters(),
        &[Value::String("Hi%".into()), Value::String("%A%".into())]
    );
}

#[test]
fn find_first_appends_limit_one() {
    let schema = blog_schema();

    let sql = parse(
        &schema,
        "User",
        Operation::FindFirst,
        &json!({ "where": { "name": "A" } }),
        &PostgresDialect,
    )
    .unwrap();

    assert_eq!(
        sql.to_statement(PlaceholderStyle::Dollar),
        "SELECT \"t0\".\"id\", \"t0\".\"name\" FROM \"user\" AS \"t0\" WHERE \"t0\".\"name\" = $1 LIMIT 1"
    );
}

#[test]
fn find_unique_requires_and_uses_unique_criteria() {
    let schema = blog_schema();

    let sql = parse(
        &schema,
        "User",
        Operation::FindUnique,
        &json!({ "where": { "id": "u1" } }),
        &PostgresDialect,
    )
    .unwrap();

    assert_eq!(
        sql.to_statement(PlaceholderStyle::Dollar),
        "SELECT \"t0\".\"id\", \"t0\".\"name\" FROM \"user\" AS \"t0\" WHERE \"t0\".\"id\" = $1 LIMIT 1"
    );

    let err = parse(
        &schema,
        "User",
        Operation::FindUnique,
        &json!({ "where": { "name": "A" } }),
        &PostgresDialect,
    )
    .unwrap_err();
    assert_eq!(err.code(), "unique_where_required");
}

#[test]
fn many_to_many_include_goes_through_the_junction() {
    let schema = blog_schema();

    let sql = parse(
        &schema,
        "User",
        Operation::FindMany,
        &json!({ "include": { "tags": true } }),
        &PostgresDialect,
    )
    .unwrap();

    assert_eq!(
        sql.to_statement(PlaceholderStyle::Dollar),
        "SELECT \"t0\".\"id\", \"t0\".\"name\", \
         (SELECT COALESCE(json_agg(row_to_json(t1)), '[]'::json) FROM \
         (SELECT \"t1\".\"id\", \"t1\".\"name\" FROM \"tag\" AS \"t1\" \
         WHERE EXISTS (SELECT 1 FROM \"_TagToUser\" AS \"t2\" \
         WHERE \"t2\".\"A\" = \"t1\".\"id\" AND \"t2\".\"B\" = \"t0\".\"id\")) t1) AS \"tags\" \
         FROM \"user\" AS \"t0\""
    );
    assert!(sql.parameters().is_empty());
}

#[test]
fn nested_select_composes_arbitrarily_deep() {
    let schema = blog_schema();

    let sql = parse(
        &schema,
        "User",
        Operation::FindMany,
        &json!({
            "select": {
                "id": true,
                "posts": {
                    "take": 2,
                    "orderBy": { "title": "asc" },
                    "select": {
                        "title": true,
                        "author": { "select": { "name": true } },
                    },
                },
            },
        }),
        &PostgresDialect,
    )
    .unwrap();

    assert_eq!(
        sql.to_statement(PlaceholderStyle::Dollar),
        "SELECT \"t0\".\"id\", \
         (SELECT COALESCE(json_agg(row_to_json(t1)), '[]'::json) FROM \
         (SELECT \"t1\".\"title\", \
         (SELECT row_to_json(t2) FROM \
         (SELECT \"t2\".\"name\" FROM \"user\" AS \"t2\" WHERE \"t2\".\"id\" = \"t1\".\"authorId\" LIMIT 1) t2) AS \"author\" \
         FROM \"post\" AS \"t1\" WHERE \"t1\".\"authorId\" = \"t0\".\"id\" \
         ORDER BY \"t1\".\"title\" ASC LIMIT 2) t1) AS \"posts\" \
         FROM \"user\" AS \"t0\""
    );
}

#[test]
fn relation_count_selection_becomes_scalar_subquery() {
    let schema = blog_schema();

    let sql = parse(
        &schema,
        "User",
        Operation::FindMany,
        &json!({
            "select": {
                "id": true,
                "_count": { "select": { "posts": { "where": { "title": { "contains": "x" } } } } },
            },
        }),
        &PostgresDialect,
    )
    .unwrap();

    assert_eq!(
        sql.to_statement(PlaceholderStyle::Dollar),
        "SELECT \"t0\".\"id\", \
         (SELECT COUNT(*) FROM \"post\" AS \"t1\" \
         WHERE \"t1\".\"authorId\" = \"t0\".\"id\" AND \"t1\".\"title\" LIKE $1) AS \"_count_posts\" \
         FROM \"user\" AS \"t0\""
    );
}

#[test]
fn mysql_aggregates_relations_with_json_arrayagg() {
    let schema = blog_schema();

    let sql = parse(
        &schema,
        "User",
        Operation::FindMany,
        &json!({ "include": { "posts": true } }),
        &MysqlDialect,
    )
    .unwrap();

    assert_eq!(
        sql.to_statement(PlaceholderStyle::Question),
        "SELECT `t0`.`id`, `t0`.`name`, \
         (SELECT COALESCE(JSON_ARRAYAGG(JSON_OBJECT('id', `t1`.`id`, 'title', `t1`.`title`, 'authorId', `t1`.`authorId`)), JSON_ARRAY()) FROM \
         (SELECT `t1`.`id`, `t1`.`title`, `t1`.`authorId` FROM `post` AS `t1` \
         WHERE `t1`.`authorId` = `t0`.`id`) AS `t1`) AS `posts` \
         FROM `user` AS `t0`"
    );
}

#[test]
fn sqlite_aggregates_relations_with_json_group_array() {
    let schema = blog_schema();

    let sql = parse(
        &schema,
        "User",
        Operation::FindMany,
        &json!({ "include": { "posts": true } }),
        &SqliteDialect,
    )
    .unwrap();

    assert_eq!(
        sql.to_statement(PlaceholderStyle::Question),
        "SELECT \"t0\".\"id\", \"t0\".\"name\", \
         (SELECT COALESCE(json_group_array(json_object('id', \"t1\".\"id\", 'title', \"t1\".\"title\", 'authorId', \"t1\".\"authorId\")), json('[]')) FROM \
         (SELECT \"t1\".\"id\", \"t1\".\"title\", \"t1\".\"authorId\" FROM \"post\" AS \"t1\" \
         WHERE \"t1\".\"authorId\" = \"t0\".\"id\") AS \"t1\") AS \"posts\" \
         FROM \"user\" AS \"t0\""
    );
}

#[test]
fn pagination_skip_without_take_is_emitted() {
    let schema = blog_schema();

    let sql = parse(
        &schema,
        "Post",
        Operation::FindMany,
        &json!({ "orderBy": { "title": "desc" }, "skip": 10 }),
        &PostgresDialect,
    )
    .unwrap();

    assert_eq!(
        sql.to_statement(PlaceholderStyle::Dollar),
        "SELECT \"t0\".\"id\", \"t0\".\"title\", \"t0\".\"authorId\" FROM \"post\" AS \"t0\" \
         ORDER BY \"t0\".\"title\" DESC OFFSET 10"
    );
}

#[test]
fn take_zero_emits_limit_zero() {
    let schema = blog_schema();

    let sql = parse(
        &schema,
        "Post",
        Operation::FindMany,
        &json!({ "take": 0 }),
        &PostgresDialect,
    )
    .unwrap();

    assert!(sql.to_statement(PlaceholderStyle::Dollar).ends_with(" LIMIT 0"));
}

#[test]
fn cursor_builds_inclusive_seek_predicate() {
    let schema = blog_schema();

    let sql = parse(
        &schema,
        "Post",
        Operation::FindMany,
        &json!({ "cursor": { "id": "p5" }, "orderBy": { "title": "asc" }, "take": 10 }),
        &PostgresDialect,
    )
    .unwrap();

    let stmt = sql.to_statement(PlaceholderStyle::Dollar);
    assert!(stmt.contains("\"t0\".\"title\" > (SELECT \"t1\".\"title\" FROM \"post\" AS \"t1\" WHERE \"t1\".\"id\" = $1)"));
    assert!(stmt.contains(" OR "));
    assert!(stmt.ends_with(" LIMIT 10"));
}

#[test]
fn cursor_without_order_by_seeks_on_the_id() {
    let schema = blog_schema();

    let sql = parse(
        &schema,
        "Post",
        Operation::FindMany,
        &json!({ "cursor": { "id": "p5" } }),
        &PostgresDialect,
    )
    .unwrap();

    let stmt = sql.to_statement(PlaceholderStyle::Dollar);
    assert!(stmt.contains("\"t0\".\"id\" > "));
}

#[test]
fn distinct_on_for_postgres_and_group_by_emulation_elsewhere() {
    let schema = blog_schema();
    let payload = json!({ "distinct": ["authorId"], "select": { "id": true, "authorId": true } });

    let pg = parse(&schema, "Post", Operation::FindMany, &payload, &PostgresDialect).unwrap();
    assert_eq!(
        pg.to_statement(PlaceholderStyle::Dollar),
        "SELECT DISTINCT ON (\"t0\".\"authorId\") \"t0\".\"id\", \"t0\".\"authorId\" \
         FROM \"post\" AS \"t0\" ORDER BY \"t0\".\"authorId\" ASC"
    );

    let mysql = parse(&schema, "Post", Operation::FindMany, &payload, &MysqlDialect).unwrap();
    assert_eq!(
        mysql.to_statement(PlaceholderStyle::Question),
        "SELECT MIN(`t0`.`id`) AS `id`, `t0`.`authorId` FROM `post` AS `t0` GROUP BY `t0`.`authorId`"
    );
}

#[test]
fn parse_is_pure_and_rendering_is_memoized() {
    let schema = blog_schema();
    let payload = json!({
        "where": { "name": { "contains": "A" } },
        "include": { "posts": true },
    });

    let first = parse(&schema, "User", Operation::FindMany, &payload, &PostgresDialect).unwrap();
    let second = parse(&schema, "User", Operation::FindMany, &payload, &PostgresDialect).unwrap();

    assert_eq!(first, second);
    assert_eq!(
        first.to_statement(PlaceholderStyle::Dollar),
        second.to_statement(PlaceholderStyle::Dollar)
    );

    let a = first.to_statement(PlaceholderStyle::Dollar) as *const str;
    let b = first.to_statement(PlaceholderStyle::Dollar) as *const str;
    assert_eq!(a, b);
}
