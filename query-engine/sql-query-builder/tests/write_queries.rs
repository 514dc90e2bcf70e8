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
fn create_emits_returning_on_postgres() {
    let schema = blog_schema();

    let sql = parse(
        &schema,
        "Post",
        Operation::Create,
        &json!({ "data": { "id": "p1", "title": "Hello", "authorId": "u1" } }),
        &PostgresDialect,
    )
    .unwrap();

    assert_eq!(
        sql.to_statement(PlaceholderStyle::Dollar),
        "INSERT INTO \"post\" (\"id\", \"title\", \"authorId\") VALUES ($1, $2, $3) \
         RETURNING \"id\", \"title\", \"authorId\""
    );
}

#[test]
fn create_skips_returning_on_mysql() {
    let schema = blog_schema();

    let sql = parse(
        &schema,
        "Post",
        Operation::Create,
        &json!({ "data": { "id": "p1", "title": "Hello", "authorId": "u1" } }),
        &MysqlDialect,
    )
    .unwrap();

    assert_eq!(
        sql.to_statement(PlaceholderStyle::Question),
        "INSERT INTO `post` (`id`, `title`, `authorId`) VALUES (?, ?, ?)"
    );
}

#[test]
fn create_many_batches_rows() {
    let schema = blog_schema();

    let sql = parse(
        &schema,
        "Post",
        Operation::CreateMany,
        &json!({
            "data": [
                { "id": "p1", "title": "a", "authorId": "u1" },
                { "id": "p2", "title": "b", "authorId": "u1" },
            ],
        }),
        &PostgresDialect,
    )
    .unwrap();

    assert_eq!(
        sql.to_statement(PlaceholderStyle::Dollar),
        "INSERT INTO \"post\" (\"id\", \"title\", \"authorId\") VALUES ($1, $2, $3), ($4, $5, $6)"
    );
    assert_eq!(sql.parameters().len(), 6);
}

#[test]
fn create_many_skip_duplicates_per_dialect() {
    let schema = blog_schema();
    let payload = json!({
        "data": [{ "id": "p1", "title": "a", "authorId": "u1" }],
        "skipDuplicates": true,
    });

    let pg = parse(&schema, "Post", Operation::CreateMany, &payload, &PostgresDialect).unwrap();
    assert!(pg
        .to_statement(PlaceholderStyle::Dollar)
        .ends_with(" ON CONFLICT DO NOTHING"));

    let mysql = parse(&schema, "Post", Operation::CreateMany, &payload, &MysqlDialect).unwrap();
    assert!(mysql
        .to_statement(PlaceholderStyle::Question)
        .starts_with("INSERT IGNORE INTO "));

    let sqlite = parse(&schema, "Post", Operation::CreateMany, &payload, &SqliteDialect).unwrap();
    assert!(sqlite
        .to_statement(PlaceholderStyle::Question)
        .starts_with("INSERT OR IGNORE INTO "));
}

#[test]
fn update_applies_set_and_numeric_sugar() {
    let schema = blog_schema();

    let sql = parse(
        &schema,
        "Post",
        Operation::Update,
        &json!({ "where": { "id": "p1" }, "data": { "title": "new" } }),
        &PostgresDialect,
    )
    .unwrap();

    assert_eq!(
        sql.to_statement(PlaceholderStyle::Dollar),
        "UPDATE \"post\" SET \"title\" = $1 WHERE \"post\".\"id\" = $2 \
         RETURNING \"id\", \"title\", \"authorId\""
    );
    assert_eq!(
        sql.parameters(),
        &[Value::String("new".into()), Value::String("p1".into())]
    );
}

#[test]
fn update_many_has_no_returning() {
    let schema = blog_schema();

    let sql = parse(
        &schema,
        "Post",
        Operation::UpdateMany,
        &json!({ "where": { "title": { "contains": "old" } }, "data": { "title": "new" } }),
        &PostgresDialect,
    )
    .unwrap();

    assert_eq!(
        sql.to_statement(PlaceholderStyle::Dollar),
        "UPDATE \"post\" SET \"title\" = $1 WHERE \"post\".\"title\" LIKE $2"
    );
}

#[test]
fn upsert_uses_on_conflict_do_update_on_postgres() {
    let schema = blog_schema();

    let sql = parse(
        &schema,
        "User",
        Operation::Upsert,
        &json!({
            "where": { "id": "u1" },
            "create": { "id": "u1", "name": "A" },
            "update": { "name": "A" },
        }),
        &PostgresDialect,
    )
    .unwrap();

    assert_eq!(
        sql.to_statement(PlaceholderStyle::Dollar),
        "INSERT INTO \"user\" (\"id\", \"name\") VALUES ($1, $2) \
         ON CONFLICT (\"id\") DO UPDATE SET \"name\" = $3 \
         RETURNING \"id\", \"name\""
    );
}

#[test]
fn upsert_uses_on_duplicate_key_on_mysql() {
    let schema = blog_schema();

    let sql = parse(
        &schema,
        "User",
        Operation::Upsert,
        &json!({
            "where": { "id": "u1" },
            "create": { "id": "u1", "name": "A" },
            "update": { "name": "A" },
        }),
        &MysqlDialect,
    )
    .unwrap();

    assert_eq!(
        sql.to_statement(PlaceholderStyle::Question),
        "INSERT INTO `user` (`id`, `name`) VALUES (?, ?) ON DUPLICATE KEY UPDATE `name` = ?"
    );
}

#[test]
fn delete_mirrors_update_filter_shape() {
    let schema = blog_schema();

    let sql = parse(
        &schema,
        "Post",
        Operation::Delete,
        &json!({ "where": { "id": "p1" } }),
        &PostgresDialect,
    )
    .unwrap();

    assert_eq!(
        sql.to_statement(PlaceholderStyle::Dollar),
        "DELETE FROM \"post\" WHERE \"post\".\"id\" = $1 RETURNING \"id\", \"title\", \"authorId\""
    );

    let many = parse(
        &schema,
        "Post",
        Operation::DeleteMany,
        &json!({ "where": { "title": { "endsWith": "draft" } } }),
        &PostgresDialect,
    )
    .unwrap();

    assert_eq!(
        many.to_statement(PlaceholderStyle::Dollar),
        "DELETE FROM \"post\" WHERE \"post\".\"title\" LIKE $1"
    );
    assert_eq!(many.parameters(), &[Value::String("%draft".into())]);
}

#[test]
fn nested_write_data_is_routed_to_the_planner() {
    let schema = blog_schema();

    let err = parse(
        &schema,
        "User",
        Operation::Create,
        &json!({ "data": { "id": "u1", "name": "A", "posts": { "create": { "id": "p1", "title": "x" } } } }),
        &PostgresDialect,
    )
    .unwrap_err();

    assert_eq!(err.code(), "shape_error");
}
