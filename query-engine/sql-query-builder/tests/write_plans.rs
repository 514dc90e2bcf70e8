mod common;

use common::blog_schema;
use model_value::Value;
use pretty_assertions::assert_eq;
use query_structure::Operation;
use query_template::PlaceholderStyle;
use serde_json::json;
use sql_dialect::PostgresDialect;
use sql_query_builder::plan_nested_write;

#[test]
fn create_with_nested_one_to_many_create() {
    let schema = blog_schema();

    let plan = plan_nested_write(
        &schema,
        "User",
        Operation::Create,
        &json!({
            "data": {
                "id": "u1",
                "name": "A",
                "posts": { "create": [
                    { "id": "p1", "title": "x" },
                    { "id": "p2", "title": "y" },
                ] },
            },
        }),
        &PostgresDialect,
    )
    .unwrap();

    assert_eq!(plan.steps.len(), 2);

    let parent = &plan.steps[0];
    assert_eq!(parent.label, "User");
    assert_eq!(
        parent.sql.to_statement(PlaceholderStyle::Dollar),
        "INSERT INTO \"user\" (\"id\", \"name\") VALUES ($1, $2) RETURNING \"id\""
    );
    assert_eq!(parent.returning, vec!["id".to_owned()]);

    let children = &plan.steps[1];
    assert_eq!(children.label, "User.posts");
    assert_eq!(
        children.sql.to_statement(PlaceholderStyle::Dollar),
        "INSERT INTO \"post\" (\"id\", \"title\", \"authorId\") VALUES ($1, $2, $3), ($4, $5, $6)"
    );
    // The FK slots reference the parent step's returned id symbolically.
    assert_eq!(
        children.sql.parameters(),
        &[
            Value::String("p1".into()),
            Value::String("x".into()),
            Value::Placeholder("User.id".into()),
            Value::String("p2".into()),
            Value::String("y".into()),
            Value::Placeholder("User.id".into()),
        ]
    );
}

#[test]
fn create_with_many_to_many_connect() {
    let schema = blog_schema();

    let plan = plan_nested_write(
        &schema,
        "User",
        Operation::Create,
        &json!({
            "data": {
                "id": "u1",
                "name": "A",
                "tags": { "connect": [{ "id": "tag1" }] },
            },
        }),
        &PostgresDialect,
    )
    .unwrap();

    assert_eq!(plan.steps.len(), 2);
    assert_eq!(
        plan.steps[1].sql.to_statement(PlaceholderStyle::Dollar),
        "INSERT INTO \"_TagToUser\" (\"B\", \"A\") VALUES ($1, $2) ON CONFLICT DO NOTHING"
    );
    assert_eq!(
        plan.steps[1].sql.parameters(),
        &[
            Value::Placeholder("User.id".into()),
            Value::String("tag1".into()),
        ]
    );
}

#[test]
fn create_with_owning_to_one_create_runs_child_first() {
    let schema = blog_schema();

    let plan = plan_nested_write(
        &schema,
        "Post",
        Operation::Create,
        &json!({
            "data": {
                "id": "p1",
                "title": "x",
                "author": { "create": { "id": "u9", "name": "Z" } },
            },
        }),
        &PostgresDialect,
    )
    .unwrap();

    assert_eq!(plan.steps.len(), 2);

    let child = &plan.steps[0];
    assert_eq!(child.label, "Post.author");
    assert_eq!(
        child.sql.to_statement(PlaceholderStyle::Dollar),
        "INSERT INTO \"user\" (\"id\", \"name\") VALUES ($1, $2) RETURNING \"id\""
    );

    let parent = &plan.steps[1];
    assert_eq!(parent.label, "Post");
    assert_eq!(
        parent.sql.parameters(),
        &[
            Value::String("p1".into()),
            Value::String("x".into()),
            Value::Placeholder("Post.author.id".into()),
        ]
    );
}

#[test]
fn connect_inlines_known_foreign_keys() {
    let schema = blog_schema();

    let plan = plan_nested_write(
        &schema,
        "Post",
        Operation::Create,
        &json!({
            "data": {
                "id": "p1",
                "title": "x",
                "author": { "connect": { "id": "u1" } },
            },
        }),
        &PostgresDialect,
    )
    .unwrap();

    // The connect target's id is part of the unique criteria; no lookup step
    // is needed.
    assert_eq!(plan.steps.len(), 1);
    assert_eq!(
        plan.steps[0].sql.parameters(),
        &[
            Value::String("p1".into()),
            Value::String("x".into()),
            Value::String("u1".into()),
        ]
    );
}

#[test]
fn update_detaches_before_and_attaches_after_the_parent() {
    let schema = blog_schema();

    let plan = plan_nested_write(
        &schema,
        "User",
        Operation::Update,
        &json!({
            "where": { "id": "u1" },
            "data": {
                "name": "B",
                "posts": {
                    "delete": [{ "id": "p9" }],
                    "create": [{ "id": "p10", "title": "fresh" }],
                },
            },
        }),
        &PostgresDialect,
    )
    .unwrap();

    let statements: Vec<String> = plan
        .steps
        .iter()
        .map(|step| step.sql.to_statement(PlaceholderStyle::Dollar).to_owned())
        .collect();

    // Delete first, then the parent update, then the attachment.
    assert!(statements[0].starts_with("DELETE FROM \"post\" WHERE"));
    assert!(statements[1].starts_with("UPDATE \"user\" SET \"name\" = $1 WHERE"));
    assert!(statements[2].starts_with("INSERT INTO \"post\""));

    // The delete pins the child through the parent's original unique
    // criteria.
    assert!(statements[0].contains("(SELECT \"user\".\"id\" FROM \"user\" WHERE \"user\".\"id\" = $1)"));
}

#[test]
fn nested_write_errors_carry_the_relation_path() {
    let schema = blog_schema();

    // `delete` on a create payload is rejected by shape validation.
    let err = plan_nested_write(
        &schema,
        "User",
        Operation::Create,
        &json!({
            "data": {
                "id": "u1",
                "name": "A",
                "posts": { "delete": [{ "id": "p1" }] },
            },
        }),
        &PostgresDialect,
    )
    .unwrap_err();

    assert_eq!(err.code(), "shape_error");
}

#[test]
fn upsert_plan_attaches_create_side_children() {
    let schema = blog_schema();

    let plan = plan_nested_write(
        &schema,
        "User",
        Operation::Upsert,
        &json!({
            "where": { "id": "u1" },
            "create": {
                "id": "u1",
                "name": "A",
                "posts": { "create": { "id": "p1", "title": "x" } },
            },
            "update": { "name": "A" },
        }),
        &PostgresDialect,
    )
    .unwrap();

    assert_eq!(plan.steps.len(), 2);
    assert!(plan.steps[0]
        .sql
        .to_statement(PlaceholderStyle::Dollar)
        .contains("ON CONFLICT (\"id\") DO UPDATE SET"));
    assert_eq!(
        plan.steps[1].sql.parameters(),
        &[
            Value::String("p1".into()),
            Value::String("x".into()),
            Value::Placeholder("User.id".into()),
        ]
    );
}
