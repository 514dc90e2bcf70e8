use model_value::Value;
use pretty_assertions::assert_eq;
use query_structure::*;
use serde_json::json;

fn blog_schema() -> ModelSet {
    let user = Model::new("User")
        .mapped("user")
        .field(Field::new("id", ScalarKind::String).id().generated(GeneratorKind::Cuid))
        .field(Field::new("email", ScalarKind::String).unique())
        .field(Field::new("name", ScalarKind::String).nullable())
        .field(Field::new("age", ScalarKind::Int).nullable())
        .field(Field::new("tags", ScalarKind::String).list())
        .relation(Relation::new("posts", RelationKind::OneToMany, "Post"));

    let post = Model::new("Post")
        .mapped("post")
        .field(Field::new("id", ScalarKind::String).id().generated(GeneratorKind::Cuid))
        .field(Field::new("title", ScalarKind::String))
        .field(Field::new("views", ScalarKind::Int).default_value(Value::Int(0)))
        .field(Field::new("meta", ScalarKind::Json).nullable())
        .field(Field::new("authorId", ScalarKind::String))
        .relation(
            Relation::new("author", RelationKind::ManyToOne, "User").on_fields(["authorId"], ["id"]),
        );

    ModelSet::new(vec![user, post]).unwrap()
}

#[test]
fn bare_value_is_equals_shorthand() {
    let schema = blog_schema();
    let user = schema.model("User").unwrap();

    let parsed = parse_payload(
        &schema,
        user,
        Operation::FindMany,
        &json!({ "where": { "email": "x@y" } }),
    )
    .unwrap();

    assert_eq!(
        parsed.args.filter,
        Some(Filter::Scalar(ScalarFilter {
            field: "email".into(),
            condition: ScalarCondition::Equals(Value::String("x@y".into())),
            mode: QueryMode::Default,
        }))
    );
}

#[test]
fn operator_objects_and_mode() {
    let schema = blog_schema();
    let user = schema.model("User").unwrap();

    let parsed = parse_payload(
        &schema,
        user,
        Operation::FindMany,
        &json!({ "where": { "name": { "contains": "A", "mode": "insensitive" } } }),
    )
    .unwrap();

    assert_eq!(
        parsed.args.filter,
        Some(Filter::Scalar(ScalarFilter {
            field: "name".into(),
            condition: ScalarCondition::Contains(Value::String("A".into())),
            mode: QueryMode::Insensitive,
        }))
    );
}

#[test]
fn not_with_operator_negates() {
    let schema = blog_schema();
    let user = schema.model("User").unwrap();

    let parsed = parse_payload(
        &schema,
        user,
        Operation::FindMany,
        &json!({ "where": { "age": { "not": { "lt": 18 } } } }),
    )
    .unwrap();

    assert_eq!(
        parsed.args.filter,
        Some(Filter::Scalar(ScalarFilter {
            field: "age".into(),
            condition: ScalarCondition::Not(Box::new(ScalarCondition::LessThan(Value::Int(18)))),
            mode: QueryMode::Default,
        }))
    );
}

#[test]
fn relation_filters_wrap_nested_trees() {
    let schema = blog_schema();
    let user = schema.model("User").unwrap();

    let parsed = parse_payload(
        &schema,
        user,
        Operation::FindMany,
        &json!({ "where": { "posts": { "some": { "title": { "startsWith": "Hi" } } } } }),
    )
    .unwrap();

    match parsed.args.filter.unwrap() {
        Filter::Relation(rf) => {
            assert_eq!(rf.relation, "posts");
            assert_eq!(rf.condition, RelationCondition::AtLeastOneRelatedRecord);
            assert!(!rf.nested.is_empty());
        }
        other => panic!("expected relation filter, got {other:?}"),
    }
}

#[test]
fn to_many_relation_filter_requires_wrapper() {
    let schema = blog_schema();
    let user = schema.model("User").unwrap();

    let err = parse_payload(
        &schema,
        user,
        Operation::FindMany,
        &json!({ "where": { "posts": { "title": "Hi" } } }),
    )
    .unwrap_err();

    assert_eq!(err.code(), "shape_error");
}

#[test]
fn list_operators_require_list_fields() {
    let schema = blog_schema();
    let user = schema.model("User").unwrap();

    let parsed = parse_payload(
        &schema,
        user,
        Operation::FindMany,
        &json!({ "where": { "tags": { "has": "rust" } } }),
    )
    .unwrap();

    assert_eq!(
        parsed.args.filter,
        Some(Filter::Scalar(ScalarFilter {
            field: "tags".into(),
            condition: ScalarCondition::Has(Value::String("rust".into())),
            mode: QueryMode::Default,
        }))
    );

    let err = parse_payload(
        &schema,
        user,
        Operation::FindMany,
        &json!({ "where": { "email": { "has": "x" } } }),
    )
    .unwrap_err();
    assert_eq!(err.code(), "unsupported_filter");
}

#[test]
fn unknown_fields_and_keys_are_rejected() {
    let schema = blog_schema();
    let user = schema.model("User").unwrap();

    let err = parse_payload(
        &schema,
        user,
        Operation::FindMany,
        &json!({ "where": { "emial": "x@y" } }),
    )
    .unwrap_err();
    assert_eq!(err.code(), "unknown_field");

    let err = parse_payload(
        &schema,
        user,
        Operation::FindMany,
        &json!({ "wheer": {} }),
    )
    .unwrap_err();
    assert_eq!(err.code(), "shape_error");
}

#[test]
fn find_unique_resolves_unique_criteria() {
    let schema = blog_schema();
    let user = schema.model("User").unwrap();

    let parsed = parse_payload(
        &schema,
        user,
        Operation::FindUnique,
        &json!({ "where": { "email": "x@y" } }),
    )
    .unwrap();

    assert_eq!(
        parsed.unique_filter,
        Some(UniqueFilter {
            fields: vec![("email".into(), Value::String("x@y".into()))],
        })
    );

    let err = parse_payload(
        &schema,
        user,
        Operation::FindUnique,
        &json!({ "where": { "name": "A" } }),
    )
    .unwrap_err();
    assert_eq!(err.code(), "unique_where_required");
}

#[test]
fn compound_unique_criteria_by_constraint_name() {
    let membership = Model::new("Membership")
        .field(Field::new("userId", ScalarKind::String))
        .field(Field::new("teamId", ScalarKind::String))
        .id_on(NamedKey::new("userId_teamId", ["userId", "teamId"]));
    let schema = ModelSet::new(vec![membership]).unwrap();
    let model = schema.model("Membership").unwrap();

    let parsed = parse_payload(
        &schema,
        model,
        Operation::FindUnique,
        &json!({ "where": { "userId_teamId": { "userId": "u1", "teamId": "t1" } } }),
    )
    .unwrap();

    assert_eq!(
        parsed.unique_filter,
        Some(UniqueFilter {
            fields: vec![
                ("userId".into(), Value::String("u1".into())),
                ("teamId".into(), Value::String("t1".into())),
            ],
        })
    );
}

#[test]
fn select_and_include_are_mutually_exclusive() {
    let schema = blog_schema();
    let user = schema.model("User").unwrap();

    let err = parse_payload(
        &schema,
        user,
        Operation::FindMany,
        &json!({ "select": { "id": true }, "include": { "posts": true } }),
    )
    .unwrap_err();
    assert_eq!(err.code(), "shape_error");
}

#[test]
fn include_appends_relations_to_default_scalars() {
    let schema = blog_schema();
    let user = schema.model("User").unwrap();

    let parsed = parse_payload(
        &schema,
        user,
        Operation::FindMany,
        &json!({ "include": { "posts": { "where": { "views": { "gt": 10 } } } } }),
    )
    .unwrap();

    let scalars: Vec<_> = parsed.selection.scalars().collect();
    assert_eq!(scalars, vec!["id", "email", "name", "age", "tags"]);

    let relations: Vec<_> = parsed.selection.relations().collect();
    assert_eq!(relations.len(), 1);
    assert_eq!(relations[0].relation, "posts");
    assert!(relations[0].args.filter.is_some());
}

#[test]
fn update_data_parses_numeric_sugar() {
    let schema = blog_schema();
    let post = schema.model("Post").unwrap();

    let parsed = parse_payload(
        &schema,
        post,
        Operation::Update,
        &json!({
            "where": { "id": "p1" },
            "data": { "views": { "increment": 1 }, "title": "new" },
        }),
    )
    .unwrap();

    let data = parsed.data.unwrap();
    assert_eq!(
        data.scalars.get("views"),
        Some(&WriteOperation::Increment(Value::Int(1)))
    );
    assert_eq!(
        data.scalars.get("title"),
        Some(&WriteOperation::Set(Value::String("new".into())))
    );
}

#[test]
fn increment_is_rejected_in_creates() {
    let schema = blog_schema();
    let post = schema.model("Post").unwrap();

    let err = parse_payload(
        &schema,
        post,
        Operation::Create,
        &json!({ "data": { "title": "x", "authorId": "u1", "views": { "increment": 1 } } }),
    )
    .unwrap_err();
    assert_eq!(err.code(), "shape_error");
}

#[test]
fn nested_creates_parse_into_write_data() {
    let schema = blog_schema();
    let user = schema.model("User").unwrap();

    let parsed = parse_payload(
        &schema,
        user,
        Operation::Create,
        &json!({
            "data": {
                "email": "x@y",
                "posts": { "create": [{ "title": "a" }, { "title": "b" }] },
            },
        }),
    )
    .unwrap();

    let data = parsed.data.unwrap();
    assert_eq!(data.nested.len(), 1);
    assert_eq!(data.nested[0].relation, "posts");
    assert_eq!(data.nested[0].ops.len(), 2);
    assert!(matches!(data.nested[0].ops[0], NestedWriteOp::Create(_)));
}

#[test]
fn create_many_rejects_nested_writes() {
    let schema = blog_schema();
    let user = schema.model("User").unwrap();

    let err = parse_payload(
        &schema,
        user,
        Operation::CreateMany,
        &json!({ "data": [{ "email": "x@y", "posts": { "create": { "title": "a" } } }] }),
    )
    .unwrap_err();
    assert_eq!(err.code(), "shape_error");
}

#[test]
fn group_by_validates_order_and_having_against_by() {
    let schema = blog_schema();
    let post = schema.model("Post").unwrap();

    let parsed = parse_payload(
        &schema,
        post,
        Operation::GroupBy,
        &json!({
            "by": ["authorId"],
            "_count": { "_all": true },
            "having": { "_count": { "_all": { "gt": 5 } } },
            "orderBy": { "_count": { "authorId": "desc" } },
        }),
    )
    .unwrap();

    assert_eq!(parsed.by, vec!["authorId"]);
    assert_eq!(
        parsed.aggregates,
        vec![AggregationSelection::Count {
            all: true,
            fields: vec![],
        }]
    );
    assert!(parsed.having.is_some());

    let err = parse_payload(
        &schema,
        post,
        Operation::GroupBy,
        &json!({ "by": ["authorId"], "orderBy": { "title": "asc" } }),
    )
    .unwrap_err();
    assert_eq!(err.code(), "shape_error");
}

#[test]
fn json_filters_compose_path_and_comparison() {
    let schema = blog_schema();
    let post = schema.model("Post").unwrap();

    let parsed = parse_payload(
        &schema,
        post,
        Operation::FindMany,
        &json!({ "where": { "meta": { "path": ["tags", 0], "string_contains": "rust" } } }),
    )
    .unwrap();

    match parsed.args.filter.unwrap() {
        Filter::Scalar(ScalarFilter {
            condition: ScalarCondition::Json(json_cond),
            ..
        }) => {
            assert_eq!(
                json_cond.path,
                Some(vec![
                    JsonPathSegment::Key("tags".into()),
                    JsonPathSegment::Index(0),
                ])
            );
            assert_eq!(json_cond.op, JsonOp::StringContains("rust".into()));
        }
        other => panic!("expected json filter, got {other:?}"),
    }
}

#[test]
fn json_equality_takes_whole_objects() {
    let schema = blog_schema();
    let post = schema.model("Post").unwrap();

    let parsed = parse_payload(
        &schema,
        post,
        Operation::FindMany,
        &json!({ "where": { "meta": { "draft": true } } }),
    )
    .unwrap();

    assert_eq!(
        parsed.args.filter,
        Some(Filter::Scalar(ScalarFilter {
            field: "meta".into(),
            condition: ScalarCondition::Equals(Value::Json(json!({ "draft": true }))),
            mode: QueryMode::Default,
        }))
    );
}
