use pretty_assertions::assert_eq;
use query_structure::*;
use sql_dialect::PostgresDialect;
use sql_schema_connector::{calculate_sql_schema, diff, AmbiguousChange, MigrationStep};

fn single_model(fields: Vec<Field>) -> ModelSet {
    let mut model = Model::new("User").mapped("user");
    for field in fields {
        model = model.field(field);
    }
    ModelSet::new(vec![model]).unwrap()
}

fn snapshot(models: &ModelSet) -> sql_schema_describer::SqlSchema {
    calculate_sql_schema(models, &PostgresDialect).unwrap()
}

#[test]
fn diffing_a_snapshot_against_itself_is_empty() {
    let models = single_model(vec![
        Field::new("id", ScalarKind::String).id(),
        Field::new("email", ScalarKind::String).unique(),
    ]);
    let schema = snapshot(&models);

    let result = diff(&schema, &schema);
    assert_eq!(result.steps, vec![]);
    assert_eq!(result.ambiguities, vec![]);
}

#[test]
fn added_models_become_create_table_steps() {
    let empty = sql_schema_describer::SqlSchema::empty();
    let models = single_model(vec![Field::new("id", ScalarKind::String).id()]);

    let result = diff(&empty, &snapshot(&models));

    assert_eq!(result.steps.len(), 1);
    assert!(matches!(&result.steps[0], MigrationStep::CreateTable { table } if table.name == "user"));
    assert!(result.ambiguities.is_empty());
}

#[test]
fn incompatible_column_changes_are_not_ambiguous() {
    let current = snapshot(&single_model(vec![
        Field::new("id", ScalarKind::String).id(),
        Field::new("age", ScalarKind::Int),
    ]));
    let desired = snapshot(&single_model(vec![
        Field::new("id", ScalarKind::String).id(),
        Field::new("nickname", ScalarKind::String),
    ]));

    let result = diff(&current, &desired);

    assert!(result.ambiguities.is_empty());
    assert_eq!(
        result
            .steps
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>(),
        vec![
            "Add column user.nickname".to_owned(),
            "Drop column user.age".to_owned(),
        ]
    );
}

#[test]
fn compatible_column_swap_surfaces_an_ambiguity() {
    // Scenario: user(email) -> user(email_address), same type.
    let current = snapshot(&single_model(vec![
        Field::new("id", ScalarKind::String).id(),
        Field::new("email", ScalarKind::String),
    ]));
    let desired = snapshot(&single_model(vec![
        Field::new("id", ScalarKind::String).id(),
        Field::new("email_address", ScalarKind::String),
    ]));

    let result = diff(&current, &desired);

    assert!(result.steps.is_empty());
    assert_eq!(result.ambiguities.len(), 1);
    match &result.ambiguities[0] {
        AmbiguousChange::Column { table, from, to, .. } => {
            assert_eq!(table, "user");
            assert_eq!(from, "email");
            assert_eq!(to, "email_address");
        }
        other => panic!("expected a column ambiguity, got {other:?}"),
    }
}

#[test]
fn type_changes_flag_narrowing_as_destructive() {
    let current = snapshot(&single_model(vec![
        Field::new("id", ScalarKind::String).id(),
        Field::new("count", ScalarKind::BigInt),
    ]));
    let desired = snapshot(&single_model(vec![
        Field::new("id", ScalarKind::String).id(),
        Field::new("count", ScalarKind::Int),
    ]));

    let result = diff(&current, &desired);

    assert_eq!(result.steps.len(), 1);
    assert!(result.steps[0].is_destructive());

    // The reverse widening is safe.
    let result = diff(&desired, &current);
    assert_eq!(result.steps.len(), 1);
    assert!(!result.steps[0].is_destructive());
}

#[test]
fn nullability_tightening_without_default_is_destructive() {
    let current = snapshot(&single_model(vec![
        Field::new("id", ScalarKind::String).id(),
        Field::new("name", ScalarKind::String).nullable(),
    ]));
    let desired = snapshot(&single_model(vec![
        Field::new("id", ScalarKind::String).id(),
        Field::new("name", ScalarKind::String),
    ]));

    let result = diff(&current, &desired);
    assert_eq!(result.steps.len(), 1);
    assert!(result.steps[0].is_destructive());

    // With a default to fill existing rows, the change is safe.
    let desired_with_default = snapshot(&single_model(vec![
        Field::new("id", ScalarKind::String).id(),
        Field::new("name", ScalarKind::String).default_value(model_value::Value::String("".into())),
    ]));
    let result = diff(&current, &desired_with_default);
    assert!(result
        .steps
        .iter()
        .all(|step| !step.is_destructive()));
}

#[test]
fn steps_are_ordered_by_dependency() {
    // Dropping a table must come after dropping FKs that point at it, and
    // new tables must precede the FKs referencing them.
    let user = Model::new("User")
        .mapped("user")
        .field(Field::new("id", ScalarKind::String).id());
    let post = Model::new("Post")
        .mapped("post")
        .field(Field::new("id", ScalarKind::String).id())
        .field(Field::new("authorId", ScalarKind::String))
        .relation(
            Relation::new("author", RelationKind::ManyToOne, "User").on_fields(["authorId"], ["id"]),
        );
    let models = ModelSet::new(vec![user, post]).unwrap();

    let result = diff(&sql_schema_describer::SqlSchema::empty(), &snapshot(&models));

    let create_positions: Vec<usize> = result
        .steps
        .iter()
        .enumerate()
        .filter(|(_, s)| matches!(s, MigrationStep::CreateTable { .. }))
        .map(|(i, _)| i)
        .collect();
    let fk_positions: Vec<usize> = result
        .steps
        .iter()
        .enumerate()
        .filter(|(_, s)| matches!(s, MigrationStep::AddForeignKey { .. }))
        .map(|(i, _)| i)
        .collect();

    // FKs of fresh tables travel inside CreateTable and render deferred; any
    // standalone FK additions must trail the creates.
    for fk_pos in fk_positions {
        for create_pos in &create_positions {
            assert!(fk_pos > *create_pos);
        }
    }
}

#[test]
fn enum_value_changes_produce_alter_enum() {
    let current = sql_schema_describer::SqlSchema {
        tables: vec![],
        enums: vec![sql_schema_describer::Enum {
            name: "color".into(),
            values: vec!["red".into()],
        }],
    };
    let desired = sql_schema_describer::SqlSchema {
        tables: vec![],
        enums: vec![sql_schema_describer::Enum {
            name: "color".into(),
            values: vec!["red".into(), "blue".into()],
        }],
    };

    let result = diff(&current, &desired);
    assert_eq!(
        result.steps,
        vec![MigrationStep::AlterEnum {
            name: "color".into(),
            added_values: vec!["blue".into()],
            removed_values: vec![],
        }]
    );
    assert!(!result.steps[0].is_destructive());
}
