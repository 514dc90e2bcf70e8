use pretty_assertions::assert_eq;
use query_structure::*;
use sql_dialect::{MysqlDialect, PostgresDialect};
use sql_schema_connector::calculate_sql_schema;
use sql_schema_describer::{ColumnArity, ColumnTypeFamily, ForeignKeyAction, IndexType};

fn blog_models() -> ModelSet {
    let user = Model::new("User")
        .mapped("user")
        .field(Field::new("id", ScalarKind::String).id())
        .field(Field::new("email", ScalarKind::String).unique())
        .field(Field::new("age", ScalarKind::Int).nullable())
        .relation(Relation::new("posts", RelationKind::OneToMany, "Post"))
        .relation(Relation::new("tags", RelationKind::ManyToMany, "Tag"));

    let post = Model::new("Post")
        .mapped("post")
        .field(Field::new("id", ScalarKind::String).id())
        .field(Field::new("title", ScalarKind::String))
        .field(Field::new("authorId", ScalarKind::String))
        .relation(
            Relation::new("author", RelationKind::ManyToOne, "User")
                .on_fields(["authorId"], ["id"])
                .actions(ReferentialAction::Cascade, ReferentialAction::Cascade),
        )
        .unique_on(NamedKey::new("title_authorId", ["title", "authorId"]));

    let tag = Model::new("Tag")
        .mapped("tag")
        .field(Field::new("id", ScalarKind::String).id())
        .relation(Relation::new("users", RelationKind::ManyToMany, "User"));

    ModelSet::new(vec![user, post, tag]).unwrap()
}

#[test]
fn model_tables_carry_columns_pk_and_uniques() {
    let schema = calculate_sql_schema(&blog_models(), &PostgresDialect).unwrap();

    let user = schema.table("user").expect("user table");
    assert_eq!(
        user.columns.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
        vec!["id", "email", "age"]
    );
    assert_eq!(user.primary_key.as_ref().unwrap().columns, vec!["id"]);
    assert_eq!(user.column("id").unwrap().tpe.full_data_type, "text");
    assert_eq!(user.column("age").unwrap().tpe.arity, ColumnArity::Nullable);

    let unique = user
        .indices
        .iter()
        .find(|i| i.name == "user_email_key")
        .expect("unique index on email");
    assert_eq!(unique.tpe, IndexType::Unique);
    assert_eq!(unique.columns, vec!["email"]);
}

#[test]
fn compound_uniques_keep_their_constraint_name() {
    let schema = calculate_sql_schema(&blog_models(), &PostgresDialect).unwrap();
    let post = schema.table("post").unwrap();

    let unique = post
        .indices
        .iter()
        .find(|i| i.name == "title_authorId")
        .expect("compound unique");
    assert_eq!(unique.columns, vec!["title", "authorId"]);
    assert_eq!(unique.tpe, IndexType::Unique);
}

#[test]
fn owning_relations_become_foreign_keys() {
    let schema = calculate_sql_schema(&blog_models(), &PostgresDialect).unwrap();
    let post = schema.table("post").unwrap();

    assert_eq!(post.foreign_keys.len(), 1);
    let fk = &post.foreign_keys[0];
    assert_eq!(fk.columns, vec!["authorId"]);
    assert_eq!(fk.referenced_table, "user");
    assert_eq!(fk.referenced_columns, vec!["id"]);
    assert_eq!(fk.on_delete_action, ForeignKeyAction::Cascade);
}

#[test]
fn many_to_many_emits_one_junction_with_composite_pk() {
    let schema = calculate_sql_schema(&blog_models(), &PostgresDialect).unwrap();

    let junction = schema.table("_TagToUser").expect("junction table");
    assert_eq!(
        junction.columns.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
        vec!["A", "B"]
    );
    assert_eq!(
        junction.primary_key.as_ref().unwrap().columns,
        vec!["A", "B"]
    );
    assert_eq!(junction.foreign_keys.len(), 2);
    // A references the lexicographically first model (Tag).
    assert_eq!(junction.foreign_keys[0].referenced_table, "tag");
    assert_eq!(junction.foreign_keys[1].referenced_table, "user");

    // Emitted exactly once even though both sides declare the relation.
    assert_eq!(
        schema.tables.iter().filter(|t| t.name == "_TagToUser").count(),
        1
    );
}

#[test]
fn enums_are_emitted_for_postgres_only() {
    let color = EnumDef::new("color", ["red", "blue"]);
    let model = Model::new("Paint")
        .field(Field::new("id", ScalarKind::String).id())
        .field(Field::new("color", ScalarKind::Enum).enum_of("color"));
    let models = ModelSet::with_enums(vec![model], vec![color]).unwrap();

    let pg = calculate_sql_schema(&models, &PostgresDialect).unwrap();
    assert_eq!(pg.enums.len(), 1);
    assert_eq!(pg.enums[0].values, vec!["red", "blue"]);
    assert_eq!(
        pg.table("Paint").unwrap().column("color").unwrap().tpe.full_data_type,
        "\"color\""
    );

    let mysql = calculate_sql_schema(&models, &MysqlDialect).unwrap();
    assert!(mysql.enums.is_empty());
    assert_eq!(
        mysql.table("Paint").unwrap().column("color").unwrap().tpe.full_data_type,
        "enum('red', 'blue')"
    );
}

#[test]
fn one_to_one_owning_side_gets_a_unique_index() {
    let user = Model::new("User").field(Field::new("id", ScalarKind::String).id());
    let profile = Model::new("Profile")
        .field(Field::new("id", ScalarKind::String).id())
        .field(Field::new("userId", ScalarKind::String))
        .relation(
            Relation::new("user", RelationKind::OneToOne, "User").on_fields(["userId"], ["id"]),
        );
    let models = ModelSet::new(vec![user, profile]).unwrap();

    let schema = calculate_sql_schema(&models, &PostgresDialect).unwrap();
    let profile = schema.table("Profile").unwrap();

    let unique = profile
        .indices
        .iter()
        .find(|i| i.columns == vec!["userId"])
        .expect("unique index on the FK");
    assert_eq!(unique.tpe, IndexType::Unique);
}

#[test]
fn autoincrement_and_generated_defaults() {
    let counter = Model::new("Counter")
        .field(Field::new("id", ScalarKind::Int).id().generated(GeneratorKind::Increment))
        .field(Field::new("createdAt", ScalarKind::DateTime).generated(GeneratorKind::Now));
    let models = ModelSet::new(vec![counter]).unwrap();

    let schema = calculate_sql_schema(&models, &PostgresDialect).unwrap();
    let table = schema.table("Counter").unwrap();

    assert!(table.column("id").unwrap().auto_increment);
    assert_eq!(table.column("id").unwrap().tpe.family, ColumnTypeFamily::Int);
    assert_eq!(
        table.column("createdAt").unwrap().default.as_deref(),
        Some("CURRENT_TIMESTAMP")
    );
}
