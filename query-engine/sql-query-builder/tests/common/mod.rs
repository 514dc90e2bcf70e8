use model_value::Value;
use query_structure::*;

/// The blog schema most tests run against: `User` 1-n `Post`, plus a
/// many-to-many between `User` and `Tag` through the conventional junction.
pub fn blog_schema() -> ModelSet {
    let user = Model::new("User")
        .mapped("user")
        .field(Field::new("id", ScalarKind::String).id())
        .field(Field::new("name", ScalarKind::String))
        .relation(Relation::new("posts", RelationKind::OneToMany, "Post"))
        .relation(Relation::new("tags", RelationKind::ManyToMany, "Tag"));

    let post = Model::new("Post")
        .mapped("post")
        .field(Field::new("id", ScalarKind::String).id())
        .field(Field::new("title", ScalarKind::String))
        .field(Field::new("authorId", ScalarKind::String))
        .relation(
            Relation::new("author", RelationKind::ManyToOne, "User").on_fields(["authorId"], ["id"]),
        );

    let tag = Model::new("Tag")
        .mapped("tag")
        .field(Field::new("id", ScalarKind::String).id())
        .field(Field::new("name", ScalarKind::String).unique())
        .relation(Relation::new("users", RelationKind::ManyToMany, "User"));

    ModelSet::new(vec![user, post, tag]).unwrap()
}

/// A wider model exercising the scalar kind zoo.
pub fn catalog_schema() -> ModelSet {
    let product = Model::new("Product")
        .mapped("product")
        .field(Field::new("id", ScalarKind::String).id())
        .field(Field::new("sku", ScalarKind::String).unique())
        .field(Field::new("name", ScalarKind::String))
        .field(Field::new("price", ScalarKind::Decimal))
        .field(Field::new("stock", ScalarKind::Int).default_value(Value::Int(0)))
        .field(Field::new("active", ScalarKind::Boolean).default_value(Value::Boolean(true)))
        .field(Field::new("meta", ScalarKind::Json).nullable())
        .field(Field::new("labels", ScalarKind::String).list())
        .field(Field::new("addedAt", ScalarKind::DateTime).generated(GeneratorKind::Now))
        .field(Field::new("embedding", ScalarKind::Vector).dimensions(3).nullable())
        .field(Field::new("location", ScalarKind::Point).nullable());

    ModelSet::new(vec![product]).unwrap()
}
