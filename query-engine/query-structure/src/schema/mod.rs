mod field;
mod model;
mod relation;

pub use field::{DefaultValue, Field, FieldArity, GeneratorKind, ScalarKind};
pub use model::{EnumDef, IndexDef, IndexMethod, Model, NamedKey};
pub use relation::{JunctionConfig, Relation, RelationKind, ReferentialAction};

use crate::error::{Error, Result};
use std::collections::HashMap;

/// How a many-to-many relation maps onto its junction table, resolved from
/// explicit configuration or the `_{A}To{B}` convention.
#[derive(Debug, Clone, PartialEq)]
pub struct JunctionInfo {
    pub table: String,
    /// Junction column referencing the parent model's id.
    pub parent_column: String,
    /// Junction column referencing the child (target) model's id.
    pub child_column: String,
    /// The parent id column the junction references.
    pub parent_id_column: String,
    /// The child id column the junction references.
    pub child_id_column: String,
}

/// The arena of resolved models. Constructed once, validated, then shared
/// immutably for the lifetime of a client. Relations reference target models
/// by name and memoize the arena index on first traversal, so cycles and
/// self-references need no special handling.
#[derive(Debug)]
pub struct ModelSet {
    models: Vec<Model>,
    by_name: HashMap<String, usize>,
    pub enums: Vec<EnumDef>,
}

impl ModelSet {
    pub fn new(models: Vec<Model>) -> Result<ModelSet> {
        Self::with_enums(models, Vec::new())
    }

    pub fn with_enums(models: Vec<Model>, enums: Vec<EnumDef>) -> Result<ModelSet> {
        let mut by_name = HashMap::with_capacity(models.len());
        for (idx, model) in models.iter().enumerate() {
            if by_name.insert(model.name.clone(), idx).is_some() {
                return Err(Error::schema(format!("duplicate model name `{}`", model.name)));
            }
        }

        let set = ModelSet {
            models,
            by_name,
            enums,
        };
        set.validate()?;
        Ok(set)
    }

    pub fn models(&self) -> impl Iterator<Item = &Model> {
        self.models.iter()
    }

    pub fn model(&self, name: &str) -> Result<&Model> {
        self.by_name
            .get(name)
            .map(|idx| &self.models[*idx])
            .ok_or_else(|| Error::schema(format!("unknown model `{name}`")))
    }

    pub fn find_enum(&self, name: &str) -> Option<&EnumDef> {
        self.enums.iter().find(|e| e.name == name)
    }

    /// Resolve a relation's target model, memoizing the arena index.
    pub fn target_of<'a>(&'a self, relation: &'a Relation) -> Result<&'a Model> {
        let idx = relation.target_idx.get_or_try_init(|| {
            self.by_name
                .get(relation.target_name())
                .copied()
                .ok_or_else(|| {
                    Error::schema(format!(
                        "relation `{}` targets unknown model `{}`",
                        relation.name,
                        relation.target_name(),
                    ))
                })
        })?;
        Ok(&self.models[*idx])
    }

    /// Find the owning back-relation pairing an inverse relation, matching by
    /// shared label when several relations connect the same model pair.
    pub fn inverse_of<'a>(&'a self, model: &Model, relation: &'a Relation) -> Result<&'a Relation> {
        let target = self.target_of(relation)?;

        let mut candidates = target.relations.values().filter(|back| {
            back.target_name() == model.name
                && back.is_owning_side()
                && back.kind.is_to_one()
                && back.label == relation.label
        });

        let first = candidates.next().ok_or_else(|| {
            Error::schema(format!(
                "relation `{}.{}` has no owning side on `{}`",
                model.name, relation.name, target.name,
            ))
        })?;

        if candidates.next().is_some() {
            return Err(Error::schema(format!(
                "relation `{}.{}` matches several owning relations on `{}`; disambiguate with a label",
                model.name, relation.name, target.name,
            )));
        }

        Ok(first)
    }

    /// Column pairs coupling a parent row to rows of the relation's target:
    /// `(parent column, child column)`, both physical names, such that the
    /// join condition is `child.child_column = parent.parent_column`.
    ///
    /// Many-to-many relations couple through a junction instead; see
    /// [`ModelSet::junction_info`].
    pub fn linking_columns(&self, model: &Model, relation: &Relation) -> Result<Vec<(String, String)>> {
        let target = self.target_of(relation)?;

        match relation.kind {
            RelationKind::ManyToMany => Err(Error::internal(format!(
                "linking_columns called on many-to-many relation `{}.{}`",
                model.name, relation.name,
            ))),
            _ if relation.is_owning_side() => {
                // Parent holds the FK; child is referenced.
                relation
                    .fields
                    .iter()
                    .zip(relation.references.iter())
                    .map(|(local, referenced)| {
                        let parent = model.find_field(local)?;
                        let child = target.find_field(referenced)?;
                        Ok((parent.db_name().to_owned(), child.db_name().to_owned()))
                    })
                    .collect()
            }
            _ => {
                // Inverse side: the FK lives on the target.
                let back = self.inverse_of(model, relation)?;
                back.references
                    .iter()
                    .zip(back.fields.iter())
                    .map(|(referenced, local)| {
                        let parent = model.find_field(referenced)?;
                        let child = target.find_field(local)?;
                        Ok((parent.db_name().to_owned(), child.db_name().to_owned()))
                    })
                    .collect()
            }
        }
    }

    /// Resolve the junction table layout of a many-to-many relation.
    pub fn junction_info(&self, model: &Model, relation: &Relation) -> Result<JunctionInfo> {
        let target = self.target_of(relation)?;

        let parent_id = single_id_column(model)?;
        let child_id = single_id_column(target)?;

        let config = relation.junction.clone().unwrap_or_default();

        // Lexicographic model ordering fixes which side is `A`.
        let parent_is_a = model.name <= target.name;
        let (a, b) = if parent_is_a {
            (&model.name, &target.name)
        } else {
            (&target.name, &model.name)
        };

        let table = config.table.clone().unwrap_or_else(|| match &relation.label {
            Some(label) => format!("_{label}"),
            None => format!("_{a}To{b}"),
        });

        let (parent_column, child_column) = if parent_is_a {
            (config.column_a, config.column_b)
        } else {
            (config.column_b, config.column_a)
        };

        Ok(JunctionInfo {
            table,
            parent_column,
            child_column,
            parent_id_column: parent_id,
            child_id_column: child_id,
        })
    }

    fn validate(&self) -> Result<()> {
        for model in &self.models {
            model.validate()?;

            for relation in model.relations.values() {
                let target = self.target_of(relation)?;

                if relation.fields.len() != relation.references.len() {
                    return Err(Error::schema(format!(
                        "relation `{}.{}` declares {} local fields but {} references",
                        model.name,
                        relation.name,
                        relation.fields.len(),
                        relation.references.len(),
                    )));
                }

                if relation.kind == RelationKind::ManyToMany && relation.is_owning_side() {
                    return Err(Error::schema(format!(
                        "many-to-many relation `{}.{}` must not declare local FK columns",
                        model.name, relation.name,
                    )));
                }

                if relation.kind == RelationKind::ManyToOne && !relation.is_owning_side() {
                    return Err(Error::schema(format!(
                        "many-to-one relation `{}.{}` must declare fields and references",
                        model.name, relation.name,
                    )));
                }

                for (local, referenced) in relation.fields.iter().zip(relation.references.iter()) {
                    let local_field = model.find_field(local).map_err(|_| {
                        Error::schema(format!(
                            "relation `{}.{}` references unknown local field `{local}`",
                            model.name, relation.name,
                        ))
                    })?;
                    let referenced_field = target.find_field(referenced).map_err(|_| {
                        Error::schema(format!(
                            "relation `{}.{}` references unknown field `{}.{referenced}`",
                            model.name, relation.name, target.name,
                        ))
                    })?;

                    if local_field.kind != referenced_field.kind {
                        return Err(Error::schema(format!(
                            "relation `{}.{}`: `{local}` ({}) and `{}.{referenced}` ({}) have mismatched types",
                            model.name,
                            relation.name,
                            local_field.kind.name(),
                            target.name,
                            referenced_field.kind.name(),
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}

fn single_id_column(model: &Model) -> Result<String> {
    let id_fields = model.id_fields();
    match id_fields.as_slice() {
        [field] => Ok(field.db_name().to_owned()),
        _ => Err(Error::schema(format!(
            "model `{}` needs a single-column id to participate in a many-to-many relation",
            model.name,
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model_value::Value;

    fn blog_schema() -> ModelSet {
        let user = Model::new("User")
            .mapped("user")
            .field(Field::new("id", ScalarKind::String).id())
            .field(Field::new("name", ScalarKind::String))
            .relation(Relation::new("posts", RelationKind::OneToMany, "Post"));

        let post = Model::new("Post")
            .mapped("post")
            .field(Field::new("id", ScalarKind::String).id())
            .field(Field::new("title", ScalarKind::String))
            .field(Field::new("authorId", ScalarKind::String))
            .relation(
                Relation::new("author", RelationKind::ManyToOne, "User")
                    .on_fields(["authorId"], ["id"]),
            );

        ModelSet::new(vec![user, post]).unwrap()
    }

    #[test]
    fn lazy_targets_resolve_and_memoize() {
        let schema = blog_schema();
        let user = schema.model("User").unwrap();
        let posts = user.find_relation("posts").unwrap();

        let target = schema.target_of(posts).unwrap();
        assert_eq!(target.name, "Post");
        // Second traversal hits the memoized index.
        assert_eq!(schema.target_of(posts).unwrap().name, "Post");
    }

    #[test]
    fn inverse_side_links_through_owning_fk() {
        let schema = blog_schema();
        let user = schema.model("User").unwrap();
        let posts = user.find_relation("posts").unwrap();

        let links = schema.linking_columns(user, posts).unwrap();
        assert_eq!(links, vec![("id".to_owned(), "authorId".to_owned())]);

        let post = schema.model("Post").unwrap();
        let author = post.find_relation("author").unwrap();
        let links = schema.linking_columns(post, author).unwrap();
        assert_eq!(links, vec![("authorId".to_owned(), "id".to_owned())]);
    }

    #[test]
    fn junction_derives_conventional_name() {
        let user = Model::new("User")
            .field(Field::new("id", ScalarKind::String).id())
            .relation(Relation::new("tags", RelationKind::ManyToMany, "Tag"));
        let tag = Model::new("Tag")
            .field(Field::new("id", ScalarKind::String).id())
            .relation(Relation::new("users", RelationKind::ManyToMany, "User"));

        let schema = ModelSet::new(vec![user, tag]).unwrap();
        let user = schema.model("User").unwrap();
        let tags = user.find_relation("tags").unwrap();

        let junction = schema.junction_info(user, tags).unwrap();
        assert_eq!(junction.table, "_TagToUser");
        // Tag sorts before User, so the parent (User) takes column B.
        assert_eq!(junction.parent_column, "B");
        assert_eq!(junction.child_column, "A");
    }

    #[test]
    fn mismatched_fk_types_are_rejected() {
        let user = Model::new("User").field(Field::new("id", ScalarKind::String).id());
        let post = Model::new("Post")
            .field(Field::new("id", ScalarKind::String).id())
            .field(Field::new("authorId", ScalarKind::Int))
            .relation(
                Relation::new("author", RelationKind::ManyToOne, "User")
                    .on_fields(["authorId"], ["id"]),
            );

        let err = ModelSet::new(vec![user, post]).unwrap_err();
        assert_eq!(err.code(), "schema_error");
    }

    #[test]
    fn illegal_generator_kind_is_rejected() {
        let model = Model::new("User").field(
            Field::new("id", ScalarKind::String)
                .id()
                .generated(GeneratorKind::Increment),
        );

        let err = ModelSet::new(vec![model]).unwrap_err();
        assert_eq!(err.code(), "schema_error");
    }

    #[test]
    fn compound_id_resolves_as_unique_criteria() {
        let model = Model::new("Membership")
            .field(Field::new("userId", ScalarKind::String))
            .field(Field::new("teamId", ScalarKind::String))
            .id_on(NamedKey::new("userId_teamId", ["userId", "teamId"]));

        let schema = ModelSet::new(vec![model]).unwrap();
        let membership = schema.model("Membership").unwrap();

        assert_eq!(
            membership.unique_criteria("userId_teamId"),
            Some(vec!["userId", "teamId"])
        );
        assert_eq!(membership.unique_criteria("userId"), None);
        assert_eq!(membership.id_fields().len(), 2);
    }

    #[test]
    fn duplicate_mapped_columns_are_rejected() {
        let model = Model::new("User")
            .field(Field::new("id", ScalarKind::String).id())
            .field(Field::new("email", ScalarKind::String).mapped("id"));

        assert!(ModelSet::new(vec![model]).is_err());
    }

    #[test]
    fn constant_defaults_validate() {
        let model = Model::new("Counter")
            .field(Field::new("id", ScalarKind::Int).id().generated(GeneratorKind::Increment))
            .field(Field::new("count", ScalarKind::Int).default_value(Value::Int(0)));

        assert!(ModelSet::new(vec![model]).is_ok());
    }
}
