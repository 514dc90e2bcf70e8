use super::field::Field;
use super::relation::Relation;
use crate::error::{Error, Result};
use indexmap::IndexMap;
use std::collections::BTreeSet;

/// A named compound key: constraint name plus the ordered fields it spans.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedKey {
    pub name: String,
    pub fields: Vec<String>,
}

impl NamedKey {
    pub fn new(name: impl Into<String>, fields: impl IntoIterator<Item = impl Into<String>>) -> NamedKey {
        NamedKey {
            name: name.into(),
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexMethod {
    BTree,
    Hash,
    Gin,
    Gist,
}

impl IndexMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            IndexMethod::BTree => "btree",
            IndexMethod::Hash => "hash",
            IndexMethod::Gin => "gin",
            IndexMethod::Gist => "gist",
        }
    }
}

/// A declared index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDef {
    pub name: Option<String>,
    pub fields: Vec<String>,
    pub unique: bool,
    pub method: Option<IndexMethod>,
    /// Raw partial-index predicate, where the dialect supports one.
    pub predicate: Option<String>,
}

impl IndexDef {
    pub fn new(fields: impl IntoIterator<Item = impl Into<String>>) -> IndexDef {
        IndexDef {
            name: None,
            fields: fields.into_iter().map(Into::into).collect(),
            unique: false,
            method: None,
            predicate: None,
        }
    }

    pub fn unique(mut self) -> IndexDef {
        self.unique = true;
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> IndexDef {
        self.name = Some(name.into());
        self
    }

    pub fn using(mut self, method: IndexMethod) -> IndexDef {
        self.method = Some(method);
        self
    }

    pub fn filtered(mut self, predicate: impl Into<String>) -> IndexDef {
        self.predicate = Some(predicate.into());
        self
    }
}

/// A native enum definition shared by enum fields.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumDef {
    pub name: String,
    pub values: Vec<String>,
}

impl EnumDef {
    pub fn new(name: impl Into<String>, values: impl IntoIterator<Item = impl Into<String>>) -> EnumDef {
        EnumDef {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

/// A resolved model: scalar fields in declaration order, relations, indexes
/// and compound constraints.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    pub name: String,
    mapped_name: Option<String>,
    pub fields: IndexMap<String, Field>,
    pub relations: IndexMap<String, Relation>,
    pub compound_id: Option<NamedKey>,
    pub compound_uniques: Vec<NamedKey>,
    pub indexes: Vec<IndexDef>,
    /// Fields excluded from the default projection.
    pub omit: BTreeSet<String>,
}

impl Model {
    pub fn new(name: impl Into<String>) -> Model {
        Model {
            name: name.into(),
            mapped_name: None,
            fields: IndexMap::new(),
            relations: IndexMap::new(),
            compound_id: None,
            compound_uniques: Vec::new(),
            indexes: Vec::new(),
            omit: BTreeSet::new(),
        }
    }

    pub fn mapped(mut self, table: impl Into<String>) -> Model {
        self.mapped_name = Some(table.into());
        self
    }

    pub fn field(mut self, field: Field) -> Model {
        self.fields.insert(field.name.clone(), field);
        self
    }

    pub fn relation(mut self, relation: Relation) -> Model {
        self.relations.insert(relation.name.clone(), relation);
        self
    }

    pub fn id_on(mut self, key: NamedKey) -> Model {
        self.compound_id = Some(key);
        self
    }

    pub fn unique_on(mut self, key: NamedKey) -> Model {
        self.compound_uniques.push(key);
        self
    }

    pub fn index(mut self, index: IndexDef) -> Model {
        self.indexes.push(index);
        self
    }

    pub fn omitted(mut self, field: impl Into<String>) -> Model {
        self.omit.insert(field.into());
        self
    }

    /// The physical table name.
    pub fn db_name(&self) -> &str {
        self.mapped_name.as_deref().unwrap_or(&self.name)
    }

    pub fn find_field(&self, name: &str) -> Result<&Field> {
        self.fields.get(name).ok_or_else(|| Error::UnknownField {
            model: self.name.clone(),
            field: name.to_owned(),
        })
    }

    pub fn find_relation(&self, name: &str) -> Result<&Relation> {
        self.relations.get(name).ok_or_else(|| Error::UnknownRelation {
            model: self.name.clone(),
            relation: name.to_owned(),
        })
    }

    pub fn scalar_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.values()
    }

    /// The id fields: the sole `is_id` field, or the compound id in order.
    pub fn id_fields(&self) -> Vec<&Field> {
        if let Some(field) = self.fields.values().find(|f| f.is_id) {
            return vec![field];
        }
        match &self.compound_id {
            Some(key) => key
                .fields
                .iter()
                .filter_map(|name| self.fields.get(name))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Scalars usable as a unique criteria on their own.
    pub fn unique_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.values().filter(|f| f.is_unique || f.is_id)
    }

    /// Field names of the default projection: every scalar not omitted, in
    /// declaration order.
    pub fn default_selection(&self) -> Vec<&str> {
        self.fields
            .values()
            .filter(|f| !self.omit.contains(&f.name))
            .map(|f| f.name.as_str())
            .collect()
    }

    /// Find the unique criteria matched by the given `where` keys: a single
    /// unique (or id) field, the compound id, or a compound unique referenced
    /// by constraint name.
    pub fn unique_criteria(&self, key: &str) -> Option<Vec<&str>> {
        if let Some(field) = self.fields.get(key) {
            if field.is_unique || field.is_id {
                return Some(vec![field.name.as_str()]);
            }
            return None;
        }

        if let Some(compound) = self.compound_id.as_ref().filter(|k| k.name == key) {
            return Some(compound.fields.iter().map(String::as_str).collect());
        }

        self.compound_uniques
            .iter()
            .find(|k| k.name == key)
            .map(|k| k.fields.iter().map(String::as_str).collect())
    }

    pub(crate) fn validate(&self) -> Result<()> {
        let mut columns = BTreeSet::new();
        for field in self.fields.values() {
            field.validate(&self.name)?;
            if !columns.insert(field.db_name()) {
                return Err(Error::schema(format!(
                    "duplicate column name `{}` on model `{}`",
                    field.db_name(),
                    self.name,
                )));
            }
        }

        for relation in self.relations.keys() {
            if self.fields.contains_key(relation) {
                return Err(Error::schema(format!(
                    "`{relation}` is both a field and a relation on model `{}`",
                    self.name,
                )));
            }
        }

        let id_fields = self.fields.values().filter(|f| f.is_id).count();
        if id_fields > 1 {
            return Err(Error::schema(format!(
                "model `{}` declares more than one id field",
                self.name
            )));
        }
        if id_fields == 1 && self.compound_id.is_some() {
            return Err(Error::schema(format!(
                "model `{}` declares both an id field and a compound id",
                self.name
            )));
        }

        for key in self
            .compound_id
            .iter()
            .chain(self.compound_uniques.iter())
        {
            for field in &key.fields {
                if !self.fields.contains_key(field) {
                    return Err(Error::schema(format!(
                        "compound key `{}` on model `{}` references unknown field `{field}`",
                        key.name, self.name,
                    )));
                }
            }
        }

        for index in &self.indexes {
            for field in &index.fields {
                if !self.fields.contains_key(field) {
                    return Err(Error::schema(format!(
                        "index on model `{}` references unknown field `{field}`",
                        self.name,
                    )));
                }
            }
        }

        Ok(())
    }
}
