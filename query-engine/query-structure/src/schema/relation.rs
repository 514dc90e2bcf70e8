use once_cell::sync::OnceCell;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
}

impl RelationKind {
    /// Whether traversing the relation yields at most one record.
    pub fn is_to_one(self) -> bool {
        matches!(self, RelationKind::OneToOne | RelationKind::ManyToOne)
    }

    pub fn is_many_to_many(self) -> bool {
        matches!(self, RelationKind::ManyToMany)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferentialAction {
    Cascade,
    SetNull,
    Restrict,
    NoAction,
}

/// Explicit junction-table configuration for a many-to-many relation. When
/// absent, the junction is derived: `_{A}To{B}` with the model names in
/// lexicographic order and columns `A` and `B`.
#[derive(Debug, Clone, PartialEq)]
pub struct JunctionConfig {
    pub table: Option<String>,
    pub column_a: String,
    pub column_b: String,
}

impl Default for JunctionConfig {
    fn default() -> Self {
        JunctionConfig {
            table: None,
            column_a: "A".to_owned(),
            column_b: "B".to_owned(),
        }
    }
}

/// A relation entry on a model.
///
/// The target model is referenced by logical name and resolved lazily on
/// first traversal; the resolved arena index is memoized, which keeps cyclic
/// and self-referencing schemas free of ownership cycles.
#[derive(Debug, Clone)]
pub struct Relation {
    pub name: String,
    pub kind: RelationKind,
    pub(crate) target: String,
    pub(crate) target_idx: OnceCell<usize>,
    /// Local FK field names, present on owning sides only.
    pub fields: Vec<String>,
    /// Referenced field names on the target, present on owning sides only.
    pub references: Vec<String>,
    /// Shared label pairing the two sides of a relation when several
    /// relations connect the same pair of models.
    pub label: Option<String>,
    pub junction: Option<JunctionConfig>,
    pub on_delete: ReferentialAction,
    pub on_update: ReferentialAction,
    pub required: bool,
}

impl Relation {
    pub fn new(name: impl Into<String>, kind: RelationKind, target: impl Into<String>) -> Relation {
        Relation {
            name: name.into(),
            kind,
            target: target.into(),
            target_idx: OnceCell::new(),
            fields: Vec::new(),
            references: Vec::new(),
            label: None,
            junction: None,
            on_delete: ReferentialAction::Restrict,
            on_update: ReferentialAction::Cascade,
            required: false,
        }
    }

    pub fn on_fields(
        mut self,
        fields: impl IntoIterator<Item = impl Into<String>>,
        references: impl IntoIterator<Item = impl Into<String>>,
    ) -> Relation {
        self.fields = fields.into_iter().map(Into::into).collect();
        self.references = references.into_iter().map(Into::into).collect();
        self
    }

    pub fn labeled(mut self, label: impl Into<String>) -> Relation {
        self.label = Some(label.into());
        self
    }

    pub fn with_junction(mut self, junction: JunctionConfig) -> Relation {
        self.junction = Some(junction);
        self
    }

    pub fn actions(mut self, on_delete: ReferentialAction, on_update: ReferentialAction) -> Relation {
        self.on_delete = on_delete;
        self.on_update = on_update;
        self
    }

    pub fn required_relation(mut self) -> Relation {
        self.required = true;
        self
    }

    pub fn target_name(&self) -> &str {
        &self.target
    }

    /// Whether this side carries the foreign key columns.
    pub fn is_owning_side(&self) -> bool {
        !self.fields.is_empty()
    }
}

impl PartialEq for Relation {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.kind == other.kind
            && self.target == other.target
            && self.fields == other.fields
            && self.references == other.references
            && self.label == other.label
            && self.junction == other.junction
            && self.on_delete == other.on_delete
            && self.on_update == other.on_update
            && self.required == other.required
    }
}
