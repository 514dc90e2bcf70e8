use crate::arguments::QueryArguments;
use crate::filter::Filter;
use crate::schema::Model;

/// The projection of one query level: scalar columns, relation subtrees and
/// relation counts, in payload order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldSelection {
    pub entries: Vec<SelectedField>,
}

impl FieldSelection {
    /// The default projection of a model: every non-omitted scalar, in
    /// declaration order.
    pub fn default_scalars(model: &Model) -> FieldSelection {
        FieldSelection {
            entries: model
                .default_selection()
                .into_iter()
                .map(|name| SelectedField::Scalar(name.to_owned()))
                .collect(),
        }
    }

    pub fn scalars(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().filter_map(|entry| match entry {
            SelectedField::Scalar(name) => Some(name.as_str()),
            _ => None,
        })
    }

    pub fn relations(&self) -> impl Iterator<Item = &RelationSelection> {
        self.entries.iter().filter_map(|entry| match entry {
            SelectedField::Relation(rs) => Some(rs),
            _ => None,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectedField {
    Scalar(String),
    Relation(RelationSelection),
    /// `_count: { select: { relation: { where? } } }`
    RelationCount { relation: String, filter: Option<Filter> },
}

/// A relation subtree in `select`/`include`, carrying its own arguments and
/// nested projection.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationSelection {
    pub relation: String,
    pub args: QueryArguments,
    pub nested: FieldSelection,
}

/// One aggregate selection of an `aggregate`/`groupBy` operation.
#[derive(Debug, Clone, PartialEq)]
pub enum AggregationSelection {
    Count { all: bool, fields: Vec<String> },
    Sum(Vec<String>),
    Average(Vec<String>),
    Min(Vec<String>),
    Max(Vec<String>),
}
