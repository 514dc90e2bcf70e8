use crate::filter::Filter;
use crate::order_by::OrderBy;
use model_value::Value;

/// A resolved unique criteria: the matched fields with their values, in
/// criteria order. Produced from `whereUnique`-shaped payloads and cursors.
#[derive(Debug, Clone, PartialEq)]
pub struct UniqueFilter {
    pub fields: Vec<(String, Value)>,
}

impl UniqueFilter {
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }
}

/// The read arguments shared by every list-shaped operation: filtering,
/// ordering, pagination and distinct.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryArguments {
    pub filter: Option<Filter>,
    pub order_by: Vec<OrderBy>,
    pub cursor: Option<UniqueFilter>,
    pub take: Option<i64>,
    pub skip: Option<i64>,
    pub distinct: Vec<String>,
}

impl QueryArguments {
    pub fn with_filter(filter: Filter) -> QueryArguments {
        QueryArguments {
            filter: Some(filter),
            ..Default::default()
        }
    }

    pub fn has_pagination(&self) -> bool {
        self.take.is_some() || self.skip.is_some() || self.cursor.is_some()
    }
}
