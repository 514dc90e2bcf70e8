use model_value::Value;

/// A filter tree, the typed form of a `where` payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Vec<Filter>),
    Scalar(ScalarFilter),
    Relation(RelationFilter),
}

impl Filter {
    pub fn empty() -> Filter {
        Filter::And(Vec::new())
    }

    /// Whether the filter reduces to no predicate at all.
    pub fn is_empty(&self) -> bool {
        match self {
            Filter::And(children) | Filter::Or(children) | Filter::Not(children) => {
                children.iter().all(Filter::is_empty)
            }
            _ => false,
        }
    }

    pub fn and(filters: Vec<Filter>) -> Filter {
        match filters.len() {
            1 => filters.into_iter().next().unwrap(),
            _ => Filter::And(filters),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryMode {
    #[default]
    Default,
    Insensitive,
}

/// A condition on a single scalar field.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarFilter {
    pub field: String,
    pub condition: ScalarCondition,
    pub mode: QueryMode,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScalarCondition {
    Equals(Value),
    NotEquals(Value),
    In(Vec<Value>),
    NotIn(Vec<Value>),
    LessThan(Value),
    LessThanOrEquals(Value),
    GreaterThan(Value),
    GreaterThanOrEquals(Value),
    Contains(Value),
    NotContains(Value),
    StartsWith(Value),
    NotStartsWith(Value),
    EndsWith(Value),
    NotEndsWith(Value),
    // Scalar list operators.
    Has(Value),
    HasEvery(Vec<Value>),
    HasSome(Vec<Value>),
    IsEmpty(bool),
    // Structured operators.
    Json(JsonCondition),
    Vector(VectorCondition),
    Geometry(GeometryCondition),
    /// General negation for operators without a dedicated inverse spelling.
    Not(Box<ScalarCondition>),
}

impl ScalarCondition {
    /// Logical negation. Double negation collapses; operators with a
    /// dedicated inverse spelling flip to it.
    pub fn negate(self) -> ScalarCondition {
        match self {
            ScalarCondition::Equals(v) => ScalarCondition::NotEquals(v),
            ScalarCondition::NotEquals(v) => ScalarCondition::Equals(v),
            ScalarCondition::In(v) => ScalarCondition::NotIn(v),
            ScalarCondition::NotIn(v) => ScalarCondition::In(v),
            ScalarCondition::Contains(v) => ScalarCondition::NotContains(v),
            ScalarCondition::NotContains(v) => ScalarCondition::Contains(v),
            ScalarCondition::StartsWith(v) => ScalarCondition::NotStartsWith(v),
            ScalarCondition::NotStartsWith(v) => ScalarCondition::StartsWith(v),
            ScalarCondition::EndsWith(v) => ScalarCondition::NotEndsWith(v),
            ScalarCondition::NotEndsWith(v) => ScalarCondition::EndsWith(v),
            ScalarCondition::IsEmpty(b) => ScalarCondition::IsEmpty(!b),
            ScalarCondition::Not(inner) => *inner,
            other => ScalarCondition::Not(Box::new(other)),
        }
    }

    /// The payload spelling, for error messages.
    pub fn operator_name(&self) -> &'static str {
        match self {
            ScalarCondition::Equals(_) => "equals",
            ScalarCondition::NotEquals(_) => "not",
            ScalarCondition::In(_) => "in",
            ScalarCondition::NotIn(_) => "notIn",
            ScalarCondition::LessThan(_) => "lt",
            ScalarCondition::LessThanOrEquals(_) => "lte",
            ScalarCondition::GreaterThan(_) => "gt",
            ScalarCondition::GreaterThanOrEquals(_) => "gte",
            ScalarCondition::Contains(_) | ScalarCondition::NotContains(_) => "contains",
            ScalarCondition::StartsWith(_) | ScalarCondition::NotStartsWith(_) => "startsWith",
            ScalarCondition::EndsWith(_) | ScalarCondition::NotEndsWith(_) => "endsWith",
            ScalarCondition::Has(_) => "has",
            ScalarCondition::HasEvery(_) => "hasEvery",
            ScalarCondition::HasSome(_) => "hasSome",
            ScalarCondition::IsEmpty(_) => "isEmpty",
            ScalarCondition::Json(_) => "json",
            ScalarCondition::Vector(_) => "vector",
            ScalarCondition::Geometry(_) => "geometry",
            ScalarCondition::Not(inner) => inner.operator_name(),
        }
    }
}

/// One segment of a JSON path: an object key or an array index.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonPathSegment {
    Key(String),
    Index(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct JsonCondition {
    pub path: Option<Vec<JsonPathSegment>>,
    pub op: JsonOp,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JsonOp {
    Equals(Value),
    NotEquals(Value),
    StringContains(String),
    StringStartsWith(String),
    StringEndsWith(String),
    ArrayContains(Value),
    ArrayStartsWith(Value),
    ArrayEndsWith(Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorMetric {
    L2,
    Cosine,
}

/// Comparison on the distance between a vector column and a reference
/// vector.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorCondition {
    pub metric: VectorMetric,
    pub reference: Vec<f32>,
    pub comparison: Box<ScalarCondition>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeometryCondition {
    pub op: GeometryOp,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GeometryOp {
    Equals,
    Intersects,
    Contains,
    Within,
    Crosses,
    Overlaps,
    Touches,
    Covers,
    DWithin { distance: f64 },
}

/// Conditions linking a parent row to related records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationCondition {
    /// `some`: at least one related record matches.
    AtLeastOneRelatedRecord,
    /// `every`: no related record fails the filter.
    EveryRelatedRecord,
    /// `none`: no related record matches.
    NoRelatedRecord,
    /// `is`: the to-one related record matches (or, with an empty filter,
    /// exists).
    ToOneRelatedRecord,
    /// `isNot`: the to-one related record does not match.
    NotToOneRelatedRecord,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelationFilter {
    pub relation: String,
    pub condition: RelationCondition,
    pub nested: Box<Filter>,
}

/// Aggregate comparison used in `groupBy.having`.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateFilter {
    pub func: crate::order_by::AggregateFunction,
    /// `None` targets `_all` (count only).
    pub field: Option<String>,
    pub condition: ScalarCondition,
}

/// The `having` tree: scalar conditions over grouped fields plus aggregate
/// conditions.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupFilter {
    And(Vec<GroupFilter>),
    Or(Vec<GroupFilter>),
    Not(Vec<GroupFilter>),
    Scalar(ScalarFilter),
    Aggregate(AggregateFilter),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_negation_collapses() {
        let original = ScalarCondition::LessThan(Value::Int(5));
        let negated = original.clone().negate();
        assert_eq!(negated, ScalarCondition::Not(Box::new(original.clone())));
        assert_eq!(negated.negate(), original);
    }

    #[test]
    fn negation_uses_inverse_spellings() {
        assert_eq!(
            ScalarCondition::Equals(Value::Int(1)).negate(),
            ScalarCondition::NotEquals(Value::Int(1))
        );
        assert_eq!(
            ScalarCondition::In(vec![Value::Int(1)]).negate(),
            ScalarCondition::NotIn(vec![Value::Int(1)])
        );
    }

    #[test]
    fn empty_filters_reduce() {
        assert!(Filter::empty().is_empty());
        assert!(Filter::And(vec![Filter::Or(vec![])]).is_empty());
        assert!(!Filter::Scalar(ScalarFilter {
            field: "id".into(),
            condition: ScalarCondition::Equals(Value::Int(1)),
            mode: QueryMode::Default,
        })
        .is_empty());
    }
}
