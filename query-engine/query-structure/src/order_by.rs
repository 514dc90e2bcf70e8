#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }

    pub fn reverse(self) -> SortOrder {
        match self {
            SortOrder::Asc => SortOrder::Desc,
            SortOrder::Desc => SortOrder::Asc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullsOrder {
    First,
    Last,
}

impl NullsOrder {
    pub fn as_sql(self) -> &'static str {
        match self {
            NullsOrder::First => "NULLS FIRST",
            NullsOrder::Last => "NULLS LAST",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateFunction {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateFunction {
    pub fn as_sql(self) -> &'static str {
        match self {
            AggregateFunction::Count => "COUNT",
            AggregateFunction::Sum => "SUM",
            AggregateFunction::Avg => "AVG",
            AggregateFunction::Min => "MIN",
            AggregateFunction::Max => "MAX",
        }
    }

    pub fn payload_key(self) -> &'static str {
        match self {
            AggregateFunction::Count => "_count",
            AggregateFunction::Sum => "_sum",
            AggregateFunction::Avg => "_avg",
            AggregateFunction::Min => "_min",
            AggregateFunction::Max => "_max",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OrderByTarget {
    Scalar(String),
    /// Ordering over an aggregate, legal in `groupBy`/`aggregate` and for
    /// relation `_count`.
    Aggregate {
        func: AggregateFunction,
        /// `None` means `_all`.
        field: Option<String>,
    },
    /// Ordering by the row count of a to-many relation.
    RelationCount(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub target: OrderByTarget,
    pub direction: SortOrder,
    pub nulls: Option<NullsOrder>,
}

impl OrderBy {
    pub fn scalar(field: impl Into<String>, direction: SortOrder) -> OrderBy {
        OrderBy {
            target: OrderByTarget::Scalar(field.into()),
            direction,
            nulls: None,
        }
    }
}
