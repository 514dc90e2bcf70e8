//! Convenience re-exports for downstream crates.

pub use crate::arguments::{QueryArguments, UniqueFilter};
pub use crate::error::{Error, Result};
pub use crate::filter::*;
pub use crate::operation::Operation;
pub use crate::order_by::{AggregateFunction, NullsOrder, OrderBy, OrderByTarget, SortOrder};
pub use crate::parse::{parse_payload, ParsedPayload};
pub use crate::schema::*;
pub use crate::selection::{AggregationSelection, FieldSelection, RelationSelection, SelectedField};
pub use crate::write::{NestedWrite, NestedWriteOp, WriteArgs, WriteData, WriteOperation};

pub use model_value::Value;
pub use sql_connection::SqlFamily;
