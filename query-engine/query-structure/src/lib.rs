//! The resolved schema model and the typed query intermediate representation.
//!
//! Consumers hand the engine a [`ModelSet`] (built once at client startup and
//! immutable afterwards) plus JSON query payloads. Payload parsing lives here
//! too: it turns the dynamic payload tree into the closed sum types the SQL
//! builder traverses, rejecting unknown keys and ill-typed filters up front.

mod arguments;
mod error;
mod filter;
mod operation;
mod order_by;
mod parse;
mod schema;
mod selection;
mod write;

pub mod prelude;

pub use arguments::{QueryArguments, UniqueFilter};
pub use error::{Error, Result};
pub use filter::{
    AggregateFilter, Filter, GeometryCondition, GeometryOp, GroupFilter, JsonCondition, JsonOp,
    JsonPathSegment, QueryMode, RelationCondition, RelationFilter, ScalarCondition, ScalarFilter,
    VectorCondition, VectorMetric,
};
pub use operation::Operation;
pub use order_by::{AggregateFunction, NullsOrder, OrderBy, OrderByTarget, SortOrder};
pub use parse::{parse_payload, ParsedPayload};
pub use schema::{
    DefaultValue, EnumDef, Field, FieldArity, GeneratorKind, IndexDef, IndexMethod, JunctionConfig,
    Model, ModelSet, NamedKey, Relation, RelationKind, ReferentialAction, ScalarKind,
};
pub use selection::{AggregationSelection, FieldSelection, RelationSelection, SelectedField};
pub use write::{NestedWrite, NestedWriteOp, WriteArgs, WriteData, WriteOperation};

pub use model_value::Value;
pub use sql_connection::SqlFamily;
