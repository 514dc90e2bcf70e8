//! The schema side of the engine: serialize the resolved model set into a
//! [`sql_schema_describer::SqlSchema`], diff it against a live database, and
//! drive the push pipeline that renders and applies the migration DDL.

mod destructive_check;
mod error;
mod migration;
mod push;
mod rename_resolver;
mod sql_renderer;
mod sql_schema_calculator;
mod sql_schema_differ;

pub use destructive_check::destructive_descriptions;
pub use error::ConnectorError;
pub use migration::MigrationStep;
pub use push::{generate_ddl, push, PushOptions, PushResult};
pub use rename_resolver::{RenameResolver, ResolverDecision};
pub use sql_renderer::{render_step, RenderedStep};
pub use sql_schema_calculator::calculate_sql_schema;
pub use sql_schema_differ::{diff, AmbiguousChange, DiffResult};

use sql_connection::Queryable;
use sql_schema_describer::{DescriberResult, SqlSchema};

/// Introspect the live database into a snapshot. Re-exported here so the
/// connector is the one-stop surface for push consumers.
pub async fn introspect(conn: &dyn Queryable) -> DescriberResult<SqlSchema> {
    sql_schema_describer::describe(conn).await
}

/// Serialize the model set into the snapshot shape for the given dialect.
pub fn serialize_models(
    models: &query_structure::ModelSet,
    dialect: &dyn sql_dialect::Dialect,
) -> Result<SqlSchema, query_structure::Error> {
    calculate_sql_schema(models, dialect)
}
