use sql_connection::ConnectionError;
use sql_schema_describer::DescriberError;

/// Failures of the schema connector. DDL errors carry the one-line
/// description of the operation that was executing.
#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    #[error("schema serialization failed: {0}")]
    Schema(#[from] query_structure::Error),

    #[error("introspection failed: {0}")]
    Introspection(#[from] DescriberError),

    #[error("ambiguous schema changes left unresolved: {}", .changes.join("; "))]
    AmbiguousUnresolved { changes: Vec<String> },

    #[error("destructive changes rejected: {}", .operations.join("; "))]
    DestructiveRejected { operations: Vec<String> },

    #[error("`{operation}` is not supported on this database")]
    UnsupportedMigration { operation: String },

    #[error("DDL execution failed at `{operation}`: {source}")]
    DdlExecution {
        operation: String,
        source: ConnectionError,
    },
}
