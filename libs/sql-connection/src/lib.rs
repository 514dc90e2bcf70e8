//! The driver boundary.
//!
//! The engine never talks to a database directly; it hands [`query_template::Sql`]
//! values to a caller-supplied [`Queryable`] and consumes [`ResultSet`]s in
//! return. Pooling, TLS, and transaction orchestration live on the driver
//! side of this boundary.

mod error;
mod result_set;

pub use error::{ConnectionError, ErrorClass};
pub use result_set::{ResultRow, ResultSet};

use async_trait::async_trait;
use model_value::Value;
use query_template::{PlaceholderStyle, Sql};
use serde::{Deserialize, Serialize};

/// Tag identifying which database a driver talks to. Matched against the
/// dialect adapter at client construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlFamily {
    #[serde(rename = "postgresql")]
    Postgres,
    Mysql,
    Sqlite,
}

impl SqlFamily {
    pub fn placeholder_style(self) -> PlaceholderStyle {
        match self {
            SqlFamily::Postgres => PlaceholderStyle::Dollar,
            SqlFamily::Mysql | SqlFamily::Sqlite => PlaceholderStyle::Question,
        }
    }

    pub fn is_postgres(self) -> bool {
        matches!(self, SqlFamily::Postgres)
    }

    pub fn is_mysql(self) -> bool {
        matches!(self, SqlFamily::Mysql)
    }

    pub fn is_sqlite(self) -> bool {
        matches!(self, SqlFamily::Sqlite)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SqlFamily::Postgres => "postgresql",
            SqlFamily::Mysql => "mysql",
            SqlFamily::Sqlite => "sqlite",
        }
    }
}

/// A connection (or pool handle) capable of executing statements.
#[async_trait]
pub trait Queryable: Send + Sync {
    fn sql_family(&self) -> SqlFamily;

    /// Execute a statement and return the rows plus affected-row count.
    async fn execute(&self, sql: &Sql) -> Result<ResultSet, ConnectionError>;

    /// Execute raw text with positional parameters, bypassing rendering.
    async fn execute_raw(&self, sql: &str, params: &[Value]) -> Result<u64, ConnectionError>;

    /// Run a parameterless command (DDL, transaction control).
    async fn raw_cmd(&self, sql: &str) -> Result<(), ConnectionError> {
        self.execute_raw(sql, &[]).await.map(drop)
    }

    /// Whether the database runs DDL transactionally. Callers wrap migration
    /// scripts accordingly; MySQL commits each DDL statement implicitly.
    fn supports_transactional_ddl(&self) -> bool {
        !matches!(self.sql_family(), SqlFamily::Mysql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_tags_round_trip_serde() {
        for family in [SqlFamily::Postgres, SqlFamily::Mysql, SqlFamily::Sqlite] {
            let text = serde_json::to_string(&family).unwrap();
            let back: SqlFamily = serde_json::from_str(&text).unwrap();
            assert_eq!(back, family);
        }
    }

    #[test]
    fn postgres_uses_dollar_placeholders() {
        assert_eq!(SqlFamily::Postgres.placeholder_style(), PlaceholderStyle::Dollar);
        assert_eq!(SqlFamily::Mysql.placeholder_style(), PlaceholderStyle::Question);
        assert_eq!(SqlFamily::Sqlite.placeholder_style(), PlaceholderStyle::Question);
    }
}
