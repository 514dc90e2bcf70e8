//! Dialect-independent snapshots of a physical database schema, plus the
//! introspectors that read a live database into one through the driver
//! boundary. Introspection never mutates the database.

mod mysql;
mod postgres;
mod sqlite;

use serde::{Deserialize, Serialize};
use sql_connection::{ConnectionError, Queryable, SqlFamily};

#[derive(Debug, thiserror::Error)]
pub enum DescriberError {
    #[error("introspection query failed: {0}")]
    Connection(#[from] ConnectionError),
    #[error("unexpected introspection data: {0}")]
    UnexpectedShape(String),
}

pub type DescriberResult<T> = Result<T, DescriberError>;

/// Introspect the connected database into a [`SqlSchema`].
pub async fn describe(conn: &dyn Queryable) -> DescriberResult<SqlSchema> {
    let mut schema = match conn.sql_family() {
        SqlFamily::Postgres => postgres::describe(conn).await?,
        SqlFamily::Mysql => mysql::describe(conn).await?,
        SqlFamily::Sqlite => sqlite::describe(conn).await?,
    };
    schema.normalize();
    Ok(schema)
}

/// The normalized snapshot the differ consumes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SqlSchema {
    pub tables: Vec<Table>,
    pub enums: Vec<Enum>,
}

impl SqlSchema {
    pub fn empty() -> SqlSchema {
        SqlSchema::default()
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn get_enum(&self, name: &str) -> Option<&Enum> {
        self.enums.iter().find(|e| e.name == name)
    }

    /// Sort tables, enums and their members into a canonical order so
    /// snapshots compare independently of discovery order.
    pub fn normalize(&mut self) {
        self.tables.sort_by(|a, b| a.name.cmp(&b.name));
        for table in &mut self.tables {
            table.indices.sort_by(|a, b| a.name.cmp(&b.name));
            table.foreign_keys.sort_by(|a, b| a.columns.cmp(&b.columns));
        }
        self.enums.sort_by(|a, b| a.name.cmp(&b.name));
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    pub indices: Vec<Index>,
    pub primary_key: Option<PrimaryKey>,
    pub foreign_keys: Vec<ForeignKey>,
    /// Dialect-native table options (e.g. a MySQL storage engine clause),
    /// carried verbatim.
    #[serde(default)]
    pub options: Option<String>,
}

impl Table {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn is_part_of_primary_key(&self, column: &str) -> bool {
        self.primary_key
            .as_ref()
            .map(|pk| pk.columns.iter().any(|c| c == column))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub tpe: ColumnType,
    /// Normalized default expression, dialect casts stripped.
    pub default: Option<String>,
    pub auto_increment: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnType {
    /// The dialect type as written in DDL, e.g. `varchar(191)`.
    pub full_data_type: String,
    pub family: ColumnTypeFamily,
    pub arity: ColumnArity,
}

impl ColumnType {
    pub fn pure(family: ColumnTypeFamily, arity: ColumnArity, full_data_type: impl Into<String>) -> ColumnType {
        ColumnType {
            full_data_type: full_data_type.into(),
            family,
            arity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnTypeFamily {
    Int,
    BigInt,
    Float,
    Decimal,
    Boolean,
    String,
    DateTime,
    Date,
    Time,
    Json,
    Binary,
    Enum(String),
    Vector,
    Geometric,
    /// A type the engine cannot map; carried verbatim.
    Unsupported(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnArity {
    Required,
    Nullable,
    List,
}

impl ColumnArity {
    pub fn is_nullable(self) -> bool {
        matches!(self, ColumnArity::Nullable)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimaryKey {
    pub columns: Vec<String>,
    pub constraint_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Index {
    pub name: String,
    pub columns: Vec<String>,
    pub tpe: IndexType,
    /// Index method where the dialect exposes one (btree, hash, gin, gist).
    pub method: Option<String>,
    /// Partial-index predicate where supported.
    pub predicate: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexType {
    Unique,
    Normal,
}

impl IndexType {
    pub fn is_unique(self) -> bool {
        matches!(self, IndexType::Unique)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub constraint_name: Option<String>,
    pub columns: Vec<String>,
    pub referenced_table: String,
    pub referenced_columns: Vec<String>,
    pub on_delete_action: ForeignKeyAction,
    pub on_update_action: ForeignKeyAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForeignKeyAction {
    NoAction,
    Restrict,
    Cascade,
    SetNull,
    SetDefault,
}

impl ForeignKeyAction {
    pub fn from_text(text: &str) -> ForeignKeyAction {
        match text.to_uppercase().as_str() {
            "CASCADE" => ForeignKeyAction::Cascade,
            "SET NULL" => ForeignKeyAction::SetNull,
            "SET DEFAULT" => ForeignKeyAction::SetDefault,
            "RESTRICT" => ForeignKeyAction::Restrict,
            _ => ForeignKeyAction::NoAction,
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            ForeignKeyAction::NoAction => "NO ACTION",
            ForeignKeyAction::Restrict => "RESTRICT",
            ForeignKeyAction::Cascade => "CASCADE",
            ForeignKeyAction::SetNull => "SET NULL",
            ForeignKeyAction::SetDefault => "SET DEFAULT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enum {
    pub name: String,
    pub values: Vec<String>,
}

/// Strip dialect-specific casts from a default expression where safely
/// recoverable, e.g. `'x'::text` → `'x'` and `nextval('seq'::regclass)` is
/// handled by the caller as auto-increment.
pub(crate) fn normalize_default(raw: &str) -> String {
    static CAST: once_cell::sync::Lazy<regex::Regex> =
        once_cell::sync::Lazy::new(|| regex::Regex::new(r"::[a-zA-Z_ ]+(\[\])?$").unwrap());

    CAST.replace(raw.trim(), "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_lose_their_casts() {
        assert_eq!(normalize_default("'hello'::text"), "'hello'");
        assert_eq!(normalize_default("0"), "0");
        assert_eq!(normalize_default("'{}'::jsonb"), "'{}'");
        assert_eq!(normalize_default("CURRENT_TIMESTAMP"), "CURRENT_TIMESTAMP");
    }

    #[test]
    fn snapshots_serialize_round_trip() {
        let schema = SqlSchema {
            tables: vec![Table {
                name: "user".into(),
                columns: vec![Column {
                    name: "id".into(),
                    tpe: ColumnType::pure(ColumnTypeFamily::String, ColumnArity::Required, "text"),
                    default: None,
                    auto_increment: false,
                }],
                indices: vec![],
                primary_key: Some(PrimaryKey {
                    columns: vec!["id".into()],
                    constraint_name: None,
                }),
                foreign_keys: vec![],
                options: None,
            }],
            enums: vec![Enum {
                name: "color".into(),
                values: vec!["red".into(), "blue".into()],
            }],
        };

        let text = serde_json::to_string(&schema).unwrap();
        let back: SqlSchema = serde_json::from_str(&text).unwrap();
        assert_eq!(back, schema);
    }

    #[test]
    fn normalization_orders_tables_by_name() {
        let mut schema = SqlSchema {
            tables: vec![
                Table {
                    name: "b".into(),
                    ..Default::default()
                },
                Table {
                    name: "a".into(),
                    ..Default::default()
                },
            ],
            enums: vec![],
        };
        schema.normalize();
        assert_eq!(schema.tables[0].name, "a");
        assert_eq!(schema.tables[1].name, "b");
    }
}
