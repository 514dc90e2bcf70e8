//! Renders migration steps into DDL for the configured dialect. A step may
//! render to several statements; statements in `deferred` run after every
//! step's main statements so new tables exist before the foreign keys that
//! reference them.

use crate::error::ConnectorError;
use crate::migration::MigrationStep;
use itertools::Itertools;
use query_template::Sql;
use sql_connection::SqlFamily;
use sql_dialect::Dialect;
use sql_schema_describer::{Column, ForeignKey, Index, Table};

#[derive(Debug, Default)]
pub struct RenderedStep {
    pub statements: Vec<Sql>,
    pub deferred: Vec<Sql>,
}

impl RenderedStep {
    fn one(sql: impl Into<String>) -> RenderedStep {
        RenderedStep {
            statements: vec![Sql::raw(sql.into())],
            deferred: Vec::new(),
        }
    }
}

pub fn render_step(step: &MigrationStep, dialect: &dyn Dialect) -> Result<RenderedStep, ConnectorError> {
    let family = dialect.family();
    let quote = |name: &str| dialect.quote_ident(name);

    let unsupported = || ConnectorError::UnsupportedMigration {
        operation: step.to_string(),
    };

    let rendered = match step {
        MigrationStep::CreateEnum { enum_def } => match family {
            SqlFamily::Postgres => RenderedStep::one(format!(
                "CREATE TYPE {} AS ENUM ({})",
                quote(&enum_def.name),
                enum_def.values.iter().map(|v| quote_string(v)).join(", "),
            )),
            _ => return Err(unsupported()),
        },
        MigrationStep::AlterEnum {
            name,
            added_values,
            removed_values,
        } => {
            if !removed_values.is_empty() || family != SqlFamily::Postgres {
                return Err(unsupported());
            }
            RenderedStep {
                statements: added_values
                    .iter()
                    .map(|value| {
                        Sql::raw(format!(
                            "ALTER TYPE {} ADD VALUE {}",
                            quote(name),
                            quote_string(value)
                        ))
                    })
                    .collect(),
                deferred: Vec::new(),
            }
        }
        MigrationStep::DropEnum { name } => match family {
            SqlFamily::Postgres => RenderedStep::one(format!("DROP TYPE {}", quote(name))),
            _ => return Err(unsupported()),
        },
        MigrationStep::CreateTable { table } => render_create_table(table, dialect)?,
        MigrationStep::DropTable { name } => {
            RenderedStep::one(format!("DROP TABLE {}", quote(name)))
        }
        MigrationStep::RenameTable { from, to } => match family {
            SqlFamily::Mysql => {
                RenderedStep::one(format!("RENAME TABLE {} TO {}", quote(from), quote(to)))
            }
            _ => RenderedStep::one(format!(
                "ALTER TABLE {} RENAME TO {}",
                quote(from),
                quote(to)
            )),
        },
        MigrationStep::AlterTableOptions { table, options } => match (family, options) {
            (SqlFamily::Mysql, Some(options)) => {
                RenderedStep::one(format!("ALTER TABLE {} {options}", quote(table)))
            }
            _ => return Err(unsupported()),
        },
        MigrationStep::AddColumn { table, column } => RenderedStep::one(format!(
            "ALTER TABLE {} ADD COLUMN {}",
            quote(table),
            render_column_def(column, dialect, false),
        )),
        MigrationStep::DropColumn { table, column } => RenderedStep::one(format!(
            "ALTER TABLE {} DROP COLUMN {}",
            quote(table),
            quote(column),
        )),
        MigrationStep::RenameColumn { table, from, to } => RenderedStep::one(format!(
            "ALTER TABLE {} RENAME COLUMN {} TO {}",
            quote(table),
            quote(from),
            quote(to),
        )),
        MigrationStep::AlterColumnType { table, column, .. } => match family {
            SqlFamily::Postgres => RenderedStep::one(format!(
                "ALTER TABLE {} ALTER COLUMN {} SET DATA TYPE {}",
                quote(table),
                quote(&column.name),
                column.tpe.full_data_type,
            )),
            SqlFamily::Mysql => RenderedStep::one(format!(
                "ALTER TABLE {} MODIFY {}",
                quote(table),
                render_column_def(column, dialect, false),
            )),
            SqlFamily::Sqlite => return Err(unsupported()),
        },
        MigrationStep::AlterColumnNullable { table, column, nullable } => match family {
            SqlFamily::Postgres => RenderedStep::one(format!(
                "ALTER TABLE {} ALTER COLUMN {} {} NOT NULL",
                quote(table),
                quote(&column.name),
                if *nullable { "DROP" } else { "SET" },
            )),
            SqlFamily::Mysql => RenderedStep::one(format!(
                "ALTER TABLE {} MODIFY {}",
                quote(table),
                render_column_def(column, dialect, false),
            )),
            SqlFamily::Sqlite => return Err(unsupported()),
        },
        MigrationStep::AlterColumnDefault { table, column, default } => match family {
            SqlFamily::Sqlite => return Err(unsupported()),
            _ => match default {
                Some(default) => RenderedStep::one(format!(
                    "ALTER TABLE {} ALTER COLUMN {} SET DEFAULT {default}",
                    quote(table),
                    quote(&column.name),
                )),
                None => RenderedStep::one(format!(
                    "ALTER TABLE {} ALTER COLUMN {} DROP DEFAULT",
                    quote(table),
                    quote(&column.name),
                )),
            },
        },
        MigrationStep::AddPrimaryKey { table, primary_key } => match family {
            SqlFamily::Sqlite => return Err(unsupported()),
            _ => RenderedStep::one(format!(
                "ALTER TABLE {} ADD PRIMARY KEY ({})",
                quote(table),
                primary_key.columns.iter().map(|c| quote(c)).join(", "),
            )),
        },
        MigrationStep::DropPrimaryKey { table, constraint_name } => match family {
            SqlFamily::Postgres => {
                let name = constraint_name
                    .clone()
                    .unwrap_or_else(|| format!("{table}_pkey"));
                RenderedStep::one(format!(
                    "ALTER TABLE {} DROP CONSTRAINT {}",
                    quote(table),
                    quote(&name),
                ))
            }
            SqlFamily::Mysql => {
                RenderedStep::one(format!("ALTER TABLE {} DROP PRIMARY KEY", quote(table)))
            }
            SqlFamily::Sqlite => return Err(unsupported()),
        },
        MigrationStep::AddUnique { table, index } | MigrationStep::AddIndex { table, index } => {
            RenderedStep::one(render_create_index(table, index, dialect))
        }
        MigrationStep::DropUnique { table, name } | MigrationStep::DropIndex { table, name } => {
            match family {
                SqlFamily::Mysql => RenderedStep::one(format!(
                    "DROP INDEX {} ON {}",
                    quote(name),
                    quote(table)
                )),
                _ => RenderedStep::one(format!("DROP INDEX {}", quote(name))),
            }
        }
        MigrationStep::AddForeignKey { table, foreign_key } => match family {
            SqlFamily::Sqlite => return Err(unsupported()),
            _ => RenderedStep::one(render_add_foreign_key(table, foreign_key, dialect)),
        },
        MigrationStep::DropForeignKey {
            table,
            constraint_name,
            ..
        } => {
            let name = constraint_name.as_deref().ok_or_else(unsupported)?;
            match family {
                SqlFamily::Postgres => RenderedStep::one(format!(
                    "ALTER TABLE {} DROP CONSTRAINT {}",
                    quote(table),
                    quote(name),
                )),
                SqlFamily::Mysql => RenderedStep::one(format!(
                    "ALTER TABLE {} DROP FOREIGN KEY {}",
                    quote(table),
                    quote(name),
                )),
                SqlFamily::Sqlite => return Err(unsupported()),
            }
        }
    };

    Ok(rendered)
}

fn quote_string(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// A column definition as it appears in CREATE TABLE / ADD COLUMN /
/// MODIFY. `inline_rowid_pk` marks SQLite's `INTEGER PRIMARY KEY
/// AUTOINCREMENT` special case.
fn render_column_def(column: &Column, dialect: &dyn Dialect, inline_rowid_pk: bool) -> String {
    let family = dialect.family();
    let mut out = dialect.quote_ident(&column.name);
    out.push(' ');

    match (family, column.auto_increment) {
        (SqlFamily::Postgres, true) => {
            out.push_str(if column.tpe.full_data_type == "bigint" {
                "BIGSERIAL"
            } else {
                "SERIAL"
            });
            return out;
        }
        (SqlFamily::Sqlite, true) if inline_rowid_pk => {
            out.push_str("INTEGER PRIMARY KEY AUTOINCREMENT");
            return out;
        }
        _ => out.push_str(&column.tpe.full_data_type),
    }

    if !column.tpe.arity.is_nullable() {
        out.push_str(" NOT NULL");
    }

    if let Some(default) = &column.default {
        out.push_str(" DEFAULT ");
        out.push_str(default);
    }

    if family == SqlFamily::Mysql && column.auto_increment {
        out.push_str(" AUTO_INCREMENT");
    }

    out
}

fn render_create_table(table: &Table, dialect: &dyn Dialect) -> Result<RenderedStep, ConnectorError> {
    let family = dialect.family();
    let quote = |name: &str| dialect.quote_ident(name);

    // SQLite inlines the rowid alias; other dialects always emit the PK
    // clause.
    let single_int_pk = family == SqlFamily::Sqlite
        && table
            .primary_key
            .as_ref()
            .filter(|pk| pk.columns.len() == 1)
            .and_then(|pk| table.column(&pk.columns[0]))
            .map(|c| c.auto_increment)
            .unwrap_or(false);

    let mut parts: Vec<String> = table
        .columns
        .iter()
        .map(|column| {
            let inline = single_int_pk
                && table
                    .primary_key
                    .as_ref()
                    .map(|pk| pk.columns[0] == column.name)
                    .unwrap_or(false);
            render_column_def(column, dialect, inline)
        })
        .collect();

    if let Some(pk) = table.primary_key.as_ref().filter(|_| !single_int_pk) {
        parts.push(format!(
            "PRIMARY KEY ({})",
            pk.columns.iter().map(|c| quote(c)).join(", ")
        ));
    }

    // SQLite cannot add foreign keys after the fact; inline them. The other
    // dialects defer them behind every CREATE.
    let mut deferred = Vec::new();
    if family == SqlFamily::Sqlite {
        for fk in &table.foreign_keys {
            parts.push(format!(
                "FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE {} ON UPDATE {}",
                fk.columns.iter().map(|c| quote(c)).join(", "),
                quote(&fk.referenced_table),
                fk.referenced_columns.iter().map(|c| quote(c)).join(", "),
                fk.on_delete_action.as_sql(),
                fk.on_update_action.as_sql(),
            ));
        }
    } else {
        for fk in &table.foreign_keys {
            deferred.push(Sql::raw(render_add_foreign_key(&table.name, fk, dialect)));
        }
    }

    let mut statements = vec![Sql::raw(format!(
        "CREATE TABLE {} ({})",
        quote(&table.name),
        parts.join(", ")
    ))];

    for index in &table.indices {
        statements.push(Sql::raw(render_create_index(&table.name, index, dialect)));
    }

    Ok(RenderedStep {
        statements,
        deferred,
    })
}

fn render_create_index(table: &str, index: &Index, dialect: &dyn Dialect) -> String {
    let family = dialect.family();
    let quote = |name: &str| dialect.quote_ident(name);

    let unique = if index.tpe.is_unique() { "UNIQUE " } else { "" };
    let using = match (&index.method, family) {
        (Some(method), SqlFamily::Postgres) => format!(" USING {method}"),
        _ => String::new(),
    };
    let predicate = match (&index.predicate, family) {
        (Some(predicate), SqlFamily::Postgres | SqlFamily::Sqlite) => format!(" WHERE {predicate}"),
        _ => String::new(),
    };

    format!(
        "CREATE {unique}INDEX {} ON {}{using} ({}){predicate}",
        quote(&index.name),
        quote(table),
        index.columns.iter().map(|c| quote(c)).join(", "),
    )
}

fn render_add_foreign_key(table: &str, fk: &ForeignKey, dialect: &dyn Dialect) -> String {
    let quote = |name: &str| dialect.quote_ident(name);

    let constraint = fk
        .constraint_name
        .as_deref()
        .map(|name| format!("CONSTRAINT {} ", quote(name)))
        .unwrap_or_default();

    format!(
        "ALTER TABLE {} ADD {constraint}FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE {} ON UPDATE {}",
        quote(table),
        fk.columns.iter().map(|c| quote(c)).join(", "),
        quote(&fk.referenced_table),
        fk.referenced_columns.iter().map(|c| quote(c)).join(", "),
        fk.on_delete_action.as_sql(),
        fk.on_update_action.as_sql(),
    )
}
