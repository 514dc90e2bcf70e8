use crate::{
    normalize_default, Column, ColumnArity, ColumnType, ColumnTypeFamily, DescriberResult,
    ForeignKey, ForeignKeyAction, Index, IndexType, PrimaryKey, SqlSchema, Table,
};
use query_template::Sql;
use sql_connection::Queryable;

pub(crate) async fn describe(conn: &dyn Queryable) -> DescriberResult<SqlSchema> {
    let table_rows = conn
        .execute(&Sql::raw(
            "SELECT name FROM sqlite_master WHERE type = 'table' \
             AND name NOT LIKE 'sqlite_%' ORDER BY name",
        ))
        .await?;

    let mut tables = Vec::new();
    for row in table_rows.iter() {
        let name = match row.string("name") {
            Some(name) => name.to_owned(),
            None => continue,
        };
        tables.push(describe_table(conn, &name).await?);
    }

    Ok(SqlSchema {
        tables,
        enums: Vec::new(),
    })
}

async fn describe_table(conn: &dyn Queryable, name: &str) -> DescriberResult<Table> {
    let escaped = name.replace('\'', "''");
    let mut table = Table {
        name: name.to_owned(),
        ..Default::default()
    };

    let column_rows = conn
        .execute(&Sql::raw(format!("PRAGMA table_info('{escaped}')")))
        .await?;

    let mut pk_columns: Vec<(i64, String)> = Vec::new();

    for row in column_rows.iter() {
        let column_name = row.string("name").unwrap_or_default().to_owned();
        let declared_type = row.string("type").unwrap_or_default().to_owned();
        let not_null = row.i64("notnull").unwrap_or(0) != 0;
        let pk_position = row.i64("pk").unwrap_or(0);

        if pk_position > 0 {
            pk_columns.push((pk_position, column_name.clone()));
        }

        // INTEGER PRIMARY KEY is SQLite's rowid alias and auto-increments.
        let auto_increment = pk_position > 0 && declared_type.eq_ignore_ascii_case("integer");

        table.columns.push(Column {
            name: column_name,
            tpe: ColumnType {
                family: family_for(&declared_type),
                full_data_type: declared_type,
                arity: if not_null {
                    ColumnArity::Required
                } else {
                    ColumnArity::Nullable
                },
            },
            default: row
                .string("dflt_value")
                .filter(|_| pk_position == 0)
                .map(normalize_default),
            auto_increment,
        });
    }

    if !pk_columns.is_empty() {
        pk_columns.sort();
        table.primary_key = Some(PrimaryKey {
            columns: pk_columns.into_iter().map(|(_, c)| c).collect(),
            constraint_name: None,
        });
    }

    let index_rows = conn
        .execute(&Sql::raw(format!("PRAGMA index_list('{escaped}')")))
        .await?;

    for row in index_rows.iter() {
        let index_name = row.string("name").unwrap_or_default().to_owned();
        // Skip the implicit indexes SQLite creates for PKs/uniques declared
        // inline.
        if index_name.starts_with("sqlite_autoindex_") {
            continue;
        }
        let unique = row.i64("unique").unwrap_or(0) != 0;

        let info_rows = conn
            .execute(&Sql::raw(format!(
                "PRAGMA index_info('{}')",
                index_name.replace('\'', "''")
            )))
            .await?;

        let mut columns: Vec<(i64, String)> = info_rows
            .iter()
            .filter_map(|info| {
                Some((info.i64("seqno")?, info.string("name")?.to_owned()))
            })
            .collect();
        columns.sort();

        table.indices.push(Index {
            name: index_name,
            columns: columns.into_iter().map(|(_, c)| c).collect(),
            tpe: if unique { IndexType::Unique } else { IndexType::Normal },
            method: None,
            predicate: None,
        });
    }

    let fk_rows = conn
        .execute(&Sql::raw(format!("PRAGMA foreign_key_list('{escaped}')")))
        .await?;

    for row in fk_rows.iter() {
        let id = row.i64("id").unwrap_or(0);
        let column = row.string("from").unwrap_or_default().to_owned();
        let referenced_column = row.string("to").unwrap_or_default().to_owned();

        // Grouped by constraint id; sqlite has no constraint names.
        let existing_position = table
            .foreign_keys
            .iter()
            .position(|fk| fk.constraint_name == Some(format!("fk_{id}")));

        match existing_position {
            Some(pos) => {
                table.foreign_keys[pos].columns.push(column);
                table.foreign_keys[pos].referenced_columns.push(referenced_column);
            }
            None => table.foreign_keys.push(ForeignKey {
                constraint_name: Some(format!("fk_{id}")),
                columns: vec![column],
                referenced_table: row.string("table").unwrap_or_default().to_owned(),
                referenced_columns: vec![referenced_column],
                on_delete_action: ForeignKeyAction::from_text(
                    row.string("on_delete").unwrap_or("NO ACTION"),
                ),
                on_update_action: ForeignKeyAction::from_text(
                    row.string("on_update").unwrap_or("NO ACTION"),
                ),
            }),
        }
    }

    Ok(table)
}

fn family_for(declared: &str) -> ColumnTypeFamily {
    let upper = declared.to_uppercase();
    match upper.as_str() {
        "INTEGER" | "INT" => ColumnTypeFamily::Int,
        "BIGINT" => ColumnTypeFamily::BigInt,
        "REAL" | "FLOAT" | "DOUBLE" => ColumnTypeFamily::Float,
        "DECIMAL" | "NUMERIC" => ColumnTypeFamily::Decimal,
        "BOOLEAN" => ColumnTypeFamily::Boolean,
        "DATETIME" | "TIMESTAMP" => ColumnTypeFamily::DateTime,
        "DATE" => ColumnTypeFamily::Date,
        "TIME" => ColumnTypeFamily::Time,
        "BLOB" => ColumnTypeFamily::Binary,
        "TEXT" => ColumnTypeFamily::String,
        _ if upper.starts_with("VARCHAR") || upper.starts_with("CHAR") => ColumnTypeFamily::String,
        _ if upper.starts_with("DECIMAL") => ColumnTypeFamily::Decimal,
        other => ColumnTypeFamily::Unsupported(other.to_lowercase()),
    }
}
