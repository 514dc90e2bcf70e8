use crate::{
    normalize_default, Column, ColumnArity, ColumnType, ColumnTypeFamily, DescriberResult, Enum,
    ForeignKey, ForeignKeyAction, Index, IndexType, PrimaryKey, SqlSchema, Table,
};
use query_template::Sql;
use sql_connection::Queryable;
use std::collections::BTreeMap;

pub(crate) async fn describe(conn: &dyn Queryable) -> DescriberResult<SqlSchema> {
    let mut tables = BTreeMap::new();

    let table_rows = conn
        .execute(&Sql::raw(
            "SELECT table_name FROM information_schema.tables \
             WHERE table_schema = DATABASE() AND table_type = 'BASE TABLE' \
             ORDER BY table_name",
        ))
        .await?;

    for row in table_rows.iter() {
        if let Some(name) = row.string("table_name") {
            tables.insert(name.to_owned(), Table {
                name: name.to_owned(),
                ..Default::default()
            });
        }
    }

    describe_columns(conn, &mut tables).await?;
    describe_indexes(conn, &mut tables).await?;
    describe_foreign_keys(conn, &mut tables).await?;

    // MySQL spells enums inline in the column type; no separate enum
    // definitions exist.
    Ok(SqlSchema {
        tables: tables.into_values().collect(),
        enums: Vec::new(),
    })
}

async fn describe_columns(
    conn: &dyn Queryable,
    tables: &mut BTreeMap<String, Table>,
) -> DescriberResult<()> {
    let rows = conn
        .execute(&Sql::raw(
            "SELECT table_name, column_name, column_type, data_type, is_nullable, column_default, extra \
             FROM information_schema.columns \
             WHERE table_schema = DATABASE() ORDER BY table_name, ordinal_position",
        ))
        .await?;

    for row in rows.iter() {
        let table = match row.string("table_name").and_then(|t| tables.get_mut(t)) {
            Some(table) => table,
            None => continue,
        };

        let name = row.string("column_name").unwrap_or_default().to_owned();
        let column_type = row.string("column_type").unwrap_or_default().to_owned();
        let data_type = row.string("data_type").unwrap_or_default().to_owned();
        let nullable = row.string("is_nullable") == Some("YES");
        let auto_increment = row
            .string("extra")
            .map(|e| e.contains("auto_increment"))
            .unwrap_or(false);

        let family = family_for(&data_type, &column_type);
        let default = row
            .string("column_default")
            .filter(|_| !auto_increment)
            .map(|d| normalize_default(d));

        table.columns.push(Column {
            name,
            tpe: ColumnType {
                full_data_type: column_type,
                family,
                arity: if nullable {
                    ColumnArity::Nullable
                } else {
                    ColumnArity::Required
                },
            },
            default,
            auto_increment,
        });
    }

    Ok(())
}

fn family_for(data_type: &str, column_type: &str) -> ColumnTypeFamily {
    match data_type {
        "tinyint" if column_type == "tinyint(1)" => ColumnTypeFamily::Boolean,
        "tinyint" | "smallint" | "mediumint" | "int" => ColumnTypeFamily::Int,
        "bigint" => ColumnTypeFamily::BigInt,
        "float" | "double" => ColumnTypeFamily::Float,
        "decimal" | "numeric" => ColumnTypeFamily::Decimal,
        "char" | "varchar" | "text" | "tinytext" | "mediumtext" | "longtext" => {
            ColumnTypeFamily::String
        }
        "datetime" | "timestamp" => ColumnTypeFamily::DateTime,
        "date" => ColumnTypeFamily::Date,
        "time" => ColumnTypeFamily::Time,
        "json" => ColumnTypeFamily::Json,
        "binary" | "varbinary" | "blob" | "tinyblob" | "mediumblob" | "longblob" => {
            ColumnTypeFamily::Binary
        }
        "enum" => ColumnTypeFamily::Enum(parse_enum_name(column_type)),
        "point" | "geometry" | "linestring" | "polygon" => ColumnTypeFamily::Geometric,
        other => ColumnTypeFamily::Unsupported(other.to_owned()),
    }
}

/// Inline enums have no name of their own; the values become the identity.
fn parse_enum_name(column_type: &str) -> String {
    column_type.to_owned()
}

async fn describe_indexes(
    conn: &dyn Queryable,
    tables: &mut BTreeMap<String, Table>,
) -> DescriberResult<()> {
    let rows = conn
        .execute(&Sql::raw(
            "SELECT table_name, index_name, column_name, non_unique, index_type, seq_in_index \
             FROM information_schema.statistics \
             WHERE table_schema = DATABASE() \
             ORDER BY table_name, index_name, seq_in_index",
        ))
        .await?;

    for row in rows.iter() {
        let table = match row.string("table_name").and_then(|t| tables.get_mut(t)) {
            Some(table) => table,
            None => continue,
        };
        let index_name = row.string("index_name").unwrap_or_default().to_owned();
        let column = row.string("column_name").unwrap_or_default().to_owned();

        if index_name == "PRIMARY" {
            match &mut table.primary_key {
                Some(pk) => pk.columns.push(column),
                None => {
                    table.primary_key = Some(PrimaryKey {
                        columns: vec![column],
                        constraint_name: Some("PRIMARY".to_owned()),
                    })
                }
            }
            continue;
        }

        match table.indices.iter_mut().find(|idx| idx.name == index_name) {
            Some(index) => index.columns.push(column),
            None => table.indices.push(Index {
                name: index_name,
                columns: vec![column],
                tpe: if row.i64("non_unique") == Some(0) {
                    IndexType::Unique
                } else {
                    IndexType::Normal
                },
                method: row.string("index_type").map(|m| m.to_lowercase()),
                predicate: None,
            }),
        }
    }

    Ok(())
}

async fn describe_foreign_keys(
    conn: &dyn Queryable,
    tables: &mut BTreeMap<String, Table>,
) -> DescriberResult<()> {
    let rows = conn
        .execute(&Sql::raw(
            "SELECT kcu.table_name, kcu.constraint_name, kcu.column_name, \
             kcu.referenced_table_name, kcu.referenced_column_name, \
             rc.update_rule, rc.delete_rule \
             FROM information_schema.key_column_usage kcu \
             JOIN information_schema.referential_constraints rc \
               ON rc.constraint_name = kcu.constraint_name AND rc.constraint_schema = kcu.table_schema \
             WHERE kcu.table_schema = DATABASE() AND kcu.referenced_table_name IS NOT NULL \
             ORDER BY kcu.table_name, kcu.constraint_name, kcu.ordinal_position",
        ))
        .await?;

    for row in rows.iter() {
        let table = match row.string("table_name").and_then(|t| tables.get_mut(t)) {
            Some(table) => table,
            None => continue,
        };
        let constraint = row.string("constraint_name").map(str::to_owned);
        let column = row.string("column_name").unwrap_or_default().to_owned();
        let referenced_column = row
            .string("referenced_column_name")
            .unwrap_or_default()
            .to_owned();

        match table
            .foreign_keys
            .iter_mut()
            .find(|fk| fk.constraint_name == constraint)
        {
            Some(fk) => {
                fk.columns.push(column);
                fk.referenced_columns.push(referenced_column);
            }
            None => table.foreign_keys.push(ForeignKey {
                constraint_name: constraint,
                columns: vec![column],
                referenced_table: row
                    .string("referenced_table_name")
                    .unwrap_or_default()
                    .to_owned(),
                referenced_columns: vec![referenced_column],
                on_delete_action: ForeignKeyAction::from_text(
                    row.string("delete_rule").unwrap_or("NO ACTION"),
                ),
                on_update_action: ForeignKeyAction::from_text(
                    row.string("update_rule").unwrap_or("NO ACTION"),
                ),
            }),
        }
    }

    Ok(())
}
