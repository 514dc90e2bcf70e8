use crate::{
    normalize_default, Column, ColumnArity, ColumnType, ColumnTypeFamily, DescriberResult, Enum,
    ForeignKey, ForeignKeyAction, Index, IndexType, PrimaryKey, SqlSchema, Table,
};
use query_template::Sql;
use sql_connection::Queryable;
use std::collections::BTreeMap;
use tracing::debug;

pub(crate) async fn describe(conn: &dyn Queryable) -> DescriberResult<SqlSchema> {
    let mut tables = BTreeMap::new();

    let table_rows = conn
        .execute(&Sql::raw(
            "SELECT table_name FROM information_schema.tables \
             WHERE table_schema = 'public' AND table_type = 'BASE TABLE' \
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
    describe_primary_keys_and_foreign_keys(conn, &mut tables).await?;
    describe_indexes(conn, &mut tables).await?;
    let enums = describe_enums(conn).await?;

    Ok(SqlSchema {
        tables: tables.into_values().collect(),
        enums,
    })
}

async fn describe_columns(
    conn: &dyn Queryable,
    tables: &mut BTreeMap<String, Table>,
) -> DescriberResult<()> {
    let rows = conn
        .execute(&Sql::raw(
            "SELECT table_name, column_name, data_type, udt_name, is_nullable, column_default, \
             character_maximum_length, numeric_precision, numeric_scale \
             FROM information_schema.columns \
             WHERE table_schema = 'public' ORDER BY table_name, ordinal_position",
        ))
        .await?;

    for row in rows.iter() {
        let table = match row.string("table_name").and_then(|t| tables.get_mut(t)) {
            Some(table) => table,
            None => continue,
        };

        let name = row.string("column_name").unwrap_or_default().to_owned();
        let data_type = row.string("data_type").unwrap_or_default().to_owned();
        let udt_name = row.string("udt_name").unwrap_or_default().to_owned();
        let nullable = row.string("is_nullable") == Some("YES");

        debug!(table = %table.name, column = %name, "describing column");

        // Arrays surface as data_type = ARRAY with `_elem` udt names.
        let (family, full_data_type, arity) = if data_type == "ARRAY" {
            let element = udt_name.trim_start_matches('_');
            (
                family_for(element),
                format!("{element}[]"),
                ColumnArity::List,
            )
        } else {
            let full = full_type(&data_type, &udt_name, row.i64("character_maximum_length"));
            (
                family_for(&udt_name),
                full,
                if nullable {
                    ColumnArity::Nullable
                } else {
                    ColumnArity::Required
                },
            )
        };

        let raw_default = row.string("column_default").map(str::to_owned);
        let auto_increment = raw_default
            .as_deref()
            .map(|d| d.starts_with("nextval("))
            .unwrap_or(false);
        let default = raw_default
            .filter(|_| !auto_increment)
            .map(|d| normalize_default(&d));

        table.columns.push(Column {
            name,
            tpe: ColumnType {
                full_data_type,
                family,
                arity,
            },
            default,
            auto_increment,
        });
    }

    Ok(())
}

fn full_type(data_type: &str, udt_name: &str, max_length: Option<i64>) -> String {
    match (data_type, max_length) {
        ("character varying", Some(n)) => format!("varchar({n})"),
        ("character varying", None) => "varchar".to_owned(),
        ("character", Some(n)) => format!("char({n})"),
        _ => udt_name.to_owned(),
    }
}

fn family_for(udt: &str) -> ColumnTypeFamily {
    match udt {
        "int2" | "int4" => ColumnTypeFamily::Int,
        "int8" => ColumnTypeFamily::BigInt,
        "float4" | "float8" => ColumnTypeFamily::Float,
        "numeric" | "decimal" | "money" => ColumnTypeFamily::Decimal,
        "bool" => ColumnTypeFamily::Boolean,
        "text" | "varchar" | "bpchar" | "char" | "uuid" | "name" | "citext" => {
            ColumnTypeFamily::String
        }
        "timestamp" | "timestamptz" => ColumnTypeFamily::DateTime,
        "date" => ColumnTypeFamily::Date,
        "time" | "timetz" => ColumnTypeFamily::Time,
        "json" | "jsonb" => ColumnTypeFamily::Json,
        "bytea" => ColumnTypeFamily::Binary,
        "vector" => ColumnTypeFamily::Vector,
        "geometry" | "geography" | "point" => ColumnTypeFamily::Geometric,
        other if other.starts_with("varchar") => ColumnTypeFamily::String,
        other => ColumnTypeFamily::Enum(other.to_owned()),
    }
}

async fn describe_primary_keys_and_foreign_keys(
    conn: &dyn Queryable,
    tables: &mut BTreeMap<String, Table>,
) -> DescriberResult<()> {
    let pk_rows = conn
        .execute(&Sql::raw(
            "SELECT tc.table_name, tc.constraint_name, kcu.column_name, kcu.ordinal_position \
             FROM information_schema.table_constraints tc \
             JOIN information_schema.key_column_usage kcu \
               ON tc.constraint_name = kcu.constraint_name AND tc.table_schema = kcu.table_schema \
             WHERE tc.table_schema = 'public' AND tc.constraint_type = 'PRIMARY KEY' \
             ORDER BY tc.table_name, kcu.ordinal_position",
        ))
        .await?;

    for row in pk_rows.iter() {
        let table = match row.string("table_name").and_then(|t| tables.get_mut(t)) {
            Some(table) => table,
            None => continue,
        };
        let column = row.string("column_name").unwrap_or_default().to_owned();
        let constraint = row.string("constraint_name").map(str::to_owned);

        match &mut table.primary_key {
            Some(pk) => pk.columns.push(column),
            None => {
                table.primary_key = Some(PrimaryKey {
                    columns: vec![column],
                    constraint_name: constraint,
                })
            }
        }
    }

    let fk_rows = conn
        .execute(&Sql::raw(
            "SELECT tc.table_name, tc.constraint_name, kcu.column_name, \
             ccu.table_name AS referenced_table, ccu.column_name AS referenced_column, \
             rc.update_rule, rc.delete_rule, kcu.ordinal_position \
             FROM information_schema.table_constraints tc \
             JOIN information_schema.key_column_usage kcu \
               ON tc.constraint_name = kcu.constraint_name AND tc.table_schema = kcu.table_schema \
             JOIN information_schema.constraint_column_usage ccu \
               ON ccu.constraint_name = tc.constraint_name AND ccu.table_schema = tc.table_schema \
             JOIN information_schema.referential_constraints rc \
               ON rc.constraint_name = tc.constraint_name AND rc.constraint_schema = tc.table_schema \
             WHERE tc.table_schema = 'public' AND tc.constraint_type = 'FOREIGN KEY' \
             ORDER BY tc.table_name, tc.constraint_name, kcu.ordinal_position",
        ))
        .await?;

    for row in fk_rows.iter() {
        let table = match row.string("table_name").and_then(|t| tables.get_mut(t)) {
            Some(table) => table,
            None => continue,
        };
        let constraint = row.string("constraint_name").map(str::to_owned);
        let column = row.string("column_name").unwrap_or_default().to_owned();
        let referenced_table = row.string("referenced_table").unwrap_or_default().to_owned();
        let referenced_column = row.string("referenced_column").unwrap_or_default().to_owned();

        let existing = table
            .foreign_keys
            .iter_mut()
            .find(|fk| fk.constraint_name == constraint);

        match existing {
            Some(fk) => {
                fk.columns.push(column);
                fk.referenced_columns.push(referenced_column);
            }
            None => table.foreign_keys.push(ForeignKey {
                constraint_name: constraint,
                columns: vec![column],
                referenced_table,
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

async fn describe_indexes(
    conn: &dyn Queryable,
    tables: &mut BTreeMap<String, Table>,
) -> DescriberResult<()> {
    let rows = conn
        .execute(&Sql::raw(
            "SELECT t.relname AS table_name, i.relname AS index_name, a.attname AS column_name, \
             ix.indisunique AS is_unique, am.amname AS method, \
             pg_get_expr(ix.indpred, ix.indrelid) AS predicate, \
             array_position(ix.indkey, a.attnum) AS ordinal \
             FROM pg_index ix \
             JOIN pg_class i ON i.oid = ix.indexrelid \
             JOIN pg_class t ON t.oid = ix.indrelid \
             JOIN pg_am am ON am.oid = i.relam \
             JOIN pg_namespace n ON n.oid = t.relnamespace \
             JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = ANY(ix.indkey) \
             WHERE n.nspname = 'public' AND NOT ix.indisprimary \
             ORDER BY t.relname, i.relname, ordinal",
        ))
        .await?;

    for row in rows.iter() {
        let table = match row.string("table_name").and_then(|t| tables.get_mut(t)) {
            Some(table) => table,
            None => continue,
        };
        let index_name = row.string("index_name").unwrap_or_default().to_owned();
        let column = row.string("column_name").unwrap_or_default().to_owned();

        match table.indices.iter_mut().find(|idx| idx.name == index_name) {
            Some(index) => index.columns.push(column),
            None => table.indices.push(Index {
                name: index_name,
                columns: vec![column],
                tpe: if row.bool("is_unique").unwrap_or(false) {
                    IndexType::Unique
                } else {
                    IndexType::Normal
                },
                method: row.string("method").map(str::to_owned),
                predicate: row.string("predicate").map(str::to_owned),
            }),
        }
    }

    Ok(())
}

async fn describe_enums(conn: &dyn Queryable) -> DescriberResult<Vec<Enum>> {
    let rows = conn
        .execute(&Sql::raw(
            "SELECT t.typname AS name, e.enumlabel AS value \
             FROM pg_type t \
             JOIN pg_enum e ON t.oid = e.enumtypid \
             JOIN pg_namespace n ON n.oid = t.typnamespace \
             WHERE n.nspname = 'public' \
             ORDER BY t.typname, e.enumsortorder",
        ))
        .await?;

    let mut enums: Vec<Enum> = Vec::new();
    for row in rows.iter() {
        let name = row.string("name").unwrap_or_default().to_owned();
        let value = row.string("value").unwrap_or_default().to_owned();

        match enums.iter_mut().find(|e| e.name == name) {
            Some(entry) => entry.values.push(value),
            None => enums.push(Enum {
                name,
                values: vec![value],
            }),
        }
    }

    Ok(enums)
}
