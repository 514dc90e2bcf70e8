use sql_schema_describer::{
    Column, ColumnType, ColumnTypeFamily, Enum, ForeignKey, Index, PrimaryKey, Table,
};
use std::fmt;

/// One structured schema-migration operation. Ordering is decided by the
/// differ; rendering by the per-dialect renderer.
#[derive(Debug, Clone, PartialEq)]
pub enum MigrationStep {
    CreateEnum {
        enum_def: Enum,
    },
    AlterEnum {
        name: String,
        added_values: Vec<String>,
        removed_values: Vec<String>,
    },
    DropEnum {
        name: String,
    },
    /// The table definition carries its indexes and foreign keys; the
    /// renderer decides what is inlined and what trails as ALTERs.
    CreateTable {
        table: Table,
    },
    DropTable {
        name: String,
    },
    RenameTable {
        from: String,
        to: String,
    },
    AlterTableOptions {
        table: String,
        options: Option<String>,
    },
    AddColumn {
        table: String,
        column: Column,
    },
    DropColumn {
        table: String,
        column: String,
    },
    RenameColumn {
        table: String,
        from: String,
        to: String,
    },
    AlterColumnType {
        table: String,
        column: Column,
        from: ColumnType,
    },
    AlterColumnNullable {
        table: String,
        column: Column,
        nullable: bool,
    },
    AlterColumnDefault {
        table: String,
        column: Column,
        default: Option<String>,
    },
    AddPrimaryKey {
        table: String,
        primary_key: PrimaryKey,
    },
    DropPrimaryKey {
        table: String,
        constraint_name: Option<String>,
    },
    AddUnique {
        table: String,
        index: Index,
    },
    DropUnique {
        table: String,
        name: String,
    },
    AddIndex {
        table: String,
        index: Index,
    },
    DropIndex {
        table: String,
        name: String,
    },
    AddForeignKey {
        table: String,
        foreign_key: ForeignKey,
    },
    DropForeignKey {
        table: String,
        constraint_name: Option<String>,
        columns: Vec<String>,
    },
}

impl MigrationStep {
    /// Dependency rank: lower runs first. Constraint removals precede column
    /// and table changes; new tables precede the foreign keys that reference
    /// them; table drops come after the FK drops that unblock them.
    pub(crate) fn rank(&self) -> u8 {
        match self {
            MigrationStep::DropForeignKey { .. } => 0,
            MigrationStep::DropUnique { .. } | MigrationStep::DropIndex { .. } => 1,
            MigrationStep::DropPrimaryKey { .. } => 2,
            MigrationStep::CreateEnum { .. } | MigrationStep::AlterEnum { .. } => 3,
            MigrationStep::CreateTable { .. }
            | MigrationStep::RenameTable { .. }
            | MigrationStep::AlterTableOptions { .. } => 4,
            MigrationStep::RenameColumn { .. } => 5,
            MigrationStep::AddColumn { .. } => 6,
            MigrationStep::AlterColumnType { .. }
            | MigrationStep::AlterColumnNullable { .. }
            | MigrationStep::AlterColumnDefault { .. } => 7,
            MigrationStep::DropColumn { .. } => 8,
            MigrationStep::AddPrimaryKey { .. } => 9,
            MigrationStep::AddUnique { .. } | MigrationStep::AddIndex { .. } => 10,
            MigrationStep::AddForeignKey { .. } => 11,
            MigrationStep::DropTable { .. } => 12,
            MigrationStep::DropEnum { .. } => 13,
        }
    }

    /// The qualified object name, for stable tie-breaking within a rank.
    pub(crate) fn sort_key(&self) -> String {
        match self {
            MigrationStep::CreateEnum { enum_def } => enum_def.name.clone(),
            MigrationStep::AlterEnum { name, .. } | MigrationStep::DropEnum { name } => name.clone(),
            MigrationStep::CreateTable { table } => table.name.clone(),
            MigrationStep::DropTable { name } => name.clone(),
            MigrationStep::RenameTable { from, .. } => from.clone(),
            MigrationStep::AlterTableOptions { table, .. } => table.clone(),
            MigrationStep::AddColumn { table, column } => format!("{table}.{}", column.name),
            MigrationStep::DropColumn { table, column } => format!("{table}.{column}"),
            MigrationStep::RenameColumn { table, from, .. } => format!("{table}.{from}"),
            MigrationStep::AlterColumnType { table, column, .. }
            | MigrationStep::AlterColumnNullable { table, column, .. }
            | MigrationStep::AlterColumnDefault { table, column, .. } => {
                format!("{table}.{}", column.name)
            }
            MigrationStep::AddPrimaryKey { table, .. }
            | MigrationStep::DropPrimaryKey { table, .. } => table.clone(),
            MigrationStep::AddUnique { table, index } | MigrationStep::AddIndex { table, index } => {
                format!("{table}.{}", index.name)
            }
            MigrationStep::DropUnique { table, name } | MigrationStep::DropIndex { table, name } => {
                format!("{table}.{name}")
            }
            MigrationStep::AddForeignKey { table, foreign_key } => {
                format!("{table}.{}", foreign_key.columns.join("_"))
            }
            MigrationStep::DropForeignKey { table, columns, .. } => {
                format!("{table}.{}", columns.join("_"))
            }
        }
    }

    /// Whether applying the step can lose data.
    pub fn is_destructive(&self) -> bool {
        match self {
            MigrationStep::DropTable { .. }
            | MigrationStep::DropColumn { .. }
            | MigrationStep::DropEnum { .. } => true,
            MigrationStep::AlterColumnType { column, from, .. } => {
                narrowing_change(from, &column.tpe)
            }
            MigrationStep::AlterColumnNullable {
                column,
                nullable: false,
                ..
            } => column.default.is_none(),
            MigrationStep::AlterEnum { removed_values, .. } => !removed_values.is_empty(),
            _ => false,
        }
    }
}

/// A type change narrows when the new type cannot represent every value of
/// the old one.
fn narrowing_change(from: &ColumnType, to: &ColumnType) -> bool {
    use ColumnTypeFamily::*;

    if from.family != to.family {
        // Widening into strings or JSON keeps the text form around;
        // everything else is lossy.
        return !matches!((&from.family, &to.family), (_, String) | (_, Json) | (Int, BigInt));
    }

    match (parse_length(&from.full_data_type), parse_length(&to.full_data_type)) {
        (Some(from_len), Some(to_len)) => to_len < from_len,
        _ => false,
    }
}

fn parse_length(full_type: &str) -> Option<u32> {
    let open = full_type.find('(')?;
    let close = full_type.find(')')?;
    full_type[open + 1..close].split(',').next()?.trim().parse().ok()
}

impl fmt::Display for MigrationStep {
    /// The one-line human-readable form: leading verb plus qualified object
    /// name.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationStep::CreateEnum { enum_def } => write!(f, "Create enum {}", enum_def.name),
            MigrationStep::AlterEnum { name, .. } => write!(f, "Alter enum {name}"),
            MigrationStep::DropEnum { name } => write!(f, "Drop enum {name}"),
            MigrationStep::CreateTable { table } => write!(f, "Create table {}", table.name),
            MigrationStep::DropTable { name } => write!(f, "Drop table {name}"),
            MigrationStep::RenameTable { from, to } => write!(f, "Rename table {from} to {to}"),
            MigrationStep::AlterTableOptions { table, .. } => {
                write!(f, "Alter table options on {table}")
            }
            MigrationStep::AddColumn { table, column } => {
                write!(f, "Add column {table}.{}", column.name)
            }
            MigrationStep::DropColumn { table, column } => write!(f, "Drop column {table}.{column}"),
            MigrationStep::RenameColumn { table, from, to } => {
                write!(f, "Rename column {table}.{from} to {table}.{to}")
            }
            MigrationStep::AlterColumnType { table, column, from } => write!(
                f,
                "Alter column {table}.{} type {} to {}",
                column.name, from.full_data_type, column.tpe.full_data_type
            ),
            MigrationStep::AlterColumnNullable { table, column, nullable } => write!(
                f,
                "Alter column {table}.{} {}",
                column.name,
                if *nullable { "drop not null" } else { "set not null" }
            ),
            MigrationStep::AlterColumnDefault { table, column, default } => match default {
                Some(default) => {
                    write!(f, "Alter column {table}.{} set default {default}", column.name)
                }
                None => write!(f, "Alter column {table}.{} drop default", column.name),
            },
            MigrationStep::AddPrimaryKey { table, primary_key } => write!(
                f,
                "Add primary key on {table} ({})",
                primary_key.columns.join(", ")
            ),
            MigrationStep::DropPrimaryKey { table, .. } => write!(f, "Drop primary key on {table}"),
            MigrationStep::AddUnique { table, index } => {
                write!(f, "Add unique constraint {table}.{}", index.name)
            }
            MigrationStep::DropUnique { table, name } => {
                write!(f, "Drop unique constraint {table}.{name}")
            }
            MigrationStep::AddIndex { table, index } => write!(f, "Add index {table}.{}", index.name),
            MigrationStep::DropIndex { table, name } => write!(f, "Drop index {table}.{name}"),
            MigrationStep::AddForeignKey { table, foreign_key } => write!(
                f,
                "Add foreign key {table}({}) referencing {}",
                foreign_key.columns.join(", "),
                foreign_key.referenced_table
            ),
            MigrationStep::DropForeignKey { table, columns, .. } => {
                write!(f, "Drop foreign key {table}({})", columns.join(", "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sql_schema_describer::ColumnArity;

    fn tpe(family: ColumnTypeFamily, full: &str) -> ColumnType {
        ColumnType::pure(family, ColumnArity::Required, full)
    }

    #[test]
    fn narrowing_detection() {
        assert!(narrowing_change(
            &tpe(ColumnTypeFamily::BigInt, "bigint"),
            &tpe(ColumnTypeFamily::Int, "integer"),
        ));
        assert!(!narrowing_change(
            &tpe(ColumnTypeFamily::Int, "integer"),
            &tpe(ColumnTypeFamily::BigInt, "bigint"),
        ));
        assert!(narrowing_change(
            &tpe(ColumnTypeFamily::String, "varchar(255)"),
            &tpe(ColumnTypeFamily::String, "varchar(10)"),
        ));
        assert!(!narrowing_change(
            &tpe(ColumnTypeFamily::Int, "integer"),
            &tpe(ColumnTypeFamily::String, "text"),
        ));
    }

    #[test]
    fn descriptions_lead_with_a_verb() {
        let step = MigrationStep::DropTable {
            name: "user".into(),
        };
        assert_eq!(step.to_string(), "Drop table user");
        assert!(step.is_destructive());
    }
}
