//! Computes structured migration steps from two schema snapshots, surfacing
//! rename-vs-add/drop ambiguities for the resolver instead of guessing.

use crate::migration::MigrationStep;
use sql_schema_describer::{Column, ForeignKey, Index, SqlSchema, Table};
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct DiffResult {
    pub steps: Vec<MigrationStep>,
    pub ambiguities: Vec<AmbiguousChange>,
}

/// A change that reads as either a rename or an add+drop. The desired-side
/// definition rides along so an add+drop decision can materialize without
/// another lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum AmbiguousChange {
    Column {
        table: String,
        from: String,
        to: String,
        definition: Column,
    },
    Table {
        from: String,
        to: String,
        definition: Table,
    },
}

impl fmt::Display for AmbiguousChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AmbiguousChange::Column { table, from, to, .. } => {
                write!(f, "column {table}.{from} -> {table}.{to} (rename or add+drop?)")
            }
            AmbiguousChange::Table { from, to, .. } => {
                write!(f, "table {from} -> {to} (rename or add+drop?)")
            }
        }
    }
}

/// Diff two snapshots. Pure: no IO, inputs untouched.
pub fn diff(current: &SqlSchema, desired: &SqlSchema) -> DiffResult {
    let mut steps = Vec::new();
    let mut ambiguities = Vec::new();

    diff_enums(current, desired, &mut steps);

    let mut added_tables: Vec<&Table> = desired
        .tables
        .iter()
        .filter(|t| current.table(&t.name).is_none())
        .collect();
    let mut dropped_tables: Vec<&Table> = current
        .tables
        .iter()
        .filter(|t| desired.table(&t.name).is_none())
        .collect();

    // A dropped table whose shape matches an added one could be a rename.
    let mut idx = 0;
    while idx < dropped_tables.len() {
        let dropped = dropped_tables[idx];
        let matching = added_tables
            .iter()
            .position(|added| tables_look_alike(dropped, added));
        match matching {
            Some(added_idx) => {
                let added = added_tables.remove(added_idx);
                dropped_tables.remove(idx);
                debug!(from = %dropped.name, to = %added.name, "ambiguous table change");
                ambiguities.push(AmbiguousChange::Table {
                    from: dropped.name.clone(),
                    to: added.name.clone(),
                    definition: added.clone(),
                });
            }
            None => idx += 1,
        }
    }

    for table in added_tables {
        steps.push(MigrationStep::CreateTable {
            table: table.clone(),
        });
    }
    for table in dropped_tables {
        // FKs out of the dropped table go first so the drop is unblocked.
        for fk in &table.foreign_keys {
            steps.push(MigrationStep::DropForeignKey {
                table: table.name.clone(),
                constraint_name: fk.constraint_name.clone(),
                columns: fk.columns.clone(),
            });
        }
        steps.push(MigrationStep::DropTable {
            name: table.name.clone(),
        });
    }

    for desired_table in &desired.tables {
        if let Some(current_table) = current.table(&desired_table.name) {
            diff_table(current_table, desired_table, &mut steps, &mut ambiguities);
        }
    }

    order_steps(&mut steps);

    DiffResult { steps, ambiguities }
}

/// Sort by dependency rank, breaking ties in stable name order.
pub(crate) fn order_steps(steps: &mut [MigrationStep]) {
    steps.sort_by(|a, b| a.rank().cmp(&b.rank()).then_with(|| a.sort_key().cmp(&b.sort_key())));
}

fn diff_enums(current: &SqlSchema, desired: &SqlSchema, steps: &mut Vec<MigrationStep>) {
    for desired_enum in &desired.enums {
        match current.get_enum(&desired_enum.name) {
            None => steps.push(MigrationStep::CreateEnum {
                enum_def: desired_enum.clone(),
            }),
            Some(current_enum) if current_enum.values != desired_enum.values => {
                let added = desired_enum
                    .values
                    .iter()
                    .filter(|v| !current_enum.values.contains(v))
                    .cloned()
                    .collect();
                let removed = current_enum
                    .values
                    .iter()
                    .filter(|v| !desired_enum.values.contains(v))
                    .cloned()
                    .collect();
                steps.push(MigrationStep::AlterEnum {
                    name: desired_enum.name.clone(),
                    added_values: added,
                    removed_values: removed,
                });
            }
            Some(_) => {}
        }
    }

    for current_enum in &current.enums {
        if desired.get_enum(&current_enum.name).is_none() {
            steps.push(MigrationStep::DropEnum {
                name: current_enum.name.clone(),
            });
        }
    }
}

/// Two tables look alike when their column names and types coincide; that is
/// the signature a rename preserves.
fn tables_look_alike(a: &Table, b: &Table) -> bool {
    if a.columns.len() != b.columns.len() {
        return false;
    }
    a.columns.iter().all(|ca| {
        b.column(&ca.name)
            .map(|cb| ca.tpe.family == cb.tpe.family && ca.tpe.arity == cb.tpe.arity)
            .unwrap_or(false)
    })
}

fn diff_table(
    current: &Table,
    desired: &Table,
    steps: &mut Vec<MigrationStep>,
    ambiguities: &mut Vec<AmbiguousChange>,
) {
    let mut added_columns: Vec<&Column> = desired
        .columns
        .iter()
        .filter(|c| current.column(&c.name).is_none())
        .collect();
    let mut dropped_columns: Vec<&Column> = current
        .columns
        .iter()
        .filter(|c| desired.column(&c.name).is_none())
        .collect();

    // Compatible dropped/added pairs are rename candidates.
    let mut idx = 0;
    while idx < dropped_columns.len() {
        let dropped = dropped_columns[idx];
        let matching = added_columns.iter().position(|added| {
            added.tpe.family == dropped.tpe.family && added.tpe.arity == dropped.tpe.arity
        });
        match matching {
            Some(added_idx) => {
                let added = added_columns.remove(added_idx);
                dropped_columns.remove(idx);
                debug!(
                    table = %current.name,
                    from = %dropped.name,
                    to = %added.name,
                    "ambiguous column change"
                );
                ambiguities.push(AmbiguousChange::Column {
                    table: current.name.clone(),
                    from: dropped.name.clone(),
                    to: added.name.clone(),
                    definition: added.clone(),
                });
            }
            None => idx += 1,
        }
    }

    for column in added_columns {
        steps.push(MigrationStep::AddColumn {
            table: desired.name.clone(),
            column: column.clone(),
        });
    }
    for column in dropped_columns {
        steps.push(MigrationStep::DropColumn {
            table: desired.name.clone(),
            column: column.name.clone(),
        });
    }

    for desired_column in &desired.columns {
        let current_column = match current.column(&desired_column.name) {
            Some(column) => column,
            None => continue,
        };

        if current_column.tpe.family != desired_column.tpe.family
            || current_column.tpe.full_data_type != desired_column.tpe.full_data_type
        {
            steps.push(MigrationStep::AlterColumnType {
                table: desired.name.clone(),
                column: desired_column.clone(),
                from: current_column.tpe.clone(),
            });
        } else if current_column.tpe.arity != desired_column.tpe.arity {
            steps.push(MigrationStep::AlterColumnNullable {
                table: desired.name.clone(),
                column: desired_column.clone(),
                nullable: desired_column.tpe.arity.is_nullable(),
            });
        }

        if current_column.default != desired_column.default
            && current_column.auto_increment == desired_column.auto_increment
        {
            steps.push(MigrationStep::AlterColumnDefault {
                table: desired.name.clone(),
                column: desired_column.clone(),
                default: desired_column.default.clone(),
            });
        }
    }

    if current.options != desired.options {
        steps.push(MigrationStep::AlterTableOptions {
            table: desired.name.clone(),
            options: desired.options.clone(),
        });
    }

    // Primary key.
    let pk_changed = current.primary_key.as_ref().map(|pk| &pk.columns)
        != desired.primary_key.as_ref().map(|pk| &pk.columns);
    if pk_changed {
        if let Some(pk) = &current.primary_key {
            steps.push(MigrationStep::DropPrimaryKey {
                table: desired.name.clone(),
                constraint_name: pk.constraint_name.clone(),
            });
        }
        if let Some(pk) = &desired.primary_key {
            steps.push(MigrationStep::AddPrimaryKey {
                table: desired.name.clone(),
                primary_key: pk.clone(),
            });
        }
    }

    // Indexes and unique constraints, matched by name.
    for desired_index in &desired.indices {
        match current.indices.iter().find(|i| i.name == desired_index.name) {
            None => steps.push(add_index_step(&desired.name, desired_index)),
            Some(current_index) if current_index != desired_index => {
                steps.push(drop_index_step(&desired.name, current_index));
                steps.push(add_index_step(&desired.name, desired_index));
            }
            Some(_) => {}
        }
    }
    for current_index in &current.indices {
        if !desired.indices.iter().any(|i| i.name == current_index.name) {
            steps.push(drop_index_step(&desired.name, current_index));
        }
    }

    // Foreign keys, matched structurally; constraint names are advisory.
    for desired_fk in &desired.foreign_keys {
        if !current.foreign_keys.iter().any(|fk| fks_match(fk, desired_fk)) {
            steps.push(MigrationStep::AddForeignKey {
                table: desired.name.clone(),
                foreign_key: desired_fk.clone(),
            });
        }
    }
    for current_fk in &current.foreign_keys {
        if !desired.foreign_keys.iter().any(|fk| fks_match(fk, current_fk)) {
            steps.push(MigrationStep::DropForeignKey {
                table: desired.name.clone(),
                constraint_name: current_fk.constraint_name.clone(),
                columns: current_fk.columns.clone(),
            });
        }
    }
}

fn fks_match(a: &ForeignKey, b: &ForeignKey) -> bool {
    a.columns == b.columns
        && a.referenced_table == b.referenced_table
        && a.referenced_columns == b.referenced_columns
        && a.on_delete_action == b.on_delete_action
        && a.on_update_action == b.on_update_action
}

fn add_index_step(table: &str, index: &Index) -> MigrationStep {
    if index.tpe.is_unique() {
        MigrationStep::AddUnique {
            table: table.to_owned(),
            index: index.clone(),
        }
    } else {
        MigrationStep::AddIndex {
            table: table.to_owned(),
            index: index.clone(),
        }
    }
}

fn drop_index_step(table: &str, index: &Index) -> MigrationStep {
    if index.tpe.is_unique() {
        MigrationStep::DropUnique {
            table: table.to_owned(),
            name: index.name.clone(),
        }
    } else {
        MigrationStep::DropIndex {
            table: table.to_owned(),
            name: index.name.clone(),
        }
    }
}
