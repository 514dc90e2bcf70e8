//! Collapses the resolved model set into the physical snapshot shape: model
//! tables with their inline relation FKs, plus one junction table per
//! many-to-many relation.

use itertools::Itertools;
use query_structure::{
    Error, Field, FieldArity, Model, ModelSet, RelationKind, ReferentialAction, Result,
    ScalarKind,
};
use sql_connection::SqlFamily;
use sql_dialect::{Capability, Dialect};
use sql_schema_describer::{
    Column, ColumnArity, ColumnType, ColumnTypeFamily, Enum, ForeignKey, ForeignKeyAction, Index,
    IndexType, PrimaryKey, SqlSchema, Table,
};

pub fn calculate_sql_schema(models: &ModelSet, dialect: &dyn Dialect) -> Result<SqlSchema> {
    let mut tables = Vec::new();

    for model in models.models() {
        tables.push(calculate_model_table(models, model, dialect)?);
    }

    // One junction per unordered model pair, emitted from the
    // lexicographically first side so both sides agree.
    for model in models.models() {
        for relation in model.relations.values() {
            if relation.kind != RelationKind::ManyToMany {
                continue;
            }
            let target = models.target_of(relation)?;
            if model.name > target.name {
                continue;
            }
            tables.push(calculate_junction_table(models, model, relation, dialect)?);
        }
    }

    let enums = if dialect.supports(Capability::NativeEnums)
        && dialect.family() == SqlFamily::Postgres
    {
        models
            .enums
            .iter()
            .map(|e| Enum {
                name: e.name.clone(),
                values: e.values.clone(),
            })
            .collect()
    } else {
        Vec::new()
    };

    let mut schema = SqlSchema { tables, enums };
    schema.normalize();
    Ok(schema)
}

fn calculate_model_table(models: &ModelSet, model: &Model, dialect: &dyn Dialect) -> Result<Table> {
    let columns = model
        .scalar_fields()
        .map(|field| calculate_column(models, field, dialect))
        .collect::<Result<Vec<_>>>()?;

    let primary_key = {
        let id_columns: Vec<String> = model
            .id_fields()
            .iter()
            .map(|f| f.db_name().to_owned())
            .collect();
        (!id_columns.is_empty()).then(|| PrimaryKey {
            columns: id_columns,
            constraint_name: None,
        })
    };

    let mut indices = Vec::new();

    for field in model.scalar_fields().filter(|f| f.is_unique) {
        indices.push(Index {
            name: format!("{}_{}_key", model.db_name(), field.db_name()),
            columns: vec![field.db_name().to_owned()],
            tpe: IndexType::Unique,
            method: None,
            predicate: None,
        });
    }

    for key in &model.compound_uniques {
        let columns = key
            .fields
            .iter()
            .map(|name| model.find_field(name).map(|f| f.db_name().to_owned()))
            .collect::<Result<Vec<_>>>()?;
        indices.push(Index {
            name: key.name.clone(),
            columns,
            tpe: IndexType::Unique,
            method: None,
            predicate: None,
        });
    }

    for index in &model.indexes {
        let columns = index
            .fields
            .iter()
            .map(|name| model.find_field(name).map(|f| f.db_name().to_owned()))
            .collect::<Result<Vec<_>>>()?;
        let name = index.name.clone().unwrap_or_else(|| {
            format!(
                "{}_{}_{}",
                model.db_name(),
                columns.iter().join("_"),
                if index.unique { "key" } else { "idx" },
            )
        });
        indices.push(Index {
            name,
            columns,
            tpe: if index.unique { IndexType::Unique } else { IndexType::Normal },
            method: index.method.map(|m| m.as_str().to_owned()),
            predicate: index.predicate.clone(),
        });
    }

    let mut foreign_keys = Vec::new();
    for relation in model.relations.values().filter(|r| r.is_owning_side()) {
        let target = models.target_of(relation)?;

        let columns = relation
            .fields
            .iter()
            .map(|name| model.find_field(name).map(|f| f.db_name().to_owned()))
            .collect::<Result<Vec<_>>>()?;
        let referenced_columns = relation
            .references
            .iter()
            .map(|name| target.find_field(name).map(|f| f.db_name().to_owned()))
            .collect::<Result<Vec<_>>>()?;

        // A one-to-one FK needs a unique index to hold the cardinality.
        if relation.kind == RelationKind::OneToOne {
            indices.push(Index {
                name: format!("{}_{}_key", model.db_name(), columns.iter().join("_")),
                columns: columns.clone(),
                tpe: IndexType::Unique,
                method: None,
                predicate: None,
            });
        }

        foreign_keys.push(ForeignKey {
            constraint_name: Some(format!(
                "{}_{}_fkey",
                model.db_name(),
                columns.iter().join("_")
            )),
            columns,
            referenced_table: target.db_name().to_owned(),
            referenced_columns,
            on_delete_action: referential_action(relation.on_delete),
            on_update_action: referential_action(relation.on_update),
        });
    }

    Ok(Table {
        name: model.db_name().to_owned(),
        columns,
        indices,
        primary_key,
        foreign_keys,
        options: None,
    })
}

fn calculate_column(models: &ModelSet, field: &Field, dialect: &dyn Dialect) -> Result<Column> {
    let enum_values = field
        .enum_name
        .as_deref()
        .and_then(|name| models.find_enum(name))
        .map(|e| e.values.clone());

    let full_data_type = dialect.map_type(field, enum_values.as_deref())?;

    let default = field
        .default
        .as_ref()
        .and_then(|default| dialect.render_default(field, default));

    Ok(Column {
        name: field.db_name().to_owned(),
        tpe: ColumnType {
            full_data_type,
            family: family_for(field),
            arity: arity_for(field.arity),
        },
        default,
        auto_increment: field.is_autoincrement(),
    })
}

fn calculate_junction_table(
    models: &ModelSet,
    model: &Model,
    relation: &query_structure::Relation,
    dialect: &dyn Dialect,
) -> Result<Table> {
    let target = models.target_of(relation)?;
    let junction = models.junction_info(model, relation)?;

    let parent_id = model
        .id_fields()
        .into_iter()
        .exactly_one()
        .map_err(|_| Error::schema(format!("model `{}` needs a single-column id", model.name)))?;
    let child_id = target
        .id_fields()
        .into_iter()
        .exactly_one()
        .map_err(|_| Error::schema(format!("model `{}` needs a single-column id", target.name)))?;

    // `model` is the lexicographically first side, so its column is `A`.
    let a_column = Column {
        name: junction.parent_column.clone(),
        tpe: ColumnType {
            full_data_type: dialect.map_type(parent_id, None)?,
            family: family_for(parent_id),
            arity: ColumnArity::Required,
        },
        default: None,
        auto_increment: false,
    };
    let b_column = Column {
        name: junction.child_column.clone(),
        tpe: ColumnType {
            full_data_type: dialect.map_type(child_id, None)?,
            family: family_for(child_id),
            arity: ColumnArity::Required,
        },
        default: None,
        auto_increment: false,
    };

    let foreign_keys = vec![
        ForeignKey {
            constraint_name: Some(format!("{}_{}_fkey", junction.table, a_column.name)),
            columns: vec![a_column.name.clone()],
            referenced_table: model.db_name().to_owned(),
            referenced_columns: vec![junction.parent_id_column.clone()],
            on_delete_action: ForeignKeyAction::Cascade,
            on_update_action: ForeignKeyAction::Cascade,
        },
        ForeignKey {
            constraint_name: Some(format!("{}_{}_fkey", junction.table, b_column.name)),
            columns: vec![b_column.name.clone()],
            referenced_table: target.db_name().to_owned(),
            referenced_columns: vec![junction.child_id_column.clone()],
            on_delete_action: ForeignKeyAction::Cascade,
            on_update_action: ForeignKeyAction::Cascade,
        },
    ];

    let index = Index {
        name: format!("{}_B_index", junction.table),
        columns: vec![b_column.name.clone()],
        tpe: IndexType::Normal,
        method: None,
        predicate: None,
    };

    Ok(Table {
        name: junction.table.clone(),
        primary_key: Some(PrimaryKey {
            columns: vec![a_column.name.clone(), b_column.name.clone()],
            constraint_name: None,
        }),
        columns: vec![a_column, b_column],
        indices: vec![index],
        foreign_keys,
        options: None,
    })
}

fn family_for(field: &Field) -> ColumnTypeFamily {
    match field.kind {
        ScalarKind::String => ColumnTypeFamily::String,
        ScalarKind::Int => ColumnTypeFamily::Int,
        ScalarKind::Float => ColumnTypeFamily::Float,
        ScalarKind::Decimal => ColumnTypeFamily::Decimal,
        ScalarKind::BigInt => ColumnTypeFamily::BigInt,
        ScalarKind::Boolean => ColumnTypeFamily::Boolean,
        ScalarKind::DateTime => ColumnTypeFamily::DateTime,
        ScalarKind::Date => ColumnTypeFamily::Date,
        ScalarKind::Time => ColumnTypeFamily::Time,
        ScalarKind::Json => ColumnTypeFamily::Json,
        ScalarKind::Bytes => ColumnTypeFamily::Binary,
        ScalarKind::Enum => {
            ColumnTypeFamily::Enum(field.enum_name.clone().unwrap_or_default())
        }
        ScalarKind::Vector => ColumnTypeFamily::Vector,
        ScalarKind::Point => ColumnTypeFamily::Geometric,
    }
}

fn arity_for(arity: FieldArity) -> ColumnArity {
    match arity {
        FieldArity::Required => ColumnArity::Required,
        FieldArity::Nullable => ColumnArity::Nullable,
        FieldArity::List => ColumnArity::List,
    }
}

fn referential_action(action: ReferentialAction) -> ForeignKeyAction {
    match action {
        ReferentialAction::Cascade => ForeignKeyAction::Cascade,
        ReferentialAction::SetNull => ForeignKeyAction::SetNull,
        ReferentialAction::Restrict => ForeignKeyAction::Restrict,
        ReferentialAction::NoAction => ForeignKeyAction::NoAction,
    }
}

